//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::ServiceInfo;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub instance: String,
}

/// GET /health: reports liveness and which instance answered.
pub async fn check(State(info): State<ServiceInfo>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: info.service,
        instance: info.instance,
    })
}
