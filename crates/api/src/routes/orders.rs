//! Order placement and order read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EventId, OrderId};
use orders::Order;
use serde::{Deserialize, Serialize};
use workflow::{Communication, PlaceOrder};

use crate::error::ApiError;
use crate::routes::ListResponse;
use crate::state::OrderState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub quantity: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub order: Order,
    pub event_id: EventId,
    pub event_published: bool,
    pub communication: Communication,
}

/// POST /orders: place an order for one product.
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<Arc<OrderState>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let Json(req) = body?;
    let request = PlaceOrder::new(req.product_id, req.quantity.unwrap_or(0));

    let placement = state.workflow.create_order(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            message: "Order created successfully",
            event_published: placement.publish.is_published(),
            event_id: placement.event_id,
            order: placement.order,
            communication: placement.communication,
        }),
    ))
}

/// GET /orders: all orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<OrderState>>,
) -> Result<Json<ListResponse<Order>>, ApiError> {
    let orders = state.workflow.list_orders().await?;
    Ok(Json(ListResponse::new(orders)))
}

/// GET /orders/{id}: a single order.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<OrderState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .workflow
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(order))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.trim()
        .parse::<i64>()
        .map(OrderId::new)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id '{id}': {e}")))
}
