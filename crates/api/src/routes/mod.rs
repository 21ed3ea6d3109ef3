//! HTTP handlers.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use serde::Serialize;

/// Envelope for collection responses: `{"count": n, "data": [...]}`.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}
