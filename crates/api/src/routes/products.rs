//! Product catalogue and stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use inventory::{InventoryError, NewProduct, Product};
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::ListResponse;
use crate::state::ProductState;

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    #[serde(default)]
    pub stock: Option<i64>,
}

/// GET /products: the whole catalogue, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<ProductState>>,
) -> Result<Json<ListResponse<Product>>, ApiError> {
    let products = state.ledger.list_products().await?;
    Ok(Json(ListResponse::new(products)))
}

/// GET /products/{id}: one product with its current stock.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<ProductState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id = ProductId::new(id);
    let product = state
        .ledger
        .get_product(&product_id)
        .await?
        .ok_or(ApiError::Inventory(InventoryError::ProductNotFound(product_id)))?;
    Ok(Json(product))
}

/// POST /products: add a product to the catalogue.
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<Arc<ProductState>>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(new_product) = body?;
    let product = state.ledger.create_product(new_product).await?;
    tracing::info!(product_id = %product.id, stock = product.stock, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/{id}/stock: overwrite the stock level.
#[tracing::instrument(skip(state, body))]
pub async fn update_stock(
    State(state): State<Arc<ProductState>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStockRequest>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let Json(req) = body?;
    let stock = parse_stock(req.stock)?;
    let product = state.ledger.set_stock(&ProductId::new(id), stock).await?;
    tracing::info!(product_id = %product.id, stock, "stock updated");
    Ok(Json(product))
}

fn parse_stock(stock: Option<i64>) -> Result<u32, ApiError> {
    let stock = stock.ok_or_else(|| ApiError::BadRequest("stock is required".to_string()))?;
    u32::try_from(stock).map_err(|_| {
        ApiError::BadRequest(format!("stock must be a non-negative integer, got {stock}"))
    })
}
