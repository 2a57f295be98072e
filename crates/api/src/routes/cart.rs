//! Cart endpoints for the signed-in customer.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::ProductId;
use domain::{CartSummary, FieldError};
use fulfillment::FulfillmentError;
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

fn product_id(raw: &str, field: &str) -> Result<ProductId, ApiError> {
    ProductId::parse_str(raw).map_err(|_| {
        FulfillmentError::Validation(vec![FieldError::new(field, "Product id must be a UUID")])
            .into()
    })
}

/// GET /cart — the caller's cart with prices and totals.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.carts.get(customer_id).await?))
}

/// POST /cart/items — add units of a product.
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartSummary>, ApiError> {
    let Json(req) = payload?;
    let product_id = product_id(&req.product_id, "productId")?;
    let summary = state
        .carts
        .add_item(customer_id, product_id, req.quantity)
        .await?;
    Ok(Json(summary))
}

/// PUT /cart/items/{productId} — set the quantity of a line.
#[tracing::instrument(skip(state, payload))]
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(raw_product_id): Path<String>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartSummary>, ApiError> {
    let Json(req) = payload?;
    let product_id = product_id(&raw_product_id, "productId")?;
    let summary = state
        .carts
        .update_item_quantity(customer_id, product_id, req.quantity)
        .await?;
    Ok(Json(summary))
}

/// DELETE /cart/items/{productId} — drop a line.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(raw_product_id): Path<String>,
) -> Result<Json<CartSummary>, ApiError> {
    let product_id = product_id(&raw_product_id, "productId")?;
    Ok(Json(state.carts.remove_item(customer_id, product_id).await?))
}

/// DELETE /cart — empty the cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.carts.clear(customer_id).await?))
}
