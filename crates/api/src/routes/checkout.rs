//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use fulfillment::{CheckoutReceipt, CheckoutRequest};
use store::Store;

use crate::AppState;
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

/// POST /checkout — turn the cart into a pending order and open payment.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutReceipt>, ApiError> {
    let Json(req) = payload?;
    Ok(Json(state.checkout.checkout(customer_id, req).await?))
}
