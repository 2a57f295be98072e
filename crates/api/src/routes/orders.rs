//! Order history endpoints for the signed-in customer.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use domain::{Order, OrderStatus, ShippingAddress};
use serde::Serialize;
use store::Store;

use crate::AppState;
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_number: String,
    pub status: OrderStatus,
    pub items: Vec<OrderLineResponse>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub total: Money,
    pub currency: String,
    pub payment_provider: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let totals = order.totals();
        Self {
            order_number: order.order_number().to_string(),
            status: order.status(),
            items: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total,
                })
                .collect(),
            subtotal: totals.subtotal(),
            shipping_cost: totals.shipping_cost(),
            discount: totals.discount(),
            total: totals.total(),
            currency: order.currency().to_string(),
            payment_provider: order.payment_provider().map(str::to_string),
            tracking_number: order.tracking_number().map(str::to_string),
            shipping_address: order.shipping_address().clone(),
            notes: order.notes().map(str::to_string),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

// -- Handlers --

/// GET /orders — the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_for_customer(customer_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{orderNumber} — one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orders
        .get_for_customer(customer_id, &order_number)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
