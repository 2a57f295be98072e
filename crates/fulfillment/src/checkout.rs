//! Cart to order conversion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use common::{CustomerId, ProductId};
use domain::{FieldError, NewOrder, Order, OrderLine, OrderNumber, Product, ShippingAddress};
use payments::{PaymentError, PaymentGateway, SessionRequest};
use serde::{Deserialize, Serialize};
use store::{Store, StoreError};

use crate::error::{FulfillmentError, Result};
use crate::settings::FulfillmentSettings;

/// What the customer submits at checkout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order_number: String,
    pub payment_url: String,
    pub session_id: String,
    pub status: String,
}

/// Converts a customer's cart into a `PENDING` order with stock reserved and
/// a payment session open.
///
/// Either every cart line is reserved and an order exists, or no stock
/// moved and no order exists. A gateway failure after the order is stored
/// leaves the order `PENDING` with its stock held; the pending-order sweeper
/// returns that stock once the order goes stale.
pub struct CheckoutOrchestrator<S: Store> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    settings: FulfillmentSettings,
}

impl<S: Store> Clone for CheckoutOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: Arc::clone(&self.gateway),
            settings: self.settings.clone(),
        }
    }
}

impl<S: Store> CheckoutOrchestrator<S> {
    /// Creates a new checkout orchestrator.
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>, settings: FulfillmentSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    /// Checks out the customer's cart.
    #[tracing::instrument(skip(self, request))]
    pub async fn checkout(
        &self,
        customer_id: CustomerId,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.run(customer_id, request).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(order_number = %receipt.order_number, "checkout completed");
            }
            Err(e) => {
                metrics::counter!("checkout_failures_total", "reason" => failure_reason(e))
                    .increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn run(&self, customer_id: CustomerId, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        // 1. Validate input before touching any state
        validate(&request)?;

        // 2. Load the customer's cart
        self.store
            .find_customer(customer_id)
            .await?
            .ok_or(FulfillmentError::CustomerNotFound(customer_id))?;
        let mut cart = self.store.get_or_create_cart(customer_id).await?;
        if cart.is_empty() {
            return Err(FulfillmentError::CartEmpty);
        }

        // 3. Freeze names and prices from the catalog
        let ids: Vec<ProductId> = cart.lines().iter().map(|line| line.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .store
            .find_products(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let mut lines = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            let product = products
                .get(&line.product_id)
                .ok_or(FulfillmentError::ProductNotFound(line.product_id))?;
            lines.push(OrderLine::new(
                product.id,
                product.name.clone(),
                line.quantity,
                product.price,
            ));
        }

        // 4. Reserve stock for every line, all or nothing
        self.reserve_all(&lines).await?;

        // 5. Persist the order under a fresh number
        let new_order = NewOrder {
            customer_id,
            lines,
            shipping_cost: self.settings.shipping_cost,
            currency: self.settings.currency.clone(),
            shipping_address: request.shipping_address,
            notes: request.notes.filter(|notes| !notes.trim().is_empty()),
        };
        let order = match self.place_order(new_order.clone()).await {
            Ok(order) => order,
            Err(e) => {
                self.release_all(&new_order.lines).await;
                return Err(e);
            }
        };
        tracing::info!(
            order_number = %order.order_number(),
            total = %order.total(),
            "order placed"
        );

        // 6. Open a payment session; on failure the order stays PENDING
        let session_request = SessionRequest {
            order_reference: order.order_number().to_string(),
            amount: order.total(),
            currency: order.currency().to_string(),
            success_url: self.settings.success_url(order.order_number().as_str()),
            cancel_url: self.settings.cancel_url(),
        };
        let session = self
            .gateway
            .create_checkout_session(&session_request)
            .await
            .map_err(|e| gateway_failure(&order, e))?;

        // 7. Record the payment references and empty the cart
        self.store
            .attach_payment(
                order.id(),
                self.gateway.provider(),
                &session.session_id,
                session.payment_intent_id.as_deref(),
            )
            .await?;

        cart.clear();
        self.store.save_cart(&cart).await?;

        Ok(CheckoutReceipt {
            order_number: order.order_number().to_string(),
            payment_url: session.checkout_url,
            session_id: session.session_id,
            status: session.status,
        })
    }

    async fn reserve_all(&self, lines: &[OrderLine]) -> Result<()> {
        for (index, line) in lines.iter().enumerate() {
            match self.store.try_reserve(line.product_id, line.quantity).await {
                Ok(_) => {
                    metrics::counter!("inventory_reservations_total", "outcome" => "reserved")
                        .increment(1);
                }
                Err(e) => {
                    metrics::counter!("inventory_reservations_total", "outcome" => "rejected")
                        .increment(1);
                    self.release_all(&lines[..index]).await;
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    async fn release_all(&self, lines: &[OrderLine]) {
        for line in lines {
            if let Err(e) = self.store.release(line.product_id, line.quantity).await {
                tracing::error!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %e,
                    "failed to release reserved stock"
                );
            }
        }
    }

    async fn place_order(&self, new_order: NewOrder) -> Result<Order> {
        let attempts = self.settings.order_number_attempts.max(1);
        let mut last_error = None;

        for _ in 0..attempts {
            let order = Order::place(new_order.clone(), OrderNumber::generate_now())?;
            match self.store.insert_order(&order).await {
                Ok(()) => return Ok(order),
                Err(StoreError::DuplicateOrderNumber(number)) => {
                    tracing::debug!(%number, "order number taken, retrying");
                    last_error = Some(StoreError::DuplicateOrderNumber(number));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error
            .unwrap_or_else(|| StoreError::InvalidData("no order number attempts".to_string()))
            .into())
    }
}

fn validate(request: &CheckoutRequest) -> Result<()> {
    let mut errors = request.shipping_address.validate().err().unwrap_or_default();
    if request.payment_method.trim().is_empty() {
        errors.push(FieldError::new("paymentMethod", "Payment method is required"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(FulfillmentError::Validation(errors))
    }
}

fn gateway_failure(order: &Order, err: PaymentError) -> FulfillmentError {
    tracing::error!(
        order_number = %order.order_number(),
        error = %err,
        "payment session failed, order left pending"
    );
    match err {
        PaymentError::Rejected { message, .. } => FulfillmentError::PaymentRejected(message),
        other => FulfillmentError::GatewayUnavailable {
            order_number: Some(order.order_number().to_string()),
            reason: other.to_string(),
        },
    }
}

fn failure_reason(err: &FulfillmentError) -> &'static str {
    match err {
        FulfillmentError::CartEmpty => "cart_empty",
        FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
        FulfillmentError::Validation(_) => "validation",
        FulfillmentError::GatewayUnavailable { .. } | FulfillmentError::PaymentRejected(_) => {
            "gateway"
        }
        FulfillmentError::ProductNotFound(_) | FulfillmentError::CustomerNotFound(_) => {
            "not_found"
        }
        _ => "internal",
    }
}
