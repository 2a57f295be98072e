//! Order queries and post-payment operations.

use std::sync::Arc;

use common::CustomerId;
use domain::{Order, OrderNumber, OrderStatus};
use payments::{PaymentGateway, RefundResult};
use store::Store;

use crate::error::{FulfillmentError, Result};
use crate::lifecycle;

/// Reads orders and drives them after payment.
pub struct OrderService<S: Store> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
}

impl<S: Store> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service.
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// The customer's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_for_customer(customer_id).await?)
    }

    /// One of the customer's orders.
    ///
    /// Orders of other customers are reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn get_for_customer(&self, customer_id: CustomerId, order_number: &str) -> Result<Order> {
        let order = self.find_by_number(order_number).await?;
        if order.customer_id() != customer_id {
            return Err(FulfillmentError::OrderNotFound(order_number.to_string()));
        }
        Ok(order)
    }

    /// Any order by number.
    pub async fn find_by_number(&self, order_number: &str) -> Result<Order> {
        let not_found = || FulfillmentError::OrderNotFound(order_number.to_string());
        let number = OrderNumber::parse(order_number).map_err(|_| not_found())?;
        self.store
            .find_order_by_number(&number)
            .await?
            .ok_or_else(not_found)
    }

    /// Moves a paid order to `SHIPPED` and records its tracking number.
    #[tracing::instrument(skip(self))]
    pub async fn mark_shipped(&self, order_number: &str, tracking_number: &str) -> Result<Order> {
        let order = self.find_by_number(order_number).await?;
        if !matches!(order.status(), OrderStatus::Paid | OrderStatus::Processing) {
            return Err(FulfillmentError::InvalidStatusTransition {
                from: order.status(),
                to: OrderStatus::Shipped,
            });
        }

        self.advance(&order, OrderStatus::Shipped).await?;
        self.store
            .set_tracking_number(order.id(), tracking_number)
            .await?;
        self.find_by_number(order_number).await
    }

    /// Refunds the full order total through the gateway and marks the order
    /// `REFUNDED`.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, order_number: &str) -> Result<RefundResult> {
        let order = self.find_by_number(order_number).await?;
        if !order.status().can_refund() {
            return Err(FulfillmentError::InvalidStatusTransition {
                from: order.status(),
                to: OrderStatus::Refunded,
            });
        }
        let payment_intent = order
            .payment_intent_id()
            .ok_or_else(|| FulfillmentError::MissingPaymentReference(order_number.to_string()))?;

        let refund = self.gateway.refund(payment_intent, order.total()).await?;
        tracing::info!(
            order_number,
            refund_id = %refund.refund_id,
            amount = %refund.amount,
            "refund issued"
        );

        self.advance(&order, OrderStatus::Refunded).await?;
        Ok(refund)
    }

    /// Cancels an order still waiting for payment and returns its stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_number: &str) -> Result<Order> {
        let order = self.find_by_number(order_number).await?;
        if !order.status().is_unpaid() {
            return Err(FulfillmentError::InvalidStatusTransition {
                from: order.status(),
                to: OrderStatus::Cancelled,
            });
        }

        if !lifecycle::cancel_and_release(&self.store, &order).await? {
            return Err(self.conflict(&order, OrderStatus::Cancelled).await);
        }
        self.find_by_number(order_number).await
    }

    async fn advance(&self, order: &Order, next: OrderStatus) -> Result<()> {
        if lifecycle::transition(&self.store, order, next).await? {
            Ok(())
        } else {
            Err(self.conflict(order, next).await)
        }
    }

    /// Error for a transition lost to a concurrent writer, reported from the
    /// status that writer left behind.
    async fn conflict(&self, order: &Order, next: OrderStatus) -> FulfillmentError {
        let current = match self.store.find_order_by_number(order.order_number()).await {
            Ok(Some(current)) => current.status(),
            _ => order.status(),
        };
        FulfillmentError::InvalidStatusTransition {
            from: current,
            to: next,
        }
    }
}
