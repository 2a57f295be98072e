//! Payment webhook reconciliation.
//!
//! Deliveries are verified, recorded once per provider event id, and then
//! applied to the matching order. Providers deliver at least once, so a
//! repeated event id is acknowledged without touching any order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{EventKind, Order, OrderStatus, ProviderEvent, WebhookEvent};
use payments::PaymentGateway;
use store::{EventInsert, Store};

use crate::error::{FulfillmentError, Result};
use crate::lifecycle;
use crate::notifier::Notifier;

/// How a delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Applied, or recorded with nothing to apply.
    Processed,
    /// The event id was seen before; nothing changed.
    Duplicate,
    /// No order matches the event's payment references. The event stays
    /// unprocessed so a later redrive can retry it.
    Unmatched,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Unmatched => "unmatched",
        }
    }
}

/// Summary of a redrive pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedriveReport {
    pub attempted: usize,
    pub processed: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// Failed attempts after which redrive stops retrying an event.
pub const DEFAULT_MAX_REDRIVE_ATTEMPTS: u32 = 10;

/// Applies provider events to orders.
pub struct WebhookReconciler<S: Store> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    max_redrive_attempts: u32,
}

impl<S: Store> Clone for WebhookReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: Arc::clone(&self.gateway),
            notifier: Arc::clone(&self.notifier),
            max_redrive_attempts: self.max_redrive_attempts,
        }
    }
}

impl<S: Store> WebhookReconciler<S> {
    /// Creates a new webhook reconciler.
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            gateway,
            notifier,
            max_redrive_attempts: DEFAULT_MAX_REDRIVE_ATTEMPTS,
        }
    }

    /// Sets how many failed attempts an event may accumulate before redrive
    /// leaves it alone.
    pub fn with_max_redrive_attempts(mut self, attempts: u32) -> Self {
        self.max_redrive_attempts = attempts;
        self
    }

    /// Handles one raw delivery.
    ///
    /// Fails with `InvalidSignature` before anything is stored when the
    /// gateway does not vouch for the payload.
    #[tracing::instrument(skip(self, signature, payload))]
    pub async fn handle(&self, signature: Option<&str>, payload: &str) -> Result<WebhookOutcome> {
        if !self.gateway.verify_webhook(signature, payload) {
            metrics::counter!("webhook_events_total", "outcome" => "rejected").increment(1);
            return Err(FulfillmentError::InvalidSignature);
        }

        let event = ProviderEvent::parse(payload).map_err(|e| {
            metrics::counter!("webhook_events_total", "outcome" => "invalid").increment(1);
            FulfillmentError::InvalidPayload(e.to_string())
        })?;

        let record = WebhookEvent::received(
            self.gateway.provider(),
            &event,
            payload,
            signature.map(str::to_string),
        );
        if self.store.insert_event_if_absent(&record).await? == EventInsert::Duplicate {
            tracing::info!(event_id = %event.event_id, "duplicate webhook delivery ignored");
            metrics::counter!("webhook_events_total", "outcome" => "duplicate").increment(1);
            return Ok(WebhookOutcome::Duplicate);
        }

        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "webhook event recorded"
        );
        self.settle(&event).await
    }

    /// Re-applies events left unprocessed that were received before
    /// `cutoff`, oldest first.
    ///
    /// Events that already failed `max_redrive_attempts` times stay stored
    /// with their error note and are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn redrive_unprocessed(&self, cutoff: DateTime<Utc>) -> Result<RedriveReport> {
        let mut report = RedriveReport::default();
        let pending = self
            .store
            .list_unprocessed_events(cutoff, self.max_redrive_attempts)
            .await?;

        for stored in pending {
            report.attempted += 1;
            if stored.attempts + 1 >= self.max_redrive_attempts {
                tracing::warn!(
                    event_id = %stored.event_id,
                    attempts = stored.attempts + 1,
                    "last redrive attempt for webhook event"
                );
            }

            let event = match ProviderEvent::parse(&stored.payload) {
                Ok(event) => event,
                Err(e) => {
                    self.store
                        .mark_event_failed(&stored.event_id, &e.to_string())
                        .await?;
                    report.failed += 1;
                    continue;
                }
            };

            match self.settle(&event).await {
                Ok(WebhookOutcome::Unmatched) => report.unmatched += 1,
                Ok(_) => report.processed += 1,
                Err(e) => {
                    tracing::warn!(event_id = %stored.event_id, error = %e, "redrive failed");
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                processed = report.processed,
                unmatched = report.unmatched,
                failed = report.failed,
                "webhook redrive finished"
            );
        }
        Ok(report)
    }

    /// Applies a recorded event and stores the result on the event row.
    async fn settle(&self, event: &ProviderEvent) -> Result<WebhookOutcome> {
        match self.apply(event).await {
            Ok(outcome) => {
                self.store.mark_event_processed(&event.event_id).await?;
                metrics::counter!("webhook_events_total", "outcome" => outcome.as_str())
                    .increment(1);
                Ok(outcome)
            }
            Err(FulfillmentError::OrderNotFound(reference)) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    %reference,
                    "no order matches webhook payment reference"
                );
                self.store
                    .mark_event_failed(
                        &event.event_id,
                        &format!("No order matches payment reference {reference}"),
                    )
                    .await?;
                metrics::counter!("webhook_events_total", "outcome" => "unmatched").increment(1);
                Ok(WebhookOutcome::Unmatched)
            }
            Err(e) => {
                tracing::error!(event_id = %event.event_id, error = %e, "webhook processing failed");
                self.store
                    .mark_event_failed(&event.event_id, &e.to_string())
                    .await?;
                metrics::counter!("webhook_events_total", "outcome" => "failed").increment(1);
                Err(e)
            }
        }
    }

    async fn apply(&self, event: &ProviderEvent) -> Result<WebhookOutcome> {
        match event.kind {
            EventKind::PaymentSucceeded => {
                let order = self.find_order(event).await?;
                self.apply_success(&order, event).await?;
            }
            EventKind::PaymentFailed => {
                let order = self.find_order(event).await?;
                self.apply_failure(&order).await?;
            }
            EventKind::Other => {
                tracing::debug!(event_type = %event.event_type, "event type not acted upon");
            }
        }
        Ok(WebhookOutcome::Processed)
    }

    async fn find_order(&self, event: &ProviderEvent) -> Result<Order> {
        for reference in &event.payment_references {
            if let Some(order) = self.store.find_order_by_payment_reference(reference).await? {
                return Ok(order);
            }
        }
        Err(FulfillmentError::OrderNotFound(
            event.payment_references.join(","),
        ))
    }

    async fn apply_success(&self, order: &Order, event: &ProviderEvent) -> Result<()> {
        if !order.status().awaits_payment() {
            tracing::info!(
                order_number = %order.order_number(),
                status = %order.status(),
                "payment already settled"
            );
            return Ok(());
        }

        if !lifecycle::transition(&self.store, order, OrderStatus::Paid).await? {
            return Ok(());
        }

        // Hosted sessions learn their payment intent only once paid
        if order.payment_intent_id().is_none()
            && let Some(session_id) = order.payment_session_id()
            && let Some(intent) = event
                .payment_references
                .iter()
                .find(|reference| reference.as_str() != session_id)
        {
            self.store
                .attach_payment(
                    order.id(),
                    order.payment_provider().unwrap_or(self.gateway.provider()),
                    session_id,
                    Some(intent.as_str()),
                )
                .await?;
        }

        self.notify_paid(order).await;
        Ok(())
    }

    async fn apply_failure(&self, order: &Order) -> Result<()> {
        if !order.status().awaits_payment() {
            tracing::info!(
                order_number = %order.order_number(),
                status = %order.status(),
                "payment failure ignored for settled order"
            );
            return Ok(());
        }

        if lifecycle::cancel_and_release(&self.store, order).await? {
            tracing::info!(order_number = %order.order_number(), "order cancelled after payment failure");
        }
        Ok(())
    }

    async fn notify_paid(&self, order: &Order) {
        let customer = match self.store.find_customer(order.customer_id()).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                tracing::warn!(order_number = %order.order_number(), "paid order has no customer");
                return;
            }
            Err(e) => {
                tracing::warn!(order_number = %order.order_number(), error = %e, "customer lookup failed");
                return;
            }
        };

        if let Err(e) = self
            .notifier
            .send_order_confirmation(&customer.email, order.order_number())
            .await
        {
            tracing::warn!(
                order_number = %order.order_number(),
                error = %e,
                "order confirmation not sent"
            );
        }
    }
}
