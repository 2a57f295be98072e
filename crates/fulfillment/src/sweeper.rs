//! Background maintenance: stale pending orders and webhook redrive.

use std::time::Duration;

use chrono::Utc;
use store::Store;
use tokio::sync::watch;

use crate::error::Result;
use crate::lifecycle;
use crate::webhook::WebhookReconciler;

/// Cancels `PENDING` orders that never got a payment session and returns
/// their stock.
#[derive(Clone)]
pub struct PendingOrderSweeper<S: Store> {
    store: S,
    ttl: chrono::Duration,
}

impl<S: Store> PendingOrderSweeper<S> {
    /// Creates a sweeper for orders older than `ttl`.
    pub fn new(store: S, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    /// Releases every stale pending order. Returns how many were cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn release_stale(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.ttl;
        let mut released = 0;

        for order in self.store.list_stale_pending_orders(cutoff).await? {
            match lifecycle::cancel_and_release(&self.store, &order).await {
                Ok(true) => {
                    released += 1;
                    tracing::info!(
                        order_number = %order.order_number(),
                        "stale pending order cancelled"
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        order_number = %order.order_number(),
                        error = %e,
                        "failed to cancel stale order"
                    );
                }
            }
        }

        if released > 0 {
            metrics::counter!("pending_orders_released_total").increment(released as u64);
        }
        Ok(released)
    }

    /// Age after which an order counts as stale.
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }
}

/// Runs the sweeper and a webhook redrive every `interval` until `shutdown`
/// flips to true.
///
/// Redrive only picks up events older than the sweeper's ttl so it never
/// races a delivery that is still being handled.
pub async fn run_maintenance<S: Store>(
    sweeper: PendingOrderSweeper<S>,
    reconciler: WebhookReconciler<S>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweeper.release_stale().await {
                    tracing::error!(error = %e, "pending order sweep failed");
                }
                let cutoff = Utc::now() - sweeper.ttl();
                if let Err(e) = reconciler.redrive_unprocessed(cutoff).await {
                    tracing::error!(error = %e, "webhook redrive failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("maintenance task stopped");
                    break;
                }
            }
        }
    }
}
