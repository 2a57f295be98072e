//! Status changes shared by the webhook, order and sweeper paths.

use domain::{Order, OrderStatus};
use store::{InventoryLedger, OrderStore, StoreError};

/// Moves `order` from its loaded status to `next`.
///
/// Returns false when another writer changed the status first.
pub(crate) async fn transition<S>(store: &S, order: &Order, next: OrderStatus) -> Result<bool, StoreError>
where
    S: OrderStore,
{
    match store.update_order_status(order.id(), order.status(), next).await {
        Ok(()) => {
            metrics::counter!("order_status_transitions_total", "to" => next.as_str()).increment(1);
            tracing::info!(
                order_number = %order.order_number(),
                from = %order.status(),
                to = %next,
                "order status changed"
            );
            Ok(true)
        }
        Err(StoreError::StatusConflict { actual, .. }) => {
            tracing::info!(
                order_number = %order.order_number(),
                expected = %order.status(),
                %actual,
                "order status changed concurrently"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Cancels `order` and returns its lines' stock to the ledger.
///
/// Only the writer whose status update wins releases stock, so each order's
/// reservation is returned at most once.
pub(crate) async fn cancel_and_release<S>(store: &S, order: &Order) -> Result<bool, StoreError>
where
    S: OrderStore + InventoryLedger,
{
    if !transition(store, order, OrderStatus::Cancelled).await? {
        return Ok(false);
    }

    for line in order.lines() {
        if let Err(e) = store.release(line.product_id, line.quantity).await {
            tracing::error!(
                order_number = %order.order_number(),
                product_id = %line.product_id,
                quantity = line.quantity,
                error = %e,
                "failed to release stock for cancelled order"
            );
            return Err(e);
        }
    }
    Ok(true)
}
