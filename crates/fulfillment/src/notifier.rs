//! Order notification boundary.
//!
//! Delivery is fire-and-forget from the caller's point of view: a failed
//! notification is logged and never undoes the status change that caused it.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::OrderNumber;
use thiserror::Error;

/// A notification could not be delivered.
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Trait for outbound customer notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the customer their order is paid.
    async fn send_order_confirmation(
        &self,
        email: &str,
        order_number: &OrderNumber,
    ) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_order_confirmation(
        &self,
        email: &str,
        order_number: &OrderNumber,
    ) -> Result<(), NotifyError> {
        tracing::info!(%order_number, email, "order confirmation queued");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<(String, String)>,
    fail: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every delivery.
    pub fn set_fail(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    /// Returns the (email, order number) pairs delivered so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send_order_confirmation(
        &self,
        email: &str,
        order_number: &OrderNumber,
    ) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(NotifyError("mail relay refused connection".to_string()));
        }
        state
            .sent
            .push((email.to_string(), order_number.to_string()));
        Ok(())
    }
}
