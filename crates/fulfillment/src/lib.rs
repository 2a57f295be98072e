//! Fulfillment services: carts, checkout, payment webhooks and the order
//! lifecycle after payment.
//!
//! Every service is generic over a [`store::Store`] and talks to the
//! payment provider through a shared [`payments::PaymentGateway`].

pub mod cart;
pub mod checkout;
pub mod error;
mod lifecycle;
pub mod notifier;
pub mod orders;
pub mod settings;
pub mod sweeper;
pub mod webhook;

pub use cart::CartService;
pub use checkout::{CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest};
pub use error::{FulfillmentError, Result};
pub use notifier::{InMemoryNotifier, LoggingNotifier, Notifier, NotifyError};
pub use orders::OrderService;
pub use settings::FulfillmentSettings;
pub use sweeper::{PendingOrderSweeper, run_maintenance};
pub use webhook::{
    DEFAULT_MAX_REDRIVE_ATTEMPTS, RedriveReport, WebhookOutcome, WebhookReconciler,
};
