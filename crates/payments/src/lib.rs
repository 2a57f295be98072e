//! Payment gateway boundary.
//!
//! The fulfillment core talks to the payment provider only through
//! [`PaymentGateway`]. One implementation is chosen at startup and injected:
//! [`MockPaymentGateway`] for tests and local runs, [`StripePaymentGateway`]
//! for the live provider.

pub mod error;
pub mod gateway;
pub mod mock;
pub mod signature;
pub mod stripe;

pub use error::{PaymentError, Result};
pub use gateway::{PaymentGateway, PaymentSession, RefundResult, SessionRequest};
pub use mock::MockPaymentGateway;
pub use stripe::{STRIPE_API_BASE, StripeConfig, StripePaymentGateway};
