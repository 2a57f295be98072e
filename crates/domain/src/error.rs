//! Domain error types.

use serde::Serialize;
use thiserror::Error;

use crate::cart::CartError;
use crate::order::OrderError;
use crate::webhook::WebhookParseError;

/// A single validation failure attached to an input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the offending field as the client sent it.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An error occurred in the cart aggregate.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// A webhook payload could not be understood.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookParseError),

    /// Input failed field-level validation.
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
}
