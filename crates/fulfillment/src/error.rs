//! Fulfillment error types.

use common::{CustomerId, ProductId};
use domain::{CartError, FieldError, OrderError, OrderStatus};
use payments::PaymentError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during fulfillment operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Checkout was attempted with no cart lines.
    #[error("Cart is empty")]
    CartEmpty,

    /// Not enough units on hand for a product.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Product reference is unknown.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Customer reference is unknown.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// Order is unknown or not visible to the caller.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Input failed field-level validation.
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// Cart quantities must be at least one.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// The product has no line in the cart.
    #[error("Product {0} is not in the cart")]
    ItemNotInCart(ProductId),

    /// The order's status does not allow the operation.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The payment provider could not be reached. The order, if any, stays
    /// `PENDING` with its stock reserved.
    #[error("Payment gateway unavailable: {reason}")]
    GatewayUnavailable {
        order_number: Option<String>,
        reason: String,
    },

    /// The payment provider refused the request.
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    /// The order has no payment reference to act on.
    #[error("Order {0} has no payment reference")]
    MissingPaymentReference(String),

    /// Webhook signature verification failed.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// A verified webhook payload could not be read.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Store error without a domain meaning.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => FulfillmentError::ProductNotFound(id),
            StoreError::CustomerNotFound(id) => FulfillmentError::CustomerNotFound(id),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => FulfillmentError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::OrderNotFound(reference) => FulfillmentError::OrderNotFound(reference),
            StoreError::InvalidTransition { from, to } => {
                FulfillmentError::InvalidStatusTransition { from, to }
            }
            other => FulfillmentError::Store(other),
        }
    }
}

impl From<CartError> for FulfillmentError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity { quantity } => FulfillmentError::InvalidQuantity(quantity),
            CartError::ItemNotInCart { product_id } => FulfillmentError::ItemNotInCart(product_id),
        }
    }
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStatusTransition { from, to } => {
                FulfillmentError::InvalidStatusTransition { from, to }
            }
            OrderError::NoLines => FulfillmentError::CartEmpty,
            OrderError::InvalidQuantity { quantity, .. } => {
                FulfillmentError::InvalidQuantity(quantity)
            }
            OrderError::AmountOverflow => FulfillmentError::Validation(vec![FieldError::new(
                "items",
                "Order amount is too large",
            )]),
            OrderError::InvalidOrderNumber(number) => FulfillmentError::OrderNotFound(number),
        }
    }
}

impl From<PaymentError> for FulfillmentError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Rejected { message, .. } => FulfillmentError::PaymentRejected(message),
            other => FulfillmentError::GatewayUnavailable {
                order_number: None,
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
