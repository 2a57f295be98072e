//! Order aggregate and related types.

mod aggregate;
mod status;
mod value_objects;

pub use aggregate::{NewOrder, Order, OrderParts};
pub use status::OrderStatus;
pub use value_objects::{OrderLine, OrderNumber, OrderTotals, ShippingAddress};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested status change is not allowed by the state machine.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// An order must carry at least one line.
    #[error("Order has no lines")]
    NoLines,

    /// Line quantity must be positive.
    #[error("Invalid quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Line totals or the order total do not fit the money range.
    #[error("Order amount is out of range")]
    AmountOverflow,

    /// Malformed order number.
    #[error("Invalid order number: {0}")]
    InvalidOrderNumber(String),
}
