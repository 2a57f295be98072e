use common::{CustomerId, ProductId};
use domain::OrderStatus;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No product with this id exists.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// No customer with this id exists.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// A reservation asked for more units than are on hand.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Another order already uses this order number.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(String),

    /// A compare-and-set status update found a different current status.
    #[error("Order status conflict: expected {expected}, found {actual}")]
    StatusConflict {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The requested status change is not allowed from the stored status.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A stored row could not be mapped back into the domain model.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
