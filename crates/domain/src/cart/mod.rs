//! Shopping cart aggregate and its priced summary.

mod aggregate;
mod summary;

pub use aggregate::{Cart, CartLine};
pub use summary::{CartSummary, CartSummaryLine};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantities must be at least one.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// The product has no line in this cart.
    #[error("Product {product_id} is not in the cart")]
    ItemNotInCart { product_id: ProductId },
}
