//! Cart aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CartId, CustomerId, ProductId};
use serde::{Deserialize, Serialize};

use super::CartError;

/// A product and quantity held in a cart.
///
/// Carts never store prices; they are read from the catalog when the cart
/// is summarized or checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A customer's cart. At most one line per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    customer_id: CustomerId,
    lines: Vec<CartLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a customer.
    pub fn new(customer_id: CustomerId) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            customer_id,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a cart from stored fields.
    pub fn from_parts(
        id: CartId,
        customer_id: CustomerId,
        lines: Vec<CartLine>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            lines,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total number of units across all lines.
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Quantity held for a product, zero if absent.
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map_or(0, |line| line.quantity)
    }

    /// Adds units of a product, merging with an existing line.
    ///
    /// Returns the line's quantity after the merge.
    pub fn add_item(&mut self, product_id: ProductId, quantity: u32) -> Result<u32, CartError> {
        validate_quantity(quantity)?;

        let merged = match self.line_mut(product_id) {
            Some(line) => {
                line.quantity += quantity;
                line.quantity
            }
            None => {
                self.lines.push(CartLine {
                    product_id,
                    quantity,
                });
                quantity
            }
        };
        self.touch();
        Ok(merged)
    }

    /// Replaces the quantity of an existing line.
    pub fn update_item_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        validate_quantity(quantity)?;

        let line = self
            .line_mut(product_id)
            .ok_or(CartError::ItemNotInCart { product_id })?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Removes a product's line. Removing an absent product is a no-op.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.touch();
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        return Err(CartError::InvalidQuantity { quantity });
    }
    Ok(())
}
