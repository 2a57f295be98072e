//! Read-only slices of records owned by external collaborators.
//!
//! Catalog management and customer registration live outside this system;
//! the fulfillment core only needs the fields below.

use common::{CustomerId, Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::order::ShippingAddress;

/// Inventory-relevant view of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    /// Current unit price. Orders copy this value at checkout.
    pub price: Money,
    /// Units available for reservation. Never negative.
    pub stock: u32,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            sku: sku.into(),
            price,
            stock,
        }
    }

    /// Returns true if `quantity` units could be reserved right now.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}

/// Customer account as seen by the fulfillment core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub full_name: String,
    /// Address on file. Orders never reference it; they copy it.
    pub default_address: Option<ShippingAddress>,
}

impl Customer {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            email: email.into(),
            full_name: full_name.into(),
            default_address: None,
        }
    }

    pub fn with_address(mut self, address: ShippingAddress) -> Self {
        self.default_address = Some(address);
        self
    }
}
