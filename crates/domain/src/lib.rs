//! Domain layer for the order-fulfillment backend.
//!
//! This crate holds the pure data model, free of any I/O:
//! - Product and customer slices read from external collaborators
//! - Cart aggregate with line merging and quantity rules
//! - Order aggregate with frozen lines, totals and address snapshot
//! - Order status state machine
//! - Payment-provider webhook events

pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod webhook;

pub use cart::{Cart, CartError, CartLine, CartSummary, CartSummaryLine};
pub use catalog::{Customer, Product};
pub use error::{DomainError, FieldError};
pub use order::{
    NewOrder, Order, OrderError, OrderLine, OrderNumber, OrderParts, OrderStatus, OrderTotals,
    ShippingAddress,
};
pub use webhook::{EventKind, ProviderEvent, WebhookEvent, WebhookParseError};

pub use common::{CartId, CustomerId, Money, OrderId, ProductId};
