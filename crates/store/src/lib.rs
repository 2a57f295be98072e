//! Durable store for the order-fulfillment backend.
//!
//! Each capability the core depends on is its own trait so services can be
//! written against exactly what they use. [`Store`] bundles them for
//! implementations that provide everything.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use traits::{
    CartStore, CustomerDirectory, EventInsert, InventoryLedger, OrderStore, ProductCatalog, Store,
    WebhookEventStore,
};
