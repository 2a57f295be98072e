use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ProductId};
use domain::{Cart, Customer, Order, OrderNumber, OrderStatus, Product, WebhookEvent};

use crate::Result;

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns the product, or None if it does not exist.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Returns every product among `ids` that exists, in no particular order.
    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;
}

/// Read access to customer accounts.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Returns the customer, or None if it does not exist.
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>>;
}

/// Authoritative stock counts.
///
/// Reservations are atomic conditional decrements: two concurrent calls for
/// the last unit never both succeed, and stock is never observed negative.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Takes `quantity` units of the product.
    ///
    /// Fails with `InsufficientStock` when fewer units are on hand, and
    /// `ProductNotFound` for unknown products. Returns the remaining stock.
    async fn try_reserve(&self, product_id: ProductId, quantity: u32) -> Result<u32>;

    /// Returns `quantity` units to the product.
    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()>;

    /// Current stock of the product.
    async fn available(&self, product_id: ProductId) -> Result<u32>;
}

/// Cart persistence. One cart per customer.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the customer's cart, creating an empty one if none exists.
    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart>;

    /// Replaces the stored lines of the cart.
    async fn save_cart(&self, cart: &Cart) -> Result<()>;
}

/// Order persistence.
///
/// Status updates are compare-and-set; callers validate the transition
/// against the state machine before asking for it.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order with its lines.
    ///
    /// Fails with `DuplicateOrderNumber` if the number is taken.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>>;

    /// Finds the order whose payment intent or session id equals `reference`.
    async fn find_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>>;

    /// Orders placed by the customer, newest first.
    async fn list_orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Stores the payment provider's references on the order.
    async fn attach_payment(
        &self,
        order_id: OrderId,
        provider: &str,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<()>;

    /// Moves the order from `expected` to `next`.
    ///
    /// Fails with `StatusConflict` if the stored status is not `expected`.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<()>;

    async fn set_tracking_number(&self, order_id: OrderId, tracking_number: &str) -> Result<()>;

    /// `PENDING` orders without a payment session created before `cutoff`.
    async fn list_stale_pending_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;
}

/// Outcome of recording a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventInsert {
    /// First delivery of this event id.
    Inserted,
    /// An event with this id was already stored; nothing was written.
    Duplicate,
}

/// Append-only log of webhook deliveries, unique on provider event id.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Stores the event unless its event id is already present.
    ///
    /// The check and the insert are a single atomic step.
    async fn insert_event_if_absent(&self, event: &WebhookEvent) -> Result<EventInsert>;

    /// Marks the event processed and clears any error note.
    async fn mark_event_processed(&self, event_id: &str) -> Result<()>;

    /// Leaves the event unprocessed with an error note and counts the
    /// failed attempt.
    async fn mark_event_failed(&self, event_id: &str, error: &str) -> Result<()>;

    async fn find_event(&self, event_id: &str) -> Result<Option<WebhookEvent>>;

    /// Unprocessed events received before `cutoff` with fewer than
    /// `max_attempts` failed attempts, oldest first.
    async fn list_unprocessed_events(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<WebhookEvent>>;
}

/// Everything the fulfillment services need from a store.
pub trait Store:
    ProductCatalog
    + CustomerDirectory
    + InventoryLedger
    + CartStore
    + OrderStore
    + WebhookEventStore
    + Clone
    + 'static
{
}

// Blanket implementation for every type providing all capabilities
impl<T> Store for T where
    T: ProductCatalog
        + CustomerDirectory
        + InventoryLedger
        + CartStore
        + OrderStore
        + WebhookEventStore
        + Clone
        + 'static
{
}
