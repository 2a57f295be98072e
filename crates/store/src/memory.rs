use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId};
use domain::{Cart, Customer, Order, OrderNumber, OrderStatus, Product, ShippingAddress, WebhookEvent};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    traits::{
        CartStore, CustomerDirectory, EventInsert, InventoryLedger, OrderStore, ProductCatalog,
        WebhookEventStore,
    },
};

#[derive(Default)]
struct Orders {
    by_id: HashMap<OrderId, Order>,
    by_number: HashMap<String, OrderId>,
}

/// In-memory store implementation for tests and local runs.
///
/// Every capability is guarded by its own lock; the inventory lock makes
/// reservations atomic in the same way a conditional UPDATE does in
/// PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
    carts: Arc<RwLock<HashMap<CustomerId, Cart>>>,
    orders: Arc<RwLock<Orders>>,
    webhook_events: Arc<RwLock<HashMap<String, WebhookEvent>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub async fn insert_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    /// Adds or replaces a customer.
    pub async fn insert_customer(&self, customer: Customer) {
        self.customers.write().await.insert(customer.id, customer);
    }

    /// Changes a product's catalog price.
    pub async fn set_product_price(&self, product_id: ProductId, price: Money) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product.price = price;
        Ok(())
    }

    /// Changes a customer's address on file.
    pub async fn set_customer_address(
        &self,
        customer_id: CustomerId,
        address: ShippingAddress,
    ) -> Result<()> {
        let mut customers = self.customers.write().await;
        let customer = customers
            .get_mut(&customer_id)
            .ok_or(StoreError::CustomerNotFound(customer_id))?;
        customer.default_address = Some(address);
        Ok(())
    }

    /// Returns the number of stored webhook events.
    pub async fn webhook_event_count(&self) -> usize {
        self.webhook_events.read().await.len()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.by_id.len()
    }

    async fn with_order<T>(
        &self,
        order_id: OrderId,
        f: impl FnOnce(&mut Order) -> Result<T> + Send,
    ) -> Result<T> {
        let mut orders = self.orders.write().await;
        let order = orders
            .by_id
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))?;
        f(order)
    }

    async fn with_event(
        &self,
        event_id: &str,
        f: impl FnOnce(&mut WebhookEvent) + Send,
    ) -> Result<()> {
        let mut events = self.webhook_events.write().await;
        let event = events.get_mut(event_id).ok_or_else(|| {
            StoreError::InvalidData(format!("webhook event {event_id} is not stored"))
        })?;
        f(event);
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryStore {
    async fn try_reserve(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }

    async fn available(&self, product_id: ProductId) -> Result<u32> {
        self.products
            .read()
            .await
            .get(&product_id)
            .map(|product| product.stock)
            .ok_or(StoreError::ProductNotFound(product_id))
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart> {
        let mut carts = self.carts.write().await;
        Ok(carts
            .entry(customer_id)
            .or_insert_with(|| Cart::new(customer_id))
            .clone())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.carts
            .write()
            .await
            .insert(cart.customer_id(), cart.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        let number = order.order_number().as_str();

        if orders.by_number.contains_key(number) {
            return Err(StoreError::DuplicateOrderNumber(number.to_string()));
        }

        orders.by_number.insert(number.to_string(), order.id());
        orders.by_id.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .by_number
            .get(number.as_str())
            .and_then(|id| orders.by_id.get(id))
            .cloned())
    }

    async fn find_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .by_id
            .values()
            .find(|order| order.matches_payment_reference(reference))
            .cloned())
    }

    async fn list_orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<_> = orders
            .by_id
            .values()
            .filter(|order| order.customer_id() == customer_id)
            .cloned()
            .collect();
        result.sort_by_key(|order| std::cmp::Reverse(order.created_at()));
        Ok(result)
    }

    async fn attach_payment(
        &self,
        order_id: OrderId,
        provider: &str,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<()> {
        self.with_order(order_id, |order| {
            order.attach_payment(provider, session_id, payment_intent_id.map(str::to_string));
            Ok(())
        })
        .await
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<()> {
        self.with_order(order_id, |order| {
            let actual = order.status();
            if actual != expected {
                return Err(StoreError::StatusConflict { expected, actual });
            }
            order
                .transition_to(next)
                .map(|_| ())
                .map_err(|_| StoreError::InvalidTransition {
                    from: actual,
                    to: next,
                })
        })
        .await
    }

    async fn set_tracking_number(&self, order_id: OrderId, tracking_number: &str) -> Result<()> {
        self.with_order(order_id, |order| {
            order.set_tracking_number(tracking_number);
            Ok(())
        })
        .await
    }

    async fn list_stale_pending_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut stale: Vec<_> = orders
            .by_id
            .values()
            .filter(|order| {
                order.status() == OrderStatus::Pending
                    && order.payment_session_id().is_none()
                    && order.created_at() < cutoff
            })
            .cloned()
            .collect();
        stale.sort_by_key(|order| order.created_at());
        Ok(stale)
    }
}

#[async_trait]
impl WebhookEventStore for InMemoryStore {
    async fn insert_event_if_absent(&self, event: &WebhookEvent) -> Result<EventInsert> {
        let mut events = self.webhook_events.write().await;
        if events.contains_key(&event.event_id) {
            return Ok(EventInsert::Duplicate);
        }
        events.insert(event.event_id.clone(), event.clone());
        Ok(EventInsert::Inserted)
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<()> {
        self.with_event(event_id, |event| {
            event.processed = true;
            event.processed_at = Some(Utc::now());
            event.error = None;
        })
        .await
    }

    async fn mark_event_failed(&self, event_id: &str, error: &str) -> Result<()> {
        self.with_event(event_id, |event| {
            event.processed = false;
            event.error = Some(error.to_string());
            event.attempts = event.attempts.saturating_add(1);
        })
        .await
    }

    async fn find_event(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        Ok(self.webhook_events.read().await.get(event_id).cloned())
    }

    async fn list_unprocessed_events(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<WebhookEvent>> {
        let events = self.webhook_events.read().await;
        let mut pending: Vec<_> = events
            .values()
            .filter(|event| {
                !event.processed && event.received_at < cutoff && event.attempts < max_attempts
            })
            .cloned()
            .collect();
        pending.sort_by_key(|event| event.received_at);
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use domain::{NewOrder, OrderLine, ProviderEvent};

    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Salma Bennani".to_string(),
            phone: "+212622222222".to_string(),
            line1: "9 Derb Sidi Bouloukat".to_string(),
            line2: None,
            city: "Marrakech".to_string(),
            region: "Marrakech-Safi".to_string(),
            postal_code: "40000".to_string(),
            country: "MA".to_string(),
        }
    }

    fn order_for(customer_id: CustomerId, number: &str) -> Order {
        let new = NewOrder {
            customer_id,
            lines: vec![OrderLine::new(
                ProductId::new(),
                "Acacia honey",
                1,
                Money::from_units(80),
            )],
            shipping_cost: Money::from_units(30),
            currency: "MAD".to_string(),
            shipping_address: address(),
            notes: None,
        };
        Order::place(new, OrderNumber::parse(number).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn reserve_and_release() {
        let store = InMemoryStore::new();
        let product = Product::new("Acacia honey", "HNY-ACA-500", Money::from_units(80), 3);
        let id = product.id;
        store.insert_product(product).await;

        assert_eq!(store.try_reserve(id, 2).await.unwrap(), 1);
        let err = store.try_reserve(id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(store.available(id).await.unwrap(), 1);

        store.release(id, 2).await.unwrap();
        assert_eq!(store.available(id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reserve_unknown_product() {
        let store = InMemoryStore::new();
        let result = store.try_reserve(ProductId::new(), 1).await;
        assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let store = InMemoryStore::new();
        let product = Product::new("Carob honey", "HNY-CAR-250", Money::from_units(60), 10);
        let id = product.id;
        store.insert_product(product).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.try_reserve(id, 1).await.is_ok() })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(store.available(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cart_is_created_lazily_once() {
        let store = InMemoryStore::new();
        let customer_id = CustomerId::new();

        let first = store.get_or_create_cart(customer_id).await.unwrap();
        let second = store.get_or_create_cart(customer_id).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert!(first.is_empty());
    }

    #[tokio::test]
    async fn duplicate_order_number_is_rejected() {
        let store = InMemoryStore::new();
        let customer_id = CustomerId::new();

        store
            .insert_order(&order_for(customer_id, "ORD-2026-000001"))
            .await
            .unwrap();
        let result = store
            .insert_order(&order_for(customer_id, "ORD-2026-000001"))
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateOrderNumber(_))));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn status_update_is_compare_and_set() {
        let store = InMemoryStore::new();
        let order = order_for(CustomerId::new(), "ORD-2026-000002");
        store.insert_order(&order).await.unwrap();

        store
            .update_order_status(order.id(), OrderStatus::Pending, OrderStatus::Paid)
            .await
            .unwrap();

        let result = store
            .update_order_status(order.id(), OrderStatus::Pending, OrderStatus::Cancelled)
            .await;
        assert!(matches!(
            result,
            Err(StoreError::StatusConflict {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Paid
            })
        ));
    }

    #[tokio::test]
    async fn orders_found_by_either_payment_reference() {
        let store = InMemoryStore::new();
        let order = order_for(CustomerId::new(), "ORD-2026-000003");
        store.insert_order(&order).await.unwrap();
        store
            .attach_payment(order.id(), "mock", "cs_abc", Some("pi_abc"))
            .await
            .unwrap();

        for reference in ["cs_abc", "pi_abc"] {
            let found = store
                .find_order_by_payment_reference(reference)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(found.id(), order.id());
        }
        assert!(
            store
                .find_order_by_payment_reference("pi_other")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn stale_pending_excludes_orders_with_sessions() {
        let store = InMemoryStore::new();
        let customer_id = CustomerId::new();
        let without_session = order_for(customer_id, "ORD-2026-000004");
        let with_session = order_for(customer_id, "ORD-2026-000005");
        store.insert_order(&without_session).await.unwrap();
        store.insert_order(&with_session).await.unwrap();
        store
            .attach_payment(with_session.id(), "mock", "cs_1", None)
            .await
            .unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let stale = store.list_stale_pending_orders(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id(), without_session.id());
    }

    #[tokio::test]
    async fn webhook_event_insert_is_idempotent() {
        let store = InMemoryStore::new();
        let parsed = ProviderEvent::parse(r#"{"id":"evt_1","type":"x"}"#).unwrap();
        let event = WebhookEvent::received("stripe", &parsed, "{}", None);

        assert_eq!(
            store.insert_event_if_absent(&event).await.unwrap(),
            EventInsert::Inserted
        );
        assert_eq!(
            store.insert_event_if_absent(&event).await.unwrap(),
            EventInsert::Duplicate
        );
        assert_eq!(store.webhook_event_count().await, 1);

        store.mark_event_failed("evt_1", "boom").await.unwrap();
        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.list_unprocessed_events(cutoff, 5).await.unwrap().len(), 1);

        store.mark_event_failed("evt_1", "boom again").await.unwrap();
        assert_eq!(store.find_event("evt_1").await.unwrap().unwrap().attempts, 2);
        assert!(store.list_unprocessed_events(cutoff, 2).await.unwrap().is_empty());

        store.mark_event_processed("evt_1").await.unwrap();
        let stored = store.find_event("evt_1").await.unwrap().unwrap();
        assert!(stored.processed);
        assert!(stored.error.is_none());
        assert!(store.list_unprocessed_events(cutoff, 5).await.unwrap().is_empty());
    }
}
