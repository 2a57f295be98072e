//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{CustomerId, Money};
use domain::{
    Customer, NewOrder, Order, OrderLine, OrderNumber, OrderStatus, Product, ProviderEvent,
    ShippingAddress, WebhookEvent,
};
use sqlx::PgPool;
use store::{
    CartStore, CustomerDirectory, EventInsert, InventoryLedger, OrderStore, PostgresStore,
    ProductCatalog, StoreError, WebhookEventStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_commerce_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE webhook_events, order_lines, orders, cart_items, carts, products, customers",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn address(city: &str) -> ShippingAddress {
    ShippingAddress {
        name: "Karim Tazi".to_string(),
        phone: "+212633333333".to_string(),
        line1: "21 Boulevard Zerktouni".to_string(),
        line2: None,
        city: city.to_string(),
        region: "Casablanca-Settat".to_string(),
        postal_code: "20000".to_string(),
        country: "MA".to_string(),
    }
}

async fn seed(store: &PostgresStore, stock: u32) -> (Customer, Product) {
    let customer = Customer::new("karim@example.com", "Karim Tazi").with_address(address("Casablanca"));
    let product = Product::new("Jujube honey", "HNY-JUJ-500", Money::from_units(100), stock);
    store.upsert_customer(&customer).await.unwrap();
    store.upsert_product(&product).await.unwrap();
    (customer, product)
}

fn order_for(customer: &Customer, product: &Product, number: &str) -> Order {
    let new = NewOrder {
        customer_id: customer.id,
        lines: vec![OrderLine::new(product.id, &product.name, 2, product.price)],
        shipping_cost: Money::from_units(30),
        currency: "MAD".to_string(),
        shipping_address: address("Casablanca"),
        notes: Some("Leave with the concierge".to_string()),
    };
    Order::place(new, OrderNumber::parse(number).unwrap()).unwrap()
}

#[tokio::test]
async fn catalog_and_directory_reads() {
    let store = get_test_store().await;
    let (customer, product) = seed(&store, 5).await;

    let found = store.find_product(product.id).await.unwrap().unwrap();
    assert_eq!(found, product);

    let found = store.find_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(found.default_address, customer.default_address);

    assert!(store.find_customer(CustomerId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn reservation_is_conditional() {
    let store = get_test_store().await;
    let (_, product) = seed(&store, 3).await;

    assert_eq!(store.try_reserve(product.id, 2).await.unwrap(), 1);

    let err = store.try_reserve(product.id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));

    store.release(product.id, 2).await.unwrap();
    assert_eq!(store.available(product.id).await.unwrap(), 3);
}

#[tokio::test]
async fn concurrent_reservations_for_last_unit() {
    let store = get_test_store().await;
    let (_, product) = seed(&store, 1).await;

    let attempts = (0..8).map(|_| store.try_reserve(product.id, 1));
    let results = futures_util::future::join_all(attempts).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert_eq!(store.available(product.id).await.unwrap(), 0);
}

#[tokio::test]
async fn cart_roundtrip() {
    let store = get_test_store().await;
    let (customer, product) = seed(&store, 5).await;

    let mut cart = store.get_or_create_cart(customer.id).await.unwrap();
    assert!(cart.is_empty());

    cart.add_item(product.id, 2).unwrap();
    store.save_cart(&cart).await.unwrap();

    let reloaded = store.get_or_create_cart(customer.id).await.unwrap();
    assert_eq!(reloaded.id(), cart.id());
    assert_eq!(reloaded.quantity_of(product.id), 2);

    cart.clear();
    store.save_cart(&cart).await.unwrap();
    assert!(store.get_or_create_cart(customer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn order_insert_and_lookup() {
    let store = get_test_store().await;
    let (customer, product) = seed(&store, 5).await;
    let order = order_for(&customer, &product, "ORD-2026-100001");

    store.insert_order(&order).await.unwrap();

    let found = store
        .find_order_by_number(order.order_number())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), order.id());
    assert_eq!(found.lines(), order.lines());
    assert_eq!(found.totals(), order.totals());
    assert_eq!(found.shipping_address(), order.shipping_address());
    assert_eq!(found.status(), OrderStatus::Pending);

    let duplicate = order_for(&customer, &product, "ORD-2026-100001");
    let result = store.insert_order(&duplicate).await;
    assert!(matches!(result, Err(StoreError::DuplicateOrderNumber(_))));
}

#[tokio::test]
async fn payment_reference_lookup_and_status_cas() {
    let store = get_test_store().await;
    let (customer, product) = seed(&store, 5).await;
    let order = order_for(&customer, &product, "ORD-2026-100002");
    store.insert_order(&order).await.unwrap();

    store
        .attach_payment(order.id(), "stripe", "cs_test_1", Some("pi_test_1"))
        .await
        .unwrap();

    let by_intent = store
        .find_order_by_payment_reference("pi_test_1")
        .await
        .unwrap()
        .unwrap();
    let by_session = store
        .find_order_by_payment_reference("cs_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_intent.id(), order.id());
    assert_eq!(by_session.id(), order.id());

    store
        .update_order_status(order.id(), OrderStatus::Pending, OrderStatus::Paid)
        .await
        .unwrap();
    let conflict = store
        .update_order_status(order.id(), OrderStatus::Pending, OrderStatus::Cancelled)
        .await;
    assert!(matches!(
        conflict,
        Err(StoreError::StatusConflict {
            actual: OrderStatus::Paid,
            ..
        })
    ));

    let invalid = store
        .update_order_status(order.id(), OrderStatus::Paid, OrderStatus::Pending)
        .await;
    assert!(matches!(invalid, Err(StoreError::InvalidTransition { .. })));
}

#[tokio::test]
async fn stale_pending_orders() {
    let store = get_test_store().await;
    let (customer, product) = seed(&store, 5).await;
    let stale = order_for(&customer, &product, "ORD-2026-100003");
    let with_session = order_for(&customer, &product, "ORD-2026-100004");
    store.insert_order(&stale).await.unwrap();
    store.insert_order(&with_session).await.unwrap();
    store
        .attach_payment(with_session.id(), "stripe", "cs_test_2", None)
        .await
        .unwrap();

    let found = store
        .list_stale_pending_orders(Utc::now() + Duration::seconds(5))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), stale.id());

    let listed = store.list_orders_for_customer(customer.id).await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn webhook_events_are_deduplicated() {
    let store = get_test_store().await;
    let parsed = ProviderEvent::parse(r#"{"id":"evt_pg_1","type":"payment_intent.succeeded"}"#)
        .unwrap();
    let event = WebhookEvent::received("stripe", &parsed, "{}", Some("t=1,v1=ab".to_string()));

    let inserts = futures_util::future::join_all(
        (0..4).map(|_| store.insert_event_if_absent(&event)),
    )
    .await;
    let inserted = inserts
        .iter()
        .filter(|r| matches!(r, Ok(EventInsert::Inserted)))
        .count();
    assert_eq!(inserted, 1);

    store.mark_event_failed("evt_pg_1", "order not found").await.unwrap();
    let cutoff = Utc::now() + Duration::seconds(5);
    let unprocessed = store.list_unprocessed_events(cutoff, 5).await.unwrap();
    assert_eq!(unprocessed.len(), 1);
    assert_eq!(unprocessed[0].error.as_deref(), Some("order not found"));
    assert_eq!(unprocessed[0].attempts, 1);
    assert!(store.list_unprocessed_events(cutoff, 1).await.unwrap().is_empty());

    store.mark_event_processed("evt_pg_1").await.unwrap();
    let stored = store.find_event("evt_pg_1").await.unwrap().unwrap();
    assert!(stored.processed);
    assert!(stored.processed_at.is_some());
    assert!(store.list_unprocessed_events(cutoff, 5).await.unwrap().is_empty());
}
