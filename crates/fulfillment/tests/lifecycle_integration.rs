//! Order queries, post-payment operations and background maintenance.

mod support;

use std::time::Duration;

use common::Money;
use domain::OrderStatus;
use fulfillment::{FulfillmentError, run_maintenance};
use store::OrderStore;
use support::{TestHarness, event, request};
use tokio::sync::watch;

async fn paid_order(h: &TestHarness, email: &str) -> (String, common::ProductId) {
    let customer = h.customer(email).await;
    let product = h.product("Argan oil", Money::from_units(100), 5).await;
    let receipt = h.place(customer, &[(product, 2)]).await;
    let intent = h.intent_of(&receipt.order_number).await;
    h.webhooks
        .handle(None, &event(&format!("evt_{email}"), "payment_intent.succeeded", &intent))
        .await
        .unwrap();
    (receipt.order_number, product)
}

#[tokio::test]
async fn test_customer_sees_only_own_orders_newest_first() {
    let h = TestHarness::new();
    let customer = h.customer("amal@example.com").await;
    let stranger = h.customer("stranger@example.com").await;
    let product = h.product("Argan oil", Money::from_units(100), 10).await;

    let first = h.place(customer, &[(product, 1)]).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h.place(customer, &[(product, 2)]).await;

    let orders = h.orders.list_for_customer(customer).await.unwrap();
    let numbers: Vec<String> = orders.iter().map(|o| o.order_number().to_string()).collect();
    assert_eq!(numbers, vec![second.order_number.clone(), first.order_number.clone()]);

    assert!(h.orders.list_for_customer(stranger).await.unwrap().is_empty());
    let hidden = h
        .orders
        .get_for_customer(stranger, &first.order_number)
        .await;
    assert!(matches!(hidden, Err(FulfillmentError::OrderNotFound(_))));

    let own = h
        .orders
        .get_for_customer(customer, &first.order_number)
        .await
        .unwrap();
    assert_eq!(own.total(), Money::from_units(130));
}

#[tokio::test]
async fn test_malformed_order_number_is_not_found() {
    let h = TestHarness::new();
    let customer = h.customer("amal@example.com").await;

    let result = h.orders.get_for_customer(customer, "not-an-order").await;
    assert!(matches!(result, Err(FulfillmentError::OrderNotFound(_))));
}

#[tokio::test]
async fn test_ship_paid_order() {
    let h = TestHarness::new();
    let (order_number, _) = paid_order(&h, "amal@example.com").await;

    let shipped = h
        .orders
        .mark_shipped(&order_number, "TRK-MA-0001")
        .await
        .unwrap();

    assert_eq!(shipped.status(), OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number(), Some("TRK-MA-0001"));
}

#[tokio::test]
async fn test_cannot_ship_unpaid_order() {
    let h = TestHarness::new();
    let customer = h.customer("amal@example.com").await;
    let product = h.product("Argan oil", Money::from_units(100), 5).await;
    let receipt = h.place(customer, &[(product, 1)]).await;

    let result = h.orders.mark_shipped(&receipt.order_number, "TRK-1").await;

    assert!(matches!(
        result,
        Err(FulfillmentError::InvalidStatusTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        })
    ));
}

#[tokio::test]
async fn test_refund_paid_order() {
    let h = TestHarness::new();
    let (order_number, _) = paid_order(&h, "amal@example.com").await;
    let intent = h.intent_of(&order_number).await;

    let refund = h.orders.refund(&order_number).await.unwrap();

    assert!(refund.refund_id.starts_with("refund_mock_"));
    assert_eq!(refund.amount, Money::from_units(230));
    assert_eq!(h.gateway.refunds(), vec![(intent, Money::from_units(230))]);
    assert_eq!(h.order(&order_number).await.status(), OrderStatus::Refunded);

    let again = h.orders.refund(&order_number).await;
    assert!(matches!(
        again,
        Err(FulfillmentError::InvalidStatusTransition { .. })
    ));
    assert_eq!(h.gateway.refunds().len(), 1);
}

#[tokio::test]
async fn test_failed_refund_keeps_order_paid() {
    let h = TestHarness::new();
    let (order_number, _) = paid_order(&h, "amal@example.com").await;
    h.gateway.set_fail_on_refund(true);

    let result = h.orders.refund(&order_number).await;

    assert!(matches!(
        result,
        Err(FulfillmentError::GatewayUnavailable { .. })
    ));
    assert_eq!(h.order(&order_number).await.status(), OrderStatus::Paid);
}

#[tokio::test]
async fn test_cancel_pending_order_releases_stock() {
    let h = TestHarness::new();
    let customer = h.customer("amal@example.com").await;
    let product = h.product("Argan oil", Money::from_units(100), 5).await;
    let receipt = h.place(customer, &[(product, 3)]).await;
    assert_eq!(h.stock(product).await, 2);

    let cancelled = h.orders.cancel(&receipt.order_number).await.unwrap();

    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert_eq!(h.stock(product).await, 5);

    let again = h.orders.cancel(&receipt.order_number).await;
    assert!(matches!(
        again,
        Err(FulfillmentError::InvalidStatusTransition { .. })
    ));
    assert_eq!(h.stock(product).await, 5);
}

#[tokio::test]
async fn test_cancel_confirmed_order_releases_stock() {
    let h = TestHarness::new();
    let customer = h.customer("amal@example.com").await;
    let product = h.product("Argan oil", Money::from_units(100), 5).await;
    let receipt = h.place(customer, &[(product, 2)]).await;
    let order = h.order(&receipt.order_number).await;
    h.store
        .update_order_status(order.id(), OrderStatus::Pending, OrderStatus::Confirmed)
        .await
        .unwrap();

    let cancelled = h.orders.cancel(&receipt.order_number).await.unwrap();

    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert_eq!(h.stock(product).await, 5);
}

#[tokio::test]
async fn test_sweeper_releases_orders_without_session() {
    let h = TestHarness::new();
    let customer = h.customer("amal@example.com").await;
    let product = h.product("Argan oil", Money::from_units(100), 5).await;
    h.carts.add_item(customer, product, 2).await.unwrap();

    h.gateway.set_fail_on_session(true);
    let failed = h.checkout.checkout(customer, request()).await;
    assert!(failed.is_err());
    h.gateway.set_fail_on_session(false);

    // An order with a live session is left alone
    let other = h.customer("other@example.com").await;
    let live = h.place(other, &[(product, 1)]).await;
    assert_eq!(h.stock(product).await, 2);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let released = h.sweeper.release_stale().await.unwrap();

    assert_eq!(released, 1);
    assert_eq!(h.stock(product).await, 4);
    assert_eq!(h.order(&live.order_number).await.status(), OrderStatus::Pending);
    assert_eq!(h.sweeper.release_stale().await.unwrap(), 0);
}

#[tokio::test]
async fn test_maintenance_task_stops_on_shutdown() {
    let h = TestHarness::new();
    let (tx, rx) = watch::channel(false);

    let task = tokio::spawn(run_maintenance(
        h.sweeper.clone(),
        h.webhooks.clone(),
        Duration::from_millis(10),
        rx,
    ));

    tokio::time::sleep(Duration::from_millis(30)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}
