//! Shared harness for fulfillment integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use common::{CustomerId, Money, ProductId};
use domain::{Customer, Order, OrderNumber, Product, ShippingAddress};
use fulfillment::{
    CartService, CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest, FulfillmentSettings,
    InMemoryNotifier, OrderService, PendingOrderSweeper, WebhookReconciler,
};
use payments::MockPaymentGateway;
use serde_json::json;
use store::{InMemoryStore, InventoryLedger, OrderStore};

pub struct TestHarness {
    pub store: InMemoryStore,
    pub gateway: MockPaymentGateway,
    pub notifier: InMemoryNotifier,
    pub carts: CartService<InMemoryStore>,
    pub checkout: CheckoutOrchestrator<InMemoryStore>,
    pub webhooks: WebhookReconciler<InMemoryStore>,
    pub orders: OrderService<InMemoryStore>,
    pub sweeper: PendingOrderSweeper<InMemoryStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let gateway = MockPaymentGateway::new();
        let notifier = InMemoryNotifier::new();
        let settings = FulfillmentSettings::default();

        Self {
            carts: CartService::new(store.clone(), settings.clone()),
            checkout: CheckoutOrchestrator::new(
                store.clone(),
                Arc::new(gateway.clone()),
                settings,
            ),
            webhooks: WebhookReconciler::new(
                store.clone(),
                Arc::new(gateway.clone()),
                Arc::new(notifier.clone()),
            ),
            orders: OrderService::new(store.clone(), Arc::new(gateway.clone())),
            sweeper: PendingOrderSweeper::new(store.clone(), chrono::Duration::zero()),
            store,
            gateway,
            notifier,
        }
    }

    pub async fn customer(&self, email: &str) -> CustomerId {
        let customer = Customer::new(email, "Test Customer").with_address(address());
        let id = customer.id;
        self.store.insert_customer(customer).await;
        id
    }

    pub async fn product(&self, name: &str, price: Money, stock: u32) -> ProductId {
        let sku = format!("SKU-{}", name.to_uppercase().replace(' ', "-"));
        let product = Product::new(name, sku, price, stock);
        let id = product.id;
        self.store.insert_product(product).await;
        id
    }

    pub async fn stock(&self, product_id: ProductId) -> u32 {
        self.store.available(product_id).await.unwrap()
    }

    /// Fills the customer's cart and checks it out.
    pub async fn place(
        &self,
        customer_id: CustomerId,
        items: &[(ProductId, u32)],
    ) -> CheckoutReceipt {
        for &(product_id, quantity) in items {
            self.carts
                .add_item(customer_id, product_id, quantity)
                .await
                .unwrap();
        }
        self.checkout
            .checkout(customer_id, request())
            .await
            .unwrap()
    }

    pub async fn order(&self, order_number: &str) -> Order {
        self.store
            .find_order_by_number(&OrderNumber::parse(order_number).unwrap())
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn intent_of(&self, order_number: &str) -> String {
        self.order(order_number)
            .await
            .payment_intent_id()
            .unwrap()
            .to_string()
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Salma Idrissi".to_string(),
        phone: "+212611223344".to_string(),
        line1: "7 Avenue Hassan II".to_string(),
        line2: Some("Apt 3".to_string()),
        city: "Casablanca".to_string(),
        region: "Casablanca-Settat".to_string(),
        postal_code: "20250".to_string(),
        country: "MA".to_string(),
    }
}

pub fn request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: address(),
        payment_method: "card".to_string(),
        notes: Some("Leave with the concierge".to_string()),
    }
}

pub fn event(event_id: &str, event_type: &str, intent: &str) -> String {
    json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": { "id": intent, "object": "payment_intent" } }
    })
    .to_string()
}
