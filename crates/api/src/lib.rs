//! HTTP API server for the storefront backend.
//!
//! Exposes cart, checkout and order endpoints for signed-in customers and
//! the payment provider's webhook, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use fulfillment::{
    CartService, CheckoutOrchestrator, FulfillmentSettings, Notifier, OrderService,
    WebhookReconciler,
};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::PaymentGateway;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub carts: CartService<S>,
    pub checkout: CheckoutOrchestrator<S>,
    pub orders: OrderService<S>,
    pub webhooks: WebhookReconciler<S>,
}

impl<S: Store> AppState<S> {
    /// Wires every service to the same store, gateway and notifier.
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: FulfillmentSettings,
    ) -> Self {
        Self {
            carts: CartService::new(store.clone(), settings.clone()),
            checkout: CheckoutOrchestrator::new(store.clone(), Arc::clone(&gateway), settings),
            orders: OrderService::new(store.clone(), Arc::clone(&gateway)),
            webhooks: WebhookReconciler::new(store, gateway, notifier),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/checkout", post(routes::checkout::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{order_number}", get(routes::orders::get::<S>))
        .route("/payments/webhook", post(routes::webhook::receive::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Registers descriptions for the metrics the services emit.
pub fn describe_metrics() {
    metrics::describe_counter!("checkout_attempts_total", "Checkout requests received");
    metrics::describe_counter!("checkout_completed_total", "Checkouts that opened a payment session");
    metrics::describe_counter!("checkout_failures_total", "Failed checkouts by reason");
    metrics::describe_histogram!(
        "checkout_duration_seconds",
        metrics::Unit::Seconds,
        "Checkout latency"
    );
    metrics::describe_counter!(
        "inventory_reservations_total",
        "Stock reservation attempts by outcome"
    );
    metrics::describe_counter!("webhook_events_total", "Webhook deliveries by outcome");
    metrics::describe_counter!(
        "order_status_transitions_total",
        "Order status changes by target status"
    );
    metrics::describe_counter!(
        "pending_orders_released_total",
        "Stale pending orders cancelled by the sweeper"
    );
}
