//! Stripe gateway against a local fake of the Stripe HTTP API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use common::Money;
use payments::{PaymentError, PaymentGateway, SessionRequest, StripeConfig, StripePaymentGateway};
use secrecy::SecretString;
use serde_json::{Value, json};

type Captured = Arc<Mutex<Vec<(HeaderMap, HashMap<String, String>)>>>;

async fn create_session(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Json<Value> {
    captured.lock().unwrap().push((headers, params));
    Json(json!({
        "id": "cs_test_a1",
        "url": "https://checkout.stripe.com/c/pay/cs_test_a1",
        "payment_intent": null,
        "status": "open"
    }))
}

async fn create_refund(Form(params): Form<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "id": "re_test_1",
        "status": "succeeded",
        "amount": params["amount"].parse::<i64>().unwrap(),
        "reason": "requested_by_customer"
    }))
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

fn gateway(api_base: String) -> StripePaymentGateway {
    StripePaymentGateway::new(StripeConfig {
        secret_key: SecretString::from("sk_test_fake"),
        webhook_secret: SecretString::from("whsec_fake"),
        api_base,
    })
    .unwrap()
}

fn request() -> SessionRequest {
    SessionRequest {
        order_reference: "ORD-2026-004242".to_string(),
        amount: Money::from_units(230),
        currency: "MAD".to_string(),
        success_url: "http://shop.test/orders/ORD-2026-004242/success".to_string(),
        cancel_url: "http://shop.test/checkout".to_string(),
    }
}

#[tokio::test]
async fn creates_checkout_session() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/v1/checkout/sessions", post(create_session))
        .with_state(captured.clone());
    let gateway = gateway(spawn(app).await);

    let session = gateway.create_checkout_session(&request()).await.unwrap();
    assert_eq!(session.session_id, "cs_test_a1");
    assert_eq!(session.checkout_url, "https://checkout.stripe.com/c/pay/cs_test_a1");
    assert!(session.payment_intent_id.is_none());
    assert_eq!(session.status, "open");

    let captured = captured.lock().unwrap();
    let (headers, params) = &captured[0];
    assert_eq!(headers["authorization"], "Bearer sk_test_fake");
    assert_eq!(headers["idempotency-key"], "checkout-ORD-2026-004242");
    assert_eq!(params["mode"], "payment");
    assert_eq!(params["line_items[0][price_data][unit_amount]"], "23000");
    assert_eq!(params["line_items[0][price_data][currency]"], "mad");
    assert_eq!(params["client_reference_id"], "ORD-2026-004242");
}

#[tokio::test]
async fn refunds_full_amount() {
    let app = Router::new().route("/v1/refunds", post(create_refund));
    let gateway = gateway(spawn(app).await);

    let refund = gateway
        .refund("pi_test_1", Money::from_units(230))
        .await
        .unwrap();
    assert_eq!(refund.refund_id, "re_test_1");
    assert_eq!(refund.amount, Money::from_units(230));
    assert_eq!(refund.reason.as_deref(), Some("requested_by_customer"));
}

#[tokio::test]
async fn server_errors_are_unavailable() {
    let app = Router::new().route(
        "/v1/checkout/sessions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    );
    let gateway = gateway(spawn(app).await);

    let err = gateway.create_checkout_session(&request()).await.unwrap_err();
    assert!(matches!(err, PaymentError::GatewayUnavailable(_)));
}

#[tokio::test]
async fn client_errors_are_rejections() {
    let app = Router::new().route(
        "/v1/checkout/sessions",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "message": "Invalid currency: xyz" } })),
            )
        }),
    );
    let gateway = gateway(spawn(app).await);

    let err = gateway.create_checkout_session(&request()).await.unwrap_err();
    match err {
        PaymentError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid currency: xyz");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_provider_is_unavailable() {
    let gateway = gateway("http://127.0.0.1:9".to_string());
    let err = gateway.create_checkout_session(&request()).await.unwrap_err();
    assert!(err.is_retryable());
}
