use async_trait::async_trait;
use common::Money;
use serde::Serialize;

use crate::Result;

/// Parameters for opening a hosted checkout session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Merchant-side reference, the order number.
    pub order_reference: String,
    pub amount: Money,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A checkout session opened with the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSession {
    pub session_id: String,
    /// Not every provider assigns a payment intent at session creation.
    pub payment_intent_id: Option<String>,
    /// Where the customer is sent to pay.
    pub checkout_url: String,
    pub status: String,
}

/// Outcome of a refund request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub status: String,
    pub amount: Money,
    pub reason: Option<String>,
}

/// Trait for payment provider operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name recorded on orders and webhook events.
    fn provider(&self) -> &'static str;

    /// Opens a hosted checkout session.
    ///
    /// Provider or network failures surface as `GatewayUnavailable`.
    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<PaymentSession>;

    /// Checks that a webhook payload was signed by the provider.
    ///
    /// Returns false when the signature is absent or does not match.
    fn verify_webhook(&self, signature: Option<&str>, payload: &str) -> bool;

    /// Refunds `amount` of a settled payment.
    async fn refund(&self, payment_intent_id: &str, amount: Money) -> Result<RefundResult>;
}
