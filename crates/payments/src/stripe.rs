//! Stripe Checkout gateway.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::Money;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{
    PaymentError, PaymentSession, RefundResult, Result, SessionRequest,
    gateway::PaymentGateway,
    signature::{self, DEFAULT_TOLERANCE_SECS},
};

/// Stripe API base URL.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Credentials and endpoint for the Stripe gateway.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
    payment_intent: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
    amount: i64,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Live gateway backed by the Stripe HTTP API.
#[derive(Clone)]
pub struct StripePaymentGateway {
    client: Client,
    config: StripeConfig,
}

impl std::fmt::Debug for StripePaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripePaymentGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StripePaymentGateway {
    /// Create a new Stripe gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: StripeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: &str,
    ) -> Result<Response> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.config.secret_key.expose_secret())
            .header("Idempotency-Key", idempotency_key)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| status.to_string());

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(%status, %message, "Stripe unavailable");
            Err(PaymentError::GatewayUnavailable(message))
        } else {
            warn!(%status, %message, "Stripe rejected request");
            Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    fn provider(&self) -> &'static str {
        "stripe"
    }

    #[instrument(skip(self, request), fields(order = %request.order_reference))]
    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<PaymentSession> {
        let params = vec![
            param("mode", "payment"),
            param("payment_method_types[0]", "card"),
            param("success_url", &request.success_url),
            param("cancel_url", &request.cancel_url),
            param("client_reference_id", &request.order_reference),
            param("metadata[order_number]", &request.order_reference),
            param("line_items[0][quantity]", "1"),
            param(
                "line_items[0][price_data][currency]",
                request.currency.to_lowercase(),
            ),
            param(
                "line_items[0][price_data][unit_amount]",
                request.amount.cents().to_string(),
            ),
            param(
                "line_items[0][price_data][product_data][name]",
                format!("Order #{}", request.order_reference),
            ),
        ];

        let idempotency_key = format!("checkout-{}", request.order_reference);
        let session: CheckoutSessionResponse = self
            .post_form("/v1/checkout/sessions", &params, &idempotency_key)
            .await?
            .json()
            .await?;

        let checkout_url = session.url.ok_or_else(|| {
            PaymentError::InvalidResponse("checkout session has no url".to_string())
        })?;

        debug!(session_id = %session.id, "Stripe checkout session created");

        Ok(PaymentSession {
            session_id: session.id,
            payment_intent_id: session.payment_intent,
            checkout_url,
            status: session.status.unwrap_or_else(|| "pending".to_string()),
        })
    }

    fn verify_webhook(&self, signature: Option<&str>, payload: &str) -> bool {
        let Some(header) = signature else {
            debug!("webhook has no signature header");
            return false;
        };

        match signature::verify(
            self.config.webhook_secret.expose_secret().as_bytes(),
            header,
            payload,
            Utc::now().timestamp(),
            DEFAULT_TOLERANCE_SECS,
        ) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "webhook signature rejected");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn refund(&self, payment_intent_id: &str, amount: Money) -> Result<RefundResult> {
        let params = vec![
            param("payment_intent", payment_intent_id),
            param("amount", amount.cents().to_string()),
            param("reason", "requested_by_customer"),
        ];

        let idempotency_key = format!("refund-{payment_intent_id}");
        let refund: RefundResponse = self
            .post_form("/v1/refunds", &params, &idempotency_key)
            .await?
            .json()
            .await?;

        Ok(RefundResult {
            refund_id: refund.id,
            status: refund.status,
            amount: Money::from_cents(refund.amount),
            reason: refund.reason,
        })
    }
}
