//! Payment gateway that never leaves the process.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::Money;
use uuid::Uuid;

use crate::{PaymentError, PaymentSession, RefundResult, Result, SessionRequest, gateway::PaymentGateway};

#[derive(Debug, Default)]
struct MockGatewayState {
    sessions: Vec<SessionRequest>,
    refunds: Vec<(String, Money)>,
    fail_on_session: bool,
    fail_on_refund: bool,
    reject_webhooks: bool,
}

/// Mock gateway: always succeeds, always verifies, fabricates identifiers.
///
/// Failure switches let tests drive the error paths.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentGateway {
    state: Arc<RwLock<MockGatewayState>>,
}

impl MockPaymentGateway {
    /// Creates a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes session creation fail with `GatewayUnavailable`.
    pub fn set_fail_on_session(&self, fail: bool) {
        self.write(|state| state.fail_on_session = fail);
    }

    /// Makes refunds fail with `GatewayUnavailable`.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.write(|state| state.fail_on_refund = fail);
    }

    /// Makes webhook verification fail.
    pub fn set_reject_webhooks(&self, reject: bool) {
        self.write(|state| state.reject_webhooks = reject);
    }

    /// Returns the number of sessions opened.
    pub fn session_count(&self) -> usize {
        self.read(|state| state.sessions.len())
    }

    /// Returns the most recent session request.
    pub fn last_session(&self) -> Option<SessionRequest> {
        self.read(|state| state.sessions.last().cloned())
    }

    /// Returns the refunds issued as (payment intent, amount) pairs.
    pub fn refunds(&self) -> Vec<(String, Money)> {
        self.read(|state| state.refunds.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&MockGatewayState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut MockGatewayState) -> T) -> T {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<PaymentSession> {
        self.write(|state| {
            if state.fail_on_session {
                return Err(PaymentError::GatewayUnavailable(
                    "mock gateway is down".to_string(),
                ));
            }
            state.sessions.push(request.clone());

            Ok(PaymentSession {
                session_id: format!("mock_session_{}", Uuid::new_v4()),
                payment_intent_id: Some(format!("pi_mock_{}", Uuid::new_v4())),
                checkout_url: format!("{}?mock=true", request.success_url),
                status: "pending".to_string(),
            })
        })
    }

    fn verify_webhook(&self, _signature: Option<&str>, _payload: &str) -> bool {
        self.read(|state| !state.reject_webhooks)
    }

    async fn refund(&self, payment_intent_id: &str, amount: Money) -> Result<RefundResult> {
        self.write(|state| {
            if state.fail_on_refund {
                return Err(PaymentError::GatewayUnavailable(
                    "mock gateway is down".to_string(),
                ));
            }
            state.refunds.push((payment_intent_id.to_string(), amount));

            Ok(RefundResult {
                refund_id: format!("refund_mock_{}", Uuid::new_v4()),
                status: "succeeded".to_string(),
                amount,
                reason: Some("requested_by_customer".to_string()),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SessionRequest {
        SessionRequest {
            order_reference: "ORD-2026-000042".to_string(),
            amount: Money::from_units(230),
            currency: "MAD".to_string(),
            success_url: "http://localhost:5173/orders/ORD-2026-000042/success".to_string(),
            cancel_url: "http://localhost:5173/checkout".to_string(),
        }
    }

    #[tokio::test]
    async fn test_session_identifiers() {
        let gateway = MockPaymentGateway::new();
        let session = gateway.create_checkout_session(&request()).await.unwrap();

        assert!(session.session_id.starts_with("mock_session_"));
        assert!(session.payment_intent_id.unwrap().starts_with("pi_mock_"));
        assert_eq!(
            session.checkout_url,
            "http://localhost:5173/orders/ORD-2026-000042/success?mock=true"
        );
        assert_eq!(session.status, "pending");
        assert_eq!(gateway.session_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_session() {
        let gateway = MockPaymentGateway::new();
        gateway.set_fail_on_session(true);

        let err = gateway.create_checkout_session(&request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(gateway.session_count(), 0);
    }

    #[tokio::test]
    async fn test_refund() {
        let gateway = MockPaymentGateway::new();
        let refund = gateway.refund("pi_mock_1", Money::from_units(230)).await.unwrap();

        assert!(refund.refund_id.starts_with("refund_mock_"));
        assert_eq!(refund.status, "succeeded");
        assert_eq!(refund.reason.as_deref(), Some("requested_by_customer"));
        assert_eq!(gateway.refunds(), vec![("pi_mock_1".to_string(), Money::from_units(230))]);
    }

    #[test]
    fn test_verifies_everything_unless_told_otherwise() {
        let gateway = MockPaymentGateway::new();
        assert!(gateway.verify_webhook(None, "{}"));

        gateway.set_reject_webhooks(true);
        assert!(!gateway.verify_webhook(Some("t=1,v1=00"), "{}"));
    }
}
