//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use store::Store;

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the provider's signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /payments/webhook — receive a provider event.
///
/// Duplicate and unmatched events are still acknowledged so the provider
/// stops redelivering them.
pub async fn receive<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: String,
) -> Result<&'static str, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.webhooks.handle(signature, &payload).await?;
    tracing::debug!(outcome = outcome.as_str(), "webhook acknowledged");
    Ok("Webhook received")
}
