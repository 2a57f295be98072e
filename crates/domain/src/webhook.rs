//! Payment-provider webhook notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while reading a provider payload.
#[derive(Debug, Error)]
pub enum WebhookParseError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Payload is missing field `{0}`")]
    MissingField(&'static str),
}

/// What an event means for the order it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Payment settled; the order may become `PAID`.
    PaymentSucceeded,
    /// Payment was declined; the order should be cancelled.
    PaymentFailed,
    /// Recorded but not acted upon.
    Other,
}

impl EventKind {
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" | "checkout.session.completed" => Self::PaymentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentFailed,
            _ => Self::Other,
        }
    }
}

/// The parts of a provider event the reconciler acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub event_id: String,
    pub event_type: String,
    pub kind: EventKind,
    /// Candidate order references, most specific first: the payment intent
    /// (`data.object.payment_intent`) then the object id (`data.object.id`).
    pub payment_references: Vec<String>,
}

impl ProviderEvent {
    /// Reads the event id, type and payment references from a raw payload.
    pub fn parse(payload: &str) -> Result<Self, WebhookParseError> {
        let json: Value = serde_json::from_str(payload)?;

        let event_id = non_empty_str(&json["id"]).ok_or(WebhookParseError::MissingField("id"))?;
        let event_type =
            non_empty_str(&json["type"]).ok_or(WebhookParseError::MissingField("type"))?;

        let object = &json["data"]["object"];
        let mut payment_references = Vec::with_capacity(2);
        for candidate in [&object["payment_intent"], &object["id"]] {
            if let Some(reference) = non_empty_str(candidate)
                && !payment_references.contains(&reference)
            {
                payment_references.push(reference);
            }
        }

        Ok(Self {
            kind: EventKind::from_event_type(&event_type),
            event_id,
            event_type,
            payment_references,
        })
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A stored webhook delivery.
///
/// `event_id` is unique across all stored events; a second delivery with
/// the same id is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub signature: Option<String>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Failed attempts to apply the event.
    pub attempts: u32,
    pub received_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Creates an unprocessed record for a verified delivery.
    pub fn received(
        provider: impl Into<String>,
        event: &ProviderEvent,
        payload: impl Into<String>,
        signature: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            payload: payload.into(),
            signature,
            processed: false,
            processed_at: None,
            error: None,
            attempts: 0,
            received_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_session_completed() {
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_123", "payment_intent": "pi_123" } }
        })
        .to_string();

        let event = ProviderEvent::parse(&payload).unwrap();
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.kind, EventKind::PaymentSucceeded);
        assert_eq!(event.payment_references, ["pi_123", "cs_123"]);
    }

    #[test]
    fn test_parse_falls_back_to_object_id() {
        let payload = json!({
            "id": "evt_2",
            "type": "payment_intent.payment_failed",
            "data": { "object": { "id": "pi_456", "payment_intent": null } }
        })
        .to_string();

        let event = ProviderEvent::parse(&payload).unwrap();
        assert_eq!(event.kind, EventKind::PaymentFailed);
        assert_eq!(event.payment_references, ["pi_456"]);
    }

    #[test]
    fn test_unknown_type_is_other() {
        let payload = json!({ "id": "evt_3", "type": "customer.created", "data": {} }).to_string();
        let event = ProviderEvent::parse(&payload).unwrap();
        assert_eq!(event.kind, EventKind::Other);
        assert!(event.payment_references.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ProviderEvent::parse("not json"),
            Err(WebhookParseError::InvalidJson(_))
        ));
        assert!(matches!(
            ProviderEvent::parse(r#"{"type":"x"}"#),
            Err(WebhookParseError::MissingField("id"))
        ));
        assert!(matches!(
            ProviderEvent::parse(r#"{"id":"evt","type":""}"#),
            Err(WebhookParseError::MissingField("type"))
        ));
    }

    #[test]
    fn test_received_event_is_unprocessed() {
        let event = ProviderEvent::parse(r#"{"id":"evt_9","type":"x"}"#).unwrap();
        let stored = WebhookEvent::received("stripe", &event, "{}", Some("sig".to_string()));
        assert!(!stored.processed);
        assert!(stored.processed_at.is_none());
        assert_eq!(stored.event_id, "evt_9");
    }
}
