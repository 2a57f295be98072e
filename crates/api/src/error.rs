//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use fulfillment::FulfillmentError;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The caller could not be identified.
    Unauthorized(&'static str),
    /// The request body could not be read as the expected JSON.
    InvalidBody(JsonRejection),
    /// Error raised by a fulfillment service.
    Fulfillment(FulfillmentError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub trace_id: String,
    pub timestamp: String,
}

struct Mapped {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl Mapped {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let trace_id = Uuid::new_v4().to_string();

        let mapped = match self {
            ApiError::Unauthorized(reason) => {
                Mapped::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", reason)
            }
            ApiError::InvalidBody(rejection) => body_rejection_to_response(rejection),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err, &trace_id),
        };

        let body = ErrorBody {
            status: mapped.status.as_u16(),
            error: mapped
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            code: mapped.code,
            message: mapped.message,
            details: mapped.details,
            trace_id,
            timestamp: Utc::now().to_rfc3339(),
        };
        (mapped.status, Json(body)).into_response()
    }
}

fn body_rejection_to_response(rejection: JsonRejection) -> Mapped {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => Mapped::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UNSUPPORTED_MEDIA_TYPE",
            "Expected a JSON request body",
        ),
        other => Mapped::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Request validation failed",
        )
        .with_details(json!({
            "fields": [{ "field": "body", "message": other.body_text() }]
        })),
    }
}

fn fulfillment_error_to_response(err: FulfillmentError, trace_id: &str) -> Mapped {
    let message = err.to_string();
    match err {
        FulfillmentError::CartEmpty => Mapped::new(StatusCode::BAD_REQUEST, "CART_EMPTY", message),
        FulfillmentError::InsufficientStock {
            product_id,
            requested,
            available,
        } => Mapped::new(StatusCode::CONFLICT, "INSUFFICIENT_STOCK", message).with_details(json!({
            "productId": product_id,
            "requested": requested,
            "available": available,
        })),
        FulfillmentError::ProductNotFound(_) => {
            Mapped::new(StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND", message)
        }
        FulfillmentError::CustomerNotFound(_) => {
            Mapped::new(StatusCode::NOT_FOUND, "CUSTOMER_NOT_FOUND", message)
        }
        FulfillmentError::OrderNotFound(_) => {
            Mapped::new(StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", message)
        }
        FulfillmentError::ItemNotInCart(_) => {
            Mapped::new(StatusCode::NOT_FOUND, "ITEM_NOT_IN_CART", message)
        }
        FulfillmentError::Validation(fields) => Mapped::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Request validation failed",
        )
        .with_details(json!({ "fields": fields })),
        FulfillmentError::InvalidQuantity(_) => Mapped::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Request validation failed",
        )
        .with_details(json!({
            "fields": [{ "field": "quantity", "message": "Quantity must be at least 1" }]
        })),
        FulfillmentError::InvalidStatusTransition { .. }
        | FulfillmentError::MissingPaymentReference(_) => {
            Mapped::new(StatusCode::CONFLICT, "INVALID_STATUS_TRANSITION", message)
        }
        FulfillmentError::GatewayUnavailable { order_number, .. } => {
            tracing::warn!(%trace_id, error = %message, "payment gateway unavailable");
            let mapped = Mapped::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "GATEWAY_UNAVAILABLE",
                "Payment provider is unavailable, please retry",
            );
            match order_number {
                Some(order_number) => mapped.with_details(json!({ "orderNumber": order_number })),
                None => mapped,
            }
        }
        FulfillmentError::PaymentRejected(_) => {
            tracing::warn!(%trace_id, error = %message, "payment provider rejected request");
            Mapped::new(
                StatusCode::BAD_GATEWAY,
                "PAYMENT_REJECTED",
                "Payment provider rejected the request",
            )
        }
        FulfillmentError::InvalidSignature => {
            Mapped::new(StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE", message)
        }
        FulfillmentError::InvalidPayload(_) => {
            Mapped::new(StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", message)
        }
        FulfillmentError::Store(_) => {
            tracing::error!(%trace_id, error = %message, "internal server error");
            Mapped::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An unexpected error occurred",
            )
        }
    }
}
