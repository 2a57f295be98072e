//! Caller identity.
//!
//! Sessions are issued upstream; the session layer forwards the signed-in
//! customer's id in the `X-Customer-Id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::CustomerId;

use crate::error::ApiError;

/// Header carrying the authenticated customer id.
pub const CUSTOMER_HEADER: &str = "x-customer-id";

/// The authenticated customer making the request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentCustomer(pub CustomerId);

impl<S> FromRequestParts<S> for CurrentCustomer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CUSTOMER_HEADER)
            .ok_or(ApiError::Unauthorized("Missing X-Customer-Id header"))?;

        value
            .to_str()
            .ok()
            .and_then(|raw| CustomerId::parse_str(raw.trim()).ok())
            .map(CurrentCustomer)
            .ok_or(ApiError::Unauthorized("Malformed X-Customer-Id header"))
    }
}
