use thiserror::Error;

/// Errors returned by payment gateways.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The provider could not be reached or failed on its side. Retryable.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The provider refused the request.
    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The provider answered with something we could not read.
    #[error("Invalid response from payment provider: {0}")]
    InvalidResponse(String),
}

impl PaymentError {
    /// Returns true if retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::GatewayUnavailable(_))
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PaymentError::InvalidResponse(err.to_string())
        } else {
            PaymentError::GatewayUnavailable(err.to_string())
        }
    }
}

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;
