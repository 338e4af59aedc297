//! Payment Error Types

use ofinova_core::Rejection;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Request rejected before reaching Stripe
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Message safe to show to the landing page
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Rejected(rejection) => rejection.message.clone(),
            // Vendor messages are passed through; they describe the bad parameter
            PaymentError::Stripe(msg) => msg.clone(),
            PaymentError::WebhookSignature(_) => "Webhook signature verification failed".into(),
            PaymentError::WebhookParse(_) => "Webhook payload could not be parsed".into(),
            PaymentError::Config(_) => "Service configuration error.".into(),
        }
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        PaymentError::Stripe(err.to_string())
    }
}
