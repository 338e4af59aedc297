//! API Error Responses
//!
//! Every failure leaves the server as `{ ok: false, reason, error, ...details }`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use ofinova_core::{Rejection, RejectionKind};
use ofinova_integrations::IntegrationError;
use ofinova_payments::PaymentError;

/// Error returned by every handler
#[derive(Error, Debug)]
#[error("{reason}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub reason: &'static str,
    pub message: String,
    pub details: Option<Value>,
    allow: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
            details: None,
            allow: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn method_not_allowed(allow: &'static str) -> Self {
        let mut err = Self::new(StatusCode::METHOD_NOT_ALLOWED, "method-not-allowed", "Method not allowed");
        err.allow = Some(allow);
        err
    }

    pub fn bad_json(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad-json", message)
    }

    pub fn payments_disabled() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "payments-disabled", "Payments not configured")
    }

    pub fn leads_disabled() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "leads-disabled", "Lead storage not configured")
    }

    pub fn storage_disabled() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "storage-disabled", "File storage not configured")
    }

    /// `{ error: "GEN_PDF_ERROR", message }`
    pub fn pdf_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "GEN_PDF_ERROR", "GEN_PDF_ERROR")
            .with_details(json!({ "message": message.into() }))
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        let status = match rejection.kind {
            RejectionKind::BadRequest => StatusCode::BAD_REQUEST,
            RejectionKind::Unauthorized => StatusCode::UNAUTHORIZED,
            RejectionKind::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RejectionKind::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        };
        Self {
            status,
            reason: rejection.reason,
            message: rejection.message,
            details: rejection.details,
            allow: None,
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Rejected(rejection) => rejection.into(),
            PaymentError::WebhookSignature(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid-signature", err.user_message())
            }
            PaymentError::WebhookParse(_) => Self::bad_json(err.user_message()),
            PaymentError::Stripe(_) => {
                tracing::error!("Stripe error: {}", err);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "stripe-error", err.user_message())
            }
            PaymentError::Config(_) => {
                tracing::error!("Payment configuration error: {}", err);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "config-error", err.user_message())
            }
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::Rejected(rejection) => rejection.into(),
            IntegrationError::Upstream { service, status, body } => {
                tracing::warn!(service, status, "Upstream request failed");
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                Self::new(status, "upstream-error", format!("{service} request failed"))
                    .with_details(json!({ "detail": body }))
            }
            other => {
                tracing::error!("Integration error: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal-error", other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "ok": false,
            "reason": self.reason,
            "error": self.message,
        });
        if let (Some(Value::Object(details)), Some(target)) = (self.details, body.as_object_mut()) {
            target.extend(details);
        }

        let mut response = (self.status, Json(body)).into_response();
        if let Some(allow) = self.allow {
            response.headers_mut().insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}
