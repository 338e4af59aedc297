//! Error Types
//!
//! A `Rejection` is a client-side problem with a request: it carries the
//! machine-readable reason code the landing page switches on, plus a human
//! message. Vendor crates wrap it in their own error enums.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for request validation
pub type Result<T> = std::result::Result<T, Rejection>;

/// Which class of client error a rejection maps to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionKind {
    /// Malformed or incomplete request (400)
    BadRequest,

    /// Credential or token not accepted (401)
    Unauthorized,

    /// Payload too large (413)
    TooLarge,

    /// Content type not accepted (415)
    UnsupportedType,
}

/// A request rejected before any vendor call was made
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct Rejection {
    pub kind: RejectionKind,

    /// Stable reason code, e.g. `missing-token`
    pub reason: &'static str,

    /// Human readable message
    pub message: String,

    /// Extra fields merged into the error body (`allowed`, `max`, ...)
    pub details: Option<Value>,
}

impl Rejection {
    pub fn new(kind: RejectionKind, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            reason,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(reason: &'static str, message: impl Into<String>) -> Self {
        Self::new(RejectionKind::BadRequest, reason, message)
    }

    pub fn unauthorized(reason: &'static str, message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Unauthorized, reason, message)
    }

    /// Attach extra body fields
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
