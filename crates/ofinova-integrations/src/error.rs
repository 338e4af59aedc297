//! Error Types

use ofinova_core::Rejection;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for integration calls
pub type Result<T> = std::result::Result<T, IntegrationError>;

#[derive(Error, Debug)]
pub enum IntegrationError {
    /// Request rejected before reaching the vendor
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Vendor answered with a non-success status
    #[error("{service} returned {status}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: Value,
    },

    /// Vendor answered 2xx but the body was not what we expected
    #[error("{service} response invalid: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("Template error: {0}")]
    Template(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<handlebars::TemplateError> for IntegrationError {
    fn from(err: handlebars::TemplateError) -> Self {
        IntegrationError::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for IntegrationError {
    fn from(err: handlebars::RenderError) -> Self {
        IntegrationError::Template(err.to_string())
    }
}
