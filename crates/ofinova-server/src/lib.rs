//! # ofinova-server
//!
//! One axum process serving the landing page's API routes. Every request is
//! independent; vendors that are not configured answer 503 instead of
//! failing startup.

pub mod config;
mod cors;
pub mod error;
mod handlers;
pub mod state;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use cors::ROUTE_METHODS;
pub use error::ApiError;
pub use state::AppState;

use crate::handlers::{
    airtable_upsert_register, contract_usage, create_checkout_session, create_mail_checkout,
    generate_contract, health_check, kyc_sign_upload, kyc_verify, method_not_allowed, stripe_webhook,
};

/// Build the router
pub fn app(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_check).fallback(method_not_allowed))
        // Leads
        .route(
            "/api/airtable-upsert-register",
            post(airtable_upsert_register).fallback(method_not_allowed),
        )
        // Payments
        .route(
            "/api/create-checkout-session",
            post(create_checkout_session).fallback(method_not_allowed),
        )
        .route(
            "/api/create-mail-checkout",
            post(create_mail_checkout).fallback(method_not_allowed),
        )
        .route("/api/webhook", post(stripe_webhook).fallback(method_not_allowed))
        // Contracts
        .route(
            "/api/contracts/generate",
            get(contract_usage)
                .post(generate_contract)
                .fallback(method_not_allowed),
        )
        // KYC
        .route("/api/kyc/verify", get(kyc_verify).fallback(method_not_allowed))
        .route("/api/kyc/sign-upload", post(kyc_sign_upload).fallback(method_not_allowed))
        .layer(from_fn_with_state(state.cors.clone(), cors::cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
