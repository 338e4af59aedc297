//! CORS Middleware
//!
//! The landing page is served from several hosts (custom domain, Framer
//! previews, Vercel). An allowed `Origin` is echoed back; anything else gets
//! the default origin so the browser rejects the call. `OPTIONS` preflights
//! are answered here and never reach the handlers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use ofinova_core::OriginPolicy;

pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, Stripe-Signature";
pub const MAX_AGE_SECS: &str = "86400";

const DEFAULT_METHODS: &str = "GET, POST, OPTIONS";

/// Methods each route answers, as sent in `Allow` and `Access-Control-Allow-Methods`
pub const ROUTE_METHODS: &[(&str, &str)] = &[
    ("/health", "GET, OPTIONS"),
    ("/api/airtable-upsert-register", "POST, OPTIONS"),
    ("/api/create-checkout-session", "POST, OPTIONS"),
    ("/api/create-mail-checkout", "POST, OPTIONS"),
    ("/api/contracts/generate", "GET, POST, OPTIONS"),
    ("/api/kyc/sign-upload", "POST, OPTIONS"),
    ("/api/kyc/verify", "GET, OPTIONS"),
    ("/api/webhook", "POST, OPTIONS"),
];

pub fn allowed_methods(path: &str) -> &'static str {
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
    ROUTE_METHODS
        .iter()
        .find(|(route, _)| *route == path)
        .map_or(DEFAULT_METHODS, |(_, methods)| methods)
}

fn apply_headers(headers: &mut HeaderMap, origin: &str, methods: &'static str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(methods));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
}

pub async fn cors_middleware(State(policy): State<Arc<OriginPolicy>>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let allow_origin = policy.resolve(origin.as_deref());
    let methods = allowed_methods(req.uri().path());

    let mut resp = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };

    if let Some(origin) = origin.as_deref().filter(|o| !policy.is_allowed(o)) {
        tracing::debug!(origin = %origin, fallback = %allow_origin, "Origin not in allowlist");
    }

    apply_headers(resp.headers_mut(), &allow_origin, methods);
    resp
}
