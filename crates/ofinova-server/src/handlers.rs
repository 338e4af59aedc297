//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use ofinova_integrations::{IntegrationError, LeadRegistration, contract};
use ofinova_payments::{MailCheckoutRequest, Notification, RedirectUrls, plan_checkout, plan_mail_addon};

use crate::cors::allowed_methods;
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payments_configured: bool,
    pub leads_configured: bool,
    pub storage_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub lead_id: String,
    pub session_id: String,
    pub mode: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MailCheckoutResponse {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Parse a JSON body; an empty body reads as `{}`
fn json_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Object(serde_json::Map::new()))
            .map_err(|e| ApiError::bad_json(e.to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_json(e.to_string()))
}

/// `{ ok: true, ...fields }`
fn ok_body<T: Serialize>(fields: &T) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("ok".into(), Value::Bool(true));
    if let Ok(Value::Object(fields)) = serde_json::to_value(fields) {
        body.extend(fields);
    }
    Value::Object(body)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments_configured: state.checkout.is_some(),
        leads_configured: state.leads.is_some(),
        storage_configured: state.storage.is_some(),
    })
}

/// Method fallback shared by every route
pub async fn method_not_allowed(uri: Uri) -> ApiError {
    ApiError::method_not_allowed(allowed_methods(uri.path()))
}

/// Create or update a lead in Airtable
pub async fn airtable_upsert_register(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let registration: LeadRegistration = json_body(&body)?;
    let record = registration.validate()?;

    let leads = state.leads.as_ref().ok_or_else(ApiError::leads_disabled)?;

    let ids = leads.upsert(&record).await.map_err(|e| match e {
        IntegrationError::Upstream { status, body, .. } => ApiError::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            "airtable-error",
            "Airtable rejected the upsert",
        )
        .with_details(json!({
            "airtable_error": body,
            "hint": "Check base/table IDs and PAT scopes",
        })),
        other => other.into(),
    })?;

    Ok(Json(json!({ "ok": true, "upserted": ids })))
}

/// Create a contract Checkout Session
pub async fn create_checkout_session(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<CheckoutResponse>> {
    let body: Value = json_body(&body)?;
    let plan = plan_checkout(
        &body,
        &state.catalog,
        RedirectUrls::for_checkout(&state.config.app_base_url),
    )?;

    let gateway = state.checkout.as_ref().ok_or_else(ApiError::payments_disabled)?;
    let session = gateway.create_session(&plan.draft).await?;

    tracing::info!(
        lead_id = %plan.lead_id,
        session_id = %session.id,
        plan = %plan.normalized.plan,
        mode = plan.draft.mode.as_str(),
        "Checkout session created"
    );

    state
        .notifier
        .notify(Notification::checkout_created(&plan.normalized, &session));

    Ok(Json(CheckoutResponse {
        url: session.url,
        lead_id: plan.lead_id,
        session_id: session.id,
        mode: plan.draft.mode.as_str(),
    }))
}

/// Mail add-on subscription for an existing customer
pub async fn create_mail_checkout(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<MailCheckoutResponse>> {
    let request: MailCheckoutRequest = json_body(&body)?;
    let draft = plan_mail_addon(
        &request,
        &state.catalog,
        RedirectUrls::for_mail_addon(&state.config.site_url),
    )?;

    let gateway = state.checkout.as_ref().ok_or_else(ApiError::payments_disabled)?;
    let session = gateway.create_session(&draft).await?;

    tracing::info!(
        customer_id = ?draft.customer_id,
        session_id = %session.id,
        "Mail add-on checkout created"
    );

    Ok(Json(MailCheckoutResponse {
        url: session.url,
        session_id: session.id,
    }))
}

/// Browser-friendly hint for the contract endpoint
pub async fn contract_usage() -> &'static str {
    contract::USAGE_HINT
}

/// Render a contract and return or store the PDF
pub async fn generate_contract(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let body: Value = json_body(&body)?;
    let contracts = state
        .contracts
        .as_ref()
        .ok_or_else(|| ApiError::pdf_failed("contract templates are not loaded"))?;

    let delivery = contract::Delivery::parse(&body);
    let storage = match delivery {
        contract::Delivery::Storage => Some(state.storage.as_deref().ok_or_else(ApiError::storage_disabled)?),
        contract::Delivery::Download => None,
    };

    let pdf = contracts.generate(&body).await.map_err(|e| {
        tracing::error!("GEN_PDF_ERROR: {}", e);
        ApiError::pdf_failed(e.to_string())
    })?;

    match storage {
        None => {
            let filename = contract::attachment_name(chrono::Utc::now().timestamp_millis());
            let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
                .map_err(|e| ApiError::pdf_failed(e.to_string()))?;

            Ok((
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                pdf,
            )
                .into_response())
        }
        Some(storage) => {
            let stored = contracts.store(storage, &body, pdf).await.map_err(|e| {
                tracing::error!("GEN_PDF_ERROR: {}", e);
                ApiError::pdf_failed(e.to_string())
            })?;

            tracing::info!(bucket = %stored.bucket, path = %stored.path, "Contract stored");
            state.notifier.notify(Notification::new(
                "contract.generated",
                json!({
                    "email": body.get("email"),
                    "bucket": stored.bucket,
                    "path": stored.path,
                }),
            ));

            Ok(Json(json!({ "ok": true, "bucket": stored.bucket, "path": stored.path })).into_response())
        }
    }
}

/// Resolve a KYC token to its order
pub async fn kyc_verify(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> ApiResult<Json<Value>> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "missing-token", "token is required"))?;

    let order = state
        .kyc
        .verifier()
        .verify(&token)
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "invalid-token", "KYC token is not valid"))?;

    Ok(Json(ok_body(&order)))
}

/// Issue a signed upload for a KYC document
pub async fn kyc_sign_upload(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body: Value = serde_json::from_slice(&body).map_err(|e| ApiError::bad_json(e.to_string()))?;
    let pending = state.kyc.prepare_upload(&body)?;

    let storage = state.storage.as_deref().ok_or_else(ApiError::storage_disabled)?;
    let signed = state.kyc.sign(storage, pending).await.map_err(|e| {
        tracing::error!("Signed upload failed: {}", e);
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "sign-url-failed",
            "Could not create signed upload URL",
        )
        .with_details(json!({ "detail": e.to_string() }))
    })?;

    Ok(Json(ok_body(&signed)))
}

/// Stripe webhook receiver
pub async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Json<Value>> {
    let handler = state.webhook.as_ref().ok_or_else(ApiError::payments_disabled)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "missing-signature", "Missing Stripe signature"))?;

    let event = handler.parse_event(&body, signature).map_err(|e| {
        tracing::warn!("Webhook rejected: {}", e);
        ApiError::from(e)
    })?;

    handler.handle(&event);

    Ok(Json(json!({ "received": true })))
}
