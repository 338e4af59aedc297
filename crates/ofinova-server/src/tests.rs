use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use ofinova_core::{MailPlan, PlanTerm};
use ofinova_integrations::{
    ContractRenderer, ContractService, IntegrationError, LeadRecord, LeadStore, ObjectStorage, PdfPrinter,
};
use ofinova_payments::{
    AutomationNotifier, CheckoutGateway, CreatedSession, NotifierConfig, PaymentError, PriceCatalog, SessionDraft,
    WebhookHandler, sign_payload,
};

use crate::{AppState, ServerConfig, app};

const WEBHOOK_SECRET: &str = "whsec_test123secret456";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeGateway {
    drafts: Mutex<Vec<SessionDraft>>,
}

#[async_trait]
impl CheckoutGateway for FakeGateway {
    async fn create_session(&self, draft: &SessionDraft) -> ofinova_payments::Result<CreatedSession> {
        let mut drafts = self.drafts.lock().unwrap();
        drafts.push(draft.clone());
        let id = format!("cs_test_{}", drafts.len());
        Ok(CreatedSession {
            url: format!("https://checkout.stripe.com/c/pay/{id}"),
            id,
        })
    }
}

/// Gateway that fails the way Stripe does for a bad parameter
struct DecliningGateway;

#[async_trait]
impl CheckoutGateway for DecliningGateway {
    async fn create_session(&self, _draft: &SessionDraft) -> ofinova_payments::Result<CreatedSession> {
        Err(PaymentError::Stripe("No such price: 'price_domi_17'".into()))
    }
}

#[derive(Default)]
struct FakeLeads {
    upserted: Mutex<Vec<LeadRecord>>,
    reject: bool,
}

#[async_trait]
impl LeadStore for FakeLeads {
    async fn upsert(&self, record: &LeadRecord) -> ofinova_integrations::Result<Vec<String>> {
        if self.reject {
            return Err(IntegrationError::Upstream {
                service: "airtable",
                status: 422,
                body: json!({ "error": { "type": "INVALID_PERMISSIONS" } }),
            });
        }
        self.upserted.lock().unwrap().push(record.clone());
        Ok(vec!["rec1".into()])
    }
}

#[derive(Default)]
struct FakeStorage {
    signed: Mutex<Vec<(String, String)>>,
    uploaded: Mutex<Vec<(String, String)>>,
    fail_signing: bool,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn create_signed_upload(&self, bucket: &str, path: &str) -> ofinova_integrations::Result<String> {
        if self.fail_signing {
            return Err(IntegrationError::Upstream {
                service: "supabase",
                status: 400,
                body: json!({ "error": "Bucket not found" }),
            });
        }
        self.signed.lock().unwrap().push((bucket.into(), path.into()));
        Ok("upload-token".into())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> ofinova_integrations::Result<String> {
        self.uploaded.lock().unwrap().push((bucket.into(), path.into()));
        Ok(format!("{bucket}/{path}"))
    }
}

struct EchoPrinter;

#[async_trait]
impl PdfPrinter for EchoPrinter {
    async fn print(&self, html: &str) -> ofinova_integrations::Result<Vec<u8>> {
        Ok(html.as_bytes().to_vec())
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    state: AppState,
    gateway: Arc<FakeGateway>,
    leads: Arc<FakeLeads>,
    storage: Arc<FakeStorage>,
}

fn fixture() -> Fixture {
    let gateway = Arc::new(FakeGateway::default());
    let leads = Arc::new(FakeLeads::default());
    let storage = Arc::new(FakeStorage::default());

    let checkout: Arc<dyn CheckoutGateway> = gateway.clone();
    let lead_store: Arc<dyn LeadStore> = leads.clone();
    let object_storage: Arc<dyn ObjectStorage> = storage.clone();

    let mut state = AppState::new(ServerConfig::default());
    state.checkout = Some(checkout);
    state.catalog = Arc::new(
        PriceCatalog::default()
            .with_monthly_price(PlanTerm::P12, "price_domi_17")
            .with_mail_price(MailPlan::Lite, "price_mail_lite")
            .with_tax_rate(Some("txr_test".into())),
    );
    state.webhook = Some(Arc::new(WebhookHandler::new(WEBHOOK_SECRET)));
    state.leads = Some(lead_store);
    state.storage = Some(object_storage);
    state.contracts = Some(Arc::new(ContractService::new(
        ContractRenderer::new(None).unwrap(),
        Arc::new(EchoPrinter),
        "contracts",
    )));

    Fixture {
        state,
        gateway,
        leads,
        storage,
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Routing & CORS
// ============================================================================

#[tokio::test]
async fn test_post_routes_reject_other_methods() {
    for path in [
        "/api/airtable-upsert-register",
        "/api/create-checkout-session",
        "/api/create-mail-checkout",
        "/api/kyc/sign-upload",
        "/api/webhook",
    ] {
        let (status, headers, body) = send(app(fixture().state), get(path)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{path}");
        assert_eq!(body["ok"], false);
        assert_eq!(body["reason"], "method-not-allowed");
        let allow = headers[header::ALLOW].to_str().unwrap();
        assert!(allow.contains("POST"), "{path}: {allow}");
    }

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/kyc/verify")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app(fixture().state), request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["reason"], "method-not-allowed");
}

#[tokio::test]
async fn test_preflight_reflects_allowed_origin() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/create-checkout-session")
        .header(header::ORIGIN, "https://preview-42.framer.app")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = send(app(fixture().state), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://preview-42.framer.app"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization, Stripe-Signature"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    assert_eq!(headers[header::VARY], "Origin");
}

#[tokio::test]
async fn test_unknown_origin_gets_default_origin() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/create-checkout-session")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::from("{}"))
        .unwrap();

    let (status, headers, _) = send(app(fixture().state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://ofinova-madrid.es"
    );
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(app(fixture().state), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["payments_configured"], true);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_validation() {
    let (status, _, body) = send(
        app(fixture().state),
        post_json("/api/create-checkout-session", &json!({ "planId": "p5" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid-plan");
    assert_eq!(body["error"], "Invalid planId");

    let (status, _, body) = send(
        app(fixture().state),
        post_json("/api/create-checkout-session", &json!({ "planId": "p12", "metadata": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing-lead-id");

    let (status, _, body) = send(
        app(fixture().state),
        post_json(
            "/api/create-checkout-session",
            &json!({ "planId": "p3", "payMode": "subscription", "metadata": { "lead_id": "L-1" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing-price");

    let request = Request::builder()
        .method("POST")
        .uri("/api/create-checkout-session")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(app(fixture().state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "bad-json");
}

#[tokio::test]
async fn test_checkout_payment_mode() {
    let fixture = fixture();
    let body = json!({
        "planId": "p12",
        "email": "ana@example.es",
        "metadata": { "lead_id": "L-7", "mailEnabled": "1", "mail_plan": "Mail Lite" }
    });

    let (status, _, response) = send(
        app(fixture.state.clone()),
        post_json("/api/create-checkout-session", &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["lead_id"], "L-7");
    assert_eq!(response["session_id"], "cs_test_1");
    assert_eq!(response["mode"], "payment");
    assert_eq!(response["url"], "https://checkout.stripe.com/c/pay/cs_test_1");

    let drafts = fixture.gateway.drafts.lock().unwrap();
    let draft = &drafts[0];
    assert_eq!(draft.client_reference_id.as_deref(), Some("L-7"));
    assert_eq!(draft.customer_email.as_deref(), Some("ana@example.es"));
    assert_eq!(draft.line_items.len(), 2);
    assert!(draft.success_url.starts_with("https://spectacular-millions-373411.framer.app/pago?status=success"));
}

#[tokio::test]
async fn test_checkout_disabled_without_gateway() {
    let mut state = fixture().state;
    state.checkout = None;

    let (status, _, body) = send(
        app(state),
        post_json("/api/create-checkout-session", &json!({ "planId": "p6", "lead_id": "L-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "payments-disabled");
}

#[tokio::test]
async fn test_checkout_stripe_failure_passes_message_through() {
    let mut state = fixture().state;
    state.checkout = Some(Arc::new(DecliningGateway));

    let (status, _, body) = send(
        app(state),
        post_json("/api/create-checkout-session", &json!({ "planId": "p12", "metadata": { "lead_id": "L-9" } })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "stripe-error");
    assert_eq!(body["error"], "No such price: 'price_domi_17'");
}

#[tokio::test]
async fn test_checkout_survives_unreachable_automation_hook() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut state = fixture().state;
    state.notifier = AutomationNotifier::new(NotifierConfig {
        url: Some(format!("http://{addr}/hook")),
        timeout: Duration::from_millis(200),
    });

    let (status, _, body) = send(
        app(state),
        post_json("/api/create-checkout-session", &json!({ "planId": "p12", "metadata": { "lead_id": "L-9" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lead_id"], "L-9");
    assert_eq!(body["session_id"], "cs_test_1");
}

#[tokio::test]
async fn test_mail_checkout() {
    let (status, _, body) = send(
        app(fixture().state),
        post_json("/api/create-mail-checkout", &json!({ "customerId": "user_1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid-customer");

    let (status, _, body) = send(
        app(fixture().state),
        post_json("/api/create-mail-checkout", &json!({ "customerId": "cus_1", "plan": "pro" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid-mail-plan");

    let fixture = fixture();
    let (status, _, body) = send(
        app(fixture.state.clone()),
        post_json(
            "/api/create-mail-checkout",
            &json!({ "customerId": "cus_123", "metadata": { "lead_id": "L-2" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "cs_test_1");

    let drafts = fixture.gateway.drafts.lock().unwrap();
    assert_eq!(drafts[0].customer_id.as_deref(), Some("cus_123"));
    assert_eq!(drafts[0].client_reference_id.as_deref(), Some("L-2"));
    assert!(drafts[0].success_url.starts_with("https://ofinova-madrid.es/confirmacion"));
}

// ============================================================================
// Leads
// ============================================================================

#[tokio::test]
async fn test_airtable_upsert() {
    let (status, _, body) = send(
        app(fixture().state),
        post_json("/api/airtable-upsert-register", &json!({ "lead_id": "L-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing-fields");
    assert_eq!(body["error"], "lead_id and register_type are required");

    let fixture = fixture();
    let (status, _, body) = send(
        app(fixture.state.clone()),
        post_json(
            "/api/airtable-upsert-register",
            &json!({ "lead_id": "L-1", "register_type": "alta", "customer_type": "empresa" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "upserted": ["rec1"] }));
    assert_eq!(fixture.leads.upserted.lock().unwrap()[0].customer_type.as_deref(), Some("empresa"));
}

#[tokio::test]
async fn test_airtable_upstream_error_keeps_status() {
    let mut state = fixture().state;
    let rejecting: Arc<dyn LeadStore> = Arc::new(FakeLeads {
        reject: true,
        ..Default::default()
    });
    state.leads = Some(rejecting);

    let (status, _, body) = send(
        app(state),
        post_json("/api/airtable-upsert-register", &json!({ "lead_id": "L-1", "register_type": "alta" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["airtable_error"]["error"]["type"], "INVALID_PERMISSIONS");
    assert_eq!(body["hint"], "Check base/table IDs and PAT scopes");
}

// ============================================================================
// KYC
// ============================================================================

#[tokio::test]
async fn test_kyc_verify() {
    let (status, _, body) = send(app(fixture().state), get("/api/kyc/verify")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing-token");

    let (status, _, body) = send(app(fixture().state), get("/api/kyc/verify?token=nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "invalid-token");

    let (status, _, body) = send(app(fixture().state), get("/api/kyc/verify?token=TEST")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "ok": true, "orderId": "demo-123", "email": "demo@ofinova.es", "name": "Demo Client" })
    );
}

#[tokio::test]
async fn test_kyc_sign_upload_rejections() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/kyc/sign-upload")
        .body(Body::from("nope"))
        .unwrap();
    let (status, _, body) = send(app(fixture().state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "bad-json");

    let cases = [
        (json!({ "mime": "image/png", "size": 10 }), StatusCode::BAD_REQUEST, "missing-token"),
        (json!({ "token": "TEST", "mime": "image/png" }), StatusCode::BAD_REQUEST, "missing-file-meta"),
        (
            json!({ "token": "TEST", "mime": "text/plain", "size": 10 }),
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported-type",
        ),
        (
            json!({ "token": "TEST", "mime": "image/png", "size": 30_000_000 }),
            StatusCode::PAYLOAD_TOO_LARGE,
            "file-too-large",
        ),
        (
            json!({ "token": "nope", "mime": "image/png", "size": 10 }),
            StatusCode::UNAUTHORIZED,
            "invalid-token",
        ),
    ];

    for (request, expected_status, reason) in cases {
        let (status, _, body) = send(app(fixture().state), post_json("/api/kyc/sign-upload", &request)).await;
        assert_eq!(status, expected_status, "{reason}");
        assert_eq!(body["reason"], reason);
    }

    let (_, _, body) = send(
        app(fixture().state),
        post_json("/api/kyc/sign-upload", &json!({ "token": "TEST", "mime": "image/gif", "size": 1 })),
    )
    .await;
    assert_eq!(body["allowed"], json!(["application/pdf", "image/jpeg", "image/png"]));

    let (_, _, body) = send(
        app(fixture().state),
        post_json("/api/kyc/sign-upload", &json!({ "token": "TEST", "mime": "image/png", "size": 26_214_401 })),
    )
    .await;
    assert_eq!(body["max"], 26_214_400);
}

#[tokio::test]
async fn test_kyc_sign_upload() {
    let fixture = fixture();
    let (status, _, body) = send(
        app(fixture.state.clone()),
        post_json(
            "/api/kyc/sign-upload",
            &json!({ "token": "TEST", "kind": "company", "mime": "image/jpeg", "size": 2048 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["bucket"], "kyc");
    assert_eq!(body["uploadToken"], "upload-token");
    let path = body["path"].as_str().unwrap();
    assert!(path.starts_with("orders/demo-123/KYC_demo-123_company_"));
    assert!(path.ends_with(".jpg"));
    assert_eq!(fixture.storage.signed.lock().unwrap().len(), 1);

    let mut state = fixture.state;
    state.storage = None;
    let (status, _, body) = send(
        app(state),
        post_json("/api/kyc/sign-upload", &json!({ "token": "TEST", "mime": "image/png", "size": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "storage-disabled");
}

#[tokio::test]
async fn test_kyc_sign_upload_storage_failure() {
    let mut state = fixture().state;
    let storage: Arc<dyn ObjectStorage> = Arc::new(FakeStorage {
        fail_signing: true,
        ..FakeStorage::default()
    });
    state.storage = Some(storage);

    let (status, _, body) = send(
        app(state),
        post_json("/api/kyc/sign-upload", &json!({ "token": "TEST", "mime": "application/pdf", "size": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "sign-url-failed");
    assert_eq!(body["detail"], "supabase returned 400");
}

// ============================================================================
// Stripe webhook
// ============================================================================

fn webhook_request(payload: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_vec())).unwrap()
}

#[tokio::test]
async fn test_webhook_signature() {
    let payload = serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_1", "customer_email": "ana@example.es", "client_reference_id": "L-1" } }
    }))
    .unwrap();

    let (status, _, body) = send(app(fixture().state), webhook_request(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing-signature");

    let now = chrono::Utc::now().timestamp();
    let forged = sign_payload("whsec_other", &payload, now).unwrap();
    let (status, _, body) = send(app(fixture().state), webhook_request(&payload, Some(&forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid-signature");

    let signature = sign_payload(WEBHOOK_SECRET, &payload, now).unwrap();
    let (status, _, body) = send(app(fixture().state), webhook_request(&payload, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
}

// ============================================================================
// Contracts
// ============================================================================

#[tokio::test]
async fn test_contract_usage_hint() {
    let response = app(fixture().state)
        .oneshot(get("/api/contracts/generate"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).starts_with("OK: POST JSON"));
}

#[tokio::test]
async fn test_contract_download() {
    let response = app(fixture().state)
        .oneshot(post_json(
            "/api/contracts/generate",
            &json!({ "lang": "es", "customer_name": "Ana" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"contract-"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("Ana"));
}

#[tokio::test]
async fn test_contract_storage_delivery() {
    let fixture = fixture();
    let (status, _, body) = send(
        app(fixture.state.clone()),
        post_json(
            "/api/contracts/generate",
            &json!({ "delivery": "storage", "lead_id": "L-3", "email": "ana@example.es" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["bucket"], "contracts");
    assert!(body["path"].as_str().unwrap().starts_with("contracts/L-3/contract-"));
    assert_eq!(fixture.storage.uploaded.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_contract_failure_is_gen_pdf_error() {
    let mut state = fixture().state;
    state.contracts = None;

    let (status, _, body) = send(app(state), post_json("/api/contracts/generate", &json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "GEN_PDF_ERROR");
    assert!(body["message"].is_string());
}
