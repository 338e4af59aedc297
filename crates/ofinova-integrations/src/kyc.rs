//! KYC Document Uploads
//!
//! After checkout the customer receives a KYC link carrying a token. The
//! token identifies the order; uploads are signed per order so that the
//! browser can push identity documents straight to storage.
//!
//! Accepted tokens:
//! - the demo token (`KYC_DEMO_TOKEN`, `TEST` by default), bound to a fixed demo order
//! - `<orderId>.<hex hmac-sha256(orderId)>` when `KYC_TOKEN_SECRET` is set

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Value, json};
use sha2::Sha256;

use ofinova_core::{Rejection, RejectionKind};

use crate::error::Result;
use crate::supabase::ObjectStorage;

type HmacSha256 = Hmac<Sha256>;

pub const ALLOWED_MIME_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];

/// 25 MiB
pub const MAX_UPLOAD_BYTES: u32 = 25 * 1024 * 1024;

pub const DEFAULT_DEMO_TOKEN: &str = "TEST";
pub const DEFAULT_BUCKET: &str = "kyc";

/// Order a KYC token belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycOrder {
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl KycOrder {
    fn demo() -> Self {
        Self {
            order_id: "demo-123".into(),
            email: Some("demo@ofinova.es".into()),
            name: Some("Demo Client".into()),
        }
    }
}

/// KYC settings
#[derive(Clone, Debug)]
pub struct KycConfig {
    pub demo_token: Option<String>,
    pub signing_secret: Option<String>,
    pub bucket: String,
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            demo_token: Some(DEFAULT_DEMO_TOKEN.into()),
            signing_secret: None,
            bucket: DEFAULT_BUCKET.into(),
        }
    }
}

impl KycConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// An empty `KYC_DEMO_TOKEN` disables the demo token
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let demo_token = match get("KYC_DEMO_TOKEN") {
            Some(token) => Some(token.trim().to_string()).filter(|t| !t.is_empty()),
            None => Some(DEFAULT_DEMO_TOKEN.into()),
        };

        Self {
            demo_token,
            signing_secret: get("KYC_TOKEN_SECRET").filter(|s| !s.trim().is_empty()),
            bucket: get("KYC_BUCKET")
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.into()),
        }
    }
}

/// Resolves KYC tokens to orders
#[derive(Clone, Debug)]
pub struct KycTokenVerifier {
    demo_token: Option<String>,
    signing_secret: Option<String>,
}

impl KycTokenVerifier {
    pub fn new(config: &KycConfig) -> Self {
        Self {
            demo_token: config.demo_token.clone(),
            signing_secret: config.signing_secret.clone(),
        }
    }

    fn mac(&self, order_id: &str) -> Option<HmacSha256> {
        let secret = self.signing_secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(order_id.as_bytes());
        Some(mac)
    }

    /// Mint a signed token for an order (requires `KYC_TOKEN_SECRET`)
    pub fn issue(&self, order_id: &str) -> Option<String> {
        if !is_safe_segment(order_id) {
            return None;
        }
        let mac = self.mac(order_id)?;
        Some(format!("{order_id}.{}", hex::encode(mac.finalize().into_bytes())))
    }

    pub fn verify(&self, token: &str) -> Option<KycOrder> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if self.demo_token.as_deref() == Some(token) {
            return Some(KycOrder::demo());
        }

        let (order_id, signature) = token.rsplit_once('.')?;
        if !is_safe_segment(order_id) {
            return None;
        }
        let expected = hex::decode(signature).ok()?;
        self.mac(order_id)?.verify_slice(&expected).ok()?;

        Some(KycOrder {
            order_id: order_id.to_string(),
            email: None,
            name: None,
        })
    }
}

/// Which document is being uploaded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    /// Personal identity document
    Id,
    /// Company deeds
    Company,
}

impl DocumentKind {
    /// Unknown kinds fall back to `id`
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("company") => Self::Company,
            _ => Self::Id,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Company => "company",
        }
    }
}

/// Validated sign-upload request
#[derive(Clone, Debug, PartialEq)]
pub struct UploadRequest {
    pub token: String,
    pub kind: DocumentKind,
    pub mime: String,
    pub size: f64,
}

impl UploadRequest {
    /// Checks run in the order the upload form expects its reason codes
    pub fn parse(body: &Value) -> std::result::Result<Self, Rejection> {
        let token = body
            .get("token")
            .and_then(ofinova_core::metadata::non_blank)
            .ok_or_else(|| Rejection::bad_request("missing-token", "token is required"))?;

        let mime = body.get("mime").and_then(Value::as_str).filter(|m| !m.is_empty());
        let size = body.get("size").and_then(Value::as_f64);
        let (Some(mime), Some(size)) = (mime, size) else {
            return Err(Rejection::bad_request("missing-file-meta", "mime and size are required"));
        };

        if !ALLOWED_MIME_TYPES.contains(&mime) {
            return Err(Rejection::new(
                RejectionKind::UnsupportedType,
                "unsupported-type",
                format!("{mime} is not accepted"),
            )
            .with_details(json!({ "allowed": ALLOWED_MIME_TYPES })));
        }

        if size > f64::from(MAX_UPLOAD_BYTES) {
            return Err(Rejection::new(
                RejectionKind::TooLarge,
                "file-too-large",
                "file exceeds the upload limit",
            )
            .with_details(json!({ "max": MAX_UPLOAD_BYTES })));
        }

        Ok(Self {
            token,
            kind: DocumentKind::parse(body.get("kind").and_then(Value::as_str)),
            mime: mime.to_string(),
            size,
        })
    }
}

/// File extension for an accepted MIME type
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}

fn is_safe_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Keep only characters safe in a storage path segment
pub fn sanitize_segment(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() { "unknown".into() } else { cleaned }
}

/// `orders/{orderId}/KYC_{orderId}_{kind}_{ms}.{ext}`
pub fn upload_path(order_id: &str, kind: DocumentKind, mime: &str, timestamp_ms: i64) -> String {
    let order_id = sanitize_segment(order_id);
    format!(
        "orders/{order_id}/KYC_{order_id}_{}_{timestamp_ms}.{}",
        kind.as_str(),
        extension_for(mime)
    )
}

/// Validated upload bound to its order, not yet signed
#[derive(Clone, Debug, PartialEq)]
pub struct PendingUpload {
    pub order: KycOrder,
    pub kind: DocumentKind,
    pub path: String,
}

/// Signed upload handed back to the browser
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub bucket: String,
    pub path: String,
    pub upload_token: String,
    pub max: u32,
    pub allowed: [&'static str; 3],
}

/// Token verification plus upload signing
#[derive(Clone, Debug)]
pub struct KycService {
    verifier: KycTokenVerifier,
    bucket: String,
}

impl KycService {
    pub fn new(config: &KycConfig) -> Self {
        Self {
            verifier: KycTokenVerifier::new(config),
            bucket: config.bucket.clone(),
        }
    }

    pub fn verifier(&self) -> &KycTokenVerifier {
        &self.verifier
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Validate the request and resolve its order
    pub fn prepare_upload(&self, body: &Value) -> std::result::Result<PendingUpload, Rejection> {
        let request = UploadRequest::parse(body)?;

        let order = self
            .verifier
            .verify(&request.token)
            .ok_or_else(|| Rejection::unauthorized("invalid-token", "KYC token is not valid"))?;

        let path = upload_path(
            &order.order_id,
            request.kind,
            &request.mime,
            Utc::now().timestamp_millis(),
        );

        Ok(PendingUpload {
            order,
            kind: request.kind,
            path,
        })
    }

    /// Mint the storage upload token for a prepared upload
    pub async fn sign(&self, storage: &dyn ObjectStorage, upload: PendingUpload) -> Result<SignedUpload> {
        let upload_token = storage.create_signed_upload(&self.bucket, &upload.path).await?;

        tracing::info!(
            order_id = %upload.order.order_id,
            kind = upload.kind.as_str(),
            path = %upload.path,
            "Signed KYC upload"
        );

        Ok(SignedUpload {
            bucket: self.bucket.clone(),
            path: upload.path,
            upload_token,
            max: MAX_UPLOAD_BYTES,
            allowed: ALLOWED_MIME_TYPES,
        })
    }
}
