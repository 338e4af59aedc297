//! Supabase Storage
//!
//! Only two storage calls are needed: minting a signed upload token (the
//! browser then uploads KYC documents directly) and server-side uploads of
//! generated contracts.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use crate::error::{IntegrationError, Result};

/// Object storage used by the KYC and contract endpoints
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Mint a one-shot upload token for `bucket/path`
    async fn create_signed_upload(&self, bucket: &str, path: &str) -> Result<String>;

    /// Store an object, overwriting any previous version; returns its key
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<String>;
}

/// Supabase project settings
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
}

impl SupabaseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| IntegrationError::Config(format!("{key} not set")))
        };

        Ok(Self {
            url: required("SUPABASE_URL")?,
            service_role_key: required("SUPABASE_SERVICE_ROLE")?,
        })
    }

    fn storage_url(&self, route: &str, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/{route}/{bucket}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Supabase Storage REST client
pub struct SupabaseStorage {
    client: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(SupabaseConfig::from_env()?))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(&self.config.service_role_key)
            .header("apikey", &self.config.service_role_key)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            Ok(body)
        } else {
            Err(IntegrationError::Upstream {
                service: "supabase",
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn create_signed_upload(&self, bucket: &str, path: &str) -> Result<String> {
        let url = self.config.storage_url("object/upload/sign", bucket, path);
        let body = self.send(self.client.post(url)).await?;

        let token = body
            .get("url")
            .and_then(Value::as_str)
            .and_then(token_from_signed_url)
            .ok_or_else(|| IntegrationError::InvalidResponse {
                service: "supabase",
                message: "signed upload URL without token".into(),
            })?;

        tracing::info!(bucket = %bucket, path = %path, "Issued signed upload URL");
        Ok(token)
    }

    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        let url = self.config.storage_url("object", bucket, path);
        let size = bytes.len();
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        let body = self.send(request).await?;

        let key = body
            .get("Key")
            .and_then(Value::as_str)
            .map_or_else(|| format!("{bucket}/{path}"), str::to_string);

        tracing::info!(key = %key, bytes = size, "Uploaded object");
        Ok(key)
    }
}

/// `token` query parameter of a signed upload URL
///
/// Supabase answers with a path relative to the storage API, so it is
/// resolved against a placeholder origin before reading the query.
pub fn token_from_signed_url(url: &str) -> Option<String> {
    let url = Url::parse("http://storage.invalid/").ok()?.join(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, token)| token.into_owned())
        .filter(|token| !token.is_empty())
}
