//! Contract PDF Generation
//!
//! The contract form posts an arbitrary JSON object. It is merged with a
//! `today` timestamp, rendered through a Handlebars template and printed to
//! an A4 PDF by a headless Chromium process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;

use crate::error::{IntegrationError, Result};
use crate::kyc::sanitize_segment;
use crate::supabase::ObjectStorage;

const TEMPLATE_ES: &str = include_str!("../templates/template-es.hbs");
const TEMPLATE_KO: &str = include_str!("../templates/template-ko.hbs");

pub const DEFAULT_CHROMIUM_PATH: &str = "chromium";
pub const DEFAULT_BUCKET: &str = "contracts";
pub const PRINT_TIMEOUT: Duration = Duration::from_secs(60);

/// Usage hint served on `GET`
pub const USAGE_HINT: &str =
    r#"OK: POST JSON to this endpoint to receive a PDF. Example: { "lang":"es","customer_name":"..." }"#;

/// Template language
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractLang {
    Es,
    Ko,
}

impl ContractLang {
    /// `ko` selects Korean, anything else Spanish
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("ko") => Self::Ko,
            _ => Self::Es,
        }
    }

    pub fn template_name(self) -> &'static str {
        match self {
            Self::Es => "template-es",
            Self::Ko => "template-ko",
        }
    }
}

/// Where the finished PDF goes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Returned as an attachment
    Download,
    /// Uploaded to the contracts bucket
    Storage,
}

impl Delivery {
    pub fn parse(body: &Value) -> Self {
        match body.get("delivery").and_then(Value::as_str) {
            Some("storage") => Self::Storage,
            _ => Self::Download,
        }
    }
}

/// Contract settings
#[derive(Clone, Debug)]
pub struct ContractConfig {
    pub template_dir: Option<PathBuf>,
    pub chromium_path: String,
    pub bucket: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            chromium_path: DEFAULT_CHROMIUM_PATH.into(),
            bucket: DEFAULT_BUCKET.into(),
        }
    }
}

impl ContractConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            template_dir: present("CONTRACT_TEMPLATE_DIR").map(PathBuf::from),
            chromium_path: present("CHROMIUM_PATH").unwrap_or_else(|| DEFAULT_CHROMIUM_PATH.into()),
            bucket: present("CONTRACTS_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.into()),
        }
    }
}

/// Renders contract HTML
pub struct ContractRenderer {
    registry: Handlebars<'static>,
}

impl ContractRenderer {
    /// Built-in templates, replaced by any `template-*.hbs` found in `template_dir`
    pub fn new(template_dir: Option<&Path>) -> Result<Self> {
        let mut registry = Handlebars::new();

        for (lang, builtin) in [(ContractLang::Es, TEMPLATE_ES), (ContractLang::Ko, TEMPLATE_KO)] {
            let name = lang.template_name();
            let override_path = template_dir.map(|dir| dir.join(format!("{name}.hbs")));

            match override_path.filter(|p| p.is_file()) {
                Some(path) => {
                    let source = std::fs::read_to_string(&path)?;
                    registry.register_template_string(name, source)?;
                    tracing::info!(template = name, path = %path.display(), "Loaded contract template");
                }
                None => registry.register_template_string(name, builtin)?,
            }
        }

        Ok(Self { registry })
    }

    /// Request body plus `today`
    pub fn render(&self, body: &Value, now: DateTime<Utc>) -> Result<String> {
        let lang = ContractLang::parse(body.get("lang").and_then(Value::as_str));

        let mut data = match body {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        data.insert("today".into(), Value::String(now.format("%Y-%m-%d %H:%M").to_string()));

        Ok(self.registry.render(lang.template_name(), &data)?)
    }
}

/// HTML to PDF
#[async_trait]
pub trait PdfPrinter: Send + Sync {
    async fn print(&self, html: &str) -> Result<Vec<u8>>;
}

/// Prints through a headless Chromium process
pub struct ChromiumPrinter {
    binary: String,
    timeout: Duration,
}

impl ChromiumPrinter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: PRINT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, html_path: &Path, pdf_path: &Path) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .arg(format!("file://{}", html_path.display()))
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| IntegrationError::Pdf(format!("chromium timed out after {:?}", self.timeout)))?
            .map_err(|e| IntegrationError::Pdf(format!("failed to start {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IntegrationError::Pdf(format!(
                "chromium exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(tokio::fs::read(pdf_path).await?)
    }
}

#[async_trait]
impl PdfPrinter for ChromiumPrinter {
    async fn print(&self, html: &str) -> Result<Vec<u8>> {
        let stem = format!("ofinova-contract-{}", uuid::Uuid::new_v4());
        let dir = std::env::temp_dir();
        let html_path = dir.join(format!("{stem}.html"));
        let pdf_path = dir.join(format!("{stem}.pdf"));

        tokio::fs::write(&html_path, html).await?;
        let result = self.run(&html_path, &pdf_path).await;

        let _ = tokio::fs::remove_file(&html_path).await;
        let _ = tokio::fs::remove_file(&pdf_path).await;

        if let Ok(pdf) = &result {
            tracing::debug!(bytes = pdf.len(), "Printed contract PDF");
        }
        result
    }
}

/// Where a stored contract ended up
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredContract {
    pub bucket: String,
    pub path: String,
}

/// `contracts/{lead_id|uuid}/contract-{ms}.pdf`
pub fn storage_path(body: &Value, timestamp_ms: i64) -> String {
    let owner = body
        .get("lead_id")
        .and_then(ofinova_core::metadata::non_blank)
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), |id| sanitize_segment(&id));
    format!("contracts/{owner}/contract-{timestamp_ms}.pdf")
}

/// Download file name
pub fn attachment_name(timestamp_ms: i64) -> String {
    format!("contract-{timestamp_ms}.pdf")
}

/// Render, print and optionally store contracts
pub struct ContractService {
    renderer: ContractRenderer,
    printer: Arc<dyn PdfPrinter>,
    bucket: String,
}

impl ContractService {
    pub fn new(renderer: ContractRenderer, printer: Arc<dyn PdfPrinter>, bucket: impl Into<String>) -> Self {
        Self {
            renderer,
            printer,
            bucket: bucket.into(),
        }
    }

    pub fn from_config(config: &ContractConfig) -> Result<Self> {
        Ok(Self::new(
            ContractRenderer::new(config.template_dir.as_deref())?,
            Arc::new(ChromiumPrinter::new(config.chromium_path.clone())),
            config.bucket.clone(),
        ))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn generate(&self, body: &Value) -> Result<Vec<u8>> {
        let html = self.renderer.render(body, Utc::now())?;
        let pdf = self.printer.print(&html).await?;
        tracing::info!(
            lang = ?ContractLang::parse(body.get("lang").and_then(serde_json::Value::as_str)),
            bytes = pdf.len(),
            "Generated contract"
        );
        Ok(pdf)
    }

    pub async fn store(&self, storage: &dyn ObjectStorage, body: &Value, pdf: Vec<u8>) -> Result<StoredContract> {
        let path = storage_path(body, Utc::now().timestamp_millis());
        storage.upload(&self.bucket, &path, "application/pdf", pdf).await?;
        Ok(StoredContract {
            bucket: self.bucket.clone(),
            path,
        })
    }
}
