//! Airtable Lead Store
//!
//! Leads live in an Airtable table keyed on the `lead_id` field. Writes use
//! Airtable's upsert (`performUpsert`), so the same call creates the record
//! on first registration and patches it afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use ofinova_core::Rejection;

use crate::error::{IntegrationError, Result};

/// Field Airtable merges on
pub const MERGE_FIELD: &str = "lead_id";

/// Body of a lead registration request
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LeadRegistration {
    #[serde(default)]
    pub lead_id: Option<String>,

    /// `alta` (new) or `cambio` (transfer)
    #[serde(default)]
    pub register_type: Option<String>,

    /// `autonomo` or `empresa`
    #[serde(default)]
    pub customer_type: Option<String>,

    #[serde(default)]
    pub meta_stage: Option<String>,
}

/// Validated lead fields
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeadRecord {
    pub lead_id: String,
    pub register_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_stage: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl LeadRegistration {
    pub fn validate(self) -> Result<LeadRecord> {
        let (Some(lead_id), Some(register_type)) = (present(self.lead_id), present(self.register_type)) else {
            return Err(Rejection::bad_request(
                "missing-fields",
                "lead_id and register_type are required",
            )
            .into());
        };

        Ok(LeadRecord {
            lead_id,
            register_type,
            customer_type: present(self.customer_type),
            meta_stage: present(self.meta_stage),
        })
    }
}

impl LeadRecord {
    /// Airtable upsert body
    pub fn upsert_body(&self) -> Result<Value> {
        Ok(json!({
            "performUpsert": { "fieldsToMergeOn": [MERGE_FIELD] },
            "records": [ { "fields": serde_json::to_value(self)? } ],
        }))
    }
}

/// Lead persistence
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Create or update the record; returns the Airtable record ids
    async fn upsert(&self, record: &LeadRecord) -> Result<Vec<String>>;
}

/// Airtable connection settings
#[derive(Clone, Debug)]
pub struct AirtableConfig {
    pub api_url: String,
    pub token: String,
    pub base_id: String,
    pub table_id: String,
}

impl AirtableConfig {
    pub const DEFAULT_API_URL: &'static str = "https://api.airtable.com/v0";

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            present(get(key)).ok_or_else(|| IntegrationError::Config(format!("{key} not set")))
        };

        Ok(Self {
            api_url: present(get("AIRTABLE_API_URL"))
                .unwrap_or_else(|| Self::DEFAULT_API_URL.into()),
            token: required("AIRTABLE_PAT")?,
            base_id: required("AIRTABLE_BASE_ID")?,
            table_id: required("AIRTABLE_TABLE_ID")?,
        })
    }

    pub fn table_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_url.trim_end_matches('/'),
            self.base_id,
            self.table_id
        )
    }
}

/// Airtable REST client
pub struct AirtableClient {
    client: reqwest::Client,
    config: AirtableConfig,
}

impl AirtableClient {
    pub fn new(config: AirtableConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AirtableConfig::from_env()?))
    }
}

#[async_trait]
impl LeadStore for AirtableClient {
    async fn upsert(&self, record: &LeadRecord) -> Result<Vec<String>> {
        let response = self
            .client
            .patch(self.config.table_url())
            .bearer_auth(&self.config.token)
            .json(&record.upsert_body()?)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            tracing::warn!(lead_id = %record.lead_id, status = %status, "Airtable upsert rejected");
            return Err(IntegrationError::Upstream {
                service: "airtable",
                status: status.as_u16(),
                body,
            });
        }

        let ids = record_ids(&body);
        tracing::info!(lead_id = %record.lead_id, records = ?ids, "Airtable lead upserted");
        Ok(ids)
    }
}

fn record_ids(body: &Value) -> Vec<String> {
    body.get("records")
        .and_then(Value::as_array)
        .map(|records| {
            records
                .iter()
                .filter_map(|record| record.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_validate_requires_both_fields() {
        let registration = LeadRegistration {
            lead_id: Some("L-1".into()),
            register_type: Some("  ".into()),
            ..Default::default()
        };
        match registration.validate() {
            Err(IntegrationError::Rejected(rejection)) => {
                assert_eq!(rejection.reason, "missing-fields");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_upsert_body_omits_empty_optionals() {
        let record = LeadRegistration {
            lead_id: Some("L-1".into()),
            register_type: Some("alta".into()),
            customer_type: Some("empresa".into()),
            meta_stage: Some(String::new()),
        }
        .validate()
        .unwrap();

        let body = record.upsert_body().unwrap();
        assert_eq!(body["performUpsert"]["fieldsToMergeOn"][0], "lead_id");
        let fields = &body["records"][0]["fields"];
        assert_eq!(fields["lead_id"], "L-1");
        assert_eq!(fields["register_type"], "alta");
        assert_eq!(fields["customer_type"], "empresa");
        assert!(fields.get("meta_stage").is_none());
        assert_eq!(fields.as_object().map(Map::len), Some(3));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = AirtableConfig::from_lookup(|key| match key {
            "AIRTABLE_PAT" => Some("pat_x".into()),
            "AIRTABLE_BASE_ID" => Some("appBase".into()),
            "AIRTABLE_TABLE_ID" => Some("tblLeads".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.table_url(), "https://api.airtable.com/v0/appBase/tblLeads");

        assert!(matches!(
            AirtableConfig::from_lookup(|_| None),
            Err(IntegrationError::Config(_))
        ));
    }

    #[test]
    fn test_record_ids() {
        let body = json!({ "records": [ { "id": "rec1" }, { "id": "rec2" }, {} ] });
        assert_eq!(record_ids(&body), vec!["rec1", "rec2"]);
        assert!(record_ids(&Value::Null).is_empty());
    }
}
