//! Checkout Metadata Normalization
//!
//! The landing page has gone through many form revisions, and each one sent
//! the same information under different keys. Every canonical field here is
//! resolved from an ordered alias list: the first candidate holding a
//! non-blank value wins.
//!
//! The result is re-shaped into Stripe's metadata format, which only accepts
//! string values (max 50 keys, 40 char keys, 500 char values).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::plan::{MailPlan, PayMode, PlanTerm};

/// Alias lists, in priority order. Paths are rooted at the request body.
pub mod aliases {
    pub const LEAD_ID: &[&str] = &[
        "metadata.lead_id",
        "metadata.leadId",
        "metadata.orderId",
        "lead_id",
        "leadId",
        "orderId",
    ];

    pub const MONTHS: &[&str] = &["metadata.months", "months"];

    pub const MAIL_ENABLED: &[&str] = &[
        "metadata.mailEnabled",
        "metadata.mail_enabled",
        "mailEnabled",
        "mail_enabled",
    ];

    pub const MAIL_PLAN: &[&str] = &[
        "metadata.mail",
        "metadata.mail_plan",
        "metadata.mailPlan",
        "mail_plan",
        "mailPlan",
    ];

    pub const PAY_MODE: &[&str] = &["payMode", "metadata.payMode", "metadata.pay_mode"];

    pub const EMAIL: &[&str] = &["email", "metadata.email", "metadata.customer_email"];

    pub const SHIPPING_ADDRESS: &[&str] = &[
        "metadata.shipping.address",
        "metadata.shipping_address",
        "metadata.mail_address",
        "metadata.address",
        "shipping.address",
        "shipping_address",
        "address",
    ];

    pub const SHIPPING_NOTES: &[&str] = &[
        "metadata.shipping.notes",
        "metadata.shipping_notes",
        "metadata.mail_notes",
        "shipping.notes",
        "shipping_notes",
    ];

    pub const COMPANY_NAME: &[&str] = &[
        "metadata.company.name",
        "metadata.company_name",
        "metadata.companyName",
        "metadata.razon_social",
        "company.name",
        "company_name",
    ];

    pub const COMPANY_TAX_ID: &[&str] = &[
        "metadata.company.tax_id",
        "metadata.company_tax_id",
        "metadata.cif",
        "metadata.nif",
        "company.tax_id",
        "tax_id",
    ];

    pub const CUSTOMER_TYPE: &[&str] = &[
        "metadata.customer_type",
        "metadata.customerType",
        "customer_type",
    ];
}

/// Dotted-path lookup (`"metadata.shipping.address"`)
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, key| node.get(key))
}

/// Text form of a value, or `None` when it carries nothing
pub fn non_blank(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) if !items.is_empty() => Some(value.to_string()),
        Value::Object(fields) if !fields.is_empty() => Some(value.to_string()),
        _ => None,
    }
}

/// First non-blank value among `candidates`, in order
pub fn first_non_blank(root: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(non_blank)
}

/// First candidate path that is present at all (even if blank)
fn first_present<'a>(root: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|path| lookup(root, path))
        .find(|value| !value.is_null())
}

/// Leading-integer parse of a string or number, `default` otherwise
pub fn to_int(value: Option<&Value>, default: i64) -> i64 {
    let text = match value {
        Some(Value::Number(n)) => {
            #[allow(clippy::cast_possible_truncation)]
            let truncated = n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64));
            return truncated.unwrap_or(default);
        }
        Some(Value::String(s)) => s.trim(),
        _ => return default,
    };

    let sign_len = usize::from(text.starts_with(['-', '+']));
    let digits = text[sign_len..]
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    if digits == 0 {
        return default;
    }
    text[..sign_len + digits].parse().unwrap_or(default)
}

/// Form-style truthiness: "1", "true", "yes", "on"
pub fn to_bool(value: Option<&Value>) -> bool {
    let text = match value {
        Some(Value::String(s)) => s.trim().to_lowercase(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return false,
    };
    matches!(text.as_str(), "1" | "true" | "yes" | "on")
}

/// Strings pass through, anything else becomes JSON text
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// String-only metadata accepted by Stripe
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StripeMetadata(BTreeMap<String, String>);

impl StripeMetadata {
    pub const MAX_KEYS: usize = 50;
    pub const MAX_KEY_CHARS: usize = 40;
    pub const MAX_VALUE_CHARS: usize = 500;

    pub fn new() -> Self {
        Self::default()
    }

    /// Stringify every entry of a JSON object
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut metadata = Self::new();
        for (key, value) in object {
            metadata.insert_value(key, value);
        }
        metadata
    }

    /// Insert or replace a value. Returns `false` when Stripe's limits drop it.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if key.is_empty() || key.chars().count() > Self::MAX_KEY_CHARS || key.contains(['[', ']']) {
            tracing::warn!(key = %key, "Dropping metadata key Stripe would reject");
            return false;
        }
        if !self.0.contains_key(&key) && self.0.len() >= Self::MAX_KEYS {
            tracing::warn!(key = %key, "Metadata key limit reached");
            return false;
        }

        let mut value = value.into();
        if let Some((cut, _)) = value.char_indices().nth(Self::MAX_VALUE_CHARS) {
            value.truncate(cut);
        }
        self.0.insert(key, value);
        true
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: &Value) -> bool {
        self.insert(key, stringify(value))
    }

    /// Add entries whose keys are not set yet
    pub fn extend_missing(&mut self, object: &Map<String, Value>) {
        for (key, value) in object {
            if !self.0.contains_key(key) {
                self.insert_value(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl IntoIterator for StripeMetadata {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Canonical view of a checkout request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedCheckout {
    pub plan: PlanTerm,
    pub lead_id: Option<String>,
    pub months: u32,
    pub mail_enabled: bool,
    pub mail_plan: Option<MailPlan>,
    pub pay_mode: PayMode,
    pub email: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_notes: Option<String>,
    pub company_name: Option<String>,
    pub company_tax_id: Option<String>,
    pub customer_type: Option<String>,
}

impl NormalizedCheckout {
    /// Resolve every canonical field from a loosely-typed request body
    pub fn from_body(body: &Value, plan: PlanTerm) -> Self {
        let default_months = i64::from(plan.months());
        let months = match to_int(first_present(body, aliases::MONTHS), default_months) {
            m if m > 0 => u32::try_from(m).unwrap_or_else(|_| plan.months()),
            _ => plan.months(),
        };

        let mail_enabled = aliases::MAIL_ENABLED
            .iter()
            .any(|path| to_bool(lookup(body, path)));

        let mail_plan = first_non_blank(body, aliases::MAIL_PLAN)
            .as_deref()
            .and_then(MailPlan::normalize);

        let pay_mode = first_non_blank(body, aliases::PAY_MODE)
            .as_deref()
            .map(PayMode::parse)
            .unwrap_or_default();

        Self {
            plan,
            lead_id: first_non_blank(body, aliases::LEAD_ID),
            months,
            mail_enabled,
            mail_plan,
            pay_mode,
            email: first_non_blank(body, aliases::EMAIL),
            shipping_address: first_non_blank(body, aliases::SHIPPING_ADDRESS),
            shipping_notes: first_non_blank(body, aliases::SHIPPING_NOTES),
            company_name: first_non_blank(body, aliases::COMPANY_NAME),
            company_tax_id: first_non_blank(body, aliases::COMPANY_TAX_ID),
            customer_type: first_non_blank(body, aliases::CUSTOMER_TYPE),
        }
    }

    /// Canonical fields first, then whatever else the caller sent in `metadata`
    pub fn session_metadata(&self, passthrough: Option<&Map<String, Value>>) -> StripeMetadata {
        let mut metadata = StripeMetadata::new();

        if let Some(lead_id) = &self.lead_id {
            metadata.insert("lead_id", lead_id.as_str());
            metadata.insert("orderId", lead_id.as_str());
        }
        metadata.insert("planId", self.plan.as_str());
        metadata.insert("months", self.months.to_string());
        metadata.insert("mailEnabled", if self.mail_enabled { "1" } else { "0" });
        metadata.insert("mailPlan", self.mail_plan.map_or("", MailPlan::as_str));
        metadata.insert("mode", self.pay_mode.as_str());

        let optional = [
            ("shipping_address", &self.shipping_address),
            ("shipping_notes", &self.shipping_notes),
            ("company_name", &self.company_name),
            ("company_tax_id", &self.company_tax_id),
            ("customer_type", &self.customer_type),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                metadata.insert(key, value.as_str());
            }
        }

        if let Some(raw) = passthrough {
            metadata.extend_missing(raw);
        }
        metadata
    }
}
