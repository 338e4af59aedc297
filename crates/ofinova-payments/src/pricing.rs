//! Price Catalog
//!
//! Upfront prices are fixed net amounts; subscription prices are Stripe
//! Price IDs configured per environment.

use std::collections::HashMap;

use ofinova_core::{MailPlan, PlanTerm};

/// IVA 21% tax rate used when `STRIPE_TAX_RATE_ID` is not set
pub const DEFAULT_TAX_RATE_ID: &str = "txr_1S9RT93pToW48VXP6fB9vkUy";

/// One-off product line for an upfront contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpfrontPrice {
    pub name: String,
    /// Net amount in euro cents (VAT excluded)
    pub cents: i64,
}

/// Upfront net price for the whole term
pub fn upfront_price(plan: PlanTerm) -> UpfrontPrice {
    let cents = match plan {
        PlanTerm::P3 => 6900,   // 69.00€
        PlanTerm::P6 => 12000,  // 120.00€
        PlanTerm::P12 => 20400, // 204.00€
        PlanTerm::P24 => 33600, // 336.00€
    };
    UpfrontPrice {
        name: format!("Ofinova Domiciliación – {} meses", plan.months()),
        cents,
    }
}

/// Env var holding the monthly subscription Price ID (named after €/month)
pub fn monthly_price_env(plan: PlanTerm) -> &'static str {
    match plan {
        PlanTerm::P3 => "STRIPE_PRICE_DOMI_23",
        PlanTerm::P6 => "STRIPE_PRICE_DOMI_20",
        PlanTerm::P12 => "STRIPE_PRICE_DOMI_17",
        PlanTerm::P24 => "STRIPE_PRICE_DOMI_14",
    }
}

/// Env var holding the monthly mail Price ID
pub fn mail_price_env(plan: MailPlan) -> &'static str {
    match plan {
        MailPlan::Lite => "STRIPE_PRICE_MAIL_LITE_390",
        MailPlan::Pro => "STRIPE_PRICE_MAIL_PRO_990",
    }
}

/// Stripe Price IDs and tax rate for the current environment
#[derive(Clone, Debug, Default)]
pub struct PriceCatalog {
    monthly: HashMap<PlanTerm, String>,
    mail: HashMap<MailPlan, String>,
    tax_rate_id: Option<String>,
}

impl PriceCatalog {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let monthly = PlanTerm::ALL
            .into_iter()
            .filter_map(|plan| non_empty(monthly_price_env(plan)).map(|id| (plan, id)))
            .collect();
        let mail = [MailPlan::Lite, MailPlan::Pro]
            .into_iter()
            .filter_map(|plan| non_empty(mail_price_env(plan)).map(|id| (plan, id)))
            .collect();

        Self {
            monthly,
            mail,
            tax_rate_id: Some(
                non_empty("STRIPE_TAX_RATE_ID").unwrap_or_else(|| DEFAULT_TAX_RATE_ID.into()),
            ),
        }
    }

    #[must_use]
    pub fn with_monthly_price(mut self, plan: PlanTerm, price_id: impl Into<String>) -> Self {
        self.monthly.insert(plan, price_id.into());
        self
    }

    #[must_use]
    pub fn with_mail_price(mut self, plan: MailPlan, price_id: impl Into<String>) -> Self {
        self.mail.insert(plan, price_id.into());
        self
    }

    #[must_use]
    pub fn with_tax_rate(mut self, tax_rate_id: Option<String>) -> Self {
        self.tax_rate_id = tax_rate_id;
        self
    }

    pub fn monthly_price(&self, plan: PlanTerm) -> Option<&str> {
        self.monthly.get(&plan).map(String::as_str)
    }

    pub fn mail_price(&self, plan: MailPlan) -> Option<&str> {
        self.mail.get(&plan).map(String::as_str)
    }

    pub fn tax_rate_id(&self) -> Option<&str> {
        self.tax_rate_id.as_deref()
    }

    /// Tax rates to attach to a line item or subscription
    pub fn tax_rates(&self) -> Vec<String> {
        self.tax_rate_id.iter().cloned().collect()
    }
}
