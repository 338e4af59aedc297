//! Plan Tables
//!
//! Contract terms, mail add-on tiers and payment modes offered on the
//! landing page.

use serde::{Deserialize, Serialize};

/// Contract term ("plan id" on the landing page)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTerm {
    P3,
    P6,
    P12,
    P24,
}

impl PlanTerm {
    pub const ALL: [Self; 4] = [Self::P3, Self::P6, Self::P12, Self::P24];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::P3 => "p3",
            Self::P6 => "p6",
            Self::P12 => "p12",
            Self::P24 => "p24",
        }
    }

    /// Parse a plan id; unknown ids are `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "p3" => Some(Self::P3),
            "p6" => Some(Self::P6),
            "p12" => Some(Self::P12),
            "p24" => Some(Self::P24),
            _ => None,
        }
    }

    /// Contract length in months
    pub fn months(self) -> u32 {
        match self {
            Self::P3 => 3,
            Self::P6 => 6,
            Self::P12 => 12,
            Self::P24 => 24,
        }
    }
}

impl std::fmt::Display for PlanTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mail handling add-on tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailPlan {
    Lite,
    Pro,
}

impl MailPlan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Pro => "pro",
        }
    }

    /// Loose match used for free-form landing input ("Mail Lite", "PRO", ...)
    pub fn normalize(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        if lower.contains("lite") {
            Some(Self::Lite)
        } else if lower.contains("pro") {
            Some(Self::Pro)
        } else {
            None
        }
    }

    /// Net monthly price in euro cents (VAT excluded)
    pub fn monthly_net_cents(self) -> i64 {
        match self {
            Self::Lite => 390,
            Self::Pro => 990,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Lite => "Mail Lite",
            Self::Pro => "Mail Pro",
        }
    }
}

/// How the contract is paid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayMode {
    /// Whole term paid upfront
    #[default]
    Payment,

    /// Monthly direct debit
    Subscription,
}

impl PayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Subscription => "subscription",
        }
    }

    /// Anything other than "subscription" is an upfront payment
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("subscription") {
            Self::Subscription
        } else {
            Self::Payment
        }
    }
}
