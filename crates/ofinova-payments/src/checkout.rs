//! Stripe Checkout Integration
//!
//! Checkout requests are first turned into a [`SessionDraft`], a plain
//! description of the hosted Checkout Session to open. A [`CheckoutGateway`]
//! then submits the draft; [`StripeClient`] is the production gateway.
//!
//! Two flows are supported:
//!
//! - **Contract checkout**: either the whole term upfront (`payment`) or a
//!   monthly direct debit (`subscription`), optionally with the mail add-on.
//! - **Mail add-on**: a mail-only subscription attached to an existing
//!   Stripe customer.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionBillingAddressCollection,
    CheckoutSessionLocale, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionAutomaticTax, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataTaxBehavior, CreateCheckoutSessionPaymentIntentData,
    CreateCheckoutSessionSubscriptionData, Currency, CustomerId,
};

use ofinova_core::metadata::{self, non_blank};
use ofinova_core::{MailPlan, NormalizedCheckout, PayMode, PlanTerm, Rejection, StripeMetadata};

use crate::error::{PaymentError, Result};
use crate::pricing::{PriceCatalog, monthly_price_env, upfront_price};

/// One line of a Checkout Session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineItem {
    /// A Price configured in the Stripe dashboard
    Price { price_id: String, quantity: u64 },

    /// Ad-hoc EUR price, VAT added on top through `tax_rates`
    Custom {
        name: String,
        unit_amount_cents: i64,
        quantity: u64,
        tax_rates: Vec<String>,
    },
}

impl LineItem {
    pub fn price(price_id: impl Into<String>) -> Self {
        LineItem::Price {
            price_id: price_id.into(),
            quantity: 1,
        }
    }

    pub fn quantity(&self) -> u64 {
        match self {
            LineItem::Price { quantity, .. } | LineItem::Custom { quantity, .. } => *quantity,
        }
    }
}

/// Settings copied onto the subscription a Checkout Session creates
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionTerms {
    pub metadata: StripeMetadata,
    pub default_tax_rates: Vec<String>,

    /// First billing date (UNIX seconds), used to align with an existing contract
    pub trial_end: Option<i64>,
}

/// Everything needed to open a hosted Checkout Session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionDraft {
    pub mode: PayMode,
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    pub client_reference_id: Option<String>,
    pub metadata: Option<StripeMetadata>,
    pub payment_intent_metadata: Option<StripeMetadata>,
    pub subscription: Option<SubscriptionTerms>,
    pub require_billing_address: bool,

    /// `Some(false)` pins manual tax rates
    pub automatic_tax: Option<bool>,
}

impl SessionDraft {
    fn new(mode: PayMode, urls: RedirectUrls) -> Self {
        Self {
            mode,
            line_items: Vec::new(),
            success_url: urls.success_url,
            cancel_url: urls.cancel_url,
            customer_email: None,
            customer_id: None,
            client_reference_id: None,
            metadata: None,
            payment_intent_metadata: None,
            subscription: None,
            require_billing_address: false,
            automatic_tax: None,
        }
    }
}

/// Where Stripe sends the customer back to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl RedirectUrls {
    /// Contract checkout: back to the landing payment page
    pub fn for_checkout(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/pago?status=success&session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/pago?status=failed&canceled=1"),
        }
    }

    /// Mail add-on: to the confirmation page
    pub fn for_mail_addon(site_url: &str) -> Self {
        let base = site_url.trim_end_matches('/');
        Self {
            success_url: format!(
                "{base}/confirmacion?session_id={{CHECKOUT_SESSION_ID}}&status=success&paid=1"
            ),
            cancel_url: format!("{base}/pago?status=cancelled"),
        }
    }
}

/// A contract checkout ready to submit
#[derive(Clone, Debug)]
pub struct CheckoutPlan {
    pub normalized: NormalizedCheckout,
    pub lead_id: String,
    pub draft: SessionDraft,
}

/// Validate a contract checkout body and turn it into a session draft
pub fn plan_checkout(body: &Value, catalog: &PriceCatalog, urls: RedirectUrls) -> Result<CheckoutPlan> {
    let plan = body
        .get("planId")
        .and_then(non_blank)
        .as_deref()
        .and_then(PlanTerm::parse)
        .ok_or_else(|| Rejection::bad_request("invalid-plan", "Invalid planId"))?;

    let normalized = NormalizedCheckout::from_body(body, plan);
    let lead_id = normalized.lead_id.clone().ok_or_else(|| {
        Rejection::bad_request("missing-lead-id", "Missing lead_id/orderId in metadata")
    })?;

    let session_metadata =
        normalized.session_metadata(body.get("metadata").and_then(Value::as_object));

    let mut draft = SessionDraft::new(normalized.pay_mode, urls);
    draft.customer_email = normalized.email.clone();
    draft.client_reference_id = Some(lead_id.clone());
    draft.require_billing_address = true;

    match normalized.pay_mode {
        PayMode::Subscription => {
            let plan_price = catalog.monthly_price(plan).ok_or_else(|| {
                Rejection::bad_request(
                    "missing-price",
                    format!(
                        "Missing monthly Price ID for planId={plan}. Check env {}.",
                        monthly_price_env(plan)
                    ),
                )
            })?;
            draft.line_items.push(LineItem::price(plan_price));

            if normalized.mail_enabled {
                let mail_price = normalized
                    .mail_plan
                    .and_then(|mail| catalog.mail_price(mail))
                    .ok_or_else(|| {
                        Rejection::bad_request(
                            "missing-mail-price",
                            "Mail plan enabled but no valid plan (lite/pro) or missing env Price ID.",
                        )
                    })?;
                draft.line_items.push(LineItem::price(mail_price));
            }

            draft.subscription = Some(SubscriptionTerms {
                metadata: session_metadata.clone(),
                default_tax_rates: catalog.tax_rates(),
                trial_end: None,
            });
        }
        PayMode::Payment => {
            let upfront = upfront_price(plan);
            draft.line_items.push(LineItem::Custom {
                name: upfront.name,
                unit_amount_cents: upfront.cents,
                quantity: 1,
                tax_rates: catalog.tax_rates(),
            });

            // Monthly mail fee billed for the whole term
            if let (true, Some(mail)) = (normalized.mail_enabled, normalized.mail_plan) {
                draft.line_items.push(LineItem::Custom {
                    name: format!(
                        "Gestión de correo — {} · {} meses",
                        mail.display_name(),
                        normalized.months
                    ),
                    unit_amount_cents: mail.monthly_net_cents(),
                    quantity: u64::from(normalized.months),
                    tax_rates: catalog.tax_rates(),
                });
            }

            draft.automatic_tax = Some(false);
            draft.payment_intent_metadata = Some(session_metadata.clone());
        }
    }

    draft.metadata = Some(session_metadata);

    Ok(CheckoutPlan {
        normalized,
        lead_id,
        draft,
    })
}

/// Body of a mail add-on checkout request
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailCheckoutRequest {
    #[serde(default)]
    pub customer_id: Option<String>,

    /// `lite` (default) or `pro`
    #[serde(default)]
    pub plan: Option<String>,

    /// UNIX timestamp of the first charge, as number or numeric string
    #[serde(default)]
    pub trial_end: Option<Value>,

    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Validate a mail add-on request and turn it into a session draft
pub fn plan_mail_addon(
    request: &MailCheckoutRequest,
    catalog: &PriceCatalog,
    urls: RedirectUrls,
) -> Result<SessionDraft> {
    let customer_id = request
        .customer_id
        .as_deref()
        .map(str::trim)
        .filter(|id| id.starts_with("cus_"))
        .ok_or_else(|| Rejection::bad_request("invalid-customer", "customerId(cus_...) is required"))?;

    let plan_name = request.plan.as_deref().unwrap_or("lite").trim().to_lowercase();
    let mail_plan = match plan_name.as_str() {
        "lite" => Some(MailPlan::Lite),
        "pro" => Some(MailPlan::Pro),
        _ => None,
    };
    let (mail_plan, price_id) = mail_plan
        .and_then(|plan| catalog.mail_price(plan).map(|price| (plan, price)))
        .ok_or_else(|| Rejection::bad_request("invalid-mail-plan", "plan must be 'lite' or 'pro'"))?;

    let raw = request.metadata.clone().unwrap_or_default();

    let mut subscription_metadata = StripeMetadata::new();
    subscription_metadata.insert("feature", "mail_addon_only");
    subscription_metadata.insert("mail_plan", mail_plan.as_str());
    for (key, value) in &raw {
        subscription_metadata.insert_value(key, value);
    }

    let raw = Value::Object(raw);
    let mut draft = SessionDraft::new(PayMode::Subscription, urls);
    draft.customer_id = Some(customer_id.to_string());
    draft.client_reference_id = metadata::first_non_blank(&raw, &["lead_id", "orderId"]);
    draft.line_items.push(LineItem::price(price_id));
    draft.subscription = Some(SubscriptionTerms {
        metadata: subscription_metadata,
        default_tax_rates: catalog.tax_rates(),
        trial_end: request.trial_end.as_ref().and_then(parse_timestamp),
    });

    Ok(draft)
}

/// Finite, non-zero UNIX timestamp from a number or numeric string
fn parse_timestamp(value: &Value) -> Option<i64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !seconds.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let seconds = seconds.trunc() as i64;
    (seconds != 0).then_some(seconds)
}

/// Session returned by the payment provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: String,
    pub url: String,
}

/// Opens hosted Checkout Sessions
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, draft: &SessionDraft) -> Result<CreatedSession>;
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;

        Ok(Self::new(&secret_key))
    }

    /// Get the underlying Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl CheckoutGateway for StripeClient {
    async fn create_session(&self, draft: &SessionDraft) -> Result<CreatedSession> {
        let params = build_params(draft)?;

        let session = StripeCheckoutSession::create(&self.client, params).await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        tracing::info!(
            session_id = %session.id,
            mode = draft.mode.as_str(),
            reference = ?draft.client_reference_id,
            "Created Stripe checkout session"
        );

        Ok(CreatedSession {
            id: session.id.to_string(),
            url,
        })
    }
}

fn to_stripe_metadata(metadata: &StripeMetadata) -> HashMap<String, String> {
    metadata.clone().into_iter().collect()
}

/// Translate a draft into Stripe request parameters
fn build_params(draft: &SessionDraft) -> Result<CreateCheckoutSession<'_>> {
    let mut params = CreateCheckoutSession::new();
    params.mode = Some(match draft.mode {
        PayMode::Payment => CheckoutSessionMode::Payment,
        PayMode::Subscription => CheckoutSessionMode::Subscription,
    });
    params.success_url = Some(&draft.success_url);
    params.cancel_url = Some(&draft.cancel_url);
    params.customer_email = draft.customer_email.as_deref();
    params.client_reference_id = draft.client_reference_id.as_deref();
    params.locale = Some(CheckoutSessionLocale::Auto);

    params.customer = draft
        .customer_id
        .as_deref()
        .map(str::parse::<CustomerId>)
        .transpose()
        .map_err(|e| PaymentError::Stripe(format!("Invalid customer id: {e}")))?;

    if draft.require_billing_address {
        params.billing_address_collection = Some(CheckoutSessionBillingAddressCollection::Required);
    }

    if let Some(enabled) = draft.automatic_tax {
        params.automatic_tax = Some(CreateCheckoutSessionAutomaticTax {
            enabled,
            ..Default::default()
        });
    }

    params.metadata = draft.metadata.as_ref().map(to_stripe_metadata);

    if let Some(metadata) = &draft.payment_intent_metadata {
        params.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            metadata: Some(to_stripe_metadata(metadata)),
            ..Default::default()
        });
    }

    if let Some(terms) = &draft.subscription {
        params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            metadata: Some(to_stripe_metadata(&terms.metadata)),
            default_tax_rates: (!terms.default_tax_rates.is_empty())
                .then(|| terms.default_tax_rates.clone()),
            trial_end: terms.trial_end,
            ..Default::default()
        });
    }

    params.line_items = Some(draft.line_items.iter().map(to_stripe_line_item).collect());

    Ok(params)
}

fn to_stripe_line_item(item: &LineItem) -> CreateCheckoutSessionLineItems {
    match item {
        LineItem::Price { price_id, quantity } => CreateCheckoutSessionLineItems {
            price: Some(price_id.clone()),
            quantity: Some(*quantity),
            ..Default::default()
        },
        LineItem::Custom {
            name,
            unit_amount_cents,
            quantity,
            tax_rates,
        } => CreateCheckoutSessionLineItems {
            quantity: Some(*quantity),
            tax_rates: (!tax_rates.is_empty()).then(|| tax_rates.clone()),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::EUR,
                unit_amount: Some(*unit_amount_cents),
                tax_behavior: Some(CreateCheckoutSessionLineItemsPriceDataTaxBehavior::Exclusive),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    }
}
