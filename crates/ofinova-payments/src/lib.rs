//! # ofinova-payments
//!
//! Stripe side of the Ofinova landing checkout.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────┐   ┌─────────────┐
//! │  Landing    │──▶│ plan_checkout│──▶│ CheckoutGateway │──▶│  Stripe     │
//! │  (Framer)   │   │ SessionDraft │   │ (StripeClient)  │   │  Checkout   │
//! └─────────────┘   └──────────────┘   └─────────────────┘   └─────────────┘
//!                                               │
//!                                               ▼
//!                                     ┌────────────────────┐
//!                                     │ AutomationNotifier │ (fire-and-forget)
//!                                     └────────────────────┘
//! ```
//!
//! Contract terms can be paid upfront (`payment` mode, ad-hoc EUR prices
//! with a manual IVA tax rate) or monthly (`subscription` mode, dashboard
//! Price IDs). The mail add-on can be bundled into either, or bought later
//! for an existing customer.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ofinova_payments::{CheckoutGateway, PriceCatalog, RedirectUrls, StripeClient, plan_checkout};
//!
//! let stripe = StripeClient::new("sk_test_xxx");
//! let catalog = PriceCatalog::from_env();
//!
//! let plan = plan_checkout(&body, &catalog, RedirectUrls::for_checkout("https://ofinova-madrid.es"))?;
//! let session = stripe.create_session(&plan.draft).await?;
//!
//! // Redirect user to: session.url
//! ```

mod checkout;
mod error;
mod notify;
mod pricing;
mod webhook;

pub use checkout::{
    CheckoutGateway, CheckoutPlan, CreatedSession, LineItem, MailCheckoutRequest, RedirectUrls,
    SessionDraft, StripeClient, SubscriptionTerms, plan_checkout, plan_mail_addon,
};
pub use error::{PaymentError, Result};
pub use notify::{AutomationNotifier, Notification, NotifierConfig};
pub use pricing::{DEFAULT_TAX_RATE_ID, PriceCatalog, UpfrontPrice, upfront_price};
pub use webhook::{StripeEvent, WebhookEvent, WebhookHandler, sign_payload};
