//! # ofinova-core
//!
//! Request-level logic shared by the Ofinova landing API handlers.
//!
//! Nothing in here talks to the network. The vendor crates
//! (`ofinova-payments`, `ofinova-integrations`) and the HTTP server build on
//! these pieces:
//!
//! - [`plan`]: contract terms, mail add-on tiers, payment modes
//! - [`metadata`]: multi-alias field resolution and Stripe metadata shaping
//! - [`cors`]: origin allowlist with a fallback origin
//! - [`error`]: client-side rejections with stable reason codes

pub mod cors;
pub mod error;
pub mod metadata;
pub mod plan;

pub use cors::OriginPolicy;
pub use error::{Rejection, RejectionKind, Result};
pub use metadata::{NormalizedCheckout, StripeMetadata};
pub use plan::{MailPlan, PayMode, PlanTerm};
