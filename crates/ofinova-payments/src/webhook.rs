//! Stripe Webhook Handling
//!
//! Verifies the `Stripe-Signature` header and logs the events the landing
//! flow cares about. Nothing is persisted; Stripe stays the source of truth.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed payload, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Raw Stripe event envelope
#[derive(Clone, Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub data: EventData,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: Value,
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Hosted checkout finished
    CheckoutCompleted {
        session_id: String,
        customer_email: Option<String>,
        client_reference_id: Option<String>,
    },

    /// Upfront payment captured
    PaymentSucceeded {
        payment_intent_id: String,
        amount: i64,
        currency: String,
    },

    /// Charge (partially) refunded
    ChargeRefunded {
        charge_id: String,
        amount_refunded: i64,
    },

    /// Unhandled event type
    Other { event_type: String },
}

impl WebhookEvent {
    pub fn from_stripe(event: &StripeEvent) -> Self {
        let object = &event.data.object;
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let amount = |key: &str| object.get(key).and_then(Value::as_i64).unwrap_or_default();

        match event.event_type.as_str() {
            "checkout.session.completed" => WebhookEvent::CheckoutCompleted {
                session_id: text("id").unwrap_or_default(),
                customer_email: object
                    .get("customer_details")
                    .and_then(|details| details.get("email"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| text("customer_email")),
                client_reference_id: text("client_reference_id"),
            },
            "payment_intent.succeeded" => WebhookEvent::PaymentSucceeded {
                payment_intent_id: text("id").unwrap_or_default(),
                amount: amount("amount"),
                currency: text("currency").unwrap_or_default(),
            },
            "charge.refunded" => WebhookEvent::ChargeRefunded {
                charge_id: text("id").unwrap_or_default(),
                amount_refunded: amount("amount_refunded"),
            },
            other => WebhookEvent::Other {
                event_type: other.to_string(),
            },
        }
    }
}

/// Webhook verifier
pub struct WebhookHandler {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookHandler {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Create from `STRIPE_WEBHOOK_SECRET`
    pub fn from_env() -> Result<Self> {
        std::env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify the signature header against the raw payload
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<()> {
        self.verify_at(payload, signature_header, Utc::now().timestamp())
    }

    fn verify_at(&self, payload: &[u8], signature_header: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::WebhookSignature("no v1 signature".into()));
        }
        if now.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() {
            return Err(PaymentError::WebhookSignature(
                "timestamp outside the tolerance zone".into(),
            ));
        }

        let matched = signatures.iter().any(|signature| {
            let Ok(expected) = hex::decode(signature) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
                return false;
            };
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            mac.verify_slice(&expected).is_ok()
        });

        if matched {
            Ok(())
        } else {
            Err(PaymentError::WebhookSignature(
                "no signatures found matching the expected signature for payload".into(),
            ))
        }
    }

    /// Verify signature and parse event
    pub fn parse_event(&self, payload: &[u8], signature_header: &str) -> Result<StripeEvent> {
        self.verify(payload, signature_header)?;
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    /// Log a verified event
    pub fn handle(&self, event: &StripeEvent) -> WebhookEvent {
        let parsed = WebhookEvent::from_stripe(event);

        match &parsed {
            WebhookEvent::CheckoutCompleted {
                session_id,
                customer_email,
                client_reference_id,
            } => {
                tracing::info!(
                    event_id = %event.id,
                    session_id = %session_id,
                    email = ?customer_email,
                    lead_id = ?client_reference_id,
                    "checkout.session.completed"
                );
            }
            WebhookEvent::PaymentSucceeded {
                payment_intent_id,
                amount,
                currency,
            } => {
                tracing::info!(
                    event_id = %event.id,
                    payment_intent_id = %payment_intent_id,
                    amount = amount,
                    currency = %currency,
                    "payment_intent.succeeded"
                );
            }
            WebhookEvent::ChargeRefunded {
                charge_id,
                amount_refunded,
            } => {
                tracing::info!(
                    event_id = %event.id,
                    charge_id = %charge_id,
                    amount_refunded = amount_refunded,
                    "charge.refunded"
                );
            }
            WebhookEvent::Other { event_type } => {
                tracing::info!(event_id = %event.id, event_type = %event_type, "Unhandled webhook event");
            }
        }

        parsed
    }
}

/// Build a `Stripe-Signature` header value for a payload
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
}
