//! Automation Webhook
//!
//! Mirrors checkout and contract events to an outbound automation hook
//! (Make/Zapier style) so that CRM updates and emails happen outside the
//! request path. Delivery is fire-and-forget with a short timeout: the
//! caller never waits for the hook, and failures are only logged.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

use ofinova_core::NormalizedCheckout;

use crate::checkout::CreatedSession;

/// Automation hook configuration
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    /// Hook URL; `None` disables notifications
    pub url: Option<String>,

    /// Per-delivery timeout
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_millis(3000),
        }
    }
}

impl NotifierConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let timeout_ms = get("AUTOMATION_WEBHOOK_TIMEOUT_MS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(3000);

        Self {
            url: get("AUTOMATION_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// Envelope posted to the hook
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub event: String,
    pub sent_at: String,
    pub data: Value,
}

impl Notification {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            sent_at: Utc::now().to_rfc3339(),
            data,
        }
    }

    /// `checkout.session.created` payload: the normalized request plus the session
    pub fn checkout_created(checkout: &NormalizedCheckout, session: &CreatedSession) -> Self {
        Self::new(
            "checkout.session.created",
            json!({
                "checkout": checkout,
                "session_id": session.id,
                "url": session.url,
            }),
        )
    }
}

/// Fire-and-forget poster
#[derive(Clone)]
pub struct AutomationNotifier {
    client: reqwest::Client,
    config: NotifierConfig,
}

impl AutomationNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Automation client fell back to defaults: {}", e);
                reqwest::Client::new()
            });
        Self { client, config }
    }

    pub fn from_env() -> Self {
        Self::new(NotifierConfig::from_env())
    }

    /// Notifier that drops every notification
    pub fn disabled() -> Self {
        Self::new(NotifierConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.url.is_some()
    }

    /// Deliver in the background. Must be called inside a Tokio runtime.
    pub fn notify(&self, notification: Notification) {
        let Some(url) = self.config.url.clone() else {
            tracing::debug!(event = %notification.event, "Automation hook not configured");
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            let event = notification.event.clone();
            match client.post(&url).json(&notification).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(event = %event, "Automation hook delivered");
                }
                Ok(response) => {
                    tracing::warn!(event = %event, status = %response.status(), "Automation hook rejected notification");
                }
                Err(e) => {
                    tracing::warn!(event = %event, error = %e, "Automation hook delivery failed");
                }
            }
        });
    }
}
