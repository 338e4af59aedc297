//! Application State

use std::sync::Arc;

use ofinova_core::OriginPolicy;
use ofinova_integrations::{
    AirtableClient, ContractConfig, ContractService, KycConfig, KycService, LeadStore, ObjectStorage,
    SupabaseStorage,
};
use ofinova_payments::{AutomationNotifier, CheckoutGateway, PriceCatalog, StripeClient, WebhookHandler};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Origin allowlist for the CORS middleware
    pub cors: Arc<OriginPolicy>,

    /// Checkout gateway (optional - None if Stripe is not configured)
    pub checkout: Option<Arc<dyn CheckoutGateway>>,

    pub catalog: Arc<PriceCatalog>,

    /// Stripe webhook verifier (optional - None without a signing secret)
    pub webhook: Option<Arc<WebhookHandler>>,

    /// Automation webhook mirror; a no-op when unset
    pub notifier: AutomationNotifier,

    /// Lead store (optional - None if Airtable is not configured)
    pub leads: Option<Arc<dyn LeadStore>>,

    /// Object storage (optional - None if Supabase is not configured)
    pub storage: Option<Arc<dyn ObjectStorage>>,

    pub kyc: Arc<KycService>,

    /// Contract renderer (optional - None if the templates failed to load)
    pub contracts: Option<Arc<ContractService>>,
}

impl AppState {
    /// State with every vendor disabled
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            cors: Arc::new(OriginPolicy::default()),
            checkout: None,
            catalog: Arc::new(PriceCatalog::default()),
            webhook: None,
            notifier: AutomationNotifier::disabled(),
            leads: None,
            storage: None,
            kyc: Arc::new(KycService::new(&KycConfig::default())),
            contracts: None,
        }
    }

    /// Build from environment, logging which integrations are live
    pub fn from_env() -> Self {
        let config = ServerConfig::from_env();

        let checkout: Option<Arc<dyn CheckoutGateway>> = match StripeClient::from_env() {
            Ok(client) => {
                tracing::info!("✓ Stripe configured");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("⚠ Stripe not configured - payments disabled ({})", e);
                tracing::warn!("  Set STRIPE_SECRET_KEY in .env");
                None
            }
        };

        let webhook = match WebhookHandler::from_env() {
            Ok(handler) => Some(Arc::new(handler)),
            Err(e) => {
                tracing::warn!("⚠ Stripe webhook disabled ({})", e);
                None
            }
        };

        let notifier = AutomationNotifier::from_env();
        if notifier.is_enabled() {
            tracing::info!("✓ Automation webhook configured");
        }

        let leads: Option<Arc<dyn LeadStore>> = match AirtableClient::from_env() {
            Ok(client) => {
                tracing::info!("✓ Airtable configured");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("⚠ Airtable not configured - lead upserts disabled ({})", e);
                None
            }
        };

        let storage: Option<Arc<dyn ObjectStorage>> = match SupabaseStorage::from_env() {
            Ok(client) => {
                tracing::info!("✓ Supabase storage configured");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("⚠ Supabase not configured - uploads disabled ({})", e);
                None
            }
        };

        let contracts = match ContractService::from_config(&ContractConfig::from_env()) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                tracing::error!("Contract templates failed to load: {}", e);
                None
            }
        };

        Self {
            config: Arc::new(config),
            cors: Arc::new(OriginPolicy::from_lookup(|key| std::env::var(key).ok())),
            checkout,
            catalog: Arc::new(PriceCatalog::from_env()),
            webhook,
            notifier,
            leads,
            storage,
            kyc: Arc::new(KycService::new(&KycConfig::from_env())),
            contracts,
        }
    }
}
