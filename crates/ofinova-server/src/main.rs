//! Ofinova landing API server
//!
//! Checkout sessions, lead upserts, KYC uploads and contract PDFs for the
//! landing page.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ofinova_server::{AppState, ROUTE_METHODS, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let state = AppState::from_env();
    let addr = state.config.bind_addr.clone();

    tracing::info!("CORS allowlist: {}", state.cors.allowed().join(", "));

    let router = app(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 ofinova-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    for (path, methods) in ROUTE_METHODS {
        tracing::info!("  {:<20} {}", methods, path);
    }
    tracing::info!("");

    axum::serve(listener, router).await?;

    Ok(())
}
