//! PhoneSync API Server
//!
//! Receives Stripe checkout webhooks and reconciles the customer's phone
//! number into the CRM.

use std::net::SocketAddr;
use std::sync::Arc;

use phonesync_api::{create_router, AppState, Config, LogFormat};
use phonesync_reconcile::EnvSecretStore;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    let json = LogFormat::from_env() == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,phonesync_api=debug,phonesync_reconcile=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!("Starting PhoneSync API Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        base_url = %config.sync.base_url,
        company_id = %config.sync.company_id,
        default_location_id = %config.sync.default_location_id,
        location_retry_total_secs = config.sync.location_retry.total_wait().as_secs(),
        "Configuration loaded"
    );

    let state = AppState::new(config.clone(), Arc::new(EnvSecretStore))?;

    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Parse bind address
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
