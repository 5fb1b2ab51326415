use anyhow::Context;
use productos_api::config::Config;
use productos_api::server;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "productos_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Starting productos-api server...");

    // Refuses to serve without a reachable store
    if let Err(e) = server::run(config).await {
        tracing::error!("Server failed to start: {}", e);
        return Err(e).context("Server failed to start");
    }

    tracing::info!("Server stopped");
    Ok(())
}
