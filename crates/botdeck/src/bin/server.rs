//! Platform server binary
//!
//! Run with: cargo run -p botdeck --bin botdeck-server

use botdeck::{AppConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botdeck=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("BOTDECK_CONFIG").unwrap_or_else(|_| "botdeck.toml".into());
    let config = AppConfig::load(&config_path)?.apply_env();

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Uploads: {}", config.storage.upload_dir.display());
    tracing::info!("  - Completion API: {}", config.llm.base_url);

    if config.auth.jwt_secret == "change-me" {
        tracing::warn!("JWT_SECRET is unset; using the insecure default");
    }
    if config.llm.api_key.is_empty() {
        tracing::warn!("OPENROUTER_API_KEY is unset; chat endpoints will fail until configured");
    }

    // Probe the upstream completion API
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/models", config.llm.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Completion API is reachable");
        }
        _ => {
            tracing::warn!("Completion API not reachable at {}", config.llm.base_url);
        }
    }

    // Create and start server
    let server = Server::new(config)?;

    tracing::info!("API: http://{}/api", server.address());
    tracing::info!("Health: http://{}/api/health", server.address());

    server.start().await?;

    Ok(())
}
