//! Vault execution bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Non-custodial vault execution and settlement bot.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via VAULT_BOT_CONFIG).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    vault_bot::logging::init_logging();
    info!("Starting vault-bot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("VAULT_BOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    info!(config_path = %config_path, "Loading configuration");

    let config = vault_bot::AppConfig::from_file(&config_path)?;
    info!(
        rpc_url = %config.chain.rpc_url,
        venue_api = %config.venue.api_url,
        coin = %config.engine.coin,
        "Configuration loaded"
    );

    let app = vault_bot::Application::new(config);
    app.run().await?;

    Ok(())
}
