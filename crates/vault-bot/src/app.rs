//! Application wiring.
//!
//! Builds the store, gateways and engine from configuration, verifies
//! the fatal startup invariants (key addresses, contract wiring), and
//! runs the poll loop until shutdown.

use std::sync::Arc;

use tracing::info;

use vault_engine::Engine;
use vault_persistence::ExecutionStore;
use vault_venue::{DynVenueGateway, ExchangeSigner, HyperliquidGateway};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::keys;

/// The assembled application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Wire everything up and run until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        let chain_signer = keys::load_signer(
            &self.config.chain.key_source(),
            self.config.chain.signer_address,
        )?;
        let venue_signer = keys::load_signer(&self.config.venue.key_source(), None)?;
        info!(
            chain_signer = %chain_signer.address(),
            venue_agent = %venue_signer.address(),
            "Keys loaded"
        );

        let store = ExecutionStore::open(&self.config.database_path).await?;

        let venue: DynVenueGateway = Arc::new(HyperliquidGateway::new(
            &self.config.venue.api_url,
            ExchangeSigner::new(venue_signer, self.config.venue.is_mainnet),
            self.config.venue.user_address,
            self.config.venue.vault_address,
        )?);

        // Fatal on any wiring mismatch: running against a misconfigured
        // signer/adapter chain must never reach the poll loop.
        let chain = vault_chain::connect(
            &self.config.chain.rpc_url,
            chain_signer,
            self.config.chain.executor_address,
        )
        .await?;

        let mut engine =
            Engine::bootstrap(chain, venue, store, self.config.engine.clone()).await?;

        tokio::select! {
            result = engine.run() => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping");
            }
        }
        Ok(())
    }
}
