//! EVM implementation of the chain gateway.
//!
//! Talks to the vault's three contracts: the trade executor (intent
//! events, settlement entrypoint), the settlement adapter, and the risk
//! manager (pause flag). Contract wiring is verified once at connect
//! time; a mismatch there means the bot would be submitting settlements
//! a different signer set up, so it is treated as fatal.

use std::marker::PhantomData;
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, I256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::Transport;
use tracing::{info, warn};

use crate::error::{ChainError, Result};
use crate::gateway::{BoxFuture, ChainGateway, DynChainGateway, IntentEvent, SettlementRequest};

sol! {
    #[sol(rpc)]
    contract ITradeExecutor {
        event IntentExecuted(uint256 indexed nonce);

        function settleTrade(uint256 nonce, int256 netPnlUsd, uint256 newAssets, uint256 exposureUsd) external;
        function isSettled(uint256 nonce) external view returns (bool);

        function signer() external view returns (address);
        function adapter() external view returns (address);
    }

    #[sol(rpc)]
    contract ISettlementAdapter {
        function executor() external view returns (address);
        function riskManager() external view returns (address);
    }

    #[sol(rpc)]
    contract IRiskManager {
        function settlementAdapter() external view returns (address);
        function tradingPaused() external view returns (bool);
    }
}

/// [`ChainGateway`] over an alloy provider.
pub struct EvmChainGateway<T, P> {
    provider: P,
    executor_address: Address,
    risk_manager_address: Address,
    _transport: PhantomData<fn() -> T>,
}

/// Connect to `rpc_url`, verify contract wiring, and return the gateway.
///
/// The signer is both the transaction sender and the address the
/// executor contract must have configured as its settlement signer.
pub async fn connect(
    rpc_url: &str,
    signer: PrivateKeySigner,
    executor_address: Address,
) -> Result<DynChainGateway> {
    let url = rpc_url
        .parse()
        .map_err(|e| ChainError::Config(format!("invalid RPC url {rpc_url}: {e}")))?;
    let bot_address = signer.address();
    let wallet = EthereumWallet::from(signer);
    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(wallet)
        .on_http(url);

    let gateway = EvmChainGateway::verify_and_build(provider, executor_address, bot_address).await?;
    Ok(Arc::new(gateway))
}

impl<T, P> EvmChainGateway<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Clone + Send + Sync + 'static,
{
    /// Walk the contract wiring and fail on any mismatch:
    /// executor.signer must be our key, executor.adapter and
    /// adapter.riskManager must be set, adapter.executor must point back,
    /// and riskManager.settlementAdapter must point at the adapter.
    pub async fn verify_and_build(
        provider: P,
        executor_address: Address,
        bot_address: Address,
    ) -> Result<Self> {
        let executor = ITradeExecutor::new(executor_address, provider.clone());

        let onchain_signer = executor.signer().call().await.map_err(rpc_err)?._0;
        if onchain_signer != bot_address {
            return Err(ChainError::Config(format!(
                "executor signer is {onchain_signer}, bot key derives {bot_address}"
            )));
        }

        let adapter_address = executor.adapter().call().await.map_err(rpc_err)?._0;
        if adapter_address == Address::ZERO {
            return Err(ChainError::Config("executor has no adapter set".into()));
        }

        let adapter = ISettlementAdapter::new(adapter_address, provider.clone());
        let adapter_executor = adapter.executor().call().await.map_err(rpc_err)?._0;
        if adapter_executor != executor_address {
            return Err(ChainError::Config(format!(
                "adapter points at executor {adapter_executor}, expected {executor_address}"
            )));
        }

        let risk_manager_address = adapter.riskManager().call().await.map_err(rpc_err)?._0;
        if risk_manager_address == Address::ZERO {
            return Err(ChainError::Config("adapter has no risk manager set".into()));
        }

        let risk_manager = IRiskManager::new(risk_manager_address, provider.clone());
        let settlement_adapter = risk_manager
            .settlementAdapter()
            .call()
            .await
            .map_err(rpc_err)?
            ._0;
        if settlement_adapter != adapter_address {
            return Err(ChainError::Config(format!(
                "risk manager settlement adapter is {settlement_adapter}, expected {adapter_address}"
            )));
        }

        info!(
            executor = %executor_address,
            adapter = %adapter_address,
            risk_manager = %risk_manager_address,
            signer = %bot_address,
            "Contract wiring verified"
        );

        Ok(Self {
            provider,
            executor_address,
            risk_manager_address,
            _transport: PhantomData,
        })
    }

    fn executor(&self) -> ITradeExecutor::ITradeExecutorInstance<T, P> {
        ITradeExecutor::new(self.executor_address, self.provider.clone())
    }

    fn risk_manager(&self) -> IRiskManager::IRiskManagerInstance<T, P> {
        IRiskManager::new(self.risk_manager_address, self.provider.clone())
    }
}

impl<T, P> ChainGateway for EvmChainGateway<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Clone + Send + Sync + 'static,
{
    fn latest_block(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            self.provider
                .get_block_number()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
    }

    fn intent_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> BoxFuture<'_, Result<Vec<IntentEvent>>> {
        Box::pin(async move {
            let logs = self
                .executor()
                .IntentExecuted_filter()
                .from_block(from_block)
                .to_block(to_block)
                .query()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;

            let mut events = Vec::with_capacity(logs.len());
            for (event, log) in logs {
                let nonce = u64::try_from(event.nonce)
                    .map_err(|_| ChainError::Rpc(format!("intent nonce overflows u64: {}", event.nonce)))?;
                let block_number = log.block_number.unwrap_or(from_block);
                events.push(IntentEvent {
                    nonce,
                    block_number,
                });
            }
            Ok(events)
        })
    }

    fn is_trading_paused(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            Ok(self
                .risk_manager()
                .tradingPaused()
                .call()
                .await
                .map_err(rpc_err)?
                ._0)
        })
    }

    fn is_settled(&self, nonce: u64) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            Ok(self
                .executor()
                .isSettled(U256::from(nonce))
                .call()
                .await
                .map_err(rpc_err)?
                ._0)
        })
    }

    fn simulate_settlement(&self, request: SettlementRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.executor()
                .settleTrade(
                    U256::from(request.nonce),
                    net_pnl_to_i256(request.net_pnl_usd),
                    U256::from(request.new_assets_usd),
                    U256::from(request.exposure_usd),
                )
                .call()
                .await
                .map(|_| ())
                .map_err(|e| ChainError::Reverted(e.to_string()))
        })
    }

    fn submit_settlement(&self, request: SettlementRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let pending = self
                .executor()
                .settleTrade(
                    U256::from(request.nonce),
                    net_pnl_to_i256(request.net_pnl_usd),
                    U256::from(request.new_assets_usd),
                    U256::from(request.exposure_usd),
                )
                .send()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;

            let receipt = pending
                .get_receipt()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;

            if !receipt.status() {
                warn!(nonce = request.nonce, tx = %receipt.transaction_hash, "Settlement transaction reverted");
                return Err(ChainError::Reverted(format!(
                    "settlement tx {:#x} reverted on chain",
                    receipt.transaction_hash
                )));
            }
            Ok(format!("{:#x}", receipt.transaction_hash))
        })
    }
}

fn rpc_err(e: alloy::contract::Error) -> ChainError {
    ChainError::Rpc(e.to_string())
}

fn net_pnl_to_i256(value: i64) -> I256 {
    // i64 always fits in I256.
    I256::try_from(value).unwrap_or(I256::ZERO)
}
