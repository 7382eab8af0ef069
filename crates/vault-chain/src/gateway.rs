//! Chain gateway trait and test double.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A trade intent emitted by the executor contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentEvent {
    pub nonce: u64,
    pub block_number: u64,
}

/// Settlement values reported back to the chain, pre-rounded to the
/// integer units the contract expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementRequest {
    pub nonce: u64,
    /// Net PnL in whole USD, signed.
    pub net_pnl_usd: i64,
    /// Post-trade vault assets in whole USD.
    pub new_assets_usd: u64,
    /// Post-trade exposure in whole USD.
    pub exposure_usd: u64,
}

/// Abstraction over the vault's on-chain contracts.
pub trait ChainGateway: Send + Sync {
    /// Current chain head block number.
    fn latest_block(&self) -> BoxFuture<'_, Result<u64>>;

    /// Intent events emitted in `[from_block, to_block]`, inclusive.
    fn intent_events(&self, from_block: u64, to_block: u64)
        -> BoxFuture<'_, Result<Vec<IntentEvent>>>;

    /// Risk manager's emergency pause flag.
    fn is_trading_paused(&self) -> BoxFuture<'_, Result<bool>>;

    /// Whether the contract has already recorded a settlement for this
    /// nonce. Guards against replayed intent events.
    fn is_settled(&self, nonce: u64) -> BoxFuture<'_, Result<bool>>;

    /// Simulate the settlement call without submitting. Returns
    /// `ChainError::Reverted` with the reason if it would revert.
    fn simulate_settlement(&self, request: SettlementRequest) -> BoxFuture<'_, Result<()>>;

    /// Submit the settlement transaction and wait for its receipt.
    /// Returns the transaction hash.
    fn submit_settlement(&self, request: SettlementRequest) -> BoxFuture<'_, Result<String>>;
}

/// Shared trait object alias.
pub type DynChainGateway = Arc<dyn ChainGateway>;

// ============================================================================
// Mock
// ============================================================================

pub mod mock {
    //! Scriptable in-memory chain for engine tests.

    use std::collections::HashSet;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::ChainError;

    /// In-memory [`ChainGateway`] with scriptable state.
    #[derive(Default)]
    pub struct MockChainGateway {
        inner: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        latest_block: u64,
        events: Vec<IntentEvent>,
        paused: bool,
        settled: HashSet<u64>,
        simulation_revert: Option<String>,
        submissions: Vec<SettlementRequest>,
    }

    impl MockChainGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Advance the chain head and emit an intent at the new block.
        pub fn emit_intent(&self, nonce: u64) {
            let mut state = self.inner.lock();
            state.latest_block += 1;
            let block_number = state.latest_block;
            state.events.push(IntentEvent {
                nonce,
                block_number,
            });
        }

        /// Advance the chain head without emitting anything.
        pub fn advance_blocks(&self, count: u64) {
            self.inner.lock().latest_block += count;
        }

        pub fn set_paused(&self, paused: bool) {
            self.inner.lock().paused = paused;
        }

        /// Pre-mark a nonce as settled on chain (event replay scenario).
        pub fn force_settled(&self, nonce: u64) {
            self.inner.lock().settled.insert(nonce);
        }

        /// Make `simulate_settlement` revert with `reason`.
        pub fn revert_simulation(&self, reason: impl Into<String>) {
            self.inner.lock().simulation_revert = Some(reason.into());
        }

        pub fn clear_simulation_revert(&self) {
            self.inner.lock().simulation_revert = None;
        }

        /// All settlement requests actually submitted.
        pub fn submissions(&self) -> Vec<SettlementRequest> {
            self.inner.lock().submissions.clone()
        }
    }

    impl ChainGateway for MockChainGateway {
        fn latest_block(&self) -> BoxFuture<'_, Result<u64>> {
            Box::pin(async move { Ok(self.inner.lock().latest_block) })
        }

        fn intent_events(
            &self,
            from_block: u64,
            to_block: u64,
        ) -> BoxFuture<'_, Result<Vec<IntentEvent>>> {
            Box::pin(async move {
                Ok(self
                    .inner
                    .lock()
                    .events
                    .iter()
                    .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
                    .copied()
                    .collect())
            })
        }

        fn is_trading_paused(&self) -> BoxFuture<'_, Result<bool>> {
            Box::pin(async move { Ok(self.inner.lock().paused) })
        }

        fn is_settled(&self, nonce: u64) -> BoxFuture<'_, Result<bool>> {
            Box::pin(async move { Ok(self.inner.lock().settled.contains(&nonce)) })
        }

        fn simulate_settlement(&self, request: SettlementRequest) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                let state = self.inner.lock();
                if let Some(reason) = &state.simulation_revert {
                    return Err(ChainError::Reverted(reason.clone()));
                }
                if state.settled.contains(&request.nonce) {
                    return Err(ChainError::Reverted("already settled".into()));
                }
                Ok(())
            })
        }

        fn submit_settlement(&self, request: SettlementRequest) -> BoxFuture<'_, Result<String>> {
            Box::pin(async move {
                let mut state = self.inner.lock();
                if state.settled.contains(&request.nonce) {
                    return Err(ChainError::Reverted("already settled".into()));
                }
                state.settled.insert(request.nonce);
                state.submissions.push(request);
                Ok(format!("0x{:064x}", request.nonce))
            })
        }
    }
}
