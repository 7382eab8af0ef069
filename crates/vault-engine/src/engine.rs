//! The poll loop and execution state machine.
//!
//! One engine instance drives everything: each tick checks the pause
//! flag, ingests new intents from the chain, and advances every
//! unsettled execution through reconciliation toward settlement. All
//! state a tick needs lives on the engine or in the store; a crash at
//! any point is recovered by reloading unsettled rows on the next start.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use vault_chain::{DynChainGateway, IntentEvent, SettlementRequest};
use vault_core::{Execution, ExecutionStatus};
use vault_persistence::ExecutionStore;
use vault_venue::{AccountSnapshot, DynVenueGateway, OrderRequest};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::{reconcile, sizing, unwind};

/// Order-lifecycle orchestration engine.
pub struct Engine {
    chain: DynChainGateway,
    venue: DynVenueGateway,
    store: ExecutionStore,
    config: EngineConfig,
    /// Highest block already scanned for intents. Advances monotonically;
    /// a range is never re-scanned.
    last_block: u64,
}

impl Engine {
    /// Validate config, read the chain head, and report the recovery
    /// working set.
    ///
    /// Intent scanning starts from the current head, so intents emitted
    /// while the process was down are not picked up. Unsettled rows from
    /// a previous run are resumed as-is.
    pub async fn bootstrap(
        chain: DynChainGateway,
        venue: DynVenueGateway,
        store: ExecutionStore,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let last_block = chain.latest_block().await?;
        let pending = store.load_unsettled().await?;
        info!(
            last_block,
            pending = pending.len(),
            coin = %config.coin,
            "Engine bootstrapped"
        );
        for exec in &pending {
            debug!(
                nonce = exec.nonce,
                status = %exec.status,
                filled = %exec.filled_usd,
                "Resuming unsettled execution"
            );
        }

        Ok(Self {
            chain,
            venue,
            store,
            config,
            last_block,
        })
    }

    /// Run the poll loop until the task is cancelled.
    ///
    /// Tick errors are logged and the loop keeps going; only a
    /// non-retryable error stops it.
    pub async fn run(&mut self) -> Result<()> {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                if e.is_retryable() {
                    warn!(error = %e, "Tick failed, retrying next interval");
                } else {
                    error!(error = %e, "Fatal engine error");
                    return Err(e);
                }
            }
        }
    }

    /// One pass of the poll loop.
    pub async fn tick(&mut self) -> Result<()> {
        if self.chain.is_trading_paused().await? {
            warn!("Trading paused on chain, running emergency unwind");
            unwind::force_unwind_all(
                self.venue.as_ref(),
                self.config.unwind_noise_floor_usd,
                self.config.unwind_max_iterations,
                self.config.max_slippage_bps,
                Duration::from_millis(self.config.unwind_retry_delay_ms),
            )
            .await?;
            return Ok(());
        }

        // Snapshot the working set before ingestion: rows created this
        // tick get their first reconciliation next tick, after the venue
        // has had a chance to report the initial order's fills.
        let pending = self.store.load_unsettled().await?;

        self.ingest_intents().await?;

        for exec in pending {
            let nonce = exec.nonce;
            if let Err(e) = self.advance_execution(exec).await {
                if e.is_retryable() {
                    warn!(nonce, error = %e, "Execution advance failed, retrying next tick");
                } else {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Intent ingestion
    // ========================================================================

    /// Scan new blocks for intent events and open executions for them.
    ///
    /// The block pointer only advances after the whole range processed
    /// cleanly; a mid-range failure re-scans the same range next tick,
    /// which is safe because ingestion is idempotent per nonce.
    async fn ingest_intents(&mut self) -> Result<()> {
        let latest = self.chain.latest_block().await?;
        if latest <= self.last_block {
            return Ok(());
        }

        let events = self
            .chain
            .intent_events(self.last_block + 1, latest)
            .await?;
        for event in &events {
            self.ingest_intent(event).await?;
        }
        self.last_block = latest;
        Ok(())
    }

    async fn ingest_intent(&self, event: &IntentEvent) -> Result<()> {
        let nonce = event.nonce;

        if self.chain.is_settled(nonce).await? {
            debug!(nonce, "Intent already settled on chain, skipping");
            return Ok(());
        }
        if self.store.exists(nonce).await? {
            debug!(nonce, "Intent already tracked, skipping");
            return Ok(());
        }

        // Baseline snapshot before any order: funding accrued from here
        // on is attributed to this execution.
        let snapshot = self.venue.fetch_account_state().await?;
        let snapshot_json = serde_json::to_string(&snapshot)?;

        let mut exec = Execution::new(
            nonce,
            self.config.trade_notional_usd,
            Some(snapshot_json),
            now_ms(),
        );
        if !self.store.insert(&exec).await? {
            debug!(nonce, "Row appeared concurrently, skipping");
            return Ok(());
        }
        info!(
            nonce,
            target = %exec.target_usd,
            block = event.block_number,
            "Intent detected, execution opened"
        );

        let target = exec.target_usd;
        self.try_place_order(&mut exec, target, &snapshot).await
    }

    // ========================================================================
    // State machine
    // ========================================================================

    /// Reconcile one unsettled execution and move it forward.
    async fn advance_execution(&self, mut exec: Execution) -> Result<()> {
        let fills = self.venue.fetch_fills().await?;
        let current = self.venue.fetch_account_state().await?;

        let baseline: Option<AccountSnapshot> = match exec.prev_state_snapshot.as_deref() {
            Some(json) => match serde_json::from_str(json) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(nonce = exec.nonce, error = %e, "Unreadable baseline snapshot, funding attribution disabled");
                    None
                }
            },
            None => None,
        };

        let pnl = reconcile::reconcile(&exec.order_ids, &fills, baseline.as_ref(), &current);
        let now = now_ms();
        let moved = exec.apply_reconciliation(&pnl, self.config.fill_epsilon_usd, now);
        let status = exec.reclassify(self.config.dust_threshold_usd, self.config.fill_epsilon_usd);
        self.store.update(&exec).await?;

        if moved {
            debug!(
                nonce = exec.nonce,
                filled = %exec.filled_usd,
                target = %exec.target_usd,
                status = %status,
                "Fill progress"
            );
        }

        match status {
            ExecutionStatus::Open | ExecutionStatus::Partial => {
                let remaining = exec.remaining_usd();
                if remaining > self.config.dust_threshold_usd {
                    self.try_place_order(&mut exec, remaining, &current).await?;
                }
                Ok(())
            }
            ExecutionStatus::Filled => {
                if exec.is_fill_stable(self.config.stability_window_ms, now) {
                    self.settle(&exec, &current).await
                } else {
                    debug!(nonce = exec.nonce, "Filled, waiting for fills to stabilize");
                    Ok(())
                }
            }
            ExecutionStatus::Settled => Ok(()),
        }
    }

    /// Size `requested` against the account and place an IOC order if it
    /// clears the floor. Venue rejections are logged and left for the
    /// next tick.
    async fn try_place_order(
        &self,
        exec: &mut Execution,
        requested: vault_core::Usd,
        account: &AccountSnapshot,
    ) -> Result<()> {
        let sized = sizing::safe_size(
            requested,
            account.equity_usd,
            account.exposure_usd,
            self.config.target_leverage,
        );
        if sized < self.config.min_order_usd {
            debug!(
                nonce = exec.nonce,
                requested = %requested,
                sized = %sized,
                "Sized below minimum order floor, skipping this attempt"
            );
            return Ok(());
        }

        let request = OrderRequest {
            coin: self.config.coin.clone(),
            side: self.config.side,
            size_usd: sized,
            max_slippage_bps: self.config.max_slippage_bps,
            reduce_only: false,
        };
        match self.venue.place_order(request).await {
            Ok(order_id) => {
                exec.record_order(order_id);
                self.store.update(exec).await?;
                info!(nonce = exec.nonce, order_id, notional = %sized, "Order placed");
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                warn!(nonce = exec.nonce, error = %e, "Order not accepted, retrying next tick");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Submit the settlement for a stable, filled execution.
    ///
    /// Simulation failures abort without mutating anything so the next
    /// tick retries from the same state. The row is marked settled only
    /// after the transaction receipt confirms.
    async fn settle(&self, exec: &Execution, current: &AccountSnapshot) -> Result<()> {
        let nonce = exec.nonce;

        if self.chain.is_settled(nonce).await? {
            warn!(nonce, "Nonce already settled on chain, reconciling local state");
            self.store.mark_settled(nonce).await?;
            return Ok(());
        }

        let request = SettlementRequest {
            nonce,
            net_pnl_usd: exec.net_pnl_usd.to_settlement_int(),
            new_assets_usd: current.equity_usd.to_settlement_uint(),
            exposure_usd: current.exposure_usd.to_settlement_uint(),
        };

        if let Err(e) = self.chain.simulate_settlement(request).await {
            warn!(nonce, error = %e, "Settlement simulation reverted, not submitting");
            return Ok(());
        }

        let tx_hash = self.chain.submit_settlement(request).await?;
        self.store.mark_settled(nonce).await?;
        info!(
            nonce,
            tx = %tx_hash,
            net_pnl = request.net_pnl_usd,
            new_assets = request.new_assets_usd,
            exposure = request.exposure_usd,
            "Settlement confirmed"
        );
        Ok(())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
