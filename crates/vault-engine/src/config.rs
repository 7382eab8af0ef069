//! Engine configuration.

use rust_decimal::Decimal;
use serde::Deserialize;

use vault_core::{OrderSide, Usd};

use crate::error::{EngineError, Result};

/// Tunables of the execution engine.
///
/// `coin`, `side` and `trade_notional_usd` define what one intent means
/// on the venue; everything else has defaults matching production.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Venue market traded for every intent.
    pub coin: String,

    /// Direction of the vault strategy.
    #[serde(default = "default_side")]
    pub side: OrderSide,

    /// Requested notional per intent (the execution's target).
    pub trade_notional_usd: Usd,

    /// Leverage bound used by the sizing guard.
    #[serde(default = "default_target_leverage")]
    pub target_leverage: Decimal,

    /// Slippage allowance for IOC orders, in basis points.
    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: u32,

    /// Remaining notional below this counts as fully filled.
    #[serde(default = "default_dust_threshold_usd")]
    pub dust_threshold_usd: Usd,

    /// Orders sized below this floor are skipped and retried next tick.
    #[serde(default = "default_min_order_usd")]
    pub min_order_usd: Usd,

    /// Fill-notional moves smaller than this don't reset the
    /// stability timer.
    #[serde(default = "default_fill_epsilon_usd")]
    pub fill_epsilon_usd: Usd,

    /// How long fills must stay quiet before settlement.
    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: i64,

    /// Poll loop tick interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Emergency unwind: max close-retry iterations per paused tick.
    #[serde(default = "default_unwind_max_iterations")]
    pub unwind_max_iterations: u32,

    /// Emergency unwind: pause between retry iterations, giving IOC
    /// orders time to land before positions are re-read.
    #[serde(default = "default_unwind_retry_delay_ms")]
    pub unwind_retry_delay_ms: u64,

    /// Emergency unwind: positions below this notional are ignored.
    #[serde(default = "default_unwind_noise_floor_usd")]
    pub unwind_noise_floor_usd: Usd,
}

fn default_side() -> OrderSide {
    OrderSide::Buy
}

fn default_target_leverage() -> Decimal {
    Decimal::from(3)
}

fn default_max_slippage_bps() -> u32 {
    50
}

fn default_dust_threshold_usd() -> Usd {
    Usd::new(Decimal::from(20))
}

fn default_min_order_usd() -> Usd {
    Usd::new(Decimal::from(10))
}

fn default_fill_epsilon_usd() -> Usd {
    Usd::new(Decimal::new(1, 2)) // 0.01
}

fn default_stability_window_ms() -> i64 {
    3_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_unwind_max_iterations() -> u32 {
    10
}

fn default_unwind_retry_delay_ms() -> u64 {
    500
}

fn default_unwind_noise_floor_usd() -> Usd {
    Usd::new(Decimal::from(5))
}

impl EngineConfig {
    /// Reject configurations the engine cannot run safely with.
    pub fn validate(&self) -> Result<()> {
        if self.coin.is_empty() {
            return Err(EngineError::Config("coin must not be empty".into()));
        }
        if !self.trade_notional_usd.is_positive() {
            return Err(EngineError::Config(format!(
                "trade_notional_usd must be positive, got {}",
                self.trade_notional_usd
            )));
        }
        if self.target_leverage <= Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "target_leverage must be positive, got {}",
                self.target_leverage
            )));
        }
        if !self.min_order_usd.is_positive() {
            return Err(EngineError::Config("min_order_usd must be positive".into()));
        }
        if self.stability_window_ms < 0 {
            return Err(EngineError::Config(
                "stability_window_ms must be non-negative".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(EngineError::Config("poll_interval_ms must be non-zero".into()));
        }
        Ok(())
    }
}
