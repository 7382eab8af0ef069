//! Execution lifecycle types.
//!
//! One `Execution` row exists per detected on-chain intent, keyed by the
//! intent nonce. The row carries the lifecycle status, the venue orders
//! issued for the intent, accumulated fill notional, and the PnL
//! components reported back to the chain at settlement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::money::Usd;

// ============================================================================
// ExecutionStatus
// ============================================================================

/// Lifecycle status of an execution.
///
/// The only legal backward transition is `Filled -> Partial`: a later
/// reconciliation pass may observe the filled notional dropping back below
/// the fill threshold (e.g. a position was partially reduced), in which
/// case the engine reclassifies instead of settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    /// Intent detected, no fill observed yet.
    #[default]
    Open,
    /// Some but not all of the target notional filled.
    Partial,
    /// Target notional reached (within the dust threshold).
    Filled,
    /// Settlement transaction confirmed on chain. Terminal.
    Settled,
}

impl ExecutionStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled)
    }

    /// Whether moving to `next` is a legal transition.
    ///
    /// Staying in place is always legal. Forward moves follow
    /// `Open -> Partial -> Filled -> Settled` (`Open -> Filled` is allowed
    /// for a single immediate full fill); the only backward edge is
    /// `Filled -> Partial`.
    #[must_use]
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Self::Open, Self::Partial)
                | (Self::Open, Self::Filled)
                | (Self::Partial, Self::Filled)
                | (Self::Filled, Self::Partial)
                | (Self::Filled, Self::Settled)
        )
    }

    /// Stable string form used in the persistence layer.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Partial => "PARTIAL",
            Self::Filled => "FILLED",
            Self::Settled => "SETTLED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "PARTIAL" => Ok(Self::Partial),
            "FILLED" => Ok(Self::Filled),
            "SETTLED" => Ok(Self::Settled),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

// ============================================================================
// PnlBreakdown
// ============================================================================

/// Result of one reconciliation pass over an execution's fill set.
///
/// All values are recomputed from scratch from the current fill history,
/// never accumulated incrementally, so re-running reconciliation with an
/// unchanged fill set yields identical numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PnlBreakdown {
    /// Total notional filled across the execution's orders.
    pub filled_usd: Usd,
    /// Sum of realized PnL over matching fills.
    pub trade_pnl_usd: Usd,
    /// Sum of fees over matching fills.
    pub fees_usd: Usd,
    /// Cumulative funding delta since the intent-detection baseline.
    pub funding_usd: Usd,
}

impl PnlBreakdown {
    /// Net PnL: trade PnL minus funding minus fees.
    #[must_use]
    pub fn net_pnl_usd(&self) -> Usd {
        self.trade_pnl_usd - self.funding_usd - self.fees_usd
    }
}

// ============================================================================
// Execution
// ============================================================================

/// One row per detected intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Intent nonce, primary key, immutable.
    pub nonce: u64,
    /// Requested notional, set at creation, immutable.
    pub target_usd: Usd,
    /// Notional filled so far across all orders for this nonce.
    pub filled_usd: Usd,
    /// Lifecycle status.
    pub status: ExecutionStatus,
    /// Venue order ids issued for this nonce, append-only.
    pub order_ids: Vec<u64>,
    /// Realized trade PnL.
    pub trade_pnl_usd: Usd,
    /// Funding paid since the baseline snapshot.
    pub funding_usd: Usd,
    /// Fees paid.
    pub fees_usd: Usd,
    /// `trade_pnl_usd - funding_usd - fees_usd`.
    pub net_pnl_usd: Usd,
    /// Serialized venue account snapshot captured at intent detection,
    /// used as the funding baseline.
    pub prev_state_snapshot: Option<String>,
    /// Last time `filled_usd` moved by more than the fill epsilon
    /// (Unix milliseconds). Drives the settlement-stability timer.
    pub last_fill_check: i64,
    /// Kept in sync with `status == Settled` for unsettled-row scans.
    pub settled: bool,
    /// Creation timestamp (Unix milliseconds), immutable.
    pub created_at: i64,
}

impl Execution {
    /// Create a fresh `OPEN` row for a newly detected intent.
    #[must_use]
    pub fn new(nonce: u64, target_usd: Usd, prev_state_snapshot: Option<String>, now_ms: i64) -> Self {
        Self {
            nonce,
            target_usd,
            filled_usd: Usd::ZERO,
            status: ExecutionStatus::Open,
            order_ids: Vec::new(),
            trade_pnl_usd: Usd::ZERO,
            funding_usd: Usd::ZERO,
            fees_usd: Usd::ZERO,
            net_pnl_usd: Usd::ZERO,
            prev_state_snapshot,
            last_fill_check: now_ms,
            settled: false,
            created_at: now_ms,
        }
    }

    /// Unfilled remainder. Can go slightly negative on venue overshoot.
    #[must_use]
    pub fn remaining_usd(&self) -> Usd {
        self.target_usd - self.filled_usd
    }

    /// Append a newly issued venue order id.
    pub fn record_order(&mut self, order_id: u64) {
        self.order_ids.push(order_id);
    }

    /// Apply a reconciliation pass.
    ///
    /// Overwrites the fill notional and all PnL components with the
    /// recomputed values. `last_fill_check` is bumped only when the filled
    /// notional moved by more than `epsilon`; an unchanged timestamp is the
    /// "fills have gone quiet" signal the settlement path waits on.
    ///
    /// Returns true if the filled notional moved.
    pub fn apply_reconciliation(&mut self, pnl: &PnlBreakdown, epsilon: Usd, now_ms: i64) -> bool {
        let moved = (pnl.filled_usd - self.filled_usd).abs() > epsilon;
        if moved {
            self.last_fill_check = now_ms;
        }
        self.filled_usd = pnl.filled_usd;
        self.trade_pnl_usd = pnl.trade_pnl_usd;
        self.fees_usd = pnl.fees_usd;
        self.funding_usd = pnl.funding_usd;
        self.net_pnl_usd = pnl.net_pnl_usd();
        moved
    }

    /// Reclassify status from the current fill level.
    ///
    /// - remainder within `dust` => `Filled`
    /// - meaningful remainder with observed fills => `Partial`
    ///   (this is the one legal backward edge when coming from `Filled`)
    /// - meaningful remainder on a `Filled` row => `Partial` even when
    ///   the observed fills dropped to zero; a row that once reached
    ///   `Filled` must never settle while notional remains unfilled
    /// - no observed fills otherwise => status unchanged (`Open` stays
    ///   `Open`)
    ///
    /// Settled rows are never reclassified.
    pub fn reclassify(&mut self, dust: Usd, epsilon: Usd) -> ExecutionStatus {
        if self.settled || self.status == ExecutionStatus::Settled {
            return self.status;
        }

        let next = if self.remaining_usd() <= dust {
            ExecutionStatus::Filled
        } else if self.filled_usd > epsilon || self.status == ExecutionStatus::Filled {
            ExecutionStatus::Partial
        } else {
            self.status
        };

        if self.status.can_transition_to(next) {
            self.status = next;
        }
        self.status
    }

    /// Whether the fill set has been quiet for at least `window_ms`.
    #[must_use]
    pub fn is_fill_stable(&self, window_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.last_fill_check) >= window_ms
    }

    /// Terminally mark this execution settled.
    ///
    /// The row must never be mutated again after this.
    pub fn mark_settled(&mut self) {
        self.settled = true;
        self.status = ExecutionStatus::Settled;
    }

    /// Fill progress as a fraction of target (0 when target is zero).
    #[must_use]
    pub fn fill_progress(&self) -> rust_decimal::Decimal {
        if self.target_usd.is_zero() {
            rust_decimal::Decimal::ZERO
        } else {
            self.filled_usd.inner() / self.target_usd.inner()
        }
    }
}
