//! Venue wire formats and their domain-level projections.
//!
//! The raw `Raw*` structs mirror the venue's JSON exactly (camelCase,
//! decimals as strings); the public types carry only what the engine
//! needs, in precise decimal form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vault_core::{OrderSide, Price, Size, Usd};

// ============================================================================
// Domain types
// ============================================================================

/// Point-in-time view of the venue account.
///
/// Serialized as-is into `prev_state_snapshot` at intent detection, so
/// it must round-trip through JSON losslessly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account equity (margin summary `accountValue`).
    pub equity_usd: Usd,
    /// Total absolute position notional (`totalNtlPos`).
    pub exposure_usd: Usd,
    /// Open positions.
    pub positions: Vec<VenuePosition>,
}

/// One open position on the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenuePosition {
    pub coin: String,
    /// Signed size: positive long, negative short.
    pub size: Size,
    /// Absolute position notional.
    pub notional_usd: Usd,
    /// Cumulative funding paid over the account's lifetime. Funding
    /// attribution works on deltas of this value between snapshots.
    pub cum_funding_usd: Usd,
}

/// One fill reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueFill {
    /// Venue order id this fill belongs to.
    pub order_id: u64,
    pub price: Price,
    pub size: Size,
    /// Realized PnL closed by this fill.
    pub realized_pnl_usd: Usd,
    pub fee_usd: Usd,
}

impl VenueFill {
    /// Notional of this fill: |size| * price.
    #[must_use]
    pub fn notional_usd(&self) -> Usd {
        self.size.notional(self.price)
    }
}

/// An order the engine wants placed.
///
/// Sized in notional; the gateway converts to base size at the current
/// mid and applies the venue's precision rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub coin: String,
    pub side: OrderSide,
    pub size_usd: Usd,
    /// Limit-price offset from mid, in basis points. The order is
    /// immediate-or-cancel, so this bounds the worst fill price.
    pub max_slippage_bps: u32,
    pub reduce_only: bool,
}

// ============================================================================
// Raw wire structs (clearinghouseState)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawClearinghouseState {
    pub margin_summary: RawMarginSummary,
    #[serde(default)]
    pub asset_positions: Vec<RawAssetPosition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMarginSummary {
    pub account_value: Decimal,
    pub total_ntl_pos: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAssetPosition {
    pub position: RawPosition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPosition {
    pub coin: String,
    pub szi: Decimal,
    pub position_value: Decimal,
    #[serde(default)]
    pub cum_funding: RawCumFunding,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCumFunding {
    #[serde(default)]
    pub all_time: Decimal,
}

impl From<RawClearinghouseState> for AccountSnapshot {
    fn from(raw: RawClearinghouseState) -> Self {
        Self {
            equity_usd: Usd::new(raw.margin_summary.account_value),
            exposure_usd: Usd::new(raw.margin_summary.total_ntl_pos),
            positions: raw
                .asset_positions
                .into_iter()
                .map(|p| VenuePosition {
                    coin: p.position.coin,
                    size: Size::new(p.position.szi),
                    notional_usd: Usd::new(p.position.position_value.abs()),
                    cum_funding_usd: Usd::new(p.position.cum_funding.all_time),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Raw wire structs (userFills)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFill {
    pub oid: u64,
    pub px: Decimal,
    pub sz: Decimal,
    #[serde(default)]
    pub closed_pnl: Decimal,
    #[serde(default)]
    pub fee: Decimal,
}

impl From<RawFill> for VenueFill {
    fn from(raw: RawFill) -> Self {
        Self {
            order_id: raw.oid,
            price: Price::new(raw.px),
            size: Size::new(raw.sz),
            realized_pnl_usd: Usd::new(raw.closed_pnl),
            fee_usd: Usd::new(raw.fee),
        }
    }
}
