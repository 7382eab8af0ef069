//! Fill reconciliation.
//!
//! Recomputes an execution's fill notional and PnL components from
//! scratch on every pass. Nothing here is incremental: running the same
//! inputs twice yields the same breakdown, which is what makes the
//! reconciliation step idempotent.

use std::collections::HashSet;

use vault_core::{PnlBreakdown, Usd};
use vault_venue::{AccountSnapshot, VenueFill};

/// Compute the PnL breakdown for an execution from the venue fill feed.
///
/// Only fills belonging to `order_ids` count. Funding is attributed as
/// the delta of cumulative funding between the intent-time baseline
/// snapshot and the current snapshot, with the first position entry
/// considered representative; zero when no baseline exists.
#[must_use]
pub fn reconcile(
    order_ids: &[u64],
    fills: &[VenueFill],
    baseline: Option<&AccountSnapshot>,
    current: &AccountSnapshot,
) -> PnlBreakdown {
    let ours: HashSet<u64> = order_ids.iter().copied().collect();

    let mut breakdown = PnlBreakdown::default();
    for fill in fills.iter().filter(|f| ours.contains(&f.order_id)) {
        breakdown.filled_usd += fill.notional_usd();
        breakdown.trade_pnl_usd += fill.realized_pnl_usd;
        breakdown.fees_usd += fill.fee_usd;
    }

    breakdown.funding_usd = match baseline {
        Some(prev) => cum_funding(current) - cum_funding(prev),
        None => Usd::ZERO,
    };

    breakdown
}

fn cum_funding(snapshot: &AccountSnapshot) -> Usd {
    snapshot
        .positions
        .first()
        .map(|p| p.cum_funding_usd)
        .unwrap_or(Usd::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vault_core::{Price, Size};
    use vault_venue::VenuePosition;

    fn fill(order_id: u64, px: rust_decimal::Decimal, sz: rust_decimal::Decimal) -> VenueFill {
        VenueFill {
            order_id,
            price: Price::new(px),
            size: Size::new(sz),
            realized_pnl_usd: Usd::new(dec!(1)),
            fee_usd: Usd::new(dec!(0.1)),
        }
    }

    fn snapshot_with_funding(funding: rust_decimal::Decimal) -> AccountSnapshot {
        AccountSnapshot {
            equity_usd: Usd::new(dec!(1000)),
            exposure_usd: Usd::ZERO,
            positions: vec![VenuePosition {
                coin: "ETH".into(),
                size: Size::new(dec!(0.5)),
                notional_usd: Usd::new(dec!(1000)),
                cum_funding_usd: Usd::new(funding),
            }],
        }
    }

    #[test]
    fn test_only_matching_fills_count() {
        let fills = vec![fill(1, dec!(2000), dec!(0.05)), fill(99, dec!(2000), dec!(1))];
        let current = snapshot_with_funding(dec!(0));

        let pnl = reconcile(&[1], &fills, None, &current);
        assert_eq!(pnl.filled_usd, Usd::new(dec!(100)));
        assert_eq!(pnl.trade_pnl_usd, Usd::new(dec!(1)));
        assert_eq!(pnl.fees_usd, Usd::new(dec!(0.1)));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let fills = vec![fill(1, dec!(2000), dec!(0.05)), fill(2, dec!(2100), dec!(0.02))];
        let current = snapshot_with_funding(dec!(0));

        let a = reconcile(&[1, 2], &fills, None, &current);
        let b = reconcile(&[1, 2], &fills, None, &current);
        assert_eq!(a, b);
        assert_eq!(a.filled_usd, Usd::new(dec!(142)));
    }

    #[test]
    fn test_funding_delta_from_baseline() {
        let baseline = snapshot_with_funding(dec!(10));
        let current = snapshot_with_funding(dec!(12.5));

        let pnl = reconcile(&[], &[], Some(&baseline), &current);
        assert_eq!(pnl.funding_usd, Usd::new(dec!(2.5)));
        // Funding is a cost in net PnL.
        assert_eq!(pnl.net_pnl_usd(), Usd::new(dec!(-2.5)));
    }

    #[test]
    fn test_no_baseline_means_zero_funding() {
        let current = snapshot_with_funding(dec!(42));
        let pnl = reconcile(&[], &[], None, &current);
        assert_eq!(pnl.funding_usd, Usd::ZERO);
    }

    #[test]
    fn test_empty_positions_treated_as_zero_funding() {
        let baseline = snapshot_with_funding(dec!(3));
        let current = AccountSnapshot::default();

        let pnl = reconcile(&[], &[], Some(&baseline), &current);
        assert_eq!(pnl.funding_usd, Usd::new(dec!(-3)));
    }
}
