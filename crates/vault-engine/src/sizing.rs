//! Risk-bounded order sizing.

use rust_decimal::Decimal;

use vault_core::Usd;

/// No single order may exceed this fraction of account equity, no
/// matter how much leverage headroom remains.
pub const MAX_EQUITY_FRACTION: Decimal = Decimal::from_parts(25, 0, 0, false, 2); // 0.25

/// Clamp a requested notional to what the venue account can safely
/// carry.
///
/// Result is `min(requested, equity * leverage - exposure, equity * 0.25)`,
/// floored at zero when capacity is exhausted. Pure; callers compare the
/// result against the minimum order floor and skip the attempt if it
/// falls short.
#[must_use]
pub fn safe_size(
    requested_usd: Usd,
    equity_usd: Usd,
    current_exposure_usd: Usd,
    target_leverage: Decimal,
) -> Usd {
    let remaining_capacity =
        (equity_usd.inner() * target_leverage - current_exposure_usd.inner()).max(Decimal::ZERO);
    let per_order_cap = equity_usd.inner() * MAX_EQUITY_FRACTION;

    let sized = requested_usd
        .inner()
        .min(remaining_capacity)
        .min(per_order_cap)
        .max(Decimal::ZERO);
    Usd::new(sized)
}
