//! Emergency unwind.
//!
//! When the risk manager pauses trading, the engine stops settling and
//! instead tries to flatten every venue position with reduce-only IOC
//! orders. The loop is bounded: IOC orders can miss, so each iteration
//! re-reads positions and retries what's left, up to a fixed cap.

use std::time::Duration;

use tracing::{info, warn};

use vault_core::Usd;
use vault_venue::{OrderRequest, VenueGateway};

use crate::error::Result;

/// Close all open positions whose notional exceeds `noise_floor_usd`.
///
/// Waits `retry_delay` between iterations so IOC orders can land before
/// positions are re-read. Returns true if the account ended flat, false
/// if positions remained after `max_iterations` attempts (the next
/// paused tick retries).
pub async fn force_unwind_all(
    venue: &dyn VenueGateway,
    noise_floor_usd: Usd,
    max_iterations: u32,
    max_slippage_bps: u32,
    retry_delay: Duration,
) -> Result<bool> {
    for iteration in 1..=max_iterations {
        if iteration > 1 && !retry_delay.is_zero() {
            tokio::time::sleep(retry_delay).await;
        }
        let snapshot = venue.fetch_account_state().await?;
        let open: Vec<_> = snapshot
            .positions
            .iter()
            .filter(|p| p.notional_usd.abs() > noise_floor_usd)
            .collect();

        if open.is_empty() {
            info!(iteration, "Emergency unwind complete, account flat");
            return Ok(true);
        }

        for position in open {
            let side = if position.size.inner().is_sign_positive() {
                vault_core::OrderSide::Sell
            } else {
                vault_core::OrderSide::Buy
            };
            let request = OrderRequest {
                coin: position.coin.clone(),
                side,
                size_usd: position.notional_usd.abs(),
                max_slippage_bps,
                reduce_only: true,
            };

            // Order failures never abort the sweep; the remaining
            // positions still get their close attempts.
            match venue.place_order(request).await {
                Ok(order_id) => {
                    info!(
                        coin = %position.coin,
                        notional = %position.notional_usd,
                        side = %side,
                        order_id,
                        "Placed unwind order"
                    );
                }
                Err(e) => {
                    warn!(coin = %position.coin, error = %e, "Unwind order failed, skipping");
                }
            }
        }
    }

    warn!(max_iterations, "Positions remain after bounded unwind");
    Ok(false)
}
