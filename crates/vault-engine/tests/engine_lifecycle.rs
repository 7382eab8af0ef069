//! End-to-end engine tests against scripted chain and venue mocks.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use vault_chain::mock::MockChainGateway;
use vault_chain::DynChainGateway;
use vault_core::{ExecutionStatus, OrderSide, Price, Size, Usd};
use vault_engine::{Engine, EngineConfig};
use vault_persistence::ExecutionStore;
use vault_venue::mock::MockVenueGateway;
use vault_venue::{AccountSnapshot, DynVenueGateway, VenueFill, VenuePosition};

fn config(notional: Decimal) -> EngineConfig {
    EngineConfig {
        coin: "ETH".into(),
        side: OrderSide::Buy,
        trade_notional_usd: Usd::new(notional),
        target_leverage: dec!(3),
        max_slippage_bps: 50,
        dust_threshold_usd: Usd::new(dec!(20)),
        min_order_usd: Usd::new(dec!(10)),
        fill_epsilon_usd: Usd::new(dec!(0.01)),
        stability_window_ms: 3_000,
        poll_interval_ms: 2_000,
        unwind_max_iterations: 10,
        unwind_retry_delay_ms: 0,
        unwind_noise_floor_usd: Usd::new(dec!(5)),
    }
}

fn account(equity: Decimal, exposure: Decimal) -> AccountSnapshot {
    AccountSnapshot {
        equity_usd: Usd::new(equity),
        exposure_usd: Usd::new(exposure),
        positions: vec![],
    }
}

fn position(coin: &str, size: Decimal, notional: Decimal) -> VenuePosition {
    VenuePosition {
        coin: coin.into(),
        size: Size::new(size),
        notional_usd: Usd::new(notional),
        cum_funding_usd: Usd::ZERO,
    }
}

fn fill(order_id: u64, px: Decimal, sz: Decimal) -> VenueFill {
    VenueFill {
        order_id,
        price: Price::new(px),
        size: Size::new(sz),
        realized_pnl_usd: Usd::new(dec!(1)),
        fee_usd: Usd::new(dec!(0.1)),
    }
}

struct Harness {
    chain: Arc<MockChainGateway>,
    venue: Arc<MockVenueGateway>,
    store: ExecutionStore,
    engine: Engine,
}

async fn harness(notional: Decimal) -> Harness {
    let chain = Arc::new(MockChainGateway::new());
    let venue = Arc::new(MockVenueGateway::new());
    venue.set_account(account(dec!(1000), dec!(0)));
    let store = ExecutionStore::open_in_memory().await.unwrap();
    let engine = Engine::bootstrap(
        chain.clone() as DynChainGateway,
        venue.clone() as DynVenueGateway,
        store.clone(),
        config(notional),
    )
    .await
    .unwrap();
    Harness {
        chain,
        venue,
        store,
        engine,
    }
}

/// Rewind the stability timer so a filled row looks quiet long enough
/// to settle.
async fn age_fills(store: &ExecutionStore, nonce: u64, ms: i64) {
    let mut row = store.get(nonce).await.unwrap().unwrap();
    row.last_fill_check -= ms;
    store.update(&row).await.unwrap();
}

#[tokio::test]
async fn test_intent_opens_row_and_places_initial_order() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Open);
    assert_eq!(row.target_usd, Usd::new(dec!(100)));
    assert_eq!(row.order_ids.len(), 1);
    assert!(row.prev_state_snapshot.is_some());

    let placed = h.venue.placed_orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].coin, "ETH");
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[0].size_usd, Usd::new(dec!(100)));
    assert!(!placed[0].reduce_only);
}

#[tokio::test]
async fn test_duplicate_intent_event_is_noop() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.05))); // 100 filled

    // Same nonce replayed in a later block.
    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();

    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.venue.placed_orders().len(), 1);
}

#[tokio::test]
async fn test_replayed_already_settled_intent_is_skipped() {
    let mut h = harness(dec!(100)).await;

    h.chain.force_settled(7);
    h.chain.emit_intent(7);
    h.engine.tick().await.unwrap();

    assert!(!h.store.exists(7).await.unwrap());
    assert!(h.venue.placed_orders().is_empty());
}

#[tokio::test]
async fn test_lifecycle_through_settlement_exactly_once() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();

    // 95 of 100 filled: inside the dust threshold, counts as FILLED.
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.0475)));
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Filled);
    assert_eq!(row.filled_usd, Usd::new(dec!(95)));
    // Fills just moved; the stability window defers settlement.
    assert!(h.chain.submissions().is_empty());

    age_fills(&h.store, 1, 10_000).await;
    h.engine.tick().await.unwrap();

    let submissions = h.chain.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].nonce, 1);
    // trade pnl 1 - fees 0.1 - funding 0 = 0.9, rounded to 1.
    assert_eq!(submissions[0].net_pnl_usd, 1);
    assert_eq!(submissions[0].new_assets_usd, 1000);
    assert_eq!(submissions[0].exposure_usd, 0);

    let row = h.store.get(1).await.unwrap().unwrap();
    assert!(row.settled);
    assert_eq!(row.status, ExecutionStatus::Settled);

    // Settled rows leave the working set; nothing settles twice.
    h.engine.tick().await.unwrap();
    assert_eq!(h.chain.submissions().len(), 1);
}

#[tokio::test]
async fn test_partial_fill_retries_remainder() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();

    // Half the target fills.
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.025))); // 50
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Partial);
    assert_eq!(row.order_ids.len(), 2);

    let placed = h.venue.placed_orders();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].size_usd, Usd::new(dec!(50)));

    // Remainder fills against the second order.
    h.venue.push_fill(fill(2, dec!(2000), dec!(0.025)));
    h.engine.tick().await.unwrap();
    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Filled);
    assert_eq!(row.filled_usd, Usd::new(dec!(100)));
}

#[tokio::test]
async fn test_sizing_respects_leverage_capacity() {
    let mut h = harness(dec!(500)).await;
    h.venue.set_account(account(dec!(1000), dec!(2800)));

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();

    // 1000 * 3 - 2800 leaves 200 of headroom.
    let placed = h.venue.placed_orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].size_usd, Usd::new(dec!(200)));
}

#[tokio::test]
async fn test_sizing_below_floor_leaves_open_row_without_orders() {
    let mut h = harness(dec!(100)).await;
    h.venue.set_account(account(dec!(1000), dec!(2995)));

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Open);
    assert!(row.order_ids.is_empty());
    assert!(h.venue.placed_orders().is_empty());

    // Capacity frees up; the next tick retries sizing.
    h.venue.set_account(account(dec!(1000), dec!(0)));
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.order_ids.len(), 1);
    assert_eq!(h.venue.placed_orders()[0].size_usd, Usd::new(dec!(100)));
}

#[tokio::test]
async fn test_fill_regression_moves_filled_back_to_partial() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.0475))); // 95
    h.engine.tick().await.unwrap();
    assert_eq!(
        h.store.get(1).await.unwrap().unwrap().status,
        ExecutionStatus::Filled
    );

    // The venue later reports less filled notional for the same order.
    h.venue.set_fills(vec![fill(1, dec!(2000), dec!(0.02))]); // 40
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Partial);
    assert_eq!(row.filled_usd, Usd::new(dec!(40)));
    // The remainder is re-ordered instead of settling on stale numbers.
    assert_eq!(row.order_ids.len(), 2);
    assert!(h.chain.submissions().is_empty());
}

#[tokio::test]
async fn test_total_fill_regression_blocks_settlement() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.0475))); // 95
    h.engine.tick().await.unwrap();
    assert_eq!(
        h.store.get(1).await.unwrap().unwrap().status,
        ExecutionStatus::Filled
    );

    // Every fill for this order set disappears from the feed.
    h.venue.set_fills(vec![]);
    age_fills(&h.store, 1, 10_000).await;
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Partial);
    assert_eq!(row.filled_usd, Usd::ZERO);
    // Nothing filled, so nothing may settle; the target is re-ordered.
    assert!(h.chain.submissions().is_empty());
    assert_eq!(row.order_ids.len(), 2);
}

#[tokio::test]
async fn test_simulation_revert_defers_settlement() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.0475)));
    h.engine.tick().await.unwrap();
    age_fills(&h.store, 1, 10_000).await;

    h.chain.revert_simulation("accounting invariant violated");
    h.engine.tick().await.unwrap();
    assert!(h.chain.submissions().is_empty());
    assert!(!h.store.get(1).await.unwrap().unwrap().settled);

    // Same state retries cleanly once the revert clears.
    h.chain.clear_simulation_revert();
    h.engine.tick().await.unwrap();
    assert_eq!(h.chain.submissions().len(), 1);
    assert!(h.store.get(1).await.unwrap().unwrap().settled);
}

#[tokio::test]
async fn test_settled_on_chain_but_not_locally_reconciles() {
    // Crash between transaction confirmation and the local settled mark.
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.0475)));
    h.engine.tick().await.unwrap();
    age_fills(&h.store, 1, 10_000).await;

    h.chain.force_settled(1);
    h.engine.tick().await.unwrap();

    // No new submission, but the local row catches up.
    assert!(h.chain.submissions().is_empty());
    assert!(h.store.get(1).await.unwrap().unwrap().settled);
}

#[tokio::test]
async fn test_pause_suppresses_engine_and_unwinds() {
    let mut h = harness(dec!(100)).await;
    h.venue.set_account(AccountSnapshot {
        equity_usd: Usd::new(dec!(1000)),
        exposure_usd: Usd::new(dec!(504)),
        positions: vec![
            position("ETH", dec!(0.25), dec!(500)),
            position("BTC", dec!(0.00005), dec!(4)), // below noise floor
        ],
    });
    h.chain.set_paused(true);
    h.chain.emit_intent(5);

    h.engine.tick().await.unwrap();

    // Pause suppresses ingestion entirely.
    assert!(!h.store.exists(5).await.unwrap());

    // Positions never shrink in this script, so the unwind runs its full
    // bounded retry budget against the ETH position only.
    let placed = h.venue.placed_orders();
    assert_eq!(placed.len(), 10);
    for order in &placed {
        assert_eq!(order.coin, "ETH");
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.size_usd, Usd::new(dec!(500)));
        assert!(order.reduce_only);
    }
}

#[tokio::test]
async fn test_unwind_ignores_positions_below_noise_floor() {
    let mut h = harness(dec!(100)).await;
    h.venue.set_account(AccountSnapshot {
        equity_usd: Usd::new(dec!(1000)),
        exposure_usd: Usd::new(dec!(4)),
        positions: vec![position("BTC", dec!(0.00005), dec!(4))],
    });
    h.chain.set_paused(true);

    h.engine.tick().await.unwrap();
    assert!(h.venue.placed_orders().is_empty());
}

#[tokio::test]
async fn test_unwind_continues_past_fatal_order_failure() {
    let mut h = harness(dec!(100)).await;
    h.venue.set_account(AccountSnapshot {
        equity_usd: Usd::new(dec!(1000)),
        exposure_usd: Usd::new(dec!(540)),
        positions: vec![
            position("DOGE", dec!(100), dec!(40)),
            position("ETH", dec!(0.25), dec!(500)),
        ],
    });
    h.venue.fail_coin("DOGE");
    h.chain.set_paused(true);

    h.engine.tick().await.unwrap();

    // The DOGE close fails fatally every iteration; the ETH position
    // still gets its close attempt each time.
    let placed = h.venue.placed_orders();
    assert_eq!(placed.len(), 10);
    for order in &placed {
        assert_eq!(order.coin, "ETH");
        assert!(order.reduce_only);
    }
}

#[tokio::test]
async fn test_unwind_closes_short_with_buy() {
    let mut h = harness(dec!(100)).await;
    h.venue.set_account(AccountSnapshot {
        equity_usd: Usd::new(dec!(1000)),
        exposure_usd: Usd::new(dec!(500)),
        positions: vec![position("ETH", dec!(-0.25), dec!(500))],
    });
    h.chain.set_paused(true);

    h.engine.tick().await.unwrap();

    let placed = h.venue.placed_orders();
    assert!(!placed.is_empty());
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert!(placed[0].reduce_only);
}

#[tokio::test]
async fn test_crash_recovery_resumes_unsettled_execution() {
    let mut h = harness(dec!(100)).await;

    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();
    h.venue.push_fill(fill(1, dec!(2000), dec!(0.0475)));
    h.engine.tick().await.unwrap();

    // Process restarts: fresh engine over the same store and gateways.
    drop(h.engine);
    let mut restarted = Engine::bootstrap(
        h.chain.clone() as DynChainGateway,
        h.venue.clone() as DynVenueGateway,
        h.store.clone(),
        config(dec!(100)),
    )
    .await
    .unwrap();

    age_fills(&h.store, 1, 10_000).await;
    restarted.tick().await.unwrap();

    assert_eq!(h.chain.submissions().len(), 1);
    assert!(h.store.get(1).await.unwrap().unwrap().settled);
}

#[tokio::test]
async fn test_order_rejection_leaves_state_for_retry() {
    let mut h = harness(dec!(100)).await;

    h.venue.reject_orders("IOC could not match");
    h.chain.emit_intent(1);
    h.engine.tick().await.unwrap();

    let row = h.store.get(1).await.unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Open);
    assert!(row.order_ids.is_empty());

    // Venue recovers; retry places the order with no duplicate row.
    h.venue.accept_orders();
    h.engine.tick().await.unwrap();

    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.store.get(1).await.unwrap().unwrap().order_ids.len(), 1);
}
