//! Venue gateway trait and test double.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{AccountSnapshot, OrderRequest, VenueFill};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstraction over the trading venue.
///
/// The account (trader address) is fixed at gateway construction; all
/// methods act on that account.
pub trait VenueGateway: Send + Sync {
    /// Place an immediate-or-cancel order. Returns the venue order id,
    /// assigned whether or not the order filled.
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, Result<u64>>;

    /// Current equity, exposure and open positions.
    fn fetch_account_state(&self) -> BoxFuture<'_, Result<AccountSnapshot>>;

    /// Recent fills for the account, across all orders. Callers filter
    /// by order id.
    fn fetch_fills(&self) -> BoxFuture<'_, Result<Vec<VenueFill>>>;
}

/// Shared trait object alias.
pub type DynVenueGateway = Arc<dyn VenueGateway>;

// ============================================================================
// Mock
// ============================================================================

pub mod mock {
    //! Scriptable in-memory venue for engine tests.

    use parking_lot::Mutex;

    use super::*;
    use crate::error::VenueError;

    /// In-memory [`VenueGateway`] with scriptable state.
    #[derive(Default)]
    pub struct MockVenueGateway {
        inner: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        account: AccountSnapshot,
        fills: Vec<VenueFill>,
        placed: Vec<OrderRequest>,
        next_order_id: u64,
        reject_orders_with: Option<String>,
        unknown_coins: Vec<String>,
    }

    impl MockVenueGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Replace the account snapshot returned by `fetch_account_state`.
        pub fn set_account(&self, account: AccountSnapshot) {
            self.inner.lock().account = account;
        }

        /// Append a fill to the feed returned by `fetch_fills`.
        pub fn push_fill(&self, fill: VenueFill) {
            self.inner.lock().fills.push(fill);
        }

        /// Replace the entire fill feed.
        pub fn set_fills(&self, fills: Vec<VenueFill>) {
            self.inner.lock().fills = fills;
        }

        /// Make every subsequent `place_order` fail with a rejection.
        pub fn reject_orders(&self, reason: impl Into<String>) {
            self.inner.lock().reject_orders_with = Some(reason.into());
        }

        /// Stop rejecting orders.
        pub fn accept_orders(&self) {
            self.inner.lock().reject_orders_with = None;
        }

        /// Make `place_order` fail fatally for one coin, as the real
        /// gateway does when the coin is missing from the exchange meta.
        pub fn fail_coin(&self, coin: impl Into<String>) {
            self.inner.lock().unknown_coins.push(coin.into());
        }

        /// All order requests placed so far.
        pub fn placed_orders(&self) -> Vec<OrderRequest> {
            self.inner.lock().placed.clone()
        }
    }

    impl VenueGateway for MockVenueGateway {
        fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, Result<u64>> {
            Box::pin(async move {
                let mut state = self.inner.lock();
                if let Some(reason) = &state.reject_orders_with {
                    return Err(VenueError::OrderRejected(reason.clone()));
                }
                if state.unknown_coins.contains(&request.coin) {
                    return Err(VenueError::UnknownAsset(request.coin.clone()));
                }
                state.next_order_id += 1;
                let oid = state.next_order_id;
                state.placed.push(request);
                Ok(oid)
            })
        }

        fn fetch_account_state(&self) -> BoxFuture<'_, Result<AccountSnapshot>> {
            Box::pin(async move { Ok(self.inner.lock().account.clone()) })
        }

        fn fetch_fills(&self) -> BoxFuture<'_, Result<Vec<VenueFill>>> {
            Box::pin(async move { Ok(self.inner.lock().fills.clone()) })
        }
    }
}
