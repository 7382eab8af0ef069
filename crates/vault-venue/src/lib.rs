//! Venue gateway: typed access to the perp venue's REST API.
//!
//! The engine talks to the venue only through the [`VenueGateway`]
//! trait; [`HyperliquidGateway`] is the production implementation and
//! [`mock::MockVenueGateway`] the scriptable test double.

pub mod error;
pub mod gateway;
pub mod http;
pub mod signer;
pub mod types;

pub use error::{Result, VenueError};
pub use gateway::{mock, BoxFuture, DynVenueGateway, VenueGateway};
pub use http::{min_order_notional, HyperliquidGateway};
pub use signer::ExchangeSigner;
pub use types::{AccountSnapshot, OrderRequest, VenueFill, VenuePosition};
