//! Chain gateway: intent events, pause state, and exactly-once
//! settlement against the vault contracts.

pub mod error;
pub mod evm;
pub mod gateway;

pub use error::{ChainError, Result};
pub use evm::{connect, EvmChainGateway};
pub use gateway::{mock, BoxFuture, ChainGateway, DynChainGateway, IntentEvent, SettlementRequest};
