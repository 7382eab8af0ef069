//! Durable execution state, backed by SQLite.
//!
//! Every lifecycle mutation the engine makes is persisted through
//! [`ExecutionStore`] before the engine acts on it, so a crash at any
//! point can be recovered by reloading the unsettled rows.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::ExecutionStore;
