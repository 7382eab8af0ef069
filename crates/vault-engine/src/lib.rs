//! Order-lifecycle orchestration engine.
//!
//! Ties the chain gateway, venue gateway and execution store together
//! into the poll loop described in `engine`: intent ingestion,
//! risk-bounded sizing, fill reconciliation, settlement, and emergency
//! unwind.

pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod sizing;
pub mod unwind;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
