//! Core domain types for the vault execution engine.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Usd`, `Price`, `Size`: precision-safe numeric types
//! - `OrderSide`: trading direction
//! - `Execution`, `ExecutionStatus`: the per-intent lifecycle row and its
//!   state machine

pub mod error;
pub mod execution;
pub mod money;
pub mod order;

pub use error::{CoreError, Result};
pub use execution::{Execution, ExecutionStatus, PnlBreakdown};
pub use money::{Price, Size, Usd};
pub use order::OrderSide;
