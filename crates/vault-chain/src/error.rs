//! Error types for the chain gateway.

use thiserror::Error;

/// Chain gateway errors.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    /// A call reverted, either in pre-flight simulation or on chain.
    /// Carries the revert reason when the node provides one.
    #[error("Call reverted: {0}")]
    Reverted(String),

    /// Wiring/configuration mismatch detected at startup. Fatal.
    #[error("Chain configuration error: {0}")]
    Config(String),
}

impl ChainError {
    /// RPC failures and reverts are retried next tick with unchanged
    /// state; config errors abort startup.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

/// Result type alias for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
