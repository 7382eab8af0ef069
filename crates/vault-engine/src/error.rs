//! Error types for the engine.

use thiserror::Error;

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Chain(#[from] vault_chain::ChainError),

    #[error(transparent)]
    Venue(#[from] vault_venue::VenueError),

    #[error(transparent)]
    Store(#[from] vault_persistence::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid engine configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the next tick should simply retry. Configuration errors
    /// are the only non-retryable class at runtime.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Chain(e) => e.is_retryable(),
            Self::Venue(e) => e.is_retryable(),
            Self::Store(_) | Self::Serialization(_) => true,
            Self::Config(_) => false,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
