//! Application-level errors.

use thiserror::Error;

/// Top-level application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] crate::keys::KeyError),

    #[error(transparent)]
    Chain(#[from] vault_chain::ChainError),

    #[error(transparent)]
    Venue(#[from] vault_venue::VenueError),

    #[error(transparent)]
    Store(#[from] vault_persistence::StoreError),

    #[error(transparent)]
    Engine(#[from] vault_engine::EngineError),
}

/// Result type alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
