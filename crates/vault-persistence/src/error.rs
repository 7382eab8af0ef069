//! Error types for the execution store.

use thiserror::Error;

/// Persistence error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to decode column {column}: {message}")]
    Decode { column: &'static str, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn decode(column: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            column,
            message: err.to_string(),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
