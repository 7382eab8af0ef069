//! Error types for the venue gateway.

use thiserror::Error;

/// Venue gateway errors.
///
/// Retryable errors leave the engine state untouched so the next tick
/// retries the same step; fatal errors abort startup.
#[derive(Debug, Error)]
pub enum VenueError {
    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Venue API error: {0}")]
    Api(String),

    #[error("Malformed venue response: {0}")]
    MalformedResponse(String),

    #[error("Order rejected by venue: {0}")]
    OrderRejected(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl VenueError {
    /// Transient failures and venue-side rejections are retried on the
    /// next tick; signing and asset-resolution failures are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_)
            | Self::Api(_)
            | Self::MalformedResponse(_)
            | Self::OrderRejected(_) => true,
            Self::UnknownAsset(_) | Self::Signing(_) => false,
        }
    }
}

impl From<reqwest::Error> for VenueError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type alias for venue operations.
pub type Result<T> = std::result::Result<T, VenueError>;
