//! Error types for the synchronization manager.

use crate::session::SessionState;
use thiserror::Error;

/// Main error type for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Invalid change payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Opaque error reported by a change-feed provider.
///
/// Returned from [`ChannelFactory::create`](crate::feed::ChannelFactory::create)
/// when a channel cannot be opened, and passed to the error callback when an
/// open channel fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FeedError {
    /// Human-readable error message.
    pub message: String,
    /// Whether the provider expects a later attempt to succeed.
    pub recoverable: bool,
}

impl FeedError {
    /// Create a recoverable feed error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: true,
        }
    }

    /// Create a feed error the provider will not recover from.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: false,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
