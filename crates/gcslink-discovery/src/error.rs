//! Error types for the discovery pipeline

use gcslink_core::error::ConnectionError;
use gcslink_core::types::SourceId;
use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during GCS discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The initial browse could not be started
    #[error("Failed to browse for service type '{reg_type}': {reason}")]
    BrowseFailed { reg_type: String, reason: String },

    /// The browse query stopped delivering events
    #[error("Browse for '{reg_type}' was lost: {reason}")]
    BrowseLost { reg_type: String, reason: String },

    /// A discovery library call failed
    #[error("{operation} failed: {reason}")]
    Backend { operation: String, reason: String },

    /// The event table already holds a different entry for this source
    #[error("Source {0} is already registered")]
    DuplicateSource(SourceId),

    /// No entry exists for this source
    #[error("Source {0} is not registered")]
    UnknownSource(SourceId),

    /// Opening the outbound stream failed
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    /// Discovery already started
    #[error("Discovery is already running")]
    AlreadyStarted,

    /// Invalid configuration
    #[error("Invalid discovery configuration: {0}")]
    InvalidConfig(String),
}

impl DiscoveryError {
    /// Creates a backend error.
    pub fn backend(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Backend {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the pipeline cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiscoveryError::BrowseFailed { .. } | DiscoveryError::BrowseLost { .. }
        )
    }

    /// Returns true if a failed connect could succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DiscoveryError::Connect { source, .. } => source
                .downcast_ref::<ConnectionError>()
                .is_some_and(ConnectionError::is_transient),
            _ => false,
        }
    }
}
