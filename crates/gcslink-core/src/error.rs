//! Error types for gcslink.
//!
//! All errors implement `std::error::Error` and are serializable so they can
//! be emitted as structured log fields.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias using GcsLinkError as the error type.
pub type Result<T> = std::result::Result<T, GcsLinkError>;

/// Top-level error type for gcslink operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum GcsLinkError {
    /// Connection-related errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

}

/// Errors raised while opening an outbound telemetry stream.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConnectionError {
    /// Failed to establish a connection
    #[error("Failed to connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// Endpoint string could not be parsed
    #[error("Invalid endpoint: {endpoint}")]
    InvalidEndpoint { endpoint: String },

    /// Stream direction not supported by the transport
    #[error("Unsupported stream direction: {direction}")]
    UnsupportedDirection { direction: String },

    /// Address already in use
    #[error("Address already in use: {address}")]
    AddressInUse { address: String },

    /// Network is unreachable
    #[error("Network unreachable: {endpoint}")]
    NetworkUnreachable { endpoint: String },
}

impl ConnectionError {
    /// Creates a connection failed error.
    pub fn failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
        }
    }

    /// Classifies a socket error raised while binding or connecting.
    pub fn from_io(endpoint: impl Into<String>, err: &io::Error) -> Self {
        let endpoint = endpoint.into();
        match err.kind() {
            io::ErrorKind::AddrInUse => Self::AddressInUse { address: endpoint },
            io::ErrorKind::NetworkUnreachable | io::ErrorKind::HostUnreachable => {
                Self::NetworkUnreachable { endpoint }
            }
            _ => Self::ConnectionFailed {
                endpoint,
                reason: err.to_string(),
            },
        }
    }

    /// Returns true if retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::NetworkUnreachable { .. } | ConnectionError::AddressInUse { .. }
        )
    }
}

/// Errors related to configuration.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },
}

impl ConfigError {
    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a validation failed error.
    pub fn validation_failed(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }
}
