//! # gcslink core
//!
//! Shared types, error handling, and configuration for the gcslink ground
//! control station discovery service.
//!
//! - **Types**: readiness-source identifiers, interface indexes, connection
//!   records and stream directions used by the discovery pipeline and the
//!   transport layer.
//! - **Errors**: `thiserror` based error taxonomy for configuration,
//!   and connection failures.
//! - **Configuration**: YAML files with environment variable overrides.
//!
//! ## Example
//!
//! ```
//! use gcslink_core::config::AppConfig;
//!
//! let config = AppConfig::default();
//! assert_eq!(config.discovery.reg_type, "_gcs._udp.");
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod discovery_config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use discovery_config::DiscoveryConfig;
pub use error::{GcsLinkError, Result};
pub use types::{ConnectionRecord, Direction, InterfaceIndex, SourceId};
