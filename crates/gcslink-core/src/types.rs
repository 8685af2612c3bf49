//! Core types for the gcslink discovery service.
//!
//! These are the small value types shared between the discovery pipeline,
//! the host event loop and the outbound transport layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Readiness-source identifier.
///
/// This is the key of the host's event registration table. Every
/// outstanding discovery query is waitable through exactly one source, and
/// a fresh source is allocated for every pipeline stage.
///
/// # Examples
///
/// ```
/// use gcslink_core::types::SourceId;
///
/// let id = SourceId::new(7);
/// assert_eq!(id.get(), 7);
/// assert_eq!(id.to_string(), "src#7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(u64);

impl SourceId {
    /// Wraps a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

impl From<u64> for SourceId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Network interface on which a service was seen.
///
/// Carried from the browse reply into the resolve and address queries so
/// they are issued on the same link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceIndex(u32);

impl InterfaceIndex {
    /// Any interface.
    pub const ANY: InterfaceIndex = InterfaceIndex(0);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    pub fn is_any(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for InterfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            write!(f, "any")
        } else {
            write!(f, "if{}", self.0)
        }
    }
}

/// A ground control station this process already streams to.
///
/// At most one record exists per (name, port) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Full name reported by the address lookup
    pub name: String,
    /// Port reported by the resolve step
    pub port: u16,
}

impl ConnectionRecord {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }

    /// Returns true if this record describes the given endpoint.
    pub fn matches(&self, name: &str, port: u16) -> bool {
        self.port == port && self.name == name
    }
}

impl fmt::Display for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.port)
    }
}

/// Direction of an outbound telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Packets are only written to the endpoint, never read back
    Output,
    /// Packets flow both ways
    Duplex,
}

impl Direction {
    /// Returns true if inbound packets are read from the stream.
    pub fn reads_input(&self) -> bool {
        matches!(self, Direction::Duplex)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Output => write!(f, "output"),
            Direction::Duplex => write!(f, "duplex"),
        }
    }
}
