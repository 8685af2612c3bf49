//! Pipeline stages and the per-chain context carried between them

use gcslink_core::types::InterfaceIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plain stage tag, as stored in the host event table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Browsing,
    Resolving,
    Querying,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Browsing => write!(f, "browsing"),
            StageKind::Resolving => write!(f, "resolving"),
            StageKind::Querying => write!(f, "querying"),
        }
    }
}

/// Context for a resolve query.
///
/// The resolve reply does not repeat the service name, so it travels here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveContext {
    pub service_name: String,
    pub interface: InterfaceIndex,
}

/// Context for an address query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub service_name: String,
    pub port: u16,
    pub interface: InterfaceIndex,
}

/// Stage of one outstanding query, with everything the next step needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Continuous browse for a registration type
    Browsing { reg_type: String },
    /// Resolving one advertised instance to host and port
    Resolving(ResolveContext),
    /// Looking up the A record of a resolved host
    Querying(QueryContext),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Browsing { .. } => StageKind::Browsing,
            Stage::Resolving(_) => StageKind::Resolving,
            Stage::Querying(_) => StageKind::Querying,
        }
    }

    /// Service name this stage belongs to, if it is part of a chain
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Stage::Browsing { .. } => None,
            Stage::Resolving(ctx) => Some(&ctx.service_name),
            Stage::Querying(ctx) => Some(&ctx.service_name),
        }
    }
}
