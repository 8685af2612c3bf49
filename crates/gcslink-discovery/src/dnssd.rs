//! Capability surface of the DNS-SD library.
//!
//! The pipeline only needs four calls: browse, resolve, address query and
//! "process pending result". Each outstanding call is a [`QueryHandle`]
//! that is waitable through one readiness source. Instead of invoking
//! callbacks, [`DnsSd::process_result`] returns the replies that were
//! pending on the handle, and the pipeline dispatches them by stage.

use crate::error::Result;
use crate::stage::StageKind;
use gcslink_core::types::{InterfaceIndex, SourceId};
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::BitOr;

/// Error code attached to every reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    pub const NO_ERROR: ErrorCode = ErrorCode(0);
    pub const UNKNOWN: ErrorCode = ErrorCode(-65537);
    pub const NO_SUCH_NAME: ErrorCode = ErrorCode(-65538);
    pub const NO_MEMORY: ErrorCode = ErrorCode(-65539);
    pub const BAD_PARAM: ErrorCode = ErrorCode(-65540);
    pub const BAD_REFERENCE: ErrorCode = ErrorCode(-65541);
    pub const BAD_STATE: ErrorCode = ErrorCode(-65542);
    pub const BAD_FLAGS: ErrorCode = ErrorCode(-65543);
    pub const UNSUPPORTED: ErrorCode = ErrorCode(-65544);
    pub const NOT_INITIALIZED: ErrorCode = ErrorCode(-65545);
    pub const SERVICE_NOT_RUNNING: ErrorCode = ErrorCode(-65563);
    pub const TIMEOUT: ErrorCode = ErrorCode(-65568);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub const fn get(&self) -> i32 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Self::NO_ERROR => "NoError",
            Self::UNKNOWN => "Unknown",
            Self::NO_SUCH_NAME => "NoSuchName",
            Self::NO_MEMORY => "NoMemory",
            Self::BAD_PARAM => "BadParam",
            Self::BAD_REFERENCE => "BadReference",
            Self::BAD_STATE => "BadState",
            Self::BAD_FLAGS => "BadFlags",
            Self::UNSUPPORTED => "Unsupported",
            Self::NOT_INITIALIZED => "NotInitialized",
            Self::SERVICE_NOT_RUNNING => "ServiceNotRunning",
            Self::TIMEOUT => "Timeout",
            _ => "Other",
        }
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::NO_ERROR
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Reply flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ServiceFlags(u32);

impl ServiceFlags {
    pub const NONE: ServiceFlags = ServiceFlags(0);
    /// More replies are queued behind this one
    pub const MORE_COMING: ServiceFlags = ServiceFlags(0x1);
    /// The service was added (absent means removed)
    pub const ADD: ServiceFlags = ServiceFlags(0x2);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: ServiceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_add(&self) -> bool {
        self.contains(Self::ADD)
    }

    pub fn more_coming(&self) -> bool {
        self.contains(Self::MORE_COMING)
    }
}

impl BitOr for ServiceFlags {
    type Output = ServiceFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ServiceFlags(self.0 | rhs.0)
    }
}

/// DNS resource record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordType(pub u16);

impl RecordType {
    pub const A: RecordType = RecordType(1);
}

/// DNS resource record class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordClass(pub u16);

impl RecordClass {
    pub const IN: RecordClass = RecordClass(1);
}

/// A service instance appeared or disappeared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseReply {
    pub flags: ServiceFlags,
    pub interface: InterfaceIndex,
    pub error: ErrorCode,
    pub service_name: String,
    pub reg_type: String,
    pub reply_domain: String,
}

/// A service instance resolved to a host target and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveReply {
    pub flags: ServiceFlags,
    pub interface: InterfaceIndex,
    pub error: ErrorCode,
    pub full_name: String,
    pub host_target: String,
    pub port: u16,
    pub txt_record: Vec<u8>,
}

/// A record answer for an address query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressReply {
    pub flags: ServiceFlags,
    pub interface: InterfaceIndex,
    pub error: ErrorCode,
    pub full_name: String,
    pub rr_type: RecordType,
    pub rr_class: RecordClass,
    pub rdata: Vec<u8>,
    pub ttl: u32,
}

impl AddressReply {
    /// Decodes the raw A record payload.
    ///
    /// Returns `None` unless the payload is exactly four octets.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        let octets: [u8; 4] = self.rdata.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }
}

/// One reply drained from a query handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Browse(BrowseReply),
    Resolve(ResolveReply),
    Address(AddressReply),
}

impl Reply {
    /// Stage that produces this kind of reply
    pub fn stage(&self) -> StageKind {
        match self {
            Reply::Browse(_) => StageKind::Browsing,
            Reply::Resolve(_) => StageKind::Resolving,
            Reply::Address(_) => StageKind::Querying,
        }
    }
}

/// An outstanding DNS-SD call
///
/// Dropping the handle deallocates it.
pub trait QueryHandle {
    /// The readiness source this handle is waitable on
    fn source(&self) -> SourceId;
}

/// The DNS-SD library as seen by the pipeline
pub trait DnsSd {
    type Handle: QueryHandle;

    /// Start a continuous browse for `reg_type`
    fn browse(&mut self, reg_type: &str) -> Result<Self::Handle>;

    /// Resolve one instance to its host target and port
    fn resolve(
        &mut self,
        interface: InterfaceIndex,
        service_name: &str,
        reg_type: &str,
        domain: &str,
    ) -> Result<Self::Handle>;

    /// Query the A record of `full_name`
    fn query_address(&mut self, interface: InterfaceIndex, full_name: &str)
        -> Result<Self::Handle>;

    /// Drain everything pending on `handle` without blocking
    fn process_result(&mut self, handle: &mut Self::Handle) -> Result<Vec<Reply>>;
}
