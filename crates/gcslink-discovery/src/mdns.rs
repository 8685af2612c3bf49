//! DNS-SD backend on top of the `mdns-sd` daemon.
//!
//! The daemon resolves services on its own while browsing, so resolve and
//! address queries are answered from what the browse has seen. Each query
//! gets a synthetic source; a pending query yields no replies until the
//! browse catches up.

use crate::dnssd::{
    AddressReply, BrowseReply, DnsSd, ErrorCode, QueryHandle, RecordClass, RecordType, Reply,
    ResolveReply, ServiceFlags,
};
use crate::error::{DiscoveryError, Result};
use dashmap::DashMap;
use gcslink_core::types::{InterfaceIndex, SourceId};
use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent, ServiceInfo};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

const LOCAL_DOMAIN: &str = "local.";

/// What the browse learned about one resolved instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub full_name: String,
    pub host_name: String,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
    pub host_ttl: u32,
}

impl ResolvedService {
    fn from_info(info: &ServiceInfo) -> Self {
        let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
        addresses.sort();

        Self {
            full_name: info.get_fullname().to_string(),
            host_name: info.get_hostname().to_string(),
            port: info.get_port(),
            addresses,
            host_ttl: info.get_host_ttl(),
        }
    }

    fn first_ipv4(&self) -> Option<[u8; 4]> {
        self.addresses.iter().find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(v4.octets()),
            IpAddr::V6(_) => None,
        })
    }
}

/// Resolved instances keyed by full service name
type ResolvedCache = Arc<DashMap<String, ResolvedService>>;

enum QueryKind {
    Browse {
        daemon: Arc<ServiceDaemon>,
        receiver: Receiver<ServiceEvent>,
        ty_domain: String,
    },
    Resolve {
        interface: InterfaceIndex,
        full_name: String,
    },
    Address {
        interface: InterfaceIndex,
        host_name: String,
    },
}

/// An outstanding query against the daemon
pub struct MdnsHandle {
    source: SourceId,
    kind: QueryKind,
}

impl QueryHandle for MdnsHandle {
    fn source(&self) -> SourceId {
        self.source
    }
}

impl Drop for MdnsHandle {
    fn drop(&mut self) {
        if let QueryKind::Browse {
            daemon, ty_domain, ..
        } = &self.kind
        {
            if let Err(e) = daemon.stop_browse(ty_domain) {
                debug!(ty_domain = %ty_domain, error = %e, "Failed to stop browse");
            }
        }
    }
}

impl std::fmt::Debug for MdnsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            QueryKind::Browse { .. } => "browse",
            QueryKind::Resolve { .. } => "resolve",
            QueryKind::Address { .. } => "address",
        };
        f.debug_struct("MdnsHandle")
            .field("source", &self.source)
            .field("kind", &kind)
            .finish()
    }
}

/// Multicast DNS backend
pub struct MdnsBackend {
    daemon: Arc<ServiceDaemon>,
    resolved: ResolvedCache,
    next_source: u64,
}

impl MdnsBackend {
    /// Creates a backend with its own daemon
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::backend("mDNS daemon start", e))?;

        Ok(Self {
            daemon: Arc::new(daemon),
            resolved: Arc::new(DashMap::new()),
            next_source: 0,
        })
    }

    fn allocate(&mut self) -> SourceId {
        self.next_source += 1;
        SourceId::new(self.next_source)
    }

    /// Stops the daemon thread
    pub fn shutdown(&self) -> Result<()> {
        self.daemon
            .shutdown()
            .map(|_| ())
            .map_err(|e| DiscoveryError::backend("mDNS daemon shutdown", e))
    }

    fn drain_browse(
        resolved: &ResolvedCache,
        receiver: &Receiver<ServiceEvent>,
        ty_domain: &str,
    ) -> Result<Vec<Reply>> {
        let mut replies = Vec::new();

        while let Ok(event) = receiver.try_recv() {
            match event {
                ServiceEvent::ServiceFound(ty, full_name) => {
                    trace!(service = %full_name, "Service found");
                    replies.push(browse_reply(&ty, &full_name, ServiceFlags::ADD));
                }
                ServiceEvent::ServiceResolved(info) => {
                    let service = ResolvedService::from_info(&info);
                    debug!(
                        service = %service.full_name,
                        host = %service.host_name,
                        port = service.port,
                        "Service resolved"
                    );
                    resolved.insert(service.full_name.clone(), service);
                }
                ServiceEvent::ServiceRemoved(ty, full_name) => {
                    resolved.remove(&full_name);
                    replies.push(browse_reply(&ty, &full_name, ServiceFlags::NONE));
                }
                ServiceEvent::SearchStarted(ty) => trace!(ty_domain = %ty, "Search started"),
                ServiceEvent::SearchStopped(ty) => debug!(ty_domain = %ty, "Search stopped"),
            }
        }

        if replies.is_empty() && receiver.is_disconnected() {
            return Err(DiscoveryError::backend(
                "browse",
                format!("event channel for {} closed", ty_domain),
            ));
        }

        mark_more_coming(&mut replies);
        Ok(replies)
    }
}

impl DnsSd for MdnsBackend {
    type Handle = MdnsHandle;

    fn browse(&mut self, reg_type: &str) -> Result<MdnsHandle> {
        let ty_domain = qualify(reg_type);
        let receiver = self
            .daemon
            .browse(&ty_domain)
            .map_err(|e| DiscoveryError::backend("browse", e))?;

        Ok(MdnsHandle {
            source: self.allocate(),
            kind: QueryKind::Browse {
                daemon: self.daemon.clone(),
                receiver,
                ty_domain,
            },
        })
    }

    fn resolve(
        &mut self,
        interface: InterfaceIndex,
        service_name: &str,
        reg_type: &str,
        domain: &str,
    ) -> Result<MdnsHandle> {
        let full_name = format!("{}.{}{}", service_name, reg_type, domain);
        Ok(MdnsHandle {
            source: self.allocate(),
            kind: QueryKind::Resolve {
                interface,
                full_name,
            },
        })
    }

    fn query_address(&mut self, interface: InterfaceIndex, full_name: &str) -> Result<MdnsHandle> {
        Ok(MdnsHandle {
            source: self.allocate(),
            kind: QueryKind::Address {
                interface,
                host_name: full_name.to_string(),
            },
        })
    }

    fn process_result(&mut self, handle: &mut MdnsHandle) -> Result<Vec<Reply>> {
        match &handle.kind {
            QueryKind::Browse {
                receiver,
                ty_domain,
                ..
            } => Self::drain_browse(&self.resolved, receiver, ty_domain),
            QueryKind::Resolve {
                interface,
                full_name,
            } => Ok(answer_resolve(&self.resolved, *interface, full_name)),
            QueryKind::Address {
                interface,
                host_name,
            } => Ok(answer_address(&self.resolved, *interface, host_name)),
        }
    }
}

/// Answers a resolve once the browse has resolved `full_name`
fn answer_resolve(
    resolved: &ResolvedCache,
    interface: InterfaceIndex,
    full_name: &str,
) -> Vec<Reply> {
    resolved
        .get(full_name)
        .map(|entry| vec![resolve_reply(interface, entry.value())])
        .unwrap_or_default()
}

/// Answers an address query once some resolved instance carries an IPv4
/// address for `host_name`
fn answer_address(
    resolved: &ResolvedCache,
    interface: InterfaceIndex,
    host_name: &str,
) -> Vec<Reply> {
    lookup_address(resolved, host_name)
        .map(|(octets, ttl)| vec![address_reply(interface, host_name, octets, ttl)])
        .unwrap_or_default()
}

/// Appends the local domain unless one is already present
fn qualify(reg_type: &str) -> String {
    if reg_type.ends_with(LOCAL_DOMAIN) {
        reg_type.to_string()
    } else if reg_type.ends_with('.') {
        format!("{}{}", reg_type, LOCAL_DOMAIN)
    } else {
        format!("{}.{}", reg_type, LOCAL_DOMAIN)
    }
}

/// Splits `Instance._gcs._udp.local.` into instance, type and domain
fn split_full_name<'a>(ty_domain: &str, full_name: &'a str) -> (&'a str, String, String) {
    let instance = full_name
        .strip_suffix(ty_domain)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(full_name);

    let (reg_type, domain) = match ty_domain.strip_suffix(LOCAL_DOMAIN) {
        Some(reg_type) => (reg_type.to_string(), LOCAL_DOMAIN.to_string()),
        None => (ty_domain.to_string(), String::new()),
    };
    (instance, reg_type, domain)
}

fn browse_reply(ty_domain: &str, full_name: &str, flags: ServiceFlags) -> Reply {
    let (instance, reg_type, reply_domain) = split_full_name(ty_domain, full_name);
    Reply::Browse(BrowseReply {
        flags,
        interface: InterfaceIndex::ANY,
        error: ErrorCode::NO_ERROR,
        service_name: instance.to_string(),
        reg_type,
        reply_domain,
    })
}

fn resolve_reply(interface: InterfaceIndex, service: &ResolvedService) -> Reply {
    Reply::Resolve(ResolveReply {
        flags: ServiceFlags::NONE,
        interface,
        error: ErrorCode::NO_ERROR,
        full_name: service.full_name.clone(),
        host_target: service.host_name.clone(),
        port: service.port,
        txt_record: Vec::new(),
    })
}

fn address_reply(interface: InterfaceIndex, host_name: &str, octets: [u8; 4], ttl: u32) -> Reply {
    Reply::Address(AddressReply {
        flags: ServiceFlags::NONE,
        interface,
        error: ErrorCode::NO_ERROR,
        full_name: host_name.to_string(),
        rr_type: RecordType::A,
        rr_class: RecordClass::IN,
        rdata: octets.to_vec(),
        ttl,
    })
}

fn lookup_address(resolved: &ResolvedCache, host_name: &str) -> Option<([u8; 4], u32)> {
    let found = resolved
        .iter()
        .filter(|entry| entry.host_name.eq_ignore_ascii_case(host_name))
        .find_map(|entry| entry.first_ipv4().map(|octets| (octets, entry.host_ttl)));

    if found.is_none() {
        trace!(host = %host_name, "No IPv4 address known yet");
    }
    found
}

/// Flags every reply but the last as having more queued behind it
fn mark_more_coming(replies: &mut [Reply]) {
    let count = replies.len();
    for reply in replies.iter_mut().take(count.saturating_sub(1)) {
        if let Reply::Browse(browse) = reply {
            browse.flags = browse.flags | ServiceFlags::MORE_COMING;
        } else {
            warn!("Unexpected reply kind in browse batch");
        }
    }
}
