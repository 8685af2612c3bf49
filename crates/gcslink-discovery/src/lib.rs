//! Automatic discovery of MAVLink ground control stations.
//!
//! GCS applications advertise themselves over DNS-SD as `_gcs._udp.`. This
//! crate browses for that type and takes each instance through a three
//! stage chain:
//! 1. Browse: an instance appears (or is withdrawn)
//! 2. Resolve: the instance resolves to a host target and port
//! 3. Query: the host target resolves to an IPv4 address
//!
//! Once an address is known, an output-only telemetry stream is opened to
//! `ip:port` unless one already exists for the same (name, port), and
//! `Connected to <service> at <ip>:<port>` is printed.
//!
//! # Architecture
//!
//! Every outstanding query is registered in a host-owned [`EventTable`] and
//! deregistered exactly when its reply has been handled. [`HostLoop`] polls
//! the table and hands each source back to [`Pipeline::process_result`].
//! The DNS-SD library sits behind the [`DnsSd`] trait; [`MdnsBackend`] is
//! the multicast DNS implementation.
//!
//! # Example
//!
//! ```no_run
//! use gcslink_client::{udp::UdpTransport, OutputList};
//! use gcslink_core::DiscoveryConfig;
//! use gcslink_discovery::{HostLoop, MdnsBackend, Pipeline, SelectTable};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let table = SelectTable::new();
//!     let outputs = OutputList::new();
//!     let pipeline = Pipeline::new(
//!         DiscoveryConfig::default(),
//!         MdnsBackend::new()?,
//!         table.clone(),
//!         UdpTransport::default(),
//!         outputs.clone(),
//!     );
//!
//!     let mut host = HostLoop::new(table, pipeline);
//!     host.run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod descriptor;
pub mod dnssd;
pub mod error;
pub mod host;
pub mod mdns;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod table;

pub use descriptor::{Descriptors, Query};
pub use dnssd::{
    AddressReply, BrowseReply, DnsSd, ErrorCode, QueryHandle, RecordClass, RecordType, Reply,
    ResolveReply, ServiceFlags,
};
pub use error::{DiscoveryError, Result};
pub use host::HostLoop;
pub use mdns::{MdnsBackend, MdnsHandle};
pub use pipeline::{Pipeline, PipelineStats};
pub use registry::{ConnectionRegistry, Establisher};
pub use stage::{QueryContext, ResolveContext, Stage, StageKind};
pub use table::{EventTable, Handler, Registration, SelectTable};
