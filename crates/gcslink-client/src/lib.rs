//! # gcslink-client
//!
//! Outbound telemetry transport for discovered ground control stations.
//!
//! - **`OutboundTransport`**: opens a stream to an `ip:port` endpoint with a
//!   rate parameter and a direction flag.
//! - **`OutputList`**: the host-owned, append-only list of active streams.
//! - **UDP**: connected, non-blocking, output-only datagram streams.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gcslink_client::{OutboundTransport, OutputList, udp::UdpTransport};
//! use gcslink_core::types::Direction;
//!
//! fn main() -> anyhow::Result<()> {
//!     let outputs = OutputList::new();
//!     let transport = UdpTransport::default();
//!
//!     let stream = transport.open_outbound("192.168.1.50:14550", 115200, Direction::Output)?;
//!     outputs.push(stream);
//!     outputs.broadcast(&[0xfd, 0x09, 0x00]);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod state;
pub mod udp;

pub use client::{OutboundTransport, OutputList, TelemetryOutput};
pub use state::{MetricsSnapshot, OutputMetrics};
