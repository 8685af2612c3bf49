use crate::client::{OutboundTransport, TelemetryOutput};
use crate::state::OutputMetrics;
use anyhow::{Context, Result};
use gcslink_core::error::ConnectionError;
use gcslink_core::types::Direction;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tracing::{debug, info, instrument, warn};

/// Configuration for UDP outputs
#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    /// Local bind address (None = automatic)
    pub local_addr: Option<SocketAddr>,
    /// Socket send buffer size
    pub send_buffer_size: usize,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            local_addr: None,
            send_buffer_size: 65536,
        }
    }
}

/// Opens output-only UDP streams to discovered endpoints
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    config: UdpTransportConfig,
}

impl UdpTransport {
    pub fn new(config: UdpTransportConfig) -> Self {
        Self { config }
    }
}

impl OutboundTransport for UdpTransport {
    fn open_outbound(
        &self,
        endpoint: &str,
        baud: u32,
        direction: Direction,
    ) -> Result<Box<dyn TelemetryOutput>> {
        let output = UdpOutput::open(endpoint, baud, direction, &self.config)?;
        Ok(Box::new(output))
    }
}

/// A connected, non-blocking UDP socket that only writes
///
/// The rate parameter is kept for reporting; datagram links ignore it.
pub struct UdpOutput {
    endpoint: String,
    socket: UdpSocket,
    baud: u32,
    metrics: OutputMetrics,
}

impl UdpOutput {
    /// Bind a local socket and connect it to `endpoint`
    #[instrument(skip(config))]
    pub fn open(
        endpoint: &str,
        baud: u32,
        direction: Direction,
        config: &UdpTransportConfig,
    ) -> Result<Self> {
        if direction.reads_input() {
            return Err(ConnectionError::UnsupportedDirection {
                direction: direction.to_string(),
            }
            .into());
        }

        let remote: SocketAddr = endpoint
            .parse()
            .map_err(|_| ConnectionError::invalid_endpoint(endpoint))?;

        let local_addr = config.local_addr.unwrap_or_else(|| match remote.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        });

        let socket2 = socket2::Socket::new(
            if remote.is_ipv4() {
                socket2::Domain::IPV4
            } else {
                socket2::Domain::IPV6
            },
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )
        .context("Failed to create UDP socket")?;

        // Best-effort
        let _ = socket2.set_send_buffer_size(config.send_buffer_size);

        socket2.set_nonblocking(true)?;
        socket2
            .bind(&local_addr.into())
            .map_err(|e| ConnectionError::from_io(local_addr.to_string(), &e))?;
        socket2
            .connect(&remote.into())
            .map_err(|e| ConnectionError::from_io(endpoint, &e))?;

        let socket: UdpSocket = socket2.into();

        info!(endpoint = endpoint, baud = baud, "UDP output opened");

        Ok(Self {
            endpoint: endpoint.to_string(),
            socket,
            baud,
            metrics: OutputMetrics::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to read local address")
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn metrics(&self) -> &OutputMetrics {
        &self.metrics
    }
}

impl TelemetryOutput for UdpOutput {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn direction(&self) -> Direction {
        Direction::Output
    }

    fn write_packet(&self, packet: &[u8]) -> Result<usize> {
        match self.socket.send(packet) {
            Ok(n) => {
                self.metrics.record_packet_sent(n as u64);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!(endpoint = %self.endpoint, "Send buffer full, dropping packet");
                self.metrics.record_dropped();
                Ok(0)
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "UDP send failed");
                self.metrics.record_error();
                Err(e).with_context(|| format!("Failed to send to {}", self.endpoint))
            }
        }
    }
}

impl Drop for UdpOutput {
    fn drop(&mut self) {
        debug!(endpoint = %self.endpoint, metrics = ?self.metrics.snapshot(), "UDP output closed");
    }
}
