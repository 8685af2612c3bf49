use anyhow::Result;
use gcslink_core::types::Direction;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// An open outbound telemetry stream
pub trait TelemetryOutput: Send + Sync {
    /// The `ip:port` endpoint this stream writes to
    fn endpoint(&self) -> &str;

    /// Direction the stream was opened with
    fn direction(&self) -> Direction;

    /// Write one telemetry packet
    ///
    /// # Returns
    /// * `Ok(n)` with the number of bytes handed to the transport
    /// * `Err` if the write failed
    fn write_packet(&self, packet: &[u8]) -> Result<usize>;
}

/// Transport collaborator that opens outbound telemetry streams
///
/// Failures are returned to the caller untouched; retry policy belongs to
/// whoever owns the stream list.
pub trait OutboundTransport {
    /// Open a stream to `endpoint` (formatted `ip:port`)
    fn open_outbound(
        &self,
        endpoint: &str,
        baud: u32,
        direction: Direction,
    ) -> Result<Box<dyn TelemetryOutput>>;
}

impl<T: OutboundTransport + ?Sized> OutboundTransport for Arc<T> {
    fn open_outbound(
        &self,
        endpoint: &str,
        baud: u32,
        direction: Direction,
    ) -> Result<Box<dyn TelemetryOutput>> {
        (**self).open_outbound(endpoint, baud, direction)
    }
}

/// Host-owned, append-only list of active outbound streams
///
/// Clones share the same list.
#[derive(Clone, Default)]
pub struct OutputList {
    outputs: Arc<RwLock<Vec<Box<dyn TelemetryOutput>>>>,
}

impl OutputList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stream
    pub fn push(&self, output: Box<dyn TelemetryOutput>) {
        debug!(endpoint = output.endpoint(), "Adding output");
        self.outputs.write().push(output);
    }

    pub fn len(&self) -> usize {
        self.outputs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.read().is_empty()
    }

    /// Endpoints of every stream, in insertion order
    pub fn endpoints(&self) -> Vec<String> {
        self.outputs
            .read()
            .iter()
            .map(|o| o.endpoint().to_string())
            .collect()
    }

    /// Write a packet to every stream, returning how many accepted it
    pub fn broadcast(&self, packet: &[u8]) -> usize {
        let outputs = self.outputs.read();
        let mut delivered = 0;
        for output in outputs.iter() {
            match output.write_packet(packet) {
                Ok(_) => delivered += 1,
                Err(e) => {
                    warn!(endpoint = output.endpoint(), error = %e, "Failed to write packet");
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for OutputList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputList")
            .field("endpoints", &self.endpoints())
            .finish()
    }
}
