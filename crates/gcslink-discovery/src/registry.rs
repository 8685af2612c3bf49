//! Connection registry and establisher

use crate::error::{DiscoveryError, Result};
use gcslink_client::{OutboundTransport, OutputList};
use gcslink_core::types::{ConnectionRecord, Direction};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, instrument};

/// De-duplicated set of GCS endpoints already streamed to
///
/// Records are never removed.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    records: Vec<ConnectionRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no record exists for (name, port)
    pub fn should_connect(&self, name: &str, port: u16) -> bool {
        !self.records.iter().any(|r| r.matches(name, port))
    }

    /// Add a record, returning false if it already existed
    pub fn record(&mut self, name: &str, port: u16) -> bool {
        if !self.should_connect(name, port) {
            return false;
        }
        self.records.push(ConnectionRecord::new(name, port));
        true
    }

    pub fn records(&self) -> &[ConnectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Opens outbound streams to resolved endpoints
pub struct Establisher<X> {
    transport: X,
    outputs: OutputList,
    registry: ConnectionRegistry,
    baud: u32,
}

impl<X: OutboundTransport> Establisher<X> {
    pub fn new(transport: X, outputs: OutputList, baud: u32) -> Self {
        Self {
            transport,
            outputs,
            registry: ConnectionRegistry::new(),
            baud,
        }
    }

    pub fn should_connect(&self, name: &str, port: u16) -> bool {
        self.registry.should_connect(name, port)
    }

    /// Open an output-only stream to `address:port` and record it.
    ///
    /// Transport failures are returned without retry and leave the
    /// registry untouched.
    #[instrument(skip(self))]
    pub fn connect(&mut self, name: &str, address: IpAddr, port: u16) -> Result<()> {
        let endpoint = SocketAddr::new(address, port).to_string();

        let stream = self
            .transport
            .open_outbound(&endpoint, self.baud, Direction::Output)
            .map_err(|source| DiscoveryError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;

        self.outputs.push(stream);
        self.registry.record(name, port);

        debug!(name = name, endpoint = %endpoint, "Recorded GCS connection");
        Ok(())
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn outputs(&self) -> &OutputList {
        &self.outputs
    }
}
