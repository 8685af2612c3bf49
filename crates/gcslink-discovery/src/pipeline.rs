//! GCS resolution pipeline.
//!
//! Browse -> Resolve -> QueryAddress -> Connect. Every stage owns exactly one
//! registered source, and that source is deregistered in the same dispatch
//! that advances or ends the chain. A non-success error code ends the chain
//! silently; the only externally visible output is the confirmation line on
//! connect and a note when a service is withdrawn.

use crate::descriptor::Descriptors;
use crate::dnssd::{AddressReply, BrowseReply, DnsSd, Reply, ResolveReply};
use crate::error::{DiscoveryError, Result};
use crate::registry::{ConnectionRegistry, Establisher};
use crate::stage::{QueryContext, ResolveContext, Stage, StageKind};
use crate::table::EventTable;
use gcslink_client::{OutboundTransport, OutputList};
use gcslink_core::discovery_config::DiscoveryConfig;
use gcslink_core::types::SourceId;
use serde::Serialize;
use std::io::{self, Write};
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Counters for the otherwise silent failure paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Resolve queries started
    pub resolves_started: u64,
    /// Address queries started
    pub queries_started: u64,
    /// Browse replies carrying an error code
    pub browse_errors: u64,
    /// Resolve replies carrying an error code
    pub resolve_errors: u64,
    /// Address replies carrying an error code or an undecodable payload
    pub query_errors: u64,
    /// Stages that could not be started or registered
    pub start_failures: u64,
    /// Removal notifications seen
    pub removals: u64,
    /// Outbound streams opened
    pub connections: u64,
    /// Fully resolved endpoints that were already connected
    pub duplicates: u64,
}

impl PipelineStats {
    fn record_error(&mut self, stage: StageKind) {
        match stage {
            StageKind::Browsing => self.browse_errors += 1,
            StageKind::Resolving => self.resolve_errors += 1,
            StageKind::Querying => self.query_errors += 1,
        }
    }

    /// Error replies swallowed across all stages
    pub fn swallowed_errors(&self) -> u64 {
        self.browse_errors + self.resolve_errors + self.query_errors
    }
}

/// Discovers GCS services and opens one output stream per endpoint
pub struct Pipeline<D: DnsSd, T, X> {
    config: DiscoveryConfig,
    dnssd: D,
    descriptors: Descriptors<D::Handle, T>,
    establisher: Establisher<X>,
    browse_source: Option<SourceId>,
    stats: PipelineStats,
    console: Box<dyn Write + Send>,
}

impl<D, T, X> Pipeline<D, T, X>
where
    D: DnsSd,
    T: EventTable,
    X: OutboundTransport,
{
    /// Creates a pipeline wired to its collaborators.
    ///
    /// `table` is the host event table and `outputs` the host's list of
    /// active outbound streams.
    pub fn new(
        config: DiscoveryConfig,
        dnssd: D,
        table: T,
        transport: X,
        outputs: OutputList,
    ) -> Self {
        let establisher = Establisher::new(transport, outputs, config.baud);
        Self {
            config,
            dnssd,
            descriptors: Descriptors::new(table),
            establisher,
            browse_source: None,
            stats: PipelineStats::default(),
            console: Box::new(io::stdout()),
        }
    }

    /// Send user-facing lines to `console` instead of stdout.
    pub fn with_console(mut self, console: impl Write + Send + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    /// Start browsing for the configured registration type.
    ///
    /// An error here is fatal: nothing can be discovered without the browse.
    pub fn start(&mut self) -> Result<SourceId> {
        if self.browse_source.is_some() {
            return Err(DiscoveryError::AlreadyStarted);
        }

        self.config
            .validate()
            .map_err(DiscoveryError::InvalidConfig)?;

        let reg_type = self.config.reg_type.clone();
        let handle = self
            .dnssd
            .browse(&reg_type)
            .map_err(|e| DiscoveryError::BrowseFailed {
                reg_type: reg_type.clone(),
                reason: e.to_string(),
            })?;

        let source = self
            .descriptors
            .register(handle, Stage::Browsing {
                reg_type: reg_type.clone(),
            })
            .map_err(|e| DiscoveryError::BrowseFailed {
                reg_type: reg_type.clone(),
                reason: e.to_string(),
            })?;

        self.browse_source = Some(source);
        info!(reg_type = %reg_type, source = %source, "GCS discovery started");
        Ok(source)
    }

    /// Host handler for a readable source.
    ///
    /// Drains the replies pending on the source's query and dispatches them.
    /// Stage errors never surface here; the returned error is either a lost
    /// browse or a failed outbound connection.
    pub fn process_result(&mut self, source: SourceId) -> Result<()> {
        let replies = {
            let Some(query) = self.descriptors.get_mut(source) else {
                debug!(source = %source, "No query in flight for source");
                return Ok(());
            };

            match self.dnssd.process_result(&mut query.handle) {
                Ok(replies) => replies,
                Err(e) => return self.abandon(source, e),
            }
        };

        for reply in replies {
            // an earlier reply in this batch may have spent the query
            let Some(stage) = self.descriptors.stage(source).cloned() else {
                debug!(source = %source, "Dropping reply for spent query");
                break;
            };

            match (stage, reply) {
                (Stage::Browsing { .. }, Reply::Browse(reply)) => self.on_browse(reply),
                (Stage::Resolving(ctx), Reply::Resolve(reply)) => {
                    self.on_resolve(source, ctx, reply)
                }
                (Stage::Querying(ctx), Reply::Address(reply)) => {
                    self.on_address(source, ctx, reply)?
                }
                (stage, reply) => {
                    warn!(
                        source = %source,
                        stage = %stage.kind(),
                        reply = %reply.stage(),
                        "Reply does not match query stage"
                    );
                }
            }
        }

        Ok(())
    }

    /// A service appeared or disappeared.
    fn on_browse(&mut self, reply: BrowseReply) {
        if !reply.error.is_ok() {
            debug!(error = %reply.error, "Browse reply carried an error");
            self.stats.record_error(StageKind::Browsing);
            return;
        }

        if !reply.flags.is_add() {
            // outputs and records outlive the advertisement
            self.announce(format_args!("Service removed"));
            info!(service = %reply.service_name, "Service removed");
            self.stats.removals += 1;
            return;
        }

        let handle = match self.dnssd.resolve(
            reply.interface,
            &reply.service_name,
            &reply.reg_type,
            &reply.reply_domain,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(service = %reply.service_name, error = %e, "Could not start resolve");
                self.stats.start_failures += 1;
                return;
            }
        };

        let stage = Stage::Resolving(ResolveContext {
            service_name: reply.service_name.clone(),
            interface: reply.interface,
        });

        match self.descriptors.register(handle, stage) {
            Ok(source) => {
                debug!(service = %reply.service_name, source = %source, "Resolving service");
                self.stats.resolves_started += 1;
            }
            Err(e) => {
                warn!(service = %reply.service_name, error = %e, "Could not register resolve");
                self.stats.start_failures += 1;
            }
        }
    }

    /// A service resolved to a host target and port.
    fn on_resolve(&mut self, source: SourceId, ctx: ResolveContext, reply: ResolveReply) {
        self.release(source);

        if !reply.error.is_ok() {
            debug!(service = %ctx.service_name, error = %reply.error, "Resolve failed");
            self.stats.record_error(StageKind::Resolving);
            return;
        }

        let handle = match self
            .dnssd
            .query_address(reply.interface, &reply.host_target)
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!(host = %reply.host_target, error = %e, "Could not start address query");
                self.stats.start_failures += 1;
                return;
            }
        };

        let stage = Stage::Querying(QueryContext {
            service_name: ctx.service_name,
            port: reply.port,
            interface: reply.interface,
        });

        match self.descriptors.register(handle, stage) {
            Ok(next) => {
                debug!(host = %reply.host_target, port = reply.port, source = %next, "Querying host address");
                self.stats.queries_started += 1;
            }
            Err(e) => {
                warn!(host = %reply.host_target, error = %e, "Could not register address query");
                self.stats.start_failures += 1;
            }
        }
    }

    /// A host resolved to an address; connect unless already connected.
    fn on_address(&mut self, source: SourceId, ctx: QueryContext, reply: AddressReply) -> Result<()> {
        self.release(source);

        if !reply.error.is_ok() {
            debug!(service = %ctx.service_name, error = %reply.error, "Address query failed");
            self.stats.record_error(StageKind::Querying);
            return Ok(());
        }

        let Some(ip) = reply.ipv4() else {
            debug!(
                service = %ctx.service_name,
                len = reply.rdata.len(),
                "Address record is not an IPv4 address"
            );
            self.stats.record_error(StageKind::Querying);
            return Ok(());
        };

        if !self.establisher.should_connect(&reply.full_name, ctx.port) {
            debug!(name = %reply.full_name, port = ctx.port, "GCS already connected");
            self.stats.duplicates += 1;
            return Ok(());
        }

        self.establisher
            .connect(&reply.full_name, IpAddr::V4(ip), ctx.port)?;
        self.stats.connections += 1;

        self.announce(format_args!(
            "Connected to {} at {}:{}",
            ctx.service_name, ip, ctx.port
        ));
        info!(
            service = %ctx.service_name,
            address = %ip,
            port = ctx.port,
            "Connected to GCS"
        );
        Ok(())
    }

    fn announce(&mut self, line: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.console, "{}", line) {
            warn!(error = %e, "Failed to write to console");
        }
    }

    /// Deregister a spent query and drop its handle
    fn release(&mut self, source: SourceId) {
        if let Err(e) = self.descriptors.deregister(source) {
            warn!(source = %source, error = %e, "Failed to deregister service descriptor");
        }
    }

    /// The library failed while draining a source
    fn abandon(&mut self, source: SourceId, error: DiscoveryError) -> Result<()> {
        let stage = self.descriptors.stage(source).map(Stage::kind);
        self.release(source);

        match stage {
            Some(StageKind::Browsing) => {
                self.browse_source = None;
                Err(DiscoveryError::BrowseLost {
                    reg_type: self.config.reg_type.clone(),
                    reason: error.to_string(),
                })
            }
            Some(kind) => {
                debug!(source = %source, stage = %kind, error = %error, "Query failed");
                self.stats.record_error(kind);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Inbound telemetry hook. Forwarding is not this module's job.
    pub fn on_telemetry_packet(&mut self, _packet: &[u8]) {}

    /// Deregister every query, the browse included
    pub fn shutdown(&mut self) -> usize {
        let drained = self.descriptors.drain();
        self.browse_source = None;
        info!(queries = drained.len(), "GCS discovery stopped");
        drained.len()
    }

    pub fn is_running(&self) -> bool {
        self.browse_source.is_some()
    }

    pub fn browse_source(&self) -> Option<SourceId> {
        self.browse_source
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        self.establisher.registry()
    }

    pub fn outputs(&self) -> &OutputList {
        self.establisher.outputs()
    }

    /// Queries in flight, browse included
    pub fn in_flight(&self) -> usize {
        self.descriptors.len()
    }

    /// Queries in flight for one stage
    pub fn in_flight_at(&self, stage: StageKind) -> usize {
        self.descriptors.count(stage)
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn backend(&self) -> &D {
        &self.dnssd
    }
}
