//! Test doubles for the DNS-SD library, the host event table and the
//! outbound transport.

#![allow(dead_code)]

use gcslink_client::{OutboundTransport, OutputList, TelemetryOutput};
use gcslink_core::types::{Direction, InterfaceIndex, SourceId};
use gcslink_core::DiscoveryConfig;
use gcslink_discovery::{
    AddressReply, BrowseReply, DiscoveryError, DnsSd, ErrorCode, EventTable, Pipeline,
    QueryHandle, RecordClass, RecordType, Registration, Reply, ResolveReply, Result,
    SelectTable, ServiceFlags, StageKind,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::sync::Arc;

pub const REG_TYPE: &str = "_gcs._udp.";
pub const DOMAIN: &str = "local.";
pub const IFACE: InterfaceIndex = InterfaceIndex::new(3);

/// A library call made by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Browse {
        source: SourceId,
        reg_type: String,
    },
    Resolve {
        source: SourceId,
        service_name: String,
        interface: InterfaceIndex,
    },
    QueryAddress {
        source: SourceId,
        full_name: String,
        interface: InterfaceIndex,
    },
}

impl Call {
    pub fn source(&self) -> SourceId {
        match self {
            Call::Browse { source, .. }
            | Call::Resolve { source, .. }
            | Call::QueryAddress { source, .. } => *source,
        }
    }
}

#[derive(Default)]
struct FakeState {
    next_source: u64,
    calls: Vec<Call>,
    pending: HashMap<SourceId, Vec<Reply>>,
    failing: HashSet<SourceId>,
    dropped: Vec<SourceId>,
    refuse_resolve: bool,
    refuse_browse: bool,
    resolve_answers: HashMap<String, Reply>,
    query_answers: HashMap<String, Reply>,
}

impl FakeState {
    fn allocate(&mut self) -> SourceId {
        self.next_source += 1;
        SourceId::new(self.next_source)
    }
}

/// Scripted DNS-SD library; clones share state
#[derive(Clone, Default)]
pub struct FakeDnsSd {
    state: Arc<Mutex<FakeState>>,
}

pub struct FakeHandle {
    source: SourceId,
    state: Arc<Mutex<FakeState>>,
}

impl QueryHandle for FakeHandle {
    fn source(&self) -> SourceId {
        self.source
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.state.lock().dropped.push(self.source);
    }
}

impl FakeDnsSd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next `process_result` on `source`
    pub fn reply(&self, source: SourceId, reply: Reply) {
        self.state
            .lock()
            .pending
            .entry(source)
            .or_default()
            .push(reply);
    }

    /// Make `process_result` fail on `source`
    pub fn fail(&self, source: SourceId) {
        self.state.lock().failing.insert(source);
    }

    /// Answer any future resolve of `service_name` with `reply`
    pub fn answer_resolve(&self, service_name: &str, reply: Reply) {
        self.state
            .lock()
            .resolve_answers
            .insert(service_name.to_string(), reply);
    }

    /// Answer any future address query for `host` with `reply`
    pub fn answer_query(&self, host: &str, reply: Reply) {
        self.state
            .lock()
            .query_answers
            .insert(host.to_string(), reply);
    }

    pub fn refuse_resolve(&self) {
        self.state.lock().refuse_resolve = true;
    }

    pub fn refuse_browse(&self) {
        self.state.lock().refuse_browse = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Handles dropped so far, in order
    pub fn dropped(&self) -> Vec<SourceId> {
        self.state.lock().dropped.clone()
    }

    pub fn resolve_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Resolve { .. }))
            .collect()
    }

    pub fn query_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::QueryAddress { .. }))
            .collect()
    }

    /// Source of the most recent resolve
    pub fn last_resolve(&self) -> SourceId {
        self.resolve_calls().last().expect("no resolve started").source()
    }

    /// Source of the most recent address query
    pub fn last_query(&self) -> SourceId {
        self.query_calls().last().expect("no query started").source()
    }

    fn handle(&self, source: SourceId) -> FakeHandle {
        FakeHandle {
            source,
            state: self.state.clone(),
        }
    }
}

impl DnsSd for FakeDnsSd {
    type Handle = FakeHandle;

    fn browse(&mut self, reg_type: &str) -> Result<FakeHandle> {
        let source = {
            let mut state = self.state.lock();
            if state.refuse_browse {
                return Err(DiscoveryError::backend("browse", "ServiceNotRunning"));
            }
            let source = state.allocate();
            state.calls.push(Call::Browse {
                source,
                reg_type: reg_type.to_string(),
            });
            source
        };
        Ok(self.handle(source))
    }

    fn resolve(
        &mut self,
        interface: InterfaceIndex,
        service_name: &str,
        _reg_type: &str,
        _domain: &str,
    ) -> Result<FakeHandle> {
        let source = {
            let mut state = self.state.lock();
            if state.refuse_resolve {
                return Err(DiscoveryError::backend("resolve", "BadParam"));
            }
            let source = state.allocate();
            state.calls.push(Call::Resolve {
                source,
                service_name: service_name.to_string(),
                interface,
            });
            if let Some(reply) = state.resolve_answers.get(service_name).cloned() {
                state.pending.entry(source).or_default().push(reply);
            }
            source
        };
        Ok(self.handle(source))
    }

    fn query_address(&mut self, interface: InterfaceIndex, full_name: &str) -> Result<FakeHandle> {
        let source = {
            let mut state = self.state.lock();
            let source = state.allocate();
            state.calls.push(Call::QueryAddress {
                source,
                full_name: full_name.to_string(),
                interface,
            });
            if let Some(reply) = state.query_answers.get(full_name).cloned() {
                state.pending.entry(source).or_default().push(reply);
            }
            source
        };
        Ok(self.handle(source))
    }

    fn process_result(&mut self, handle: &mut FakeHandle) -> Result<Vec<Reply>> {
        let mut state = self.state.lock();
        if state.failing.contains(&handle.source) {
            return Err(DiscoveryError::backend("process result", "connection to daemon lost"));
        }
        Ok(state.pending.remove(&handle.source).unwrap_or_default())
    }
}

/// A change made to the event table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOp {
    Register(SourceId, StageKind),
    Deregister(SourceId),
}

/// Event table that logs every mutation; clones share state
#[derive(Clone, Default)]
pub struct RecordingTable {
    inner: SelectTable,
    ops: Arc<Mutex<Vec<TableOp>>>,
}

impl RecordingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<TableOp> {
        self.ops.lock().clone()
    }

    pub fn registrations_of(&self, source: SourceId) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, TableOp::Register(s, _) if *s == source))
            .count()
    }

    pub fn deregistrations_of(&self, source: SourceId) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, TableOp::Deregister(s) if *s == source))
            .count()
    }

    pub fn registered_at(&self, stage: StageKind) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, TableOp::Register(_, k) if *k == stage))
            .count()
    }
}

impl EventTable for RecordingTable {
    fn register(&self, source: SourceId, registration: Registration) -> Result<()> {
        self.inner.register(source, registration)?;
        self.ops
            .lock()
            .push(TableOp::Register(source, registration.stage));
        Ok(())
    }

    fn deregister(&self, source: SourceId) -> Result<Registration> {
        let registration = self.inner.deregister(source)?;
        self.ops.lock().push(TableOp::Deregister(source));
        Ok(registration)
    }

    fn get(&self, source: SourceId) -> Option<Registration> {
        self.inner.get(source)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn sources(&self) -> Vec<SourceId> {
        self.inner.sources()
    }
}

/// One stream opened through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub endpoint: String,
    pub baud: u32,
    pub direction: Direction,
}

struct RecordedOutput {
    endpoint: String,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TelemetryOutput for RecordedOutput {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn direction(&self) -> Direction {
        Direction::Output
    }

    fn write_packet(&self, packet: &[u8]) -> anyhow::Result<usize> {
        self.written.lock().push(packet.to_vec());
        Ok(packet.len())
    }
}

/// Transport that records every open; clones share state
#[derive(Clone, Default)]
pub struct RecordingTransport {
    opened: Arc<Mutex<Vec<Opened>>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    refuse: Arc<Mutex<bool>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<Opened> {
        self.opened.lock().clone()
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }

    pub fn refuse(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }
}

impl OutboundTransport for RecordingTransport {
    fn open_outbound(
        &self,
        endpoint: &str,
        baud: u32,
        direction: Direction,
    ) -> anyhow::Result<Box<dyn TelemetryOutput>> {
        if *self.refuse.lock() {
            anyhow::bail!("network unreachable");
        }
        self.opened.lock().push(Opened {
            endpoint: endpoint.to_string(),
            baud,
            direction,
        });
        Ok(Box::new(RecordedOutput {
            endpoint: endpoint.to_string(),
            written: self.written.clone(),
        }))
    }
}

pub type TestPipeline = Pipeline<FakeDnsSd, RecordingTable, RecordingTransport>;

/// Everything a pipeline test needs to drive and observe the pipeline
/// Captures what the pipeline prints for the user
#[derive(Clone, Default)]
pub struct RecordingConsole {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buf.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for RecordingConsole {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Harness {
    pub pipeline: TestPipeline,
    pub dnssd: FakeDnsSd,
    pub table: RecordingTable,
    pub transport: RecordingTransport,
    pub outputs: OutputList,
    pub console: RecordingConsole,
}

impl Harness {
    pub fn new() -> Self {
        let dnssd = FakeDnsSd::new();
        let table = RecordingTable::new();
        let transport = RecordingTransport::new();
        let outputs = OutputList::new();
        let console = RecordingConsole::new();
        let pipeline = Pipeline::new(
            DiscoveryConfig::default(),
            dnssd.clone(),
            table.clone(),
            transport.clone(),
            outputs.clone(),
        )
        .with_console(console.clone());

        Self {
            pipeline,
            dnssd,
            table,
            transport,
            outputs,
            console,
        }
    }

    /// A harness with the browse already running
    pub fn started() -> (Self, SourceId) {
        let mut harness = Self::new();
        let browse = harness.pipeline.start().expect("browse should start");
        (harness, browse)
    }

    /// Deliver `reply` on `source` and run its handler
    pub fn deliver(&mut self, source: SourceId, reply: Reply) -> Result<()> {
        self.dnssd.reply(source, reply);
        self.pipeline.process_result(source)
    }

    /// Walk one service through all three stages
    pub fn discover(
        &mut self,
        browse: SourceId,
        service_name: &str,
        host: &str,
        port: u16,
        ip: [u8; 4],
    ) -> Result<()> {
        self.deliver(browse, added(service_name))?;
        let resolve = self.dnssd.last_resolve();
        self.deliver(resolve, resolved(service_name, host, port))?;
        let query = self.dnssd.last_query();
        self.deliver(query, address(host, ip))
    }
}

pub fn browse_reply(service_name: &str, flags: ServiceFlags, error: ErrorCode) -> Reply {
    Reply::Browse(BrowseReply {
        flags,
        interface: IFACE,
        error,
        service_name: service_name.to_string(),
        reg_type: REG_TYPE.to_string(),
        reply_domain: DOMAIN.to_string(),
    })
}

pub fn added(service_name: &str) -> Reply {
    browse_reply(service_name, ServiceFlags::ADD, ErrorCode::NO_ERROR)
}

pub fn removed(service_name: &str) -> Reply {
    browse_reply(service_name, ServiceFlags::NONE, ErrorCode::NO_ERROR)
}

pub fn resolve_reply(service_name: &str, host: &str, port: u16, error: ErrorCode) -> Reply {
    Reply::Resolve(ResolveReply {
        flags: ServiceFlags::NONE,
        interface: IFACE,
        error,
        full_name: format!("{}.{}{}", service_name, REG_TYPE, DOMAIN),
        host_target: host.to_string(),
        port,
        txt_record: Vec::new(),
    })
}

pub fn resolved(service_name: &str, host: &str, port: u16) -> Reply {
    resolve_reply(service_name, host, port, ErrorCode::NO_ERROR)
}

pub fn address_reply(host: &str, rdata: Vec<u8>, error: ErrorCode) -> Reply {
    Reply::Address(AddressReply {
        flags: ServiceFlags::NONE,
        interface: IFACE,
        error,
        full_name: host.to_string(),
        rr_type: RecordType::A,
        rr_class: RecordClass::IN,
        rdata,
        ttl: 120,
    })
}

pub fn address(host: &str, ip: [u8; 4]) -> Reply {
    address_reply(host, ip.to_vec(), ErrorCode::NO_ERROR)
}
