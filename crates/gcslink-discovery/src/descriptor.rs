//! Service descriptor lifecycle.
//!
//! Keeps the in-flight queries and the host event table in lock-step: a
//! query is in flight exactly while its source is registered with the host.

use crate::dnssd::QueryHandle;
use crate::error::{DiscoveryError, Result};
use crate::stage::{Stage, StageKind};
use crate::table::{EventTable, Registration};
use gcslink_core::types::SourceId;
use std::collections::HashMap;
use tracing::{debug, warn};

/// An outstanding query owned by the pipeline
#[derive(Debug)]
pub struct Query<H> {
    pub handle: H,
    pub stage: Stage,
}

impl<H: QueryHandle> Query<H> {
    pub fn source(&self) -> SourceId {
        self.handle.source()
    }
}

/// Registers and deregisters query handles with the host event table
#[derive(Debug)]
pub struct Descriptors<H, T> {
    table: T,
    in_flight: HashMap<SourceId, Query<H>>,
}

impl<H: QueryHandle, T: EventTable> Descriptors<H, T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            in_flight: HashMap::new(),
        }
    }

    /// Register `handle` for `stage`.
    ///
    /// On failure the handle is dropped, which deallocates it.
    pub fn register(&mut self, handle: H, stage: Stage) -> Result<SourceId> {
        let source = handle.source();
        if self.in_flight.contains_key(&source) {
            return Err(DiscoveryError::DuplicateSource(source));
        }

        self.table
            .register(source, Registration::process_result(source, stage.kind()))?;

        debug!(source = %source, stage = %stage.kind(), "Registered service descriptor");
        self.in_flight.insert(source, Query { handle, stage });
        Ok(source)
    }

    /// Deregister `source`, handing back the query that owned it.
    ///
    /// Called exactly once per registration.
    pub fn deregister(&mut self, source: SourceId) -> Result<Query<H>> {
        let query = self
            .in_flight
            .remove(&source)
            .ok_or(DiscoveryError::UnknownSource(source))?;

        self.table.deregister(source)?;

        debug!(source = %source, stage = %query.stage.kind(), "Deregistered service descriptor");
        Ok(query)
    }

    /// Deregister everything, returning the queries in source order
    pub fn drain(&mut self) -> Vec<Query<H>> {
        let mut sources: Vec<SourceId> = self.in_flight.keys().copied().collect();
        sources.sort();

        let mut drained = Vec::with_capacity(sources.len());
        for source in sources {
            if let Some(query) = self.in_flight.remove(&source) {
                if let Err(e) = self.table.deregister(source) {
                    warn!(source = %source, error = %e, "Host table lost track of descriptor");
                }
                drained.push(query);
            }
        }
        drained
    }

    pub fn get(&self, source: SourceId) -> Option<&Query<H>> {
        self.in_flight.get(&source)
    }

    pub fn get_mut(&mut self, source: SourceId) -> Option<&mut Query<H>> {
        self.in_flight.get_mut(&source)
    }

    pub fn stage(&self, source: SourceId) -> Option<&Stage> {
        self.in_flight.get(&source).map(|q| &q.stage)
    }

    pub fn contains(&self, source: SourceId) -> bool {
        self.in_flight.contains_key(&source)
    }

    /// Number of queries in flight
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Number of queries in flight for one stage
    pub fn count(&self, kind: StageKind) -> usize {
        self.in_flight
            .values()
            .filter(|q| q.stage.kind() == kind)
            .count()
    }
}
