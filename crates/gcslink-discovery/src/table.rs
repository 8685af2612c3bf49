//! Host event registration table.
//!
//! The host loop owns this table: one entry per readiness source, naming the
//! handler to run when that source becomes readable.

use crate::error::{DiscoveryError, Result};
use crate::stage::StageKind;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gcslink_core::types::SourceId;
use std::sync::Arc;

/// Action the host performs when a source becomes readable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Drain pending discovery protocol events for the source
    ProcessResult,
}

/// One entry in the event table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub handler: Handler,
    pub source: SourceId,
    pub stage: StageKind,
}

impl Registration {
    pub fn process_result(source: SourceId, stage: StageKind) -> Self {
        Self {
            handler: Handler::ProcessResult,
            source,
            stage,
        }
    }
}

/// Registration table keyed by readiness source
pub trait EventTable {
    /// Insert an entry.
    ///
    /// Re-inserting an identical entry is accepted; a different entry under
    /// the same source is `DuplicateSource`.
    fn register(&self, source: SourceId, registration: Registration) -> Result<()>;

    /// Remove an entry, returning it
    fn deregister(&self, source: SourceId) -> Result<Registration>;

    fn get(&self, source: SourceId) -> Option<Registration>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of registered sources, ascending
    fn sources(&self) -> Vec<SourceId>;
}

impl<T: EventTable + ?Sized> EventTable for Arc<T> {
    fn register(&self, source: SourceId, registration: Registration) -> Result<()> {
        (**self).register(source, registration)
    }

    fn deregister(&self, source: SourceId) -> Result<Registration> {
        (**self).deregister(source)
    }

    fn get(&self, source: SourceId) -> Option<Registration> {
        (**self).get(source)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn sources(&self) -> Vec<SourceId> {
        (**self).sources()
    }
}

/// In-process event table shared between the host loop and the pipeline
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct SelectTable {
    entries: Arc<DashMap<SourceId, Registration>>,
}

impl SelectTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventTable for SelectTable {
    fn register(&self, source: SourceId, registration: Registration) -> Result<()> {
        match self.entries.entry(source) {
            Entry::Occupied(existing) if *existing.get() == registration => Ok(()),
            Entry::Occupied(_) => Err(DiscoveryError::DuplicateSource(source)),
            Entry::Vacant(slot) => {
                slot.insert(registration);
                Ok(())
            }
        }
    }

    fn deregister(&self, source: SourceId) -> Result<Registration> {
        self.entries
            .remove(&source)
            .map(|(_, registration)| registration)
            .ok_or(DiscoveryError::UnknownSource(source))
    }

    fn get(&self, source: SourceId) -> Option<Registration> {
        self.entries.get(&source).map(|entry| *entry.value())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<SourceId> = self.entries.iter().map(|e| *e.key()).collect();
        sources.sort();
        sources
    }
}
