use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::event::{CanonicalEvent, EventId, StoredEvent};

use super::{EventStore, Result, StorageError};

/// In-process store, used in tests and with `memory://`.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<StoredEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events appended so far. Still readable after a poisoned lock.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<StoredEvent>>> {
        self.events
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))
    }
}

impl EventStore for MemoryEventStore {
    fn append(&self, event: &CanonicalEvent) -> Result<EventId> {
        let mut events = self.lock()?;
        let id = EventId(events.len() as i64 + 1);
        events.push(StoredEvent {
            id,
            event: event.clone(),
        });
        Ok(id)
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let mut events = self.lock()?.clone();
        events.sort_by(|a, b| {
            b.event
                .timestamp
                .cmp(&a.event.timestamp)
                .then(b.id.cmp(&a.id))
        });
        events.truncate(limit);
        Ok(events)
    }
}
