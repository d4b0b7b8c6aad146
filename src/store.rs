//! Append-only persistence for canonical events.
//!
//! Backends are chosen by a single connection string:
//!
//! ```text
//! sqlite://github_events.db   # file-backed (default)
//! sqlite::memory:             # SQLite without a file
//! memory://                   # plain in-process store
//! ```

mod memory;
mod sqlite;

pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;

use std::sync::Arc;

use crate::event::{CanonicalEvent, EventId, StoredEvent};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://github_events.db";

/// Errors that can occur while appending or reading events.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt event row: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Durable home for accepted events. No update or delete.
pub trait EventStore: Send + Sync {
    /// Persists `event` and returns the id it was stored under.
    fn append(&self, event: &CanonicalEvent) -> Result<EventId>;

    /// Up to `limit` events, newest timestamp first.
    fn recent(&self, limit: usize) -> Result<Vec<StoredEvent>>;
}

/// Opens the backend named by `url`.
pub fn open(url: &str) -> Result<Arc<dyn EventStore>> {
    if url == "memory://" {
        return Ok(Arc::new(MemoryEventStore::new()));
    }
    if url == "sqlite::memory:" {
        return Ok(Arc::new(SqliteEventStore::in_memory()?));
    }
    if let Some(path) = url.strip_prefix("sqlite://") {
        if path.is_empty() {
            return Err(StorageError::Unavailable("sqlite url has no path".into()));
        }
        return Ok(Arc::new(SqliteEventStore::open(path)?));
    }
    Err(StorageError::Unavailable(format!(
        "unsupported database url: {url}"
    )))
}
