//! Receives GitHub webhooks, normalizes push, pull request and merge
//! deliveries into one record shape, and serves the most recent ones.

pub mod event;
pub mod normalize;
pub mod store;
pub mod webhook;

pub use event::{CanonicalEvent, EventAction, EventId, StoredEvent};
pub use normalize::{Normalized, RejectionReason, normalize};
pub use store::{EventStore, MemoryEventStore, SqliteEventStore, StorageError};
