use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};

use crate::event::{CanonicalEvent, EventAction, EventId, StoredEvent};

use super::{EventStore, Result, StorageError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id  TEXT NOT NULL,
    author      TEXT NOT NULL,
    action      TEXT NOT NULL,
    from_branch TEXT NOT NULL,
    to_branch   TEXT NOT NULL,
    timestamp   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS events_timestamp ON events (timestamp);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite`-backed store. One flat `events` table.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::bootstrap(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("sqlite connection lock poisoned".into()))
    }
}

impl EventStore for SqliteEventStore {
    fn append(&self, event: &CanonicalEvent) -> Result<EventId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO events (request_id, author, action, from_branch, to_branch, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &event.request_id,
                &event.author,
                event.action.as_str(),
                &event.from_branch,
                &event.to_branch,
                format_timestamp(event.timestamp),
            ],
        )?;
        Ok(EventId(conn.last_insert_rowid()))
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, request_id, author, action, from_branch, to_branch, timestamp
             FROM events
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, request_id, author, action, from_branch, to_branch, timestamp) = row?;
            let action = EventAction::parse(&action)
                .ok_or_else(|| StorageError::Corrupt(format!("event {id}: action {action:?}")))?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| StorageError::Corrupt(format!("event {id}: timestamp: {e}")))?
                .with_timezone(&Utc);
            events.push(StoredEvent {
                id: EventId(id),
                event: CanonicalEvent {
                    request_id,
                    author,
                    action,
                    from_branch,
                    to_branch,
                    timestamp,
                },
            });
        }
        Ok(events)
    }
}

/// Fixed-width UTC form, so text order in `SQLite` is time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(request_id: &str, action: EventAction, second: u32) -> CanonicalEvent {
        CanonicalEvent {
            request_id: request_id.into(),
            author: "bob".into(),
            action,
            from_branch: "dev".into(),
            to_branch: "main".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap(),
        }
    }

    #[test]
    fn append_then_read_back() {
        let store = SqliteEventStore::in_memory().unwrap();
        let event = sample("42", EventAction::Merge, 0);
        let id = store.append(&event).unwrap();

        let recent = store.recent(10).unwrap();
        assert_eq!(recent, vec![StoredEvent { id, event }]);
    }

    #[test]
    fn recent_orders_by_timestamp_and_caps() {
        let store = SqliteEventStore::in_memory().unwrap();
        for second in [30, 5, 59, 0, 14, 45, 2, 8, 21, 33, 50, 1] {
            store
                .append(&sample(&second.to_string(), EventAction::Push, second))
                .unwrap();
        }

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 10);
        let ids: Vec<_> = recent.iter().map(|e| e.event.request_id.as_str()).collect();
        assert_eq!(ids, ["59", "50", "45", "33", "30", "21", "14", "8", "5", "2"]);
    }

    #[test]
    fn duplicate_deliveries_get_distinct_ids() {
        let store = SqliteEventStore::in_memory().unwrap();
        let event = sample("abc", EventAction::Push, 0);
        let first = store.append(&event).unwrap();
        let second = store.append(&event).unwrap();
        assert_ne!(first, second);

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        // Equal timestamps fall back to newest id first.
        assert_eq!(recent[0].id, second);
    }

    #[test]
    fn events_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");

        let store = SqliteEventStore::open(&path).unwrap();
        store
            .append(&sample("1", EventAction::PullRequest, 0))
            .unwrap();
        drop(store);

        let store = SqliteEventStore::open(&path).unwrap();
        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event.action, EventAction::PullRequest);
    }

    #[test]
    fn unknown_action_is_corrupt() {
        let store = SqliteEventStore::in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO events (request_id, author, action, from_branch, to_branch, timestamp)
                 VALUES ('1', 'x', 'DEPLOY', 'a', 'b', '2024-05-01T12:00:00.000000Z')",
                [],
            )
            .unwrap();
        assert!(matches!(store.recent(10), Err(StorageError::Corrupt(_))));
    }
}
