//! Maps GitHub webhook deliveries onto [`CanonicalEvent`].
//!
//! Only the envelope can fail: a missing or unsupported `X-GitHub-Event`
//! value. Anything missing inside the payload degrades to a sentinel.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::event::{CanonicalEvent, EventAction};

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNKNOWN: &str = "unknown";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_REF: &str = "refs/heads/main";

/// Why a delivery was turned away before anything was stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("X-GitHub-Event header missing")]
    MissingEventType,

    #[error("unsupported event: {0}")]
    UnsupportedEventType(String),

    #[error("invalid content type: {0} (send JSON data)")]
    InvalidContentType(String),

    #[error("malformed body: {0}")]
    MalformedBody(String),
}

/// Successful outcome of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Upstream checking the webhook is wired up. Never persisted.
    Ping,
    Event(CanonicalEvent),
}

/// Normalizes a delivery, stamping it with the current time.
pub fn normalize(event_type: Option<&str>, payload: &Value) -> Result<Normalized, RejectionReason> {
    normalize_at(event_type, payload, Utc::now())
}

/// Same as [`normalize`] with an explicit record-creation time.
pub fn normalize_at(
    event_type: Option<&str>,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<Normalized, RejectionReason> {
    let event = match event_type {
        None | Some("") => return Err(RejectionReason::MissingEventType),
        Some("ping") => return Ok(Normalized::Ping),
        Some("push") => push_event(payload, now),
        Some("pull_request") => pull_request_event(payload, now),
        Some(other) => return Err(RejectionReason::UnsupportedEventType(other.to_string())),
    };
    Ok(Normalized::Event(event))
}

fn push_event(payload: &Value, now: DateTime<Utc>) -> CanonicalEvent {
    let git_ref = text_or(payload, &["ref"], DEFAULT_REF);
    let branch = branch_name(&git_ref).to_string();

    CanonicalEvent {
        request_id: text_or(payload, &["after"], NOT_AVAILABLE),
        author: text_or(payload, &["pusher", "name"], UNKNOWN),
        action: EventAction::Push,
        from_branch: branch.clone(),
        to_branch: branch,
        timestamp: now,
    }
}

fn pull_request_event(payload: &Value, now: DateTime<Utc>) -> CanonicalEvent {
    let empty = Value::Null;
    let pr = lookup(payload, &["pull_request"]).unwrap_or(&empty);

    // Strict AND: a merged flag without "closed" stays a pull request.
    let merged = text_or(payload, &["action"], "") == "closed"
        && lookup(pr, &["merged"]).and_then(Value::as_bool) == Some(true);

    let (action, author_path) = if merged {
        (EventAction::Merge, &["merged_by", "login"][..])
    } else {
        (EventAction::PullRequest, &["user", "login"][..])
    };

    CanonicalEvent {
        request_id: text_or(pr, &["number"], NOT_AVAILABLE),
        author: text_or(pr, author_path, UNKNOWN),
        action,
        from_branch: text_or(pr, &["head", "ref"], UNKNOWN),
        to_branch: text_or(pr, &["base", "ref"], UNKNOWN),
        timestamp: now,
    }
}

/// Last `/`-separated segment of a git ref, `main` if that segment is empty.
fn branch_name(git_ref: &str) -> &str {
    match git_ref.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => DEFAULT_BRANCH,
    }
}

/// Walks `path` through nested objects. Non-objects along the way yield `None`.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// Reads a string (or number, rendered as text) at `path`, else `default`.
///
/// Null, empty strings, and any other JSON type count as absent.
pub fn text_or(value: &Value, path: &[&str], default: &str) -> String {
    match lookup(value, path) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}
