use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::event::{CanonicalEvent, EventId, StoredEvent};
use crate::normalize::{Normalized, RejectionReason, normalize};
use crate::store::{EventStore, StorageError};

/// How many events `/api/events` and the dashboard show.
pub const RECENT_LIMIT: usize = 10;

const EVENT_HEADER: &str = "x-github-event";
/// GitHub caps webhook payloads at 25 MB.
const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;
const DASHBOARD: &str = include_str!("dashboard.html");

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn EventStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Rejected(#[from] RejectionReason),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<EventId>,
}

/// Builds the service router around `store`.
pub fn router(store: Arc<dyn EventStore>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health_check))
        .route(
            "/webhook",
            post(handle_webhook).layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES)),
        )
        .route("/api/events", get(recent_events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState::new(store)))
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(addr: &str, store: Arc<dyn EventStore>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("GitHub event service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(store)).await
}

async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let payload = parse_json_body(&headers, &body).inspect_err(|reason| {
        warn!(%reason, "Rejected webhook body");
    })?;

    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty());
    info!("Received {} event", event_type.unwrap_or("<none>"));

    let event = match normalize(event_type, &payload) {
        Ok(Normalized::Ping) => {
            info!("Received ping event - webhook is configured correctly!");
            return Ok(Json(WebhookResponse {
                status: "pong",
                event_id: None,
            }));
        }
        Ok(Normalized::Event(event)) => event,
        Err(reason) => {
            warn!(%reason, "Rejected webhook");
            return Err(reason.into());
        }
    };

    let action = event.action;
    let id = append(Arc::clone(&state.store), event)
        .await
        .inspect_err(|e| error!("Failed to store {} event: {}", action, e))?;

    info!(event_id = %id, %action, "Stored event");
    Ok(Json(WebhookResponse {
        status: "success",
        event_id: Some(id),
    }))
}

async fn recent_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StoredEvent>>, ApiError> {
    let store = Arc::clone(&state.store);
    let events = tokio::task::spawn_blocking(move || store.recent(RECENT_LIMIT))
        .await
        .map_err(|e| StorageError::Unavailable(format!("read task failed: {e}")))?
        .inspect_err(|e| error!("Failed to read recent events: {}", e))?;
    Ok(Json(events))
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "github-event-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Store writes block, so they run off the async workers.
async fn append(store: Arc<dyn EventStore>, event: CanonicalEvent) -> Result<EventId, StorageError> {
    tokio::task::spawn_blocking(move || store.append(&event))
        .await
        .map_err(|e| StorageError::Unavailable(format!("write task failed: {e}")))?
}

fn parse_json_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, RejectionReason> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !is_json_content_type(content_type) {
        let shown = if content_type.is_empty() {
            "<none>"
        } else {
            content_type
        };
        return Err(RejectionReason::InvalidContentType(shown.to_string()));
    }

    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| RejectionReason::MalformedBody(e.to_string()))?;
    if !payload.is_object() {
        return Err(RejectionReason::MalformedBody(
            "expected a JSON object".to_string(),
        ));
    }
    Ok(payload)
}

/// `application/json` or any `application/*+json`, parameters ignored.
fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}
