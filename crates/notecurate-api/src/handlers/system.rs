//! Health, model discovery, and progress console handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::{debug, warn};

use notecurate_core::ConsoleEntry;

use crate::{ApiError, AppState};

#[utoipa::path(get, path = "/health", tag = "System",
    responses((status = 200, description = "Service is running"))
)]
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// List models installed on the inference server.
#[utoipa::path(get, path = "/api/v1/models", tag = "System",
    responses(
        (status = 200, description = "Installed models"),
        (status = 502, description = "Inference server unreachable"),
    )
)]
pub async fn list_models(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let models = state.catalog.list_models().await.map_err(|e| {
        warn!(subsystem = "api", error = %e, "Failed to list models");
        ApiError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "models": models,
        "default": state.pipeline.config().model,
    })))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConsoleQuery {
    /// Only return entries with a sequence number greater than this.
    since: Option<u64>,
}

#[utoipa::path(get, path = "/api/v1/console", tag = "System",
    params(ConsoleQuery),
    responses((status = 200, description = "Console entries, oldest first"))
)]
pub async fn get_console(
    State(state): State<AppState>,
    Query(query): Query<ConsoleQuery>,
) -> impl IntoResponse {
    let entries = match query.since {
        Some(seq) => state.console.entries_since(seq),
        None => state.console.entries(),
    };
    Json(serde_json::json!({
        "entries": entries,
        "capacity": state.console.capacity(),
    }))
}

#[utoipa::path(delete, path = "/api/v1/console", tag = "System",
    responses((status = 204, description = "Console cleared"))
)]
pub async fn clear_console(State(state): State<AppState>) -> StatusCode {
    state.console.clear();
    StatusCode::NO_CONTENT
}

/// Live console entries as Server-Sent Events.
///
/// Each entry is sent as an event named after its level with the entry as
/// JSON data. Only entries emitted after connecting are delivered; poll
/// `GET /api/v1/console` for the backlog.
#[utoipa::path(get, path = "/api/v1/console/stream", tag = "System",
    responses((status = 200, description = "text/event-stream of console entries"))
)]
pub async fn stream_console(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.console.subscribe();
    debug!(subsystem = "api", op = "stream_console", "Console subscriber connected");

    use tokio_stream::StreamExt as _;
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(
        |result: Result<ConsoleEntry, _>| match result {
            Ok(entry) => match serde_json::to_string(&entry) {
                Ok(json) => Some(Ok(Event::default()
                    .event(entry.level.as_str())
                    .id(entry.seq.to_string())
                    .data(json))),
                Err(_) => None,
            },
            // Lagged subscribers skip what they missed.
            Err(_) => None,
        },
    );

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
