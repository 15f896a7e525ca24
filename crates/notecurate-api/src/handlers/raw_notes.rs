//! Raw note import and management handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use notecurate_core::{defaults, Algorithm, NewRawNote, RawNoteRepository};

use crate::{ApiError, AppState};

/// Pasted text to split into raw notes, one per line.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ImportRawNotesBody {
    pub text: String,
    /// Pre-processing applied to the whole text before splitting.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub algorithm: Option<Algorithm>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SavedRawNotesResponse {
    pub ids: Vec<i64>,
    pub count: usize,
}

async fn save_values(state: &AppState, values: Vec<String>) -> Result<impl IntoResponse, ApiError> {
    if values.is_empty() {
        state.console.warning("No notes to save");
        return Err(ApiError::BadRequest("No notes to save".to_string()));
    }
    if values.len() > defaults::RAW_NOTE_BATCH_MAX {
        return Err(ApiError::BadRequest(format!(
            "Too many notes in one request (max {})",
            defaults::RAW_NOTE_BATCH_MAX
        )));
    }

    let ids = state.db.raw_notes.insert_many(values).await?;
    info!(subsystem = "api", op = "save_raw_notes", result_count = ids.len(), "Saved raw notes");
    state
        .console
        .success(format!("Saved {} raw notes", ids.len()));

    let count = ids.len();
    Ok((
        StatusCode::CREATED,
        Json(SavedRawNotesResponse { ids, count }),
    ))
}

/// Save a batch of raw notes. Blank values are skipped.
#[utoipa::path(post, path = "/api/v1/raw-notes", tag = "Raw Notes",
    responses(
        (status = 201, description = "Raw notes saved", body = SavedRawNotesResponse),
        (status = 400, description = "No non-blank notes in the request"),
    )
)]
pub async fn save_raw_notes(
    State(state): State<AppState>,
    Json(body): Json<Vec<NewRawNote>>,
) -> Result<impl IntoResponse, ApiError> {
    let values = body
        .into_iter()
        .map(|note| note.value)
        .filter(|value| !value.trim().is_empty())
        .collect();
    save_values(&state, values).await
}

/// Split pasted text on newlines and save every non-blank line.
#[utoipa::path(post, path = "/api/v1/raw-notes/import", tag = "Raw Notes",
    request_body = ImportRawNotesBody,
    responses(
        (status = 201, description = "Raw notes saved", body = SavedRawNotesResponse),
        (status = 400, description = "Nothing to import"),
    )
)]
pub async fn import_raw_notes(
    State(state): State<AppState>,
    Json(body): Json<ImportRawNotesBody>,
) -> Result<impl IntoResponse, ApiError> {
    let text = match &body.algorithm {
        Some(algorithm) => algorithm.apply(&body.text),
        None => body.text,
    };
    let values = split_lines(&text);
    save_values(&state, values).await
}

fn split_lines(text: &str) -> Vec<String> {
    text.trim()
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[utoipa::path(get, path = "/api/v1/raw-notes", tag = "Raw Notes",
    responses((status = 200, description = "Raw notes, newest first, with their enrichment state"))
)]
pub async fn list_raw_notes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let notes = state.db.raw_notes.list().await?;
    Ok(Json(notes))
}

/// Delete a raw note and its links to structured notes.
#[utoipa::path(delete, path = "/api/v1/raw-notes/{id}", tag = "Raw Notes",
    params(("id" = i64, Path, description = "Raw note id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Raw note not found"),
    )
)]
pub async fn delete_raw_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.raw_notes.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
