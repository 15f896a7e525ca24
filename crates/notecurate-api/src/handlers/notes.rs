//! Structured note and review queue handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use notecurate_core::{defaults, NoteInput, NoteRepository};

use crate::{ApiError, AppState};

/// Create a structured note by hand. It is not linked to any raw note.
#[utoipa::path(post, path = "/api/v1/notes", tag = "Notes",
    responses(
        (status = 201, description = "Note created"),
        (status = 400, description = "Invalid note"),
    )
)]
pub async fn create_note(
    State(state): State<AppState>,
    Json(body): Json<NoteInput>,
) -> Result<impl IntoResponse, ApiError> {
    let note_id = state.db.notes.insert(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": note_id })),
    ))
}

#[utoipa::path(get, path = "/api/v1/notes", tag = "Notes",
    responses((status = 200, description = "All structured notes"))
)]
pub async fn list_notes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let notes = state.db.notes.list().await?;
    Ok(Json(notes))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UnconfirmedQuery {
    /// Page size, default 1 and at most 100.
    limit: Option<i64>,
    /// Id of the last note on the previous page.
    cursor: Option<i64>,
}

/// Page through notes awaiting confirmation, each with its raw note.
#[utoipa::path(get, path = "/api/v1/notes/unconfirmed", tag = "Notes",
    params(UnconfirmedQuery),
    responses(
        (status = 200, description = "Page of unconfirmed notes"),
        (status = 400, description = "Invalid limit"),
    )
)]
pub async fn list_unconfirmed(
    State(state): State<AppState>,
    Query(query): Query<UnconfirmedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(defaults::UNCONFIRMED_PAGE_LIMIT);
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be >= 1".into()));
    }

    let page = state.db.notes.list_unconfirmed(limit, query.cursor).await?;
    Ok(Json(page))
}

/// Save reviewed fields and confirm every link to the note.
#[utoipa::path(put, path = "/api/v1/notes/{id}/confirm", tag = "Notes",
    params(("id" = i64, Path, description = "Note id")),
    responses(
        (status = 200, description = "Updated note"),
        (status = 400, description = "Invalid note"),
        (status = 404, description = "Note not found"),
    )
)]
pub async fn confirm_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NoteInput>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.notes.update_and_confirm(id, body).await?;
    state.console.success(format!("Note {} confirmed", id));
    let note = state.db.notes.get(id).await?;
    Ok(Json(note))
}
