//! notecurate-api - HTTP API server for notecurate
//!
//! Routes, shared state, and error mapping live here so integration tests
//! can drive the same [`Router`] the binary serves.

pub mod config;
pub mod handlers;
pub mod services;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use uuid::Uuid;

use notecurate_core::{ChatBackend, Console, ModelCatalog};
use notecurate_db::Database;
use notecurate_inference::{ExtractionConfig, ExtractionPipeline};

pub use config::AppConfig;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Pipeline bound to the configured default model and attempt budget.
    pub pipeline: ExtractionPipeline,
    pub catalog: Arc<dyn ModelCatalog>,
    pub console: Arc<Console>,
}

impl AppState {
    pub fn new(
        db: Database,
        chat: Arc<dyn ChatBackend>,
        catalog: Arc<dyn ModelCatalog>,
        extraction: ExtractionConfig,
        console: Arc<Console>,
    ) -> Self {
        Self {
            db,
            pipeline: ExtractionPipeline::new(chat, extraction),
            catalog,
            console,
        }
    }
}

// =============================================================================
// OPENAPI
// =============================================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "notecurate API",
        description = "Raw note import, LLM enrichment, and note review"
    ),
    paths(
        handlers::system::health_check,
        handlers::system::list_models,
        handlers::system::get_console,
        handlers::system::clear_console,
        handlers::system::stream_console,
        handlers::preprocess::list_algorithms,
        handlers::preprocess::preprocess_text,
        handlers::raw_notes::save_raw_notes,
        handlers::raw_notes::import_raw_notes,
        handlers::raw_notes::list_raw_notes,
        handlers::raw_notes::delete_raw_note,
        handlers::extraction::extract,
        handlers::extraction::enrich,
        handlers::notes::create_note,
        handlers::notes::list_notes,
        handlers::notes::list_unconfirmed,
        handlers::notes::confirm_note,
    ),
    components(schemas(
        handlers::raw_notes::ImportRawNotesBody,
        handlers::raw_notes::SavedRawNotesResponse,
        handlers::extraction::ExtractBody,
        services::EnrichSummary,
    )),
    tags(
        (name = "System", description = "Health checks, models, and the progress console"),
        (name = "Preprocess", description = "Text pre-processing before import"),
        (name = "Raw Notes", description = "Unstructured notes as imported"),
        (name = "Extraction", description = "LLM extraction and enrichment"),
        (name = "Notes", description = "Structured notes and review")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// =============================================================================
// ROUTER
// =============================================================================

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build the application router.
pub fn router(state: AppState, config: &AppConfig) -> Router {
    use handlers::{extraction, notes, preprocess, raw_notes, system};

    Router::new()
        .route("/health", get(system::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/api/v1/models", get(system::list_models))
        .route(
            "/api/v1/console",
            get(system::get_console).delete(system::clear_console),
        )
        .route("/api/v1/console/stream", get(system::stream_console))
        .route(
            "/api/v1/preprocess/algorithms",
            get(preprocess::list_algorithms),
        )
        .route("/api/v1/preprocess", post(preprocess::preprocess_text))
        .route(
            "/api/v1/raw-notes",
            get(raw_notes::list_raw_notes).post(raw_notes::save_raw_notes),
        )
        .route("/api/v1/raw-notes/import", post(raw_notes::import_raw_notes))
        .route(
            "/api/v1/raw-notes/:id",
            axum::routing::delete(raw_notes::delete_raw_note),
        )
        .route("/api/v1/extract", post(extraction::extract))
        .route("/api/v1/enrich", post(extraction::enrich))
        .route(
            "/api/v1/notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route("/api/v1/notes/unconfirmed", get(notes::list_unconfirmed))
        .route("/api/v1/notes/:id/confirm", put(notes::confirm_note))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(&config.allowed_origins))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Internal(notecurate_core::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    BadGateway(String),
}

impl From<notecurate_core::Error> for ApiError {
    fn from(err: notecurate_core::Error) -> Self {
        use notecurate_core::Error;

        match &err {
            Error::RawNoteNotFound(_) | Error::NoteNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            Error::Inference(_) => ApiError::BadGateway(err.to_string()),
            Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("FOREIGN KEY") {
                    return ApiError::BadRequest(msg);
                }
                ApiError::Internal(err)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                tracing::error!(subsystem = "api", error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
