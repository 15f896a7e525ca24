//! Extraction and enrichment handlers.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use notecurate_core::defaults;
use notecurate_core::schema::{article_example, article_schema};
use notecurate_inference::ExtractionResult;

use crate::services::{EnrichRequest, EnrichSummary, EnrichmentService};
use crate::{ApiError, AppState};

/// Free text to extract an article record from.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ExtractBody {
    pub text: String,
    /// Model override for this request.
    #[serde(default)]
    pub model: Option<String>,
    /// Attempt budget override for this request, between 1 and 10.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Run the extraction pipeline with the article schema.
///
/// Extraction failures are reported in the body with `"status": "error"`,
/// not as an HTTP error.
#[utoipa::path(post, path = "/api/v1/extract", tag = "Extraction",
    request_body = ExtractBody,
    responses(
        (status = 200, description = "Tagged extraction result"),
        (status = 400, description = "Blank text or attempt budget out of range"),
    )
)]
pub async fn extract(
    State(state): State<AppState>,
    Json(body): Json<ExtractBody>,
) -> Result<Json<ExtractionResult>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text is required".to_string()));
    }

    if let Some(max_attempts) = body.max_attempts {
        if !(1..=defaults::MAX_ATTEMPTS_LIMIT).contains(&max_attempts) {
            return Err(ApiError::BadRequest(format!(
                "max_attempts must be between 1 and {}",
                defaults::MAX_ATTEMPTS_LIMIT
            )));
        }
    }

    let mut config = state.pipeline.config().clone();
    if let Some(model) = body.model.filter(|m| !m.trim().is_empty()) {
        config = config.with_model(model);
    }
    if let Some(max_attempts) = body.max_attempts {
        config = config.with_max_attempts(max_attempts);
    }
    let pipeline = state.pipeline.with_config(config);

    let result = pipeline
        .extract(
            &body.text,
            &article_schema(),
            &article_example(),
            state.console.as_ref(),
        )
        .await;

    if result.is_success() {
        state.console.success("Extraction succeeded");
    }
    info!(
        subsystem = "api",
        op = "extract",
        success = result.is_success(),
        "Extraction finished"
    );
    Ok(Json(result))
}

/// Enrich raw notes into structured notes awaiting review.
#[utoipa::path(post, path = "/api/v1/enrich", tag = "Extraction",
    responses((status = 200, description = "Enrichment summary", body = EnrichSummary))
)]
pub async fn enrich(
    State(state): State<AppState>,
    Json(request): Json<EnrichRequest>,
) -> Result<Json<EnrichSummary>, ApiError> {
    let service = EnrichmentService::new(
        state.db.clone(),
        state.pipeline.clone(),
        state.catalog.clone(),
        state.console.clone(),
    );
    let summary = service.run(request).await?;
    Ok(Json(summary))
}
