//! Text pre-processing handlers.

use axum::Json;
use serde::Deserialize;

use notecurate_core::preprocess::{self, Algorithm, AlgorithmInfo};

use crate::ApiError;

#[utoipa::path(get, path = "/api/v1/preprocess/algorithms", tag = "Preprocess",
    responses((status = 200, description = "Available algorithms with their config fields"))
)]
pub async fn list_algorithms() -> Json<Vec<AlgorithmInfo>> {
    Json(preprocess::catalog())
}

#[derive(Debug, Deserialize)]
pub struct PreprocessBody {
    text: String,
    algorithm: Algorithm,
}

/// Apply one algorithm to pasted text.
#[utoipa::path(post, path = "/api/v1/preprocess", tag = "Preprocess",
    responses(
        (status = 200, description = "Processed text"),
        (status = 400, description = "Empty text"),
    )
)]
pub async fn preprocess_text(
    Json(body): Json<PreprocessBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text is required".to_string()));
    }

    let text = body.algorithm.apply(&body.text);
    let lines = text.lines().filter(|l| !l.trim().is_empty()).count();

    Ok(Json(serde_json::json!({
        "algorithm": body.algorithm.name(),
        "text": text,
        "lines": lines,
    })))
}
