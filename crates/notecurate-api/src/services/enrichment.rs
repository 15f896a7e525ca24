//! Service turning raw notes into structured notes awaiting review.
//!
//! ## Flow
//!
//! 1. Ask the model catalog which models are installed. An unreachable
//!    server or a missing model rejects the whole run with a summary whose
//!    `is_success` is false.
//! 2. Select targets: every raw note without a linked note (`mode: "new"`)
//!    or a single raw note (`mode: "id"`).
//! 3. Run the extraction pipeline with the enriched-note schema on each
//!    target that is still unenriched.
//! 4. Store each validated record as a note linked to its raw note with
//!    `is_confirmed = false`.
//!
//! Progress goes to the shared console. A failed extraction only counts
//! against the run; database errors abort it.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use notecurate_core::schema::{enriched_note_example, enriched_note_schema};
use notecurate_core::{
    Console, Error, ModelCatalog, NoteInput, NoteRepository, RawNote, RawNoteRepository, Result,
};
use notecurate_db::Database;
use notecurate_inference::{ExtractionPipeline, ExtractionResult};

pub const UNREACHABLE_MESSAGE: &str = "Ollama is not running or not reachable on port 11434";
pub const UNREACHABLE_DESCRIPTION: &str = "Please start ollama and try again.";
pub const MODEL_MISSING_DESCRIPTION: &str =
    "Please select a different model or install the model.";

/// Which raw notes to enrich.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EnrichTarget {
    /// Every raw note that has no linked note yet.
    New,
    /// One raw note by id.
    Id { id: i64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichRequest {
    /// Model to use; the configured default when absent.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(flatten)]
    pub target: EnrichTarget,
}

/// Outcome of one enrichment run.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct EnrichSummary {
    pub is_success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub processed: usize,
    pub failed: usize,
    /// Raw note ids whose extraction failed.
    pub failed_ids: Vec<i64>,
    pub total: usize,
}

impl EnrichSummary {
    fn rejected(message: impl Into<String>, description: &str) -> Self {
        Self {
            is_success: false,
            message: message.into(),
            description: Some(description.to_string()),
            processed: 0,
            failed: 0,
            failed_ids: Vec::new(),
            total: 0,
        }
    }
}

/// Enriches raw notes with the configured extraction pipeline.
#[derive(Clone)]
pub struct EnrichmentService {
    db: Database,
    pipeline: ExtractionPipeline,
    catalog: Arc<dyn ModelCatalog>,
    console: Arc<Console>,
}

impl EnrichmentService {
    pub fn new(
        db: Database,
        pipeline: ExtractionPipeline,
        catalog: Arc<dyn ModelCatalog>,
        console: Arc<Console>,
    ) -> Self {
        Self {
            db,
            pipeline,
            catalog,
            console,
        }
    }

    /// Run one enrichment pass.
    #[instrument(skip(self, request), fields(subsystem = "api", component = "enrichment", op = "run"))]
    pub async fn run(&self, request: EnrichRequest) -> Result<EnrichSummary> {
        let start = Instant::now();
        let model = request
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.pipeline.config().model.clone());

        if let Some(rejection) = self.check_model(&model).await {
            return Ok(rejection);
        }

        let targets = self.targets(&request.target).await?;
        let total = targets.len();
        let pipeline = self
            .pipeline
            .with_config(self.pipeline.config().clone().with_model(model.as_str()));
        let schema = enriched_note_schema();
        let example = enriched_note_example();

        self.console
            .info(format!("Enriching {} raw notes with model {}", total, model));

        let mut processed = 0;
        let mut failed_ids = Vec::new();

        for (index, raw) in targets.iter().enumerate() {
            if self.db.raw_notes.is_enriched(raw.id).await? {
                self.console
                    .info(format!("Raw note {} is already enriched, skipping", raw.id));
                continue;
            }
            if raw.value.trim().is_empty() {
                self.console
                    .error(format!("Raw note {} is empty, skipping", raw.id));
                failed_ids.push(raw.id);
                continue;
            }

            self.console.info(format!(
                "Enriching raw note {} ({}/{})...",
                raw.id,
                index + 1,
                total
            ));

            let result = pipeline
                .extract(&raw.value, &schema, &example, self.console.as_ref())
                .await;

            match self.store(raw, result).await? {
                Some(note_id) => {
                    processed += 1;
                    self.console.success(format!(
                        "Raw note {} enriched as note {}",
                        raw.id, note_id
                    ));
                }
                None => failed_ids.push(raw.id),
            }
        }

        let message = format!(
            "Enriched {} notes, failed {} notes, total {} notes.",
            processed,
            failed_ids.len(),
            total
        );
        if failed_ids.is_empty() {
            self.console.success(message.clone());
        } else {
            self.console.warning(message.clone());
        }

        info!(
            model = %model,
            processed,
            failed = failed_ids.len(),
            total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Enrichment finished"
        );

        Ok(EnrichSummary {
            is_success: true,
            message,
            description: None,
            processed,
            failed: failed_ids.len(),
            failed_ids,
            total,
        })
    }

    /// Reject the run when the server is down or lacks the model.
    async fn check_model(&self, model: &str) -> Option<EnrichSummary> {
        let models = match self.catalog.list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "Model catalog unreachable");
                self.console.error(UNREACHABLE_MESSAGE);
                return Some(EnrichSummary::rejected(
                    UNREACHABLE_MESSAGE,
                    UNREACHABLE_DESCRIPTION,
                ));
            }
        };

        // "gemma3" matches an installed "gemma3:latest".
        if models.iter().any(|m| m.name.starts_with(model)) {
            return None;
        }

        let message = format!("Model {} is not available in Ollama.", model);
        warn!(model = %model, "Requested model is not installed");
        self.console.error(message.clone());
        Some(EnrichSummary::rejected(message, MODEL_MISSING_DESCRIPTION))
    }

    async fn targets(&self, target: &EnrichTarget) -> Result<Vec<RawNote>> {
        match target {
            EnrichTarget::New => self.db.raw_notes.list_unenriched().await,
            EnrichTarget::Id { id } => match self.db.raw_notes.get(*id).await {
                Ok(raw) => Ok(vec![raw]),
                Err(Error::RawNoteNotFound(_)) => {
                    self.console.warning(format!("Raw note {} not found", id));
                    Ok(Vec::new())
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Persist a successful extraction. Returns the new note id, or `None`
    /// when the extraction failed or its record cannot be stored.
    async fn store(&self, raw: &RawNote, result: ExtractionResult) -> Result<Option<i64>> {
        let record = match result {
            ExtractionResult::Success(record) => record,
            ExtractionResult::Error(failure) => {
                self.console
                    .error(format!("Raw note {} failed: {}", raw.id, failure.message));
                return Ok(None);
            }
        };

        let input: NoteInput = match serde_json::from_value(record) {
            Ok(input) => input,
            Err(e) => {
                self.console
                    .error(format!("Raw note {} produced an unusable record: {}", raw.id, e));
                return Ok(None);
            }
        };

        match self.db.notes.insert_for_raw(raw.id, input).await {
            Ok(note_id) => Ok(Some(note_id)),
            Err(Error::InvalidInput(msg)) => {
                self.console
                    .error(format!("Raw note {} produced an invalid note: {}", raw.id, msg));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
