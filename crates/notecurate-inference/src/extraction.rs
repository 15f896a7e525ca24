//! Schema-guided extraction with bounded correction rounds.
//!
//! Each call sends the input text with a schema-bearing system prompt,
//! parses the reply as JSON and validates it. Failed attempts are followed
//! by a correction round that shows the model its previous answer and the
//! concrete error, up to `max_attempts` calls in total.
//!
//! The pipeline never returns `Err`: every failure mode ends in an
//! [`ExtractionResult::Error`] carrying the diagnostics of the last attempt.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};

use notecurate_core::defaults;
use notecurate_core::{
    ChatBackend, ChatMessage, ChatRequest, ProgressSink, TargetSchema, ValidationIssue,
};

use crate::prompt::{self, PreviousError};

/// Model and retry budget for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub model: String,
    /// Total chat calls allowed per extraction. Values below 1 act as 1,
    /// values above `MAX_ATTEMPTS_LIMIT` act as the limit.
    pub max_attempts: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: defaults::GEN_MODEL.to_string(),
            max_attempts: defaults::MAX_ATTEMPTS,
        }
    }
}

impl ExtractionConfig {
    pub fn new(model: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            model: model.into(),
            max_attempts,
        }
    }

    /// Read `NOTECURATE_GEN_MODEL` and `NOTECURATE_MAX_ATTEMPTS`, falling back to defaults.
    pub fn from_env() -> Self {
        let model = std::env::var(defaults::ENV_GEN_MODEL)
            .unwrap_or_else(|_| defaults::GEN_MODEL.to_string());
        let max_attempts = std::env::var(defaults::ENV_MAX_ATTEMPTS)
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults::MAX_ATTEMPTS)
            .min(defaults::MAX_ATTEMPTS_LIMIT);
        Self::new(model, max_attempts)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// The attempt budget actually used.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.clamp(1, defaults::MAX_ATTEMPTS_LIMIT)
    }
}

/// Why an extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TransportFailure,
    EmptyResponse,
    ParseFailure,
    ValidationFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::EmptyResponse => "empty_response",
            FailureKind::ParseFailure => "parse_failure",
            FailureKind::ValidationFailure => "validation_failure",
        };
        f.write_str(s)
    }
}

/// Diagnostics of a failed extraction, taken from its last attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    /// Number of attempts made; always the effective attempt budget.
    pub attempts: u32,
    pub message: String,
    /// Full raw text of the last response, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Parsed but schema-invalid response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<JsonValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

/// Outcome of one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum ExtractionResult {
    /// Normalized record that passed validation.
    Success(JsonValue),
    Error(ExtractionFailure),
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success(_))
    }

    pub fn record(&self) -> Option<&JsonValue> {
        match self {
            ExtractionResult::Success(record) => Some(record),
            ExtractionResult::Error(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            ExtractionResult::Success(_) => None,
            ExtractionResult::Error(failure) => Some(failure),
        }
    }
}

/// Failure of a single attempt.
#[derive(Debug)]
enum AttemptError {
    Transport(String),
    Empty,
    Parse {
        raw: String,
        message: String,
    },
    Validation {
        raw: String,
        parsed: JsonValue,
        issues: Vec<ValidationIssue>,
    },
}

impl AttemptError {
    fn kind(&self) -> FailureKind {
        match self {
            AttemptError::Transport(_) => FailureKind::TransportFailure,
            AttemptError::Empty => FailureKind::EmptyResponse,
            AttemptError::Parse { .. } => FailureKind::ParseFailure,
            AttemptError::Validation { .. } => FailureKind::ValidationFailure,
        }
    }

    /// Response content to replay in the next correction round.
    fn raw(&self) -> Option<&str> {
        match self {
            AttemptError::Parse { raw, .. } | AttemptError::Validation { raw, .. } => Some(raw),
            AttemptError::Transport(_) | AttemptError::Empty => None,
        }
    }

    fn as_previous(&self) -> PreviousError<'_> {
        match self {
            AttemptError::Transport(message) => PreviousError::Message(message),
            AttemptError::Empty => PreviousError::Message(EMPTY_RESPONSE_MESSAGE),
            AttemptError::Parse { message, .. } => PreviousError::Message(message),
            AttemptError::Validation { issues, .. } => PreviousError::Issues(issues),
        }
    }

    fn into_failure(self, attempts: u32) -> ExtractionFailure {
        let kind = self.kind();
        match self {
            AttemptError::Transport(error) => ExtractionFailure {
                kind,
                attempts,
                message: format!("Model API error after {} attempts: {}", attempts, error),
                raw: None,
                parsed: None,
                issues: Vec::new(),
            },
            AttemptError::Empty => ExtractionFailure {
                kind,
                attempts,
                message: format!(
                    "Failed after {} attempts: {}",
                    attempts, EMPTY_RESPONSE_MESSAGE
                ),
                raw: None,
                parsed: None,
                issues: Vec::new(),
            },
            AttemptError::Parse { raw, message } => ExtractionFailure {
                kind,
                attempts,
                message: format!(
                    "Failed after {} attempts: response is not valid JSON ({})",
                    attempts, message
                ),
                raw: Some(raw),
                parsed: None,
                issues: Vec::new(),
            },
            AttemptError::Validation {
                raw,
                parsed,
                issues,
            } => {
                let summary = issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                ExtractionFailure {
                    kind,
                    attempts,
                    message: format!(
                        "Failed after {} attempts: response does not match the schema ({})",
                        attempts, summary
                    ),
                    raw: Some(raw),
                    parsed: Some(parsed),
                    issues,
                }
            }
        }
    }
}

const EMPTY_RESPONSE_MESSAGE: &str = "Model returned an empty or invalid response structure.";

/// Bounded extraction loop over a shared chat backend.
#[derive(Clone)]
pub struct ExtractionPipeline {
    backend: Arc<dyn ChatBackend>,
    config: ExtractionConfig,
}

impl ExtractionPipeline {
    pub fn new(backend: Arc<dyn ChatBackend>, config: ExtractionConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Same backend, different model or budget.
    pub fn with_config(&self, config: ExtractionConfig) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config,
        }
    }

    /// Extract a record matching `schema` from `text`.
    ///
    /// Callers must reject empty `text` beforehand. `example` is shown to the
    /// model verbatim and should itself satisfy `schema`.
    #[instrument(
        skip(self, text, schema, example, sink),
        fields(
            subsystem = "extraction",
            component = "pipeline",
            op = "extract",
            model = %self.config.model,
            max_attempts = self.config.effective_max_attempts(),
            text_len = text.len()
        )
    )]
    pub async fn extract(
        &self,
        text: &str,
        schema: &TargetSchema,
        example: &JsonValue,
        sink: &dyn ProgressSink,
    ) -> ExtractionResult {
        let max_attempts = self.config.effective_max_attempts();
        let model = self.config.model.as_str();
        let system = prompt::system_prompt(schema, example);
        let user = prompt::user_prompt(text);
        let start = Instant::now();

        let mut previous: Option<AttemptError> = None;
        let mut attempt = 1;
        loop {
            let mut messages = vec![ChatMessage::system(&system), ChatMessage::user(&user)];
            match previous.as_ref() {
                None => {
                    sink.log(&format!(
                        "Contacting model {} (attempt {}/{})...",
                        model, attempt, max_attempts
                    ));
                }
                Some(prev) => {
                    sink.log(&format!(
                        "Correction attempt {}/{} with model {}...",
                        attempt, max_attempts, model
                    ));
                    if let Some(raw) = prev.raw() {
                        messages.push(ChatMessage::assistant(raw));
                    }
                    messages.push(ChatMessage::user(prompt::correction_prompt(
                        Some(prev.as_previous()),
                        schema,
                        example,
                    )));
                }
            }

            match self.attempt(messages, schema).await {
                Ok(record) => {
                    info!(
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Extraction succeeded"
                    );
                    return ExtractionResult::Success(record);
                }
                Err(err) => {
                    warn!(attempt, failure_kind = %err.kind(), "Extraction attempt failed");
                    if attempt >= max_attempts {
                        let failure = err.into_failure(max_attempts);
                        sink.log(&failure.message);
                        warn!(
                            failure_kind = %failure.kind,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Extraction failed"
                        );
                        return ExtractionResult::Error(failure);
                    }
                    previous = Some(err);
                }
            }
            attempt += 1;
        }
    }

    /// Run one chat call and check its reply.
    async fn attempt(
        &self,
        messages: Vec<ChatMessage>,
        schema: &TargetSchema,
    ) -> std::result::Result<JsonValue, AttemptError> {
        let request = ChatRequest::json(self.config.model.clone(), messages);
        debug!(message_count = request.messages.len(), "Sending chat request");

        let response = self
            .backend
            .chat(request)
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let raw = response.content().ok_or(AttemptError::Empty)?;
        debug!(response_len = raw.len(), "Received chat response");

        let parsed: JsonValue = serde_json::from_str(raw).map_err(|e| AttemptError::Parse {
            raw: raw.to_string(),
            message: e.to_string(),
        })?;

        schema
            .validate(&parsed)
            .map_err(|issues| AttemptError::Validation {
                raw: raw.to_string(),
                parsed,
                issues,
            })
    }
}

impl std::fmt::Debug for ExtractionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPipeline")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChatBackend;
    use notecurate_core::schema::{article_example, article_schema, FieldDescriptor};
    use notecurate_core::ChatRole;
    use serde_json::json;
    use std::sync::Mutex;

    fn description_schema() -> TargetSchema {
        TargetSchema::new(vec![FieldDescriptor::string("description").min_len(1)])
    }

    fn pipeline(backend: &MockChatBackend, max_attempts: u32) -> ExtractionPipeline {
        ExtractionPipeline::new(
            Arc::new(backend.clone()),
            ExtractionConfig::new("test-model", max_attempts),
        )
    }

    fn silent(_: &str) {}

    #[tokio::test]
    async fn test_first_attempt_success() {
        let backend = MockChatBackend::new().with_content(r#"{"description":"x","extra":1}"#);
        let result = pipeline(&backend, 3)
            .extract("text", &description_schema(), &json!({"description": "e"}), &silent)
            .await;

        assert_eq!(result, ExtractionResult::Success(json!({"description": "x"})));
        assert_eq!(backend.call_count(), 1);

        let request = &backend.requests()[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.format, notecurate_core::ResponseFormat::Json);
        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::User]);
        assert!(request.messages[1].content.contains("text"));
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let backend = MockChatBackend::new()
            .with_content(r#"{"wrong":true}"#)
            .with_content("nope")
            .with_content(r#"{"description":"x"}"#);
        let result = pipeline(&backend, 3)
            .extract("text", &description_schema(), &json!({"description": "e"}), &silent)
            .await;

        assert_eq!(result.record(), Some(&json!({"description": "x"})));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_success_on_attempt_k_makes_k_calls() {
        for k in 1..=4u32 {
            let mut backend = MockChatBackend::new();
            for _ in 1..k {
                backend = backend.with_content("{}");
            }
            backend = backend.with_content(r#"{"description":"ok"}"#);
            let result = pipeline(&backend, 4)
                .extract("t", &description_schema(), &json!({}), &silent)
                .await;
            assert!(result.is_success());
            assert_eq!(backend.call_count(), k as usize);
        }
    }

    #[tokio::test]
    async fn test_always_invalid_exhausts_budget() {
        let backend = MockChatBackend::new().always_content(r#"{"description":""}"#);
        let result = pipeline(&backend, 3)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ValidationFailure);
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.parsed, Some(json!({"description": ""})));
        assert_eq!(failure.raw.as_deref(), Some(r#"{"description":""}"#));
        assert_eq!(failure.issues.len(), 1);
        assert_eq!(failure.issues[0].path, "description");
        assert!(!failure.message.is_empty());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_parse_failure_reports_raw() {
        let backend = MockChatBackend::new().with_content("not json");
        let result = pipeline(&backend, 1)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ParseFailure);
        assert_eq!(failure.raw.as_deref(), Some("not json"));
        assert_eq!(failure.attempts, 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failures_do_not_panic() {
        let backend = MockChatBackend::new().always_fail("connection refused");
        let result = pipeline(&backend, 3)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::TransportFailure);
        assert_eq!(failure.attempts, 3);
        assert!(failure.message.contains("connection refused"));
        assert!(failure.raw.is_none());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_zero_budget_acts_as_one() {
        let backend = MockChatBackend::new().always_empty();
        let result = pipeline(&backend, 0)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::EmptyResponse);
        assert_eq!(failure.attempts, 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_correction_round_replays_previous_response() {
        let backend = MockChatBackend::new()
            .with_content("not json")
            .with_content(r#"{"description":"x"}"#);
        pipeline(&backend, 3)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;

        let second = &backend.requests()[1];
        let roles: Vec<_> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(second.messages[2].content, "not json");
        assert!(second.messages[3]
            .content
            .starts_with(prompt::CORRECTION_PREAMBLE));
        assert!(second.messages[3]
            .content
            .contains("Error from previous attempt:"));
    }

    #[tokio::test]
    async fn test_correction_round_includes_validation_issues() {
        let backend = MockChatBackend::new()
            .with_content(r#"{"description":5}"#)
            .with_content(r#"{"description":"x"}"#);
        pipeline(&backend, 2)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;

        let correction = &backend.requests()[1].messages[3].content;
        assert!(correction.contains("Validation errors from previous attempt:"));
        assert!(correction.contains("Expected string, received number"));
    }

    #[tokio::test]
    async fn test_no_replay_after_transport_failure_or_empty_response() {
        let backend = MockChatBackend::new()
            .with_failure("timeout")
            .with_empty()
            .with_content(r#"{"description":"x"}"#);
        let result = pipeline(&backend, 3)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;
        assert!(result.is_success());

        let requests = backend.requests();
        for request in &requests[1..] {
            assert_eq!(request.messages.len(), 3);
            assert!(request
                .messages
                .iter()
                .all(|m| m.role != ChatRole::Assistant));
        }
        assert!(requests[1].messages[2].content.contains("timeout"));
    }

    #[tokio::test]
    async fn test_only_last_response_is_replayed() {
        let backend = MockChatBackend::new()
            .with_content("first bad")
            .with_content("second bad")
            .with_content(r#"{"description":"x"}"#);
        pipeline(&backend, 3)
            .extract("t", &description_schema(), &json!({}), &silent)
            .await;

        let third = &backend.requests()[2];
        let replayed: Vec<_> = third
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(replayed, vec!["second bad"]);
    }

    #[tokio::test]
    async fn test_progress_messages() {
        let seen = Mutex::new(Vec::new());
        let sink = |m: &str| seen.lock().unwrap().push(m.to_string());
        let backend = MockChatBackend::new().always_content("bad");
        pipeline(&backend, 2)
            .extract("t", &description_schema(), &json!({}), &sink)
            .await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], "Contacting model test-model (attempt 1/2)...");
        assert_eq!(seen[1], "Correction attempt 2/2 with model test-model...");
        assert!(seen[2].starts_with("Failed after 2 attempts"));
    }

    #[tokio::test]
    async fn test_article_schema_success_applies_defaults() {
        let backend = MockChatBackend::new().with_content(
            r#"{"description":"laser","location":"road 450","tags":null,"timestamp":"2024-07-09T14:00:00Z"}"#,
        );
        let result = pipeline(&backend, 3)
            .extract("t", &article_schema(), &article_example(), &silent)
            .await;

        let record = result.record().unwrap();
        assert_eq!(record["tags"], json!([]));
        assert!(article_schema().validate(record).is_ok());
    }

    #[test]
    fn test_result_serialization() {
        let ok = ExtractionResult::Success(json!({"description": "x"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "data": {"description": "x"}})
        );

        let err = ExtractionResult::Error(ExtractionFailure {
            kind: FailureKind::ParseFailure,
            attempts: 1,
            message: "m".to_string(),
            raw: Some("not json".to_string()),
            parsed: None,
            issues: vec![],
        });
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "status": "error",
                "data": {"kind": "parse_failure", "attempts": 1, "message": "m", "raw": "not json"}
            })
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.model, defaults::GEN_MODEL);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.clone().with_max_attempts(0).effective_max_attempts(), 1);
        assert_eq!(
            config.with_max_attempts(u32::MAX).effective_max_attempts(),
            defaults::MAX_ATTEMPTS_LIMIT
        );
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExtractionPipeline>();
    }
}
