//! Ollama chat backend and model catalog.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use notecurate_core::defaults;
use notecurate_core::{
    ChatBackend, ChatMessage, ChatRequest, ChatResponse, Error, ModelCatalog, ModelInfo,
    ResponseFormat, Result,
};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = defaults::GEN_TIMEOUT_SECS;

/// Ollama backend speaking `/api/chat` and `/api/tags`.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a backend for the default local endpoint.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_OLLAMA_URL.to_string(), GEN_TIMEOUT_SECS)
    }

    /// Create a backend for a custom endpoint and generation timeout.
    pub fn with_config(base_url: String, gen_timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        info!(
            subsystem = "inference",
            component = "ollama",
            url = %base_url,
            gen_timeout_secs,
            "Initializing Ollama backend"
        );

        Self {
            client,
            base_url,
            gen_timeout_secs,
        }
    }

    /// Create from `OLLAMA_BASE` and `NOTECURATE_GEN_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let base_url = std::env::var(defaults::ENV_OLLAMA_BASE)
            .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_timeout = std::env::var(defaults::ENV_GEN_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GEN_TIMEOUT_SECS);
        Self::with_config(base_url, gen_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the server answers `/api/tags`. Never errors.
    pub async fn health_check(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(defaults::CATALOG_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!("Ollama health check passed");
                true
            }
            Ok(resp) => {
                warn!("Ollama health check failed: {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                false
            }
        }
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    /// Set to `"json"` for guaranteed valid JSON output.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    /// Suppress chain-of-thought for thinking models when JSON is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

impl<'a> From<&'a ChatRequest> for OllamaChatRequest<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        let json = request.format == ResponseFormat::Json;
        Self {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            format: json.then_some("json"),
            think: json.then_some(false),
        }
    }
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
}

/// Response from the Ollama `/api/tags` endpoint.
#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Deserialize)]
struct TagDetails {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    parameter_size: Option<String>,
}

impl From<TagModel> for ModelInfo {
    fn from(model: TagModel) -> Self {
        let (family, parameter_size) = match model.details {
            Some(d) => (d.family, d.parameter_size),
            None => (None, None),
        };
        ModelInfo {
            name: model.name,
            size: model.size,
            family,
            parameter_size,
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    #[instrument(skip(self, request), fields(subsystem = "inference", component = "ollama", op = "chat", model = %request.model, message_count = request.messages.len()))]
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();
        let body = OllamaChatRequest::from(&request);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = result.message.as_ref().map_or(0, |m| m.content.len()),
            duration_ms = elapsed,
            "Chat complete"
        );
        if elapsed > defaults::SLOW_GENERATION_MS {
            warn!(duration_ms = elapsed, slow = true, "Slow generation operation");
        }

        Ok(ChatResponse {
            message: result.message,
        })
    }
}

#[async_trait]
impl ModelCatalog for OllamaBackend {
    #[instrument(skip(self), fields(subsystem = "inference", component = "ollama", op = "list_models"))]
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(defaults::CATALOG_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Ollama unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Inference(format!(
                "Ollama returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse model list: {}", e)))?;

        let models: Vec<ModelInfo> = tags.models.into_iter().map(ModelInfo::from).collect();
        debug!(result_count = models.len(), "Listed models");
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_url_is_localhost() {
        assert_eq!(DEFAULT_OLLAMA_URL, "http://127.0.0.1:11434");
        assert_eq!(OllamaBackend::default().base_url(), DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = OllamaBackend::with_config("http://ollama:11434/".to_string(), 10);
        assert_eq!(backend.base_url(), "http://ollama:11434");
    }

    #[test]
    fn test_chat_request_with_json_format() {
        let request = ChatRequest::json("llama3", vec![ChatMessage::user("Output JSON")]);
        let json = serde_json::to_string(&OllamaChatRequest::from(&request)).unwrap();
        assert!(json.contains("\"format\":\"json\""));
        assert!(json.contains("\"think\":false"));
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_chat_request_without_format() {
        let request = ChatRequest {
            model: "llama3".to_string(),
            messages: vec![ChatMessage::user("Hello")],
            format: ResponseFormat::Text,
        };
        let json = serde_json::to_string(&OllamaChatRequest::from(&request)).unwrap();
        assert!(!json.contains("format"));
        assert!(!json.contains("think"));
    }

    #[test]
    fn test_chat_response_without_message() {
        let response: OllamaChatResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert!(response.message.is_none());
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "gemma3:latest",
                "format": "json",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gemma3:latest",
                "message": {"role": "assistant", "content": "{\"description\":\"x\"}"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OllamaBackend::with_config(server.uri(), 10);
        let response = backend
            .chat(ChatRequest::json(
                "gemma3:latest",
                vec![ChatMessage::system("s"), ChatMessage::user("u")],
            ))
            .await
            .unwrap();
        assert_eq!(response.content(), Some("{\"description\":\"x\"}"));
    }

    #[tokio::test]
    async fn test_chat_server_error_is_inference_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let backend = OllamaBackend::with_config(server.uri(), 10);
        let err = backend
            .chat(ChatRequest::json("missing", vec![ChatMessage::user("u")]))
            .await
            .unwrap_err();
        match err {
            Error::Inference(msg) => assert!(msg.contains("model not found")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [
                    {
                        "name": "gemma3:latest",
                        "size": 3338801804u64,
                        "details": {"family": "gemma3", "parameter_size": "4.3B"}
                    },
                    {"name": "llama3:8b"}
                ]
            })))
            .mount(&server)
            .await;

        let backend = OllamaBackend::with_config(server.uri(), 10);
        let models = backend.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "gemma3:latest");
        assert_eq!(models[0].family.as_deref(), Some("gemma3"));
        assert_eq!(models[0].parameter_size.as_deref(), Some("4.3B"));
        assert_eq!(models[1].size, None);
        assert!(backend.health_check().await);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let backend = OllamaBackend::with_config(uri, 2);
        assert!(backend.list_models().await.is_err());
        assert!(!backend.health_check().await);
    }
}
