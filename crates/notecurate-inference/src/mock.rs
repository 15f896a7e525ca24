//! Scripted chat backend for deterministic testing.
//!
//! Replies are consumed in order; once the script runs out the fallback
//! reply (if any) is repeated. Every request is recorded for assertions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notecurate_inference::mock::MockChatBackend;
//!
//! let backend = MockChatBackend::new()
//!     .with_content("not json")
//!     .with_content(r#"{"description":"x"}"#);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use notecurate_core::{
    ChatBackend, ChatRequest, ChatResponse, Error, ModelCatalog, ModelInfo, Result,
};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Assistant message with this content.
    Content(String),
    /// Response with an empty assistant message.
    Empty,
    /// Response without any message.
    Missing,
    /// Transport failure with this message.
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<MockReply>,
    fallback: Option<MockReply>,
    requests: Vec<ChatRequest>,
}

/// Mock chat backend and model catalog.
#[derive(Clone)]
pub struct MockChatBackend {
    state: Arc<Mutex<MockState>>,
    models: Arc<Vec<ModelInfo>>,
    catalog_error: Option<String>,
}

impl MockChatBackend {
    /// Create a backend with an empty script and no models.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            models: Arc::new(Vec::new()),
            catalog_error: None,
        }
    }

    /// Queue a reply.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.state.lock().unwrap().script.push_back(reply);
        self
    }

    pub fn with_content(self, content: impl Into<String>) -> Self {
        self.with_reply(MockReply::Content(content.into()))
    }

    pub fn with_empty(self) -> Self {
        self.with_reply(MockReply::Empty)
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.with_reply(MockReply::Fail(message.into()))
    }

    /// Reply used once the script is exhausted.
    pub fn always(self, reply: MockReply) -> Self {
        self.state.lock().unwrap().fallback = Some(reply);
        self
    }

    pub fn always_content(self, content: impl Into<String>) -> Self {
        self.always(MockReply::Content(content.into()))
    }

    pub fn always_empty(self) -> Self {
        self.always(MockReply::Empty)
    }

    pub fn always_fail(self, message: impl Into<String>) -> Self {
        self.always(MockReply::Fail(message.into()))
    }

    /// Models reported by the catalog.
    pub fn with_models<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = Arc::new(
            names
                .into_iter()
                .map(|name| ModelInfo {
                    name: name.into(),
                    size: None,
                    family: None,
                    parameter_size: None,
                })
                .collect(),
        );
        self
    }

    /// Make the catalog fail as if the server were unreachable.
    pub fn with_unreachable_catalog(mut self) -> Self {
        self.catalog_error = Some("connection refused".to_string());
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Clear the request log.
    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear()
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request);
            state.script.pop_front().or_else(|| state.fallback.clone())
        };

        match reply {
            Some(MockReply::Content(content)) => Ok(ChatResponse::assistant(content)),
            Some(MockReply::Empty) => Ok(ChatResponse::assistant("")),
            Some(MockReply::Missing) => Ok(ChatResponse::default()),
            Some(MockReply::Fail(message)) => Err(Error::Inference(message)),
            None => Err(Error::Inference("Mock script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl ModelCatalog for MockChatBackend {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        match &self.catalog_error {
            Some(message) => Err(Error::Inference(message.clone())),
            None => Ok(self.models.as_ref().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecurate_core::ChatMessage;

    fn request() -> ChatRequest {
        ChatRequest::json("m", vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let backend = MockChatBackend::new()
            .with_content("one")
            .always_content("again");

        assert_eq!(
            backend.chat(request()).await.unwrap().content(),
            Some("one")
        );
        assert_eq!(
            backend.chat(request()).await.unwrap().content(),
            Some("again")
        );
        assert_eq!(
            backend.chat(request()).await.unwrap().content(),
            Some("again")
        );
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let backend = MockChatBackend::new();
        assert!(backend.chat(request()).await.is_err());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_and_missing_have_no_content() {
        let backend = MockChatBackend::new()
            .with_empty()
            .with_reply(MockReply::Missing);
        assert_eq!(backend.chat(request()).await.unwrap().content(), None);
        assert_eq!(backend.chat(request()).await.unwrap().content(), None);
    }

    #[tokio::test]
    async fn test_clones_share_log() {
        let backend = MockChatBackend::new().always_content("{}");
        let clone = backend.clone();
        clone.chat(request()).await.unwrap();
        assert_eq!(backend.call_count(), 1);
        backend.clear_requests();
        assert_eq!(clone.call_count(), 0);
    }

    #[tokio::test]
    async fn test_catalog() {
        let backend = MockChatBackend::new().with_models(["gemma3:latest", "llama3"]);
        let names: Vec<_> = backend
            .list_models()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["gemma3:latest", "llama3"]);

        let down = MockChatBackend::new().with_unreachable_catalog();
        assert!(down.list_models().await.is_err());
    }
}
