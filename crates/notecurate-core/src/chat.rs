//! Chat-completion request and response types.
//!
//! Backend-neutral shapes for a single chat call. Concrete backends map
//! them onto their wire format.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Output format constraint for a chat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// A single chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub format: ResponseFormat,
}

impl ChatRequest {
    /// Request JSON-formatted output.
    pub fn json(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            format: ResponseFormat::Json,
        }
    }
}

/// Reply to a chat request.
///
/// `message` is absent when the server answered without a message body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub message: Option<ChatMessage>,
}

impl ChatResponse {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            message: Some(ChatMessage::assistant(content)),
        }
    }

    /// The assistant content, if any non-empty content was returned.
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }

    #[test]
    fn test_response_content_empty_is_none() {
        assert_eq!(ChatResponse::default().content(), None);
        assert_eq!(ChatResponse::assistant("").content(), None);
        assert_eq!(ChatResponse::assistant("{}").content(), Some("{}"));
    }

    #[test]
    fn test_json_request() {
        let req = ChatRequest::json("gemma3", vec![ChatMessage::user("x")]);
        assert_eq!(req.format, ResponseFormat::Json);
        assert_eq!(req.messages.len(), 1);
    }
}
