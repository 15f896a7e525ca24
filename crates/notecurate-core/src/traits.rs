//! Core traits for notecurate abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::Result;
use crate::models::*;

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for imported raw notes.
#[async_trait]
pub trait RawNoteRepository: Send + Sync {
    /// Insert raw notes, returning their ids in input order.
    async fn insert_many(&self, values: Vec<String>) -> Result<Vec<i64>>;

    /// Fetch a raw note by id.
    async fn get(&self, id: i64) -> Result<RawNote>;

    /// List all raw notes, newest first, with enrichment state.
    async fn list(&self) -> Result<Vec<RawNoteSummary>>;

    /// List raw notes that have no linked structured note, oldest first.
    async fn list_unenriched(&self) -> Result<Vec<RawNote>>;

    /// Whether a raw note already has a linked structured note.
    async fn is_enriched(&self, id: i64) -> Result<bool>;

    /// Delete a raw note and its links.
    async fn delete(&self, id: i64) -> Result<()>;
}

/// Repository for structured notes and their raw-note links.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a structured note.
    async fn insert(&self, input: NoteInput) -> Result<i64>;

    /// Insert a structured note and link it to its raw note in one transaction.
    async fn insert_for_raw(&self, raw_note_id: i64, input: NoteInput) -> Result<i64>;

    /// Fetch a note by id.
    async fn get(&self, id: i64) -> Result<Note>;

    /// List all notes, newest first.
    async fn list(&self) -> Result<Vec<Note>>;

    /// Overwrite the writable fields of a note.
    async fn update(&self, id: i64, input: NoteInput) -> Result<()>;

    /// Link a note to a raw note. Re-linking overwrites the confirmed flag.
    async fn link_raw(&self, raw_note_id: i64, note_id: i64, confirmed: bool) -> Result<()>;

    /// Page through notes whose raw-note link is not yet confirmed.
    async fn list_unconfirmed(&self, limit: i64, cursor: Option<i64>) -> Result<UnconfirmedPage>;

    /// Overwrite the note and mark all its links confirmed.
    async fn update_and_confirm(&self, id: i64, input: NoteInput) -> Result<()>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for chat-completion calls.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one chat request.
    ///
    /// `Err` means the call itself could not complete (transport failure).
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// Backend that can enumerate installed models.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// List models available on the inference server.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

// =============================================================================
// PROGRESS
// =============================================================================

/// Sink for human-readable progress narration.
///
/// Observational only: nothing may branch on whether a message was logged.
pub trait ProgressSink: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Progress sink that forwards to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(subsystem = "extraction", component = "progress", "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_is_progress_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |m: &str| seen.lock().unwrap().push(m.to_string());
        sink.log("one");
        ProgressSink::log(&sink, "two");
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn _chat(_: &dyn ChatBackend) {}
        fn _catalog(_: &dyn ModelCatalog) {}
        fn _sink(_: &dyn ProgressSink) {}
        fn _raw(_: &dyn RawNoteRepository) {}
        fn _notes(_: &dyn NoteRepository) {}
    }
}
