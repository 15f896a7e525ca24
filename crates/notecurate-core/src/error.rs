//! Error types for notecurate.

use thiserror::Error;

/// Result type alias using notecurate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for notecurate operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Raw note not found
    #[error("Raw note not found: {0}")]
    RawNoteNotFound(i64),

    /// Structured note not found
    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_raw_note_not_found() {
        let err = Error::RawNoteNotFound(42);
        assert_eq!(err.to_string(), "Raw note not found: 42");
    }

    #[test]
    fn test_error_display_note_not_found() {
        let err = Error::NoteNotFound(7);
        assert_eq!(err.to_string(), "Note not found: 7");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("empty text".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty text");
    }

    #[test]
    fn test_from_sqlx_error() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.to_string().starts_with("Database error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
