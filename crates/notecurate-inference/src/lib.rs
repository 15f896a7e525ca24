//! # notecurate-inference
//!
//! LLM access for notecurate.
//!
//! This crate provides:
//! - Ollama chat backend and model catalog (feature `ollama`, default)
//! - Prompt construction for schema-guided extraction
//! - The bounded extraction pipeline with correction rounds
//! - A scripted mock chat backend (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notecurate_core::schema::{article_example, article_schema};
//! use notecurate_core::TracingSink;
//! use notecurate_inference::{ExtractionConfig, ExtractionPipeline, OllamaBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = ExtractionPipeline::new(
//!         Arc::new(OllamaBackend::from_env()),
//!         ExtractionConfig::from_env(),
//!     );
//!     let result = pipeline
//!         .extract("Road 450 closed", &article_schema(), &article_example(), &TracingSink)
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&result).unwrap());
//! }
//! ```

pub mod extraction;
pub mod prompt;

#[cfg(feature = "ollama")]
pub mod ollama;

// Scripted chat backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use extraction::{
    ExtractionConfig, ExtractionFailure, ExtractionPipeline, ExtractionResult, FailureKind,
};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;
