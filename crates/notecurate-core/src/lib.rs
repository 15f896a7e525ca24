//! # notecurate-core
//!
//! Core types, schema validation, and trait definitions shared by the
//! notecurate crates.
//!
//! ## Logging
//!
//! Every crate logs through `tracing` with `subsystem` ("api", "db",
//! "inference", "console") and, where useful, `component` and `op` fields.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (failed attempt, slow call) |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration, raw model output |

pub mod chat;
pub mod console;
pub mod defaults;
pub mod error;
pub mod models;
pub mod preprocess;
pub mod schema;
pub mod traits;

// Re-export commonly used types at crate root
pub use chat::{ChatMessage, ChatRequest, ChatResponse, ChatRole, ResponseFormat};
pub use console::{Console, ConsoleEntry, ConsoleLevel};
pub use error::{Error, Result};
pub use models::*;
pub use preprocess::{Algorithm, AlgorithmInfo};
pub use schema::{FieldDescriptor, FieldKind, TargetSchema, ValidationIssue};
pub use traits::*;
