//! Centralized default constants for notecurate.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Environment variable names live here too so the binary and the
//! library constructors agree on them.

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model for extraction.
pub const GEN_MODEL: &str = "gemma3:latest";

/// Default attempt budget for one extraction.
pub const MAX_ATTEMPTS: u32 = 3;

/// Upper bound on any attempt budget, configured or requested.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Timeout for chat requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for model listing / health requests (seconds).
pub const CATALOG_TIMEOUT_SECS: u64 = 5;

/// Generation slower than this is logged as a warning.
pub const SLOW_GENERATION_MS: u64 = 30_000;

pub const ENV_OLLAMA_BASE: &str = "OLLAMA_BASE";
pub const ENV_GEN_MODEL: &str = "NOTECURATE_GEN_MODEL";
pub const ENV_MAX_ATTEMPTS: &str = "NOTECURATE_MAX_ATTEMPTS";
pub const ENV_GEN_TIMEOUT_SECS: &str = "NOTECURATE_GEN_TIMEOUT_SECS";

// =============================================================================
// PRE-PROCESSING
// =============================================================================

/// Default title keyword for the pack-with-title algorithm.
pub const PACK_TITLE_KEYWORD: &str = "גזרת";

// =============================================================================
// DATABASE
// =============================================================================

/// Default SQLite database location.
pub const DATABASE_URL: &str = "sqlite://notecurate.db";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for the unconfirmed-notes review queue.
pub const UNCONFIRMED_PAGE_LIMIT: i64 = 1;

/// Upper bound on any page size.
pub const PAGE_LIMIT_MAX: i64 = 100;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP bind host.
pub const SERVER_HOST: &str = "127.0.0.1";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Number of console entries retained for `GET /api/v1/console`.
pub const CONSOLE_CAPACITY: usize = 500;

/// Broadcast buffer for live console subscribers.
pub const CONSOLE_BROADCAST_CAPACITY: usize = 256;

/// Maximum accepted request body.
pub const MAX_BODY_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Maximum raw notes accepted in a single save request.
pub const RAW_NOTE_BATCH_MAX: usize = 10_000;
