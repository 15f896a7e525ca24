//! HTTP handlers for notecurate-api.

pub mod extraction;
pub mod notes;
pub mod preprocess;
pub mod raw_notes;
pub mod system;
