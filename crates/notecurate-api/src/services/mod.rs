//! Service layer for business logic.

pub mod enrichment;

pub use enrichment::{EnrichRequest, EnrichSummary, EnrichTarget, EnrichmentService};
