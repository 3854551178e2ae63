// Public fallible APIs in this crate share one concrete error contract (`FlashrankError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod models;
pub mod scoring;
pub mod store;

pub use config::EngineConfig;
pub use engine::RelevanceEngine;
pub use error::{FlashrankError, Result};
pub use metadata::ResolvedMetadata;
pub use store::{SqliteTaxonomyStore, TaxonomyStore};
