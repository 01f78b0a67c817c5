//! `billrate-recon`: bill code rate classification, deduplication and
//! reference reconciliation.
//!
//! Pure engine crate: receives pre-loaded tables, returns the output bundle
//! and run summary. No CLI or IO dependencies.

pub mod assemble;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod schema;

pub use config::PipelineConfig;
pub use engine::run;
pub use error::ReconError;
pub use model::{Category, OutputBundle, PipelineInput, RunOutput, RunSummary, Sheet, Table, Value};
