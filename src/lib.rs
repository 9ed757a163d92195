//! # reclens
//!
//! A key-based reconciliation engine for pairs of tabular datasets.
//! Two sides of an entity (typically a legacy system and its replacement)
//! are aligned by primary key with full outer join semantics and compared
//! field by field with null-safe equality, producing per-row match flags
//! and per-field summary statistics.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod output;
pub mod progress;
pub mod relation;
pub mod run;
pub mod schema;
pub mod source;
pub mod summary;
pub mod transform;
pub mod value;

pub use config::RunConfig;
pub use error::{RecLensError, Result};
pub use relation::{Column, Relation};
pub use run::ReconRun;
pub use value::{ColumnType, Value};

/// Name of the run-wide outcome ledger relation
pub const RESULTS_TABLE: &str = "entity_compare_results";

/// Default row sampling threshold for database export
pub const DEFAULT_SAMPLE_THRESHOLD: u64 = 10_000;
