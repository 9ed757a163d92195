//! Error types for reclens operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecLensError>;

#[derive(Error, Debug)]
pub enum RecLensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Duplicate entity names found: {names:?}")]
    DuplicateEntityName { names: Vec<String> },

    #[error("Duplicate reference dataset names found: {names:?}")]
    DuplicateDatasetName { names: Vec<String> },

    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Executing file glob for [{entity}] entity: no files found matching pattern for {side} side: {pattern}")]
    NoFileMatch {
        entity: String,
        side: String,
        pattern: String,
    },

    #[error("Duplicate primary key ({key}) in materialized transform result '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("Data type mismatch for column '{column}': left={left_type}, right={right_type}")]
    TypeMismatch {
        column: String,
        left_type: String,
        right_type: String,
    },

    #[error("Primary key '{column}' not found in {side} table columns")]
    MissingKeyColumn { column: String, side: String },

    #[error("Column '{column}' not found in both tables: left.found={present_on_left}, right.found={present_on_right}")]
    AsymmetricColumn {
        column: String,
        present_on_left: bool,
        present_on_right: bool,
    },

    #[error("execute() has already been called on this run")]
    AlreadyExecuted,

    #[error("Transform execution error: {message}")]
    TransformExecution { message: String },

    #[error("Relation error: {message}")]
    Relation { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl RecLensError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn source_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SourceNotFound { path: path.into() }
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::TransformExecution {
            message: msg.into(),
        }
    }

    pub fn relation(msg: impl Into<String>) -> Self {
        Self::Relation {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }
}
