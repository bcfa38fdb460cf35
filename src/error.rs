//! Error types for the analysis engine

use thiserror::Error;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Analysis engine errors
///
/// Only `SubjectNotFound` aborts an analysis run, and only for that subject.
/// The recoverable conditions of the pipeline (missing attributes, unresolved
/// citations, cycles, template-tier misses) are not errors: they are surfaced
/// as explicit flags on the final report.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Subject record not found: {id}")]
    SubjectNotFound { id: String },

    #[error("Record not found: {id}")]
    UnknownRecord { id: String },

    #[error("Template catalog has no generic fallback template")]
    MissingGenericTemplate,

    #[error("Duplicate record id: {id}")]
    DuplicateRecord { id: String },

    #[error("Invalid keyword pattern '{pattern}': {source}")]
    InvalidKeywordPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
