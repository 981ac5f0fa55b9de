//! Error types for the ledgerxml conversion pipeline.
//!
//! This module defines one error enum per pipeline concern:
//!
//! - [`CsvError`] - record reader errors
//! - [`SchemaError`] - template reader errors
//! - [`ConfigError`] - main config and department ruleset errors
//! - [`TransformError`] - action chain errors
//! - [`AssembleError`] - XML serialization errors
//! - [`PipelineError`] - fatal-to-unit errors
//! - [`BatchError`] - run-level errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationFinding;

// =============================================================================
// CSV Reader Errors
// =============================================================================

/// Errors while reading an input record-set.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the file content.
    #[error("Failed to decode content as {encoding}: {message}")]
    EncodingError { encoding: String, message: String },

    /// Invalid CSV format.
    #[error("Line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Reader settings that cannot describe any file.
    #[error("Invalid CSV settings: {0}")]
    InvalidSettings(String),
}

// =============================================================================
// Template / Schema Errors
// =============================================================================

/// Errors while building a [`crate::models::Schema`] from a template.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid template row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("Duplicate source key '{0}' in template")]
    DuplicateKey(String),

    #[error("Field '{field}': '{tag}' is not a valid XML element name")]
    InvalidTag { field: String, tag: String },

    #[error("Template contains no field mappings")]
    Empty,

    #[error("Unsupported template format: {0}")]
    UnsupportedFormat(String),

    #[error("Template CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Template JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors from loading the main configuration or department rulesets.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A ruleset that would fail at apply time.
    #[error("Department '{department}', field '{field}', action #{index}: {source}")]
    InvalidAction {
        department: String,
        field: String,
        index: usize,
        #[source]
        source: TransformError,
    },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised while applying an action chain.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The action kind is not one the engine knows.
    #[error("Unknown transformation action kind: '{0}'")]
    UnknownActionKind(String),

    /// A `regex_replace` pattern that does not compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A parameter outside what the action can render.
    #[error("Invalid parameter for '{kind}': {message}")]
    InvalidParameter { kind: String, message: String },

    /// A chain failure located on one field of one line item.
    #[error("Field '{field}' (row {row}): {source}")]
    Field {
        field: String,
        row: usize,
        #[source]
        source: Box<TransformError>,
    },
}

// =============================================================================
// Assembly Errors
// =============================================================================

/// Errors while serializing an output document.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("XML write error: {0}")]
    Xml(String),

    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for AssembleError {
    fn from(err: quick_xml::Error) -> Self {
        AssembleError::Xml(err.to_string())
    }
}

// =============================================================================
// Pipeline Errors (per unit)
// =============================================================================

/// Fatal-to-unit errors.
///
/// Any of these aborts the unit; its input is left untouched.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Record-set unreadable.
    #[error("Record reader error: {0}")]
    Csv(#[from] CsvError),

    /// Schema could not be loaded.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// No template mapping resolves for this unit.
    #[error("Schema unresolvable for '{file}': {reason}")]
    SchemaUnresolvable { file: String, reason: String },

    /// No department claims this unit.
    #[error("No matching department for '{0}'")]
    NoDepartment(String),

    /// Action chain failure.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Error-severity findings with `continue_on_error` disabled.
    #[error("Validation failed with {errors} error(s)")]
    ValidationFailed {
        errors: usize,
        findings: Vec<ValidationFinding>,
    },

    /// Document serialization failure.
    #[error("Assembly error: {0}")]
    Assemble(#[from] AssembleError),

    /// Output could not be written.
    #[error("Output error for {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The unit's worker panicked.
    #[error("Worker aborted: {0}")]
    WorkerAborted(String),
}

// =============================================================================
// Batch Errors (run level)
// =============================================================================

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Cannot scan input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report IO error: {0}")]
    Report(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for record reading.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for template reading.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for action chains.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for document serialization.
pub type AssembleResult<T> = Result<T, AssembleError>;

/// Result type for a single unit.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for a whole run.
pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> PipelineError
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // TransformError -> PipelineError
        let transform_err = TransformError::UnknownActionKind("explode".into());
        let pipeline_err: PipelineError = transform_err.into();
        assert!(pipeline_err.to_string().contains("explode"));
    }

    #[test]
    fn test_field_error_format() {
        let err = TransformError::Field {
            field: "Amount".into(),
            row: 7,
            source: Box::new(TransformError::UnknownActionKind("frobnicate".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("Amount"));
        assert!(msg.contains("row 7"));
        assert!(msg.contains("frobnicate"));
    }

    #[test]
    fn test_invalid_action_names_location() {
        let err = ConfigError::InvalidAction {
            department: "Finance".into(),
            field: "Check".into(),
            index: 2,
            source: TransformError::UnknownActionKind("bogus".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("Finance"));
        assert!(msg.contains("#2"));
        assert!(msg.contains("bogus"));
    }
}
