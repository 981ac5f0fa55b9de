//! # Ledgerxml - rule-driven CSV to XML conversion
//!
//! Ledgerxml converts flat CSV exports of legacy cashbook systems into
//! hierarchical XML (`cashbook > transaction > lineItem`) for bulk upload.
//! Each department declares how its files are read, grouped, transformed and
//! validated; a template declares which columns become which XML fields.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │ CSV File │──▶│ Parser  │──▶│ Grouper  │──▶│ Transform │──▶│ Validate │──▶│ Assemble │──▶ XML
//! │ (any enc)│   │(records)│   │(txn/item)│   │ (actions) │   │ (schema) │   │ (tree)   │
//! └──────────┘   └─────────┘   └──────────┘   └───────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ledgerxml::{convert_file, read_template, DepartmentConfig};
//!
//! let department = DepartmentConfig::load("configs/finance.toml".as_ref())?;
//! let schema = read_template("templates/checks.csv")?;
//! let output = convert_file("FIN_checks.csv".as_ref(), &department, &schema, false)?;
//! println!("{}", output.xml);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Schema, records, transactions
//! - [`parser`] - CSV reading with encoding and delimiter detection
//! - [`template`] - Template files to schemas, template registry
//! - [`config`] - Main configuration and department rulesets
//! - [`condition`] - Condition expressions
//! - [`transform`] - Grouping, action DSL, per-file pipeline
//! - [`validation`] - Field validation and reports
//! - [`xml`] - Document assembly, serialization, XSD
//! - [`batch`] - Concurrent processing of input directories
//! - [`logs`] - Tracing setup

// Core modules
pub mod error;
pub mod models;

// Inputs
pub mod config;
pub mod parser;
pub mod template;

// Engine
pub mod condition;
pub mod transform;
pub mod validation;

// Output
pub mod xml;

// Orchestration
pub mod batch;
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AssembleError, BatchError, ConfigError, CsvError, PipelineError, SchemaError, TransformError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DataType, FieldMapping, Fields, LineItem, ParentLevel, Record, Requirement, Schema, StaticField,
    Transaction,
};

// =============================================================================
// Re-exports - Inputs
// =============================================================================

pub use config::{DepartmentConfig, MainConfig};
pub use parser::{read_file, CsvSettings, RecordSet};
pub use template::{read_template, TemplateRegistry, TemplateRule};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use transform::dsl::{actions_description, example_ruleset, Action, Ruleset};
pub use transform::grouper::group_records;
pub use validation::{ValidationFinding, ValidationOptions, ValidationReport, Validator};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{convert_file, convert_records, UnitOptions, UnitOutput, UnitStats};
pub use xml::{assemble, generate_xsd, to_xml_string, AssembleOptions, Element};

// =============================================================================
// Re-exports - Batch
// =============================================================================

pub use batch::{process, run_unit, RunContext, RunSummary, UnitResult};
