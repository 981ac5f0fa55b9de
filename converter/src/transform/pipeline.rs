//! Per-unit conversion pipeline.
//!
//! One unit is one input file, taken end to end:
//!
//! ```text
//! records → group → number → transform → validate → assemble → XML text
//! ```
//!
//! [`convert_records`] is the in-memory core; [`convert_file`] adds the
//! record reader. Writing and archiving the result belong to the batch
//! orchestrator.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerxml::transform::pipeline::{convert_records, UnitOptions};
//!
//! let output = convert_records(records, &schema, &ruleset, &UnitOptions::default())?;
//! println!("{} line items", output.stats.line_items_created);
//! std::fs::write("out.xml", output.xml)?;
//! ```

use serde::Serialize;
use std::path::Path;

use super::dsl::executor;
use super::dsl::ruleset::Ruleset;
use super::grouper::group_records;
use crate::config::DepartmentConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_info, log_warning};
use crate::models::{Record, Schema};
use crate::parser;
use crate::validation::{ValidationOptions, ValidationReport, Validator};
use crate::xml::{assemble, number_line_items, to_xml_string, AssembleOptions, WriteOptions};

/// Options for one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOptions {
    pub assemble: AssembleOptions,
    pub validation: ValidationOptions,
    /// Produce the document even when validation reports errors
    pub continue_on_error: bool,
}

impl UnitOptions {
    pub fn for_department(department: &DepartmentConfig, continue_on_error: bool) -> Self {
        Self {
            assemble: department.xml.clone(),
            validation: department.validation,
            continue_on_error,
        }
    }
}

/// Counters of one unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnitStats {
    pub rows_processed: usize,
    pub transactions_created: usize,
    pub line_items_created: usize,
    pub fields_transformed: usize,
    pub validation_errors: usize,
    pub validation_warnings: usize,
}

/// A converted unit
#[derive(Debug, Clone)]
pub struct UnitOutput {
    /// Serialized document
    pub xml: String,
    pub stats: UnitStats,
    /// All findings, including those that did not block the unit
    pub report: ValidationReport,
}

/// Convert flat records into a serialized document.
///
/// Fails on the first transformation error, or when validation reports
/// errors and `continue_on_error` is off.
pub fn convert_records(
    records: Vec<Record>,
    schema: &Schema,
    ruleset: &Ruleset,
    options: &UnitOptions,
) -> PipelineResult<UnitOutput> {
    let mut stats = UnitStats {
        rows_processed: records.len(),
        ..Default::default()
    };

    // 1. Group
    let mut transactions = group_records(records, &ruleset.transaction_grouping);
    stats.transactions_created = transactions.len();

    // 2. Number (before validation so findings cite output ids)
    stats.line_items_created = number_line_items(&mut transactions, options.assemble.global_numbering);

    // 3. Transform
    let transformed = executor::execute(&mut transactions, ruleset)?;
    stats.fields_transformed = transformed.fields_transformed;
    tracing::debug!("{}", transformed.summary());

    // 4. Validate
    let report = Validator::new(schema)
        .with_options(options.validation)
        .validate(&transactions);
    stats.validation_errors = report.error_count;
    stats.validation_warnings = report.warning_count;

    if !report.is_valid() {
        if !options.continue_on_error {
            return Err(PipelineError::ValidationFailed {
                errors: report.error_count,
                findings: report.findings,
            });
        }
        log_warning(format!(
            "{} validation error(s); continuing as configured",
            report.error_count
        ));
    }

    // 5. Assemble and serialize
    let document = assemble(&transactions, schema, &ruleset.static_fields, &options.assemble);
    let xml = to_xml_string(&document, WriteOptions::from(&options.assemble))?;

    Ok(UnitOutput { xml, stats, report })
}

/// Read a file with the department's reader settings and convert it.
pub fn convert_file(
    path: &Path,
    department: &DepartmentConfig,
    schema: &Schema,
    continue_on_error: bool,
) -> PipelineResult<UnitOutput> {
    let record_set = parser::read_file(path, &department.csv_settings)?;
    log_info(format!(
        "Read {} record(s) ({} columns, encoding {}, delimiter '{}')",
        record_set.records.len(),
        record_set.headers.len(),
        record_set.encoding,
        format_delimiter(record_set.delimiter)
    ));

    let options = UnitOptions::for_department(department, continue_on_error);
    convert_records(record_set.records, schema, &department.ruleset, &options)
}

pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
