//! Schema-driven validation of transformed line items.
//!
//! Every schema field is checked on every line item, in schema order (root,
//! transaction, then line-item fields). Findings are accumulated, never thrown:
//!
//! ```text
//! [ERROR] Transaction 1, LineItem 2, Field 'Amount': Value 'abc' is not a valid decimal number (value: 'abc')
//! ```
//!
//! Per field, checks run in a fixed order and stop at the first that applies:
//! conditional requirement (conditional fields only), required-and-empty,
//! empty optional, max length, data type.

use serde::Serialize;
use std::fmt;

use crate::condition;
use crate::models::{DataType, FieldMapping, Fields, Requirement, Schema, Transaction};
use crate::transform::dsl::dates;

const BOOLEAN_TOKENS: &[&str] = &["true", "false", "yes", "no", "1", "0", "y", "n", "t", "f"];

// =============================================================================
// Findings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// The check a finding comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Required,
    ConditionalRequired,
    MaxLength,
    DataType,
    ConditionUnrecognized,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::ConditionalRequired => "conditional_required",
            Rule::MaxLength => "max_length",
            Rule::DataType => "data_type",
            Rule::ConditionUnrecognized => "condition_unrecognized",
        }
    }
}

/// One validation problem with its full location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFinding {
    pub severity: Severity,
    /// Source column of the field.
    pub field: String,
    pub value: String,
    pub rule: Rule,
    pub message: String,
    pub transaction_id: usize,
    pub line_item_id: usize,
    /// Source row of the line item.
    pub row_number: usize,
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Transaction {}, LineItem {}, Field '{}': {} (value: '{}')",
            self.severity, self.transaction_id, self.line_item_id, self.field, self.message, self.value
        )
    }
}

/// Where the value under validation lives.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub transaction_id: usize,
    pub line_item_id: usize,
    pub row_number: usize,
    /// All fields of the current line item, for condition evaluation.
    pub fields: &'a Fields,
}

impl<'a> FieldContext<'a> {
    fn finding(
        &self,
        severity: Severity,
        mapping: &FieldMapping,
        value: &str,
        rule: Rule,
        message: String,
    ) -> ValidationFinding {
        ValidationFinding {
            severity,
            field: mapping.source_key.clone(),
            value: value.to_string(),
            rule,
            message,
            transaction_id: self.transaction_id,
            line_item_id: self.line_item_id,
            row_number: self.row_number,
        }
    }
}

// =============================================================================
// Field Validation
// =============================================================================

/// Validate one value against its mapping.
pub fn validate_field(value: &str, mapping: &FieldMapping, ctx: &FieldContext<'_>) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    // An empty condition makes the field plain optional.
    if mapping.requirement == Requirement::Conditional && !mapping.condition.trim().is_empty() {
        if !condition::is_recognized(&mapping.condition) {
            findings.push(ctx.finding(
                Severity::Warning,
                mapping,
                value,
                Rule::ConditionUnrecognized,
                format!(
                    "Condition '{}' is not a recognized expression and is treated as not met",
                    mapping.condition
                ),
            ));
        } else if value.is_empty() && condition::evaluate(&mapping.condition, ctx.fields) {
            findings.push(ctx.finding(
                Severity::Error,
                mapping,
                value,
                Rule::ConditionalRequired,
                format!("Field '{}' is required when: {}", mapping.output_tag, mapping.condition),
            ));
            return findings;
        }
    }

    if mapping.is_required() && value.is_empty() {
        findings.push(ctx.finding(
            Severity::Error,
            mapping,
            value,
            Rule::Required,
            format!("Required field '{}' is empty", mapping.output_tag),
        ));
        return findings;
    }

    if value.is_empty() {
        return findings;
    }

    let length = value.chars().count();
    if mapping.max_length > 0 && length > mapping.max_length {
        findings.push(ctx.finding(
            Severity::Error,
            mapping,
            value,
            Rule::MaxLength,
            format!(
                "Value exceeds maximum length of {} characters (actual: {})",
                mapping.max_length, length
            ),
        ));
        return findings;
    }

    if let Err(message) = check_data_type(value, &mapping.data_type) {
        findings.push(ctx.finding(Severity::Error, mapping, value, Rule::DataType, message));
    }

    findings
}

/// Check a non-empty value against a declared type.
pub fn check_data_type(value: &str, data_type: &DataType) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    match data_type {
        DataType::String => Ok(()),
        DataType::Numeric => trimmed
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("Value '{}' is not a whole number", trimmed)),
        DataType::Decimal { precision } => {
            if trimmed.parse::<f64>().is_err() {
                return Err(format!("Value '{}' is not a valid decimal number", trimmed));
            }
            let places = trimmed.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0);
            match precision {
                Some(max) if places > *max as usize => Err(format!(
                    "Value '{}' has {} decimal places, at most {} allowed",
                    trimmed, places, max
                )),
                _ => Ok(()),
            }
        }
        DataType::Alphanumeric => {
            if trimmed.chars().all(|c| c.is_alphanumeric() || c.is_whitespace()) {
                Ok(())
            } else {
                Err(format!("Value '{}' may only contain letters, digits and spaces", trimmed))
            }
        }
        DataType::Alpha => {
            if trimmed.chars().all(|c| c.is_alphabetic() || c.is_whitespace()) {
                Ok(())
            } else {
                Err(format!("Value '{}' may only contain letters and spaces", trimmed))
            }
        }
        DataType::Date { format: Some(format) } => match dates::parse_with(trimmed, format) {
            Some(_) => Ok(()),
            None => Err(format!("Value '{}' does not match date format '{}'", trimmed, format)),
        },
        DataType::Date { format: None } => {
            if dates::matches_common_format(trimmed) {
                Ok(())
            } else {
                Err(format!("Value '{}' is not a recognized date", trimmed))
            }
        }
        DataType::Boolean => {
            if BOOLEAN_TOKENS.contains(&trimmed.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!("Value '{}' is not a boolean (true/false, yes/no, 1/0, y/n, t/f)", trimmed))
            }
        }
    }
}

// =============================================================================
// Unit Validation
// =============================================================================

/// Validation policy for a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Stop at the first error-severity finding.
    pub stop_on_first_error: bool,
    /// Report warnings with error severity.
    pub treat_warnings_as_errors: bool,
    /// Skip optional fields entirely.
    pub skip_optional: bool,
}

/// All findings for one unit plus counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<ValidationFinding>,
    pub error_count: usize,
    pub warning_count: usize,
    pub fields_validated: usize,
    pub transactions_validated: usize,
}

impl ValidationReport {
    /// No error-severity findings.
    pub fn is_valid(&self) -> bool {
        self.error_count == 0
    }

    fn push(&mut self, mut finding: ValidationFinding, options: &ValidationOptions) {
        if options.treat_warnings_as_errors {
            finding.severity = Severity::Error;
        }
        match finding.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        self.findings.push(finding);
    }

    /// Render every finding as a numbered block.
    pub fn format(&self) -> String {
        if self.findings.is_empty() {
            return "No validation errors.".to_string();
        }

        let mut out = format!(
            "Validation completed with {} error(s) and {} warning(s):\n\n",
            self.error_count, self.warning_count
        );
        for (index, finding) in self.findings.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", index + 1, finding));
        }
        out
    }
}

/// Validates transactions against a schema.
#[derive(Debug, Clone)]
pub struct Validator<'a> {
    schema: &'a Schema,
    options: ValidationOptions,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema, options: ValidationOptions::default() }
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate every line item of every transaction.
    ///
    /// Line items should already carry their numbering so findings cite the
    /// same ids as the output document.
    pub fn validate(&self, transactions: &[Transaction]) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mappings: Vec<&FieldMapping> = self
            .schema
            .iter_ordered()
            .filter(|m| !(self.options.skip_optional && m.requirement == Requirement::Optional))
            .collect();

        for transaction in transactions {
            report.transactions_validated += 1;

            for item in &transaction.line_items {
                let ctx = FieldContext {
                    transaction_id: transaction.id,
                    line_item_id: item.id,
                    row_number: item.source_row,
                    fields: &item.fields,
                };

                for mapping in &mappings {
                    let value = item.fields.get(&mapping.source_key).map(String::as_str).unwrap_or("");
                    report.fields_validated += 1;

                    for finding in validate_field(value, mapping, &ctx) {
                        report.push(finding, &self.options);
                        if self.options.stop_on_first_error && report.error_count > 0 {
                            return report;
                        }
                    }
                }
            }
        }

        report
    }
}
