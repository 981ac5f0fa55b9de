//! Template reader: mapping tables to [`Schema`] values.
//!
//! A template is a table with one row per source column:
//!
//! ```text
//! old header | xml tag | parent tag | data type | max length | required | conditional rule | order
//! ```
//!
//! Delimited templates (`.csv`, `.tsv`) carry a header row that is skipped.
//! JSON templates are an array of row objects using the snake_case column
//! names (`source_key`, `xml_tag`, `parent_tag`, `data_type`, `max_length`,
//! `required`, `condition`, `order`).

pub mod registry;

use serde::{Deserialize, Deserializer};
use std::path::Path;

use crate::condition;
use crate::error::{SchemaError, SchemaResult};
use crate::models::{is_xml_name, DataType, FieldMapping, ParentLevel, Requirement, Schema};

pub use registry::{TemplateRegistry, TemplateRule};

/// One raw template row, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemplateRow {
    #[serde(alias = "old_header", alias = "sourceKey")]
    pub source_key: String,
    #[serde(alias = "xmlTag")]
    pub xml_tag: String,
    #[serde(alias = "parent", alias = "parentTag")]
    pub parent_tag: String,
    #[serde(alias = "type", alias = "dataType")]
    pub data_type: String,
    #[serde(alias = "maxLength", deserialize_with = "text_or_number")]
    pub max_length: String,
    #[serde(alias = "requirement", deserialize_with = "text_or_number")]
    pub required: String,
    #[serde(alias = "conditional_rule", alias = "conditionalRule")]
    pub condition: String,
    #[serde(deserialize_with = "text_or_number")]
    pub order: String,
}

impl TemplateRow {
    fn from_cells(cells: &csv::StringRecord) -> Self {
        let cell = |i: usize| cells.get(i).unwrap_or("").trim().to_string();
        Self {
            source_key: cell(0),
            xml_tag: cell(1),
            parent_tag: cell(2),
            data_type: cell(3),
            max_length: cell(4),
            required: cell(5),
            condition: cell(6),
            order: cell(7),
        }
    }

    /// Normalize into a mapping; `None` for rows without a source key.
    fn into_mapping(self, index: usize) -> Option<FieldMapping> {
        let source_key = self.source_key.trim().to_string();
        if source_key.is_empty() {
            return None;
        }

        let output_tag = match self.xml_tag.trim() {
            "" => source_key.clone(),
            tag => tag.to_string(),
        };

        Some(FieldMapping {
            output_tag,
            parent: ParentLevel::from_tag(&self.parent_tag),
            data_type: DataType::parse(&self.data_type),
            max_length: self.max_length.trim().parse().unwrap_or(0),
            requirement: Requirement::from_alias(&self.required),
            condition: self.condition.trim().to_string(),
            order: self.order.trim().parse().unwrap_or(index),
            source_key,
        })
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
        Null(()),
    }

    Ok(match Cell::deserialize(deserializer)? {
        Cell::Text(s) => s,
        Cell::Int(n) => n.to_string(),
        Cell::Float(n) => n.to_string(),
        Cell::Bool(b) => b.to_string(),
        Cell::Null(()) => String::new(),
    })
}

/// Read a template file, choosing the format from the extension.
pub fn read_template(path: impl AsRef<Path>) -> SchemaResult<Schema> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("template")
        .to_string();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => parse_delimited(&content, b',', name),
        "tsv" | "txt" => parse_delimited(&content, b'\t', name),
        "json" => parse_json(&content, name),
        other => Err(SchemaError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse a delimited template whose first row is a header.
pub fn parse_delimited(content: &str, delimiter: u8, name: impl Into<String>) -> SchemaResult<Schema> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(TemplateRow::from_cells(&record?));
    }
    build_schema(name, rows)
}

/// Parse a JSON template: an array of row objects.
pub fn parse_json(content: &str, name: impl Into<String>) -> SchemaResult<Schema> {
    let rows: Vec<TemplateRow> = serde_json::from_str(content)?;
    build_schema(name, rows)
}

/// Normalize rows and build the schema.
pub fn build_schema(name: impl Into<String>, rows: Vec<TemplateRow>) -> SchemaResult<Schema> {
    let name = name.into();
    let mut mappings: Vec<FieldMapping> = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let Some(mapping) = row.into_mapping(index) else {
            continue;
        };
        if !is_xml_name(&mapping.output_tag) {
            return Err(SchemaError::InvalidRow {
                row: index + 1,
                message: format!(
                    "'{}' is not a valid XML element name; set the XML Tag column for '{}'",
                    mapping.output_tag, mapping.source_key
                ),
            });
        }
        mappings.push(mapping);
    }

    if mappings.is_empty() {
        return Err(SchemaError::Empty);
    }

    for mapping in &mappings {
        if mapping.requirement == Requirement::Conditional
            && !mapping.condition.is_empty()
            && !condition::is_recognized(&mapping.condition)
        {
            tracing::warn!(
                template = %name,
                field = %mapping.source_key,
                condition = %mapping.condition,
                "Unrecognized condition; the field will never be conditionally required"
            );
        }
    }

    Schema::new(name, mappings)
}
