//! Domain models for the ledgerxml conversion pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Schema`] - Immutable field-mapping table, shared read-only by every unit
//! - [`FieldMapping`] - One old-header to output-tag rule
//! - [`ParentLevel`] - Nesting level of a field (root, transaction, line item)
//! - [`Requirement`] / [`DataType`] - Validation constraints of a field
//! - [`StaticField`] - Constant output element configured per department
//! - [`Record`] / [`LineItem`] / [`Transaction`] - Per-unit working data

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{SchemaError, SchemaResult};

/// Field values of one record or line item, keyed by source column name.
pub type Fields = HashMap<String, String>;

/// Default output tag of the document root.
pub const DEFAULT_ROOT_ELEMENT: &str = "cashbook";
/// Default output tag of a transaction element.
pub const DEFAULT_TRANSACTION_ELEMENT: &str = "transaction";
/// Default output tag of a line item element.
pub const DEFAULT_LINE_ITEM_ELEMENT: &str = "lineItem";

// =============================================================================
// Parent Level
// =============================================================================

/// Nesting level an output field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParentLevel {
    /// Direct child of the document root.
    Root,
    /// Child of each transaction element.
    #[default]
    Transaction,
    /// Child of each line item element.
    LineItem,
}

impl ParentLevel {
    /// Parse a parent tag, returning `None` for unknown tags.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "cashbook" | "root" => Some(Self::Root),
            "transaction" | "txn" => Some(Self::Transaction),
            "lineitem" | "line_item" | "item" => Some(Self::LineItem),
            _ => None,
        }
    }

    /// Parse a parent tag, defaulting unknown tags to [`ParentLevel::LineItem`].
    pub fn from_tag(tag: &str) -> Self {
        Self::parse(tag).unwrap_or(Self::LineItem)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "cashbook",
            Self::Transaction => "transaction",
            Self::LineItem => "lineItem",
        }
    }
}

impl TryFrom<String> for ParentLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown parent tag '{}'", value))
    }
}

impl From<ParentLevel> for String {
    fn from(level: ParentLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for ParentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Requirement
// =============================================================================

/// Whether a field must carry a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Required,
    #[default]
    Optional,
    /// Required only when the field's condition expression holds.
    Conditional,
}

impl Requirement {
    /// Parse the spellings found in legacy templates. Unknown values are optional.
    pub fn from_alias(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "required" | "req" | "r" | "yes" | "y" | "true" | "1" | "mandatory" => Self::Required,
            "conditional" | "cond" | "c" | "if" => Self::Conditional,
            _ => Self::Optional,
        }
    }
}

// =============================================================================
// Data Type
// =============================================================================

/// Declared type of a field value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataType {
    /// Any text. Unknown declared types fall back to this.
    #[default]
    String,
    /// Base-10 integer.
    Numeric,
    /// Floating point, optionally bounded in fractional digits.
    Decimal { precision: Option<u32> },
    /// Letters, digits and spaces.
    Alphanumeric,
    /// Letters and spaces.
    Alpha,
    /// Date, parsed against `format` or a list of common formats.
    Date { format: Option<String> },
    /// One of a fixed set of boolean tokens.
    Boolean,
}

impl DataType {
    /// Parse a declared type such as `decimal(2)` or `date(YYYY-MM-DD)`.
    ///
    /// The type name is matched case-insensitively against its aliases; the
    /// parenthesized parameter is kept verbatim.
    pub fn parse(declared: &str) -> Self {
        let declared = declared.trim();
        let (name, param) = match declared.find('(') {
            Some(open) => {
                let close = declared.rfind(')').filter(|&c| c > open).unwrap_or(declared.len());
                let param = declared[open + 1..close].trim();
                (&declared[..open], (!param.is_empty()).then_some(param))
            }
            None => (declared, None),
        };

        match name.trim().to_lowercase().as_str() {
            "numeric" | "num" | "number" | "int" | "integer" => Self::Numeric,
            "decimal" | "dec" | "float" | "double" | "money" | "currency" => Self::Decimal {
                precision: param.and_then(|p| p.parse().ok()),
            },
            "alphanumeric" | "alphanum" | "an" => Self::Alphanumeric,
            "alpha" | "a" | "letters" => Self::Alpha,
            "date" => Self::Date {
                format: param.map(String::from),
            },
            "boolean" | "bool" | "bit" => Self::Boolean,
            _ => Self::String,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Numeric => write!(f, "numeric"),
            Self::Decimal { precision: Some(p) } => write!(f, "decimal({})", p),
            Self::Decimal { precision: None } => write!(f, "decimal"),
            Self::Alphanumeric => write!(f, "alphanumeric"),
            Self::Alpha => write!(f, "alpha"),
            Self::Date { format: Some(fmt) } => write!(f, "date({})", fmt),
            Self::Date { format: None } => write!(f, "date"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

// =============================================================================
// Field Mapping & Schema
// =============================================================================

/// Whether `name` matches the XML 1.0 `Name` production.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Mapping of one source column to one output element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Column name in the legacy export.
    pub source_key: String,
    /// Output element name.
    pub output_tag: String,
    pub parent: ParentLevel,
    pub data_type: DataType,
    /// Maximum length in characters, 0 = unbounded.
    pub max_length: usize,
    pub requirement: Requirement,
    /// Condition expression for [`Requirement::Conditional`] fields.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    /// Emission order within the parent.
    pub order: usize,
}

impl FieldMapping {
    /// Create an optional string mapping at `parent`.
    pub fn new(source_key: impl Into<String>, output_tag: impl Into<String>, parent: ParentLevel) -> Self {
        Self {
            source_key: source_key.into(),
            output_tag: output_tag.into(),
            parent,
            data_type: DataType::String,
            max_length: 0,
            requirement: Requirement::Optional,
            condition: String::new(),
            order: 0,
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Required;
        self
    }

    pub fn conditional(mut self, condition: impl Into<String>) -> Self {
        self.requirement = Requirement::Conditional;
        self.condition = condition.into();
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

/// Immutable field-mapping table.
///
/// Built once per run and shared read-only across all concurrent units.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub name: String,
    mappings: HashMap<String, FieldMapping>,
    root_keys: Vec<String>,
    transaction_keys: Vec<String>,
    line_item_keys: Vec<String>,
    pub root_element: String,
    pub transaction_element: String,
    pub line_item_element: String,
}

impl Schema {
    /// Build a schema from mappings, indexing keys per level by ascending order.
    pub fn new(name: impl Into<String>, mappings: Vec<FieldMapping>) -> SchemaResult<Self> {
        let mut by_key = HashMap::with_capacity(mappings.len());
        let mut ordered: Vec<(ParentLevel, usize, String)> = Vec::with_capacity(mappings.len());

        for mapping in mappings {
            if by_key.contains_key(&mapping.source_key) {
                return Err(SchemaError::DuplicateKey(mapping.source_key));
            }
            if !is_xml_name(&mapping.output_tag) {
                return Err(SchemaError::InvalidTag {
                    field: mapping.source_key,
                    tag: mapping.output_tag,
                });
            }
            ordered.push((mapping.parent, mapping.order, mapping.source_key.clone()));
            by_key.insert(mapping.source_key.clone(), mapping);
        }

        // Stable: equal orders keep template row order.
        ordered.sort_by_key(|(_, order, _)| *order);

        let keys_at = |level: ParentLevel| -> Vec<String> {
            ordered
                .iter()
                .filter(|(parent, _, _)| *parent == level)
                .map(|(_, _, key)| key.clone())
                .collect()
        };

        Ok(Self {
            name: name.into(),
            root_keys: keys_at(ParentLevel::Root),
            transaction_keys: keys_at(ParentLevel::Transaction),
            line_item_keys: keys_at(ParentLevel::LineItem),
            mappings: by_key,
            root_element: DEFAULT_ROOT_ELEMENT.to_string(),
            transaction_element: DEFAULT_TRANSACTION_ELEMENT.to_string(),
            line_item_element: DEFAULT_LINE_ITEM_ELEMENT.to_string(),
        })
    }

    pub fn get(&self, source_key: &str) -> Option<&FieldMapping> {
        self.mappings.get(source_key)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mappings at `level` in emission order.
    pub fn fields_at(&self, level: ParentLevel) -> impl Iterator<Item = &FieldMapping> {
        let keys = match level {
            ParentLevel::Root => &self.root_keys,
            ParentLevel::Transaction => &self.transaction_keys,
            ParentLevel::LineItem => &self.line_item_keys,
        };
        keys.iter().filter_map(|key| self.mappings.get(key))
    }

    /// All mappings: root, then transaction, then line item, each in order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields_at(ParentLevel::Root)
            .chain(self.fields_at(ParentLevel::Transaction))
            .chain(self.fields_at(ParentLevel::LineItem))
    }
}

// =============================================================================
// Static Fields
// =============================================================================

/// A constant element emitted at a fixed level of every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticField {
    pub xml_tag: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub parent_tag: ParentLevel,
}

// =============================================================================
// Working Data
// =============================================================================

/// One flat input record with its 1-based source row number.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row_number: usize,
    pub fields: Fields,
}

impl Record {
    pub fn new(row_number: usize, fields: Fields) -> Self {
        Self { row_number, fields }
    }
}

/// One leaf-level output element.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    /// Index within the unit, assigned by the numbering pre-pass (0 until then).
    pub id: usize,
    /// Source row of the record this line item came from.
    pub source_row: usize,
    pub fields: Fields,
}

/// A group of line items sharing a grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// 1-based position within the unit.
    pub id: usize,
    pub group_key: String,
    pub line_items: Vec<LineItem>,
}

impl Transaction {
    /// First line item, the source of transaction-level field values.
    pub fn first_line_item(&self) -> Option<&LineItem> {
        self.line_items.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_aliases() {
        assert_eq!(DataType::parse("INT"), DataType::Numeric);
        assert_eq!(DataType::parse("money"), DataType::Decimal { precision: None });
        assert_eq!(DataType::parse("decimal(2)"), DataType::Decimal { precision: Some(2) });
        assert_eq!(DataType::parse("AN"), DataType::Alphanumeric);
        assert_eq!(DataType::parse("bit"), DataType::Boolean);
        assert_eq!(DataType::parse("varchar"), DataType::String);
        assert_eq!(DataType::parse("something-else"), DataType::String);
    }

    #[test]
    fn test_date_format_keeps_case() {
        assert_eq!(
            DataType::parse("Date(YYYY-MM-DD)"),
            DataType::Date { format: Some("YYYY-MM-DD".to_string()) }
        );
        assert_eq!(DataType::parse("date"), DataType::Date { format: None });
        assert_eq!(DataType::parse("date()"), DataType::Date { format: None });
    }

    #[test]
    fn test_requirement_aliases() {
        assert_eq!(Requirement::from_alias("Mandatory"), Requirement::Required);
        assert_eq!(Requirement::from_alias("Y"), Requirement::Required);
        assert_eq!(Requirement::from_alias("cond"), Requirement::Conditional);
        assert_eq!(Requirement::from_alias(""), Requirement::Optional);
        assert_eq!(Requirement::from_alias("maybe"), Requirement::Optional);
    }

    #[test]
    fn test_parent_level_parsing() {
        assert_eq!(ParentLevel::parse("Cashbook"), Some(ParentLevel::Root));
        assert_eq!(ParentLevel::parse("lineItem"), Some(ParentLevel::LineItem));
        assert_eq!(ParentLevel::parse("header"), None);
        assert_eq!(ParentLevel::from_tag("header"), ParentLevel::LineItem);
    }

    #[test]
    fn test_static_field_parent_defaults_to_transaction() {
        let field: StaticField = serde_json::from_str(r#"{"xml_tag": "Source", "value": "LEGACY"}"#).unwrap();
        assert_eq!(field.parent_tag, ParentLevel::Transaction);

        let bad = serde_json::from_str::<StaticField>(r#"{"xml_tag": "X", "parent_tag": "nowhere"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_schema_orders_fields_per_level() {
        let schema = Schema::new(
            "t",
            vec![
                FieldMapping::new("Amount", "Amount", ParentLevel::LineItem).with_order(5),
                FieldMapping::new("Check", "CheckNo", ParentLevel::Transaction).with_order(1),
                FieldMapping::new("Memo", "Memo", ParentLevel::LineItem).with_order(2),
                FieldMapping::new("Batch", "Batch", ParentLevel::Root).with_order(0),
            ],
        )
        .unwrap();

        let items: Vec<&str> = schema
            .fields_at(ParentLevel::LineItem)
            .map(|m| m.output_tag.as_str())
            .collect();
        assert_eq!(items, vec!["Memo", "Amount"]);

        let all: Vec<&str> = schema.iter_ordered().map(|m| m.source_key.as_str()).collect();
        assert_eq!(all, vec!["Batch", "Check", "Memo", "Amount"]);
        assert_eq!(schema.root_element, "cashbook");
    }

    #[test]
    fn test_schema_rejects_duplicate_keys() {
        let result = Schema::new(
            "dup",
            vec![
                FieldMapping::new("A", "A", ParentLevel::LineItem),
                FieldMapping::new("A", "B", ParentLevel::LineItem),
            ],
        );
        assert!(matches!(result, Err(SchemaError::DuplicateKey(key)) if key == "A"));
    }

    #[test]
    fn test_schema_rejects_invalid_tags() {
        let result = Schema::new("bad", vec![FieldMapping::new("Check Number", "Check Number", ParentLevel::Transaction)]);
        assert!(matches!(result, Err(SchemaError::InvalidTag { tag, .. }) if tag == "Check Number"));
    }

    #[test]
    fn test_xml_names() {
        for name in ["CheckNo", "_id", "ns:Amount", "line-item.2", "Café", "日付"] {
            assert!(is_xml_name(name), "{}", name);
        }
        for name in ["", "Check Number", "1st", "-x", "a<b", "a&b", "tab\t"] {
            assert!(!is_xml_name(name), "{}", name);
        }
    }
}
