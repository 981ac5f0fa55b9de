//! Department ruleset definition
//!
//! The ruleset defines how records are grouped, how field values are
//! transformed, and which constant elements are added to every document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::actions::Action;
use crate::error::{ConfigError, ConfigResult};
use crate::models::StaticField;

/// Ordered action chain for one source field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRule {
    /// Source column the chain applies to
    pub field: String,

    /// Actions, applied left to right
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl TransformationRule {
    pub fn new(field: impl Into<String>, actions: Vec<Action>) -> Self {
        Self { field: field.into(), actions }
    }
}

/// Sort direction for line items within a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

/// How records become transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionGrouping {
    /// Grouping key column; empty = one transaction per record
    #[serde(default)]
    pub group_by_field: String,

    /// Optional line item sort column within each transaction
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sort_by_field: String,

    #[serde(default)]
    pub sort_order: SortOrder,
}

/// A complete department ruleset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(default)]
    pub transaction_grouping: TransactionGrouping,

    /// Field transformations, applied in this order
    #[serde(default)]
    pub transformation_rules: Vec<TransformationRule>,

    /// Constant elements added to every document
    #[serde(default)]
    pub static_fields: Vec<StaticField>,
}

impl Ruleset {
    /// Create an empty ruleset
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ruleset from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn group_by_field(&self) -> &str {
        &self.transaction_grouping.group_by_field
    }

    /// Builder: set the grouping key
    pub fn grouped_by(mut self, field: impl Into<String>) -> Self {
        self.transaction_grouping.group_by_field = field.into();
        self
    }

    /// Builder: append a transformation rule
    pub fn with_rule(mut self, field: impl Into<String>, actions: Vec<Action>) -> Self {
        self.transformation_rules.push(TransformationRule::new(field, actions));
        self
    }

    /// Builder: append a static field
    pub fn with_static_field(mut self, field: StaticField) -> Self {
        self.static_fields.push(field);
        self
    }

    /// All source columns the ruleset reads
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut fields: BTreeSet<String> = self
            .transformation_rules
            .iter()
            .map(|rule| rule.field.clone())
            .collect();

        for grouping_field in [
            &self.transaction_grouping.group_by_field,
            &self.transaction_grouping.sort_by_field,
        ] {
            if !grouping_field.is_empty() {
                fields.insert(grouping_field.clone());
            }
        }

        fields.into_iter().collect()
    }

    /// Reject actions that would fail at apply time: unknown kinds, regex
    /// patterns that do not compile, parameters that cannot be rendered.
    pub fn validate(&self, department: &str) -> ConfigResult<()> {
        for rule in &self.transformation_rules {
            for (index, action) in rule.actions.iter().enumerate() {
                action.check().map_err(|source| ConfigError::InvalidAction {
                    department: department.to_string(),
                    field: rule.field.clone(),
                    index,
                    source,
                })?;
            }
        }
        Ok(())
    }
}

/// Generate an example ruleset for documentation
pub fn example_ruleset() -> Ruleset {
    let json = r#"{
        "transaction_grouping": { "group_by_field": "Check Number" },
        "transformation_rules": [
            {
                "field": "Check Number",
                "actions": [
                    { "type": "extract_digits" },
                    { "type": "pad_zeros_to_length", "value": "9" },
                    { "type": "prepend_string", "value": "C" }
                ]
            },
            {
                "field": "Check Date",
                "actions": [
                    { "type": "format_date", "value": "MM/DD/YYYY|YYYY-MM-DD" }
                ]
            },
            {
                "field": "Amount",
                "actions": [
                    { "type": "replace", "find": ",", "value": "" },
                    { "type": "format_number", "value": "2" }
                ]
            }
        ],
        "static_fields": [
            { "xml_tag": "SourceSystem", "value": "LEGACY", "parent_tag": "cashbook" }
        ]
    }"#;

    // Embedded literal; covered by tests.
    serde_json::from_str(json).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::transform::dsl::actions::Pattern;
    use crate::models::ParentLevel;

    #[test]
    fn test_parse_ruleset() {
        let json = r#"{
            "transaction_grouping": { "group_by_field": "Check", "sort_by_field": "Line", "sort_order": "desc" },
            "transformation_rules": [
                { "field": "Amount", "actions": [ { "type": "format_currency" } ] }
            ],
            "static_fields": [ { "xml_tag": "Origin", "value": "X" } ]
        }"#;

        let ruleset = Ruleset::from_json(json).unwrap();
        assert_eq!(ruleset.group_by_field(), "Check");
        assert_eq!(ruleset.transaction_grouping.sort_order, SortOrder::Desc);
        assert_eq!(ruleset.transformation_rules[0].actions, vec![Action::FormatCurrency]);
        assert_eq!(ruleset.static_fields[0].parent_tag, ParentLevel::Transaction);
    }

    #[test]
    fn test_empty_ruleset_defaults() {
        let ruleset = Ruleset::from_json("{}").unwrap();
        assert!(ruleset.group_by_field().is_empty());
        assert!(ruleset.transformation_rules.is_empty());
    }

    #[test]
    fn test_roundtrip_json() {
        let ruleset = example_ruleset();
        let json = ruleset.to_json().unwrap();
        let parsed = Ruleset::from_json(&json).unwrap();
        assert_eq!(parsed, ruleset);
    }

    #[test]
    fn test_example_ruleset_is_valid() {
        let ruleset = example_ruleset();
        assert_eq!(ruleset.transformation_rules.len(), 3);
        assert!(ruleset.validate("example").is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_kind() {
        let ruleset = Ruleset::new().with_rule(
            "Amount",
            vec![Action::Trim, Action::Unknown("explode".into())],
        );
        match ruleset.validate("Finance") {
            Err(ConfigError::InvalidAction { field, index, source, .. }) => {
                assert_eq!(field, "Amount");
                assert_eq!(index, 1);
                assert!(matches!(source, TransformError::UnknownActionKind(_)));
            }
            other => panic!("expected InvalidAction, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let ruleset = Ruleset::new().with_rule(
            "Memo",
            vec![Action::RegexReplace { pattern: Pattern::new("("), with: String::new() }],
        );
        assert!(ruleset.validate("Finance").is_err());
    }

    #[test]
    fn test_validate_rejects_unrenderable_parameters() {
        let json = r#"{
            "transformation_rules": [
                { "field": "Amount", "actions": [ { "type": "format_number", "value": "70000" } ] }
            ]
        }"#;
        match Ruleset::from_json(json).unwrap().validate("Finance") {
            Err(ConfigError::InvalidAction { field, source, .. }) => {
                assert_eq!(field, "Amount");
                assert!(matches!(source, TransformError::InvalidParameter { .. }));
            }
            other => panic!("expected InvalidAction, got {:?}", other),
        }

        let json = r#"{
            "transformation_rules": [
                { "field": "Check Date", "actions": [ { "type": "format_date", "value": "%Y-%m-%d|%Y-%m-%d %z" } ] }
            ]
        }"#;
        assert!(Ruleset::from_json(json).unwrap().validate("Finance").is_err());
    }

    #[test]
    fn test_referenced_fields() {
        let ruleset = example_ruleset();
        assert_eq!(
            ruleset.referenced_fields(),
            vec!["Amount".to_string(), "Check Date".to_string(), "Check Number".to_string()]
        );
    }
}
