//! Field-level transformation actions.
//!
//! Rulesets spell actions the way department configs always have:
//!
//! ```json
//! { "type": "pad_zeros_to_length", "value": "9" }
//! { "type": "regex_replace", "find": "[^0-9]", "value": "" }
//! { "type": "lookup_with_default", "lookup_table": { "CHK": "Check" }, "value": "Other" }
//! ```
//!
//! That raw form ([`ActionSpec`]) is converted into the closed [`Action`] enum
//! on load, parsing numeric parameters once. Kinds the engine does not know
//! become [`Action::Unknown`], which ruleset validation rejects and which
//! fails with `UnknownActionKind` if it is ever applied.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::dates;
use crate::condition;
use crate::error::{TransformError, TransformResult};
use crate::models::Fields;

const DEFAULT_TRIM_SET: &str = " \t\n\r";

/// Upper bound for `format_number` places.
pub const MAX_DECIMAL_PLACES: usize = 20;

/// Raw action as written in a department config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub find: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lookup_table: BTreeMap<String, String>,
}

/// All transformation actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ActionSpec", into = "ActionSpec")]
pub enum Action {
    PrependString(String),
    AppendString(String),

    /// Remove surrounding whitespace
    Trim,
    /// Remove leading characters in the set (whitespace by default)
    TrimLeft(String),
    /// Remove trailing characters in the set (whitespace by default)
    TrimRight(String),

    Uppercase,
    Lowercase,
    TitleCase,

    /// Literal replace of all occurrences
    Replace { find: String, with: String },
    /// Regex replace of all occurrences, `$1` style group references allowed
    RegexReplace { pattern: Pattern, with: String },

    /// Character range `start..end`, `None` when the parameter is malformed
    Substring(Option<(i64, i64)>),

    /// Left-pad with `'0'`, 0 = no-op
    PadZerosToLength(usize),
    /// Right-pad with spaces, 0 = no-op
    PadSpacesToLength(usize),
    /// Truncate right or left-pad with `'0'` to exactly this length, 0 = no-op
    EnsureLength(usize),

    /// Fixed decimal places, `None` when the parameter is malformed
    FormatNumber(Option<usize>),
    FormatCurrency,
    RemoveLeadingZeros,

    /// `input|output` date patterns, `None` when the parameter is malformed
    FormatDate(Option<(String, String)>),

    Lookup(BTreeMap<String, String>),
    LookupWithDefault { table: BTreeMap<String, String>, default: String },

    /// Substitute `value` when `condition` holds
    Conditional { condition: String, value: String },
    IfEmptyUseDefault(String),
    IfEmptyUseField(String),

    ExtractDigits,
    ExtractLetters,
    RemoveSpecialChars,
    NormalizeWhitespace,

    /// A kind this engine does not implement
    Unknown(String),
}

/// Action kinds with their parameter conventions, in documentation order.
pub const ACTION_KINDS: &[(&str, &str)] = &[
    ("prepend_string", "value: text to add before"),
    ("append_string", "value: text to add after"),
    ("trim", "remove surrounding whitespace"),
    ("trim_left", "value: characters to strip (default whitespace)"),
    ("trim_right", "value: characters to strip (default whitespace)"),
    ("uppercase", "convert to uppercase"),
    ("lowercase", "convert to lowercase"),
    ("title_case", "capitalize each word"),
    ("replace", "find: literal text, value: replacement"),
    ("regex_replace", "find: regex pattern, value: replacement"),
    ("substring", "value: \"start,end\" (0-based, end exclusive)"),
    ("pad_zeros_to_length", "value: target length, pads left with 0"),
    ("pad_spaces_to_length", "value: target length, pads right with spaces"),
    ("ensure_length", "value: exact length, truncates right or pads left with 0"),
    ("format_number", "value: decimal places"),
    ("format_currency", "two decimal places"),
    ("remove_leading_zeros", "strip leading zeros, empty becomes 0"),
    ("format_date", "value: \"input|output\" patterns"),
    ("lookup", "lookup_table: exact matches, misses pass through"),
    ("lookup_with_default", "lookup_table, value: default for misses"),
    ("conditional", "condition: expression, value: substitute when true"),
    ("if_empty_use_default", "value: substitute when empty"),
    ("if_empty_use_field", "value: field to copy when empty"),
    ("extract_digits", "keep digits only"),
    ("extract_letters", "keep letters only"),
    ("remove_special_chars", "keep letters and digits only"),
    ("normalize_whitespace", "collapse whitespace runs and trim"),
];

fn parse_length(value: &str) -> usize {
    value.trim().parse::<i64>().ok().filter(|n| *n > 0).map(|n| n as usize).unwrap_or(0)
}

fn parse_range(value: &str) -> Option<(i64, i64)> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 2 {
        return None;
    }
    let bound = |s: &str| s.trim().parse::<i64>().unwrap_or(0);
    Some((bound(parts[0]), bound(parts[1])))
}

impl From<ActionSpec> for Action {
    fn from(spec: ActionSpec) -> Self {
        let ActionSpec { kind, value, find, condition, lookup_table } = spec;

        match kind.as_str() {
            "prepend_string" => Action::PrependString(value),
            "append_string" => Action::AppendString(value),
            "trim" => Action::Trim,
            "trim_left" => Action::TrimLeft(value),
            "trim_right" => Action::TrimRight(value),
            "uppercase" => Action::Uppercase,
            "lowercase" => Action::Lowercase,
            "title_case" => Action::TitleCase,
            "replace" => Action::Replace { find, with: value },
            "regex_replace" => Action::RegexReplace { pattern: Pattern::new(find), with: value },
            "substring" => Action::Substring(parse_range(&value)),
            "pad_zeros_to_length" => Action::PadZerosToLength(parse_length(&value)),
            "pad_spaces_to_length" => Action::PadSpacesToLength(parse_length(&value)),
            "ensure_length" => Action::EnsureLength(parse_length(&value)),
            "format_number" => Action::FormatNumber(value.trim().parse().ok()),
            "format_currency" => Action::FormatCurrency,
            "remove_leading_zeros" => Action::RemoveLeadingZeros,
            "format_date" => Action::FormatDate(
                value
                    .split_once('|')
                    .map(|(input, output)| (input.to_string(), output.to_string())),
            ),
            "lookup" => Action::Lookup(lookup_table),
            "lookup_with_default" => Action::LookupWithDefault { table: lookup_table, default: value },
            "conditional" => Action::Conditional { condition, value },
            "if_empty_use_default" => Action::IfEmptyUseDefault(value),
            "if_empty_use_field" => Action::IfEmptyUseField(value),
            "extract_digits" => Action::ExtractDigits,
            "extract_letters" => Action::ExtractLetters,
            "remove_special_chars" => Action::RemoveSpecialChars,
            "normalize_whitespace" => Action::NormalizeWhitespace,
            _ => Action::Unknown(kind),
        }
    }
}

impl From<Action> for ActionSpec {
    fn from(action: Action) -> Self {
        let kind = action.kind().to_string();
        let mut spec = ActionSpec { kind, ..Default::default() };

        match action {
            Action::PrependString(v)
            | Action::AppendString(v)
            | Action::TrimLeft(v)
            | Action::TrimRight(v)
            | Action::IfEmptyUseDefault(v)
            | Action::IfEmptyUseField(v) => spec.value = v,
            Action::Replace { find, with } => {
                spec.find = find;
                spec.value = with;
            }
            Action::RegexReplace { pattern, with } => {
                spec.find = pattern.source;
                spec.value = with;
            }
            Action::Substring(Some((start, end))) => spec.value = format!("{},{}", start, end),
            Action::PadZerosToLength(n) | Action::PadSpacesToLength(n) | Action::EnsureLength(n) => {
                spec.value = n.to_string()
            }
            Action::FormatNumber(Some(places)) => spec.value = places.to_string(),
            Action::FormatDate(Some((input, output))) => spec.value = format!("{}|{}", input, output),
            Action::Lookup(table) => spec.lookup_table = table,
            Action::LookupWithDefault { table, default } => {
                spec.lookup_table = table;
                spec.value = default;
            }
            Action::Conditional { condition, value } => {
                spec.condition = condition;
                spec.value = value;
            }
            _ => {}
        }
        spec
    }
}

impl Action {
    /// The config spelling of this action's kind.
    pub fn kind(&self) -> &str {
        match self {
            Action::PrependString(_) => "prepend_string",
            Action::AppendString(_) => "append_string",
            Action::Trim => "trim",
            Action::TrimLeft(_) => "trim_left",
            Action::TrimRight(_) => "trim_right",
            Action::Uppercase => "uppercase",
            Action::Lowercase => "lowercase",
            Action::TitleCase => "title_case",
            Action::Replace { .. } => "replace",
            Action::RegexReplace { .. } => "regex_replace",
            Action::Substring(_) => "substring",
            Action::PadZerosToLength(_) => "pad_zeros_to_length",
            Action::PadSpacesToLength(_) => "pad_spaces_to_length",
            Action::EnsureLength(_) => "ensure_length",
            Action::FormatNumber(_) => "format_number",
            Action::FormatCurrency => "format_currency",
            Action::RemoveLeadingZeros => "remove_leading_zeros",
            Action::FormatDate(_) => "format_date",
            Action::Lookup(_) => "lookup",
            Action::LookupWithDefault { .. } => "lookup_with_default",
            Action::Conditional { .. } => "conditional",
            Action::IfEmptyUseDefault(_) => "if_empty_use_default",
            Action::IfEmptyUseField(_) => "if_empty_use_field",
            Action::ExtractDigits => "extract_digits",
            Action::ExtractLetters => "extract_letters",
            Action::RemoveSpecialChars => "remove_special_chars",
            Action::NormalizeWhitespace => "normalize_whitespace",
            Action::Unknown(kind) => kind,
        }
    }

    /// Check the errors `apply` could raise, without a value.
    pub fn check(&self) -> TransformResult<()> {
        match self {
            Action::Unknown(kind) => Err(TransformError::UnknownActionKind(kind.clone())),
            Action::RegexReplace { pattern, .. } if !pattern.is_empty() => pattern.regex().map(|_| ()),
            Action::FormatNumber(Some(places)) if *places > MAX_DECIMAL_PLACES => {
                Err(TransformError::InvalidParameter {
                    kind: self.kind().to_string(),
                    message: format!("{} decimal places, at most {} allowed", places, MAX_DECIMAL_PLACES),
                })
            }
            Action::FormatDate(Some((_, output))) if !dates::is_valid_output_pattern(output) => {
                Err(TransformError::InvalidParameter {
                    kind: self.kind().to_string(),
                    message: format!("output pattern '{}' cannot render a date", output),
                })
            }
            _ => Ok(()),
        }
    }

    /// Apply this action to a value.
    ///
    /// `fields` is the full field set of the line item, read by
    /// `conditional` and `if_empty_use_field`.
    pub fn apply(&self, value: &str, fields: &Fields) -> TransformResult<String> {
        let out = match self {
            Action::PrependString(prefix) => format!("{}{}", prefix, value),
            Action::AppendString(suffix) => format!("{}{}", value, suffix),
            Action::Trim => value.trim().to_string(),
            Action::TrimLeft(set) => value.trim_start_matches(|c: char| trim_set(set).contains(c)).to_string(),
            Action::TrimRight(set) => value.trim_end_matches(|c: char| trim_set(set).contains(c)).to_string(),
            Action::Uppercase => value.to_uppercase(),
            Action::Lowercase => value.to_lowercase(),
            Action::TitleCase => self.apply_title_case(value),
            Action::Replace { find, with } => {
                if find.is_empty() {
                    value.to_string()
                } else {
                    value.replace(find.as_str(), with)
                }
            }
            Action::RegexReplace { pattern, with } => {
                if pattern.is_empty() {
                    value.to_string()
                } else {
                    pattern.regex()?.replace_all(value, with.as_str()).into_owned()
                }
            }
            Action::Substring(range) => self.apply_substring(value, *range),
            Action::PadZerosToLength(length) => pad_left(value, *length, '0'),
            Action::PadSpacesToLength(length) => pad_right(value, *length, ' '),
            Action::EnsureLength(length) => self.apply_ensure_length(value, *length),
            Action::FormatNumber(places) => match places {
                Some(places) => format_decimal(value, *places),
                None => value.to_string(),
            },
            Action::FormatCurrency => format_decimal(value, 2),
            Action::RemoveLeadingZeros => {
                let stripped = value.trim_start_matches('0');
                if stripped.is_empty() { "0".to_string() } else { stripped.to_string() }
            }
            Action::FormatDate(patterns) => patterns
                .as_ref()
                .and_then(|(input, output)| dates::reformat(value, input, output))
                .unwrap_or_else(|| value.to_string()),
            Action::Lookup(table) => table.get(value).cloned().unwrap_or_else(|| value.to_string()),
            Action::LookupWithDefault { table, default } => {
                table.get(value).cloned().unwrap_or_else(|| default.clone())
            }
            Action::Conditional { condition, value: substitute } => {
                if condition::evaluate(condition, fields) {
                    substitute.clone()
                } else {
                    value.to_string()
                }
            }
            Action::IfEmptyUseDefault(default) => {
                if value.trim().is_empty() { default.clone() } else { value.to_string() }
            }
            Action::IfEmptyUseField(other) => match fields.get(other) {
                Some(replacement) if value.trim().is_empty() => replacement.clone(),
                _ => value.to_string(),
            },
            Action::ExtractDigits => value.chars().filter(|c| c.is_ascii_digit()).collect(),
            Action::ExtractLetters => value.chars().filter(|c| c.is_ascii_alphabetic()).collect(),
            Action::RemoveSpecialChars => value.chars().filter(|c| c.is_ascii_alphanumeric()).collect(),
            Action::NormalizeWhitespace => value.split_whitespace().collect::<Vec<_>>().join(" "),
            Action::Unknown(kind) => return Err(TransformError::UnknownActionKind(kind.clone())),
        };
        Ok(out)
    }

    fn apply_title_case(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut at_word_start = true;
        for c in value.chars() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = !(c.is_alphanumeric() || c == '_' || c == '\'');
        }
        out
    }

    fn apply_substring(&self, value: &str, range: Option<(i64, i64)>) -> String {
        let Some((start, end)) = range else {
            return value.to_string();
        };
        let len = value.chars().count() as i64;
        let start = start.max(0);
        let end = end.min(len);
        if start >= end || start >= len {
            return String::new();
        }
        value.chars().skip(start as usize).take((end - start) as usize).collect()
    }

    fn apply_ensure_length(&self, value: &str, length: usize) -> String {
        if length == 0 {
            return value.to_string();
        }
        if value.chars().count() > length {
            value.chars().take(length).collect()
        } else {
            pad_left(value, length, '0')
        }
    }
}

fn trim_set(set: &str) -> &str {
    if set.is_empty() { DEFAULT_TRIM_SET } else { set }
}

/// A `regex_replace` pattern, compiled once when the action is built.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    compiled: Result<Regex, regex::Error>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = Regex::new(&source);
        Self { source, compiled }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    fn regex(&self) -> TransformResult<&Regex> {
        self.compiled.as_ref().map_err(|source| TransformError::InvalidPattern {
            pattern: self.source.clone(),
            source: source.clone(),
        })
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

fn pad_left(value: &str, length: usize, pad: char) -> String {
    let current = value.chars().count();
    if current >= length {
        return value.to_string();
    }
    let padding: String = std::iter::repeat(pad).take(length - current).collect();
    format!("{}{}", padding, value)
}

fn pad_right(value: &str, length: usize, pad: char) -> String {
    let current = value.chars().count();
    if current >= length {
        return value.to_string();
    }
    let padding: String = std::iter::repeat(pad).take(length - current).collect();
    format!("{}{}", value, padding)
}

fn format_decimal(value: &str, places: usize) -> String {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => format!("{:.*}", places.min(MAX_DECIMAL_PLACES), number),
        _ => value.to_string(),
    }
}

/// Get description of all available actions (for the CLI).
pub fn actions_description() -> String {
    let width = ACTION_KINDS.iter().map(|(kind, _)| kind.len()).max().unwrap_or(0);
    ACTION_KINDS
        .iter()
        .map(|(kind, help)| format!("- {:width$}  {}", kind, help, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: &str, value: &str) -> Action {
        Action::from(ActionSpec { kind: kind.into(), value: value.into(), ..Default::default() })
    }

    fn run(action: &Action, value: &str) -> String {
        action.apply(value, &Fields::new()).unwrap()
    }

    #[test]
    fn test_deserialize_config_form() {
        let action: Action = serde_json::from_str(r#"{"type": "pad_zeros_to_length", "value": "9"}"#).unwrap();
        assert_eq!(action, Action::PadZerosToLength(9));

        let action: Action =
            serde_json::from_str(r#"{"type": "regex_replace", "find": "[^0-9]", "value": ""}"#).unwrap();
        assert_eq!(action, Action::RegexReplace { pattern: Pattern::new("[^0-9]"), with: String::new() });

        let action: Action = serde_json::from_str(r#"{"type": "explode"}"#).unwrap();
        assert_eq!(action, Action::Unknown("explode".into()));
    }

    #[test]
    fn test_serialize_back_to_config_form() {
        let json = serde_json::to_value(Action::FormatDate(Some(("MM/DD/YYYY".into(), "YYYY-MM-DD".into()))))
            .unwrap();
        assert_eq!(json["type"], "format_date");
        assert_eq!(json["value"], "MM/DD/YYYY|YYYY-MM-DD");
    }

    #[test]
    fn test_trim_variants() {
        assert_eq!(run(&Action::Trim, "  a b \t"), "a b");
        assert_eq!(run(&spec("trim_left", ""), " \tx "), "x ");
        assert_eq!(run(&spec("trim_right", "*-"), "x-*-"), "x");
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(run(&Action::Uppercase, "abc"), "ABC");
        assert_eq!(run(&Action::Lowercase, "AbC"), "abc");
        assert_eq!(run(&Action::TitleCase, "hELLO wORLD-wide"), "Hello World-Wide");
    }

    #[test]
    fn test_replace_and_regex_replace() {
        let replace = Action::Replace { find: "-".into(), with: "".into() };
        assert_eq!(run(&replace, "12-34-56"), "123456");

        let empty = Action::Replace { find: "".into(), with: "x".into() };
        assert_eq!(run(&empty, "abc"), "abc");

        let regex = Action::RegexReplace { pattern: Pattern::new(r"(\d+)-(\d+)"), with: "$2/$1".into() };
        assert_eq!(run(&regex, "12-34"), "34/12");
    }

    #[test]
    fn test_invalid_regex_fails() {
        let regex = Action::RegexReplace { pattern: Pattern::new("(["), with: "".into() };
        let err = regex.apply("x", &Fields::new()).unwrap_err();
        assert!(matches!(err, TransformError::InvalidPattern { .. }));
        assert!(regex.check().is_err());
    }

    #[test]
    fn test_pattern_compiles_once() {
        let pattern = Pattern::new("[^0-9]");
        let first = pattern.regex().unwrap() as *const Regex;
        let second = pattern.regex().unwrap() as *const Regex;
        assert_eq!(first, second);
        assert_eq!(pattern.as_str(), "[^0-9]");

        let json = serde_json::to_value(Action::RegexReplace { pattern, with: "#".into() }).unwrap();
        assert_eq!(json["find"], "[^0-9]");
    }

    #[test]
    fn test_oversized_decimal_places() {
        let action = spec("format_number", "70000");
        assert_eq!(action, Action::FormatNumber(Some(70000)));
        assert!(matches!(action.check(), Err(TransformError::InvalidParameter { .. })));
        assert_eq!(run(&action, "1.5"), format!("1.5{}", "0".repeat(MAX_DECIMAL_PLACES - 1)));

        assert!(spec("format_number", "20").check().is_ok());
    }

    #[test]
    fn test_offset_date_output_is_rejected() {
        let action = spec("format_date", "%Y-%m-%d|%Y-%m-%d %z");
        assert!(matches!(action.check(), Err(TransformError::InvalidParameter { .. })));
        assert_eq!(run(&action, "2024-01-15"), "2024-01-15");

        assert!(spec("format_date", "MM/DD/YYYY|YYYY-MM-DD").check().is_ok());
    }

    #[test]
    fn test_substring_clamps() {
        assert_eq!(run(&spec("substring", "0,3"), "ABCDEF"), "ABC");
        assert_eq!(run(&spec("substring", "-2,2"), "ABCDEF"), "AB");
        assert_eq!(run(&spec("substring", "4,100"), "ABCDEF"), "EF");
        assert_eq!(run(&spec("substring", "3,3"), "ABCDEF"), "");
        assert_eq!(run(&spec("substring", "10,12"), "ABCDEF"), "");
        assert_eq!(run(&spec("substring", "3"), "ABCDEF"), "ABCDEF");
    }

    #[test]
    fn test_padding() {
        assert_eq!(run(&spec("pad_zeros_to_length", "6"), "42"), "000042");
        assert_eq!(run(&spec("pad_zeros_to_length", "2"), "4242"), "4242");
        assert_eq!(run(&spec("pad_zeros_to_length", "abc"), "42"), "42");
        assert_eq!(run(&spec("pad_spaces_to_length", "4"), "ab"), "ab  ");
    }

    #[test]
    fn test_ensure_length() {
        let action = spec("ensure_length", "10");
        assert_eq!(run(&action, "12345678901234"), "1234567890");
        assert_eq!(run(&action, "123"), "0000000123");
        assert_eq!(run(&action, "1234567890"), "1234567890");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(run(&spec("format_number", "2"), "12.5"), "12.50");
        assert_eq!(run(&spec("format_number", "0"), "12.7"), "13");
        assert_eq!(run(&spec("format_number", "2"), "N/A"), "N/A");
        assert_eq!(run(&Action::FormatCurrency, "1234"), "1234.00");
        assert_eq!(run(&Action::RemoveLeadingZeros, "000120"), "120");
        assert_eq!(run(&Action::RemoveLeadingZeros, "0000"), "0");
    }

    #[test]
    fn test_format_date_passes_through_on_failure() {
        let action = spec("format_date", "MM/DD/YYYY|YYYY-MM-DD");
        assert_eq!(run(&action, "01/15/2024"), "2024-01-15");
        assert_eq!(run(&action, "garbage"), "garbage");
        assert_eq!(run(&spec("format_date", "no-separator"), "01/15/2024"), "01/15/2024");
    }

    #[test]
    fn test_lookups() {
        let table: BTreeMap<String, String> = [("CHK".to_string(), "Check".to_string())].into_iter().collect();
        let lookup = Action::Lookup(table.clone());
        assert_eq!(run(&lookup, "CHK"), "Check");
        assert_eq!(run(&lookup, "DEP"), "DEP");

        let with_default = Action::LookupWithDefault { table, default: "Other".into() };
        assert_eq!(run(&with_default, "DEP"), "Other");
    }

    #[test]
    fn test_context_sensitive_actions() {
        let fields: Fields = [
            ("Type".to_string(), "VOID".to_string()),
            ("Payee".to_string(), "ACME".to_string()),
        ]
        .into_iter()
        .collect();

        let conditional = Action::Conditional { condition: "Type == 'VOID'".into(), value: "0.00".into() };
        assert_eq!(conditional.apply("15.00", &fields).unwrap(), "0.00");

        let unmatched = Action::Conditional { condition: "Type == 'CHK'".into(), value: "0.00".into() };
        assert_eq!(unmatched.apply("15.00", &fields).unwrap(), "15.00");

        let use_field = Action::IfEmptyUseField("Payee".into());
        assert_eq!(use_field.apply("  ", &fields).unwrap(), "ACME");
        assert_eq!(use_field.apply("X", &fields).unwrap(), "X");
        assert_eq!(Action::IfEmptyUseField("Missing".into()).apply("", &fields).unwrap(), "");

        assert_eq!(run(&Action::IfEmptyUseDefault("N/A".into()), " "), "N/A");
    }

    #[test]
    fn test_character_filters() {
        assert_eq!(run(&Action::ExtractDigits, "A1-2b3"), "123");
        assert_eq!(run(&Action::ExtractLetters, "A1-2b3"), "Ab");
        assert_eq!(run(&Action::RemoveSpecialChars, "A1-2 b3!"), "A12b3");
        assert_eq!(run(&Action::NormalizeWhitespace, "  a \t b\n c  "), "a b c");
    }

    #[test]
    fn test_unknown_kind_fails() {
        let err = spec("explode", "").apply("x", &Fields::new()).unwrap_err();
        assert!(matches!(err, TransformError::UnknownActionKind(kind) if kind == "explode"));
    }

    #[test]
    fn test_every_documented_kind_is_known() {
        for (kind, _) in ACTION_KINDS {
            let action = spec(kind, "");
            assert_eq!(action.kind(), *kind);
            assert!(!matches!(action, Action::Unknown(_)), "{} parsed as unknown", kind);
        }
    }
}
