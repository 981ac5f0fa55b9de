//! Date pattern handling shared by `format_date` and date validation.
//!
//! Patterns are either chrono `strftime` strings (`%d/%m/%Y`) or the token
//! style used in legacy templates (`DD/MM/YYYY`). Token patterns are
//! translated to `strftime` before use.

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Write as _;

/// Formats tried, in order, when a date field declares no format.
pub const COMMON_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
];

const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("YY", "%y"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// Translate a token pattern to `strftime`. Patterns containing `%` are
/// returned unchanged.
pub fn to_strftime(pattern: &str) -> String {
    if pattern.contains('%') {
        return pattern.to_string();
    }

    let mut out = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Whether chrono can render a date-time without offset with this `strftime` pattern.
///
/// Offset and zone specifiers (`%z`, `%Z`, `%:z`) parse but cannot render.
pub fn is_valid_strftime(pattern: &str) -> bool {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return false;
    }
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|sample| render_strftime(&sample, pattern))
        .is_some()
}

/// Render through `fmt::Write`; unrenderable items yield `None`.
fn render_strftime(value: &NaiveDateTime, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", value.format(pattern)).ok()?;
    Some(out)
}

/// Whether a pattern in either syntax can be used as a `format_date` output.
pub fn is_valid_output_pattern(pattern: &str) -> bool {
    is_valid_strftime(&to_strftime(pattern))
}

fn has_time_fields(pattern: &str) -> bool {
    ["%H", "%M", "%S", "%I", "%T", "%R", "%p"]
        .iter()
        .any(|spec| pattern.contains(spec))
}

/// Parse `value` with a pattern in either syntax.
///
/// Patterns with time fields parse a date-time; others parse a date at midnight.
pub fn parse_with(value: &str, pattern: &str) -> Option<NaiveDateTime> {
    let pattern = to_strftime(pattern);
    if has_time_fields(&pattern) {
        NaiveDateTime::parse_from_str(value, &pattern).ok()
    } else {
        NaiveDate::parse_from_str(value, &pattern)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

/// Render with a pattern in either syntax, or `None` if the pattern is invalid.
pub fn render_with(value: &NaiveDateTime, pattern: &str) -> Option<String> {
    let pattern = to_strftime(pattern);
    if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
        return None;
    }
    render_strftime(value, &pattern)
}

/// Reformat `value` from `input` to `output`, or `None` if either side fails.
pub fn reformat(value: &str, input: &str, output: &str) -> Option<String> {
    parse_with(value, input).and_then(|parsed| render_with(&parsed, output))
}

/// Whether `value` parses with any of [`COMMON_DATE_FORMATS`].
pub fn matches_common_format(value: &str) -> bool {
    COMMON_DATE_FORMATS
        .iter()
        .any(|format| NaiveDate::parse_from_str(value, format).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_translation() {
        assert_eq!(to_strftime("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(to_strftime("MM/DD/YY"), "%m/%d/%y");
        assert_eq!(to_strftime("DD MMM YYYY HH:mm:ss"), "%d %b %Y %H:%M:%S");
        assert_eq!(to_strftime("%d.%m.%Y"), "%d.%m.%Y");
    }

    #[test]
    fn test_reformat_between_syntaxes() {
        assert_eq!(reformat("01/15/2024", "MM/DD/YYYY", "%Y-%m-%d").as_deref(), Some("2024-01-15"));
        assert_eq!(reformat("2024-01-15", "%Y-%m-%d", "DD.MM.YYYY").as_deref(), Some("15.01.2024"));
        assert_eq!(reformat("not a date", "YYYY-MM-DD", "DD/MM/YYYY"), None);
    }

    #[test]
    fn test_reformat_with_time() {
        assert_eq!(
            reformat("2024-03-01 13:45:00", "YYYY-MM-DD HH:mm:ss", "DD/MM/YYYY HH:mm").as_deref(),
            Some("01/03/2024 13:45")
        );
    }

    #[test]
    fn test_invalid_output_pattern_is_rejected() {
        assert!(!is_valid_strftime("%Y-%Q"));
        assert_eq!(reformat("2024-01-15", "%Y-%m-%d", "%Y-%Q"), None);
    }

    #[test]
    fn test_offset_output_pattern_is_rejected() {
        for pattern in ["%Y-%m-%d %z", "%Y-%m-%d %Z", "%H:%M %:z"] {
            assert!(!is_valid_strftime(pattern), "{}", pattern);
            assert_eq!(reformat("2024-01-15", "%Y-%m-%d", pattern), None);
        }
        assert!(is_valid_output_pattern("DD/MM/YYYY"));
        assert!(!is_valid_output_pattern("YYYY %z"));
    }

    #[test]
    fn test_common_formats() {
        assert!(matches_common_format("2024-01-15"));
        assert!(matches_common_format("01/15/2024"));
        assert!(matches_common_format("20240115"));
        assert!(matches_common_format("Jan 15, 2024"));
        assert!(!matches_common_format("15th of January"));
    }
}
