//! Condition evaluator for conditional transforms and conditional-required fields.
//!
//! The grammar is a single comparison, `field OP literal`:
//!
//! ```text
//! [if] Amount > 100
//! [if] Type == 'CHK'
//! [if] Type != "DEP"
//! [if] Account starts_with '40'
//! [if] Memo is_empty
//! [if] Memo is_not_empty
//! ```
//!
//! Expressions are tokenized, then the operator forms are searched for in a
//! fixed priority order (`==`, `!=`, `>`, `<`, `starts_with`, `is_empty`,
//! `is_not_empty`). The first form found anywhere in the token stream becomes
//! the [`Condition`]. Text that contains no recognizable form evaluates to
//! `false`; it is never an error.

use std::fmt;

use crate::models::Fields;

// =============================================================================
// AST
// =============================================================================

/// Comparison applied to a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Equals(String),
    NotEquals(String),
    GreaterThan(f64),
    LessThan(f64),
    StartsWith(String),
    IsEmpty,
    IsNotEmpty,
}

/// A parsed `field OP literal` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub comparison: Comparison,
}

impl Condition {
    /// Parse an expression. Returns `None` when no operator form matches.
    pub fn parse(expression: &str) -> Option<Self> {
        let expression = expression.trim();
        let expression = expression.strip_prefix("if ").unwrap_or(expression).trim();
        let tokens = tokenize(expression);

        PRIORITY.iter().find_map(|form| form.find_in(&tokens))
    }

    /// Evaluate against the field set of one line item.
    ///
    /// Missing fields read as empty. Numeric comparisons read a missing or
    /// non-numeric field as `0`.
    pub fn evaluate(&self, fields: &Fields) -> bool {
        let actual = fields.get(&self.field).map(String::as_str).unwrap_or("");

        match &self.comparison {
            Comparison::Equals(expected) => actual == expected,
            Comparison::NotEquals(expected) => actual != expected,
            Comparison::GreaterThan(limit) => numeric_value(actual) > *limit,
            Comparison::LessThan(limit) => numeric_value(actual) < *limit,
            Comparison::StartsWith(prefix) => actual.starts_with(prefix.as_str()),
            Comparison::IsEmpty => actual.is_empty(),
            Comparison::IsNotEmpty => !actual.is_empty(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comparison {
            Comparison::Equals(v) => write!(f, "{} == '{}'", self.field, v),
            Comparison::NotEquals(v) => write!(f, "{} != '{}'", self.field, v),
            Comparison::GreaterThan(n) => write!(f, "{} > {}", self.field, n),
            Comparison::LessThan(n) => write!(f, "{} < {}", self.field, n),
            Comparison::StartsWith(v) => write!(f, "{} starts_with '{}'", self.field, v),
            Comparison::IsEmpty => write!(f, "{} is_empty", self.field),
            Comparison::IsNotEmpty => write!(f, "{} is_not_empty", self.field),
        }
    }
}

/// Parse and evaluate in one step. Unrecognized expressions are `false`.
pub fn evaluate(expression: &str, fields: &Fields) -> bool {
    Condition::parse(expression)
        .map(|condition| condition.evaluate(fields))
        .unwrap_or(false)
}

/// Whether `expression` contains a recognizable operator form.
pub fn is_recognized(expression: &str) -> bool {
    Condition::parse(expression).is_some()
}

fn numeric_value(value: &str) -> f64 {
    value.parse::<f64>().unwrap_or(0.0)
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Run of ASCII letters, digits and underscores, with an optional
    /// `.digits` fraction when the run is all digits.
    Word(String),
    /// Single- or double-quoted text, quotes removed.
    Quoted(String),
    Eq,
    NotEq,
    Gt,
    Lt,
    Other,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if is_word_char(c) {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            let all_digits = chars[start..i].iter().all(|c| c.is_ascii_digit());
            if all_digits
                && i + 1 < chars.len()
                && chars[i] == '.'
                && chars[i + 1].is_ascii_digit()
            {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else if c == '\'' || c == '"' {
            match chars[i + 1..].iter().position(|&q| q == c) {
                Some(len) => {
                    tokens.push(Token::Quoted(chars[i + 1..i + 1 + len].iter().collect()));
                    i += len + 2;
                }
                None => {
                    tokens.push(Token::Other);
                    i += 1;
                }
            }
        } else if c == '=' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::Eq);
            i += 2;
        } else if c == '!' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::NotEq);
            i += 2;
        } else if c == '>' {
            tokens.push(Token::Gt);
            i += 1;
        } else if c == '<' {
            tokens.push(Token::Lt);
            i += 1;
        } else {
            tokens.push(Token::Other);
            i += 1;
        }
    }

    tokens
}

// =============================================================================
// Operator Forms
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Form {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    StartsWith,
    IsEmpty,
    IsNotEmpty,
}

const PRIORITY: [Form; 7] = [
    Form::Equals,
    Form::NotEquals,
    Form::GreaterThan,
    Form::LessThan,
    Form::StartsWith,
    Form::IsEmpty,
    Form::IsNotEmpty,
];

fn field_name(token: &Token) -> Option<&str> {
    match token {
        Token::Word(w) if w.chars().all(is_word_char) => Some(w),
        _ => None,
    }
}

fn number(token: &Token) -> Option<f64> {
    match token {
        Token::Word(w) if w.chars().all(|c| c.is_ascii_digit() || c == '.') => w.parse().ok(),
        _ => None,
    }
}

fn quoted(token: &Token) -> Option<&str> {
    match token {
        Token::Quoted(q) => Some(q),
        _ => None,
    }
}

fn keyword(token: &Token, expected: &str) -> bool {
    matches!(token, Token::Word(w) if w == expected)
}

impl Form {
    /// Find the leftmost occurrence of this form in the token stream.
    fn find_in(self, tokens: &[Token]) -> Option<Condition> {
        match self {
            Form::IsEmpty | Form::IsNotEmpty => tokens.windows(2).find_map(|w| {
                let word = if matches!(self, Form::IsEmpty) { "is_empty" } else { "is_not_empty" };
                let field = field_name(&w[0])?;
                if !keyword(&w[1], word) {
                    return None;
                }
                let comparison = if matches!(self, Form::IsEmpty) {
                    Comparison::IsEmpty
                } else {
                    Comparison::IsNotEmpty
                };
                Some(Condition { field: field.to_string(), comparison })
            }),
            _ => tokens.windows(3).find_map(|w| {
                let field = field_name(&w[0])?.to_string();
                let comparison = match (self, &w[1]) {
                    (Form::Equals, Token::Eq) => Comparison::Equals(quoted(&w[2])?.to_string()),
                    (Form::NotEquals, Token::NotEq) => Comparison::NotEquals(quoted(&w[2])?.to_string()),
                    (Form::GreaterThan, Token::Gt) => Comparison::GreaterThan(number(&w[2])?),
                    (Form::LessThan, Token::Lt) => Comparison::LessThan(number(&w[2])?),
                    (Form::StartsWith, op) if keyword(op, "starts_with") => {
                        Comparison::StartsWith(quoted(&w[2])?.to_string())
                    }
                    _ => return None,
                };
                Some(Condition { field, comparison })
            }),
        }
    }
}
