//! `XPath` values and errors.
//!
//! The four `XPath` 1.0 data types, their conversions (sections 4.1 to 4.4
//! of the recommendation), and the number formatting used by `string()`.

use std::fmt;

use crate::engine::codes;
use crate::tree::{NodeId, Tree};

/// The result of evaluating an expression.
///
/// Node-sets are kept in document order without duplicates.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    NodeSet(Vec<NodeId>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl XPathValue {
    /// Converts to a boolean. An empty node-set, zero, NaN, and the empty
    /// string are false.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::NodeSet(nodes) => !nodes.is_empty(),
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
        }
    }

    /// Converts to a number. A node-set converts through the string-value
    /// of its first node.
    #[must_use]
    pub fn to_number(&self, tree: &Tree) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::String(s) => parse_number(s),
            Self::NodeSet(_) => parse_number(&self.to_xpath_string(tree)),
        }
    }

    /// Converts to a string. A node-set converts to the string-value of its
    /// first node, or `""` when empty.
    #[must_use]
    pub fn to_xpath_string(&self, tree: &Tree) -> String {
        match self {
            Self::NodeSet(nodes) => nodes.first().map(|&n| string_value(tree, n)).unwrap_or_default(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NodeSet(_) => "node-set",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

/// The string-value of a node.
pub(crate) fn string_value(tree: &Tree, id: NodeId) -> String {
    tree.text_content(id)
}

/// Formats a number the way `string()` does: no exponent, no trailing
/// `.0`, and `NaN` / `Infinity` spelled out.
///
/// # Examples
///
/// ```
/// use xmlhandle::xpath::format_number;
///
/// assert_eq!(format_number(3.0), "3");
/// assert_eq!(format_number(-0.0), "0");
/// assert_eq!(format_number(0.5), "0.5");
/// assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
/// ```
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    #[allow(clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() < 1e18 {
        return (n as i64).to_string();
    }
    format!("{n}")
}

/// Parses a string the way `number()` does.
///
/// Only `-? digits ('.' digits?)?` and `-? '.' digits`, surrounded by
/// optional whitespace, are numbers; anything else is NaN.
#[must_use]
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let valid = all_digits(int)
        && frac.map_or(true, all_digits)
        && (!int.is_empty() || frac.is_some_and(|f| !f.is_empty()));
    if !valid {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// An error raised while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathError {
    /// One of the `XPATH_*` codes in [`crate::engine::codes`].
    pub code: i32,
    pub message: String,
    /// Byte offset into the expression. Evaluation errors point past the
    /// end, where compilation stopped.
    pub position: usize,
}

impl XPathError {
    /// An error with the standard message for `code`.
    #[must_use]
    pub fn new(code: i32, position: usize) -> Self {
        Self {
            code,
            message: default_message(code).to_string(),
            position,
        }
    }

    /// Appends detail to the standard message.
    #[must_use]
    pub fn detail(mut self, detail: impl fmt::Display) -> Self {
        self.message = format!("{}: {detail}", self.message);
        self
    }
}

fn default_message(code: i32) -> &'static str {
    match code {
        codes::XPATH_NUMBER_ERROR => "Number encoding",
        codes::XPATH_UNFINISHED_LITERAL => "Unfinished literal",
        codes::XPATH_START_LITERAL => "Start of literal",
        codes::XPATH_UNDEF_VARIABLE => "Undefined variable",
        codes::XPATH_INVALID_PREDICATE => "Invalid predicate",
        codes::XPATH_UNCLOSED => "Missing closing curly brace",
        codes::XPATH_UNKNOWN_FUNC => "Unregistered function",
        codes::XPATH_INVALID_OPERAND => "Invalid operand",
        codes::XPATH_INVALID_TYPE => "Invalid type",
        codes::XPATH_INVALID_ARITY => "Invalid number of arguments",
        codes::XPATH_UNDEF_PREFIX => "Undefined namespace prefix",
        codes::XPATH_INVALID_CTXT => "Invalid or incomplete context",
        _ => "Invalid expression",
    }
}

impl fmt::Display for XPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XPath error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for XPathError {}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_number_is_strict() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_number("3."), 3.0);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("+1").is_nan());
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("").is_nan());
        assert!(parse_number(".").is_nan());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-2.25), "-2.25");
        assert_eq!(format_number(0.000_000_1), "0.0000001");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_scalar_conversions() {
        let tree = Tree::new_scratch();
        assert!(!XPathValue::Number(f64::NAN).to_boolean());
        assert!(XPathValue::String("false".to_string()).to_boolean());
        assert_eq!(XPathValue::Boolean(true).to_number(&tree), 1.0);
        assert_eq!(XPathValue::Boolean(false).to_xpath_string(&tree), "false");
        assert_eq!(XPathValue::NodeSet(Vec::new()).to_xpath_string(&tree), "");
        assert!(XPathValue::NodeSet(Vec::new()).to_number(&tree).is_nan());
    }

    #[test]
    fn test_error_messages() {
        let err = XPathError::new(codes::XPATH_UNKNOWN_FUNC, 7).detail("foo");
        assert_eq!(err.to_string(), "XPath error at position 7: Unregistered function: foo");
        assert_eq!(XPathError::new(codes::XPATH_EXPR_ERROR, 0).message, "Invalid expression");
    }
}
