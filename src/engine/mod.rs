//! Engine plumbing shared by the parser, `XPath`, and the serializer.
//!
//! There is no process-wide error callback. Every parse, query, or render
//! call creates its own [`Diagnostics`] collector, hands it down to the
//! engine, and converts the last recorded [`Diagnostic`] into an
//! [`XmlError`](crate::error::XmlError) if the call failed. Nothing is ever
//! printed to a global stream, and concurrent calls on different threads
//! cannot see each other's diagnostics.

pub mod codes;

use std::sync::Once;

use crate::error::{ErrorDomain, ErrorLevel, XmlError};

/// A raw diagnostic record, as the engine produces it.
///
/// Numeric fields use the libxml2 numbering of `xmlError`; strings that the
/// engine did not fill in are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub domain: i32,
    pub code: i32,
    pub level: i32,
    pub message: Option<String>,
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
    pub str1: Option<String>,
    pub str2: Option<String>,
    pub str3: Option<String>,
    pub int1: i32,
}

impl Diagnostic {
    #[must_use]
    pub fn new(domain: ErrorDomain, code: i32, level: ErrorLevel, message: impl Into<String>) -> Self {
        Self {
            domain: domain as i32,
            code,
            level: level as i32,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Sets the source position.
    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    #[must_use]
    pub fn with_str1(mut self, value: impl Into<String>) -> Self {
        self.str1 = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_str2(mut self, value: impl Into<String>) -> Self {
        self.str2 = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_int1(mut self, value: i32) -> Self {
        self.int1 = value;
        self
    }

    /// Whether this record is at error level or above.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level >= ErrorLevel::Error as i32
    }
}

/// Per-call diagnostic collector.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    file: Option<String>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A collector that stamps `file` on every record it receives.
    #[must_use]
    pub fn for_file(file: &str) -> Self {
        Self {
            records: Vec::new(),
            file: Some(file.to_string()),
        }
    }

    /// The file stamped on records, if any.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn push(&mut self, mut diag: Diagnostic) {
        if diag.file.is_none() {
            diag.file.clone_from(&self.file);
        }
        tracing::trace!(domain = diag.domain, code = diag.code, level = diag.level, "diagnostic recorded");
        self.records.push(diag);
    }

    /// The most recent record.
    #[must_use]
    pub fn last(&self) -> Option<&Diagnostic> {
        self.records.last()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.records.iter().any(Diagnostic::is_error)
    }

    #[must_use]
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Records below error level.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter().filter(|d| !d.is_error())
    }

    /// The structured form of the last error-level record, falling back to
    /// the last record of any level.
    ///
    /// A failing engine call always records at least one diagnostic; the
    /// placeholder only appears if that rule is broken.
    #[must_use]
    pub fn last_error(&self) -> XmlError {
        self.records
            .iter()
            .rev()
            .find(|d| d.is_error())
            .or_else(|| self.last())
            .map_or_else(
                || XmlError {
                    domain: ErrorDomain::None,
                    code: codes::ERR_INTERNAL,
                    message: "operation failed without a diagnostic".to_string(),
                    level: ErrorLevel::Error,
                    ..XmlError::default()
                },
                XmlError::from_diagnostic,
            )
    }
}

/// Initializes process-wide engine state.
///
/// Idempotent and thread-safe; every parse and query entry point calls it.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let entities = crate::html::entity_table().len();
        tracing::debug!(entities, "xml engine initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        assert!(!crate::html::entity_table().is_empty());
    }

    #[test]
    fn test_collector_stamps_file() {
        let mut diags = Diagnostics::for_file("doc.xml");
        diags.push(Diagnostic::new(ErrorDomain::Parser, codes::ERR_DOCUMENT_EMPTY, ErrorLevel::Fatal, "Document is empty").at(1, 1));
        assert_eq!(diags.last().and_then(|d| d.file.as_deref()), Some("doc.xml"));
        assert!(diags.has_errors());
    }

    #[test]
    fn test_last_error_skips_trailing_warnings() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::new(ErrorDomain::XPath, codes::XPATH_EXPR_ERROR, ErrorLevel::Error, "Invalid expression"));
        diags.push(Diagnostic::new(ErrorDomain::Html, codes::HTML_STRUCTURE_ERROR, ErrorLevel::Warning, "stray end tag"));

        let err = diags.last_error();
        assert_eq!(err.domain, ErrorDomain::XPath);
        assert_eq!(err.code, codes::XPATH_EXPR_ERROR);
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn test_last_error_without_records() {
        let err = Diagnostics::new().last_error();
        assert_eq!(err.level, ErrorLevel::Error);
        assert_eq!(err.code, codes::ERR_INTERNAL);
    }
}
