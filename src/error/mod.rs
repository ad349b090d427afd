//! Error types and structured diagnostics.
//!
//! The engine layer (parser, `XPath`, serializer) records raw
//! [`Diagnostic`](crate::engine::Diagnostic)s carrying numeric domain, code,
//! and level fields, the way libxml2's `xmlError` does. [`XmlError`] is the
//! structured, immutable form callers see: [`XmlError::from_diagnostic`]
//! maps the numbers to [`ErrorDomain`] and [`ErrorLevel`] and fills absent
//! strings with `""`.
//!
//! Every fallible public operation returns [`Error`], whose variants name the
//! failing stage and all carry an `XmlError`.

use std::fmt;

use crate::engine::Diagnostic;

/// Severity of a diagnostic, numbered like libxml2's `xmlErrorLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ErrorLevel {
    #[default]
    None = 0,
    /// A non-fatal issue; the operation still succeeded.
    Warning = 1,
    /// A recoverable error.
    Error = 2,
    /// The operation had to stop.
    Fatal = 3,
}

impl ErrorLevel {
    /// Maps a numeric level; unknown values map to `None`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Warning,
            2 => Self::Error,
            3 => Self::Fatal,
            _ => Self::None,
        }
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "note"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal error"),
        }
    }
}

/// The subsystem a diagnostic came from, numbered like libxml2's
/// `xmlErrorDomain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ErrorDomain {
    #[default]
    None = 0,
    Parser = 1,
    Tree = 2,
    Namespace = 3,
    Dtd = 4,
    Html = 5,
    Memory = 6,
    Output = 7,
    Io = 8,
    Ftp = 9,
    Http = 10,
    XInclude = 11,
    XPath = 12,
    XPointer = 13,
    Regexp = 14,
    Datatype = 15,
    SchemasParser = 16,
    SchemasValidity = 17,
    RelaxNgParser = 18,
    RelaxNgValidity = 19,
    Catalog = 20,
    C14n = 21,
    Xslt = 22,
    Valid = 23,
    Check = 24,
    Writer = 25,
    Module = 26,
    I18n = 27,
    SchematronValidity = 28,
    Buffer = 29,
    Uri = 30,
}

impl ErrorDomain {
    /// Maps a numeric domain; unknown values map to `None`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        const ALL: [ErrorDomain; 31] = [
            ErrorDomain::None,
            ErrorDomain::Parser,
            ErrorDomain::Tree,
            ErrorDomain::Namespace,
            ErrorDomain::Dtd,
            ErrorDomain::Html,
            ErrorDomain::Memory,
            ErrorDomain::Output,
            ErrorDomain::Io,
            ErrorDomain::Ftp,
            ErrorDomain::Http,
            ErrorDomain::XInclude,
            ErrorDomain::XPath,
            ErrorDomain::XPointer,
            ErrorDomain::Regexp,
            ErrorDomain::Datatype,
            ErrorDomain::SchemasParser,
            ErrorDomain::SchemasValidity,
            ErrorDomain::RelaxNgParser,
            ErrorDomain::RelaxNgValidity,
            ErrorDomain::Catalog,
            ErrorDomain::C14n,
            ErrorDomain::Xslt,
            ErrorDomain::Valid,
            ErrorDomain::Check,
            ErrorDomain::Writer,
            ErrorDomain::Module,
            ErrorDomain::I18n,
            ErrorDomain::SchematronValidity,
            ErrorDomain::Buffer,
            ErrorDomain::Uri,
        ];
        usize::try_from(code)
            .ok()
            .and_then(|i| ALL.get(i).copied())
            .unwrap_or(Self::None)
    }

    fn label(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Parser => "parser",
            Self::Tree => "tree",
            Self::Namespace => "namespace",
            Self::Dtd => "validity",
            Self::Html => "HTML parser",
            Self::Memory => "memory",
            Self::Output => "output",
            Self::Io => "I/O",
            Self::XPath => "XPath",
            Self::Uri => "URI",
            _ => "module",
        }
    }
}

/// A structured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlError {
    pub domain: ErrorDomain,
    /// Numeric error code within the domain.
    pub code: i32,
    pub message: String,
    pub level: ErrorLevel,
    /// The file being processed, or `""`.
    pub file: String,
    /// 1-based line, 0 when unknown.
    pub line: u32,
    /// 1-based column, 0 when unknown.
    pub column: u32,
    pub str1: String,
    pub str2: String,
    pub str3: String,
    /// Extra integer; the character offset for `XPath` errors.
    pub int1: i32,
}

impl XmlError {
    /// Converts an engine diagnostic record.
    #[must_use]
    pub fn from_diagnostic(diag: &Diagnostic) -> Self {
        Self {
            domain: ErrorDomain::from_code(diag.domain),
            code: diag.code,
            message: diag.message.clone().unwrap_or_default(),
            level: ErrorLevel::from_code(diag.level),
            file: diag.file.clone().unwrap_or_default(),
            line: diag.line,
            column: diag.column,
            str1: diag.str1.clone().unwrap_or_default(),
            str2: diag.str2.clone().unwrap_or_default(),
            str3: diag.str3.clone().unwrap_or_default(),
            int1: diag.int1,
        }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.file.is_empty() {
            write!(f, "{}:{}:{}: ", self.file, self.line, self.column)?;
        } else if self.line > 0 {
            write!(f, "{}:{}: ", self.line, self.column)?;
        }
        match self.domain {
            ErrorDomain::None => write!(f, "{}: {}", self.level, self.message),
            domain => write!(f, "{} {}: {}", domain.label(), self.level, self.message),
        }
    }
}

impl std::error::Error for XmlError {}

/// The error type of every fallible public operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed input, an unreadable file, or an unusable encoding.
    #[error("parse failed: {0}")]
    Parse(XmlError),
    /// An invalid or unevaluable `XPath` expression.
    #[error("query failed: {0}")]
    Query(XmlError),
    /// No evaluation context could be set up for the query.
    #[error("query context unavailable: {0}")]
    Context(XmlError),
    /// The operation would break the single-parent or ownership rules, or
    /// touched a released node.
    #[error("invalid tree operation: {0}")]
    Structural(XmlError),
    /// Rendering or writing output failed.
    #[error("output failed: {0}")]
    Output(XmlError),
}

impl Error {
    /// The diagnostic carried by this error.
    #[must_use]
    pub fn diagnostic(&self) -> &XmlError {
        match self {
            Self::Parse(e) | Self::Query(e) | Self::Context(e) | Self::Structural(e) | Self::Output(e) => e,
        }
    }

    pub(crate) fn structural(code: i32, message: impl Into<String>) -> Self {
        Self::Structural(XmlError {
            domain: ErrorDomain::Tree,
            code,
            message: message.into(),
            level: ErrorLevel::Error,
            ..XmlError::default()
        })
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
