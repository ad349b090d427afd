//! Document parsing.
//!
//! [`parse_bytes`] is the single entry point: it decodes the input (see
//! [`crate::encoding`]), runs the XML or HTML parser, and returns a complete
//! tree or nothing. A failed parse never yields a partial tree; its
//! diagnostics are left in the caller's [`Diagnostics`] collector.
//!
//! The XML parser is a hand-rolled recursive descent parser. It checks
//! well-formedness, resolves namespaces, and expands internal entities, but
//! never loads anything external.

pub(crate) mod input;
mod xml;

use crate::encoding;
use crate::engine::{self, codes, Diagnostic, Diagnostics};
use crate::error::{ErrorDomain, ErrorLevel, XmlError};
use crate::tree::Tree;

use input::DEFAULT_MAX_DEPTH;

/// Parse options.
///
/// Use the builder methods to configure options:
///
/// ```
/// use xmlhandle::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .no_blanks(true)
///     .encoding("ISO-8859-1")
///     .max_depth(128);
/// assert_eq!(opts.max_depth, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Overrides encoding detection.
    pub encoding: Option<String>,
    /// Parses with the lenient HTML parser.
    pub html: bool,
    /// Drops whitespace-only text nodes.
    pub no_blanks: bool,
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            html: false,
            no_blanks: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Forces the input encoding, ignoring BOM and declaration.
    #[must_use]
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }

    /// Selects the HTML parser.
    #[must_use]
    pub fn html(mut self, yes: bool) -> Self {
        self.html = yes;
        self
    }

    /// Enables or disables stripping of blank text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }
}

/// Parses document bytes into a tree.
///
/// Returns `None` on failure; the reason is the last error recorded in
/// `diags`. On success, warnings are both recorded in `diags` and stored on
/// the tree.
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions, diags: &mut Diagnostics) -> Option<Tree> {
    engine::init();

    let (text, used) = match encoding::decode(bytes, options.encoding.as_deref(), options.html) {
        Ok(decoded) => decoded,
        Err(e) => {
            let code = if e.unsupported {
                codes::ERR_UNSUPPORTED_ENCODING
            } else {
                codes::ERR_INVALID_ENCODING
            };
            diags.push(Diagnostic::new(ErrorDomain::Parser, code, ErrorLevel::Fatal, e.message).at(1, 1));
            return None;
        }
    };

    let result = if options.html {
        crate::html::parse(&text, options)
    } else {
        xml::XmlParser::new(&text, options).parse()
    };

    match result {
        Ok((mut tree, warnings)) => {
            for warning in warnings {
                diags.push(warning);
            }
            tree.warnings = diags.warnings().map(XmlError::from_diagnostic).collect();
            if options.encoding.is_some() || (options.html && tree.encoding.is_none()) {
                tree.encoding = Some(used.to_string());
            }
            tree.url = diags.file().map(str::to_string);
            tracing::debug!(
                nodes = tree.node_count(),
                warnings = tree.warnings.len(),
                encoding = used,
                html = options.html,
                "parsed document"
            );
            Some(tree)
        }
        Err(diag) => {
            diags.push(diag);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bytes_success() {
        let mut diags = Diagnostics::new();
        let tree = parse_bytes(b"<r><c/></r>", &ParseOptions::default(), &mut diags);
        assert!(tree.is_some());
        assert!(diags.records().is_empty());
    }

    #[test]
    fn test_parse_bytes_failure_records_fatal() {
        let mut diags = Diagnostics::for_file("bad.xml");
        let tree = parse_bytes(b"<r>", &ParseOptions::default(), &mut diags);
        assert!(tree.is_none());
        let err = diags.last_error();
        assert_eq!(err.level, ErrorLevel::Fatal);
        assert_eq!(err.domain, ErrorDomain::Parser);
        assert_eq!(err.file, "bad.xml");
    }

    #[test]
    fn test_parse_bytes_unknown_forced_encoding() {
        let mut diags = Diagnostics::new();
        let options = ParseOptions::default().encoding("klingon");
        assert!(parse_bytes(b"<r/>", &options, &mut diags).is_none());
        assert_eq!(diags.last_error().code, codes::ERR_UNSUPPORTED_ENCODING);
    }

    #[test]
    fn test_parse_bytes_forced_encoding_is_recorded() {
        let mut diags = Diagnostics::new();
        let options = ParseOptions::default().encoding("latin1");
        let tree = parse_bytes(b"<r>\xE9</r>", &options, &mut diags).unwrap_or_else(Tree::new_document);
        assert_eq!(tree.encoding.as_deref(), Some("windows-1252"));
        let root = tree.root_element();
        assert_eq!(root.map(|r| tree.text_content(r)), Some("\u{e9}".to_string()));
    }

    #[test]
    fn test_parse_bytes_html_dispatch() {
        let mut diags = Diagnostics::new();
        let options = ParseOptions::default().html(true);
        let tree = parse_bytes(b"<p>hi", &options, &mut diags);
        assert!(tree.is_some_and(|t| t.html));
    }
}
