//! `XPath` 1.0 engine.
//!
//! [`parse`] compiles an expression, [`XPathContext`] evaluates it against a
//! [`Tree`], and [`evaluate`] does both while recording failures as
//! diagnostics the way the parser does.
//!
//! `/` selects the top-most ancestor of the context node. For a node in a
//! document that is the document node; for a detached subtree the caller is
//! expected to hang the subtree below a temporary document node first.
//!
//! # Known Limitations
//!
//! - The `namespace` axis always yields the empty node-set.
//! - `id()` recognizes `xml:id` attributes, and `id` attributes in HTML
//!   documents. Attribute types declared in a DTD are not consulted.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod types;

pub use eval::XPathContext;
pub use parser::parse;
pub use types::{format_number, parse_number, XPathError, XPathValue};

use crate::engine::{self, Diagnostic, Diagnostics};
use crate::error::{ErrorDomain, ErrorLevel};
use crate::tree::{NodeId, Tree};

/// Compiles and evaluates `expression` with `node` as the context node.
///
/// Each `(prefix, uri)` pair is registered before evaluation. On failure a
/// diagnostic is pushed to `diags` (domain `XPath`, `str1` set to the
/// expression, `int1` set to the character position) and `None` is
/// returned.
///
/// # Examples
///
/// ```
/// use xmlhandle::engine::Diagnostics;
/// use xmlhandle::parser::{parse_bytes, ParseOptions};
/// use xmlhandle::xpath::{evaluate, XPathValue};
///
/// let mut diags = Diagnostics::new();
/// let tree = parse_bytes(b"<r xmlns='urn:r'><a/></r>", &ParseOptions::default(), &mut diags).unwrap();
///
/// let found = evaluate(&tree, tree.root(), "/r:r/r:a", &[("r", "urn:r")], &mut diags);
/// assert!(matches!(found, Some(XPathValue::NodeSet(ref nodes)) if nodes.len() == 1));
///
/// assert!(evaluate(&tree, tree.root(), "/r:r[", &[("r", "urn:r")], &mut diags).is_none());
/// assert_eq!(diags.last_error().int1, 5);
/// ```
pub fn evaluate(
    tree: &Tree,
    node: NodeId,
    expression: &str,
    namespaces: &[(&str, &str)],
    diags: &mut Diagnostics,
) -> Option<XPathValue> {
    engine::init();
    let result = parse(expression).and_then(|expr| {
        let mut ctx = XPathContext::new(tree);
        ctx.set_error_position(expression.len());
        for (prefix, uri) in namespaces {
            ctx.register_namespace(prefix, uri);
        }
        ctx.evaluate(&expr, node)
    });
    match result {
        Ok(value) => {
            tracing::trace!(expression, kind = value.type_name(), "xpath evaluated");
            Some(value)
        }
        Err(err) => {
            let column = expression
                .get(..err.position)
                .map_or_else(|| expression.chars().count(), |head| head.chars().count());
            diags.push(
                Diagnostic::new(ErrorDomain::XPath, err.code, ErrorLevel::Error, err.message)
                    .with_str1(expression)
                    .with_int1(i32::try_from(column).unwrap_or(i32::MAX)),
            );
            None
        }
    }
}
