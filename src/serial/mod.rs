//! XML and HTML serialization.
//!
//! [`render_node`] writes a subtree as XML, with namespace declarations
//! reconciled so that any subtree renders as well-formed XML on its own.
//! [`render_document`] writes a whole tree, using HTML syntax for trees
//! produced by the HTML parser.

mod html;
mod xml;

use std::fmt::Write;

use crate::encoding;
use crate::engine::codes;
use crate::error::{ErrorDomain, ErrorLevel, XmlError};
use crate::tree::{NodeId, NodeKind, Tree};

/// Options controlling serialization output.
///
/// # Examples
///
/// ```
/// use xmlhandle::serial::SerializeOptions;
///
/// let opts = SerializeOptions::default().indent(true).encoding("ISO-8859-1");
/// assert_eq!(opts.indent_str, "  ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Whether to indent element-only content. Defaults to `false`.
    pub indent: bool,
    /// The indentation string for each level. Defaults to two spaces.
    pub indent_str: String,
    /// The encoding named in the XML declaration. Defaults to `UTF-8`.
    pub encoding: Option<String>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
            encoding: None,
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output.
    ///
    /// Only elements whose children are all elements (and blank text) are
    /// indented; mixed content is written as is.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }

    /// Sets the output encoding label.
    #[must_use]
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }

    fn encoding_label(&self) -> &str {
        self.encoding.as_deref().unwrap_or("UTF-8")
    }
}

/// Renders the subtree at `id` as XML, without a declaration or trailing
/// newline.
///
/// # Errors
///
/// Returns an output-domain error if `id` is not a live node.
pub fn render_node(tree: &Tree, id: NodeId, options: &SerializeOptions) -> Result<String, XmlError> {
    if !tree.is_live(id) {
        return Err(output_error(codes::SAVE_RELEASED, "cannot serialize a released node"));
    }
    let mut out = String::new();
    xml::XmlWriter::new(tree, options, &mut out).write_subtree(id);
    Ok(out)
}

/// Renders a whole document.
///
/// XML documents start with a declaration naming the output encoding; each
/// top-level node is followed by a newline.
///
/// # Errors
///
/// Returns an output-domain error if the document node was released or the
/// encoding label is unknown.
pub fn render_document(tree: &Tree, options: &SerializeOptions) -> Result<String, XmlError> {
    if !tree.is_live(tree.root()) {
        return Err(output_error(codes::SAVE_RELEASED, "cannot serialize a released document"));
    }
    let label = options.encoding_label();
    if encoding::canonical_name(label).is_none() {
        let mut err = output_error(codes::SAVE_UNKNOWN_ENCODING, &format!("unknown encoding {label}"));
        err.str1 = label.to_string();
        return Err(err);
    }

    let mut out = String::new();
    if tree.html {
        for child in tree.children(tree.root()) {
            html::write_node(tree, child, options, &mut out);
            out.push('\n');
        }
        return Ok(out);
    }

    let version = tree.version.as_deref().unwrap_or("1.0");
    let _ = write!(out, "<?xml version=\"{version}\" encoding=\"{label}\"");
    if let Some(standalone) = tree.standalone {
        let _ = write!(out, " standalone=\"{}\"", if standalone { "yes" } else { "no" });
    }
    out.push_str("?>\n");
    for child in tree.children(tree.root()) {
        xml::XmlWriter::new(tree, options, &mut out).write_subtree(child);
        out.push('\n');
    }
    Ok(out)
}

fn output_error(code: i32, message: &str) -> XmlError {
    XmlError {
        domain: ErrorDomain::Output,
        code,
        message: message.to_string(),
        level: ErrorLevel::Error,
        ..XmlError::default()
    }
}

/// Returns `true` if the element contains only other elements (and optional
/// whitespace text), meaning it's safe to add indentation.
fn is_element_only(tree: &Tree, id: NodeId) -> bool {
    let mut has_element_child = false;
    for child in tree.children(id) {
        match &tree.node(child).kind {
            NodeKind::Element { .. } => has_element_child = true,
            NodeKind::Text { content } if !content.trim().is_empty() => return false,
            NodeKind::CData { .. } | NodeKind::EntityRef { .. } => return false,
            _ => {}
        }
    }
    has_element_child
}

fn is_blank_text(tree: &Tree, id: NodeId) -> bool {
    matches!(&tree.node(id).kind, NodeKind::Text { content } if content.trim().is_empty())
}

fn write_doctype(tree: &Tree, id: NodeId, out: &mut String) {
    let NodeKind::DocumentType { name, system_id, public_id } = &tree.node(id).kind else {
        return;
    };
    let _ = write!(out, "<!DOCTYPE {name}");
    match (public_id, system_id) {
        (Some(public), Some(system)) => {
            let _ = write!(out, " PUBLIC \"{public}\" \"{system}\"");
        }
        (Some(public), None) => {
            let _ = write!(out, " PUBLIC \"{public}\"");
        }
        (None, Some(system)) => {
            let _ = write!(out, " SYSTEM \"{system}\"");
        }
        (None, None) => {}
    }
    if tree.first_child(id).is_some() {
        out.push_str(" [\n");
        for decl in tree.children(id) {
            if let NodeKind::Declaration { kind, name, body } = &tree.node(decl).kind {
                let _ = writeln!(out, "<!{} {name} {body}>", kind.keyword());
            }
        }
        out.push(']');
    }
    out.push('>');
}

fn write_pi(target: &str, data: Option<&str>, close: &str, out: &mut String) {
    out.push_str("<?");
    out.push_str(target);
    if let Some(data) = data {
        out.push(' ');
        out.push_str(data);
    }
    out.push_str(close);
}

fn write_indent(options: &SerializeOptions, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(&options.indent_str);
    }
}

fn write_char_ref(out: &mut String, c: char) {
    let _ = write!(out, "&#x{:X};", u32::from(c));
}

/// Escapes text content: `& < >`, `\r`, and other control characters.
fn write_escaped_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(c),
            c if u32::from(c) < 0x20 => write_char_ref(out, c),
            _ => out.push(c),
        }
    }
}

/// Escapes an attribute value for double-quoted output.
fn write_escaped_attr(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if u32::from(c) < 0x20 => write_char_ref(out, c),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::Namespace;
    use pretty_assertions::assert_eq;

    fn element(tree: &mut Tree, name: &str) -> NodeId {
        tree.create_node(NodeKind::Element { name: name.to_string() })
    }

    fn text(tree: &mut Tree, content: &str) -> NodeId {
        tree.create_node(NodeKind::Text { content: content.to_string() })
    }

    fn sample() -> (Tree, NodeId) {
        let mut tree = Tree::new_document();
        let root = element(&mut tree, "root");
        tree.set_attribute(root, "attr", "1", None);
        let child = element(&mut tree, "child");
        tree.append_child(root, child);
        let doc = tree.root();
        tree.append_child(doc, root);
        (tree, root)
    }

    #[test]
    fn test_render_node_compact() {
        let (tree, root) = sample();
        let out = render_node(&tree, root, &SerializeOptions::default()).unwrap();
        assert_eq!(out, r#"<root attr="1"><child/></root>"#);
    }

    #[test]
    fn test_render_document_declaration() {
        let (tree, _) = sample();
        let out = render_document(&tree, &SerializeOptions::default()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root attr=\"1\"><child/></root>\n"
        );
    }

    #[test]
    fn test_render_document_unknown_encoding() {
        let (tree, _) = sample();
        let err = render_document(&tree, &SerializeOptions::default().encoding("bogus")).unwrap_err();
        assert_eq!(err.domain, ErrorDomain::Output);
        assert_eq!(err.code, codes::SAVE_UNKNOWN_ENCODING);
        assert_eq!(err.str1, "bogus");
    }

    #[test]
    fn test_render_released_node() {
        let (mut tree, root) = sample();
        tree.detach(root);
        tree.release_subtree(root);
        let err = render_node(&tree, root, &SerializeOptions::default()).unwrap_err();
        assert_eq!(err.code, codes::SAVE_RELEASED);
    }

    #[test]
    fn test_indent_element_only_content() {
        let (mut tree, root) = sample();
        let mixed = element(&mut tree, "mixed");
        let t = text(&mut tree, "a");
        let b = element(&mut tree, "b");
        tree.append_child(mixed, t);
        tree.append_child(mixed, b);
        tree.append_child(root, mixed);
        let out = render_node(&tree, root, &SerializeOptions::default().indent(true)).unwrap();
        assert_eq!(out, "<root attr=\"1\">\n  <child/>\n  <mixed>a<b/></mixed>\n</root>");
    }

    #[test]
    fn test_escaping() {
        let mut tree = Tree::new_document();
        let p = element(&mut tree, "p");
        tree.set_attribute(p, "q", "\"a\"\t<&>\n", None);
        let t = text(&mut tree, "a < b & c > d\r");
        tree.append_child(p, t);
        let out = render_node(&tree, p, &SerializeOptions::default()).unwrap();
        assert_eq!(
            out,
            "<p q=\"&quot;a&quot;&#9;&lt;&amp;&gt;&#10;\">a &lt; b &amp; c &gt; d&#13;</p>"
        );
    }

    #[test]
    fn test_comment_pi_cdata() {
        let mut tree = Tree::new_document();
        let r = element(&mut tree, "r");
        for kind in [
            NodeKind::Comment { content: " c ".to_string() },
            NodeKind::ProcessingInstruction { target: "pi".to_string(), data: Some("x".to_string()) },
            NodeKind::CData { content: "<raw>".to_string() },
        ] {
            let id = tree.create_node(kind);
            tree.append_child(r, id);
        }
        let out = render_node(&tree, r, &SerializeOptions::default()).unwrap();
        assert_eq!(out, "<r><!-- c --><?pi x?><![CDATA[<raw>]]></r>");
    }

    #[test]
    fn test_detached_subtree_gets_namespace_declarations() {
        let mut tree = Tree::new_document();
        let ns = Namespace::new("urn:x", Some("x"));
        let outer = element(&mut tree, "outer");
        tree.node_mut(outer).ns_defs.push(ns.clone());
        tree.node_mut(outer).namespace = Some(ns.clone());
        let inner = element(&mut tree, "inner");
        tree.node_mut(inner).namespace = Some(ns.clone());
        tree.set_attribute(inner, "k", "v", Some(ns));
        tree.append_child(outer, inner);

        let whole = render_node(&tree, outer, &SerializeOptions::default()).unwrap();
        assert_eq!(whole, r#"<x:outer xmlns:x="urn:x"><x:inner x:k="v"/></x:outer>"#);
        let part = render_node(&tree, inner, &SerializeOptions::default()).unwrap();
        assert_eq!(part, r#"<x:inner xmlns:x="urn:x" x:k="v"/>"#);
    }

    #[test]
    fn test_default_namespace_undeclared_for_plain_child() {
        let mut tree = Tree::new_document();
        let ns = Namespace::new("urn:d", None);
        let outer = element(&mut tree, "outer");
        tree.node_mut(outer).namespace = Some(ns);
        let inner = element(&mut tree, "inner");
        tree.append_child(outer, inner);
        let out = render_node(&tree, outer, &SerializeOptions::default()).unwrap();
        assert_eq!(out, r#"<outer xmlns="urn:d"><inner xmlns=""/></outer>"#);
    }

    #[test]
    fn test_doctype_with_internal_subset() {
        let mut tree = Tree::new_document();
        let doctype = tree.create_node(NodeKind::DocumentType {
            name: "r".to_string(),
            system_id: Some("r.dtd".to_string()),
            public_id: None,
        });
        let decl = tree.create_node(NodeKind::Declaration {
            kind: crate::tree::DeclarationKind::Entity,
            name: "e".to_string(),
            body: "\"v\"".to_string(),
        });
        tree.append_child(doctype, decl);
        let mut out = String::new();
        write_doctype(&tree, doctype, &mut out);
        assert_eq!(out, "<!DOCTYPE r SYSTEM \"r.dtd\" [\n<!ENTITY e \"v\">\n]>");
    }
}
