//! The document handle.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::encoding;
use crate::engine::{codes, Diagnostics};
use crate::error::{Error, ErrorDomain, ErrorLevel, Result, XmlError};
use crate::parser::{self, ParseOptions};
use crate::serial::{self, SerializeOptions};
use crate::tree::{NodeKind, Tree, TreeRef};

use super::mutate::{link, Placement};
use super::{ensure_live, Node, Ownership};

/// A handle to a whole document.
///
/// The owning handle releases every node reachable from the document node
/// when it is dropped. Views returned by [`Node::document`] do not.
///
/// # Examples
///
/// ```
/// use xmlhandle::Document;
///
/// let doc = Document::parse_str("<catalog><book id='1'/></catalog>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(root.name().as_deref(), Some("catalog"));
///
/// let books = doc.evaluate("/catalog/book[@id = '1']", &[]).unwrap();
/// assert_eq!(books.len(), 1);
/// ```
pub struct Document {
    tree: TreeRef,
    ownership: Ownership,
}

impl Document {
    pub(crate) fn from_tree(tree: TreeRef, ownership: Ownership) -> Self {
        Self { tree, ownership }
    }

    fn owned(tree: Tree) -> Self {
        Self::from_tree(Rc::new(RefCell::new(tree)), Ownership::Owned)
    }

    /// Creates an empty document with version `1.0`.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Tree::new_document();
        tree.version = Some("1.0".to_string());
        Self::owned(tree)
    }

    /// Parses a document from bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` carrying the fatal diagnostic if the input is
    /// not well-formed or cannot be decoded.
    pub fn parse(bytes: &[u8], options: &ParseOptions) -> Result<Self> {
        Self::parse_with(bytes, options, &mut Diagnostics::new())
    }

    /// Parses an XML document from a string.
    ///
    /// # Errors
    ///
    /// As for [`parse`](Self::parse).
    pub fn parse_str(text: &str) -> Result<Self> {
        Self::parse(text.as_bytes(), &ParseOptions::default())
    }

    /// Parses an HTML document. The HTML parser recovers from most errors;
    /// what it recovered from is available through
    /// [`warnings`](Self::warnings).
    ///
    /// # Errors
    ///
    /// As for [`parse`](Self::parse).
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlhandle::Document;
    ///
    /// let doc = Document::parse_html("<p>one<p>two").unwrap();
    /// assert!(doc.is_html());
    /// assert_eq!(doc.evaluate("//p", &[]).unwrap().len(), 2);
    /// ```
    pub fn parse_html(text: &str) -> Result<Self> {
        Self::parse(text.as_bytes(), &ParseOptions::default().html(true))
    }

    /// Reads and parses a file. The path is recorded as the document URL and
    /// stamped on diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if the file cannot be read (domain `Io`) or
    /// does not parse.
    pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Parse(XmlError {
                domain: ErrorDomain::Io,
                code: codes::IO_LOAD_ERROR,
                message: format!("failed to load \"{name}\": {e}"),
                level: ErrorLevel::Fatal,
                file: name.clone(),
                str1: name.clone(),
                ..XmlError::default()
            })
        })?;
        Self::parse_with(&bytes, options, &mut Diagnostics::for_file(&name))
    }

    fn parse_with(bytes: &[u8], options: &ParseOptions, diags: &mut Diagnostics) -> Result<Self> {
        let tree = parser::parse_bytes(bytes, options, diags).ok_or_else(|| Error::Parse(diags.last_error()))?;
        for warning in &tree.warnings {
            tracing::debug!(code = warning.code, line = warning.line, "{}", warning.message);
        }
        Ok(Self::owned(tree))
    }

    // --- Properties ---

    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    #[must_use]
    pub fn version(&self) -> Option<String> {
        self.tree.borrow().version.clone()
    }

    #[must_use]
    pub fn encoding(&self) -> Option<String> {
        self.tree.borrow().encoding.clone()
    }

    #[must_use]
    pub fn standalone(&self) -> Option<bool> {
        self.tree.borrow().standalone
    }

    /// The file the document was parsed from.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.tree.borrow().url.clone()
    }

    #[must_use]
    pub fn is_html(&self) -> bool {
        self.tree.borrow().html
    }

    /// Non-fatal diagnostics recorded while parsing.
    #[must_use]
    pub fn warnings(&self) -> Vec<XmlError> {
        self.tree.borrow().warnings.clone()
    }

    // --- Tree access ---

    /// A view of the root element.
    #[must_use]
    pub fn root_element(&self) -> Option<Node> {
        let root = self.tree.borrow().root_element()?;
        Some(Node::view(Rc::clone(&self.tree), root))
    }

    /// Makes `node` the root element, replacing and releasing the current
    /// one. Ownership follows the rules of [`Node::add_child`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Structural` if the document or `node` was released,
    /// or `node` is not an element.
    pub fn set_root_element(&self, node: &mut Node) -> Result<Node> {
        let (root, current) = {
            let t = self.tree.borrow();
            ensure_live(&t, t.root())?;
            (t.root(), t.root_element())
        };
        let is_element = node.read(|t, id| matches!(t.node(id).kind, NodeKind::Element { .. }));
        if is_element == Some(false) {
            return Err(Error::structural(codes::TREE_WRONG_KIND, "the root must be an element"));
        }
        if let Some(current) = current {
            if node.is_same_node(&Node::view(Rc::clone(&self.tree), current)) {
                return Ok(Node::view(Rc::clone(&self.tree), current));
            }
        }

        let copy = node.ownership() == Ownership::View || node.read(|t, id| t.parent(id).is_some()).unwrap_or(false);
        let linked = match current {
            Some(current) => link(&self.tree, current, Placement::Replace, node, copy)?,
            None => link(&self.tree, root, Placement::Append, node, copy)?,
        };
        Ok(Node::view(Rc::clone(&self.tree), linked))
    }

    fn create(&self, kind: NodeKind) -> Node {
        let id = self.tree.borrow_mut().create_node(kind);
        Node::new(Rc::clone(&self.tree), id, Ownership::Owned)
    }

    /// Creates a detached element in this document's arena.
    #[must_use]
    pub fn create_element(&self, name: &str) -> Node {
        self.create(NodeKind::Element { name: name.to_string() })
    }

    #[must_use]
    pub fn create_text(&self, content: &str) -> Node {
        self.create(NodeKind::Text { content: content.to_string() })
    }

    #[must_use]
    pub fn create_comment(&self, content: &str) -> Node {
        self.create(NodeKind::Comment { content: content.to_string() })
    }

    /// Evaluates an `XPath` expression with the document node as context.
    ///
    /// # Errors
    ///
    /// As for [`Node::evaluate`].
    pub fn evaluate(&self, expression: &str, namespaces: &[(&str, &str)]) -> Result<Vec<Node>> {
        let root = self.tree.borrow().root();
        Node::view(Rc::clone(&self.tree), root).evaluate(expression, namespaces)
    }

    /// Copies the whole document, properties included, into a new document
    /// owned by the returned handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Structural` if the document was released.
    pub fn deep_copy(&self) -> Result<Document> {
        let source = self.tree.borrow();
        ensure_live(&source, source.root())?;

        let mut copy = Tree::new_document();
        copy.version.clone_from(&source.version);
        copy.encoding.clone_from(&source.encoding);
        copy.standalone = source.standalone;
        copy.url.clone_from(&source.url);
        copy.html = source.html;
        copy.warnings.clone_from(&source.warnings);

        let mut mapping = Vec::new();
        for child in source.children(source.root()) {
            let fragment = source.snapshot(child);
            let id = copy.graft(&fragment, &mut mapping);
            let root = copy.root();
            copy.append_child(root, id);
        }
        tracing::debug!(nodes = mapping.len(), "copied document");
        Ok(Self::owned(copy))
    }

    // --- Output ---

    /// Renders the document. Returns `""` if the document was released or
    /// `encoding` is unknown.
    #[must_use]
    pub fn serialize(&self, indent: bool, encoding: Option<&str>) -> String {
        self.try_serialize(indent, encoding).unwrap_or_default()
    }

    /// Like [`serialize`](Self::serialize), but reports why rendering failed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Output` if the document was released or `encoding`
    /// is unknown.
    pub fn try_serialize(&self, indent: bool, encoding: Option<&str>) -> Result<String> {
        let mut options = SerializeOptions::default().indent(indent);
        if let Some(label) = encoding {
            options = options.encoding(label);
        }
        let out = serial::render_document(&self.tree.borrow(), &options);
        out.map_err(Error::Output)
    }

    /// Renders the document and encodes it. Characters the encoding cannot
    /// represent become character references.
    ///
    /// # Errors
    ///
    /// As for [`try_serialize`](Self::try_serialize).
    pub fn serialize_to_bytes(&self, indent: bool, encoding: Option<&str>) -> Result<Vec<u8>> {
        let text = self.try_serialize(indent, encoding)?;
        let label = encoding.unwrap_or("UTF-8");
        encoding::encode(&text, label).map_err(|e| {
            Error::Output(XmlError {
                domain: ErrorDomain::Output,
                code: codes::SAVE_UNKNOWN_ENCODING,
                message: e.message,
                level: ErrorLevel::Error,
                str1: label.to_string(),
                ..XmlError::default()
            })
        })
    }

    /// Writes the encoded document to `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Output` if rendering fails or the file cannot be
    /// written.
    pub fn save_file(&self, path: impl AsRef<Path>, indent: bool, encoding: Option<&str>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.serialize_to_bytes(indent, encoding)?;
        std::fs::write(path, &bytes).map_err(|e| {
            let name = path.display().to_string();
            Error::Output(XmlError {
                domain: ErrorDomain::Io,
                code: codes::IO_WRITE,
                message: format!("failed to write \"{name}\": {e}"),
                level: ErrorLevel::Error,
                file: name,
                ..XmlError::default()
            })
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved document");
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        if self.ownership != Ownership::Owned {
            return;
        }
        if let Ok(mut tree) = self.tree.try_borrow_mut() {
            let nodes = tree.node_count();
            tree.release_document();
            tracing::debug!(nodes, "released document");
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree.borrow();
        f.debug_struct("Document")
            .field("ownership", &self.ownership)
            .field("version", &tree.version)
            .field("html", &tree.html)
            .field("nodes", &tree.node_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_document() {
        let doc = Document::new();
        assert_eq!(doc.version().as_deref(), Some("1.0"));
        assert!(doc.root_element().is_none());
        assert_eq!(doc.serialize(false, None), "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }

    #[test]
    fn test_set_root_element_replaces() {
        let doc = Document::parse_str("<old><x/></old>").unwrap();
        let old_child = doc.evaluate("//x", &[]).unwrap().remove(0);

        let mut fresh = Node::new_element("fresh");
        doc.set_root_element(&mut fresh).unwrap();
        assert_eq!(fresh.ownership(), Ownership::View);
        assert_eq!(doc.root_element().unwrap().name().as_deref(), Some("fresh"));
        assert_eq!(old_child.node_type(), None);
    }

    #[test]
    fn test_second_root_is_rejected() {
        let doc = Document::parse_str("<r/>").unwrap();
        let doc_node = doc.root_element().unwrap().parent().unwrap();
        let err = doc_node.add_child(&mut doc.create_element("other")).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_SECOND_ROOT);
        doc_node.add_child(&mut doc.create_comment("ok")).unwrap();
        assert_eq!(
            doc.serialize(false, None),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r/>\n<!--ok-->\n"
        );
    }

    #[test]
    fn test_copy_of_root_is_rejected_as_second_root() {
        let doc = Document::parse_str("<r><c/></r>").unwrap();
        let mut root = doc.root_element().unwrap();
        let doc_node = root.parent().unwrap();

        let err = doc_node.add_child(&mut root).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_SECOND_ROOT);
        let tail = doc_node.last_child().unwrap();
        let err = tail.set_next(&mut doc.create_element("r")).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_SECOND_ROOT);

        assert_eq!(doc.evaluate("/*", &[]).unwrap().len(), 1);
        assert_eq!(
            doc.serialize(false, None),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r><c/></r>\n"
        );
    }

    #[test]
    fn test_parse_error() {
        let err = Document::parse_str("<a><b></a>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        let diag = err.diagnostic();
        assert_eq!(diag.domain, ErrorDomain::Parser);
        assert_eq!(diag.level, ErrorLevel::Fatal);
        assert_eq!(diag.line, 1);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let doc = Document::parse_str("<?xml version='1.0' standalone='yes'?><r a='1'><c>t</c></r>").unwrap();
        let copy = doc.deep_copy().unwrap();
        assert_eq!(copy.ownership(), Ownership::Owned);
        assert_eq!(copy.serialize(false, None), doc.serialize(false, None));

        copy.root_element().unwrap().set_attribute("a", "2").unwrap();
        assert_eq!(doc.root_element().unwrap().get_attribute("a", None).as_deref(), Some("1"));
        drop(doc);
        assert_eq!(copy.standalone(), Some(true));
        assert_eq!(copy.evaluate("string(/r/c)", &[]).unwrap().len(), 0);
        assert_eq!(copy.root_element().unwrap().content().as_deref(), Some("t"));
    }

    #[test]
    fn test_drop_releases_views() {
        let doc = Document::parse_str("<r><c/></r>").unwrap();
        let c = doc.root_element().unwrap().first_child().unwrap();
        let view = c.document().unwrap();
        assert_eq!(view.ownership(), Ownership::View);
        drop(view);
        assert_eq!(c.name().as_deref(), Some("c"));
        drop(doc);
        assert_eq!(c.name(), None);
        assert!(c.set_attribute("k", "v").is_err());
    }

    #[test]
    fn test_encoded_output() {
        let doc = Document::parse_str("<r>caf\u{e9} \u{263a}</r>").unwrap();
        let bytes = doc.serialize_to_bytes(false, Some("ISO-8859-1")).unwrap();
        assert_eq!(
            bytes,
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<r>caf\xE9 &#9786;</r>\n".to_vec()
        );
        assert_eq!(doc.serialize(false, Some("no-such-charset")), "");
        let err = doc.try_serialize(false, Some("no-such-charset")).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::SAVE_UNKNOWN_ENCODING);
    }
}
