//! The node handle: constructors, accessors, attributes, and rendering.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::engine::codes;
use crate::error::{Error, Result};
use crate::serial::{self, SerializeOptions};
use crate::tree::{Namespace, NodeId, NodeKind, NodeType, Tree, TreeRef};

use super::{ensure_live, follow, Document, Ownership};

/// A handle to a node in a tree.
///
/// # Examples
///
/// ```
/// use xmlhandle::{Node, Ownership};
///
/// let root = Node::new_element("root");
/// root.set_attribute("attr", "1").unwrap();
/// let mut child = Node::new_element("child");
/// root.add_child(&mut child).unwrap();
///
/// assert_eq!(root.ownership(), Ownership::Owned);
/// assert_eq!(child.ownership(), Ownership::View);
/// assert_eq!(root.serialize(false), r#"<root attr="1"><child/></root>"#);
/// ```
pub struct Node {
    loc: RefCell<(TreeRef, NodeId)>,
    pub(super) ownership: Ownership,
}

impl Node {
    pub(crate) fn new(tree: TreeRef, id: NodeId, ownership: Ownership) -> Self {
        Self {
            loc: RefCell::new((tree, id)),
            ownership,
        }
    }

    pub(crate) fn view(tree: TreeRef, id: NodeId) -> Self {
        Self::new(tree, id, Ownership::View)
    }

    fn standalone(kind: NodeKind) -> Self {
        let mut tree = Tree::new_scratch();
        let id = tree.create_node(kind);
        Self::new(Rc::new(RefCell::new(tree)), id, Ownership::Owned)
    }

    /// Creates an element in a fresh arena, owned by the returned handle.
    #[must_use]
    pub fn new_element(name: &str) -> Self {
        Self::standalone(NodeKind::Element { name: name.to_string() })
    }

    /// Creates an element in the namespace `ns`.
    ///
    /// The namespace is not declared on the element; serialization adds the
    /// declaration where it is needed.
    #[must_use]
    pub fn new_element_ns(name: &str, ns: &Namespace) -> Self {
        let node = Self::new_element(name);
        {
            let (tree, id) = node.locate();
            tree.borrow_mut().node_mut(id).namespace = Some(ns.clone());
        }
        node
    }

    #[must_use]
    pub fn new_text(content: &str) -> Self {
        Self::standalone(NodeKind::Text { content: content.to_string() })
    }

    #[must_use]
    pub fn new_cdata(content: &str) -> Self {
        Self::standalone(NodeKind::CData { content: content.to_string() })
    }

    #[must_use]
    pub fn new_comment(content: &str) -> Self {
        Self::standalone(NodeKind::Comment { content: content.to_string() })
    }

    #[must_use]
    pub fn new_processing_instruction(target: &str, data: Option<&str>) -> Self {
        Self::standalone(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.map(str::to_string),
        })
    }

    // --- Location ---

    /// The arena and id the node lives at now, after following any
    /// forwarding left by a cross-arena move.
    pub(crate) fn locate(&self) -> (TreeRef, NodeId) {
        let (tree, id) = {
            let loc = self.loc.borrow();
            (Rc::clone(&loc.0), loc.1)
        };
        let (tree, id) = follow(tree, id);
        *self.loc.borrow_mut() = (Rc::clone(&tree), id);
        (tree, id)
    }

    pub(super) fn relocate(&mut self, tree: TreeRef, id: NodeId) {
        *self.loc.get_mut() = (tree, id);
    }

    /// The location, or a structural error if the node was released.
    pub(crate) fn live(&self) -> Result<(TreeRef, NodeId)> {
        let (tree, id) = self.locate();
        ensure_live(&tree.borrow(), id)?;
        Ok((tree, id))
    }

    /// Runs `f` on a live node; `None` once it has been released.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Tree, NodeId) -> R) -> Option<R> {
        let (tree, id) = self.locate();
        let tree = tree.borrow();
        tree.is_live(id).then(|| f(&tree, id))
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Tree, NodeId) -> Result<R>) -> Result<R> {
        let (tree, id) = self.locate();
        let mut tree = tree.borrow_mut();
        ensure_live(&tree, id)?;
        f(&mut tree, id)
    }

    fn related(&self, step: impl FnOnce(&Tree, NodeId) -> Option<NodeId>) -> Option<Node> {
        let (tree, id) = self.locate();
        let next = {
            let t = tree.borrow();
            if !t.is_live(id) {
                return None;
            }
            step(&t, id)?
        };
        Some(Node::view(tree, next))
    }

    // --- Accessors ---

    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The node's type, or `None` once it has been released.
    #[must_use]
    pub fn node_type(&self) -> Option<NodeType> {
        self.read(|t, id| t.node(id).kind.node_type())
    }

    /// The local name. Processing instructions report their target.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.read(|t, id| t.name(id).map(str::to_string)).flatten()
    }

    /// The name with its namespace prefix.
    #[must_use]
    pub fn qualified_name(&self) -> Option<String> {
        self.read(|t, id| t.qualified_name(id)).flatten()
    }

    /// Renames the node.
    ///
    /// # Errors
    ///
    /// Fails if the node was released or its kind carries no name.
    pub fn set_name(&self, name: &str) -> Result<()> {
        self.write(|t, id| {
            if t.set_name(id, name) {
                Ok(())
            } else {
                Err(Error::structural(codes::TREE_WRONG_KIND, "node kind has no name"))
            }
        })
    }

    /// The text content: the concatenated text of an element's descendants,
    /// or a leaf's own content.
    #[must_use]
    pub fn content(&self) -> Option<String> {
        self.read(Tree::text_content)
    }

    /// Replaces the content. An element loses its children and gets a
    /// single text child.
    ///
    /// # Errors
    ///
    /// Fails if the node was released.
    pub fn set_content(&self, content: &str) -> Result<()> {
        self.write(|t, id| {
            t.set_content(id, content);
            Ok(())
        })
    }

    #[must_use]
    pub fn namespace(&self) -> Option<Namespace> {
        self.read(|t, id| t.node(id).namespace.clone()).flatten()
    }

    /// Puts an element or attribute in a namespace, or takes it out with
    /// `None`.
    ///
    /// # Errors
    ///
    /// Fails if the node was released or is neither an element nor an
    /// attribute.
    pub fn set_namespace(&self, ns: Option<&Namespace>) -> Result<()> {
        self.write(|t, id| {
            if !matches!(t.node(id).kind, NodeKind::Element { .. } | NodeKind::Attribute { .. }) {
                return Err(Error::structural(codes::TREE_WRONG_KIND, "only elements and attributes have namespaces"));
            }
            t.node_mut(id).namespace = ns.cloned();
            Ok(())
        })
    }

    /// Declares a namespace on this element and returns the definition.
    ///
    /// Redeclaring a prefix already declared here replaces the old binding.
    ///
    /// # Errors
    ///
    /// Fails if the node was released or is not an element.
    pub fn declare_namespace(&self, href: &str, prefix: Option<&str>) -> Result<Namespace> {
        self.write(|t, id| {
            if !matches!(t.node(id).kind, NodeKind::Element { .. }) {
                return Err(Error::structural(codes::TREE_WRONG_KIND, "namespaces are declared on elements"));
            }
            let ns = Namespace::new(href, prefix);
            let defs = &mut t.node_mut(id).ns_defs;
            defs.retain(|d| d.prefix() != ns.prefix());
            defs.push(ns.clone());
            Ok(ns)
        })
    }

    /// Resolves a prefix (`None` for the default namespace) in this node's
    /// scope.
    #[must_use]
    pub fn lookup_namespace(&self, prefix: Option<&str>) -> Option<Namespace> {
        self.read(|t, id| t.lookup_namespace(id, prefix)).flatten()
    }

    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.related(Tree::parent)
    }

    #[must_use]
    pub fn first_child(&self) -> Option<Node> {
        self.related(Tree::first_child)
    }

    #[must_use]
    pub fn last_child(&self) -> Option<Node> {
        self.related(Tree::last_child)
    }

    #[must_use]
    pub fn next_sibling(&self) -> Option<Node> {
        self.related(Tree::next_sibling)
    }

    #[must_use]
    pub fn prev_sibling(&self) -> Option<Node> {
        self.related(Tree::prev_sibling)
    }

    /// Views of the children, in order. Empty once released.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        let (tree, id) = self.locate();
        let ids: Vec<NodeId> = {
            let t = tree.borrow();
            if !t.is_live(id) {
                return Vec::new();
            }
            t.children(id).collect()
        };
        ids.into_iter().map(|c| Node::view(Rc::clone(&tree), c)).collect()
    }

    /// Views of the attribute nodes, in order.
    #[must_use]
    pub fn attributes(&self) -> Vec<Node> {
        let (tree, _) = self.locate();
        let ids = self.read(|t, id| t.node(id).attributes.clone()).unwrap_or_default();
        ids.into_iter().map(|a| Node::view(Rc::clone(&tree), a)).collect()
    }

    /// A view of the document this node is attached to, if any.
    #[must_use]
    pub fn document(&self) -> Option<Document> {
        let (tree, id) = self.locate();
        let attached = {
            let t = tree.borrow();
            t.is_live(id) && t.in_document(id)
        };
        attached.then(|| Document::from_tree(tree, Ownership::View))
    }

    /// The line the node was parsed from, 0 for constructed nodes.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.read(|t, id| t.node(id).line).unwrap_or(0)
    }

    /// A location path selecting exactly this node, e.g. `/root/child[2]`.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.read(Tree::path)
    }

    /// Whether both handles refer to the same node.
    #[must_use]
    pub fn is_same_node(&self, other: &Node) -> bool {
        let (a_tree, a) = self.locate();
        let (b_tree, b) = other.locate();
        Rc::ptr_eq(&a_tree, &b_tree) && a == b
    }

    // --- Attributes ---

    /// Sets an attribute without a namespace, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Fails if the node was released or is not an element.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.put_attribute(name, value, None)
    }

    /// Sets an attribute in the namespace `ns`.
    ///
    /// # Errors
    ///
    /// Fails if the node was released or is not an element.
    pub fn set_attribute_ns(&self, name: &str, value: &str, ns: &Namespace) -> Result<()> {
        self.put_attribute(name, value, Some(ns.clone()))
    }

    fn put_attribute(&self, name: &str, value: &str, ns: Option<Namespace>) -> Result<()> {
        self.write(|t, id| {
            if !matches!(t.node(id).kind, NodeKind::Element { .. }) {
                return Err(Error::structural(codes::TREE_WRONG_KIND, "only elements have attributes"));
            }
            t.set_attribute(id, name, value, ns);
            Ok(())
        })
    }

    /// The value of an attribute matched by local name and namespace href.
    /// With `ns_href == None` only attributes without a namespace match.
    #[must_use]
    pub fn get_attribute(&self, name: &str, ns_href: Option<&str>) -> Option<String> {
        self.read(|t, id| {
            let attr = t.attribute(id, name, ns_href)?;
            Some(t.text_content(attr))
        })
        .flatten()
    }

    /// Removes an attribute. Returns `false` if there was none to remove.
    pub fn remove_attribute(&self, name: &str, ns_href: Option<&str>) -> bool {
        let (tree, id) = self.locate();
        let mut t = tree.borrow_mut();
        t.is_live(id) && t.remove_attribute(id, name, ns_href)
    }

    // --- Copying and rendering ---

    /// Copies the subtree into a new standalone subtree owned by the
    /// returned handle.
    ///
    /// # Errors
    ///
    /// Fails if the node was released or is a document node.
    pub fn deep_copy(&self) -> Result<Node> {
        let (tree, copy) = {
            let (tree, id) = self.locate();
            let copy = {
                let mut t = tree.borrow_mut();
                ensure_live(&t, id)?;
                if matches!(t.node(id).kind, NodeKind::Document) {
                    return Err(Error::structural(codes::TREE_WRONG_KIND, "use Document::deep_copy to copy a document"));
                }
                t.copy_subtree(id)
            };
            (tree, copy)
        };
        Ok(Node::new(tree, copy, Ownership::Owned))
    }

    /// Renders the subtree as XML, without a declaration. Returns `""` if
    /// the node was released.
    #[must_use]
    pub fn serialize(&self, indent: bool) -> String {
        self.try_serialize(indent).unwrap_or_default()
    }

    /// Like [`serialize`](Self::serialize), but reports why rendering failed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Output` if the node was released.
    pub fn try_serialize(&self, indent: bool) -> Result<String> {
        let (tree, id) = self.locate();
        let options = SerializeOptions::default().indent(indent);
        let out = serial::render_node(&tree.borrow(), id, &options);
        out.map_err(Error::Output)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if self.ownership != Ownership::Owned {
            return;
        }
        let (tree, id) = self.locate();
        let Ok(mut t) = tree.try_borrow_mut() else {
            return;
        };
        if t.is_live(id) && t.parent(id).is_none() && id != t.root() {
            tracing::trace!(node = ?id, "releasing standalone subtree");
            t.release_subtree(id);
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, id) = self.locate();
        f.debug_struct("Node")
            .field("id", &id)
            .field("ownership", &self.ownership)
            .field("type", &self.node_type())
            .field("name", &self.qualified_name())
            .finish()
    }
}
