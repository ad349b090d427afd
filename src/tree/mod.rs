//! Arena-based document tree.
//!
//! All nodes of one tree live in a `Vec` of slots owned by a [`Tree`] and are
//! referenced by [`NodeId`], a slot index paired with the slot's generation.
//! Parent, child, and sibling links are ids into the same arena, never
//! owning pointers.
//!
//! # Slots
//!
//! A slot is live, free, or moved. Releasing a node frees its slot for reuse
//! and the next node allocated there gets a new generation, so an id that
//! outlived its node is detected instead of silently aliasing the newer node.
//! A moved slot forwards to the slot that received the node when its subtree
//! was transplanted into another arena; handles follow the forwarding record
//! the next time they are used. Moved slots are not reused.
//!
//! # Document node
//!
//! Every arena has a document node at a fixed id. In a real document it is
//! the parent of the root element; in a scratch arena (created for a
//! standalone node constructor) it stays empty.

mod namespace;
mod node;

pub use namespace::{Namespace, XML_NAMESPACE};
pub use node::{DeclarationKind, NodeKind, NodeType};

use std::cell::RefCell;
use std::num::NonZeroU32;
use std::rc::{Rc, Weak};

use crate::error::XmlError;

/// A tree shared between handles.
pub(crate) type TreeRef = Rc<RefCell<Tree>>;

/// A typed index into a tree's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: NonZeroU32,
    generation: u32,
}

impl NodeId {
    /// Creates a `NodeId` from a raw index and slot generation.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0.
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn new(index: usize, generation: u32) -> Self {
        Self {
            index: NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"),
            generation,
        }
    }

    fn as_index(self) -> usize {
        self.index.get() as usize
    }
}

/// Storage for a single live node.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// The namespace of an element or attribute.
    pub namespace: Option<Namespace>,
    /// Namespaces declared on this element (`xmlns` / `xmlns:p`).
    pub ns_defs: Vec<Namespace>,
    /// Attribute nodes of an element, in document order.
    pub attributes: Vec<NodeId>,
    /// Source line for parsed nodes, 0 otherwise.
    pub line: u32,
    /// Parent node. For an attribute, the owning element.
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            namespace: None,
            ns_defs: Vec::new(),
            attributes: Vec::new(),
            line: 0,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Live {
        generation: u32,
        data: Box<NodeData>,
    },
    Free {
        generation: u32,
    },
    Moved {
        generation: u32,
        tree: Weak<RefCell<Tree>>,
        id: NodeId,
    },
}

impl Slot {
    fn generation(&self) -> u32 {
        match self {
            Self::Live { generation, .. } | Self::Free { generation } | Self::Moved { generation, .. } => {
                *generation
            }
        }
    }
}

/// A node arena with its document node and document properties.
#[derive(Debug)]
pub struct Tree {
    slots: Vec<Slot>,
    /// Indices of free slots, reused before the arena grows.
    free: Vec<usize>,
    root: NodeId,
    is_document: bool,
    /// XML version from the declaration.
    pub version: Option<String>,
    /// Encoding from the declaration or the parse options.
    pub encoding: Option<String>,
    /// Standalone flag from the declaration.
    pub standalone: Option<bool>,
    /// The file this tree was parsed from.
    pub url: Option<String>,
    /// Whether the tree came from the HTML parser.
    pub html: bool,
    /// Non-fatal diagnostics recorded while parsing.
    pub warnings: Vec<XmlError>,
}

impl Tree {
    /// Creates the arena of a real document.
    #[must_use]
    pub fn new_document() -> Self {
        Self::with_kind(true)
    }

    /// Creates the arena backing standalone node constructors.
    #[must_use]
    pub fn new_scratch() -> Self {
        Self::with_kind(false)
    }

    fn with_kind(is_document: bool) -> Self {
        // Index 0 is a placeholder so ids can be NonZeroU32.
        let slots = vec![
            Slot::Free { generation: 0 },
            Slot::Live {
                generation: 0,
                data: Box::new(NodeData::new(NodeKind::Document)),
            },
        ];
        Self {
            slots,
            free: Vec::new(),
            root: NodeId::new(1, 0),
            is_document,
            version: None,
            encoding: None,
            standalone: None,
            url: None,
            html: false,
            warnings: Vec::new(),
        }
    }

    /// The arena's document node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether this arena belongs to a real document.
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.is_document
    }

    /// Whether `id` names a live node of this arena.
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        matches!(self.slot(id), Some(Slot::Live { .. }))
    }

    /// The slot `id` points at, if it still has the generation of `id`.
    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots
            .get(id.as_index())
            .filter(|slot| slot.generation() == id.generation)
    }

    /// Returns the node data if `id` is live.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        match self.slot(id) {
            Some(Slot::Live { data, .. }) => Some(&**data),
            _ => None,
        }
    }

    /// Returns the data of a live node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not live. Every id reachable through links of a
    /// live node is live.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn node(&self, id: NodeId) -> &NodeData {
        match self.slot(id) {
            Some(Slot::Live { data, .. }) => &**data,
            _ => panic!("node {} is not live", id.as_index()),
        }
    }

    #[allow(clippy::panic)]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        match self.slots.get_mut(id.as_index()) {
            Some(Slot::Live { generation, data }) if *generation == id.generation => &mut **data,
            _ => panic!("node {} is not live", id.as_index()),
        }
    }

    /// Follows the forwarding record of a moved slot.
    pub(crate) fn forwarded(&self, id: NodeId) -> Option<(TreeRef, NodeId)> {
        match self.slot(id) {
            Some(Slot::Moved { tree, id, .. }) => tree.upgrade().map(|tree| (tree, *id)),
            _ => None,
        }
    }

    /// Number of live nodes, including the document node.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Slot::Live { .. })).count()
    }

    /// Number of allocated slots, free and moved ones included.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    // --- Navigation ---

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// Returns a depth-first iterator over the descendants of a node.
    ///
    /// Attributes are not descendants.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// The top-most ancestor of `id` (possibly `id` itself).
    #[must_use]
    pub fn top_ancestor(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// Whether `id` hangs below the document node of a real document.
    #[must_use]
    pub fn in_document(&self, id: NodeId) -> bool {
        self.is_document && self.top_ancestor(id) == self.root
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// The first element child of the document node.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        if !self.is_live(self.root) {
            return None;
        }
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::Element { .. }))
    }

    // --- Names and content ---

    /// The local name of a named node.
    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name }
            | NodeKind::Attribute { name, .. }
            | NodeKind::EntityRef { name }
            | NodeKind::DocumentType { name, .. }
            | NodeKind::Declaration { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            _ => None,
        }
    }

    /// The name with its namespace prefix, e.g. `svg:rect`.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        let name = self.name(id)?;
        Some(match &self.node(id).namespace {
            Some(ns) => ns.qualify(name),
            None => name.to_string(),
        })
    }

    /// The namespace href of an element or attribute.
    #[must_use]
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.node(id).namespace.as_ref().map(Namespace::href)
    }

    /// The string value of a node.
    ///
    /// Containers concatenate their descendant text and CDATA; leaves return
    /// their own content.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Text { content } | NodeKind::CData { content } | NodeKind::Comment { content } => {
                content.clone()
            }
            NodeKind::Attribute { value, .. } => value.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone().unwrap_or_default(),
            NodeKind::Declaration { body, .. } => body.clone(),
            _ => {
                let mut buf = String::new();
                for d in self.descendants(id) {
                    if let NodeKind::Text { content } | NodeKind::CData { content } = &self.node(d).kind {
                        buf.push_str(content);
                    }
                }
                buf
            }
        }
    }

    /// Replaces the content of a node.
    ///
    /// Containers lose their children (released) and get one text child.
    pub fn set_content(&mut self, id: NodeId, content: &str) {
        if matches!(
            self.node(id).kind,
            NodeKind::Element { .. } | NodeKind::Document | NodeKind::DocumentFragment
        ) {
            let old: Vec<NodeId> = self.children(id).collect();
            for child in old {
                self.detach(child);
                self.release_subtree(child);
            }
            if !content.is_empty() {
                let text = self.create_node(NodeKind::Text {
                    content: content.to_string(),
                });
                self.append_child(id, text);
            }
            return;
        }
        match &mut self.node_mut(id).kind {
            NodeKind::Text { content: c } | NodeKind::CData { content: c } | NodeKind::Comment { content: c } => {
                *c = content.to_string();
            }
            NodeKind::Attribute { value, .. } => *value = content.to_string(),
            NodeKind::ProcessingInstruction { data, .. } => {
                *data = (!content.is_empty()).then(|| content.to_string());
            }
            NodeKind::Declaration { body, .. } => *body = content.to_string(),
            _ => {}
        }
    }

    /// Renames a named node. Returns false for unnamed kinds.
    pub fn set_name(&mut self, id: NodeId, new_name: &str) -> bool {
        match &mut self.node_mut(id).kind {
            NodeKind::Element { name }
            | NodeKind::Attribute { name, .. }
            | NodeKind::EntityRef { name }
            | NodeKind::ProcessingInstruction { target: name, .. } => {
                *name = new_name.to_string();
                true
            }
            _ => false,
        }
    }

    // --- Attributes ---

    /// Finds an attribute of `element` by local name and namespace href.
    ///
    /// With `href == None` only attributes without a namespace match.
    #[must_use]
    pub fn attribute(&self, element: NodeId, name: &str, href: Option<&str>) -> Option<NodeId> {
        self.node(element).attributes.iter().copied().find(|&attr| {
            self.name(attr) == Some(name) && self.namespace_uri(attr) == href
        })
    }

    /// Sets an attribute, overwriting the value of an existing one with the
    /// same name and namespace. Returns the attribute node.
    pub fn set_attribute(
        &mut self,
        element: NodeId,
        name: &str,
        value: &str,
        namespace: Option<Namespace>,
    ) -> NodeId {
        let href = namespace.as_ref().map(|ns| ns.href().to_string());
        if let Some(attr) = self.attribute(element, name, href.as_deref()) {
            let data = self.node_mut(attr);
            if let NodeKind::Attribute { value: v, .. } = &mut data.kind {
                *v = value.to_string();
            }
            data.namespace = namespace;
            return attr;
        }
        let attr = self.create_node(NodeKind::Attribute {
            name: name.to_string(),
            value: value.to_string(),
        });
        let data = self.node_mut(attr);
        data.namespace = namespace;
        data.parent = Some(element);
        self.node_mut(element).attributes.push(attr);
        attr
    }

    /// Removes and releases an attribute. Returns whether it existed.
    pub fn remove_attribute(&mut self, element: NodeId, name: &str, href: Option<&str>) -> bool {
        let Some(attr) = self.attribute(element, name, href) else {
            return false;
        };
        self.detach(attr);
        self.release_subtree(attr);
        true
    }

    // --- Namespaces ---

    /// Resolves a prefix (or the default namespace for `None`) in the scope
    /// of `id`.
    #[must_use]
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<Namespace> {
        if prefix == Some("xml") {
            return Some(Namespace::new(XML_NAMESPACE, Some("xml")));
        }
        self.ancestors(id)
            .flat_map(|a| self.node(a).ns_defs.iter())
            .find(|ns| ns.prefix() == prefix)
            .cloned()
    }

    // --- Mutation ---

    /// Allocates a new detached node.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let data = Box::new(NodeData::new(kind));
        if let Some(index) = self.free.pop() {
            let generation = self.slots[index].generation().wrapping_add(1);
            self.slots[index] = Slot::Live { generation, data };
            return NodeId::new(index, generation);
        }
        let index = self.slots.len();
        self.slots.push(Slot::Live { generation: 0, data });
        NodeId::new(index, 0)
    }

    fn free_slot(&mut self, id: NodeId) {
        let index = id.as_index();
        self.slots[index] = Slot::Free {
            generation: id.generation,
        };
        self.free.push(index);
    }

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
        } else {
            self.node_mut(parent).first_child = Some(child);
        }
        self.node_mut(parent).last_child = Some(child);
    }

    /// Inserts `new_child` before `reference`. Does nothing if `reference`
    /// has no parent.
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) {
        let Some(parent) = self.node(reference).parent else {
            return;
        };
        self.node_mut(new_child).parent = Some(parent);

        if let Some(prev) = self.node(reference).prev_sibling {
            self.node_mut(prev).next_sibling = Some(new_child);
            self.node_mut(new_child).prev_sibling = Some(prev);
        } else {
            self.node_mut(parent).first_child = Some(new_child);
        }

        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
    }

    /// Inserts `new_child` after `reference`. Does nothing if `reference`
    /// has no parent.
    pub fn insert_after(&mut self, reference: NodeId, new_child: NodeId) {
        let Some(parent) = self.node(reference).parent else {
            return;
        };
        match self.node(reference).next_sibling {
            Some(next) => self.insert_before(next, new_child),
            None => self.append_child(parent, new_child),
        }
    }

    /// Unlinks a node from its parent and siblings. The node stays live.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        if matches!(self.node(id).kind, NodeKind::Attribute { .. }) {
            self.node_mut(parent).attributes.retain(|&a| a != id);
            self.node_mut(id).parent = None;
            return;
        }

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        let data = self.node_mut(id);
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
    }

    /// Releases a detached node, its attributes, and all its descendants.
    pub fn release_subtree(&mut self, id: NodeId) {
        if !self.is_live(id) {
            return;
        }
        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            doomed.extend(self.node(current).attributes.iter().copied());
            doomed.extend(self.children(current));
            i += 1;
        }
        for node in doomed {
            self.free_slot(node);
        }
    }

    /// Releases the document node and everything reachable from it.
    ///
    /// Detached subtrees allocated in this arena stay live.
    pub fn release_document(&mut self) {
        if !self.is_live(self.root) {
            return;
        }
        let children: Vec<NodeId> = self.children(self.root).collect();
        for child in children {
            self.detach(child);
            self.release_subtree(child);
        }
        self.free_slot(self.root);
    }

    // --- Copying ---

    /// Copies the subtree at `id` into a new detached subtree of this arena.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let fragment = self.snapshot(id);
        self.graft(&fragment, &mut Vec::new())
    }

    /// Captures the subtree at `id`, attributes included.
    pub(crate) fn snapshot(&self, id: NodeId) -> Fragment {
        let mut queue = vec![(id, None)];
        let mut entries = Vec::new();
        let mut i = 0;
        while let Some(&(current, parent)) = queue.get(i) {
            let data = self.node(current);
            entries.push(FragmentNode {
                origin: current,
                parent,
                kind: data.kind.clone(),
                namespace: data.namespace.clone(),
                ns_defs: data.ns_defs.clone(),
                line: data.line,
            });
            queue.extend(data.attributes.iter().map(|&a| (a, Some(i))));
            queue.extend(self.children(current).map(|c| (c, Some(i))));
            i += 1;
        }
        Fragment { entries }
    }

    /// Rebuilds a captured subtree as a detached subtree of this arena,
    /// recording `(origin, copy)` pairs in `mapping`.
    pub(crate) fn graft(&mut self, fragment: &Fragment, mapping: &mut Vec<(NodeId, NodeId)>) -> NodeId {
        let mut created: Vec<NodeId> = Vec::with_capacity(fragment.entries.len());
        for entry in &fragment.entries {
            let id = self.create_node(entry.kind.clone());
            {
                let data = self.node_mut(id);
                data.namespace.clone_from(&entry.namespace);
                data.ns_defs.clone_from(&entry.ns_defs);
                data.line = entry.line;
            }
            mapping.push((entry.origin, id));
            if let Some(parent) = entry.parent.map(|p| created[p]) {
                if matches!(entry.kind, NodeKind::Attribute { .. }) {
                    self.node_mut(id).parent = Some(parent);
                    self.node_mut(parent).attributes.push(id);
                } else {
                    self.append_child(parent, id);
                }
            }
            created.push(id);
        }
        created[0]
    }

    /// Turns the slots of a transplanted subtree into forwarding records.
    pub(crate) fn forward(&mut self, mapping: &[(NodeId, NodeId)], target: &TreeRef) {
        for &(old, new) in mapping {
            self.slots[old.as_index()] = Slot::Moved {
                generation: old.generation,
                tree: Rc::downgrade(target),
                id: new,
            };
        }
    }

    // --- Paths ---

    /// A location path that selects exactly this node, e.g.
    /// `/catalog/book[2]/@id`.
    #[must_use]
    pub fn path(&self, id: NodeId) -> String {
        let mut steps = Vec::new();
        for current in self.ancestors(id) {
            match &self.node(current).kind {
                NodeKind::Document | NodeKind::DocumentFragment => {}
                NodeKind::Attribute { .. } => {
                    steps.push(format!("@{}", self.qualified_name(current).unwrap_or_default()));
                }
                _ => steps.push(self.indexed_step(current)),
            }
        }
        steps.reverse();
        format!("/{}", steps.join("/"))
    }

    fn indexed_step(&self, id: NodeId) -> String {
        let test = self.step_test(id);
        let Some(parent) = self.parent(id) else {
            return test;
        };
        let mut count = 0;
        let mut position = 0;
        for sibling in self.children(parent) {
            if self.step_test(sibling) == test {
                count += 1;
                if sibling == id {
                    position = count;
                }
            }
        }
        if count > 1 {
            format!("{test}[{position}]")
        } else {
            test
        }
    }

    fn step_test(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Element { .. } => self.qualified_name(id).unwrap_or_default(),
            NodeKind::Text { .. } | NodeKind::CData { .. } => "text()".to_string(),
            NodeKind::Comment { .. } => "comment()".to_string(),
            NodeKind::ProcessingInstruction { target, .. } => {
                format!("processing-instruction('{target}')")
            }
            _ => "node()".to_string(),
        }
    }
}

/// A captured subtree, used to copy nodes within or across arenas.
///
/// Nodes are stored breadth-first, so every entry comes after its parent and
/// siblings keep their order. The top node is the first entry.
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    entries: Vec<FragmentNode>,
}

#[derive(Debug, Clone)]
struct FragmentNode {
    origin: NodeId,
    /// Index of the parent entry, `None` for the top node.
    parent: Option<usize>,
    kind: NodeKind,
    namespace: Option<Namespace>,
    ns_defs: Vec<Namespace>,
    line: u32,
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}

/// Depth-first, pre-order iterator over the descendants of a node.
pub struct Descendants<'a> {
    tree: &'a Tree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.tree.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        let mut cursor = Some(current);
        while let Some(node) = cursor {
            if node == self.root {
                break;
            }
            if let Some(sibling) = self.tree.next_sibling(node) {
                self.next = Some(sibling);
                return Some(current);
            }
            cursor = self.tree.parent(node);
        }

        self.next = None;
        Some(current)
    }
}
