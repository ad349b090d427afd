//! Linking, moving, and detaching nodes.
//!
//! Every link goes through [`link`], which validates the operation before
//! touching either arena, so a failed call leaves both trees unchanged.

use std::rc::Rc;

use crate::engine::codes;
use crate::error::{Error, Result};
use crate::tree::{NodeId, NodeKind, TreeRef};

use super::{accepts_children, ensure_live, Node, Ownership};

/// Where a node goes relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placement {
    /// Last child of the anchor.
    Append,
    /// Next sibling of the anchor.
    After,
    /// Previous sibling of the anchor.
    Before,
    /// In place of the anchor, which is released.
    Replace,
}

/// Links `child` (or a copy of it, if `copy`) at `placement` relative to
/// `anchor`, and returns its id in `target`.
///
/// When the node itself is linked, `child` is repointed at its new location
/// and demoted to a view.
pub(super) fn link(
    target: &TreeRef,
    anchor: NodeId,
    placement: Placement,
    child: &mut Node,
    copy: bool,
) -> Result<NodeId> {
    let (source, src_id) = child.locate();
    let same_arena = Rc::ptr_eq(target, &source);

    {
        let t = target.borrow();
        let s = if same_arena { None } else { Some(source.borrow()) };
        let s = s.as_deref().unwrap_or(&t);
        ensure_live(&t, anchor)?;
        ensure_live(s, src_id)?;

        let child_kind = &s.node(src_id).kind;
        if matches!(
            child_kind,
            NodeKind::Document | NodeKind::DocumentFragment | NodeKind::Attribute { .. }
        ) {
            return Err(Error::structural(
                codes::TREE_WRONG_KIND,
                format!("a {:?} node cannot be linked as a child", child_kind.node_type()),
            ));
        }
        let child_is_element = matches!(child_kind, NodeKind::Element { .. });

        let parent = if placement == Placement::Append {
            if !accepts_children(&t, anchor) {
                return Err(Error::structural(
                    codes::TREE_WRONG_KIND,
                    format!("a {:?} node cannot have children", t.node(anchor).kind.node_type()),
                ));
            }
            anchor
        } else {
            if matches!(t.node(anchor).kind, NodeKind::Attribute { .. }) {
                return Err(Error::structural(codes::TREE_WRONG_KIND, "attributes have no siblings"));
            }
            t.parent(anchor)
                .ok_or_else(|| Error::structural(codes::TREE_NO_PARENT, "sibling target has no parent"))?
        };

        if same_arena && !copy && (t.is_ancestor_or_self(src_id, parent) || src_id == anchor) {
            return Err(Error::structural(
                codes::TREE_HIERARCHY,
                "cannot link a node below or next to itself",
            ));
        }

        if t.is_document() && parent == t.root() && child_is_element && placement != Placement::Replace {
            if let Some(existing) = t.root_element() {
                if !(same_arena && !copy && existing == src_id) {
                    return Err(Error::structural(
                        codes::TREE_SECOND_ROOT,
                        "the document already has a root element",
                    ));
                }
            }
        }
    }

    if !copy {
        source.borrow_mut().detach(src_id);
    }

    let linked = if same_arena {
        if copy {
            target.borrow_mut().copy_subtree(src_id)
        } else {
            src_id
        }
    } else {
        let fragment = source.borrow().snapshot(src_id);
        let mut mapping = Vec::new();
        let linked = target.borrow_mut().graft(&fragment, &mut mapping);
        if copy {
            tracing::debug!(nodes = mapping.len(), "copied subtree across arenas");
        } else {
            source.borrow_mut().forward(&mapping, target);
            tracing::debug!(nodes = mapping.len(), "transplanted subtree into another arena");
        }
        linked
    };

    {
        let mut t = target.borrow_mut();
        match placement {
            Placement::Append => t.append_child(anchor, linked),
            Placement::After => t.insert_after(anchor, linked),
            Placement::Before => t.insert_before(anchor, linked),
            Placement::Replace => {
                t.insert_before(anchor, linked);
                t.detach(anchor);
                t.release_subtree(anchor);
            }
        }
    }

    if !copy {
        child.relocate(Rc::clone(target), linked);
        child.ownership = Ownership::View;
    }
    Ok(linked)
}

impl Node {
    /// Links `child` as the last child of this node and returns a view of
    /// what was linked.
    ///
    /// An owned, detached child is moved and its handle becomes a view. A
    /// view, or an owned handle whose node is already attached, is copied
    /// instead and left where it was.
    ///
    /// # Errors
    ///
    /// Returns `Error::Structural` if either node was released, this node
    /// cannot have children, `child` is a document or attribute node, the
    /// link would create a cycle, or it would give a document a second root
    /// element.
    pub fn add_child(&self, child: &mut Node) -> Result<Node> {
        let (target, id) = self.locate();
        let copy = child.ownership == Ownership::View || child.read(|t, c| t.parent(c).is_some()).unwrap_or(false);
        if copy {
            tracing::debug!(ownership = ?child.ownership, "linking a copy of an attached node");
        }
        let linked = link(&target, id, Placement::Append, child, copy)?;
        Ok(Node::view(target, linked))
    }

    /// Moves `node` to directly after this node.
    ///
    /// # Errors
    ///
    /// Returns `Error::Structural` if this node has no parent, is an
    /// attribute, or the move is otherwise invalid (see
    /// [`add_child`](Self::add_child)).
    pub fn set_next(&self, node: &mut Node) -> Result<()> {
        let (target, id) = self.locate();
        link(&target, id, Placement::After, node, false).map(drop)
    }

    /// Moves `node` to directly before this node.
    ///
    /// # Errors
    ///
    /// As for [`set_next`](Self::set_next).
    pub fn set_prev(&self, node: &mut Node) -> Result<()> {
        let (target, id) = self.locate();
        link(&target, id, Placement::Before, node, false).map(drop)
    }

    /// Discards all children, then adds each of `children` in order with the
    /// rules of [`add_child`](Self::add_child).
    ///
    /// # Errors
    ///
    /// Fails if this node was released or cannot have children, or if adding
    /// one of the new children fails. The old children are discarded even
    /// then.
    pub fn replace_children(&self, children: &mut [Node]) -> Result<Vec<Node>> {
        let (tree, id) = self.live()?;
        let old: Vec<NodeId> = {
            let mut t = tree.borrow_mut();
            if !accepts_children(&t, id) {
                return Err(Error::structural(
                    codes::TREE_WRONG_KIND,
                    format!("a {:?} node cannot have children", t.node(id).kind.node_type()),
                ));
            }
            let old: Vec<NodeId> = t.children(id).collect();
            for &c in &old {
                t.detach(c);
            }
            old
        };

        let added = children.iter_mut().map(|c| self.add_child(c)).collect::<Result<Vec<_>>>();

        let mut t = tree.borrow_mut();
        for c in old {
            if t.is_live(c) && t.parent(c).is_none() {
                t.release_subtree(c);
            }
        }
        added
    }

    /// Unlinks this node from its parent. The handle becomes the owner of
    /// the now standalone subtree.
    ///
    /// # Errors
    ///
    /// Returns `Error::Structural` if the node was released or is a document
    /// node.
    pub fn detach(&mut self) -> Result<()> {
        self.write(|t, id| {
            if matches!(t.node(id).kind, NodeKind::Document) {
                return Err(Error::structural(codes::TREE_WRONG_KIND, "a document node cannot be detached"));
            }
            t.detach(id);
            Ok(())
        })?;
        self.ownership = Ownership::Owned;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handle::Document;
    use pretty_assertions::assert_eq;

    fn names(node: &Node) -> Vec<String> {
        node.children().iter().filter_map(Node::name).collect()
    }

    #[test]
    fn test_add_owned_child_moves_it() {
        let root = Node::new_element("root");
        let mut child = Node::new_element("child");
        child.set_attribute("k", "v").unwrap();
        let linked = root.add_child(&mut child).unwrap();

        assert_eq!(child.ownership(), Ownership::View);
        assert!(linked.is_same_node(&child));
        assert!(child.parent().unwrap().is_same_node(&root));
        assert_eq!(root.serialize(false), r#"<root><child k="v"/></root>"#);
    }

    #[test]
    fn test_add_view_links_a_copy() {
        let root = Node::new_element("root");
        let mut a = Node::new_element("a");
        root.add_child(&mut a).unwrap();

        let other = Node::new_element("other");
        let copy = other.add_child(&mut a).unwrap();
        assert!(!copy.is_same_node(&a));
        assert!(a.parent().unwrap().is_same_node(&root));
        assert_eq!(names(&root), vec!["a"]);
        assert_eq!(names(&other), vec!["a"]);
    }

    #[test]
    fn test_views_follow_transplanted_nodes() {
        let mut branch = Node::new_element("branch");
        branch.set_content("leaf").unwrap();
        let leaf = branch.first_child().unwrap();

        let doc = Document::new();
        let mut root = doc.create_element("root");
        doc.set_root_element(&mut root).unwrap();
        root.add_child(&mut branch).unwrap();

        assert!(leaf.document().is_some());
        assert_eq!(leaf.path().as_deref(), Some("/root/branch/text()"));
        leaf.set_content("changed").unwrap();
        assert_eq!(doc.serialize(false, None), "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root><branch>changed</branch></root>\n");
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut outer = Node::new_element("outer");
        let mut inner = Node::new_element("inner");
        outer.add_child(&mut inner).unwrap();

        let err = inner.add_child(&mut outer).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_HIERARCHY);
        let err = inner.set_next(&mut outer).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_HIERARCHY);
        assert_eq!(outer.ownership(), Ownership::Owned);
        assert_eq!(outer.serialize(false), "<outer><inner/></outer>");
    }

    #[test]
    fn test_sibling_of_parentless_node_fails() {
        let lonely = Node::new_element("lonely");
        let err = lonely.set_next(&mut Node::new_element("x")).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_NO_PARENT);
    }

    #[test]
    fn test_wrong_kinds_are_rejected() {
        let text = Node::new_text("t");
        let mut e = Node::new_element("e");
        let err = text.add_child(&mut e).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_WRONG_KIND);
        assert_eq!(e.ownership(), Ownership::Owned);

        e.set_attribute("k", "v").unwrap();
        let mut attr = e.attributes().remove(0);
        let other = Node::new_element("o");
        attr.detach().unwrap();
        let err = other.add_child(&mut attr).unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_WRONG_KIND);
        assert_eq!(e.get_attribute("k", None), None);
    }

    #[test]
    fn test_siblings() {
        let root = Node::new_element("root");
        let mut b = Node::new_element("b");
        root.add_child(&mut b).unwrap();
        b.set_prev(&mut Node::new_element("a")).unwrap();
        b.set_next(&mut Node::new_element("c")).unwrap();
        assert_eq!(names(&root), vec!["a", "b", "c"]);

        let mut a = root.first_child().unwrap();
        root.last_child().unwrap().set_next(&mut a).unwrap();
        assert_eq!(names(&root), vec!["b", "c", "a"]);
        assert_eq!(a.ownership(), Ownership::View);
    }

    #[test]
    fn test_replace_children() {
        let root = Node::new_element("root");
        root.set_content("old").unwrap();
        let old_text = root.first_child().unwrap();

        let mut kept = Node::new_element("x");
        let added = root
            .replace_children(&mut [Node::new_element("y"), Node::new_text("z")])
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(old_text.node_type(), None);
        assert_eq!(root.serialize(false), "<root><y/>z</root>");

        root.replace_children(std::slice::from_mut(&mut kept)).unwrap();
        assert_eq!(kept.ownership(), Ownership::View);
        assert_eq!(root.serialize(false), "<root><x/></root>");
    }

    #[test]
    fn test_detach_then_drop_releases() {
        let root = Node::new_element("root");
        let mut child = Node::new_element("child");
        root.add_child(&mut child).unwrap();
        let probe = root.first_child().unwrap();

        child.detach().unwrap();
        assert!(child.parent().is_none());
        assert_eq!(root.children().len(), 0);
        drop(child);
        assert_eq!(probe.node_type(), None);
    }

    #[test]
    fn test_detach_document_node_fails() {
        let doc = Document::new();
        let mut root = doc.create_element("r");
        doc.set_root_element(&mut root).unwrap();
        let mut doc_node = root.parent().unwrap();
        let err = doc_node.detach().unwrap_err();
        assert_eq!(err.diagnostic().code, codes::TREE_WRONG_KIND);
    }
}
