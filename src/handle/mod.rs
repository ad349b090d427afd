//! Owning and non-owning handles over shared trees.
//!
//! A [`Node`] or [`Document`] handle pairs a reference to an arena with an
//! [`Ownership`] tag. Only `Owned` handles release storage when dropped:
//!
//! - an owned `Document` releases everything reachable from its document
//!   node;
//! - an owned `Node` releases its subtree, but only if the node is still a
//!   live, parentless root when the handle goes away. Once the node has been
//!   linked into a tree, that tree is responsible for it.
//!
//! Every handle returned by navigation or queries is a `View`.
//!
//! Handles hold an `Rc<RefCell<Tree>>`, so they are `!Send`: a tree is
//! confined to the thread that built it.

mod document;
mod mutate;
mod node;
mod query;

pub use document::Document;
pub use node::Node;

use crate::engine::codes;
use crate::error::{Error, Result};
use crate::tree::{NodeId, NodeKind, Tree, TreeRef};

/// Whether a handle is responsible for releasing what it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The handle releases the node's subtree (or the whole document) when
    /// dropped.
    Owned,
    /// The storage belongs to someone else.
    View,
}

/// Fails with a structural error if `id` is not live in `tree`.
pub(crate) fn ensure_live(tree: &Tree, id: NodeId) -> Result<()> {
    if tree.is_live(id) {
        Ok(())
    } else {
        Err(Error::structural(codes::TREE_RELEASED_NODE, "node has been released"))
    }
}

/// Whether nodes may be linked below `id`.
pub(crate) fn accepts_children(tree: &Tree, id: NodeId) -> bool {
    matches!(
        tree.node(id).kind,
        NodeKind::Element { .. } | NodeKind::Document | NodeKind::DocumentFragment
    )
}

/// Follows forwarding records from `(tree, id)` to where the node lives now.
///
/// Stops early if an arena along the way is mutably borrowed.
pub(crate) fn follow(mut tree: TreeRef, mut id: NodeId) -> (TreeRef, NodeId) {
    loop {
        let next = match tree.try_borrow() {
            Ok(t) => t.forwarded(id),
            Err(_) => None,
        };
        match next {
            Some((t, i)) => {
                tree = t;
                id = i;
            }
            None => return (tree, id),
        }
    }
}
