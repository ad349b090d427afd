//! Behavioral properties of handles, queries, and serialization.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use xmlhandle::{Document, Error, Node, NodeType, Ownership};

fn build_sample() -> Node {
    let root = Node::new_element("root");
    root.set_attribute("attr", "1").unwrap();
    root.add_child(&mut Node::new_element("child")).unwrap();
    root
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[test]
fn test_detach_yields_owned_parentless_handle() {
    let doc = Document::parse_str("<r><a><b/></a><c/></r>").unwrap();
    let mut a = doc.root_element().unwrap().first_child().unwrap();
    assert_eq!(a.ownership(), Ownership::View);

    a.detach().unwrap();
    assert_eq!(a.ownership(), Ownership::Owned);
    assert!(a.parent().is_none());
    assert!(a.document().is_none());
    assert_eq!(a.serialize(false), "<a><b/></a>");
    assert_eq!(doc.root_element().unwrap().serialize(false), "<r><c/></r>");

    let b = a.first_child().unwrap();
    drop(a);
    assert_eq!(b.node_type(), None);
}

#[test]
fn test_detach_attribute() {
    let doc = Document::parse_str("<r k='v' m='n'/>").unwrap();
    let root = doc.root_element().unwrap();
    let mut attr = root.attributes().remove(0);
    attr.detach().unwrap();
    assert_eq!(attr.ownership(), Ownership::Owned);
    assert_eq!(attr.content().as_deref(), Some("v"));
    assert_eq!(root.serialize(false), r#"<r m="n"/>"#);
}

#[test]
fn test_add_view_inserts_copy() {
    let doc = Document::parse_str("<r><a x='1'>t</a><p/></r>").unwrap();
    let root = doc.root_element().unwrap();
    let mut a = root.first_child().unwrap();
    let p = root.last_child().unwrap();

    let before = p.children().len();
    let copy = p.add_child(&mut a).unwrap();
    assert_eq!(p.children().len(), before + 1);
    assert!(!copy.is_same_node(&a));
    assert!(a.parent().unwrap().is_same_node(&root));
    assert_eq!(a.ownership(), Ownership::View);
    assert_eq!(root.serialize(false), r#"<r><a x="1">t</a><p><a x="1">t</a></p></r>"#);
}

#[test]
fn test_owned_handle_linked_elsewhere_is_copied() {
    let root = Node::new_element("root");
    root.add_child(&mut Node::new_element("child")).unwrap();

    // Two handles detach the same node, so both claim ownership.
    let mut first = root.first_child().unwrap();
    let mut second = root.first_child().unwrap();
    first.detach().unwrap();
    second.detach().unwrap();
    assert_eq!(second.ownership(), Ownership::Owned);

    root.add_child(&mut first).unwrap();
    assert_eq!(first.ownership(), Ownership::View);

    let other = Node::new_element("other");
    let copy = other.add_child(&mut second).unwrap();
    assert!(!copy.is_same_node(&second));
    assert!(second.parent().unwrap().is_same_node(&root));
    assert_eq!(root.serialize(false), "<root><child/></root>");
    assert_eq!(other.serialize(false), "<other><child/></other>");
}

#[test]
fn test_deep_copy_node_is_equal_and_independent() {
    let doc = Document::parse_str("<r><a k='v'><b>text</b></a></r>").unwrap();
    let a = doc.root_element().unwrap().first_child().unwrap();
    let copy = a.deep_copy().unwrap();

    assert_eq!(copy.ownership(), Ownership::Owned);
    assert!(copy.parent().is_none());
    assert_eq!(copy.serialize(false), a.serialize(false));

    copy.first_child().unwrap().set_content("changed").unwrap();
    assert_eq!(a.content().as_deref(), Some("text"));
    drop(doc);
    assert_eq!(copy.content().as_deref(), Some("changed"));
}

#[test]
fn test_deep_copy_document_is_equal_and_independent() {
    let doc = Document::parse_str("<!-- c --><r><a/></r>").unwrap();
    let copy = doc.deep_copy().unwrap();
    assert_eq!(copy.serialize(true, None), doc.serialize(true, None));
    let mut a = copy.root_element().unwrap().first_child().unwrap();
    a.detach().unwrap();
    assert_eq!(doc.evaluate("//a", &[]).unwrap().len(), 1);
    assert_eq!(copy.evaluate("//a", &[]).unwrap().len(), 0);
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn test_reparse_of_serialized_document_is_equivalent() {
    let inputs = [
        "<r a='1' b=\"x&amp;y\"><c>text &lt; more</c><!-- note --><?pi data?></r>",
        "<x:r xmlns:x='urn:x' xmlns='urn:d'><x:a x:k='v'><b/></x:a></x:r>",
        "<r><![CDATA[raw <data>]]>tail\r\nline</r>",
        "<!DOCTYPE r [<!ENTITY e \"expanded\">]><r>&e;</r>",
    ];
    for input in inputs {
        let first = Document::parse_str(input).unwrap();
        let text = first.serialize(false, None);
        let second = Document::parse_str(&text).unwrap();
        assert_eq!(second.serialize(false, None), text, "round trip of {input}");
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn test_self_query_leaves_freestanding_root_untouched() {
    let a = Node::new_element("a");
    a.add_child(&mut Node::new_element("b")).unwrap();

    let found = a.evaluate("self::*", &[]).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].is_same_node(&a));
    assert!(a.parent().is_none());
    assert_eq!(a.serialize(false), "<a><b/></a>");
}

#[test]
fn test_built_tree_serializes_exactly() {
    assert_eq!(build_sample().serialize(false), r#"<root attr="1"><child/></root>"#);
}

#[test]
fn test_descendant_query_without_bindings() {
    let root = build_sample();
    let found = root.evaluate("//child", &[]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name().as_deref(), Some("child"));
    assert_eq!(found[0].node_type(), Some(NodeType::Element));
}

#[test]
fn test_remove_missing_attribute_returns_false() {
    let root = build_sample();
    assert!(!root.remove_attribute("missing", None));
    assert!(!root.remove_attribute("attr", Some("urn:other")));
    assert!(root.remove_attribute("attr", None));
    assert!(!root.remove_attribute("attr", None));
}

#[test]
fn test_failed_query_yields_nothing() {
    let root = build_sample();
    match root.evaluate("//child[", &[]) {
        Err(Error::Query(diag)) => assert_eq!(diag.int1, 8),
        other => panic!("expected a query error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Deep trees
// ---------------------------------------------------------------------------

const DEPTH: usize = 20_000;

/// A chain of `depth` nested `n` elements ending in the text `end`, built
/// with constructors and never checked against the parser's depth limit.
fn deep_chain(depth: usize) -> Node {
    let top = Node::new_element("n");
    let mut tip: Option<Node> = None;
    for _ in 1..depth {
        let parent = tip.as_ref().unwrap_or(&top);
        let child = parent.add_child(&mut Node::new_element("n")).unwrap();
        tip = Some(child);
    }
    tip.as_ref().unwrap_or(&top).add_child(&mut Node::new_text("end")).unwrap();
    top
}

#[test]
fn test_deep_tree_moves_into_document() {
    let mut top = deep_chain(DEPTH);
    let doc = Document::new();
    doc.set_root_element(&mut top).unwrap();
    assert_eq!(top.ownership(), Ownership::View);
    assert_eq!(doc.root_element().unwrap().content().as_deref(), Some("end"));
    assert_eq!(doc.root_element().unwrap().eval_to_number("count(//n)", &[]).unwrap(), DEPTH as f64);
}

#[test]
fn test_deep_tree_serializes() {
    let top = deep_chain(DEPTH);
    let expected = format!("{}end{}", "<n>".repeat(DEPTH), "</n>".repeat(DEPTH));
    assert_eq!(top.serialize(false), expected);

    let doc = Document::new();
    let mut root = top.deep_copy().unwrap();
    doc.set_root_element(&mut root).unwrap();
    assert_eq!(
        doc.serialize(false, None),
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{expected}\n")
    );
}

#[test]
fn test_deep_tree_copies() {
    let top = deep_chain(DEPTH);
    let copy = top.deep_copy().unwrap();
    assert_eq!(copy.content().as_deref(), Some("end"));

    let holder = Node::new_element("holder");
    let mut view = top.first_child().unwrap();
    holder.add_child(&mut view).unwrap();
    assert_eq!(holder.content().as_deref(), Some("end"));
    assert!(top.first_child().unwrap().is_same_node(&view));
}
