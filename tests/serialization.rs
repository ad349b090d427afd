//! Serialization, encodings, and file round trips.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use xmlhandle::{Document, ErrorDomain, Namespace, Node, ParseOptions};

const DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[test]
fn test_indented_document() {
    let doc = Document::parse_str("<catalog><book id=\"1\"><title>A</title></book><book id=\"2\"/></catalog>").unwrap();
    let expected = format!(
        "{DECL}<catalog>\n  <book id=\"1\">\n    <title>A</title>\n  </book>\n  <book id=\"2\"/>\n</catalog>\n"
    );
    assert_eq!(doc.serialize(true, None), expected);
}

#[test]
fn test_mixed_content_is_not_indented() {
    let doc = Document::parse_str("<p>Hello <b>world</b>!</p>").unwrap();
    assert_eq!(doc.serialize(true, None), format!("{DECL}<p>Hello <b>world</b>!</p>\n"));
}

#[test]
fn test_escaping() {
    let e = Node::new_element("e");
    e.set_attribute("a", "\"q\" <&>\n\t").unwrap();
    e.set_content("x < y & z > w\r").unwrap();
    assert_eq!(
        e.serialize(false),
        "<e a=\"&quot;q&quot; &lt;&amp;&gt;&#10;&#9;\">x &lt; y &amp; z &gt; w&#13;</e>"
    );
}

#[test]
fn test_moved_subtree_declares_its_namespaces() {
    let doc = Document::parse_str("<r xmlns:p='urn:p'><p:item p:k='v'/></r>").unwrap();
    let item = doc.root_element().unwrap().first_child().unwrap();
    assert_eq!(item.serialize(false), r#"<p:item xmlns:p="urn:p" p:k="v"/>"#);

    let target = Node::new_element("target");
    target.add_child(&mut item.deep_copy().unwrap()).unwrap();
    assert_eq!(
        target.serialize(false),
        r#"<target><p:item xmlns:p="urn:p" p:k="v"/></target>"#
    );
}

#[test]
fn test_constructed_namespaced_tree() {
    let ns = Namespace::new("urn:books", None);
    let root = Node::new_element_ns("library", &ns);
    let book = root.add_child(&mut Node::new_element_ns("book", &ns)).unwrap();
    book.add_child(&mut Node::new_element("plain")).unwrap();
    assert_eq!(
        root.serialize(false),
        r#"<library xmlns="urn:books"><book><plain xmlns=""/></book></library>"#
    );
}

#[test]
fn test_declaration_carries_requested_encoding() {
    let doc = Document::parse_str("<r>\u{e9}</r>").unwrap();
    let text = doc.serialize(false, Some("ISO-8859-1"));
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n"));

    let bytes = doc.serialize_to_bytes(false, Some("ISO-8859-1")).unwrap();
    assert!(bytes.ends_with(b"<r>\xE9</r>\n"));

    let reparsed = Document::parse(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(reparsed.root_element().unwrap().content().as_deref(), Some("\u{e9}"));
}

#[test]
fn test_utf16_output_round_trips() {
    let doc = Document::parse_str("<r>\u{263a}</r>").unwrap();
    let bytes = doc.serialize_to_bytes(false, Some("UTF-16LE")).unwrap();
    assert_eq!(&bytes[..2], b"<\0");
    let reparsed = Document::parse(&bytes, &ParseOptions::default().encoding("UTF-16LE")).unwrap();
    assert_eq!(reparsed.root_element().unwrap().content().as_deref(), Some("\u{263a}"));
}

#[test]
fn test_unknown_encoding_yields_empty_output() {
    let doc = Document::parse_str("<r/>").unwrap();
    assert_eq!(doc.serialize(false, Some("x-unknown")), "");
    let err = doc.serialize_to_bytes(false, Some("x-unknown")).unwrap_err();
    assert_eq!(err.diagnostic().domain, ErrorDomain::Output);
    assert_eq!(err.diagnostic().str1, "x-unknown");
}

#[test]
fn test_html_document_output() {
    let doc = Document::parse_html("<p>a<br>b<script>if (a < b) {}</script>").unwrap();
    let out = doc.serialize(false, None);
    assert!(!out.starts_with("<?xml"));
    assert!(out.contains("<br>b"));
    assert!(!out.contains("</br>"));
    assert!(out.contains("<script>if (a < b) {}</script>"));
}

#[test]
fn test_html_subtree_renders_as_xml() {
    let doc = Document::parse_html("<p>a<br>b</p>").unwrap();
    let p = doc.evaluate("//p", &[]).unwrap().remove(0);
    assert_eq!(p.serialize(false), "<p>a<br/>b</p>");
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn test_save_and_parse_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xml");

    let doc = Document::new();
    let mut root = doc.create_element("root");
    doc.set_root_element(&mut root).unwrap();
    root.add_child(&mut doc.create_text("caf\u{e9}")).unwrap();
    root.add_child(&mut doc.create_comment("saved")).unwrap();
    doc.save_file(&path, false, None).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        format!("{DECL}<root>caf\u{e9}<!--saved--></root>\n")
    );

    let loaded = Document::parse_file(&path, &ParseOptions::default()).unwrap();
    assert_eq!(loaded.url().as_deref(), Some(path.display().to_string().as_str()));
    assert_eq!(loaded.serialize(false, None), doc.serialize(false, None));
}

#[test]
fn test_parse_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.xml");
    let err = Document::parse_file(&path, &ParseOptions::default()).unwrap_err();
    assert_eq!(err.diagnostic().domain, ErrorDomain::Io);
    assert_eq!(err.diagnostic().file, path.display().to_string());
}

#[test]
fn test_parse_error_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"<r>\n<a></r>").unwrap();
    let err = Document::parse_file(file.path(), &ParseOptions::default()).unwrap_err();
    let diag = err.diagnostic();
    assert_eq!(diag.domain, ErrorDomain::Parser);
    assert_eq!(diag.file, file.path().display().to_string());
    assert_eq!(diag.line, 2);
}

#[test]
fn test_save_to_unwritable_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("out.xml");
    let doc = Document::parse_str("<r/>").unwrap();
    let err = doc.save_file(&path, false, None).unwrap_err();
    assert_eq!(err.diagnostic().domain, ErrorDomain::Io);
}
