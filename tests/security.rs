//! Hostile inputs: excessive nesting, entity expansion, external entities.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use xmlhandle::{Document, ErrorLevel, ParseOptions};

#[test]
fn test_deeply_nested_elements_rejected() {
    // Run in a thread with a larger stack to avoid stack overflow in debug mode.
    let result = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let open_tags: String = (0..300).map(|_| "<a>").collect();
            let close_tags: String = (0..300).map(|_| "</a>").collect();
            Document::parse_str(&format!("{open_tags}{close_tags}")).map(|_| ())
        })
        .unwrap()
        .join()
        .unwrap();
    let err = result.unwrap_err();
    assert!(
        err.diagnostic().message.contains("depth"),
        "error should mention depth: {}",
        err.diagnostic().message
    );
}

#[test]
fn test_depth_limit_exact_boundary() {
    let xml = "<a><b><c/></b></a>";
    assert!(Document::parse(xml.as_bytes(), &ParseOptions::default().max_depth(3)).is_ok());
    assert!(Document::parse(xml.as_bytes(), &ParseOptions::default().max_depth(2)).is_err());
}

#[test]
fn test_entity_loop_rejected() {
    let xml = "<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>";
    let err = Document::parse_str(xml).unwrap_err();
    assert_eq!(err.diagnostic().level, ErrorLevel::Fatal);
}

#[test]
fn test_billion_laughs_rejected() {
    let mut xml = String::from("<!DOCTYPE r [<!ENTITY l0 \"lollollollollollollollollollol\">");
    for i in 1..10 {
        let prev = i - 1;
        let refs: String = (0..10).map(|_| format!("&l{prev};")).collect();
        xml.push_str(&format!("<!ENTITY l{i} \"{refs}\">"));
    }
    xml.push_str("]><r>&l9;</r>");
    assert!(Document::parse_str(&xml).is_err());
}

#[test]
fn test_external_entity_is_never_loaded() {
    let xml = "<!DOCTYPE r [<!ENTITY ext SYSTEM \"file:///etc/passwd\">]><r>&ext;</r>";
    let doc = Document::parse_str(xml).unwrap();
    assert_eq!(doc.root_element().unwrap().content().as_deref(), Some(""));
    let warnings = doc.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, ErrorLevel::Warning);
}
