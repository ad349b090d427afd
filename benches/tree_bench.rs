#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmlhandle::{Document, Node};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a catalog with `count` books.
fn make_catalog(count: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<catalog xmlns:m=\"urn:meta\">\n");
    for i in 0..count {
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\" m:rank=\"{i}\"><title>Title {i}</title>\
             <author>Author {i}</author><price>{}.99</price></book>",
            10 + i % 50
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

fn make_html_doc() -> String {
    let mut html = String::from("<!DOCTYPE html><html><head><title>Bench</title></head><body>");
    for i in 0..200 {
        let _ = write!(html, "<div class=item><p>Row {i}<br>detail<li>one<li>two</div>");
    }
    html.push_str("</body></html>");
    html
}

// ---------------------------------------------------------------------------
// Parsing and serialization
// ---------------------------------------------------------------------------

fn bench_parse_catalog(c: &mut Criterion) {
    let xml = make_catalog(1000);
    c.bench_function("parse_catalog", |b| {
        b.iter(|| Document::parse_str(black_box(&xml)));
    });
}

fn bench_parse_html(c: &mut Criterion) {
    let html = make_html_doc();
    c.bench_function("parse_html", |b| {
        b.iter(|| Document::parse_html(black_box(&html)));
    });
}

fn bench_serialize_catalog(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog(1000)).expect("failed to parse catalog");
    c.bench_function("serialize_catalog", |b| {
        b.iter(|| black_box(&doc).serialize(false, None));
    });
    c.bench_function("serialize_catalog_indented", |b| {
        b.iter(|| black_box(&doc).serialize(true, Some("ISO-8859-1")));
    });
}

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

fn bench_build_standalone(c: &mut Criterion) {
    c.bench_function("build_standalone_tree", |b| {
        b.iter(|| {
            let root = Node::new_element("root");
            for i in 0..200 {
                let child = root.add_child(&mut Node::new_element("item")).unwrap();
                child.set_attribute("n", &i.to_string()).unwrap();
            }
            black_box(root.serialize(false))
        });
    });
}

fn bench_build_in_document(c: &mut Criterion) {
    c.bench_function("build_document_tree", |b| {
        b.iter(|| {
            let doc = Document::new();
            let mut root = doc.create_element("root");
            doc.set_root_element(&mut root).unwrap();
            for i in 0..200 {
                let child = root.add_child(&mut doc.create_element("item")).unwrap();
                child.add_child(&mut doc.create_text(&i.to_string())).unwrap();
            }
            black_box(doc.serialize(false, None))
        });
    });
}

fn bench_deep_copy(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog(500)).expect("failed to parse catalog");
    c.bench_function("deep_copy_document", |b| {
        b.iter(|| black_box(&doc).deep_copy());
    });
}

// ---------------------------------------------------------------------------
// XPath
// ---------------------------------------------------------------------------

fn bench_xpath(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog(1000)).expect("failed to parse catalog");
    c.bench_function("xpath_descendants", |b| {
        b.iter(|| doc.evaluate(black_box("//book/title"), &[]));
    });
    c.bench_function("xpath_predicate", |b| {
        b.iter(|| doc.evaluate(black_box("//book[number(price) > 40 and @m:rank mod 2 = 0]"), &[("m", "urn:meta")]));
    });

    let detached = doc.root_element().unwrap().deep_copy().unwrap();
    c.bench_function("xpath_detached_wrapper", |b| {
        b.iter(|| detached.evaluate(black_box("/catalog/book[last()]"), &[]));
    });
}

criterion_group!(parsing, bench_parse_catalog, bench_parse_html);

criterion_group!(serialization, bench_serialize_catalog);

criterion_group!(building, bench_build_standalone, bench_build_in_document, bench_deep_copy);

criterion_group!(xpath, bench_xpath);

criterion_main!(parsing, serialization, building, xpath);
