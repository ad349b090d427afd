//! HTML writer.
//!
//! Void elements have no end tag, `script` and `style` content is written
//! raw, boolean attributes are minimized, and processing instructions end
//! with `>`.

use crate::html::{is_boolean_attribute, is_raw_text_element, is_void_element};
use crate::tree::{NodeId, NodeKind, Tree};

use super::{
    is_blank_text, is_element_only, write_doctype, write_escaped_text, write_indent, write_pi,
    SerializeOptions,
};

/// Pending work for the writer.
enum Step<'t> {
    Open { id: NodeId, depth: usize, indented: bool },
    /// Text of a `script` or `style` element, written unescaped.
    Raw(&'t str),
    Close { name: &'t str, depth: usize, element_only: bool, indented: bool },
}

pub(super) fn write_node(tree: &Tree, id: NodeId, options: &SerializeOptions, out: &mut String) {
    let mut stack = vec![Step::Open {
        id,
        depth: 0,
        indented: false,
    }];
    while let Some(step) = stack.pop() {
        match step {
            Step::Open { id, depth, indented } => write(tree, id, options, out, depth, indented, &mut stack),
            Step::Raw(content) => out.push_str(content),
            Step::Close {
                name,
                depth,
                element_only,
                indented,
            } => {
                if element_only {
                    write_indent(options, depth, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
                if indented {
                    out.push('\n');
                }
            }
        }
    }
}

fn write<'t>(
    tree: &'t Tree,
    id: NodeId,
    options: &SerializeOptions,
    out: &mut String,
    depth: usize,
    indented: bool,
    stack: &mut Vec<Step<'t>>,
) {
    match &tree.node(id).kind {
        NodeKind::Element { name } => {
            if indented {
                write_indent(options, depth, out);
            }
            out.push('<');
            out.push_str(name);
            for &attr in &tree.node(id).attributes {
                if let NodeKind::Attribute { name, value } = &tree.node(attr).kind {
                    out.push(' ');
                    out.push_str(name);
                    if is_boolean_attribute(name) && (value == name || value.is_empty()) {
                        continue;
                    }
                    out.push_str("=\"");
                    write_escaped_html_attr(out, value);
                    out.push('"');
                }
            }
            out.push('>');

            let tag = name.to_ascii_lowercase();
            if is_void_element(&tag) {
                if indented {
                    out.push('\n');
                }
                return;
            }
            let element_only = options.indent && is_element_only(tree, id);
            if element_only {
                out.push('\n');
            }
            stack.push(Step::Close {
                name,
                depth,
                element_only,
                indented,
            });
            let raw = is_raw_text_element(&tag);
            let mut children = Vec::new();
            for child in tree.children(id) {
                match &tree.node(child).kind {
                    NodeKind::Text { content } if raw => children.push(Step::Raw(content)),
                    _ if element_only && is_blank_text(tree, child) => {}
                    _ => children.push(Step::Open {
                        id: child,
                        depth: depth + 1,
                        indented: element_only,
                    }),
                }
            }
            stack.extend(children.into_iter().rev());
        }
        NodeKind::Text { content } | NodeKind::CData { content } => write_escaped_text(out, content),
        NodeKind::Comment { content } => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => write_pi(target, data.as_deref(), ">", out),
        NodeKind::EntityRef { name } => {
            out.push('&');
            out.push_str(name);
            out.push(';');
        }
        NodeKind::DocumentType { .. } => write_doctype(tree, id, out),
        NodeKind::Attribute { name, value } => {
            out.push_str(name);
            out.push_str("=\"");
            write_escaped_html_attr(out, value);
            out.push('"');
        }
        NodeKind::Declaration { .. } => {}
        NodeKind::Document | NodeKind::DocumentFragment => {
            let children: Vec<NodeId> = tree.children(id).collect();
            stack.extend(children.into_iter().rev().map(|child| Step::Open {
                id: child,
                depth,
                indented,
            }));
        }
    }
}

/// Escapes an attribute value for HTML output.
fn write_escaped_html_attr(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
