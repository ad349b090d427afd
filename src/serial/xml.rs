//! XML writer.

use crate::tree::{NodeId, NodeKind, Tree};

use super::{
    is_blank_text, is_element_only, write_doctype, write_escaped_attr, write_escaped_text,
    write_indent, write_pi, SerializeOptions,
};

/// A namespace binding visible in the output: `(prefix, href)`.
type Binding = (Option<String>, String);

/// Pending work for the writer.
enum Step {
    Open {
        id: NodeId,
        depth: usize,
        indented: bool,
    },
    /// End tag of an element whose children have been scheduled.
    Close {
        qname: String,
        depth: usize,
        element_only: bool,
        indented: bool,
        /// Scope length to restore once the element is closed.
        mark: usize,
    },
}

pub(super) struct XmlWriter<'a> {
    tree: &'a Tree,
    options: &'a SerializeOptions,
    out: &'a mut String,
    /// Declarations written so far and still in scope, innermost last.
    scope: Vec<Binding>,
}

impl<'a> XmlWriter<'a> {
    pub fn new(tree: &'a Tree, options: &'a SerializeOptions, out: &'a mut String) -> Self {
        Self {
            tree,
            options,
            out,
            scope: Vec::new(),
        }
    }

    /// Writes the subtree at `id`. Nesting is tracked on an explicit stack,
    /// so deep trees are written without recursion.
    pub fn write_subtree(&mut self, id: NodeId) {
        let mut stack = vec![Step::Open {
            id,
            depth: 0,
            indented: false,
        }];
        while let Some(step) = stack.pop() {
            match step {
                Step::Open { id, depth, indented } => self.write_node(id, depth, indented, &mut stack),
                Step::Close {
                    qname,
                    depth,
                    element_only,
                    indented,
                    mark,
                } => {
                    if element_only {
                        write_indent(self.options, depth, self.out);
                    }
                    self.out.push_str("</");
                    self.out.push_str(&qname);
                    self.out.push('>');
                    self.close_line(indented);
                    self.scope.truncate(mark);
                }
            }
        }
    }

    fn write_node(&mut self, id: NodeId, depth: usize, indented: bool, stack: &mut Vec<Step>) {
        let tree = self.tree;
        match &tree.node(id).kind {
            NodeKind::Element { name } => self.write_element(id, name, depth, indented, stack),
            NodeKind::Text { content } => write_escaped_text(self.out, content),
            NodeKind::CData { content } => {
                self.out.push_str("<![CDATA[");
                self.out.push_str(content);
                self.out.push_str("]]>");
            }
            NodeKind::Comment { content } => {
                self.open_line(depth, indented);
                self.out.push_str("<!--");
                self.out.push_str(content);
                self.out.push_str("-->");
                self.close_line(indented);
            }
            NodeKind::ProcessingInstruction { target, data } => {
                self.open_line(depth, indented);
                write_pi(target, data.as_deref(), "?>", self.out);
                self.close_line(indented);
            }
            NodeKind::EntityRef { name } => {
                self.out.push('&');
                self.out.push_str(name);
                self.out.push(';');
            }
            NodeKind::DocumentType { .. } => write_doctype(tree, id, self.out),
            NodeKind::Declaration { kind, name, body } => {
                self.out.push_str("<!");
                self.out.push_str(kind.keyword());
                self.out.push(' ');
                self.out.push_str(name);
                self.out.push(' ');
                self.out.push_str(body);
                self.out.push('>');
            }
            NodeKind::Attribute { value, .. } => {
                let qname = tree.qualified_name(id).unwrap_or_default();
                self.out.push_str(&qname);
                self.out.push_str("=\"");
                write_escaped_attr(self.out, value);
                self.out.push('"');
            }
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

    fn open_line(&mut self, depth: usize, indented: bool) {
        if indented {
            write_indent(self.options, depth, self.out);
        }
    }

    fn close_line(&mut self, indented: bool) {
        if indented {
            self.out.push('\n');
        }
    }

    /// Writes the start tag and schedules the children and the end tag.
    fn write_element(&mut self, id: NodeId, name: &str, depth: usize, indented: bool, stack: &mut Vec<Step>) {
        let tree = self.tree;
        let data = tree.node(id);
        let mark = self.scope.len();
        let qname = tree.qualified_name(id).unwrap_or_else(|| name.to_string());

        self.open_line(depth, indented);
        self.out.push('<');
        self.out.push_str(&qname);

        let declarations = self.declarations_for(id);
        for (prefix, href) in &declarations {
            match prefix {
                Some(p) => {
                    self.out.push_str(" xmlns:");
                    self.out.push_str(p);
                }
                None => self.out.push_str(" xmlns"),
            }
            self.out.push_str("=\"");
            write_escaped_attr(self.out, href);
            self.out.push('"');
        }
        self.scope.extend(declarations);

        for &attr in &data.attributes {
            if let NodeKind::Attribute { value, .. } = &tree.node(attr).kind {
                self.out.push(' ');
                self.out.push_str(&tree.qualified_name(attr).unwrap_or_default());
                self.out.push_str("=\"");
                write_escaped_attr(self.out, value);
                self.out.push('"');
            }
        }

        if data.first_child.is_none() {
            self.out.push_str("/>");
            self.close_line(indented);
            self.scope.truncate(mark);
            return;
        }

        self.out.push('>');
        let element_only = self.options.indent && is_element_only(tree, id);
        if element_only {
            self.out.push('\n');
        }
        stack.push(Step::Close {
            qname,
            depth,
            element_only,
            indented,
            mark,
        });
        let children: Vec<NodeId> = tree
            .children(id)
            .filter(|&child| !(element_only && is_blank_text(tree, child)))
            .collect();
        stack.extend(children.into_iter().rev().map(|child| Step::Open {
            id: child,
            depth: depth + 1,
            indented: element_only,
        }));
    }

    /// The `xmlns` declarations to write on an element: its own, plus any
    /// its name or attributes need that the output has not declared yet.
    fn declarations_for(&self, id: NodeId) -> Vec<Binding> {
        let data = self.tree.node(id);
        let mut declarations: Vec<Binding> = data
            .ns_defs
            .iter()
            .map(|ns| (ns.prefix().map(str::to_string), ns.href().to_string()))
            .collect();

        match &data.namespace {
            Some(ns) => self.require(&mut declarations, ns.prefix(), ns.href()),
            None => self.require(&mut declarations, None, ""),
        }
        for &attr in &data.attributes {
            if let Some(ns) = &self.tree.node(attr).namespace {
                if ns.prefix().is_some() {
                    self.require(&mut declarations, ns.prefix(), ns.href());
                }
            }
        }
        declarations
    }

    fn require(&self, declarations: &mut Vec<Binding>, prefix: Option<&str>, href: &str) {
        if prefix == Some("xml") {
            return;
        }
        if declarations.iter().any(|(p, _)| p.as_deref() == prefix) {
            return;
        }
        let visible = self
            .scope
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, h)| h.as_str());
        // No declaration at all means "no default namespace".
        if visible.unwrap_or("") == href {
            return;
        }
        declarations.push((prefix.map(str::to_string), href.to_string()));
    }
}
