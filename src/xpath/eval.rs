//! Expression evaluator.
//!
//! Walks an [`Expr`] against a [`Tree`]. Every expression is evaluated with
//! a focus (context node, position, and size); the [`XPathContext`] holds
//! what stays fixed across one evaluation: the tree, namespace bindings,
//! variables, and a lazily built document order index.
//!
//! Document order is pre-order with an element's attributes placed right
//! after the element and before its children. Document type and markup
//! declaration nodes are outside the `XPath` data model and never match a
//! node test.

use std::cell::OnceCell;
use std::collections::HashMap;

use crate::engine::codes;
use crate::tree::{NodeId, NodeKind, Tree, XML_NAMESPACE};

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::types::{parse_number, string_value, XPathError, XPathValue};

/// Fixed state of one evaluation.
///
/// # Examples
///
/// ```
/// use xmlhandle::engine::Diagnostics;
/// use xmlhandle::parser::{parse_bytes, ParseOptions};
/// use xmlhandle::xpath::{parse, XPathContext, XPathValue};
///
/// let tree = parse_bytes(b"<r><a/><a/></r>", &ParseOptions::default(), &mut Diagnostics::new()).unwrap();
/// let expr = parse("count(//a)").unwrap();
/// let value = XPathContext::new(&tree).evaluate(&expr, tree.root()).unwrap();
/// assert_eq!(value, XPathValue::Number(2.0));
/// ```
pub struct XPathContext<'a> {
    tree: &'a Tree,
    namespaces: HashMap<String, String>,
    variables: HashMap<String, XPathValue>,
    order: OnceCell<HashMap<NodeId, usize>>,
    /// Position reported for evaluation errors.
    end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Focus {
    node: NodeId,
    position: usize,
    size: usize,
}

impl<'a> XPathContext<'a> {
    /// A context with only the `xml` prefix bound.
    #[must_use]
    pub fn new(tree: &'a Tree) -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert("xml".to_string(), XML_NAMESPACE.to_string());
        Self {
            tree,
            namespaces,
            variables: HashMap::new(),
            order: OnceCell::new(),
            end: 0,
        }
    }

    /// Binds `prefix` for prefixed name tests. A later binding of the same
    /// prefix wins.
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) {
        self.namespaces.insert(prefix.to_string(), uri.to_string());
    }

    /// Binds `$name`.
    pub fn set_variable(&mut self, name: &str, value: XPathValue) {
        self.variables.insert(name.to_string(), value);
    }

    /// Sets the position reported by evaluation errors, usually the length
    /// of the expression text.
    pub(crate) fn set_error_position(&mut self, end: usize) {
        self.end = end;
    }

    /// Evaluates `expr` with `node` as the context node.
    ///
    /// # Errors
    ///
    /// Returns `XPathError` for unknown functions, wrong argument counts,
    /// type errors, and unbound prefixes or variables.
    pub fn evaluate(&self, expr: &Expr, node: NodeId) -> Result<XPathValue, XPathError> {
        if !self.tree.is_live(node) {
            return Err(self.error(codes::XPATH_INVALID_CTXT));
        }
        self.eval(
            expr,
            Focus {
                node,
                position: 1,
                size: 1,
            },
        )
    }

    fn error(&self, code: i32) -> XPathError {
        XPathError::new(code, self.end)
    }

    fn eval(&self, expr: &Expr, focus: Focus) -> Result<XPathValue, XPathError> {
        match expr {
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| self.error(codes::XPATH_UNDEF_VARIABLE).detail(format!("${name}"))),
            Expr::Negate(inner) => Ok(XPathValue::Number(-self.number(inner, focus)?)),
            Expr::Binary { op, left, right } => self.binary(*op, left, right, focus),
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, focus)?;
                nodes.extend(self.node_set(right, focus)?);
                self.sort_unique(&mut nodes);
                Ok(XPathValue::NodeSet(nodes))
            }
            Expr::Call { name, args } => self.call(name, args, focus),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    self.tree.top_ancestor(focus.node)
                } else {
                    focus.node
                };
                Ok(XPathValue::NodeSet(self.steps(vec![start], steps)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.node_set(primary, focus)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(XPathValue::NodeSet(self.steps(nodes, steps)?))
            }
        }
    }

    fn node_set(&self, expr: &Expr, focus: Focus) -> Result<Vec<NodeId>, XPathError> {
        match self.eval(expr, focus)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(self
                .error(codes::XPATH_INVALID_TYPE)
                .detail(format!("expected a node-set, found a {}", other.type_name()))),
        }
    }

    fn number(&self, expr: &Expr, focus: Focus) -> Result<f64, XPathError> {
        Ok(self.eval(expr, focus)?.to_number(self.tree))
    }

    fn string(&self, expr: &Expr, focus: Focus) -> Result<String, XPathError> {
        Ok(self.eval(expr, focus)?.to_xpath_string(self.tree))
    }

    // --- Location paths ---

    fn steps(&self, mut nodes: Vec<NodeId>, steps: &[Step]) -> Result<Vec<NodeId>, XPathError> {
        for step in steps {
            let mut selected = Vec::new();
            for &node in &nodes {
                let mut candidates = Vec::new();
                for candidate in self.axis(step.axis, node) {
                    if self.matches(&step.test, step.axis, candidate)? {
                        candidates.push(candidate);
                    }
                }
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                selected.extend(candidates);
            }
            self.sort_unique(&mut selected);
            nodes = selected;
        }
        Ok(nodes)
    }

    /// Keeps the nodes for which `predicate` holds. `nodes` must be in the
    /// order positions are counted in.
    fn filter(&self, nodes: Vec<NodeId>, predicate: &Expr) -> Result<Vec<NodeId>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (i, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: i + 1,
                size,
            };
            #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
            let keep = match self.eval(predicate, focus)? {
                XPathValue::Number(n) => n == (i + 1) as f64,
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// The nodes on `axis` from `node`, nearest first.
    fn axis(&self, axis: Axis, node: NodeId) -> Vec<NodeId> {
        let tree = self.tree;
        let is_attribute = matches!(tree.node(node).kind, NodeKind::Attribute { .. });
        match axis {
            Axis::Child => tree.children(node).collect(),
            Axis::Descendant => tree.descendants(node).collect(),
            Axis::DescendantOrSelf => std::iter::once(node).chain(tree.descendants(node)).collect(),
            Axis::Parent => tree.parent(node).into_iter().collect(),
            Axis::Ancestor => tree.ancestors(node).skip(1).collect(),
            Axis::AncestorOrSelf => tree.ancestors(node).collect(),
            Axis::SelfAxis => vec![node],
            Axis::Attribute => tree.node(node).attributes.clone(),
            Axis::Namespace => Vec::new(),
            Axis::FollowingSibling if is_attribute => Vec::new(),
            Axis::PrecedingSibling if is_attribute => Vec::new(),
            Axis::FollowingSibling => std::iter::successors(tree.next_sibling(node), |&n| tree.next_sibling(n)).collect(),
            Axis::PrecedingSibling => std::iter::successors(tree.prev_sibling(node), |&n| tree.prev_sibling(n)).collect(),
            Axis::Following => {
                let mut out = Vec::new();
                let mut start = node;
                if is_attribute {
                    if let Some(owner) = tree.parent(node) {
                        out.extend(tree.descendants(owner));
                        start = owner;
                    }
                }
                for ancestor in tree.ancestors(start) {
                    let mut sibling = tree.next_sibling(ancestor);
                    while let Some(s) = sibling {
                        out.push(s);
                        out.extend(tree.descendants(s));
                        sibling = tree.next_sibling(s);
                    }
                }
                out
            }
            Axis::Preceding => {
                let start = if is_attribute { tree.parent(node).unwrap_or(node) } else { node };
                let mut out = Vec::new();
                for ancestor in tree.ancestors(start) {
                    let mut sibling = tree.prev_sibling(ancestor);
                    while let Some(s) = sibling {
                        let mut subtree: Vec<NodeId> = std::iter::once(s).chain(tree.descendants(s)).collect();
                        subtree.reverse();
                        out.extend(subtree);
                        sibling = tree.prev_sibling(s);
                    }
                }
                out
            }
        }
    }

    fn matches(&self, test: &NodeTest, axis: Axis, id: NodeId) -> Result<bool, XPathError> {
        let data = self.tree.node(id);
        let principal = if axis == Axis::Attribute {
            matches!(data.kind, NodeKind::Attribute { .. })
        } else {
            matches!(data.kind, NodeKind::Element { .. })
        };
        Ok(match test {
            NodeTest::Node => !matches!(data.kind, NodeKind::DocumentType { .. } | NodeKind::Declaration { .. }),
            NodeTest::Text => matches!(data.kind, NodeKind::Text { .. } | NodeKind::CData { .. }),
            NodeTest::Comment => matches!(data.kind, NodeKind::Comment { .. }),
            NodeTest::ProcessingInstruction(target) => match &data.kind {
                NodeKind::ProcessingInstruction { target: t, .. } => target.as_ref().map_or(true, |want| want == t),
                _ => false,
            },
            NodeTest::Any => principal,
            NodeTest::AnyIn(prefix) => {
                let uri = self.resolve(prefix)?;
                principal && self.tree.namespace_uri(id) == Some(uri)
            }
            NodeTest::Name { prefix, local } => {
                let uri = prefix.as_deref().map(|p| self.resolve(p)).transpose()?;
                principal && self.tree.name(id) == Some(local.as_str()) && self.tree.namespace_uri(id) == uri
            }
        })
    }

    fn resolve(&self, prefix: &str) -> Result<&str, XPathError> {
        self.namespaces
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| self.error(codes::XPATH_UNDEF_PREFIX).detail(prefix))
    }

    fn sort_unique(&self, nodes: &mut Vec<NodeId>) {
        if nodes.len() < 2 {
            return;
        }
        let index = self.order.get_or_init(|| self.order_index(nodes[0]));
        nodes.sort_by_key(|n| (index.get(n).copied().unwrap_or(usize::MAX), *n));
        nodes.dedup();
    }

    fn order_index(&self, any: NodeId) -> HashMap<NodeId, usize> {
        let tree = self.tree;
        let mut index = HashMap::new();
        let mut stack = vec![tree.top_ancestor(any)];
        while let Some(id) = stack.pop() {
            index.insert(id, index.len());
            for &attr in &tree.node(id).attributes {
                index.insert(attr, index.len());
            }
            let before = stack.len();
            stack.extend(tree.children(id));
            stack[before..].reverse();
        }
        index
    }

    // --- Operators ---

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr, focus: Focus) -> Result<XPathValue, XPathError> {
        match op {
            BinaryOp::Or => Ok(XPathValue::Boolean(
                self.eval(left, focus)?.to_boolean() || self.eval(right, focus)?.to_boolean(),
            )),
            BinaryOp::And => Ok(XPathValue::Boolean(
                self.eval(left, focus)?.to_boolean() && self.eval(right, focus)?.to_boolean(),
            )),
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                let l = self.eval(left, focus)?;
                let r = self.eval(right, focus)?;
                Ok(XPathValue::Boolean(self.compare(op, &l, &r)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.number(left, focus)?;
                let r = self.number(right, focus)?;
                Ok(XPathValue::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                }))
            }
        }
    }

    /// Comparison with node-set semantics: a node-set compares true if any
    /// of its nodes' string-values does.
    fn compare(&self, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
        let tree = self.tree;
        let text = |n: &NodeId| XPathValue::String(string_value(tree, *n));
        match (left, right) {
            (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => {
                let rights: Vec<XPathValue> = b.iter().map(text).collect();
                a.iter().any(|n| {
                    let l = text(n);
                    rights.iter().any(|r| self.compare_atoms(op, &l, r))
                })
            }
            (XPathValue::NodeSet(a), XPathValue::Boolean(_)) => {
                self.compare_atoms(op, &XPathValue::Boolean(!a.is_empty()), right)
            }
            (XPathValue::Boolean(_), XPathValue::NodeSet(b)) => {
                self.compare_atoms(op, left, &XPathValue::Boolean(!b.is_empty()))
            }
            (XPathValue::NodeSet(a), _) => a.iter().any(|n| self.compare_atoms(op, &text(n), right)),
            (_, XPathValue::NodeSet(b)) => b.iter().any(|n| self.compare_atoms(op, left, &text(n))),
            _ => self.compare_atoms(op, left, right),
        }
    }

    #[allow(clippy::float_cmp)]
    fn compare_atoms(&self, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
        let tree = self.tree;
        let is = |pred: fn(&XPathValue) -> bool| pred(left) || pred(right);
        if matches!(op, BinaryOp::Eq | BinaryOp::Neq) {
            let equal = if is(|v| matches!(v, XPathValue::Boolean(_))) {
                left.to_boolean() == right.to_boolean()
            } else if is(|v| matches!(v, XPathValue::Number(_))) {
                left.to_number(tree) == right.to_number(tree)
            } else {
                left.to_xpath_string(tree) == right.to_xpath_string(tree)
            };
            return (op == BinaryOp::Eq) == equal;
        }
        let (l, r) = (left.to_number(tree), right.to_number(tree));
        match op {
            BinaryOp::Lt => l < r,
            BinaryOp::Lte => l <= r,
            BinaryOp::Gt => l > r,
            _ => l >= r,
        }
    }

    // --- Core function library ---

    fn arity(&self, name: &str, args: &[Expr], min: usize, max: usize) -> Result<(), XPathError> {
        if args.len() < min || args.len() > max {
            return Err(self
                .error(codes::XPATH_INVALID_ARITY)
                .detail(format!("{name}() takes {min} to {max} arguments, got {}", args.len())));
        }
        Ok(())
    }

    /// The node a name function applies to: the first node of its argument,
    /// or the context node.
    fn name_target(&self, args: &[Expr], focus: Focus) -> Result<Option<NodeId>, XPathError> {
        match args.first() {
            Some(arg) => Ok(self.node_set(arg, focus)?.first().copied()),
            None => Ok(Some(focus.node)),
        }
    }

    /// The string argument at `i`, defaulting to the context node's
    /// string-value.
    fn string_or_context(&self, args: &[Expr], focus: Focus) -> Result<String, XPathError> {
        match args.first() {
            Some(arg) => self.string(arg, focus),
            None => Ok(string_value(self.tree, focus.node)),
        }
    }

    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    fn call(&self, name: &str, args: &[Expr], focus: Focus) -> Result<XPathValue, XPathError> {
        use XPathValue::{Boolean, Number, String as Str};
        let tree = self.tree;
        match name {
            "last" => {
                self.arity(name, args, 0, 0)?;
                Ok(Number(focus.size as f64))
            }
            "position" => {
                self.arity(name, args, 0, 0)?;
                Ok(Number(focus.position as f64))
            }
            "count" => {
                self.arity(name, args, 1, 1)?;
                Ok(Number(self.node_set(&args[0], focus)?.len() as f64))
            }
            "id" => {
                self.arity(name, args, 1, 1)?;
                let wanted: Vec<String> = match self.eval(&args[0], focus)? {
                    XPathValue::NodeSet(nodes) => nodes.iter().map(|&n| string_value(tree, n)).collect(),
                    other => vec![other.to_xpath_string(tree)],
                };
                let tokens: Vec<&str> = wanted.iter().flat_map(|s| s.split_whitespace()).collect();
                let top = tree.top_ancestor(focus.node);
                let mut found: Vec<NodeId> = std::iter::once(top)
                    .chain(tree.descendants(top))
                    .filter(|&n| self.id_of(n).is_some_and(|id| tokens.contains(&id)))
                    .collect();
                self.sort_unique(&mut found);
                Ok(XPathValue::NodeSet(found))
            }
            "local-name" => {
                self.arity(name, args, 0, 1)?;
                let target = self.name_target(args, focus)?;
                Ok(Str(target.and_then(|n| self.xpath_name(n, false)).unwrap_or_default()))
            }
            "name" => {
                self.arity(name, args, 0, 1)?;
                let target = self.name_target(args, focus)?;
                Ok(Str(target.and_then(|n| self.xpath_name(n, true)).unwrap_or_default()))
            }
            "namespace-uri" => {
                self.arity(name, args, 0, 1)?;
                let target = self.name_target(args, focus)?;
                Ok(Str(target
                    .and_then(|n| tree.namespace_uri(n))
                    .unwrap_or_default()
                    .to_string()))
            }
            "string" => {
                self.arity(name, args, 0, 1)?;
                Ok(Str(self.string_or_context(args, focus)?))
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(self.error(codes::XPATH_INVALID_ARITY).detail("concat() takes at least 2 arguments"));
                }
                let mut out = std::string::String::new();
                for arg in args {
                    out.push_str(&self.string(arg, focus)?);
                }
                Ok(Str(out))
            }
            "starts-with" | "contains" | "substring-before" | "substring-after" => {
                self.arity(name, args, 2, 2)?;
                let s = self.string(&args[0], focus)?;
                let t = self.string(&args[1], focus)?;
                Ok(match name {
                    "starts-with" => Boolean(s.starts_with(&t)),
                    "contains" => Boolean(s.contains(&t)),
                    "substring-before" => Str(s.find(&t).map(|i| s[..i].to_string()).unwrap_or_default()),
                    _ => Str(s.find(&t).map(|i| s[i + t.len()..].to_string()).unwrap_or_default()),
                })
            }
            "substring" => {
                self.arity(name, args, 2, 3)?;
                let s = self.string(&args[0], focus)?;
                let start = round(self.number(&args[1], focus)?);
                let end = match args.get(2) {
                    Some(len) => start + round(self.number(len, focus)?),
                    None => f64::INFINITY,
                };
                let out: std::string::String = s
                    .chars()
                    .enumerate()
                    .filter(|&(i, _)| {
                        let p = (i + 1) as f64;
                        p >= start && p < end
                    })
                    .map(|(_, c)| c)
                    .collect();
                Ok(Str(out))
            }
            "string-length" => {
                self.arity(name, args, 0, 1)?;
                Ok(Number(self.string_or_context(args, focus)?.chars().count() as f64))
            }
            "normalize-space" => {
                self.arity(name, args, 0, 1)?;
                let s = self.string_or_context(args, focus)?;
                Ok(Str(s.split_ascii_whitespace().collect::<Vec<_>>().join(" ")))
            }
            "translate" => {
                self.arity(name, args, 3, 3)?;
                let s = self.string(&args[0], focus)?;
                let from: Vec<char> = self.string(&args[1], focus)?.chars().collect();
                let to: Vec<char> = self.string(&args[2], focus)?.chars().collect();
                let out = s
                    .chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                Ok(Str(out))
            }
            "boolean" => {
                self.arity(name, args, 1, 1)?;
                Ok(Boolean(self.eval(&args[0], focus)?.to_boolean()))
            }
            "not" => {
                self.arity(name, args, 1, 1)?;
                Ok(Boolean(!self.eval(&args[0], focus)?.to_boolean()))
            }
            "true" | "false" => {
                self.arity(name, args, 0, 0)?;
                Ok(Boolean(name == "true"))
            }
            "lang" => {
                self.arity(name, args, 1, 1)?;
                let wanted = self.string(&args[0], focus)?.to_ascii_lowercase();
                let lang = tree.ancestors(focus.node).find_map(|n| {
                    let attrs = &tree.node(n).attributes;
                    attrs.iter().find_map(|&a| {
                        (tree.name(a) == Some("lang") && tree.namespace_uri(a) == Some(XML_NAMESPACE))
                            .then(|| tree.text_content(a).to_ascii_lowercase())
                    })
                });
                Ok(Boolean(lang.is_some_and(|l| {
                    l == wanted || l.strip_prefix(wanted.as_str()).is_some_and(|rest| rest.starts_with('-'))
                })))
            }
            "number" => {
                self.arity(name, args, 0, 1)?;
                Ok(Number(match args.first() {
                    Some(arg) => self.number(arg, focus)?,
                    None => parse_number(&string_value(tree, focus.node)),
                }))
            }
            "sum" => {
                self.arity(name, args, 1, 1)?;
                let nodes = self.node_set(&args[0], focus)?;
                Ok(Number(nodes.iter().map(|&n| parse_number(&string_value(tree, n))).sum()))
            }
            "floor" | "ceiling" | "round" => {
                self.arity(name, args, 1, 1)?;
                let n = self.number(&args[0], focus)?;
                Ok(Number(match name {
                    "floor" => n.floor(),
                    "ceiling" => n.ceil(),
                    _ => round(n),
                }))
            }
            _ => Err(self.error(codes::XPATH_UNKNOWN_FUNC).detail(name)),
        }
    }

    /// The ID of an element: its `xml:id`, or its `id` attribute in HTML.
    fn id_of(&self, node: NodeId) -> Option<&'a str> {
        let tree = self.tree;
        if !matches!(tree.node(node).kind, NodeKind::Element { .. }) {
            return None;
        }
        let attr = tree
            .attribute(node, "id", Some(XML_NAMESPACE))
            .or_else(|| tree.html.then(|| tree.attribute(node, "id", None)).flatten())?;
        match &tree.node(attr).kind {
            NodeKind::Attribute { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }

    fn xpath_name(&self, node: NodeId, qualified: bool) -> Option<String> {
        let tree = self.tree;
        match &tree.node(node).kind {
            NodeKind::Element { name } | NodeKind::Attribute { name, .. } => Some(if qualified {
                tree.qualified_name(node).unwrap_or_else(|| name.clone())
            } else {
                name.clone()
            }),
            NodeKind::ProcessingInstruction { target, .. } => Some(target.clone()),
            _ => None,
        }
    }
}

/// `round()`: halves round towards positive infinity, and values in
/// `[-0.5, 0)` round to negative zero.
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    if (-0.5..0.0).contains(&n) {
        return -0.0;
    }
    (n + 0.5).floor()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::engine::Diagnostics;
    use crate::parser::{parse_bytes, ParseOptions};
    use crate::xpath::parse;
    use pretty_assertions::assert_eq;

    const BOOKS: &str = r#"<catalog xmlns:x="urn:x">
  <book id="b1" xml:lang="en-GB"><title>Rust</title><price>30</price></book>
  <book id="b2"><title>XML</title><price>12.5</price><x:note>n</x:note></book>
  <!-- end -->
  <?pi data?>
</catalog>"#;

    fn tree(text: &str) -> Tree {
        parse_bytes(text.as_bytes(), &ParseOptions::default().no_blanks(true), &mut Diagnostics::new()).unwrap()
    }

    fn eval_at(tree: &Tree, node: NodeId, expr: &str) -> Result<XPathValue, XPathError> {
        let mut ctx = XPathContext::new(tree);
        ctx.register_namespace("p", "urn:x");
        ctx.evaluate(&parse(expr).unwrap(), node)
    }

    fn nodes(tree: &Tree, expr: &str) -> Vec<NodeId> {
        match eval_at(tree, tree.root(), expr).unwrap() {
            XPathValue::NodeSet(n) => n,
            other => panic!("expected a node-set, got {other:?}"),
        }
    }

    fn names(tree: &Tree, expr: &str) -> Vec<String> {
        nodes(tree, expr)
            .into_iter()
            .map(|n| tree.qualified_name(n).unwrap_or_else(|| tree.text_content(n)))
            .collect()
    }

    fn number(tree: &Tree, expr: &str) -> f64 {
        eval_at(tree, tree.root(), expr).unwrap().to_number(tree)
    }

    fn string(tree: &Tree, expr: &str) -> String {
        eval_at(tree, tree.root(), expr).unwrap().to_xpath_string(tree)
    }

    #[test]
    fn test_paths_and_predicates() {
        let t = tree(BOOKS);
        assert_eq!(names(&t, "/catalog/book/title"), vec!["title", "title"]);
        assert_eq!(string(&t, "//book[2]/title"), "XML");
        assert_eq!(string(&t, "//book[last()]/@id"), "b2");
        assert_eq!(string(&t, "//book[price > 20]/title"), "Rust");
        assert_eq!(names(&t, "//book[1]/following-sibling::node()"), vec!["book", " end ", "pi"]);
    }

    #[test]
    fn test_reverse_axis_positions() {
        let t = tree(BOOKS);
        assert_eq!(string(&t, "//price[1]/ancestor::*[1]/@id"), "b1");
        assert_eq!(string(&t, "(//title)[2]/preceding::title[1]"), "Rust");
        // reverse axes still yield document order
        assert_eq!(
            names(&t, "//p:note/preceding::*"),
            vec!["book", "title", "price", "title", "price"]
        );
    }

    #[test]
    fn test_namespaces() {
        let t = tree(BOOKS);
        assert_eq!(names(&t, "//p:note"), vec!["x:note"]);
        assert_eq!(names(&t, "//book/p:*"), vec!["x:note"]);
        assert!(names(&t, "//note").is_empty());
        let err = eval_at(&t, t.root(), "//q:note").unwrap_err();
        assert_eq!(err.code, codes::XPATH_UNDEF_PREFIX);
    }

    #[test]
    fn test_attributes_in_document_order() {
        let t = tree("<r><a k='1' m='2'><b/></a></r>");
        let order = names(&t, "//b | //@m | //a | //@k");
        assert_eq!(order, vec!["a", "k", "m", "b"]);
        assert_eq!(names(&t, "//@k/following::*"), vec!["b"]);
        assert_eq!(names(&t, "//@k/parent::*"), vec!["a"]);
        assert!(names(&t, "//a/namespace::*").is_empty());
    }

    #[test]
    fn test_functions() {
        let t = tree(BOOKS);
        assert_eq!(number(&t, "count(//book)"), 2.0);
        assert_eq!(number(&t, "sum(//price)"), 42.5);
        assert_eq!(string(&t, "concat(name(/*), '-', local-name(//p:note))"), "catalog-note");
        assert_eq!(string(&t, "namespace-uri(//p:note)"), "urn:x");
        assert_eq!(string(&t, "substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(string(&t, "substring('12345', 0, 3)"), "12");
        assert_eq!(string(&t, "substring-after('a=b', '=')"), "b");
        assert_eq!(string(&t, "translate('bar', 'abc', 'AB')"), "BAr");
        assert_eq!(string(&t, "normalize-space('  a  b ')"), "a b");
        assert_eq!(number(&t, "string-length('h\u{e9}')"), 2.0);
        assert_eq!(number(&t, "round(-0.5)"), 0.0);
        assert_eq!(number(&t, "round(2.5) + floor(1.9) + ceiling(1.1)"), 6.0);
        assert!(eval_at(&t, t.root(), "boolean(//book[1][lang('en')])").unwrap().to_boolean());
        assert!(!eval_at(&t, t.root(), "boolean(//book[2][lang('en')])").unwrap().to_boolean());
        assert_eq!(string(&t, "//processing-instruction('pi')"), "data");
        assert_eq!(number(&t, "count(//comment())"), 1.0);
    }

    #[test]
    fn test_comparisons() {
        let t = tree(BOOKS);
        let check = |expr: &str| eval_at(&t, t.root(), expr).unwrap().to_boolean();
        assert!(check("//price = 30"));
        assert!(check("//price = '12.5'"));
        assert!(check("//price != 30"));
        assert!(check("//title = //title"));
        assert!(!check("//missing = ''"));
        assert!(check("//missing = false()"));
        assert!(check("1 < 2 and 'a' = 'a'"));
        assert!(!check("number('x') = number('x')"));
        assert_eq!(number(&t, "7 mod -3"), 1.0);
        assert_eq!(number(&t, "-(1 div 0) < 0"), 1.0);
    }

    #[test]
    fn test_context_relative_and_root() {
        let t = tree(BOOKS);
        let book = nodes(&t, "//book[2]")[0];
        assert_eq!(eval_at(&t, book, "string(title)").unwrap(), XPathValue::String("XML".to_string()));
        assert_eq!(eval_at(&t, book, "count(/catalog)").unwrap(), XPathValue::Number(1.0));
        assert_eq!(eval_at(&t, book, "position()").unwrap(), XPathValue::Number(1.0));
    }

    #[test]
    fn test_evaluation_errors() {
        let t = tree(BOOKS);
        let err = eval_at(&t, t.root(), "frobnicate()").unwrap_err();
        assert_eq!(err.code, codes::XPATH_UNKNOWN_FUNC);
        let err = eval_at(&t, t.root(), "count(1)").unwrap_err();
        assert_eq!(err.code, codes::XPATH_INVALID_TYPE);
        let err = eval_at(&t, t.root(), "count()").unwrap_err();
        assert_eq!(err.code, codes::XPATH_INVALID_ARITY);
        let err = eval_at(&t, t.root(), "$nope").unwrap_err();
        assert_eq!(err.code, codes::XPATH_UNDEF_VARIABLE);
        let err = eval_at(&t, t.root(), "'a'/b").unwrap_err();
        assert_eq!(err.code, codes::XPATH_INVALID_TYPE);
    }

    #[test]
    fn test_variables_and_id() {
        let t = tree("<r><a xml:id='one'/><b xml:id='two'/></r>");
        let mut ctx = XPathContext::new(&t);
        ctx.set_variable("ids", XPathValue::String("two one".to_string()));
        let value = ctx.evaluate(&parse("id($ids)").unwrap(), t.root()).unwrap();
        let XPathValue::NodeSet(found) = value else {
            panic!("expected a node-set");
        };
        let found: Vec<_> = found.iter().filter_map(|&n| t.name(n)).collect();
        assert_eq!(found, vec!["a", "b"]);
    }
}
