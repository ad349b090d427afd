//! `XPath` queries on node handles.

use std::rc::Rc;

use crate::engine::{codes, Diagnostics};
use crate::error::{Error, ErrorDomain, ErrorLevel, Result, XmlError};
use crate::tree::{NodeId, NodeKind, Tree, TreeRef};
use crate::xpath::{self, XPathValue};

use super::Node;

/// Hangs a detached subtree below a temporary document node for the
/// duration of a query, so that `/` has something to select.
///
/// Dropping the guard unlinks the subtree again and releases the temporary
/// node.
struct WrapperScope {
    tree: TreeRef,
    top: NodeId,
    wrapper: Option<NodeId>,
}

impl WrapperScope {
    fn enter(tree: &TreeRef, id: NodeId) -> Self {
        let mut t = tree.borrow_mut();
        let top = t.top_ancestor(id);
        let needs_wrapper = !t.in_document(id)
            && !matches!(t.node(top).kind, NodeKind::Attribute { .. } | NodeKind::Document);
        let wrapper = needs_wrapper.then(|| {
            let wrapper = t.create_node(NodeKind::Document);
            t.append_child(wrapper, top);
            tracing::debug!(top = ?top, "wrapping detached subtree for xpath");
            wrapper
        });
        Self {
            tree: Rc::clone(tree),
            top,
            wrapper,
        }
    }
}

impl Drop for WrapperScope {
    fn drop(&mut self) {
        let Some(wrapper) = self.wrapper else {
            return;
        };
        if let Ok(mut t) = self.tree.try_borrow_mut() {
            t.detach(self.top);
            t.release_subtree(wrapper);
        }
    }
}

impl Node {
    /// Evaluates an `XPath` expression with this node as the context node
    /// and returns views of the selected nodes, in document order.
    ///
    /// `namespaces` binds prefixes used in the expression. Expressions that
    /// produce a number, string, or boolean yield an empty vector.
    ///
    /// A detached node is evaluated as if its top-most ancestor were the root
    /// element of a document; the tree is restored afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Error::Context` if this node was released, and
    /// `Error::Query` if the expression does not compile or cannot be
    /// evaluated. `int1` of the diagnostic holds the character position.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlhandle::Node;
    ///
    /// let root = Node::new_element("root");
    /// root.add_child(&mut Node::new_element("child")).unwrap();
    ///
    /// assert_eq!(root.evaluate("//child", &[]).unwrap().len(), 1);
    /// assert!(root.evaluate("count(*)", &[]).unwrap().is_empty());
    /// assert!(root.parent().is_none());
    /// ```
    pub fn evaluate(&self, expression: &str, namespaces: &[(&str, &str)]) -> Result<Vec<Node>> {
        let (tree, ids) = self.query(expression, namespaces, |_, value, wrapper| match value {
            XPathValue::NodeSet(nodes) => nodes.into_iter().filter(|&n| Some(n) != wrapper).collect(),
            _ => Vec::new(),
        })?;
        Ok(ids.into_iter().map(|id| Node::view(Rc::clone(&tree), id)).collect())
    }

    /// Evaluates an expression and converts the result with `string()`.
    ///
    /// # Errors
    ///
    /// As for [`evaluate`](Self::evaluate).
    pub fn eval_to_string(&self, expression: &str, namespaces: &[(&str, &str)]) -> Result<String> {
        self.query(expression, namespaces, |t, value, _| value.to_xpath_string(t))
            .map(|(_, s)| s)
    }

    /// Evaluates an expression and converts the result with `number()`.
    ///
    /// # Errors
    ///
    /// As for [`evaluate`](Self::evaluate).
    pub fn eval_to_number(&self, expression: &str, namespaces: &[(&str, &str)]) -> Result<f64> {
        self.query(expression, namespaces, |t, value, _| value.to_number(t))
            .map(|(_, n)| n)
    }

    /// Evaluates an expression and converts the result with `boolean()`.
    ///
    /// # Errors
    ///
    /// As for [`evaluate`](Self::evaluate).
    pub fn eval_to_boolean(&self, expression: &str, namespaces: &[(&str, &str)]) -> Result<bool> {
        self.query(expression, namespaces, |_, value, _| value.to_boolean())
            .map(|(_, b)| b)
    }

    fn query<R>(
        &self,
        expression: &str,
        namespaces: &[(&str, &str)],
        convert: impl FnOnce(&Tree, XPathValue, Option<NodeId>) -> R,
    ) -> Result<(TreeRef, R)> {
        let (tree, id) = self.locate();
        if !tree.borrow().is_live(id) {
            return Err(Error::Context(XmlError {
                domain: ErrorDomain::XPath,
                code: codes::XPATH_INVALID_CTXT,
                message: "context node has been released".to_string(),
                level: ErrorLevel::Error,
                str1: expression.to_string(),
                ..XmlError::default()
            }));
        }

        let scope = WrapperScope::enter(&tree, id);
        let mut diags = Diagnostics::new();
        let outcome = {
            let t = tree.borrow();
            match xpath::evaluate(&t, id, expression, namespaces, &mut diags) {
                Some(value) => Ok(convert(&t, value, scope.wrapper)),
                None => Err(diags.last_error()),
            }
        };
        drop(scope);

        match outcome {
            Ok(result) => Ok((tree, result)),
            Err(err) if err.code == codes::XPATH_INVALID_CTXT => Err(Error::Context(err)),
            Err(err) => Err(Error::Query(err)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handle::Ownership;
    use crate::tree::Namespace;
    use pretty_assertions::assert_eq;

    fn sample() -> Node {
        let root = Node::new_element("root");
        for (i, name) in ["a", "b", "a"].iter().enumerate() {
            let child = root.add_child(&mut Node::new_element(name)).unwrap();
            child.set_attribute("n", &i.to_string()).unwrap();
        }
        root
    }

    #[test]
    fn test_detached_subtree_is_restored() {
        let root = sample();
        let found = root.evaluate("/root/a", &[]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|n| n.ownership() == Ownership::View));
        assert!(root.parent().is_none());

        let everything = root.evaluate("/", &[]).unwrap();
        assert!(everything.is_empty());
    }

    #[test]
    fn test_self_axis_on_standalone_node() {
        let lone = Node::new_element("lone");
        let found = lone.evaluate("self::*", &[]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_same_node(&lone));
        assert!(lone.parent().is_none());
    }

    #[test]
    fn test_relative_to_inner_node() {
        let root = sample();
        let b = root.children().remove(1);
        let found = b.evaluate("following-sibling::a/@n", &[]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content().as_deref(), Some("2"));
        assert_eq!(b.evaluate("count(/root/*)", &[]).unwrap().len(), 0);
    }

    #[test]
    fn test_scalar_conversions() {
        let root = sample();
        assert_eq!(root.eval_to_number("sum(*/@n)", &[]).unwrap(), 3.0);
        assert_eq!(root.eval_to_string("name(*[2])", &[]).unwrap(), "b");
        assert!(root.eval_to_boolean("a and not(c)", &[]).unwrap());
        assert_eq!(root.eval_to_string("*", &[]).unwrap(), "");
    }

    #[test]
    fn test_namespace_bindings() {
        let ns = Namespace::new("urn:x", Some("x"));
        let root = Node::new_element_ns("root", &ns);
        root.add_child(&mut Node::new_element_ns("item", &ns)).unwrap();

        assert_eq!(root.evaluate("//item", &[]).unwrap().len(), 0);
        assert_eq!(root.evaluate("//q:item", &[("q", "urn:x")]).unwrap().len(), 1);

        let err = root.evaluate("//x:item", &[]).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
        assert_eq!(err.diagnostic().code, codes::XPATH_UNDEF_PREFIX);
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let root = sample();
        let err = root.evaluate("//a[", &[]).unwrap_err();
        let diag = err.diagnostic();
        assert_eq!(diag.domain, ErrorDomain::XPath);
        assert_eq!(diag.int1, 4);
        assert_eq!(diag.str1, "//a[");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_released_context() {
        let root = sample();
        let a = root.first_child().unwrap();
        drop(root);
        let err = a.evaluate(".", &[]).unwrap_err();
        assert!(matches!(err, Error::Context(_)));
        assert_eq!(err.diagnostic().code, codes::XPATH_INVALID_CTXT);
    }
}
