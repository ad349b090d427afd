//! Namespace definitions.

use std::fmt;
use std::rc::Rc;

/// The URI bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A namespace definition: an href and an optional prefix.
///
/// Definitions are reference counted. Every element or attribute using a
/// namespace, and every element declaring it, holds a clone of the same
/// definition, so a definition lives exactly as long as its last user.
#[derive(Clone)]
pub struct Namespace(Rc<Definition>);

#[derive(Debug, PartialEq, Eq)]
struct Definition {
    href: String,
    prefix: Option<String>,
}

impl Namespace {
    /// Creates a namespace definition not yet declared on any element.
    ///
    /// An empty prefix is treated as no prefix (the default namespace).
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlhandle::Namespace;
    ///
    /// let ns = Namespace::new("urn:x", Some("x"));
    /// assert_eq!(ns.href(), "urn:x");
    /// assert_eq!(ns.prefix(), Some("x"));
    /// ```
    #[must_use]
    pub fn new(href: &str, prefix: Option<&str>) -> Self {
        Self(Rc::new(Definition {
            href: href.to_string(),
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
        }))
    }

    /// The namespace URI.
    #[must_use]
    pub fn href(&self) -> &str {
        &self.0.href
    }

    /// The prefix, or `None` for a default namespace.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.0.prefix.as_deref()
    }

    /// Whether both handles share one definition.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The `xmlns` / `xmlns:p` attribute name that declares this namespace.
    pub(crate) fn declaration_name(&self) -> String {
        match self.prefix() {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        }
    }

    /// Prefixes `local` with this namespace's prefix, if it has one.
    pub(crate) fn qualify(&self, local: &str) -> String {
        match self.prefix() {
            Some(p) => format!("{p}:{local}"),
            None => local.to_string(),
        }
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Namespace {}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("href", &self.0.href)
            .field("prefix", &self.0.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_prefix_is_default() {
        let ns = Namespace::new("urn:a", Some(""));
        assert_eq!(ns.prefix(), None);
        assert_eq!(ns.declaration_name(), "xmlns");
        assert_eq!(ns.qualify("x"), "x");
    }

    #[test]
    fn test_equality_is_by_value() {
        let a = Namespace::new("urn:a", Some("a"));
        let b = Namespace::new("urn:a", Some("a"));
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
        assert_eq!(a.qualify("item"), "a:item");
    }
}
