//! # xmlhandle
//!
//! XML and HTML documents behind ownership-aware handles, with an `XPath` 1.0
//! engine and a namespace-reconciling serializer.
//!
//! Trees live in arenas of generational node slots. A [`Node`] or [`Document`]
//! handle records whether it owns what it points to ([`Ownership`]), so a
//! subtree is released exactly once, and a handle that outlived its node
//! reports absent values instead of touching freed storage.
//!
//! ## Quick Start
//!
//! ```
//! use xmlhandle::{Document, Node};
//!
//! let root = Node::new_element("root");
//! root.set_attribute("attr", "1").unwrap();
//! root.add_child(&mut Node::new_element("child")).unwrap();
//! assert_eq!(root.serialize(false), r#"<root attr="1"><child/></root>"#);
//!
//! let found = root.evaluate("//child", &[]).unwrap();
//! assert_eq!(found[0].name().as_deref(), Some("child"));
//!
//! let doc = Document::parse_str("<a><b>text</b></a>").unwrap();
//! assert_eq!(doc.root_element().unwrap().content().as_deref(), Some("text"));
//! ```
//!
//! ## Layers
//!
//! - [`handle`]: the public [`Node`] and [`Document`] handles.
//! - [`tree`]: the arena the handles point into.
//! - [`parser`], [`html`], [`encoding`]: turning bytes into trees.
//! - [`xpath`] and [`serial`]: querying and rendering trees.
//! - [`engine`] and [`error`]: per-call diagnostics and the public error type.

#![warn(clippy::all)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod encoding;
pub mod engine;
pub mod error;
pub mod handle;
pub mod html;
pub mod parser;
pub mod serial;
pub mod tree;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use error::{Error, ErrorDomain, ErrorLevel, Result, XmlError};
pub use handle::{Document, Node, Ownership};
pub use parser::ParseOptions;
pub use serial::SerializeOptions;
pub use tree::{Namespace, NodeType};
