//! Node type definitions.
//!
//! `NodeKind` carries the payload for each node in the arena; `NodeType` is
//! the bare tag exposed through the handle API, numbered like libxml2's
//! `xmlElementType`.

/// The kind of a node and its associated data.
///
/// Navigation links, attributes, and namespaces are stored in `NodeData`,
/// not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A document node. Every arena has one at a fixed id; the XPath wrapper
    /// allocates a temporary second one.
    Document,

    /// A document fragment, a parentless container for sibling nodes.
    DocumentFragment,

    /// An element node, e.g. `<div class="x">`.
    Element {
        /// The local name. The prefix comes from the node's namespace.
        name: String,
    },

    /// An attribute node. Its parent is the owning element, but it is never
    /// part of that element's child list.
    Attribute {
        /// The local name.
        name: String,
        /// The normalized value.
        value: String,
    },

    /// A text node containing character data.
    Text {
        /// The decoded text.
        content: String,
    },

    /// A CDATA section.
    CData {
        /// The raw section content.
        content: String,
    },

    /// A comment, without the `<!--` and `-->` delimiters.
    Comment {
        /// The comment text.
        content: String,
    },

    /// A processing instruction, e.g. `<?target data?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// An entity reference left unexpanded, e.g. `&nbsp;` in HTML.
    EntityRef {
        /// The entity name without `&` and `;`.
        name: String,
    },

    /// A document type declaration. Internal subset declarations are its
    /// children.
    DocumentType {
        /// The declared root element name.
        name: String,
        /// The SYSTEM identifier, if any.
        system_id: Option<String>,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
    },

    /// A markup declaration from an internal subset, kept verbatim.
    Declaration {
        /// Which declaration this is.
        kind: DeclarationKind,
        /// The declared name.
        name: String,
        /// Everything between the name and the closing `>`.
        body: String,
    },
}

/// The markup declarations kept from an internal DTD subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// `<!ELEMENT ...>`
    Element,
    /// `<!ATTLIST ...>`
    Attribute,
    /// `<!ENTITY ...>`
    Entity,
    /// `<!NOTATION ...>`
    Notation,
}

impl DeclarationKind {
    /// The keyword following `<!`.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Element => "ELEMENT",
            Self::Attribute => "ATTLIST",
            Self::Entity => "ENTITY",
            Self::Notation => "NOTATION",
        }
    }
}

/// The type tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Attribute,
    Text,
    CData,
    EntityRef,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentType,
    DocumentFragment,
    Notation,
    ElementDecl,
    AttributeDecl,
    EntityDecl,
    /// A namespace declaration surfaced as a node. The arena never stores
    /// these; the tag exists so numeric codes round-trip.
    NamespaceDecl,
}

impl NodeType {
    /// The numeric code used by libxml2 for this node type.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Element => 1,
            Self::Attribute => 2,
            Self::Text => 3,
            Self::CData => 4,
            Self::EntityRef => 5,
            Self::ProcessingInstruction => 7,
            Self::Comment => 8,
            Self::Document => 9,
            Self::DocumentType => 10,
            Self::DocumentFragment => 11,
            Self::Notation => 12,
            Self::ElementDecl => 15,
            Self::AttributeDecl => 16,
            Self::EntityDecl => 17,
            Self::NamespaceDecl => 18,
        }
    }

    /// Maps a libxml2 node type code back to a tag.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => Self::Element,
            2 => Self::Attribute,
            3 => Self::Text,
            4 => Self::CData,
            5 => Self::EntityRef,
            7 => Self::ProcessingInstruction,
            8 => Self::Comment,
            9 | 13 => Self::Document,
            10 | 14 => Self::DocumentType,
            11 => Self::DocumentFragment,
            12 => Self::Notation,
            15 => Self::ElementDecl,
            16 => Self::AttributeDecl,
            17 => Self::EntityDecl,
            18 => Self::NamespaceDecl,
            _ => return None,
        })
    }
}

impl NodeKind {
    /// The tag for this payload.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Document => NodeType::Document,
            Self::DocumentFragment => NodeType::DocumentFragment,
            Self::Element { .. } => NodeType::Element,
            Self::Attribute { .. } => NodeType::Attribute,
            Self::Text { .. } => NodeType::Text,
            Self::CData { .. } => NodeType::CData,
            Self::Comment { .. } => NodeType::Comment,
            Self::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            Self::EntityRef { .. } => NodeType::EntityRef,
            Self::DocumentType { .. } => NodeType::DocumentType,
            Self::Declaration { kind, .. } => match kind {
                DeclarationKind::Element => NodeType::ElementDecl,
                DeclarationKind::Attribute => NodeType::AttributeDecl,
                DeclarationKind::Entity => NodeType::EntityDecl,
                DeclarationKind::Notation => NodeType::Notation,
            },
        }
    }

    /// Whether nodes of this kind may hold children.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Document | Self::DocumentFragment | Self::Element { .. } | Self::DocumentType { .. }
        )
    }
}
