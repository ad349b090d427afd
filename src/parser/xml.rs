//! XML 1.0 well-formedness parser.
//!
//! A recursive descent parser over decoded text that builds a [`Tree`]
//! directly. Any well-formedness error is fatal: the partially built tree is
//! dropped and the diagnostic returned. Non-fatal findings (for example
//! references to external entities, which are never loaded) are collected as
//! warnings.

use std::collections::HashMap;

use crate::engine::{codes, Diagnostic};
use crate::error::ErrorDomain;
use crate::tree::{DeclarationKind, Namespace, NodeId, NodeKind, Tree, XML_NAMESPACE};

use super::input::{is_xml_char, split_name, PResult, ParserInput, MAX_ENTITY_NESTING};
use super::ParseOptions;

/// Upper bound on the bytes produced by entity expansion in one document.
const MAX_EXPANSION_BYTES: usize = 10_000_000;

/// An attribute as written in a start tag, before namespace resolution.
struct RawAttribute {
    qname: String,
    value: String,
}

pub(crate) struct XmlParser<'a> {
    input: ParserInput<'a>,
    tree: Tree,
    options: &'a ParseOptions,
    warnings: Vec<Diagnostic>,
    /// Namespace declarations in scope, one frame per open element.
    scopes: Vec<Vec<Namespace>>,
    /// Internal general entities. `None` marks an external entity.
    entities: HashMap<String, Option<String>>,
    expanded_bytes: usize,
}

impl<'a> XmlParser<'a> {
    pub fn new(text: &'a str, options: &'a ParseOptions) -> Self {
        Self {
            input: ParserInput::new(text, ErrorDomain::Parser, options.max_depth),
            tree: Tree::new_document(),
            options,
            warnings: Vec::new(),
            scopes: Vec::new(),
            entities: HashMap::new(),
            expanded_bytes: 0,
        }
    }

    /// Parses the whole document.
    pub fn parse(mut self) -> PResult<(Tree, Vec<Diagnostic>)> {
        let root = self.tree.root();

        if self.input.looking_at("<?xml")
            && self.input.peek_at(5).is_some_and(|b| b.is_ascii_whitespace())
        {
            self.parse_xml_declaration()?;
        }

        self.parse_misc(root)?;
        if self.input.looking_at("<!DOCTYPE") {
            self.parse_doctype(root)?;
            self.parse_misc(root)?;
        }

        if self.input.peek() == Some(b'<')
            && self.input.peek_at(1).is_some_and(|b| b != b'!' && b != b'?')
        {
            self.parse_element(root)?;
        } else if self.input.at_end() {
            return Err(self.input.fatal(codes::ERR_DOCUMENT_EMPTY, "Document is empty"));
        } else {
            return Err(self
                .input
                .fatal(codes::ERR_DOCUMENT_EMPTY, "Start tag expected, '<' not found"));
        }

        self.parse_misc(root)?;
        if !self.input.at_end() {
            return Err(self
                .input
                .fatal(codes::ERR_EXTRA_CONTENT, "Extra content at the end of the document"));
        }
        Ok((self.tree, self.warnings))
    }

    // --- Prolog ---

    fn parse_xml_declaration(&mut self) -> PResult<()> {
        self.input.advance("<?xml".len());
        let mut version = None;
        loop {
            self.input.skip_whitespace();
            if self.input.looking_at("?>") {
                self.input.advance(2);
                break;
            }
            if self.input.at_end() {
                return Err(self
                    .input
                    .fatal(codes::ERR_XMLDECL_NOT_FINISHED, "parsing XML declaration: '?>' expected"));
            }
            let (name, value) = self.input.parse_pseudo_attribute()?;
            match name.as_str() {
                "version" => version = Some(value),
                "encoding" => self.tree.encoding = Some(value),
                "standalone" => self.tree.standalone = Some(value == "yes"),
                _ => {
                    return Err(self
                        .input
                        .fatal(codes::ERR_XMLDECL_NOT_FINISHED, "parsing XML declaration: '?>' expected"));
                }
            }
        }
        if version.is_none() {
            return Err(self
                .input
                .fatal(codes::ERR_VERSION_MISSING, "Malformed declaration expecting version"));
        }
        self.tree.version = version;
        Ok(())
    }

    /// Comments, PIs, and whitespace outside the root element.
    fn parse_misc(&mut self, parent: NodeId) -> PResult<()> {
        loop {
            self.input.skip_whitespace();
            if self.input.looking_at("<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at("<?") {
                self.parse_processing_instruction(parent)?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_doctype(&mut self, parent: NodeId) -> PResult<()> {
        let line = self.input.line();
        self.input.advance("<!DOCTYPE".len());
        if !self.input.skip_whitespace() {
            return Err(self
                .input
                .fatal(codes::ERR_SPACE_REQUIRED, "Space required after '<!DOCTYPE'"));
        }
        let name = self.input.parse_name()?;
        self.input.skip_whitespace();

        let (mut public_id, mut system_id) = (None, None);
        if self.input.looking_at("PUBLIC") {
            self.input.advance("PUBLIC".len());
            self.input.skip_whitespace();
            public_id = Some(self.input.parse_quoted()?);
            self.input.skip_whitespace();
            system_id = Some(self.input.parse_quoted()?);
        } else if self.input.looking_at("SYSTEM") {
            self.input.advance("SYSTEM".len());
            self.input.skip_whitespace();
            system_id = Some(self.input.parse_quoted()?);
        }
        self.input.skip_whitespace();

        let doctype = self.tree.create_node(NodeKind::DocumentType {
            name,
            system_id,
            public_id,
        });
        self.tree.node_mut(doctype).line = line;
        self.tree.append_child(parent, doctype);

        if self.input.peek() == Some(b'[') {
            self.input.advance(1);
            self.parse_internal_subset(doctype)?;
            self.input.skip_whitespace();
        }
        self.input
            .expect(">", codes::ERR_DOCTYPE_NOT_FINISHED, "DOCTYPE improperly terminated")
    }

    fn parse_internal_subset(&mut self, doctype: NodeId) -> PResult<()> {
        loop {
            self.input.skip_whitespace();
            if self.input.peek() == Some(b']') {
                self.input.advance(1);
                return Ok(());
            }
            if self.input.looking_at("<!--") {
                self.input.parse_comment()?;
            } else if self.input.looking_at("<?") {
                self.input.parse_pi()?;
            } else if self.input.peek() == Some(b'%') {
                self.input.advance(1);
                let name = self.input.parse_name()?;
                self.input
                    .expect(";", codes::ERR_ENTITYREF_SEMICOL_MISSING, "PEReference: expecting ';'")?;
                self.warnings.push(self.input.warning(
                    codes::ERR_UNDECLARED_ENTITY,
                    format!("PEReference: %{name}; not loaded"),
                ));
            } else if let Some(kind) = self.declaration_kind() {
                self.parse_declaration(doctype, kind)?;
            } else {
                return Err(self
                    .input
                    .fatal(codes::ERR_DOCTYPE_NOT_FINISHED, "DOCTYPE internal subset not finished"));
            }
        }
    }

    fn declaration_kind(&self) -> Option<DeclarationKind> {
        [
            DeclarationKind::Element,
            DeclarationKind::Attribute,
            DeclarationKind::Entity,
            DeclarationKind::Notation,
        ]
        .into_iter()
        .find(|kind| self.input.looking_at(&format!("<!{}", kind.keyword())))
    }

    fn parse_declaration(&mut self, doctype: NodeId, kind: DeclarationKind) -> PResult<()> {
        let line = self.input.line();
        self.input.advance(2 + kind.keyword().len());
        self.input.skip_whitespace();

        let parameter = kind == DeclarationKind::Entity && self.input.peek() == Some(b'%');
        if parameter {
            self.input.advance(1);
            self.input.skip_whitespace();
        }
        let name = self.input.parse_name()?;
        let body = self.take_declaration_body()?;

        if kind == DeclarationKind::Entity && !parameter {
            let value = entity_literal(&body);
            // The first declaration of an entity is binding.
            self.entities.entry(name.clone()).or_insert(value);
        }

        let name = if parameter { format!("% {name}") } else { name };
        let decl = self.tree.create_node(NodeKind::Declaration { kind, name, body });
        self.tree.node_mut(decl).line = line;
        self.tree.append_child(doctype, decl);
        Ok(())
    }

    /// Consumes a markup declaration up to its closing `>`, honoring quotes.
    fn take_declaration_body(&mut self) -> PResult<String> {
        let mut body = String::new();
        let mut quote = None;
        loop {
            if self.input.at_end() {
                return Err(self
                    .input
                    .fatal(codes::ERR_GT_REQUIRED, "markup declaration not terminated"));
            }
            let c = self.input.next_char()?;
            match (quote, c) {
                (None, '>') => return Ok(body.trim().to_string()),
                (None, '"' | '\'') => quote = Some(c),
                (Some(q), _) if q == c => quote = None,
                _ => {}
            }
            body.push(c);
        }
    }

    // --- Elements ---

    fn parse_element(&mut self, parent: NodeId) -> PResult<NodeId> {
        self.input.enter()?;
        let line = self.input.line();
        self.input.advance(1);
        let qname = self.input.parse_name()?;

        let mut raw = Vec::new();
        loop {
            let had_space = self.input.skip_whitespace();
            if self.input.peek() == Some(b'>') || self.input.looking_at("/>") {
                break;
            }
            if self.input.at_end() {
                return Err(self.input.fatal(
                    codes::ERR_GT_REQUIRED,
                    format!("Couldn't find end of Start Tag {qname} line {line}"),
                ));
            }
            if !had_space {
                return Err(self
                    .input
                    .fatal(codes::ERR_SPACE_REQUIRED, "attributes construct error"));
            }
            let attribute = self.parse_attribute()?;
            if raw.iter().any(|a: &RawAttribute| a.qname == attribute.qname) {
                return Err(self.input.fatal(
                    codes::ERR_ATTRIBUTE_REDEFINED,
                    format!("Attribute {} redefined", attribute.qname),
                ));
            }
            raw.push(attribute);
        }

        let element = self.build_element(&qname, raw, line)?;
        self.tree.append_child(parent, element);

        if self.input.looking_at("/>") {
            self.input.advance(2);
        } else {
            self.input.advance(1);
            self.parse_content(element)?;
            if self.input.at_end() {
                return Err(self.input.fatal(
                    codes::ERR_TAG_NOT_FINISHED,
                    format!("Premature end of data in tag {qname} line {line}"),
                ));
            }
            self.parse_end_tag(&qname, line)?;
        }

        self.scopes.pop();
        self.input.leave();
        Ok(element)
    }

    /// Resolves namespaces and creates the element with its attributes.
    /// Pushes the element's namespace scope.
    fn build_element(&mut self, qname: &str, raw: Vec<RawAttribute>, line: u32) -> PResult<NodeId> {
        let mut declared = Vec::new();
        let mut plain = Vec::new();
        for attribute in raw {
            if attribute.qname == "xmlns" {
                declared.push(Namespace::new(&attribute.value, None));
            } else if let Some(prefix) = attribute.qname.strip_prefix("xmlns:") {
                if attribute.value.is_empty() {
                    return Err(self.input.fatal_in(
                        ErrorDomain::Namespace,
                        codes::NS_ERR_QNAME,
                        format!("xmlns:{prefix}: Empty XML namespace is not allowed"),
                    ));
                }
                declared.push(Namespace::new(&attribute.value, Some(prefix)));
            } else {
                plain.push(attribute);
            }
        }
        self.scopes.push(declared.clone());

        let (prefix, local) = split_name(qname);
        let namespace = match prefix {
            Some(p) => Some(self.resolve(Some(p)).ok_or_else(|| {
                self.input.fatal_in(
                    ErrorDomain::Namespace,
                    codes::NS_ERR_UNDEFINED_NAMESPACE,
                    format!("Namespace prefix {p} on {local} is not defined"),
                )
            })?),
            // xmlns="" undeclares the default namespace.
            None => self.resolve(None).filter(|ns| !ns.href().is_empty()),
        };

        let element = self.tree.create_node(NodeKind::Element {
            name: local.to_string(),
        });
        {
            let data = self.tree.node_mut(element);
            data.namespace = namespace;
            data.ns_defs = declared;
            data.line = line;
        }

        for attribute in plain {
            let (prefix, local) = split_name(&attribute.qname);
            let namespace = match prefix {
                Some(p) => Some(self.resolve(Some(p)).ok_or_else(|| {
                    self.input.fatal_in(
                        ErrorDomain::Namespace,
                        codes::NS_ERR_UNDEFINED_NAMESPACE,
                        format!("Namespace prefix {p} for {local} on {qname} is not defined"),
                    )
                })?),
                None => None,
            };
            let href = namespace.as_ref().map(Namespace::href);
            if self.tree.attribute(element, local, href).is_some() {
                return Err(self.input.fatal(
                    codes::ERR_ATTRIBUTE_REDEFINED,
                    format!("Namespaced Attribute {local} in '{}' redefined", href.unwrap_or_default()),
                ));
            }
            let attr = self.tree.set_attribute(element, local, &attribute.value, namespace);
            self.tree.node_mut(attr).line = line;
        }
        Ok(element)
    }

    fn resolve(&self, prefix: Option<&str>) -> Option<Namespace> {
        if prefix == Some("xml") {
            return Some(Namespace::new(XML_NAMESPACE, Some("xml")));
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|ns| ns.prefix() == prefix)
            .cloned()
    }

    fn parse_end_tag(&mut self, qname: &str, line: u32) -> PResult<()> {
        self.input.advance(2);
        let name = self.input.parse_name()?;
        if name != qname {
            return Err(self
                .input
                .fatal(
                    codes::ERR_TAG_NAME_MISMATCH,
                    format!("Opening and ending tag mismatch: {qname} line {line} and {name}"),
                )
                .with_str1(qname)
                .with_str2(name));
        }
        self.input.skip_whitespace();
        self.input.expect(
            ">",
            codes::ERR_GT_REQUIRED,
            &format!("expected '>' to close end tag {qname}"),
        )
    }

    fn parse_attribute(&mut self) -> PResult<RawAttribute> {
        let qname = self.input.parse_name()?;
        self.input.skip_whitespace();
        if self.input.peek() != Some(b'=') {
            return Err(self.input.fatal(
                codes::ERR_ATTRIBUTE_WITHOUT_VALUE,
                format!("Specification mandates value for attribute {qname}"),
            ));
        }
        self.input.advance(1);
        self.input.skip_whitespace();
        let value = self.parse_attribute_value()?;
        Ok(RawAttribute { qname, value })
    }

    /// Parses a quoted attribute value, expanding references and
    /// normalizing literal whitespace to spaces.
    fn parse_attribute_value(&mut self) -> PResult<String> {
        let quote = match self.input.peek() {
            Some(q @ (b'"' | b'\'')) => char::from(q),
            _ => {
                return Err(self
                    .input
                    .fatal(codes::ERR_ATTRIBUTE_NOT_STARTED, "AttValue: \" or ' expected"));
            }
        };
        self.input.advance(1);
        let mut value = String::new();
        loop {
            if self.input.at_end() {
                return Err(self
                    .input
                    .fatal(codes::ERR_ATTRIBUTE_NOT_FINISHED, "AttValue: ' expected"));
            }
            match self.input.peek() {
                Some(b'<') => {
                    return Err(self.input.fatal(
                        codes::ERR_LT_IN_ATTRIBUTE,
                        "Unescaped '<' not allowed in attributes values",
                    ));
                }
                Some(b'&') => {
                    let is_char_ref = self.input.peek_at(1) == Some(b'#');
                    let expansion = self.parse_reference()?;
                    if is_char_ref {
                        value.push_str(&expansion);
                    } else {
                        value.extend(expansion.chars().map(|c| if c.is_ascii_whitespace() { ' ' } else { c }));
                    }
                }
                _ => {
                    let c = self.input.next_char()?;
                    if c == quote {
                        return Ok(value);
                    }
                    value.push(if matches!(c, '\t' | '\n') { ' ' } else { c });
                }
            }
        }
    }

    // --- Content ---

    fn parse_content(&mut self, parent: NodeId) -> PResult<()> {
        let mut text = String::new();
        let mut text_line = self.input.line();
        while !self.input.at_end() && !self.input.looking_at("</") {
            if self.input.peek() == Some(b'<') {
                self.flush_text(parent, &mut text, text_line);
                if self.input.looking_at("<!--") {
                    self.parse_comment(parent)?;
                } else if self.input.looking_at("<![CDATA[") {
                    let line = self.input.line();
                    let content = self.input.parse_cdata()?;
                    self.append_leaf(parent, NodeKind::CData { content }, line);
                } else if self.input.looking_at("<?") {
                    self.parse_processing_instruction(parent)?;
                } else if self.input.looking_at("<!") {
                    return Err(self
                        .input
                        .fatal(codes::ERR_NAME_REQUIRED, "StartTag: invalid element name"));
                } else {
                    self.parse_element(parent)?;
                }
                continue;
            }
            if text.is_empty() {
                text_line = self.input.line();
            }
            if self.input.peek() == Some(b'&') {
                let expansion = self.parse_reference()?;
                text.push_str(&expansion);
            } else if self.input.looking_at("]]>") {
                return Err(self.input.fatal(
                    codes::ERR_MISPLACED_CDATA_END,
                    "Sequence ']]>' not allowed in content",
                ));
            } else {
                text.push(self.input.next_char()?);
            }
        }
        self.flush_text(parent, &mut text, text_line);
        Ok(())
    }

    fn flush_text(&mut self, parent: NodeId, text: &mut String, line: u32) {
        if text.is_empty() {
            return;
        }
        let content = std::mem::take(text);
        if self.options.no_blanks && content.chars().all(|c| c.is_ascii_whitespace()) {
            return;
        }
        self.append_leaf(parent, NodeKind::Text { content }, line);
    }

    fn append_leaf(&mut self, parent: NodeId, kind: NodeKind, line: u32) {
        let id = self.tree.create_node(kind);
        self.tree.node_mut(id).line = line;
        self.tree.append_child(parent, id);
    }

    fn parse_comment(&mut self, parent: NodeId) -> PResult<()> {
        let line = self.input.line();
        let content = self.input.parse_comment()?;
        self.append_leaf(parent, NodeKind::Comment { content }, line);
        Ok(())
    }

    fn parse_processing_instruction(&mut self, parent: NodeId) -> PResult<()> {
        let line = self.input.line();
        let (target, data) = self.input.parse_pi()?;
        self.append_leaf(parent, NodeKind::ProcessingInstruction { target, data }, line);
        Ok(())
    }

    // --- References ---

    /// Parses `&name;` or `&#N;` and returns its replacement text.
    fn parse_reference(&mut self) -> PResult<String> {
        self.input.advance(1);
        if self.input.peek() == Some(b'#') {
            self.input.advance(1);
            let digits = self.input.take_while(|b| b.is_ascii_alphanumeric());
            let value = char_ref_value(digits);
            self.input.expect(
                ";",
                codes::ERR_INVALID_CHARREF,
                "CharRef: invalid decimal value",
            )?;
            return value.map(String::from).ok_or_else(|| {
                self.input.fatal(
                    codes::ERR_INVALID_CHAR,
                    format!("xmlParseCharRef: invalid xmlChar value {digits}"),
                )
            });
        }
        let name = self.input.parse_name()?;
        self.input.expect(
            ";",
            codes::ERR_ENTITYREF_SEMICOL_MISSING,
            "EntityRef: expecting ';'",
        )?;
        self.expand_entity(&name, 0)
    }

    fn expand_entity(&mut self, name: &str, depth: u32) -> PResult<String> {
        if let Some(builtin) = builtin_entity(name) {
            return Ok(builtin.to_string());
        }
        let value = match self.entities.get(name) {
            Some(Some(value)) => value.clone(),
            Some(None) => {
                self.warnings.push(self.input.warning(
                    codes::ERR_UNDECLARED_ENTITY,
                    format!("Entity '{name}' is external and was not loaded"),
                ));
                return Ok(String::new());
            }
            None => {
                return Err(self
                    .input
                    .fatal(codes::ERR_UNDECLARED_ENTITY, format!("Entity '{name}' not defined"))
                    .with_str1(name));
            }
        };
        let expansion = self.expand_references(&value, depth + 1)?;
        self.expanded_bytes += expansion.len();
        if self.expanded_bytes > MAX_EXPANSION_BYTES {
            return Err(self.input.fatal(
                codes::ERR_DEPTH_EXCEEDED,
                "Maximum entity amplification factor exceeded",
            ));
        }
        Ok(expansion)
    }

    /// Expands the references inside an entity's replacement text.
    ///
    /// Markup in replacement text is kept as character data.
    fn expand_references(&mut self, raw: &str, depth: u32) -> PResult<String> {
        if depth > MAX_ENTITY_NESTING {
            return Err(self
                .input
                .fatal(codes::ERR_ENTITY_LOOP, "Detected an entity reference loop"));
        }
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(at) = rest.find('&') {
            out.push_str(&rest[..at]);
            rest = &rest[at..];
            let Some(end) = rest.find(';') else {
                break;
            };
            let reference = &rest[1..end];
            if let Some(digits) = reference.strip_prefix('#') {
                let c = char_ref_value(digits).ok_or_else(|| {
                    self.input.fatal(
                        codes::ERR_INVALID_CHAR,
                        format!("xmlParseCharRef: invalid xmlChar value {digits}"),
                    )
                })?;
                out.push(c);
            } else {
                let expansion = self.expand_entity(reference, depth)?;
                out.push_str(&expansion);
            }
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn builtin_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Decodes the digits of a character reference (`x1F` or `65`).
fn char_ref_value(digits: &str) -> Option<char> {
    let value = match digits.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(value).filter(|&c| is_xml_char(c))
}

/// The replacement text of an internal entity declaration body, or `None`
/// for an external (`SYSTEM` / `PUBLIC`) entity.
fn entity_literal(body: &str) -> Option<String> {
    let quote = body.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let inner = &body[1..];
    let end = inner.find(quote)?;
    Some(inner[..end].to_string())
}
