//! Error-tolerant HTML parser.
//!
//! An HTML 4.01-style parser in the spirit of libxml2's `HTMLparser.c`. It
//! accepts common malformed markup instead of failing:
//!
//! - Missing closing tags (auto-closed by content model rules)
//! - Unquoted and boolean attributes (`<input type=checkbox checked>`)
//! - Void elements that never need closing (`<br>`, `<img>`)
//! - Case-insensitive tag names, normalized to lowercase
//! - Bare `&` characters and named entities
//! - Missing `html`, `head`, and `body` elements, which are implied
//!
//! Stray end tags and other repairs are recorded as warnings. The only fatal
//! conditions are an empty document and exceeding the depth limit.
//!
//! # Examples
//!
//! ```
//! use xmlhandle::Document;
//!
//! let doc = Document::parse_html("<p>Hello <b>world</b>").unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(root.name().as_deref(), Some("html"));
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::engine::{codes, Diagnostic};
use crate::error::ErrorDomain;
use crate::parser::input::{PResult, ParserInput};
use crate::parser::ParseOptions;
use crate::tree::{NodeId, NodeKind, Tree};

const DEFAULT_DOCTYPE_PUBLIC: &str = "-//W3C//DTD HTML 4.0 Transitional//EN";
const DEFAULT_DOCTYPE_SYSTEM: &str = "http://www.w3.org/TR/REC-html40/loose.dtd";

/// The named character references the parser resolves.
///
/// Built once on first use; [`crate::engine::init`] forces it.
pub fn entity_table() -> &'static HashMap<&'static str, char> {
    static TABLE: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            ("quot", '"'), ("amp", '&'), ("apos", '\''), ("lt", '<'), ("gt", '>'),
            ("nbsp", '\u{A0}'), ("iexcl", '\u{A1}'), ("cent", '\u{A2}'), ("pound", '\u{A3}'),
            ("curren", '\u{A4}'), ("yen", '\u{A5}'), ("brvbar", '\u{A6}'), ("sect", '\u{A7}'),
            ("uml", '\u{A8}'), ("copy", '\u{A9}'), ("ordf", '\u{AA}'), ("laquo", '\u{AB}'),
            ("not", '\u{AC}'), ("shy", '\u{AD}'), ("reg", '\u{AE}'), ("macr", '\u{AF}'),
            ("deg", '\u{B0}'), ("plusmn", '\u{B1}'), ("sup2", '\u{B2}'), ("sup3", '\u{B3}'),
            ("acute", '\u{B4}'), ("micro", '\u{B5}'), ("para", '\u{B6}'), ("middot", '\u{B7}'),
            ("cedil", '\u{B8}'), ("sup1", '\u{B9}'), ("ordm", '\u{BA}'), ("raquo", '\u{BB}'),
            ("frac14", '\u{BC}'), ("frac12", '\u{BD}'), ("frac34", '\u{BE}'), ("iquest", '\u{BF}'),
            ("Agrave", '\u{C0}'), ("Aacute", '\u{C1}'), ("Acirc", '\u{C2}'), ("Atilde", '\u{C3}'),
            ("Auml", '\u{C4}'), ("Aring", '\u{C5}'), ("AElig", '\u{C6}'), ("Ccedil", '\u{C7}'),
            ("Egrave", '\u{C8}'), ("Eacute", '\u{C9}'), ("Ecirc", '\u{CA}'), ("Euml", '\u{CB}'),
            ("Ntilde", '\u{D1}'), ("Ouml", '\u{D6}'), ("times", '\u{D7}'), ("Oslash", '\u{D8}'),
            ("Uuml", '\u{DC}'), ("szlig", '\u{DF}'), ("agrave", '\u{E0}'), ("aacute", '\u{E1}'),
            ("acirc", '\u{E2}'), ("atilde", '\u{E3}'), ("auml", '\u{E4}'), ("aring", '\u{E5}'),
            ("aelig", '\u{E6}'), ("ccedil", '\u{E7}'), ("egrave", '\u{E8}'), ("eacute", '\u{E9}'),
            ("ecirc", '\u{EA}'), ("euml", '\u{EB}'), ("igrave", '\u{EC}'), ("iacute", '\u{ED}'),
            ("icirc", '\u{EE}'), ("iuml", '\u{EF}'), ("ntilde", '\u{F1}'), ("ograve", '\u{F2}'),
            ("oacute", '\u{F3}'), ("ocirc", '\u{F4}'), ("otilde", '\u{F5}'), ("ouml", '\u{F6}'),
            ("divide", '\u{F7}'), ("oslash", '\u{F8}'), ("ugrave", '\u{F9}'), ("uacute", '\u{FA}'),
            ("ucirc", '\u{FB}'), ("uuml", '\u{FC}'), ("yuml", '\u{FF}'), ("euro", '\u{20AC}'),
            ("ndash", '\u{2013}'), ("mdash", '\u{2014}'), ("lsquo", '\u{2018}'), ("rsquo", '\u{2019}'),
            ("ldquo", '\u{201C}'), ("rdquo", '\u{201D}'), ("bull", '\u{2022}'), ("hellip", '\u{2026}'),
            ("prime", '\u{2032}'), ("trade", '\u{2122}'), ("larr", '\u{2190}'), ("rarr", '\u{2192}'),
            ("uarr", '\u{2191}'), ("darr", '\u{2193}'), ("harr", '\u{2194}'), ("minus", '\u{2212}'),
            ("le", '\u{2264}'), ("ge", '\u{2265}'), ("ne", '\u{2260}'), ("infin", '\u{221E}'),
            ("alpha", '\u{3B1}'), ("beta", '\u{3B2}'), ("gamma", '\u{3B3}'), ("delta", '\u{3B4}'),
            ("pi", '\u{3C0}'), ("sigma", '\u{3C3}'), ("omega", '\u{3C9}'), ("thinsp", '\u{2009}'),
            ("ensp", '\u{2002}'), ("emsp", '\u{2003}'), ("zwnj", '\u{200C}'), ("zwj", '\u{200D}'),
        ]
        .into_iter()
        .collect()
    })
}

/// Returns true if the given tag name (lowercase) is a void element that
/// must not have content.
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "param" | "source" | "track" | "wbr" | "basefont" | "frame" | "isindex"
    )
}

/// Returns true if `tag` is an element whose content is not parsed as HTML.
pub(crate) fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Attributes written in minimized form (`<option selected>`).
pub(crate) fn is_boolean_attribute(name: &str) -> bool {
    matches!(
        name,
        "checked" | "compact" | "declare" | "defer" | "disabled" | "ismap" | "multiple"
            | "nohref" | "noresize" | "noshade" | "nowrap" | "readonly" | "selected"
    )
}

/// Returns true if opening `tag` implicitly closes an open `open_tag`.
fn auto_closes(open_tag: &str, tag: &str) -> bool {
    match open_tag {
        "p" => matches!(
            tag,
            "p" | "div" | "ul" | "ol" | "dl" | "pre" | "table" | "blockquote" | "address"
                | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "hr" | "form" | "fieldset"
                | "section" | "article" | "aside" | "header" | "footer" | "nav"
        ),
        "li" => tag == "li",
        "dt" | "dd" => matches!(tag, "dt" | "dd"),
        "tr" => tag == "tr",
        "td" | "th" => matches!(tag, "td" | "th" | "tr"),
        "thead" | "tbody" => matches!(tag, "tbody" | "tfoot"),
        "option" => matches!(tag, "option" | "optgroup"),
        "head" => tag == "body",
        _ => false,
    }
}

fn is_head_content_element(tag: &str) -> bool {
    matches!(tag, "title" | "meta" | "link" | "base" | "style" | "script" | "noscript")
}

/// Parses decoded HTML text into a tree.
///
/// # Errors
///
/// Returns a fatal diagnostic for an empty document or when nesting exceeds
/// `options.max_depth`.
pub(crate) fn parse(text: &str, options: &ParseOptions) -> PResult<(Tree, Vec<Diagnostic>)> {
    let mut parser = HtmlParser {
        input: ParserInput::new(text, ErrorDomain::Html, options.max_depth),
        tree: Tree::new_document(),
        options,
        open: Vec::new(),
        warnings: Vec::new(),
    };
    parser.tree.html = true;
    parser.run()?;
    Ok((parser.tree, parser.warnings))
}

struct HtmlParser<'a> {
    input: ParserInput<'a>,
    tree: Tree,
    options: &'a ParseOptions,
    /// Open elements with their lowercase tag names.
    open: Vec<(NodeId, String)>,
    warnings: Vec<Diagnostic>,
}

impl HtmlParser<'_> {
    fn run(&mut self) -> PResult<()> {
        self.input.skip_whitespace();
        if self.input.at_end() {
            return Err(self.input.fatal(codes::ERR_DOCUMENT_EMPTY, "Document is empty"));
        }

        let mut has_doctype = false;
        if self.input.looking_at_ci("<!doctype") {
            self.parse_doctype();
            has_doctype = true;
        }

        while !self.input.at_end() {
            if self.input.looking_at("<!--") {
                self.parse_comment();
            } else if self.input.looking_at_ci("<!doctype") {
                self.warn("misplaced DOCTYPE declaration");
                self.skip_to_gt();
            } else if self.input.looking_at("</") {
                self.parse_end_tag();
            } else if self.input.peek() == Some(b'<')
                && self.input.peek_at(1).is_some_and(|b| b.is_ascii_alphabetic())
            {
                self.parse_start_tag()?;
            } else if self.input.looking_at("<?") {
                self.parse_processing_instruction();
            } else if self.input.looking_at("<!") {
                self.warn("malformed markup declaration");
                self.skip_to_gt();
            } else {
                self.parse_text();
            }
        }

        if !self.open.is_empty() {
            let last = self.open.last().map(|(_, tag)| tag.clone()).unwrap_or_default();
            if !matches!(last.as_str(), "html" | "body") {
                self.warn(&format!("Premature end of data in tag {last}"));
            }
            self.open.clear();
        }

        if !has_doctype {
            let doctype = self.tree.create_node(NodeKind::DocumentType {
                name: "html".to_string(),
                system_id: Some(DEFAULT_DOCTYPE_SYSTEM.to_string()),
                public_id: Some(DEFAULT_DOCTYPE_PUBLIC.to_string()),
            });
            let root = self.tree.root();
            match self.tree.first_child(root) {
                Some(first) => self.tree.insert_before(first, doctype),
                None => self.tree.append_child(root, doctype),
            }
        }
        Ok(())
    }

    fn warn(&mut self, message: &str) {
        let diag = self.input.warning(codes::HTML_STRUCTURE_ERROR, message);
        self.warnings.push(diag);
    }

    fn current_parent(&self) -> NodeId {
        self.open.last().map_or_else(|| self.tree.root(), |&(id, _)| id)
    }

    fn child_named(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.tree.children(parent).find(|&id| {
            matches!(&self.tree.node(id).kind, NodeKind::Element { name } if name == tag)
        })
    }

    // --- Implied structure ---

    fn ensure_html(&mut self) -> NodeId {
        let root = self.tree.root();
        if let Some(html) = self.child_named(root, "html") {
            return html;
        }
        let html = self.new_element("html");
        self.tree.append_child(root, html);
        self.open.insert(0, (html, "html".to_string()));
        html
    }

    fn ensure_head(&mut self) -> NodeId {
        let html = self.ensure_html();
        if let Some(head) = self.child_named(html, "head") {
            return head;
        }
        let head = self.new_element("head");
        match self.child_named(html, "body") {
            Some(body) => self.tree.insert_before(body, head),
            None => self.tree.append_child(html, head),
        }
        head
    }

    fn ensure_body(&mut self) -> NodeId {
        let html = self.ensure_html();
        if let Some(body) = self.child_named(html, "body") {
            return body;
        }
        let body = self.new_element("body");
        self.tree.append_child(html, body);
        self.close_head();
        self.open.push((body, "body".to_string()));
        body
    }

    fn new_element(&mut self, tag: &str) -> NodeId {
        let id = self.tree.create_node(NodeKind::Element { name: tag.to_string() });
        self.tree.node_mut(id).line = self.input.line();
        id
    }

    /// Pops `head` and anything opened inside it.
    fn close_head(&mut self) {
        if let Some(index) = self.open.iter().position(|(_, t)| t == "head") {
            self.open.truncate(index);
        }
    }

    fn is_open(&self, tag: &str) -> bool {
        self.open.iter().any(|(_, t)| t == tag)
    }

    // --- Tags ---

    fn parse_start_tag(&mut self) -> PResult<()> {
        let line = self.input.line();
        self.input.advance(1);
        let tag = self
            .input
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
            .to_ascii_lowercase();
        let attributes = self.parse_attributes();
        self.input.skip_whitespace();
        let self_closed = self.input.looking_at("/>");
        if self_closed {
            self.input.advance(2);
        } else if self.input.peek() == Some(b'>') {
            self.input.advance(1);
        } else {
            self.warn(&format!("Couldn't find end of Start Tag {tag}"));
            self.skip_to_gt();
        }

        // Structural elements merge into the implied ones.
        let structural = match tag.as_str() {
            "html" => Some(self.ensure_html()),
            "head" => {
                let head = self.ensure_head();
                if !self.is_open("head") && !self.is_open("body") {
                    self.open.push((head, "head".to_string()));
                }
                Some(head)
            }
            "body" => {
                if !self.is_open("body") {
                    self.close_head();
                }
                Some(self.ensure_body())
            }
            _ => None,
        };
        if let Some(element) = structural {
            self.merge_attributes(element, attributes);
            return Ok(());
        }

        while self.open.last().is_some_and(|(_, open)| auto_closes(open, &tag)) {
            self.open.pop();
        }

        if is_head_content_element(&tag) && !self.is_open("body") {
            let head = self.ensure_head();
            if !self.is_open("head") {
                self.open.push((head, "head".to_string()));
            }
        } else {
            self.close_head();
            self.ensure_body();
        }

        let parent = self.current_parent();
        let element = self.new_element(&tag);
        self.tree.node_mut(element).line = line;
        self.merge_attributes(element, attributes);
        self.tree.append_child(parent, element);

        if is_void_element(&tag) || self_closed {
            return Ok(());
        }
        if self.open.len() >= self.options.max_depth as usize {
            return Err(self.input.fatal(
                codes::ERR_DEPTH_EXCEEDED,
                format!("Excessive depth in document: {}", self.options.max_depth),
            ));
        }
        if is_raw_text_element(&tag) {
            self.parse_raw_text(element, &tag);
            return Ok(());
        }
        self.open.push((element, tag));
        Ok(())
    }

    fn merge_attributes(&mut self, element: NodeId, attributes: Vec<(String, String)>) {
        for (name, value) in attributes {
            if self.tree.attribute(element, &name, None).is_some() {
                self.warn(&format!("Attribute {name} redefined"));
                continue;
            }
            self.tree.set_attribute(element, &name, &value, None);
        }
    }

    fn parse_end_tag(&mut self) {
        self.input.advance(2);
        let tag = self
            .input
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
            .to_ascii_lowercase();
        self.skip_to_gt();

        if matches!(tag.as_str(), "html" | "body" | "head") {
            if tag == "head" {
                self.close_head();
            }
            return;
        }
        match self.open.iter().rposition(|(_, open)| *open == tag) {
            Some(index) => {
                for (_, closed) in &self.open[index + 1..] {
                    let message = format!("Opening and ending tag mismatch: {tag} and {closed}");
                    self.warnings.push(self.input.warning(codes::HTML_STRUCTURE_ERROR, message));
                }
                self.open.truncate(index);
            }
            None => self.warn(&format!("Unexpected end tag : {tag}")),
        }
    }

    fn parse_attributes(&mut self) -> Vec<(String, String)> {
        let mut attributes = Vec::new();
        loop {
            self.input.skip_whitespace();
            if self.input.at_end() || matches!(self.input.peek(), Some(b'>' | b'/')) {
                if self.input.peek() == Some(b'/') && !self.input.looking_at("/>") {
                    self.input.advance(1);
                    continue;
                }
                return attributes;
            }
            let name_len = self
                .input
                .rest()
                .find(|c: char| c.is_ascii_whitespace() || matches!(c, '=' | '>' | '/' | '<' | '"' | '\''))
                .unwrap_or(self.input.rest().len());
            if name_len == 0 {
                self.input.advance(1);
                continue;
            }
            let name = self.input.rest()[..name_len].to_ascii_lowercase();
            self.input.advance(name_len);
            self.input.skip_whitespace();
            let value = if self.input.peek() == Some(b'=') {
                self.input.advance(1);
                self.input.skip_whitespace();
                self.parse_attribute_value()
            } else {
                name.clone()
            };
            attributes.push((name, value));
        }
    }

    fn parse_attribute_value(&mut self) -> String {
        let mut value = String::new();
        match self.input.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.input.advance(1);
                while let Some(b) = self.input.peek() {
                    if b == quote {
                        self.input.advance(1);
                        break;
                    }
                    if b == b'&' {
                        value.push_str(&self.parse_reference());
                    } else {
                        value.push(self.next_char());
                    }
                }
            }
            _ => {
                while let Some(b) = self.input.peek() {
                    if b.is_ascii_whitespace() || matches!(b, b'>' | b'<' | b'"' | b'\'' | b'`') {
                        break;
                    }
                    if b == b'&' {
                        value.push_str(&self.parse_reference());
                    } else {
                        value.push(self.next_char());
                    }
                }
            }
        }
        value
    }

    // --- Character data ---

    fn parse_text(&mut self) {
        let line = self.input.line();
        let mut text = String::new();
        while let Some(b) = self.input.peek() {
            if b == b'<' && self.input.peek_at(1).is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, b'/' | b'!' | b'?')) {
                break;
            }
            if b == b'&' {
                text.push_str(&self.parse_reference());
            } else {
                text.push(self.next_char());
            }
        }
        let blank = text.chars().all(|c| c.is_ascii_whitespace());
        if text.is_empty() || (blank && self.options.no_blanks) {
            return;
        }
        // Text directly below the document, html, or head implies a body.
        if matches!(self.open.last().map(|(_, t)| t.as_str()), None | Some("html" | "head")) {
            if blank {
                return;
            }
            self.close_head();
            self.ensure_body();
        }
        let parent = self.current_parent();
        let id = self.tree.create_node(NodeKind::Text { content: text });
        self.tree.node_mut(id).line = line;
        self.tree.append_child(parent, id);
    }

    fn parse_raw_text(&mut self, element: NodeId, tag: &str) {
        let end = format!("</{tag}");
        let mut content = String::new();
        while !self.input.at_end() && !self.input.looking_at_ci(&end) {
            content.push(self.next_char());
        }
        if !content.is_empty() {
            let id = self.tree.create_node(NodeKind::Text { content });
            self.tree.append_child(element, id);
        }
        if !self.input.at_end() {
            self.skip_to_gt();
        }
    }

    fn parse_comment(&mut self) {
        let line = self.input.line();
        self.input.advance(4);
        let content = match self.input.take_until("-->") {
            Some(content) => content,
            None => {
                self.warn("Comment not terminated");
                let rest = self.input.rest().to_string();
                self.input.advance(rest.len());
                rest
            }
        };
        let id = self.tree.create_node(NodeKind::Comment { content });
        self.tree.node_mut(id).line = line;
        let parent = self.current_parent();
        self.tree.append_child(parent, id);
    }

    fn parse_processing_instruction(&mut self) {
        self.input.advance(2);
        let body = self.input.take_until(">").unwrap_or_default();
        let body = body.strip_suffix('?').unwrap_or(&body);
        let (target, data) = match body.split_once(|c: char| c.is_ascii_whitespace()) {
            Some((target, data)) => (target.to_string(), Some(data.trim_start().to_string())),
            None => (body.to_string(), None),
        };
        let id = self.tree.create_node(NodeKind::ProcessingInstruction { target, data });
        let parent = self.current_parent();
        self.tree.append_child(parent, id);
    }

    fn parse_doctype(&mut self) {
        self.input.advance("<!doctype".len());
        self.input.skip_whitespace();
        let name = self
            .input
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
            .to_string();
        self.input.skip_whitespace();
        let (mut public_id, mut system_id) = (None, None);
        if self.input.looking_at_ci("public") {
            self.input.advance(6);
            self.input.skip_whitespace();
            public_id = self.input.parse_quoted().ok();
            self.input.skip_whitespace();
            system_id = self.input.parse_quoted().ok();
        } else if self.input.looking_at_ci("system") {
            self.input.advance(6);
            self.input.skip_whitespace();
            system_id = self.input.parse_quoted().ok();
        }
        self.skip_to_gt();
        let doctype = self.tree.create_node(NodeKind::DocumentType {
            name: if name.is_empty() { "html".to_string() } else { name },
            system_id,
            public_id,
        });
        let root = self.tree.root();
        self.tree.append_child(root, doctype);
    }

    /// Resolves `&...;`, or returns a bare `&` if it is not a reference.
    fn parse_reference(&mut self) -> String {
        let rest = self.input.rest();
        let candidate = rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
            .map_or(&rest[1..], |end| &rest[1..=end]);
        let terminated = rest[1 + candidate.len()..].starts_with(';');

        let resolved = if let Some(digits) = candidate.strip_prefix('#') {
            let value = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse().ok(),
            };
            value.and_then(char::from_u32)
        } else {
            entity_table().get(candidate).copied()
        };

        match resolved {
            Some(c) if terminated => {
                self.input.advance(candidate.len() + 2);
                c.to_string()
            }
            Some(c) => {
                self.warn(&format!("htmlParseEntityRef: expecting ';' after &{candidate}"));
                self.input.advance(candidate.len() + 1);
                c.to_string()
            }
            None => {
                if terminated && !candidate.is_empty() {
                    self.warn(&format!("htmlParseEntityRef: unknown entity &{candidate};"));
                }
                self.input.advance(1);
                "&".to_string()
            }
        }
    }

    /// Reads one character, normalizing line endings and never failing.
    fn next_char(&mut self) -> char {
        let Some(c) = self.input.peek_char() else {
            return '\0';
        };
        self.input.advance(c.len_utf8());
        if c == '\r' {
            if self.input.peek() == Some(b'\n') {
                self.input.advance(1);
            }
            return '\n';
        }
        c
    }

    fn skip_to_gt(&mut self) {
        if self.input.take_until(">").is_none() {
            let len = self.input.rest().len();
            self.input.advance(len);
        }
    }
}
