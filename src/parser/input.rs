//! Shared low-level input handling for the XML and HTML parsers.
//!
//! [`ParserInput`] tracks the position (line, column, byte offset) in
//! already-decoded text and offers the primitives both parsers build on:
//! peeking, advancing, names, quoted literals, and comment / CDATA / PI
//! bodies. Errors are produced as engine [`Diagnostic`]s stamped with the
//! current position.

use crate::engine::{codes, Diagnostic};
use crate::error::{ErrorDomain, ErrorLevel};

/// Default maximum element nesting depth.
pub(crate) const DEFAULT_MAX_DEPTH: u32 = 256;

/// Maximum nesting of entity references inside entity values.
pub(crate) const MAX_ENTITY_NESTING: u32 = 16;

pub(crate) type PResult<T> = Result<T, Diagnostic>;

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Splits `"p:local"` into `(Some("p"), "local")`.
pub(crate) fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Position and primitives over one decoded input text.
pub(crate) struct ParserInput<'a> {
    text: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    depth: u32,
    max_depth: u32,
    domain: ErrorDomain,
}

impl<'a> ParserInput<'a> {
    pub fn new(text: &'a str, domain: ErrorDomain, max_depth: u32) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
            max_depth,
            domain,
        }
    }

    // -- Depth tracking --

    pub fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.fatal(
                codes::ERR_DEPTH_EXCEEDED,
                format!("Excessive depth in document: {} use XML_PARSE_HUGE option", self.max_depth),
            ));
        }
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    // -- Position queries --

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn looking_at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// ASCII case-insensitive lookahead.
    pub fn looking_at_ci(&self, s: &str) -> bool {
        self.rest()
            .as_bytes()
            .get(..s.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(s.as_bytes()))
    }

    // -- Advance operations --

    /// Advances over `count` bytes, which must end on a char boundary.
    pub fn advance(&mut self, count: usize) {
        let end = (self.pos + count).min(self.text.len());
        for c in self.text[self.pos..end].chars() {
            self.bump_position(c);
        }
        self.pos = end;
    }

    fn bump_position(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    /// Consumes one character, normalizing `\r\n` and `\r` to `\n`.
    pub fn next_char(&mut self) -> PResult<char> {
        let c = self
            .peek_char()
            .ok_or_else(|| self.fatal(codes::ERR_DOCUMENT_END, "Unexpected end of input"))?;
        self.pos += c.len_utf8();
        self.bump_position(c);
        if c == '\r' {
            if self.peek() == Some(b'\n') {
                self.pos += 1;
            }
            self.line += 1;
            self.column = 1;
            return Ok('\n');
        }
        if !is_xml_char(c) {
            return Err(self.fatal(
                codes::ERR_INVALID_CHAR,
                format!("Char 0x{:X} out of allowed range", c as u32),
            ));
        }
        Ok(c)
    }

    pub fn expect(&mut self, s: &str, code: i32, message: &str) -> PResult<()> {
        if self.looking_at(s) {
            self.advance(s.len());
            Ok(())
        } else {
            Err(self.fatal(code, message))
        }
    }

    pub fn skip_whitespace(&mut self) -> bool {
        let n = self
            .rest()
            .bytes()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .count();
        self.advance(n);
        n > 0
    }

    /// Consumes everything up to and including `delimiter`, returning the
    /// text before it with line endings normalized. Returns `None`, having
    /// consumed nothing, if the delimiter never appears.
    pub fn take_until(&mut self, delimiter: &str) -> Option<String> {
        let len = self.rest().find(delimiter)?;
        let body = self.rest()[..len].replace("\r\n", "\n").replace('\r', "\n");
        self.advance(len + delimiter.len());
        Some(body)
    }

    /// Consumes ASCII bytes while `pred` holds.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        let n = self.rest().bytes().take_while(|&b| b.is_ascii() && pred(b)).count();
        self.advance(n);
        &self.text[start..start + n]
    }

    // -- Names and literals --

    /// Parses an XML `Name`.
    pub fn parse_name(&mut self) -> PResult<String> {
        let rest = self.rest();
        match rest.chars().next() {
            Some(c) if is_name_start_char(c) => {}
            _ => return Err(self.fatal(codes::ERR_NAME_REQUIRED, "Name expected")),
        }
        let len = rest
            .char_indices()
            .find(|&(_, c)| !is_name_char(c))
            .map_or(rest.len(), |(i, _)| i);
        self.advance(len);
        Ok(rest[..len].to_string())
    }

    /// Parses a quoted literal without interpreting references.
    pub fn parse_quoted(&mut self) -> PResult<String> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.fatal(codes::ERR_LITERAL_NOT_FINISHED, "String not started expecting ' or \"")),
        };
        self.advance(1);
        let delimiter = if quote == b'"' { "\"" } else { "'" };
        self.take_until(delimiter)
            .ok_or_else(|| self.fatal(codes::ERR_LITERAL_NOT_FINISHED, "String not closed"))
    }

    /// Parses `name = "value"` with optional whitespace around `=`.
    pub fn parse_pseudo_attribute(&mut self) -> PResult<(String, String)> {
        let name = self.parse_name()?;
        self.skip_whitespace();
        self.expect("=", codes::ERR_ATTRIBUTE_WITHOUT_VALUE, "'=' expected")?;
        self.skip_whitespace();
        let value = self.parse_quoted()?;
        Ok((name, value))
    }

    // -- Markup bodies --

    /// Parses `<!-- ... -->`, returning the comment text.
    pub fn parse_comment(&mut self) -> PResult<String> {
        self.advance("<!--".len());
        let line = self.line;
        let body = self
            .take_until("-->")
            .ok_or_else(|| self.fatal(codes::ERR_COMMENT_NOT_FINISHED, format!("Comment not terminated, started line {line}")))?;
        if body.contains("--") || body.ends_with('-') {
            return Err(self.fatal(codes::ERR_HYPHEN_IN_COMMENT, "Double hyphen within comment"));
        }
        Ok(body)
    }

    /// Parses `<![CDATA[ ... ]]>`, returning the section content.
    pub fn parse_cdata(&mut self) -> PResult<String> {
        self.advance("<![CDATA[".len());
        self.take_until("]]>")
            .ok_or_else(|| self.fatal(codes::ERR_CDATA_NOT_FINISHED, "CData section not finished"))
    }

    /// Parses `<?target data?>`.
    pub fn parse_pi(&mut self) -> PResult<(String, Option<String>)> {
        self.advance("<?".len());
        let target = self.parse_name()?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.fatal(
                codes::ERR_RESERVED_XML_NAME,
                "XML declaration allowed only at the start of the document",
            ));
        }
        if self.looking_at("?>") {
            self.advance(2);
            return Ok((target, None));
        }
        if !self.skip_whitespace() {
            return Err(self.fatal(codes::ERR_PI_NOT_FINISHED, format!("ParsePI: PI {target} space expected")));
        }
        let data = self
            .take_until("?>")
            .ok_or_else(|| self.fatal(codes::ERR_PI_NOT_FINISHED, format!("ParsePI: PI {target} never end ...")))?;
        Ok((target, (!data.is_empty()).then_some(data)))
    }

    // -- Diagnostics --

    /// A fatal diagnostic at the current position.
    pub fn fatal(&self, code: i32, message: impl Into<String>) -> Diagnostic {
        self.diagnostic(code, ErrorLevel::Fatal, message)
    }

    /// A warning at the current position.
    pub fn warning(&self, code: i32, message: impl Into<String>) -> Diagnostic {
        self.diagnostic(code, ErrorLevel::Warning, message)
    }

    fn diagnostic(&self, code: i32, level: ErrorLevel, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(self.domain, code, level, message).at(self.line, self.column)
    }

    /// A fatal diagnostic in another domain (e.g. namespaces).
    pub fn fatal_in(&self, domain: ErrorDomain, code: i32, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(domain, code, ErrorLevel::Fatal, message).at(self.line, self.column)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(text: &str) -> ParserInput<'_> {
        ParserInput::new(text, ErrorDomain::Parser, DEFAULT_MAX_DEPTH)
    }

    #[test]
    fn test_line_column_tracking() {
        let mut inp = input("ab\ncd");
        inp.advance(4);
        assert_eq!((inp.line(), inp.column()), (2, 2));
        assert_eq!(inp.peek(), Some(b'd'));
    }

    #[test]
    fn test_next_char_cr_normalization() {
        let mut inp = input("\r\nx");
        assert_eq!(inp.next_char().unwrap(), '\n');
        assert_eq!(inp.next_char().unwrap(), 'x');
        assert!(inp.at_end());
    }

    #[test]
    fn test_next_char_rejects_control_chars() {
        let mut inp = input("\u{1}");
        let err = inp.next_char().unwrap_err();
        assert_eq!(err.code, codes::ERR_INVALID_CHAR);
    }

    #[test]
    fn test_parse_name_and_split() {
        let mut inp = input("svg:rect x");
        let name = inp.parse_name().unwrap();
        assert_eq!(name, "svg:rect");
        assert_eq!(split_name(&name), (Some("svg"), "rect"));
        assert_eq!(split_name("rect"), (None, "rect"));
        assert!(input("1abc").parse_name().is_err());
    }

    #[test]
    fn test_take_until_normalizes_newlines() {
        let mut inp = input("a\r\nb-->rest");
        assert_eq!(inp.take_until("-->").as_deref(), Some("a\nb"));
        assert_eq!(inp.rest(), "rest");
        assert_eq!(inp.take_until("zzz"), None);
        assert_eq!(inp.rest(), "rest");
    }

    #[test]
    fn test_parse_pseudo_attribute() {
        let mut inp = input("version = '1.0'?>");
        assert_eq!(
            inp.parse_pseudo_attribute().unwrap(),
            ("version".to_string(), "1.0".to_string())
        );
    }

    #[test]
    fn test_parse_comment_rejects_double_hyphen() {
        assert_eq!(input("<!-- ok -->").parse_comment().unwrap(), " ok ");
        let err = input("<!-- a -- b -->").parse_comment().unwrap_err();
        assert_eq!(err.code, codes::ERR_HYPHEN_IN_COMMENT);
        assert!(input("<!-- open").parse_comment().is_err());
    }

    #[test]
    fn test_parse_pi() {
        assert_eq!(
            input("<?php echo 1; ?>").parse_pi().unwrap(),
            ("php".to_string(), Some("echo 1; ".to_string()))
        );
        assert_eq!(input("<?empty?>").parse_pi().unwrap(), ("empty".to_string(), None));
        assert!(input("<?xml version='1.0'?>").parse_pi().is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut inp = ParserInput::new("", ErrorDomain::Parser, 2);
        assert!(inp.enter().is_ok());
        assert!(inp.enter().is_ok());
        let err = inp.enter().unwrap_err();
        assert_eq!(err.code, codes::ERR_DEPTH_EXCEEDED);
        assert_eq!(err.level, ErrorLevel::Fatal as i32);
    }

    #[test]
    fn test_looking_at_ci() {
        let inp = input("<!DocType html>");
        assert!(inp.looking_at_ci("<!doctype"));
        assert!(!inp.looking_at("<!doctype"));
    }
}
