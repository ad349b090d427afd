//! `XPath` 1.0 tokenizer.
//!
//! Applies the disambiguation rules of section 3.7 while scanning: after a
//! token that can end an operand, `*` is multiplication and a name is an
//! operator keyword; a name followed by `::` is an axis and one followed by
//! `(` is a function or node type.

use crate::engine::codes;
use crate::parser::input::{is_name_char, is_name_start_char};

use super::ast::{Axis, NodeTest};
use super::types::XPathError;

const NODE_TYPES: &[&str] = &["comment", "text", "processing-instruction", "node"];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    DotDot,
    At,
    Comma,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    /// Multiplication; a `*` name test is `NameTest(NodeTest::Any)`.
    Star,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Mod,
    Div,
    Number(f64),
    Literal(String),
    Variable(String),
    /// A name test: `name`, `p:name`, `*`, or `p:*`.
    NameTest(NodeTest),
    /// `node`, `text`, `comment`, or `processing-instruction` before `(`.
    NodeType(String),
    FunctionName(String),
    /// An axis name; the `::` has been consumed.
    Axis(Axis),
}

impl Token {
    /// Whether this token can end an operand.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Self::RightParen
                | Self::RightBracket
                | Self::Dot
                | Self::DotDot
                | Self::Number(_)
                | Self::Literal(_)
                | Self::Variable(_)
                | Self::NameTest(_)
        )
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub position: usize,
}

/// Splits an expression into tokens.
///
/// # Errors
///
/// Returns `XPathError` for unterminated literals, stray characters, and
/// unknown axis names.
pub fn tokenize(input: &str) -> Result<Vec<Lexeme>, XPathError> {
    Lexer { input, pos: 0, tokens: Vec::new() }.run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Lexeme>,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Lexeme>, XPathError> {
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(c) = self.peek() else {
                return Ok(self.tokens);
            };
            let token = match c {
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                '[' => self.single(Token::LeftBracket),
                ']' => self.single(Token::RightBracket),
                '@' => self.single(Token::At),
                ',' => self.single(Token::Comma),
                '|' => self.single(Token::Pipe),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '=' => self.single(Token::Equal),
                '/' => self.one_or_two('/', Token::Slash, Token::DoubleSlash),
                '<' => self.one_or_two('=', Token::Less, Token::LessEqual),
                '>' => self.one_or_two('=', Token::Greater, Token::GreaterEqual),
                '!' => {
                    if self.rest().starts_with("!=") {
                        self.pos += 2;
                        Token::NotEqual
                    } else {
                        return Err(XPathError::new(codes::XPATH_EXPR_ERROR, start));
                    }
                }
                '*' => {
                    self.pos += 1;
                    if self.after_operand() {
                        Token::Star
                    } else {
                        Token::NameTest(NodeTest::Any)
                    }
                }
                '.' => {
                    if self.rest().starts_with("..") {
                        self.pos += 2;
                        Token::DotDot
                    } else if self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) {
                        self.number()
                    } else {
                        self.pos += 1;
                        Token::Dot
                    }
                }
                '"' | '\'' => self.literal(c)?,
                '$' => {
                    self.pos += 1;
                    let Some(name) = self.qname() else {
                        return Err(XPathError::new(codes::XPATH_EXPR_ERROR, self.pos));
                    };
                    Token::Variable(name)
                }
                d if d.is_ascii_digit() => self.number(),
                n if is_ncname_start(n) => self.name(start)?,
                _ => return Err(XPathError::new(codes::XPATH_EXPR_ERROR, start)),
            };
            self.tokens.push(Lexeme { token, position: start });
        }
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start_matches([' ', '\t', '\n', '\r']);
        self.pos = self.input.len() - trimmed.len();
    }

    fn after_operand(&self) -> bool {
        self.tokens.last().is_some_and(|l| l.token.ends_operand())
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn one_or_two(&mut self, second: char, one: Token, two: Token) -> Token {
        self.pos += 1;
        if self.peek() == Some(second) {
            self.pos += 1;
            two
        } else {
            one
        }
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        let int = self.rest().bytes().take_while(u8::is_ascii_digit).count();
        self.pos += int;
        if self.peek() == Some('.') {
            self.pos += 1;
            self.pos += self.rest().bytes().take_while(u8::is_ascii_digit).count();
        }
        Token::Number(self.input[start..self.pos].parse().unwrap_or(f64::NAN))
    }

    fn literal(&mut self, quote: char) -> Result<Token, XPathError> {
        let start = self.pos;
        let body = &self.input[start + 1..];
        let Some(end) = body.find(quote) else {
            return Err(XPathError::new(codes::XPATH_UNFINISHED_LITERAL, self.input.len()));
        };
        self.pos = start + 1 + end + 1;
        Ok(Token::Literal(body[..end].to_string()))
    }

    fn ncname(&mut self) -> Option<&str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_ncname_start(c) => {}
            _ => return None,
        }
        let len = chars
            .find(|&(_, c)| !is_ncname_char(c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        Some(&self.input[self.pos - len..self.pos])
    }

    fn qname(&mut self) -> Option<String> {
        let first = self.ncname()?.to_string();
        if self.peek() == Some(':') && !self.rest().starts_with("::") {
            let save = self.pos;
            self.pos += 1;
            if let Some(local) = self.ncname() {
                return Some(format!("{first}:{local}"));
            }
            self.pos = save;
        }
        Some(first)
    }

    fn name(&mut self, start: usize) -> Result<Token, XPathError> {
        let Some(first) = self.ncname().map(str::to_string) else {
            return Err(XPathError::new(codes::XPATH_EXPR_ERROR, start));
        };

        if self.after_operand() {
            return match first.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "mod" => Ok(Token::Mod),
                "div" => Ok(Token::Div),
                _ => Err(XPathError::new(codes::XPATH_EXPR_ERROR, start)),
            };
        }

        // p:local or p:*
        let mut prefix = None;
        let mut local = first;
        if self.peek() == Some(':') && !self.rest().starts_with("::") {
            let save = self.pos;
            self.pos += 1;
            if self.peek() == Some('*') {
                self.pos += 1;
                return Ok(Token::NameTest(NodeTest::AnyIn(local)));
            }
            match self.ncname() {
                Some(l) => {
                    prefix = Some(std::mem::replace(&mut local, l.to_string()));
                }
                None => self.pos = save,
            }
        }

        let save = self.pos;
        self.skip_whitespace();
        if prefix.is_none() && self.rest().starts_with("::") {
            self.pos += 2;
            return Axis::from_name(&local)
                .map(Token::Axis)
                .ok_or_else(|| XPathError::new(codes::XPATH_EXPR_ERROR, start).detail(format!("unknown axis {local}")));
        }
        if self.peek() == Some('(') {
            self.pos = save;
            let qname = match prefix {
                Some(p) => format!("{p}:{local}"),
                None => local,
            };
            return Ok(if NODE_TYPES.contains(&qname.as_str()) {
                Token::NodeType(qname)
            } else {
                Token::FunctionName(qname)
            });
        }
        self.pos = save;
        Ok(Token::NameTest(NodeTest::Name { prefix, local }))
    }
}

fn is_ncname_start(c: char) -> bool {
    c != ':' && is_name_start_char(c)
}

fn is_ncname_char(c: char) -> bool {
    c != ':' && is_name_char(c)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|l| l.token).collect()
    }

    fn name(local: &str) -> Token {
        Token::NameTest(NodeTest::Name {
            prefix: None,
            local: local.to_string(),
        })
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(
            tokens("* * 2"),
            vec![Token::NameTest(NodeTest::Any), Token::Star, Token::Number(2.0)]
        );
        assert_eq!(tokens("@*"), vec![Token::At, Token::NameTest(NodeTest::Any)]);
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(
            tokens("div div div"),
            vec![name("div"), Token::Div, name("div")]
        );
        assert_eq!(tokens("a and b"), vec![name("a"), Token::And, name("b")]);
    }

    #[test]
    fn test_axis_function_and_node_type() {
        assert_eq!(
            tokens("child :: text ()"),
            vec![
                Token::Axis(Axis::Child),
                Token::NodeType("text".to_string()),
                Token::LeftParen,
                Token::RightParen
            ]
        );
        assert_eq!(
            tokens("count(x:*)"),
            vec![
                Token::FunctionName("count".to_string()),
                Token::LeftParen,
                Token::NameTest(NodeTest::AnyIn("x".to_string())),
                Token::RightParen
            ]
        );
    }

    #[test]
    fn test_prefixed_name_and_variable() {
        assert_eq!(
            tokens("$v/svg:rect"),
            vec![
                Token::Variable("v".to_string()),
                Token::Slash,
                Token::NameTest(NodeTest::Name {
                    prefix: Some("svg".to_string()),
                    local: "rect".to_string()
                })
            ]
        );
    }

    #[test]
    fn test_numbers_and_dots() {
        assert_eq!(
            tokens(".5 + ../."),
            vec![Token::Number(0.5), Token::Plus, Token::DotDot, Token::Slash, Token::Dot]
        );
    }

    #[test]
    fn test_positions() {
        let lexemes = tokenize("a != 'b'").unwrap();
        let positions: Vec<usize> = lexemes.iter().map(|l| l.position).collect();
        assert_eq!(positions, vec![0, 2, 5]);
    }

    #[test]
    fn test_errors() {
        let err = tokenize("'open").unwrap_err();
        assert_eq!(err.code, codes::XPATH_UNFINISHED_LITERAL);
        assert_eq!(err.position, 5);

        assert_eq!(tokenize("a ! b").unwrap_err().position, 2);
        assert_eq!(tokenize("sideways::a").unwrap_err().code, codes::XPATH_EXPR_ERROR);
        assert_eq!(tokenize("a # b").unwrap_err().position, 2);
    }
}
