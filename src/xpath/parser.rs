//! Recursive descent parser producing an [`Expr`].
//!
//! Precedence, loosest first: `or`, `and`, equality, relational, additive,
//! multiplicative, unary minus, union, path.

use crate::engine::codes;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::lexer::{tokenize, Lexeme, Token};
use super::types::XPathError;

/// Compiles an expression.
///
/// # Errors
///
/// Returns `XPathError` positioned at the offending token, or at the end of
/// the input when the expression is incomplete.
///
/// # Examples
///
/// ```
/// use xmlhandle::xpath::parse;
///
/// assert!(parse("//book[@lang='en']/title").is_ok());
/// assert_eq!(parse("//book[").unwrap_err().position, 7);
/// ```
pub fn parse(input: &str) -> Result<Expr, XPathError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        end: input.len(),
    };
    if parser.tokens.is_empty() {
        return Err(XPathError::new(codes::XPATH_EXPR_ERROR, 0));
    }
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error(codes::XPATH_EXPR_ERROR));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Lexeme>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|l| &l.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|l| l.token.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, code: i32) -> XPathError {
        let position = self.tokens.get(self.pos).map_or(self.end, |l| l.position);
        XPathError::new(code, position)
    }

    fn expect_closing(&mut self, token: &Token) -> Result<(), XPathError> {
        if self.eat(token) {
            Ok(())
        } else if self.peek().is_none() {
            Err(self.error(codes::XPATH_UNCLOSED))
        } else {
            Err(self.error(codes::XPATH_EXPR_ERROR))
        }
    }

    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, XPathError>,
    ) -> Result<Expr, XPathError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(&[(Token::Or, BinaryOp::Or)], Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(&[(Token::And, BinaryOp::And)], Self::equality_expr)
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[(Token::Equal, BinaryOp::Eq), (Token::NotEqual, BinaryOp::Neq)],
            Self::relational_expr,
        )
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[
                (Token::Less, BinaryOp::Lt),
                (Token::LessEqual, BinaryOp::Lte),
                (Token::Greater, BinaryOp::Gt),
                (Token::GreaterEqual, BinaryOp::Gte),
            ],
            Self::additive_expr,
        )
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::multiplicative_expr,
        )
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Div, BinaryOp::Div),
                (Token::Mod, BinaryOp::Mod),
            ],
            Self::unary_expr,
        )
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary_expr()?)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(
                Token::Variable(_) | Token::LeftParen | Token::Literal(_) | Token::Number(_) | Token::FunctionName(_),
            ) => self.filter_expr(),
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.starts_step() {
                    self.relative_path(Vec::new())?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path { absolute: true, steps })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let steps = self.relative_path(vec![descendant_or_self()])?;
                Ok(Expr::Path { absolute: true, steps })
            }
            Some(_) if self.starts_step() => Ok(Expr::Path {
                absolute: false,
                steps: self.relative_path(Vec::new())?,
            }),
            _ => Err(self.error(codes::XPATH_EXPR_ERROR)),
        }
    }

    fn filter_expr(&mut self) -> Result<Expr, XPathError> {
        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        let steps = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                self.relative_path(Vec::new())?
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                self.relative_path(vec![descendant_or_self()])?
            }
            _ => Vec::new(),
        };
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        match self.advance() {
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LeftParen) => {
                let inner = self.or_expr()?;
                self.expect_closing(&Token::RightParen)?;
                Ok(inner)
            }
            Some(Token::FunctionName(name)) => {
                self.expect_closing(&Token::LeftParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RightParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect_closing(&Token::RightParen)?;
                        break;
                    }
                }
                Ok(Expr::Call { name, args })
            }
            _ => {
                self.pos -= 1;
                Err(self.error(codes::XPATH_EXPR_ERROR))
            }
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::At | Token::Axis(_) | Token::NameTest(_) | Token::NodeType(_))
        )
    }

    fn relative_path(&mut self, mut steps: Vec<Step>) -> Result<Vec<Step>, XPathError> {
        steps.push(self.step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }
        let axis = match self.peek() {
            Some(Token::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(&Token::Axis(axis)) => {
                self.pos += 1;
                axis
            }
            _ => Axis::Child,
        };
        let test = self.node_test()?;
        Ok(Step {
            axis,
            test,
            predicates: self.predicates()?,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.advance() {
            Some(Token::NameTest(test)) => Ok(test),
            Some(Token::NodeType(kind)) => {
                self.expect_closing(&Token::LeftParen)?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek() {
                        Some(Token::Literal(target)) => {
                            let target = target.clone();
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect_closing(&Token::RightParen)?;
                Ok(test)
            }
            _ => {
                self.pos -= 1;
                Err(self.error(codes::XPATH_EXPR_ERROR))
            }
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            if self.peek().is_none() {
                return Err(self.error(codes::XPATH_EXPR_ERROR));
            }
            if self.peek() == Some(&Token::RightBracket) {
                return Err(self.error(codes::XPATH_INVALID_PREDICATE));
            }
            predicates.push(self.or_expr()?);
            self.expect_closing(&Token::RightBracket)?;
        }
        Ok(predicates)
    }
}

fn descendant_or_self() -> Step {
    Step::new(Axis::DescendantOrSelf, NodeTest::Node)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(local: &str) -> NodeTest {
        NodeTest::Name {
            prefix: None,
            local: local.to_string(),
        }
    }

    #[test]
    fn test_abbreviated_path() {
        let expr = parse("//a/@b").unwrap();
        assert_eq!(
            expr,
            Expr::Path {
                absolute: true,
                steps: vec![
                    Step::new(Axis::DescendantOrSelf, NodeTest::Node),
                    Step::new(Axis::Child, name("a")),
                    Step::new(Axis::Attribute, name("b")),
                ]
            }
        );
    }

    #[test]
    fn test_bare_root_and_dots() {
        assert_eq!(parse("/").unwrap(), Expr::Path { absolute: true, steps: vec![] });
        assert_eq!(
            parse("../.").unwrap(),
            Expr::Path {
                absolute: false,
                steps: vec![
                    Step::new(Axis::Parent, NodeTest::Node),
                    Step::new(Axis::SelfAxis, NodeTest::Node)
                ]
            }
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3 = 7 or false()").unwrap();
        let Expr::Binary { op: BinaryOp::Or, left, .. } = expr else {
            panic!("expected or at the top");
        };
        let Expr::Binary { op: BinaryOp::Eq, left, .. } = *left else {
            panic!("expected = under or");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_filter_with_path() {
        let expr = parse("(//a)[1]//b").unwrap();
        let Expr::Filter { predicates, steps, .. } = expr else {
            panic!("expected a filter expression");
        };
        assert_eq!(predicates, vec![Expr::Number(1.0)]);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_processing_instruction_target() {
        let expr = parse("processing-instruction('php')").unwrap();
        assert_eq!(
            expr,
            Expr::Path {
                absolute: false,
                steps: vec![Step::new(
                    Axis::Child,
                    NodeTest::ProcessingInstruction(Some("php".to_string()))
                )]
            }
        );
    }

    #[test]
    fn test_function_arguments() {
        let expr = parse("concat('a', 'b', 'c')").unwrap();
        let Expr::Call { name, args } = expr else {
            panic!("expected a call");
        };
        assert_eq!(name, "concat");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_error_positions() {
        let err = parse("//[").unwrap_err();
        assert_eq!((err.code, err.position), (codes::XPATH_EXPR_ERROR, 2));

        let err = parse("count(a").unwrap_err();
        assert_eq!((err.code, err.position), (codes::XPATH_UNCLOSED, 7));

        let err = parse("a[]").unwrap_err();
        assert_eq!(err.code, codes::XPATH_INVALID_PREDICATE);

        assert_eq!(parse("a b").unwrap_err().position, 2);
        assert_eq!(parse("").unwrap_err().code, codes::XPATH_EXPR_ERROR);
        assert_eq!(parse("1 +").unwrap_err().position, 3);
    }
}
