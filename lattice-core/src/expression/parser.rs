// Condition Expression Parser
// Parses token streams into a small comparison/AND AST

use crate::expression::lexer::{LexError, Lexer, Token};

use std::fmt;

/// AST for gating expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Comparison between two operands
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },

    /// Bare operand, truthy when it resolves to a non-empty string
    Truthy(Operand),

    /// Logical AND; the right side is only evaluated when the left is true
    And(Box<Expr>, Box<Expr>),
}

/// An operand: a variable reference or a literal string
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Var(String),
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "!="),
        }
    }
}

/// Parser error
#[derive(Debug, Clone, PartialEq)]
pub struct ParseExprError {
    pub message: String,
}

impl ParseExprError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseExprError {}

impl From<LexError> for ParseExprError {
    fn from(err: LexError) -> Self {
        ParseExprError::new(err.to_string())
    }
}

/// Recursive-descent parser over the token stream
pub struct ExprParser {
    tokens: Vec<Token>,
    position: usize,
}

impl ExprParser {
    /// Parse an expression string into an AST.
    pub fn parse(input: &str) -> Result<Expr, ParseExprError> {
        let tokens = Lexer::tokenize(input)?;
        let mut parser = ExprParser {
            tokens,
            position: 0,
        };
        let expr = parser.parse_and()?;
        parser.expect_eof()?;
        Ok(expr)
    }

    // and := clause ( '&&' clause )*
    fn parse_and(&mut self) -> Result<Expr, ParseExprError> {
        let mut expr = self.parse_clause()?;
        while self.peek() == &Token::And {
            self.advance();
            let right = self.parse_clause()?;
            expr = Expr::And(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    // clause := operand ( ('='|'!=') operand )?
    fn parse_clause(&mut self) -> Result<Expr, ParseExprError> {
        let left = self.parse_operand()?;
        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            _ => return Ok(Expr::Truthy(left)),
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseExprError> {
        let operand = match self.peek() {
            Token::Var(name) => Operand::Var(name.clone()),
            Token::Literal(value) => Operand::Literal(value.clone()),
            other => {
                return Err(ParseExprError::new(format!(
                    "expected variable or literal, found {}",
                    other
                )))
            }
        };
        self.advance();
        Ok(operand)
    }

    fn expect_eof(&mut self) -> Result<(), ParseExprError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(ParseExprError::new(format!(
                "unexpected trailing token {}",
                other
            ))),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comparison() {
        let expr = ExprParser::parse("$CI_OS_NAME = linux").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                left: Operand::Var("CI_OS_NAME".to_string()),
                op: CompareOp::Eq,
                right: Operand::Literal("linux".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_and_is_left_associative() {
        let expr = ExprParser::parse("$A = 1 && $B = 2 && $C = 3").unwrap();
        match expr {
            Expr::And(left, right) => {
                assert!(matches!(*left, Expr::And(_, _)));
                assert!(matches!(*right, Expr::Compare { .. }));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_var_to_var_comparison() {
        let expr = ExprParser::parse("$HOST != $TARGET").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                left: Operand::Var("HOST".to_string()),
                op: CompareOp::Ne,
                right: Operand::Var("TARGET".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_bare_operand_is_truthy() {
        let expr = ExprParser::parse("$CI_TAG").unwrap();
        assert_eq!(expr, Expr::Truthy(Operand::Var("CI_TAG".to_string())));
    }

    #[test]
    fn test_parse_rejects_dangling_operator() {
        assert!(ExprParser::parse("$HOST != ").is_err());
        assert!(ExprParser::parse("&& $A = b").is_err());
        assert!(ExprParser::parse("$A = b $C").is_err());
    }
}
