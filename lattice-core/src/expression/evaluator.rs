// Condition Expression Evaluator
// Evaluates gating expressions against a job's environment

use crate::expression::parser::{CompareOp, Expr, ExprParser, Operand, ParseExprError};

use std::collections::HashMap;
use std::fmt;

/// Evaluation error
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A referenced variable is absent from the environment
    UnboundVariable { name: String },
    /// The expression failed to lex or parse
    Syntax(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnboundVariable { name } => write!(f, "unbound variable '{}'", name),
            EvalError::Syntax(message) => write!(f, "syntax error: {}", message),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<ParseExprError> for EvalError {
    fn from(err: ParseExprError) -> Self {
        EvalError::Syntax(err.message)
    }
}

/// Evaluate an expression string against an environment.
pub fn evaluate(input: &str, env: &HashMap<String, String>) -> Result<bool, EvalError> {
    let expr = ExprParser::parse(input)?;
    Evaluator::new(env).eval(&expr)
}

/// Expression evaluator over a borrowed environment
pub struct Evaluator<'a> {
    env: &'a HashMap<String, String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(env: &'a HashMap<String, String>) -> Self {
        Self { env }
    }

    /// Evaluate an expression to a boolean.
    ///
    /// AND short-circuits: the right operand is not resolved when the left
    /// is false, so an unbound variable on the right cannot fail a
    /// condition that is already decided.
    pub fn eval(&self, expr: &Expr) -> Result<bool, EvalError> {
        match expr {
            Expr::And(left, right) => {
                if !self.eval(left)? {
                    return Ok(false);
                }
                self.eval(right)
            }
            Expr::Compare { left, op, right } => {
                let left = self.resolve(left)?;
                let right = self.resolve(right)?;
                Ok(match op {
                    CompareOp::Eq => left == right,
                    CompareOp::Ne => left != right,
                })
            }
            Expr::Truthy(operand) => {
                let value = self.resolve(operand)?;
                Ok(!value.is_empty())
            }
        }
    }

    fn resolve(&self, operand: &Operand) -> Result<String, EvalError> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Var(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundVariable { name: name.clone() }),
        }
    }
}
