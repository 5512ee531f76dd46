// Condition Expression Module
// Gating expressions over job environments: $VAR = literal, !=, &&

pub mod evaluator;
pub mod lexer;
pub mod parser;

pub use evaluator::{evaluate, EvalError, Evaluator};
pub use lexer::{LexError, Lexer, Token};
pub use parser::{CompareOp, Expr, ExprParser, Operand, ParseExprError};
