//! Error types for the sandboxed expression language: [`LexError`] for
//! tokenization, [`ParseError`] for the Pratt parser, [`EvalError`] for
//! evaluation.

use thiserror::Error;

/// Position in source code for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Errors produced while tokenizing an expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    /// Unexpected character encountered
    #[error("unexpected character '{0}' at {1}")]
    UnexpectedCharacter(char, Position),
    /// Unterminated string literal
    #[error("unterminated string starting at {0}")]
    UnterminatedString(Position),
    /// Invalid number literal
    #[error("invalid number literal at {0}")]
    InvalidNumber(Position),
}

/// Errors produced while parsing a token stream into an [`crate::ast::Expr`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Ran out of tokens mid-expression
    #[error("unexpected end of expression")]
    UnexpectedEof,
    /// Token did not match what the grammar expected
    #[error("unexpected token {0:?} at {1}")]
    UnexpectedToken(String, Position),
    /// Parenthesis, or argument list, was never closed
    #[error("unclosed delimiter starting at {0}")]
    UnclosedDelimiter(Position),
}

/// Errors produced while evaluating a parsed expression against a [`crate::Scope`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// A function was called with the wrong number or type of arguments
    #[error("invalid argument to '{0}': {1}")]
    InvalidArgument(String, String),
    /// An identifier chain referred to a function that is not on the whitelist
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    /// A value could not be used where the grammar required a number
    #[error("expected a number, found {0}")]
    NotANumber(String),
    /// Evaluation exceeded its allotted wall-clock budget
    #[error("expression evaluation exceeded its time budget")]
    TimeBudgetExceeded,
}

/// Top level error wrapping all phases of expression evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    /// Error from [`crate::lexer::Lexer`]
    #[error(transparent)]
    Lex(#[from] LexError),
    /// Error from [`crate::parser::Parser`]
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Error from [`crate::interpreter::eval`]
    #[error(transparent)]
    Eval(#[from] EvalError),
}
