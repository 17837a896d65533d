//! Error types shared by the parsers, the prepared statement and the SQL compiler.

use crate::token::Span;

/// Grammar mismatch while parsing statement text or a method name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}{}", location(.span))]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    pub fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }
}

fn location(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" (at {}..{})", span.start, span.end),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    /// Literal arity or type mismatch, e.g. `between` with three elements.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Misuse of parameters: unbound parameters at execution time, or
    /// parameters in a one-shot query.
    #[error("query error: {0}")]
    Query(String),

    #[error("non unique result: expected at most one result, found {0} or more")]
    NonUniqueResult(usize),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("execution failed: {0}")]
    Execution(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
