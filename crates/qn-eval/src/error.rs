use thiserror::Error;

/// Why an expression could not produce a number.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown symbol \"{0}\"")]
    UnknownSymbol(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression refers to client data but no client is in scope")]
    MissingClient,

    #[error("result is not a finite number")]
    NotFinite,
}

pub type EvalResult<T> = Result<T, EvalError>;
