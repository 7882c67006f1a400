//! Snippet evaluation errors
//!
//! Every failure of the evaluated code — lexing, parsing, or runtime —
//! is captured by the host and returned as an ordinary error response;
//! nothing here escapes the host as a panic.

/// Error raised while evaluating a snippet.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The snippet is not syntactically valid
    #[error("parse error: {0}")]
    Parse(String),

    /// An identifier was read before being bound
    #[error("`{0}` is not defined")]
    Undefined(String),

    /// An operation was applied to operands of the wrong type
    #[error("type error: {0}")]
    Type(String),

    /// A non-function value was called
    #[error("`{0}` is not a function")]
    NotCallable(String),

    /// The call-depth cap was hit (runaway recursion)
    #[error("maximum call depth exceeded")]
    DepthExceeded,
}
