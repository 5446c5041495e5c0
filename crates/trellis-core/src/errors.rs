//! Error types for expression construction.

use thiserror::Error;

/// Errors raised while building linear expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("Cannot multiply two non-constant expressions")]
    Nonlinear,

    #[error("Cannot divide by a non-constant expression")]
    NonlinearDivision,

    #[error("Division by zero")]
    DivisionByZero,
}
