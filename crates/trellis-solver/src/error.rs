//! Error types for the solver.

use thiserror::Error;
use trellis_core::{ExpressionError, Variable};

use crate::solver::ConstraintId;

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;

/// Errors that can occur during constraint solving.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// A required constraint conflicts with the required constraints already
    /// in the solver. Nothing was changed.
    #[error("Required constraint cannot be satisfied")]
    RequiredFailure,

    /// The handle does not name a live constraint. Nothing was changed.
    #[error("Constraint {0} is not in the solver")]
    ConstraintNotFound(ConstraintId),

    /// The variable was not created by this solver.
    #[error("Unknown variable: {0}")]
    UnknownVariable(Variable),

    #[error("No edit session is active")]
    NoEditSession,

    #[error("Variable {0} is not an edit variable of the current edit session")]
    UnknownEditVariable(Variable),

    #[error("Variable {0} is already an edit variable of the current edit session")]
    DuplicateEditVariable(Variable),

    #[error("Edit variables cannot have required strength")]
    RequiredEditStrength,

    /// The constraint weight is negative, infinite or NaN.
    #[error("Constraint weight {0} must be finite and non-negative")]
    InvalidWeight(f64),

    /// A custom strength has a negative or non-finite symbolic component.
    #[error("Strength '{0}' must have finite, non-negative components")]
    InvalidStrength(String),

    /// The constraint expression has a non-finite constant or coefficient.
    #[error("Constraint expression has a non-finite constant or coefficient")]
    NonFiniteExpression,

    #[error("Suggested value for {0} is not finite")]
    NonFiniteValue(Variable),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// An invariant of the solver itself was violated. The solver state can
    /// no longer be trusted.
    #[error("Internal solver error: {0}")]
    Internal(&'static str),
}
