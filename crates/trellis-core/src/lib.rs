//! Core types for the Trellis constraint solver.
//!
//! This crate provides the data model shared by the solver and its clients:
//! - Variable handles and linear expressions over them
//! - Symbolic strengths for ranking soft constraints
//! - Constraints (plain, stay and edit flavors)
//! - Error types for expression construction

pub mod constraint;
pub mod errors;
pub mod expression;
pub mod strength;
pub mod variable;

pub use constraint::*;
pub use errors::*;
pub use expression::*;
pub use strength::*;
pub use variable::*;

/// Tolerance for floating-point comparisons.
pub const EPSILON: f64 = 1e-8;

/// Near-zero check for floating point values.
pub fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}
