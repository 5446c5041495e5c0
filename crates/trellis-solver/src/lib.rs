//! Incremental linear constraint solver for the Trellis toolkit.
//!
//! This crate implements the Cassowary algorithm: an incremental dual simplex
//! over a hierarchy of constraint strengths. Required constraints must hold;
//! `strong`, `medium` and `weak` constraints are satisfied as well as possible,
//! strongest first.
//!
//! # Architecture
//!
//! 1. **Tableau**: rows of basic symbols over parametric symbols, with a
//!    column index so substitutions only visit affected rows
//! 2. **Solver**: constraint insertion (with Phase-1 rollback), removal and
//!    lexicographic optimization of one objective row per strength level
//! 3. **Edit sessions**: nested frames of edit variables, resolved
//!    incrementally with the dual simplex for interactive dragging
//!
//! # Example
//!
//! ```
//! use trellis_solver::{Constraint, Solver, Strength};
//!
//! let mut solver = Solver::new();
//! let left = solver.create_variable("left", 0.0);
//! let width = solver.create_variable("width", 0.0);
//! let right = solver.create_variable("right", 0.0);
//!
//! solver.add(Constraint::equal(right, left + width)).unwrap();
//! solver.add(Constraint::greater_or_equal(width, 100.0)).unwrap();
//! solver.add(Constraint::equal(left, 20.0).with_strength(Strength::STRONG)).unwrap();
//!
//! assert!((solver.value_of(right) - 120.0).abs() < 1e-8);
//! ```

mod edit;
mod error;
mod options;
mod row;
mod solver;
mod tableau;

pub use error::{Result, SolverError};
pub use options::SolverOptions;
pub use solver::{ConstraintId, Solver};

pub use trellis_core::{
    Constraint, ConstraintFlavor, Expression, ExpressionError, Relation, Strength,
    SymbolicWeight, Variable, EPSILON,
};
