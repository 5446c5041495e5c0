//! Linear constraints.

use std::fmt;

use crate::expression::Expression;
use crate::strength::Strength;
use crate::variable::Variable;

/// The relation of a constraint: `expression OP 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    Eq,
    Leq,
    Geq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Eq => "==",
            Relation::Leq => "<=",
            Relation::Geq => ">=",
        })
    }
}

/// What a constraint is for. Stays and edits are equalities that the solver
/// tracks specially during edit sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintFlavor {
    #[default]
    Plain,
    /// Prefer that a variable keeps its current value.
    Stay(Variable),
    /// Prefer that a variable tracks an externally suggested value.
    Edit(Variable),
}

/// A constraint to be added to the solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    pub expression: Expression,
    pub relation: Relation,
    pub strength: Strength,
    /// Multiplier applied to the strength's symbolic weight.
    pub weight: f64,
    pub flavor: ConstraintFlavor,
}

impl Constraint {
    /// Create a required constraint `expression OP 0`.
    pub fn new(expression: Expression, relation: Relation) -> Self {
        Self {
            expression,
            relation,
            strength: Strength::REQUIRED,
            weight: 1.0,
            flavor: ConstraintFlavor::Plain,
        }
    }

    /// `lhs == rhs`
    pub fn equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Self {
        Self::new(lhs.into() - rhs.into(), Relation::Eq)
    }

    /// `lhs <= rhs`
    pub fn less_or_equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Self {
        Self::new(lhs.into() - rhs.into(), Relation::Leq)
    }

    /// `lhs >= rhs`
    pub fn greater_or_equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Self {
        Self::new(lhs.into() - rhs.into(), Relation::Geq)
    }

    /// A stay: `variable == value`, flagged so the solver re-anchors it.
    pub fn stay(variable: Variable, value: f64, strength: Strength, weight: f64) -> Self {
        Self {
            expression: variable - value,
            relation: Relation::Eq,
            strength,
            weight,
            flavor: ConstraintFlavor::Stay(variable),
        }
    }

    /// An edit constraint: `variable == value`, later moved by suggestions.
    pub fn edit(variable: Variable, value: f64, strength: Strength) -> Self {
        Self {
            expression: variable - value,
            relation: Relation::Eq,
            strength,
            weight: 1.0,
            flavor: ConstraintFlavor::Edit(variable),
        }
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_required(&self) -> bool {
        self.strength.is_required()
    }

    pub fn is_inequality(&self) -> bool {
        self.relation != Relation::Eq
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} 0 [{}", self.expression, self.relation, self.strength)?;
        if self.weight != 1.0 {
            write!(f, " x{}", self.weight)?;
        }
        write!(f, "]")
    }
}
