//! Linear expressions over variables.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use indexmap::IndexMap;

use crate::errors::ExpressionError;
use crate::variable::Variable;
use crate::near_zero;

/// A linear expression in the form: constant + Σ(coefficient * variable)
///
/// Terms whose coefficient cancels to (near) zero are pruned, so two
/// expressions describing the same function have the same set of terms.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expression {
    pub constant: f64,
    terms: IndexMap<Variable, f64>,
}

impl Expression {
    /// Create a constant expression.
    pub fn from_constant(value: f64) -> Self {
        Self {
            constant: value,
            terms: IndexMap::new(),
        }
    }

    /// Create an expression from a single variable.
    pub fn from_variable(var: Variable) -> Self {
        Self::from_term(var, 1.0)
    }

    /// Create an expression holding `coefficient * var`.
    pub fn from_term(var: Variable, coefficient: f64) -> Self {
        let mut expr = Self::default();
        expr.add_term(var, coefficient);
        expr
    }

    /// Add a term to the expression.
    pub fn add_term(&mut self, var: Variable, coefficient: f64) {
        let entry = self.terms.entry(var).or_insert(0.0);
        *entry += coefficient;
        if near_zero(*entry) {
            self.terms.swap_remove(&var);
        }
    }

    /// Multiply the expression by a scalar.
    pub fn multiply(&mut self, scalar: f64) {
        self.constant *= scalar;
        for coeff in self.terms.values_mut() {
            *coeff *= scalar;
        }
        self.terms.retain(|_, coeff| !near_zero(*coeff));
    }

    /// Flip the sign of every term and the constant.
    pub fn negate(&mut self) {
        self.multiply(-1.0);
    }

    /// Add `multiplier * other` to this expression.
    pub fn add_expression(&mut self, other: &Expression, multiplier: f64) {
        self.constant += other.constant * multiplier;
        for (&var, &coeff) in &other.terms {
            self.add_term(var, coeff * multiplier);
        }
    }

    /// Get the coefficient for a variable.
    pub fn coefficient(&self, var: Variable) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    /// Check if this expression references the given variable.
    pub fn contains(&self, var: Variable) -> bool {
        self.terms.contains_key(&var)
    }

    /// Whether the expression has no variable terms.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Get an iterator over the terms.
    pub fn terms(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        self.terms.iter().map(|(&var, &coeff)| (var, coeff))
    }

    /// Number of variable terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the expression is the constant zero.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && near_zero(self.constant)
    }

    /// Multiply two expressions. At least one of them must be constant.
    pub fn times(&self, other: &Expression) -> Result<Expression, ExpressionError> {
        if self.is_constant() {
            Ok(other.clone() * self.constant)
        } else if other.is_constant() {
            Ok(self.clone() * other.constant)
        } else {
            Err(ExpressionError::Nonlinear)
        }
    }

    /// Divide by another expression, which must be a non-zero constant.
    pub fn divide(&self, other: &Expression) -> Result<Expression, ExpressionError> {
        if !other.is_constant() {
            return Err(ExpressionError::NonlinearDivision);
        }
        if near_zero(other.constant) {
            return Err(ExpressionError::DivisionByZero);
        }
        Ok(self.clone() * (1.0 / other.constant))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (var, coeff) in self.terms() {
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            if coeff == 1.0 {
                write!(f, "{}", var)?;
            } else {
                write!(f, "{}*{}", coeff, var)?;
            }
        }
        if first {
            write!(f, "{}", self.constant)
        } else if !near_zero(self.constant) {
            write!(f, " + {}", self.constant)
        } else {
            Ok(())
        }
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::from_constant(value)
    }
}

impl From<Variable> for Expression {
    fn from(var: Variable) -> Self {
        Expression::from_variable(var)
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(mut self) -> Expression {
        self.negate();
        self
    }
}

impl Neg for Variable {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::from_term(self, -1.0)
    }
}

impl Mul<f64> for Expression {
    type Output = Expression;

    fn mul(mut self, scalar: f64) -> Expression {
        self.multiply(scalar);
        self
    }
}

impl Mul<Expression> for f64 {
    type Output = Expression;

    fn mul(self, expr: Expression) -> Expression {
        expr * self
    }
}

impl Mul<f64> for Variable {
    type Output = Expression;

    fn mul(self, scalar: f64) -> Expression {
        Expression::from_term(self, scalar)
    }
}

impl Mul<Variable> for f64 {
    type Output = Expression;

    fn mul(self, var: Variable) -> Expression {
        Expression::from_term(var, self)
    }
}

impl Div<f64> for Expression {
    type Output = Expression;

    fn div(mut self, scalar: f64) -> Expression {
        self.multiply(1.0 / scalar);
        self
    }
}

impl Div<f64> for Variable {
    type Output = Expression;

    fn div(self, scalar: f64) -> Expression {
        Expression::from_term(self, 1.0 / scalar)
    }
}

impl<T: Into<Expression>> AddAssign<T> for Expression {
    fn add_assign(&mut self, rhs: T) {
        self.add_expression(&rhs.into(), 1.0);
    }
}

impl<T: Into<Expression>> SubAssign<T> for Expression {
    fn sub_assign(&mut self, rhs: T) {
        self.add_expression(&rhs.into(), -1.0);
    }
}

impl<T: Into<Expression>> Add<T> for Expression {
    type Output = Expression;

    fn add(mut self, rhs: T) -> Expression {
        self += rhs;
        self
    }
}

impl<T: Into<Expression>> Sub<T> for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: T) -> Expression {
        self -= rhs;
        self
    }
}

impl<T: Into<Expression>> Add<T> for Variable {
    type Output = Expression;

    fn add(self, rhs: T) -> Expression {
        Expression::from_variable(self) + rhs
    }
}

impl<T: Into<Expression>> Sub<T> for Variable {
    type Output = Expression;

    fn sub(self, rhs: T) -> Expression {
        Expression::from_variable(self) - rhs
    }
}

impl Add<Expression> for f64 {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        rhs + self
    }
}

impl Add<Variable> for f64 {
    type Output = Expression;

    fn add(self, rhs: Variable) -> Expression {
        rhs + self
    }
}

impl Sub<Expression> for f64 {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        -rhs + self
    }
}

impl Sub<Variable> for f64 {
    type Output = Expression;

    fn sub(self, rhs: Variable) -> Expression {
        -rhs + self
    }
}
