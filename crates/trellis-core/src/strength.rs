//! Constraint strengths.
//!
//! A strength is a named preference level. Non-required strengths carry a
//! [`SymbolicWeight`]: a 3-component weight compared lexicographically, so any
//! amount of `strong` outranks any finite amount of `medium`, which in turn
//! outranks any amount of `weak`. The `required` strength has no weight at all;
//! required constraints are hard and are never traded against soft ones.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul};

use crate::near_zero;

/// Number of symbolic levels below `required`.
pub const LEVELS: usize = 3;

/// A lexicographically ordered weight: `[strong, medium, weak]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolicWeight(pub [f64; LEVELS]);

impl SymbolicWeight {
    pub const ZERO: SymbolicWeight = SymbolicWeight([0.0, 0.0, 0.0]);

    /// Create a weight from its three components.
    pub const fn new(strong: f64, medium: f64, weak: f64) -> Self {
        Self([strong, medium, weak])
    }

    /// Component for a level (0 is the strongest).
    pub fn level(&self, level: usize) -> f64 {
        self.0[level]
    }

    /// Scale every component by a numeric weight.
    pub fn scaled(&self, factor: f64) -> Self {
        let [a, b, c] = self.0;
        Self([a * factor, b * factor, c * factor])
    }

    /// Whether every component is (near) zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&c| near_zero(c))
    }

    /// Whether the first non-zero component is negative.
    pub fn is_negative(&self) -> bool {
        self.compare(&Self::ZERO) == Ordering::Less
    }

    /// Lexicographic comparison, treating near-equal components as equal.
    pub fn compare(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            if !near_zero(a - b) {
                return if a < b { Ordering::Less } else { Ordering::Greater };
            }
        }
        Ordering::Equal
    }
}

impl Add for SymbolicWeight {
    type Output = SymbolicWeight;

    fn add(self, rhs: SymbolicWeight) -> SymbolicWeight {
        let [a, b, c] = self.0;
        let [x, y, z] = rhs.0;
        SymbolicWeight([a + x, b + y, c + z])
    }
}

impl Mul<f64> for SymbolicWeight {
    type Output = SymbolicWeight;

    fn mul(self, factor: f64) -> SymbolicWeight {
        self.scaled(factor)
    }
}

impl PartialOrd for SymbolicWeight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

/// A named constraint strength.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Strength {
    name: Cow<'static, str>,
    weight: SymbolicWeight,
    required: bool,
}

impl Strength {
    pub const REQUIRED: Strength = Strength {
        name: Cow::Borrowed("required"),
        weight: SymbolicWeight::ZERO,
        required: true,
    };
    pub const STRONG: Strength = Strength::named("strong", SymbolicWeight::new(1.0, 0.0, 0.0));
    pub const MEDIUM: Strength = Strength::named("medium", SymbolicWeight::new(0.0, 1.0, 0.0));
    pub const WEAK: Strength = Strength::named("weak", SymbolicWeight::new(0.0, 0.0, 1.0));

    const fn named(name: &'static str, weight: SymbolicWeight) -> Self {
        Self {
            name: Cow::Borrowed(name),
            weight,
            required: false,
        }
    }

    /// Create a custom (non-required) strength.
    pub fn new(name: impl Into<Cow<'static, str>>, weight: SymbolicWeight) -> Self {
        Self {
            name: name.into(),
            weight,
            required: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The symbolic weight. Zero for `required`.
    pub fn weight(&self) -> SymbolicWeight {
        self.weight
    }

    /// Check if this is a required constraint strength.
    pub fn is_required(&self) -> bool {
        self.required
    }
}

impl Default for Strength {
    fn default() -> Self {
        Self::REQUIRED
    }
}

impl PartialOrd for Strength {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.required, other.required) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Greater),
            (false, true) => Some(Ordering::Less),
            (false, false) => Some(self.weight.compare(&other.weight)),
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ordering() {
        assert!(Strength::REQUIRED > Strength::STRONG);
        assert!(Strength::STRONG > Strength::MEDIUM);
        assert!(Strength::MEDIUM > Strength::WEAK);
    }

    #[test]
    fn test_required_dominates_any_weight() {
        let huge = Strength::new("huge", SymbolicWeight::new(1e12, 1e12, 1e12));
        assert!(Strength::REQUIRED > huge);
        assert!(huge > Strength::STRONG);
    }

    #[test]
    fn test_lexicographic_levels() {
        let many_medium = SymbolicWeight::new(0.0, 1e9, 0.0);
        let one_strong = SymbolicWeight::new(1.0, 0.0, 0.0);
        assert!(one_strong > many_medium);
        assert!(SymbolicWeight::new(0.0, -1.0, 5.0).is_negative());
        assert!(!SymbolicWeight::new(0.0, 0.0, 2.0).is_negative());
    }

    #[test]
    fn test_scaled_and_sum() {
        let w = SymbolicWeight::new(1.0, 2.0, 3.0).scaled(2.0) + SymbolicWeight::new(0.0, 0.0, 1.0);
        assert_eq!(w, SymbolicWeight::new(2.0, 4.0, 7.0));
        assert!(SymbolicWeight::ZERO.is_zero());
    }

    #[test]
    fn test_custom_strength_name() {
        let s = Strength::new("preferred", SymbolicWeight::new(0.0, 2.0, 0.0));
        assert_eq!(s.name(), "preferred");
        assert!(!s.is_required());
        assert_eq!(Strength::REQUIRED.to_string(), "required");
    }
}
