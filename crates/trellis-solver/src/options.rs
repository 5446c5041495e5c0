//! Solver configuration.

use trellis_core::Strength;

/// Options controlling solver behavior.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverOptions {
    /// Re-optimize and refresh variable values after every add/remove.
    /// When disabled, call `Solver::solve` before reading values.
    pub autosolve: bool,
    /// Strength used by `Solver::add_default_edit_var` and `Solver::set_edited_value`
    pub default_edit_strength: Strength,
    /// Strength used by `Solver::add_stay`
    pub default_stay_strength: Strength,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            autosolve: true,
            default_edit_strength: Strength::STRONG,
            default_stay_strength: Strength::WEAK,
        }
    }
}

impl SolverOptions {
    pub fn with_autosolve(mut self, autosolve: bool) -> Self {
        self.autosolve = autosolve;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SolverOptions::default();
        assert!(options.autosolve);
        assert_eq!(options.default_edit_strength, Strength::STRONG);
        assert_eq!(options.default_stay_strength, Strength::WEAK);
        assert!(!options.with_autosolve(false).autosolve);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_missing_fields_take_defaults() {
        let options: SolverOptions = serde_json::from_str(r#"{"autosolve": false}"#).unwrap();
        assert!(!options.autosolve);
        assert_eq!(options.default_edit_strength, Strength::STRONG);
        assert_eq!(options.default_stay_strength, Strength::WEAK);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_custom_strength_round_trips() {
        let options = SolverOptions {
            default_stay_strength: Strength::new(
                "gentle",
                trellis_core::SymbolicWeight::new(0.0, 0.0, 0.5),
            ),
            ..SolverOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: SolverOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
