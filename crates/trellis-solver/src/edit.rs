//! Edit sessions: interactive suggest/resolve cycles.
//!
//! An edit session is a stack of frames. Each frame owns the edit constraints
//! registered while it was innermost; only those variables accept
//! suggestions. Resolving moves the edit constraints' constants in place and
//! repairs feasibility with the dual simplex, touching only the rows that
//! reference the moved error symbols.

use tracing::debug;
use trellis_core::{near_zero, Constraint, Strength, Variable};

use crate::error::{Result, SolverError};
use crate::row::Symbol;
use crate::solver::{ConstraintId, Solver};

/// One edit variable of a frame.
#[derive(Debug, Clone)]
pub(crate) struct EditInfo {
    pub(crate) variable: Variable,
    pub(crate) constraint: ConstraintId,
    /// Positive error symbol of the edit constraint
    pub(crate) plus: Symbol,
    /// Value the tableau currently encodes for the edit constraint
    pub(crate) applied: f64,
    /// Latest suggestion, applied on the next resolve
    pub(crate) suggested: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EditFrame {
    pub(crate) entries: Vec<EditInfo>,
}

impl EditFrame {
    fn entry_mut(&mut self, variable: Variable) -> Option<&mut EditInfo> {
        self.entries.iter_mut().find(|e| e.variable == variable)
    }

    fn contains(&self, variable: Variable) -> bool {
        self.entries.iter().any(|e| e.variable == variable)
    }

    /// Drop the entry of a constraint that was removed directly.
    pub(crate) fn forget(&mut self, constraint: ConstraintId) {
        self.entries.retain(|e| e.constraint != constraint);
    }
}

impl Solver {
    /// Open a new (possibly nested) edit frame.
    pub fn begin_edit(&mut self) {
        self.tableau.clear_infeasible();
        self.reset_stay_constants();
        self.frames.push(EditFrame::default());
        debug!(depth = self.frames.len(), "begin edit");
    }

    pub fn is_editing(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Number of open edit frames.
    pub fn edit_depth(&self) -> usize {
        self.frames.len()
    }

    /// Register an edit variable in the innermost frame.
    ///
    /// The edit constraint starts at the variable's current value, so adding
    /// it does not move anything.
    pub fn add_edit_var(&mut self, variable: Variable, strength: Strength) -> Result<ConstraintId> {
        if self.name_of(variable).is_none() {
            return Err(SolverError::UnknownVariable(variable));
        }
        let frame = self.frames.last().ok_or(SolverError::NoEditSession)?;
        if strength.is_required() {
            return Err(SolverError::RequiredEditStrength);
        }
        if frame.contains(variable) {
            return Err(SolverError::DuplicateEditVariable(variable));
        }

        let value = self.value_of(variable);
        let id = self.add(Constraint::edit(variable, value, strength))?;
        let Some(plus) = self.constraints.get(&id).map(|record| record.tag.marker) else {
            return Err(SolverError::Internal("edit constraint vanished after insertion"));
        };
        let info = EditInfo {
            variable,
            constraint: id,
            plus,
            applied: value,
            suggested: value,
        };
        match self.frames.last_mut() {
            Some(frame) => frame.entries.push(info),
            None => return Err(SolverError::NoEditSession),
        }
        debug!(%variable, constraint = %id, "added edit variable");
        Ok(id)
    }

    /// Register an edit variable at the default edit strength.
    pub fn add_default_edit_var(&mut self, variable: Variable) -> Result<ConstraintId> {
        let strength = self.options().default_edit_strength.clone();
        self.add_edit_var(variable, strength)
    }

    /// Record a desired value for an edit variable of the innermost frame.
    ///
    /// Nothing is solved until `resolve` (or `solve`).
    pub fn suggest_value(&mut self, variable: Variable, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(SolverError::NonFiniteValue(variable));
        }
        let frame = self.frames.last_mut().ok_or(SolverError::NoEditSession)?;
        let entry = frame
            .entry_mut(variable)
            .ok_or(SolverError::UnknownEditVariable(variable))?;
        entry.suggested = value;
        Ok(())
    }

    /// Apply pending suggestions incrementally and refresh variable values.
    pub fn resolve(&mut self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(SolverError::NoEditSession);
        }
        self.apply_suggestions();
        self.dual_optimize()?;
        self.refresh_values();
        self.reset_stay_constants();
        self.tableau.clear_infeasible();
        Ok(())
    }

    /// Close the innermost frame and remove its edit constraints.
    pub fn end_edit(&mut self) -> Result<()> {
        self.resolve()?;
        let frame = self.frames.pop().ok_or(SolverError::NoEditSession)?;
        for entry in frame.entries {
            self.remove_constraint(entry.constraint)?;
        }
        debug!(depth = self.frames.len(), "end edit");
        Ok(())
    }

    /// Move a single variable: a one-shot begin/add/suggest/resolve/end.
    ///
    /// A variable that no constraint mentions is simply assigned.
    pub fn set_edited_value(&mut self, variable: Variable, value: f64) -> Result<()> {
        if self.name_of(variable).is_none() {
            return Err(SolverError::UnknownVariable(variable));
        }
        if !value.is_finite() {
            return Err(SolverError::NonFiniteValue(variable));
        }
        if !self.tableau.contains(Symbol::external(variable)) {
            self.assign_unconstrained(variable, value);
            return Ok(());
        }

        self.begin_edit();
        let result = self
            .add_default_edit_var(variable)
            .and_then(|_| self.suggest_value(variable, value))
            .and_then(|()| self.resolve());
        let ended = self.end_edit();
        result.and(ended)
    }

    /// Shift the edit constraints of the innermost frame to their suggested
    /// values. Rows pushed below zero are queued for the dual simplex.
    pub(crate) fn apply_suggestions(&mut self) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        for entry in &mut frame.entries {
            let delta = entry.suggested - entry.applied;
            if near_zero(delta) {
                continue;
            }
            // `v - c` becomes `v - (c + delta)`: the same system with the
            // positive error symbol replaced by `plus + delta`.
            self.tableau.shift(entry.plus, delta);
            entry.applied = entry.suggested;
            if let Some(record) = self.constraints.get_mut(&entry.constraint) {
                record.constraint.expression.constant = -entry.suggested;
            }
        }
    }
}
