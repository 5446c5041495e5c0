//! Cassowary constraint solver implementation.
//!
//! This is an implementation of the Cassowary linear constraint solving algorithm,
//! as described in "The Cassowary Linear Arithmetic Constraint Solving Algorithm"
//! by Greg J. Badros and Alan Borning.
//!
//! The algorithm uses a variation of the simplex method optimized for incremental
//! constraint solving with priorities (strengths). Required constraints are hard
//! rows of the tableau; every other constraint contributes weighted error
//! variables to the objective row of each strength level, and the levels are
//! optimized lexicographically, strongest first.

use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, error, trace};
use trellis_core::{
    near_zero, Constraint, ConstraintFlavor, Expression, Relation, Strength, SymbolicWeight,
    Variable, EPSILON, LEVELS,
};

use crate::edit::EditFrame;
use crate::error::{Result, SolverError};
use crate::options::SolverOptions;
use crate::row::{Row, Symbol, SymbolKind};
use crate::tableau::Tableau;

/// Handle to a constraint that has been added to a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintId(u32);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Symbols that let the solver retract a constraint.
#[derive(Debug, Clone)]
pub(crate) struct Tag {
    /// Slack, dummy or positive error symbol identifying the constraint's row
    pub(crate) marker: Symbol,
    /// Error symbols weighted in the objective (empty for required constraints)
    pub(crate) errors: SmallVec<[Symbol; 2]>,
}

impl Tag {
    /// The symbol paired with the marker, if any.
    fn other(&self) -> Option<Symbol> {
        self.errors.iter().copied().find(|&s| s != self.marker)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConstraintRecord {
    pub(crate) constraint: Constraint,
    pub(crate) tag: Tag,
}

#[derive(Debug, Clone)]
struct VariableData {
    name: String,
    value: f64,
    /// Value reported while no row references the variable
    rest_value: f64,
}

/// Direction in which an entering symbol moves away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    fn sign(self) -> f64 {
        match self {
            Direction::Increase => 1.0,
            Direction::Decrease => -1.0,
        }
    }
}

/// Which objective a primal simplex pass minimizes.
#[derive(Debug, Clone, Copy)]
enum Target {
    Level(usize),
    Artificial,
}

/// The Cassowary constraint solver.
#[derive(Debug)]
pub struct Solver {
    options: SolverOptions,
    pub(crate) tableau: Tableau,
    /// External variable arena, indexed by `Variable::index`
    variables: Vec<VariableData>,
    pub(crate) constraints: IndexMap<ConstraintId, ConstraintRecord>,
    /// Live stay constraints, re-anchored after every resolve
    stays: Vec<ConstraintId>,
    pub(crate) frames: Vec<EditFrame>,
    symbol_counter: u32,
    constraint_counter: u32,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Create a new solver with default options.
    pub fn new() -> Self {
        Self::with_options(SolverOptions::default())
    }

    /// Create a new solver with the given options.
    pub fn with_options(options: SolverOptions) -> Self {
        Self {
            options,
            tableau: Tableau::new(),
            variables: Vec::new(),
            constraints: IndexMap::new(),
            stays: Vec::new(),
            frames: Vec::new(),
            symbol_counter: 0,
            constraint_counter: 0,
        }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Create a new variable with a name and an initial value.
    pub fn create_variable(&mut self, name: impl Into<String>, initial_value: f64) -> Variable {
        let var = Variable::new(self.variables.len());
        self.variables.push(VariableData {
            name: name.into(),
            value: initial_value,
            rest_value: initial_value,
        });
        var
    }

    /// Get the current value of a variable.
    ///
    /// With autosolve disabled this is the value as of the last `solve`.
    /// A handle this solver did not create reads as `0.0`; use `name_of` to
    /// check a handle.
    pub fn value_of(&self, var: Variable) -> f64 {
        self.variables
            .get(var.index())
            .map(|data| data.value)
            .unwrap_or(0.0)
    }

    /// Get the name a variable was created with.
    pub fn name_of(&self, var: Variable) -> Option<&str> {
        self.variables.get(var.index()).map(|data| data.name.as_str())
    }

    /// Iterate over all variables with their names and current values.
    pub fn variables(&self) -> impl Iterator<Item = (Variable, &str, f64)> + '_ {
        self.variables
            .iter()
            .enumerate()
            .map(|(index, data)| (Variable::new(index), data.name.as_str(), data.value))
    }

    pub fn has_constraint(&self, id: ConstraintId) -> bool {
        self.constraints.contains_key(&id)
    }

    /// The constraint behind a live handle.
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(&id).map(|record| &record.constraint)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Enable or disable re-solving after every add/remove.
    pub fn set_autosolve(&mut self, autosolve: bool) {
        self.options.autosolve = autosolve;
    }

    /// Add `expression OP 0` with the given strength and weight.
    pub fn add_constraint(
        &mut self,
        expression: Expression,
        relation: Relation,
        strength: Strength,
        weight: f64,
    ) -> Result<ConstraintId> {
        let mut constraint = Constraint::new(expression, relation).with_strength(strength);
        constraint.weight = weight;
        self.add(constraint)
    }

    /// Add a constraint to the solver.
    ///
    /// Insertion is all-or-nothing: on `RequiredFailure` the tableau is left
    /// exactly as it was.
    pub fn add(&mut self, constraint: Constraint) -> Result<ConstraintId> {
        self.validate(&constraint)?;
        let entering_vars: Vec<Variable> = constraint
            .expression
            .terms()
            .map(|(var, _)| var)
            .filter(|&var| !self.tableau.contains(Symbol::external(var)))
            .collect();

        let (mut row, tag) = self.create_row(&constraint);
        let mut subject = Self::choose_subject(&row, &tag);

        // A row made only of dummies is either redundant (zero constant) or
        // contradicts the required equalities already present.
        if subject.is_none() && row.all_dummies() {
            if !near_zero(row.constant) {
                debug!(%constraint, "required constraint conflicts with required equalities");
                return Err(SolverError::RequiredFailure);
            }
            subject = Some(tag.marker);
        }

        match subject {
            Some(subject) => {
                row.solve_for(subject);
                self.tableau.substitute_out(subject, &row);
                self.tableau.add_row(subject, row);
            }
            None => {
                if !self.add_with_artificial_variable(row)? {
                    debug!(%constraint, "phase 1 could not satisfy required constraint");
                    return Err(SolverError::RequiredFailure);
                }
            }
        }

        let weight = constraint.strength.weight().scaled(constraint.weight);
        for &error in &tag.errors {
            self.tableau.add_objective_term(error, weight);
        }

        for var in entering_vars {
            let data = &mut self.variables[var.index()];
            data.rest_value = data.value;
        }

        let id = ConstraintId(self.constraint_counter);
        self.constraint_counter += 1;
        debug!(
            constraint = %id,
            relation = %constraint.relation,
            strength = %constraint.strength,
            rows = self.tableau.row_count(),
            "added constraint"
        );
        if matches!(constraint.flavor, ConstraintFlavor::Stay(_)) {
            self.stays.push(id);
        }
        self.constraints.insert(id, ConstraintRecord { constraint, tag });

        if self.options.autosolve {
            self.optimize()?;
            self.refresh_values();
        }
        Ok(id)
    }

    /// Reject caller input that would leave the objective unbounded or the
    /// tableau holding non-finite numbers.
    fn validate(&self, constraint: &Constraint) -> Result<()> {
        let expr = &constraint.expression;
        if !expr.constant.is_finite() {
            return Err(SolverError::NonFiniteExpression);
        }
        for (var, coeff) in expr.terms() {
            if var.index() >= self.variables.len() {
                return Err(SolverError::UnknownVariable(var));
            }
            if !coeff.is_finite() {
                return Err(SolverError::NonFiniteExpression);
            }
        }
        if !(constraint.weight.is_finite() && constraint.weight >= 0.0) {
            return Err(SolverError::InvalidWeight(constraint.weight));
        }
        let strength = &constraint.strength;
        if !strength.is_required()
            && strength.weight().0.iter().any(|c| !(c.is_finite() && *c >= 0.0))
        {
            return Err(SolverError::InvalidStrength(strength.name().to_string()));
        }
        Ok(())
    }

    /// Add several constraints, stopping at the first failure.
    pub fn add_constraints<I>(&mut self, constraints: I) -> Result<Vec<ConstraintId>>
    where
        I: IntoIterator<Item = Constraint>,
    {
        constraints.into_iter().map(|c| self.add(c)).collect()
    }

    /// Remove a constraint from the solver.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<()> {
        let record = self
            .constraints
            .shift_remove(&id)
            .ok_or(SolverError::ConstraintNotFound(id))?;
        self.stays.retain(|&stay| stay != id);
        for frame in &mut self.frames {
            frame.forget(id);
        }

        // Remove the error effects from the objective *before* pivoting, or
        // substitutions into the objective would use stale weights.
        let weight = record.constraint.strength.weight().scaled(record.constraint.weight);
        let negated = weight.scaled(-1.0);
        for &error in &record.tag.errors {
            self.tableau.add_objective_term(error, negated);
        }

        let marker = record.tag.marker;
        if self.tableau.remove_row(marker).is_none() && self.tableau.is_parametric(marker) {
            let leaving = self.marker_leaving_row(marker).ok_or_else(|| {
                error!(constraint = %id, "no leaving row for constraint marker");
                SolverError::Internal("failed to find leaving row for marker")
            })?;
            let Some(mut row) = self.tableau.remove_row(leaving) else {
                return Err(SolverError::Internal("leaving row vanished"));
            };
            row.solve_for_symbols(leaving, marker);
            self.tableau.substitute_out(marker, &row);
        }

        if let Some(other) = record.tag.other() {
            if self.tableau.remove_row(other).is_none() {
                self.tableau.remove_column(other);
            }
        }

        debug!(constraint = %id, "removed constraint");
        if self.options.autosolve {
            self.optimize()?;
            self.refresh_values();
        }
        Ok(())
    }

    /// Add a stay on a variable at the default stay strength.
    pub fn add_stay(&mut self, var: Variable) -> Result<ConstraintId> {
        let strength = self.options.default_stay_strength.clone();
        self.add_stay_with(var, strength, 1.0)
    }

    /// Add a stay on a variable: prefer that it keeps its current value.
    pub fn add_stay_with(
        &mut self,
        var: Variable,
        strength: Strength,
        weight: f64,
    ) -> Result<ConstraintId> {
        let value = self.value_of(var);
        self.add(Constraint::stay(var, value, strength, weight))
    }

    /// Require `var >= lower`.
    pub fn add_lower_bound(&mut self, var: Variable, lower: f64) -> Result<ConstraintId> {
        self.add(Constraint::greater_or_equal(var, lower))
    }

    /// Require `var <= upper`.
    pub fn add_upper_bound(&mut self, var: Variable, upper: f64) -> Result<ConstraintId> {
        self.add(Constraint::less_or_equal(var, upper))
    }

    /// Require `lower <= var <= upper`. Both bounds are added or neither is.
    pub fn add_bounds(
        &mut self,
        var: Variable,
        lower: f64,
        upper: f64,
    ) -> Result<(ConstraintId, ConstraintId)> {
        let low = self.add_lower_bound(var, lower)?;
        match self.add_upper_bound(var, upper) {
            Ok(high) => Ok((low, high)),
            Err(err) => {
                self.remove_constraint(low)?;
                Err(err)
            }
        }
    }

    /// Re-optimize every strength level and refresh variable values.
    ///
    /// During an edit session, pending suggestions are applied first.
    pub fn solve(&mut self) -> Result<()> {
        if !self.frames.is_empty() {
            self.apply_suggestions();
            self.dual_optimize()?;
        }
        self.optimize()?;
        self.refresh_values();
        Ok(())
    }

    /// Drop every constraint and edit session. Variables keep their values.
    pub fn reset(&mut self) {
        self.tableau = Tableau::new();
        self.constraints.clear();
        self.stays.clear();
        self.frames.clear();
        for data in &mut self.variables {
            data.rest_value = data.value;
        }
        debug!("solver reset");
    }

    /// Create the tableau row for a constraint, with basic variables
    /// substituted out and its marker symbols added.
    ///
    /// The row reads `0 = constant + Σ cells` with a non-negative constant.
    fn create_row(&mut self, constraint: &Constraint) -> (Row, Tag) {
        let expr = &constraint.expression;
        let mut row = Row::new(expr.constant);
        for (var, coeff) in expr.terms() {
            let symbol = Symbol::external(var);
            match self.tableau.row(symbol) {
                Some(basic_row) => row.add_row(basic_row, coeff),
                None => {
                    row.add(symbol, coeff);
                }
            }
        }

        let required = constraint.is_required();
        let tag = match constraint.relation {
            Relation::Leq | Relation::Geq => {
                let coeff = if constraint.relation == Relation::Leq { 1.0 } else { -1.0 };
                let slack = self.new_symbol(SymbolKind::Slack);
                row.add(slack, coeff);
                let mut errors = SmallVec::new();
                if !required {
                    let error = self.new_symbol(SymbolKind::Error);
                    row.add(error, -coeff);
                    errors.push(error);
                }
                Tag { marker: slack, errors }
            }
            Relation::Eq if required => {
                let dummy = self.new_symbol(SymbolKind::Dummy);
                row.add(dummy, 1.0);
                Tag {
                    marker: dummy,
                    errors: SmallVec::new(),
                }
            }
            Relation::Eq => {
                // expr = e+ - e-
                let plus = self.new_symbol(SymbolKind::Error);
                let minus = self.new_symbol(SymbolKind::Error);
                row.add(plus, -1.0);
                row.add(minus, 1.0);
                let mut errors = SmallVec::new();
                errors.push(plus);
                errors.push(minus);
                Tag { marker: plus, errors }
            }
        };

        if row.constant < 0.0 {
            row.reverse_sign();
        }
        (row, tag)
    }

    fn new_symbol(&mut self, kind: SymbolKind) -> Symbol {
        let symbol = Symbol::new(kind, self.symbol_counter);
        self.symbol_counter += 1;
        symbol
    }

    /// Choose the symbol that becomes basic for a new row.
    ///
    /// Any external symbol will do since externals are unrestricted. Failing
    /// that, a fresh slack or error marker with a negative coefficient keeps
    /// the row's value non-negative.
    fn choose_subject(row: &Row, tag: &Tag) -> Option<Symbol> {
        if let Some(external) = row.symbols().filter(Symbol::is_external).min() {
            return Some(external);
        }
        std::iter::once(tag.marker)
            .chain(tag.other())
            .find(|&s| s.is_pivotable() && row.coefficient(s) < 0.0)
    }

    /// Add a row through a Phase-1 artificial variable.
    ///
    /// Returns false, with the tableau restored, if the artificial variable
    /// cannot be driven to zero.
    fn add_with_artificial_variable(&mut self, row: Row) -> Result<bool> {
        let snapshot = self.tableau.clone();
        let art = self.new_symbol(SymbolKind::Artificial);
        self.tableau.artificial = Some(row.clone());
        self.tableau.add_row(art, row);

        if let Err(err) = self.simplex(Target::Artificial) {
            self.tableau = snapshot;
            return Err(err);
        }
        let success = self
            .tableau
            .artificial
            .as_ref()
            .is_some_and(|objective| near_zero(objective.constant));
        if !success {
            self.tableau = snapshot;
            return Ok(false);
        }

        // If the artificial variable is still basic its row is zero-valued;
        // swap it for any other symbol of that row before discarding it.
        if let Some(mut art_row) = self.tableau.remove_row(art) {
            if !art_row.is_constant() {
                let entering = art_row
                    .symbols()
                    .min_by_key(|s| (!s.is_pivotable(), s.is_dummy(), *s))
                    .ok_or(SolverError::Internal("artificial row has no symbols"))?;
                art_row.solve_for_symbols(art, entering);
                self.tableau.substitute_out(entering, &art_row);
                self.tableau.add_row(entering, art_row);
            }
        }
        self.tableau.remove_column(art);
        self.tableau.artificial = None;
        Ok(true)
    }

    /// Optimize every strength level, strongest first.
    pub(crate) fn optimize(&mut self) -> Result<()> {
        for level in 0..LEVELS {
            self.simplex(Target::Level(level))?;
        }
        self.tableau.clear_infeasible();
        Ok(())
    }

    /// Primal simplex on one objective until no entering symbol improves it.
    fn simplex(&mut self, target: Target) -> Result<()> {
        let mut bland = false;
        loop {
            let Some((entering, direction)) = self.entering_symbol(target, bland) else {
                return Ok(());
            };
            let Some((leaving, ratio)) = self.leaving_row(entering, direction) else {
                error!(?entering, "objective is unbounded");
                return Err(SolverError::Internal("the objective is unbounded"));
            };
            trace!(?entering, ?leaving, ratio, "pivot");
            if !self.tableau.pivot(entering, leaving) {
                return Err(SolverError::Internal("leaving symbol is not basic"));
            }
            // Degenerate pivots switch to Bland's rule until progress is made.
            bland = near_zero(ratio);
        }
    }

    /// Pick the symbol whose entry most improves the target objective without
    /// touching any stronger level.
    fn entering_symbol(&self, target: Target, bland: bool) -> Option<(Symbol, Direction)> {
        let (row, stronger): (&Row, &[Row]) = match target {
            Target::Artificial => (self.tableau.artificial.as_ref()?, &[] as &[Row]),
            Target::Level(level) => (
                self.tableau.objective.level(level),
                self.tableau.objective.levels_above(level),
            ),
        };

        let mut best: Option<(Symbol, Direction, f64)> = None;
        for (symbol, coeff) in row.cells() {
            if stronger.iter().any(|r| !near_zero(r.coefficient(symbol))) {
                continue;
            }
            let (direction, score) = if symbol.is_pivotable() && coeff < -EPSILON {
                (Direction::Increase, coeff)
            } else if symbol.is_external() && !near_zero(coeff) {
                let direction = if coeff < 0.0 { Direction::Increase } else { Direction::Decrease };
                (direction, -coeff.abs())
            } else {
                continue;
            };
            let better = match best {
                None => true,
                Some((current, _, current_score)) => {
                    if bland {
                        symbol < current
                    } else if near_zero(score - current_score) {
                        symbol < current
                    } else {
                        score < current_score
                    }
                }
            };
            if better {
                best = Some((symbol, direction, score));
            }
        }
        best.map(|(symbol, direction, _)| (symbol, direction))
    }

    /// Ratio test: the restricted basic symbol that hits zero first as the
    /// entering symbol moves. Ties prefer evicting artificial and dummy
    /// symbols, then the lowest symbol.
    fn leaving_row(&self, entering: Symbol, direction: Direction) -> Option<(Symbol, f64)> {
        let mut best: Option<(Symbol, f64)> = None;
        for basic in self.tableau.column(entering) {
            if !basic.is_restricted() {
                continue;
            }
            let Some(row) = self.tableau.row(basic) else {
                continue;
            };
            let coeff = row.coefficient(entering) * direction.sign();
            if coeff >= -EPSILON {
                continue;
            }
            let ratio = (-row.constant / coeff).max(0.0);
            let better = match best {
                None => true,
                Some((current, current_ratio)) => {
                    if near_zero(ratio - current_ratio) {
                        basic < current
                    } else {
                        ratio < current_ratio
                    }
                }
            };
            if better {
                best = Some((basic, ratio));
            }
        }
        best
    }

    /// Dual simplex: restore feasibility of rows whose constants went
    /// negative while keeping every objective level optimal. Only rows
    /// reachable from the changed symbols are visited.
    pub(crate) fn dual_optimize(&mut self) -> Result<()> {
        while let Some(leaving) = self.tableau.pop_infeasible() {
            let Some(row) = self.tableau.row(leaving) else {
                continue;
            };
            if row.constant >= -EPSILON {
                continue;
            }
            let Some(entering) = self.dual_entering_symbol(row) else {
                error!(?leaving, "no dual entering symbol for infeasible row");
                return Err(SolverError::Internal("dual optimize failed"));
            };
            trace!(?entering, ?leaving, "dual pivot");
            if !self.tableau.pivot(entering, leaving) {
                return Err(SolverError::Internal("leaving symbol is not basic"));
            }
        }
        Ok(())
    }

    /// Among the row's symbols that can absorb the infeasibility, pick the one
    /// with the lexicographically smallest objective-to-coefficient ratio.
    fn dual_entering_symbol(&self, row: &Row) -> Option<Symbol> {
        let mut best: Option<(Symbol, SymbolicWeight)> = None;
        for (symbol, coeff) in row.cells() {
            let eligible = (symbol.is_pivotable() && coeff > EPSILON)
                || (symbol.is_external() && !near_zero(coeff));
            if !eligible {
                continue;
            }
            let ratio = self.tableau.objective.coefficient(symbol).scaled(1.0 / coeff.abs());
            let better = match &best {
                None => true,
                Some((current, current_ratio)) => match ratio.compare(current_ratio) {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Equal => symbol < *current,
                    std::cmp::Ordering::Greater => false,
                },
            };
            if better {
                best = Some((symbol, ratio));
            }
        }
        best.map(|(symbol, _)| symbol)
    }

    /// Choose the row to pivot a parametric marker into before its row is
    /// dropped. Precedence keeps every restricted row feasible:
    ///
    /// 1) restricted row with a negative coefficient and the smallest
    ///    `-constant / coefficient`;
    /// 2) restricted row with the smallest `constant / coefficient`;
    /// 3) the lowest unrestricted (external) row.
    fn marker_leaving_row(&self, marker: Symbol) -> Option<Symbol> {
        let mut first: Option<(Symbol, f64)> = None;
        let mut second: Option<(Symbol, f64)> = None;
        let mut third: Option<Symbol> = None;
        let better = |best: &Option<(Symbol, f64)>, symbol: Symbol, ratio: f64| match best {
            None => true,
            Some((current, current_ratio)) => {
                if near_zero(ratio - current_ratio) {
                    symbol < *current
                } else {
                    ratio < *current_ratio
                }
            }
        };

        for basic in self.tableau.column(marker) {
            let Some(row) = self.tableau.row(basic) else {
                continue;
            };
            let coeff = row.coefficient(marker);
            if near_zero(coeff) {
                continue;
            }
            if basic.is_external() {
                if third.map_or(true, |current| basic < current) {
                    third = Some(basic);
                }
            } else if coeff < 0.0 {
                let ratio = -row.constant / coeff;
                if better(&first, basic, ratio) {
                    first = Some((basic, ratio));
                }
            } else {
                let ratio = row.constant / coeff;
                if better(&second, basic, ratio) {
                    second = Some((basic, ratio));
                }
            }
        }
        first.or(second).map(|(symbol, _)| symbol).or(third)
    }

    /// Copy solved values into the variable arena.
    ///
    /// Basic variables take their row constant, parametric ones sit at zero,
    /// and variables no row references keep their rest value.
    pub(crate) fn refresh_values(&mut self) {
        for index in 0..self.variables.len() {
            let value = self.tableau_value(Variable::new(index));
            self.variables[index].value = value;
        }
    }

    /// The value the tableau's current basic solution gives a variable.
    fn tableau_value(&self, var: Variable) -> f64 {
        let symbol = Symbol::external(var);
        match self.tableau.row(symbol) {
            Some(row) => row.constant,
            None if self.tableau.is_parametric(symbol) => 0.0,
            None => self
                .variables
                .get(var.index())
                .map(|data| data.rest_value)
                .unwrap_or(0.0),
        }
    }

    /// Set the value of a variable no row references.
    pub(crate) fn assign_unconstrained(&mut self, var: Variable, value: f64) {
        if let Some(data) = self.variables.get_mut(var.index()) {
            data.value = value;
            data.rest_value = value;
        }
    }

    /// Re-anchor stays at the current values by zeroing the constant of
    /// whichever stay error symbol is basic.
    pub(crate) fn reset_stay_constants(&mut self) {
        // Anchor at the tableau's solution; cached values lag behind it
        // while autosolve is off.
        for id in &self.stays {
            let anchor = match self.constraints.get(id).map(|r| r.constraint.flavor) {
                Some(ConstraintFlavor::Stay(var)) => Some(self.tableau_value(var)),
                _ => None,
            };
            let Some(record) = self.constraints.get_mut(id) else {
                continue;
            };
            for &error in &record.tag.errors {
                if let Some(row) = self.tableau.row_mut(error) {
                    row.constant = 0.0;
                    break;
                }
            }
            if let Some(value) = anchor {
                record.constraint.expression.constant = -value;
            }
        }
    }

    /// Check tableau invariants. Used by tests.
    #[cfg(test)]
    pub(crate) fn check_consistency(&self) -> std::result::Result<(), &'static str> {
        self.tableau.check_consistency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-8,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_create_variable() {
        let mut solver = Solver::new();
        let v1 = solver.create_variable("a", 1.0);
        let v2 = solver.create_variable("b", 2.0);
        assert_ne!(v1, v2);
        assert_eq!(solver.name_of(v2), Some("b"));
        assert_near(solver.value_of(v1), 1.0);
    }

    #[test]
    fn test_simple_equality() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver.add(Constraint::equal(x, 100.0)).unwrap();
        assert_near(solver.value_of(x), 100.0);
        assert!(solver.check_consistency().is_ok());
    }

    #[test]
    fn test_two_variables() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        let y = solver.create_variable("y", 0.0);
        solver.add(Constraint::equal(x, 100.0)).unwrap();
        solver.add(Constraint::equal(y, x + 50.0)).unwrap();
        assert_near(solver.value_of(x), 100.0);
        assert_near(solver.value_of(y), 150.0);
    }

    #[test]
    fn test_equality_propagation() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 3.0);
        let y = solver.create_variable("y", 8.0);
        solver.add(Constraint::equal(x, y)).unwrap();
        assert_near(solver.value_of(x), solver.value_of(y));
    }

    #[test]
    fn test_inequality_with_weak_preference() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver.add(Constraint::greater_or_equal(x, 50.0)).unwrap();
        solver
            .add(Constraint::equal(x, 10.0).with_strength(Strength::WEAK))
            .unwrap();
        assert_near(solver.value_of(x), 50.0);
    }

    #[test]
    fn test_strength_ordering() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver
            .add(Constraint::equal(x, 100.0).with_strength(Strength::WEAK))
            .unwrap();
        solver
            .add(Constraint::equal(x, 50.0).with_strength(Strength::STRONG))
            .unwrap();
        assert_near(solver.value_of(x), 50.0);
    }

    #[test]
    fn test_many_weak_do_not_outweigh_one_medium() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        for _ in 0..5 {
            solver
                .add(Constraint::equal(x, 10.0).with_strength(Strength::WEAK).with_weight(100.0))
                .unwrap();
        }
        solver
            .add(Constraint::equal(x, 20.0).with_strength(Strength::MEDIUM))
            .unwrap();
        assert_near(solver.value_of(x), 20.0);
    }

    #[test]
    fn test_weight_breaks_ties_within_level() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver
            .add(Constraint::equal(x, 10.0).with_strength(Strength::MEDIUM).with_weight(2.0))
            .unwrap();
        solver
            .add(Constraint::equal(x, 30.0).with_strength(Strength::MEDIUM))
            .unwrap();
        assert_near(solver.value_of(x), 10.0);
    }

    #[test]
    fn test_required_failure_leaves_state() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver.add(Constraint::equal(x, 10.0)).unwrap();
        let result = solver.add(Constraint::equal(x, 5.0));
        assert_eq!(result, Err(SolverError::RequiredFailure));
        assert_near(solver.value_of(x), 10.0);
        assert_eq!(solver.constraint_count(), 1);
        assert!(solver.check_consistency().is_ok());
    }

    #[test]
    fn test_inconsistent_inequality_chain() {
        let mut solver = Solver::new();
        let w = solver.create_variable("w", 0.0);
        let x = solver.create_variable("x", 0.0);
        let y = solver.create_variable("y", 0.0);
        let z = solver.create_variable("z", 0.0);
        solver.add(Constraint::greater_or_equal(w, 10.0)).unwrap();
        solver.add(Constraint::greater_or_equal(x, w)).unwrap();
        solver.add(Constraint::greater_or_equal(y, x)).unwrap();
        solver.add(Constraint::greater_or_equal(z, y)).unwrap();
        solver.add(Constraint::greater_or_equal(z, 8.0)).unwrap();
        let values: Vec<f64> = [w, x, y, z].iter().map(|&v| solver.value_of(v)).collect();

        let result = solver.add(Constraint::less_or_equal(z, 4.0));
        assert_eq!(result, Err(SolverError::RequiredFailure));
        for (&v, before) in [w, x, y, z].iter().zip(values) {
            assert_near(solver.value_of(v), before);
        }
        assert!(solver.value_of(z) >= 10.0 - 1e-8);
        assert!(solver.check_consistency().is_ok());
    }

    #[test]
    fn test_contradictory_constant_constraint() {
        let mut solver = Solver::new();
        let result = solver.add(Constraint::equal(Expression::from_constant(1.0), 2.0));
        assert_eq!(result, Err(SolverError::RequiredFailure));
        assert!(solver.add(Constraint::equal(Expression::from_constant(2.0), 2.0)).is_ok());
    }

    #[test]
    fn test_redundant_required_equalities() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        let y = solver.create_variable("y", 0.0);
        solver.add(Constraint::equal(x, 10.0)).unwrap();
        solver.add(Constraint::equal(y, x)).unwrap();
        solver.add(Constraint::equal(y, 10.0)).unwrap();
        assert_near(solver.value_of(y), 10.0);
        assert_eq!(solver.constraint_count(), 3);
    }

    #[test]
    fn test_two_branch_scenario() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        let y = solver.create_variable("y", 0.0);
        solver.add(Constraint::less_or_equal(x, y)).unwrap();
        solver.add(Constraint::equal(y, x + 3.0)).unwrap();
        solver
            .add(Constraint::equal(x, 10.0).with_strength(Strength::WEAK))
            .unwrap();
        solver
            .add(Constraint::equal(y, 10.0).with_strength(Strength::WEAK))
            .unwrap();
        let (xv, yv) = (solver.value_of(x), solver.value_of(y));
        let first = (xv - 10.0).abs() < 1e-8 && (yv - 13.0).abs() < 1e-8;
        let second = (xv - 7.0).abs() < 1e-8 && (yv - 10.0).abs() < 1e-8;
        assert!(first || second, "unexpected solution x={} y={}", xv, yv);
    }

    #[test]
    fn test_remove_restores_value() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 5.0);
        let c = solver.add(Constraint::equal(x, 10.0)).unwrap();
        assert_near(solver.value_of(x), 10.0);
        solver.remove_constraint(c).unwrap();
        assert_near(solver.value_of(x), 5.0);
        assert!(solver.check_consistency().is_ok());
    }

    #[test]
    fn test_remove_restores_stayed_value() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 5.0);
        let y = solver.create_variable("y", 7.0);
        solver.add_stay(x).unwrap();
        solver.add_stay(y).unwrap();
        let c = solver
            .add(Constraint::equal(x + y, 20.0).with_strength(Strength::STRONG))
            .unwrap();
        assert_near(solver.value_of(x) + solver.value_of(y), 20.0);
        solver.remove_constraint(c).unwrap();
        assert_near(solver.value_of(x), 5.0);
        assert_near(solver.value_of(y), 7.0);
    }

    #[test]
    fn test_remove_unknown_constraint() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        let c = solver.add(Constraint::equal(x, 1.0)).unwrap();
        solver.remove_constraint(c).unwrap();
        assert_eq!(
            solver.remove_constraint(c),
            Err(SolverError::ConstraintNotFound(c))
        );
    }

    #[test]
    fn test_remove_required_inequality_relaxes() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver
            .add(Constraint::equal(x, 0.0).with_strength(Strength::WEAK))
            .unwrap();
        let bound = solver.add_lower_bound(x, 10.0).unwrap();
        assert_near(solver.value_of(x), 10.0);
        solver.remove_constraint(bound).unwrap();
        assert_near(solver.value_of(x), 0.0);
        assert!(solver.check_consistency().is_ok());
    }

    #[test]
    fn test_strength_monotonicity() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        let y = solver.create_variable("y", 0.0);
        solver.add(Constraint::equal(x + y, 100.0)).unwrap();
        let strong = solver
            .add(Constraint::equal(x, 70.0).with_strength(Strength::STRONG))
            .unwrap();
        let weak = solver
            .add(Constraint::equal(y, 90.0).with_strength(Strength::WEAK))
            .unwrap();
        assert_near(solver.value_of(x) + solver.value_of(y), 100.0);
        assert_near(solver.value_of(x), 70.0);
        solver.remove_constraint(strong).unwrap();
        assert_near(solver.value_of(x) + solver.value_of(y), 100.0);
        assert_near(solver.value_of(y), 90.0);
        solver.remove_constraint(weak).unwrap();
        assert_near(solver.value_of(x) + solver.value_of(y), 100.0);
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let mut solver = Solver::new();
        let foreign = Variable::new(7);
        assert_eq!(
            solver.add(Constraint::equal(foreign, 1.0)),
            Err(SolverError::UnknownVariable(foreign))
        );
    }

    #[test]
    fn test_autosolve_disabled_defers_values() {
        let mut solver = Solver::with_options(SolverOptions::default().with_autosolve(false));
        let x = solver.create_variable("x", 1.0);
        solver.add_stay(x).unwrap();
        solver
            .add(Constraint::equal(x, 40.0).with_strength(Strength::STRONG))
            .unwrap();
        assert_near(solver.value_of(x), 1.0);
        solver.solve().unwrap();
        assert_near(solver.value_of(x), 40.0);
    }

    #[test]
    fn test_bounds() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver
            .add(Constraint::equal(x, 500.0).with_strength(Strength::MEDIUM))
            .unwrap();
        solver.add_bounds(x, 0.0, 100.0).unwrap();
        assert_near(solver.value_of(x), 100.0);
        assert_eq!(
            solver.add_bounds(x, 200.0, 300.0),
            Err(SolverError::RequiredFailure)
        );
        assert_eq!(solver.constraint_count(), 3);
    }

    #[test]
    fn test_nonlinear_expression_error_converts() {
        let x = Variable::new(0);
        let y = Variable::new(1);
        let err: SolverError = Expression::from(x)
            .times(&Expression::from(y))
            .unwrap_err()
            .into();
        assert_eq!(err, SolverError::Expression(trellis_core::ExpressionError::Nonlinear));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver.add_stay(x).unwrap();
        let result = solver.add(
            Constraint::equal(x, 5.0)
                .with_strength(Strength::WEAK)
                .with_weight(-1.0),
        );
        assert_eq!(result, Err(SolverError::InvalidWeight(-1.0)));
        assert_eq!(solver.constraint_count(), 1);

        // The solver still accepts well-formed constraints.
        solver
            .add(Constraint::equal(x, 1.0).with_strength(Strength::MEDIUM))
            .unwrap();
        assert_near(solver.value_of(x), 1.0);
        assert!(solver.check_consistency().is_ok());
    }

    #[test]
    fn test_nan_weight_rejected() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        let result = solver.add(
            Constraint::equal(x, 5.0)
                .with_strength(Strength::STRONG)
                .with_weight(f64::NAN),
        );
        assert!(matches!(result, Err(SolverError::InvalidWeight(w)) if w.is_nan()));
        assert_eq!(solver.constraint_count(), 0);
    }

    #[test]
    fn test_negative_strength_rejected() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        let negative = Strength::new("neg", SymbolicWeight::new(0.0, -1.0, 0.0));
        assert_eq!(
            solver.add(Constraint::equal(x, 5.0).with_strength(negative)),
            Err(SolverError::InvalidStrength("neg".to_string()))
        );
        assert_eq!(solver.constraint_count(), 0);
    }

    #[test]
    fn test_infinite_coefficient_rejected() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        assert_eq!(
            solver.add(Constraint::equal(x / 0.0, 5.0)),
            Err(SolverError::NonFiniteExpression)
        );
        assert_eq!(solver.constraint_count(), 0);
        assert!(solver.check_consistency().is_ok());
    }

    #[test]
    fn test_nan_constant_rejected() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        assert_eq!(
            solver.add(Constraint::equal(x, f64::NAN)),
            Err(SolverError::NonFiniteExpression)
        );
        assert_eq!(solver.constraint_count(), 0);
    }

    #[test]
    fn test_value_of_foreign_handle() {
        let solver = Solver::new();
        let foreign = Variable::new(3);
        assert_eq!(solver.name_of(foreign), None);
        assert_eq!(solver.value_of(foreign), 0.0);
    }

    #[test]
    fn test_stay_anchor_follows_tableau_without_autosolve() {
        let mut solver = Solver::with_options(SolverOptions::default().with_autosolve(false));
        let x = solver.create_variable("x", 1.0);
        let stay = solver.add_stay(x).unwrap();
        solver.add(Constraint::equal(x, 7.0)).unwrap();
        assert_near(solver.value_of(x), 1.0);

        solver.begin_edit();
        let anchored = solver.constraint(stay).map(|c| c.expression.constant);
        assert!(anchored.is_some_and(|c| (c + 7.0).abs() < 1e-8), "{:?}", anchored);
        solver.end_edit().unwrap();
        assert_near(solver.value_of(x), 7.0);
    }

    #[test]
    fn test_reset_keeps_values() {
        let mut solver = Solver::new();
        let x = solver.create_variable("x", 0.0);
        solver.add(Constraint::equal(x, 12.0)).unwrap();
        solver.reset();
        assert_eq!(solver.constraint_count(), 0);
        assert_near(solver.value_of(x), 12.0);
        solver.add(Constraint::equal(x, 3.0)).unwrap();
        assert_near(solver.value_of(x), 3.0);
    }
}
