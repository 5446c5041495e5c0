//! The incremental simplex tableau.
//!
//! Variables are partitioned into basic symbols, each owning exactly one row
//! expressed over parametric (non-basic) symbols, and parametric symbols. A
//! column index maps every parametric symbol to the set of basic symbols whose
//! rows reference it, so a substitution only visits the affected rows.
//!
//! The objective is kept as one row per symbolic strength level. Objective
//! rows are not part of the column index: there are only a handful of them
//! and every substitution updates all of them.

use indexmap::{IndexMap, IndexSet};
use trellis_core::{near_zero, SymbolicWeight, EPSILON, LEVELS};

use crate::row::{CellChange, Row, Symbol};

/// One objective row per strength level, strongest first.
#[derive(Debug, Clone, Default)]
pub(crate) struct Objective {
    levels: [Row; LEVELS],
}

impl Objective {
    pub(crate) fn level(&self, level: usize) -> &Row {
        &self.levels[level]
    }

    /// The rows of every level stronger than `level`.
    pub(crate) fn levels_above(&self, level: usize) -> &[Row] {
        &self.levels[..level]
    }

    /// Objective coefficient of a symbol across all levels.
    pub(crate) fn coefficient(&self, symbol: Symbol) -> SymbolicWeight {
        let mut weight = SymbolicWeight::ZERO;
        for (level, row) in self.levels.iter().enumerate() {
            weight.0[level] = row.coefficient(symbol);
        }
        weight
    }

    pub(crate) fn add_symbol(&mut self, symbol: Symbol, weight: SymbolicWeight) {
        for (level, row) in self.levels.iter_mut().enumerate() {
            row.add(symbol, weight.level(level));
        }
    }

    pub(crate) fn add_row(&mut self, other: &Row, weight: SymbolicWeight) {
        for (level, row) in self.levels.iter_mut().enumerate() {
            let w = weight.level(level);
            if !near_zero(w) {
                row.add_row(other, w);
            }
        }
    }

    fn substitute(&mut self, symbol: Symbol, expr: &Row) {
        for row in &mut self.levels {
            row.substitute(symbol, expr);
        }
    }

    fn remove(&mut self, symbol: Symbol) {
        for row in &mut self.levels {
            row.remove(symbol);
        }
    }

    fn shift(&mut self, symbol: Symbol, delta: f64) {
        for row in &mut self.levels {
            row.constant += row.coefficient(symbol) * delta;
        }
    }
}

/// The simplex tableau: rows, column index and objective rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tableau {
    /// Rows keyed by their basic symbol
    rows: IndexMap<Symbol, Row>,
    /// Parametric symbol -> basic symbols whose rows reference it
    columns: IndexMap<Symbol, IndexSet<Symbol>>,
    pub(crate) objective: Objective,
    /// Phase-1 objective, present only while an artificial variable is live
    pub(crate) artificial: Option<Row>,
    /// Restricted basic symbols whose rows may have gone negative
    infeasible: Vec<Symbol>,
}

impl Tableau {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn row(&self, basic: Symbol) -> Option<&Row> {
        self.rows.get(&basic)
    }

    pub(crate) fn row_mut(&mut self, basic: Symbol) -> Option<&mut Row> {
        self.rows.get_mut(&basic)
    }

    pub(crate) fn is_basic(&self, symbol: Symbol) -> bool {
        self.rows.contains_key(&symbol)
    }

    /// Whether a parametric symbol is referenced by at least one row.
    pub(crate) fn is_parametric(&self, symbol: Symbol) -> bool {
        self.columns.contains_key(&symbol)
    }

    /// Whether the symbol appears anywhere in the tableau rows.
    pub(crate) fn contains(&self, symbol: Symbol) -> bool {
        self.is_basic(symbol) || self.is_parametric(symbol)
    }

    /// Basic symbols whose rows reference `symbol`.
    pub(crate) fn column(&self, symbol: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.columns
            .get(&symbol)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub(crate) fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Install a row for a basic symbol.
    pub(crate) fn add_row(&mut self, basic: Symbol, row: Row) {
        for symbol in row.symbols() {
            self.columns.entry(symbol).or_default().insert(basic);
        }
        if basic.is_restricted() && row.constant < -EPSILON {
            self.infeasible.push(basic);
        }
        self.rows.insert(basic, row);
    }

    /// Take a row out of the tableau, unlinking it from the column index.
    pub(crate) fn remove_row(&mut self, basic: Symbol) -> Option<Row> {
        let row = self.rows.swap_remove(&basic)?;
        for symbol in row.symbols() {
            self.unlink(symbol, basic);
        }
        Some(row)
    }

    fn unlink(&mut self, symbol: Symbol, basic: Symbol) {
        if let Some(set) = self.columns.get_mut(&symbol) {
            set.swap_remove(&basic);
            if set.is_empty() {
                self.columns.swap_remove(&symbol);
            }
        }
    }

    /// Replace the parametric `symbol` by `expr` in every row that references
    /// it and in the objective rows.
    pub(crate) fn substitute_out(&mut self, symbol: Symbol, expr: &Row) {
        if let Some(basics) = self.columns.swap_remove(&symbol) {
            for basic in basics {
                let Some(row) = self.rows.get_mut(&basic) else {
                    continue;
                };
                let Some(coeff) = row.remove(symbol) else {
                    continue;
                };
                row.constant += expr.constant * coeff;
                for (s, c) in expr.cells() {
                    match row.add(s, c * coeff) {
                        CellChange::Inserted => {
                            self.columns.entry(s).or_default().insert(basic);
                        }
                        CellChange::Removed => {
                            if let Some(set) = self.columns.get_mut(&s) {
                                set.swap_remove(&basic);
                                if set.is_empty() {
                                    self.columns.swap_remove(&s);
                                }
                            }
                        }
                        CellChange::Updated | CellChange::Unchanged => {}
                    }
                }
                if basic.is_restricted() && row.constant < -EPSILON {
                    self.infeasible.push(basic);
                }
            }
        }
        self.objective.substitute(symbol, expr);
        if let Some(artificial) = self.artificial.as_mut() {
            artificial.substitute(symbol, expr);
        }
    }

    /// Exchange the roles of a parametric symbol and a basic symbol.
    ///
    /// Returns false if `leaving` is not basic.
    pub(crate) fn pivot(&mut self, entering: Symbol, leaving: Symbol) -> bool {
        let Some(mut row) = self.remove_row(leaving) else {
            return false;
        };
        row.solve_for_symbols(leaving, entering);
        self.substitute_out(entering, &row);
        self.add_row(entering, row);
        true
    }

    /// Drop a parametric symbol from every row, fixing it at zero.
    pub(crate) fn remove_column(&mut self, symbol: Symbol) {
        if let Some(basics) = self.columns.swap_remove(&symbol) {
            for basic in basics {
                if let Some(row) = self.rows.get_mut(&basic) {
                    row.remove(symbol);
                }
            }
        }
        self.objective.remove(symbol);
        if let Some(artificial) = self.artificial.as_mut() {
            artificial.remove(symbol);
        }
    }

    /// Replace `symbol` by `symbol + delta` throughout the tableau.
    ///
    /// For a parametric symbol this forward-propagates the change to every
    /// row in its column using the cached coefficients; for a basic symbol
    /// only its own row moves.
    pub(crate) fn shift(&mut self, symbol: Symbol, delta: f64) {
        if let Some(row) = self.rows.get_mut(&symbol) {
            row.constant -= delta;
            if symbol.is_restricted() && row.constant < -EPSILON {
                self.infeasible.push(symbol);
            }
            return;
        }
        if let Some(basics) = self.columns.get(&symbol) {
            for &basic in basics {
                if let Some(row) = self.rows.get_mut(&basic) {
                    row.constant += row.coefficient(symbol) * delta;
                    if basic.is_restricted() && row.constant < -EPSILON {
                        self.infeasible.push(basic);
                    }
                }
            }
        }
        self.objective.shift(symbol, delta);
    }

    /// Add a weighted symbol to the objective, expanding it if it is basic.
    pub(crate) fn add_objective_term(&mut self, symbol: Symbol, weight: SymbolicWeight) {
        match self.rows.get(&symbol) {
            Some(row) => self.objective.add_row(row, weight),
            None => self.objective.add_symbol(symbol, weight),
        }
    }

    pub(crate) fn pop_infeasible(&mut self) -> Option<Symbol> {
        self.infeasible.pop()
    }

    pub(crate) fn clear_infeasible(&mut self) {
        self.infeasible.clear();
    }

    /// Verify that rows and columns agree and that rows only reference
    /// parametric symbols.
    #[cfg(test)]
    pub(crate) fn check_consistency(&self) -> Result<(), &'static str> {
        for (&basic, row) in &self.rows {
            for symbol in row.symbols() {
                if self.rows.contains_key(&symbol) {
                    return Err("row references a basic symbol");
                }
                let linked = self
                    .columns
                    .get(&symbol)
                    .is_some_and(|set| set.contains(&basic));
                if !linked {
                    return Err("row cell missing from column index");
                }
            }
        }
        for (&symbol, basics) in &self.columns {
            for basic in basics {
                let present = self.rows.get(basic).is_some_and(|row| row.contains(symbol));
                if !present {
                    return Err("column index references a row without the symbol");
                }
            }
        }
        Ok(())
    }
}
