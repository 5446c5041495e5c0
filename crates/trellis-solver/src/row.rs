//! Symbols and rows of the simplex tableau.

use indexmap::IndexMap;
use trellis_core::{near_zero, Variable};

/// Role of a tableau symbol.
///
/// The declaration order is the eviction preference used to break ratio-test
/// ties: artificial variables leave the basis first, external variables never
/// leave through a ratio test at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum SymbolKind {
    /// Phase-1 helper, must reach zero and is then discarded
    Artificial,
    /// Marker of a required equality, pinned at zero
    Dummy,
    /// Marker of an inequality
    Slack,
    /// Deviation of a soft constraint, weighted in the objective
    Error,
    /// A client variable (unrestricted in sign)
    External,
}

/// A variable as the tableau sees it.
///
/// Ordered by `(kind, id)`, which is the fixed total order used for every
/// tie-break in the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Symbol {
    kind: SymbolKind,
    id: u32,
}

impl Symbol {
    pub(crate) fn new(kind: SymbolKind, id: u32) -> Self {
        Self { kind, id }
    }

    pub(crate) fn external(var: Variable) -> Self {
        Self::new(SymbolKind::External, var.index() as u32)
    }

    pub(crate) fn is_external(&self) -> bool {
        self.kind == SymbolKind::External
    }

    pub(crate) fn is_dummy(&self) -> bool {
        self.kind == SymbolKind::Dummy
    }

    /// Restricted symbols are bounded below by zero.
    pub(crate) fn is_restricted(&self) -> bool {
        !self.is_external()
    }

    /// Symbols the simplex may bring into the basis to improve an objective.
    pub(crate) fn is_pivotable(&self) -> bool {
        matches!(self.kind, SymbolKind::Slack | SymbolKind::Error)
    }
}

/// Outcome of adding to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellChange {
    Inserted,
    Updated,
    Removed,
    Unchanged,
}

/// A linear expression over tableau symbols.
///
/// Before it is owned by a basic symbol, a row reads `0 = constant + Σ cells`.
/// Once in the tableau it reads `basic = constant + Σ cells`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Row {
    pub(crate) constant: f64,
    cells: IndexMap<Symbol, f64>,
}

impl Row {
    pub(crate) fn new(constant: f64) -> Self {
        Self {
            constant,
            cells: IndexMap::new(),
        }
    }

    /// Add to the coefficient of a symbol, pruning it if it cancels.
    pub(crate) fn add(&mut self, symbol: Symbol, coefficient: f64) -> CellChange {
        if near_zero(coefficient) {
            return CellChange::Unchanged;
        }
        match self.cells.get_mut(&symbol) {
            Some(entry) => {
                *entry += coefficient;
                if near_zero(*entry) {
                    self.cells.swap_remove(&symbol);
                    CellChange::Removed
                } else {
                    CellChange::Updated
                }
            }
            None => {
                self.cells.insert(symbol, coefficient);
                CellChange::Inserted
            }
        }
    }

    /// Add `coefficient * other` to this row.
    pub(crate) fn add_row(&mut self, other: &Row, coefficient: f64) {
        self.constant += other.constant * coefficient;
        for (&s, &c) in &other.cells {
            self.add(s, c * coefficient);
        }
    }

    pub(crate) fn remove(&mut self, symbol: Symbol) -> Option<f64> {
        self.cells.swap_remove(&symbol)
    }

    pub(crate) fn coefficient(&self, symbol: Symbol) -> f64 {
        self.cells.get(&symbol).copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, symbol: Symbol) -> bool {
        self.cells.contains_key(&symbol)
    }

    pub(crate) fn cells(&self) -> impl Iterator<Item = (Symbol, f64)> + '_ {
        self.cells.iter().map(|(&s, &c)| (s, c))
    }

    pub(crate) fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.cells.keys().copied()
    }

    pub(crate) fn is_constant(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether every cell is a dummy symbol (vacuously true for constants).
    pub(crate) fn all_dummies(&self) -> bool {
        self.cells.keys().all(Symbol::is_dummy)
    }

    pub(crate) fn reverse_sign(&mut self) {
        self.constant = -self.constant;
        for c in self.cells.values_mut() {
            *c = -*c;
        }
    }

    /// Rewrite `0 = constant + Σ cells` as `symbol = ...`.
    ///
    /// # Panics
    ///
    /// Panics if the coefficient of `symbol` is (numerically) zero. Pivoting on
    /// a zero coefficient means the tableau is corrupt.
    pub(crate) fn solve_for(&mut self, symbol: Symbol) {
        let coeff = self.cells.swap_remove(&symbol).unwrap_or(0.0);
        assert!(
            !near_zero(coeff),
            "pivot on zero coefficient for {:?} (coefficient {})",
            symbol,
            coeff
        );
        let multiplier = -1.0 / coeff;
        self.constant *= multiplier;
        for c in self.cells.values_mut() {
            *c *= multiplier;
        }
    }

    /// Rewrite `lhs = ...` (containing `rhs`) as `rhs = ...` (containing `lhs`).
    pub(crate) fn solve_for_symbols(&mut self, lhs: Symbol, rhs: Symbol) {
        self.add(lhs, -1.0);
        self.solve_for(rhs);
    }

    /// Replace `symbol` by `row`. Returns the coefficient that was replaced.
    pub(crate) fn substitute(&mut self, symbol: Symbol, row: &Row) -> Option<f64> {
        let coeff = self.cells.swap_remove(&symbol)?;
        self.add_row(row, coeff);
        Some(coeff)
    }
}
