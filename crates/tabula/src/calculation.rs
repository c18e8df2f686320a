//! Workbook calculation engine
//!
//! Every formula cell is parsed when it is stored and its precedents are
//! recorded in a [`DependencyGraph`]. A write marks the written cell dirty,
//! collects everything transitively downstream of it and evaluates that set
//! in dependency order. Strongly connected groups evaluate to
//! `#CIRCULAR!` instead of looping.
//!
//! # Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let mut sheet = workbook.sheet_mut(0).unwrap();
//! sheet.set_input("A1", "10").unwrap();
//! sheet.set_input("A2", "=A1*2").unwrap();
//! assert_eq!(sheet.value("A2").unwrap(), CellData::Number(20.0));
//!
//! // Inside a batch, cached values stay frozen until the batch closes
//! sheet.begin_update().unwrap();
//! sheet.set_input("A1", "7").unwrap();
//! assert_eq!(sheet.value("A2").unwrap(), CellData::Number(20.0));
//! sheet.end_update().unwrap();
//! assert_eq!(sheet.value("A2").unwrap(), CellData::Number(14.0));
//! ```

use std::ops::{Deref, DerefMut};

use ahash::{AHashMap, AHashSet};
use tabula_core::{CellData, CellError, Error, Result};
use tabula_formula::{
    evaluate_formula, parse_formula, precedents_of, CellKey, DependencyGraph, EvaluationContext,
    FormulaExpr, FunctionRegistry,
};
use tracing::{debug, trace, warn};

use crate::workbook::Workbook;

/// Options for workbook calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationOptions {
    /// Re-evaluate volatile functions (NOW, TODAY, RAND, RANDBETWEEN) and
    /// their dependents on every recalculation pass
    pub recalculate_volatile: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            recalculate_volatile: true,
        }
    }
}

/// Statistics from a calculation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formula cells in the workbook
    pub formula_count: usize,
    /// Number of cells evaluated
    pub cells_calculated: usize,
    /// Number of cells set to `#CIRCULAR!`
    pub circular_references: usize,
    /// Number of volatile cells included in the pass
    pub volatile_cells: usize,
    /// Number of dirty cells left for a sheet's open batch
    pub deferred_cells: usize,
}

/// Per-sheet batch state
#[derive(Debug, Default)]
pub(crate) struct Batch {
    pub(crate) open: bool,
    /// Cells made dirty while the batch was open
    pub(crate) dirty: AHashSet<CellKey>,
}

/// Parsed formulas and their dependency graph
#[derive(Debug, Default)]
pub(crate) struct CalcState {
    pub(crate) graph: DependencyGraph,
    /// Parsed tree of every formula cell (None when nothing was usable)
    pub(crate) formulas: AHashMap<CellKey, Option<FormulaExpr>>,
    pub(crate) volatile: AHashSet<CellKey>,
}

impl Workbook {
    /// Re-evaluate every formula in the workbook
    pub fn recalculate_all(&mut self) -> CalculationStats {
        let keys: Vec<CellKey> = self.calc.formulas.keys().copied().collect();
        self.recalculate(keys)
    }

    /// Open an update batch on a sheet
    ///
    /// While the batch is open, writes to the sheet update storage and the
    /// dependency graph but leave cached values alone.
    pub fn begin_update(&mut self, sheet: usize) -> Result<()> {
        self.check_sheet(sheet)?;
        let batch = &mut self.batches[sheet];
        if batch.open {
            return Err(Error::BatchInProgress(self.sheets[sheet].name().to_string()));
        }
        batch.open = true;
        debug!(sheet = self.sheets[sheet].name(), "update batch opened");
        Ok(())
    }

    /// Close a sheet's update batch and recalculate everything it deferred
    ///
    /// Closing a sheet with no open batch is a no-op pass.
    pub fn end_update(&mut self, sheet: usize) -> Result<CalculationStats> {
        self.check_sheet(sheet)?;
        let batch = &mut self.batches[sheet];
        if !batch.open {
            return Ok(CalculationStats::default());
        }
        batch.open = false;
        let seeds: Vec<CellKey> = batch.dirty.drain().collect();
        debug!(
            sheet = self.sheets[sheet].name(),
            deferred = seeds.len(),
            "update batch closed"
        );
        Ok(self.recalculate(seeds))
    }

    /// Check if a sheet has an open update batch
    pub fn is_updating(&self, sheet: usize) -> bool {
        self.batches.get(sheet).is_some_and(|b| b.open)
    }

    /// Open an update batch that closes when the guard is dropped
    ///
    /// The guard dereferences to the workbook, so writes go through it.
    pub fn batch(&mut self, sheet: usize) -> Result<UpdateGuard<'_>> {
        self.begin_update(sheet)?;
        Ok(UpdateGuard {
            workbook: self,
            sheet,
        })
    }

    /// Parse a cell's formula (if any) and record what it reads
    pub(crate) fn register(&mut self, key: CellKey) {
        let text = self
            .sheets
            .get(key.sheet)
            .and_then(|ws| ws.formula(key.row, key.col));

        let Some(text) = text else {
            self.calc.graph.remove_precedents(key);
            self.calc.formulas.remove(&key);
            self.calc.volatile.remove(&key);
            return;
        };

        let parsed = parse_formula(text);
        if !parsed.errors.is_empty() {
            trace!(?key, errors = ?parsed.errors, "formula parsed with diagnostics");
        }

        let (precedents, volatile) = match &parsed.root {
            Some(root) => {
                let registry = FunctionRegistry::global();
                let volatile = root
                    .function_names()
                    .into_iter()
                    .any(|name| registry.is_volatile(name));
                (precedents_of(root, key.sheet, &self.sheets), volatile)
            }
            None => (Vec::new(), false),
        };

        self.calc.graph.set_precedents(key, precedents);
        if volatile {
            self.calc.volatile.insert(key);
        } else {
            self.calc.volatile.remove(&key);
        }
        self.calc.formulas.insert(key, parsed.root);
    }

    /// Re-register every formula and recalculate everything
    ///
    /// Needed whenever sheet indices or sheet names change.
    pub(crate) fn rebuild(&mut self) -> CalculationStats {
        self.calc = CalcState::default();
        for batch in &mut self.batches {
            batch.dirty.clear();
        }

        let keys: Vec<CellKey> = self
            .sheets
            .iter()
            .enumerate()
            .flat_map(|(i, ws)| ws.formula_cells().map(move |(row, col, _)| CellKey::new(i, row, col)))
            .collect();
        for key in keys {
            self.register(key);
        }
        self.recalculate_all()
    }

    /// Recalculate the seeds and everything downstream of them
    ///
    /// Dirty cells on sheets with an open batch are set aside for that
    /// batch instead of being evaluated.
    pub(crate) fn recalculate(&mut self, seeds: impl IntoIterator<Item = CellKey>) -> CalculationStats {
        let mut stats = CalculationStats {
            formula_count: self.calc.formulas.len(),
            ..Default::default()
        };

        let mut seeds: Vec<CellKey> = seeds.into_iter().collect();
        if self.options.recalculate_volatile {
            seeds.extend(self.calc.volatile.iter().copied());
            stats.volatile_cells = self.calc.volatile.len();
        }

        let mut dirty = self.calc.graph.dirty_closure(seeds);
        let batches = &mut self.batches;
        dirty.retain(|key| match batches.get_mut(key.sheet) {
            Some(batch) if batch.open => {
                batch.dirty.insert(*key);
                stats.deferred_cells += 1;
                false
            }
            _ => true,
        });

        for group in self.calc.graph.schedule(&dirty) {
            if group.cyclic {
                warn!(
                    cells = group.cells.len(),
                    first = ?group.cells.first(),
                    "circular reference detected"
                );
                for key in &group.cells {
                    if self.calc.formulas.contains_key(key) {
                        if let Some(ws) = self.sheets.get_mut(key.sheet) {
                            ws.set_cached_value(key.row, key.col, CellData::Error(CellError::Circular));
                        }
                        stats.circular_references += 1;
                    }
                }
                continue;
            }

            for key in group.cells {
                let Some(root) = self.calc.formulas.get(&key) else {
                    continue;
                };
                let ctx = EvaluationContext::new(&self.sheets, key.sheet, key.row, key.col);
                let value = evaluate_formula(root.as_ref(), &ctx);
                trace!(?key, ?value, "evaluated cell");

                if let Some(ws) = self.sheets.get_mut(key.sheet) {
                    ws.set_cached_value(key.row, key.col, value);
                }
                stats.cells_calculated += 1;
            }
        }

        debug!(
            dirty = dirty.len(),
            calculated = stats.cells_calculated,
            circular = stats.circular_references,
            deferred = stats.deferred_cells,
            "recalculation pass"
        );
        stats
    }
}

/// An open update batch on one sheet
///
/// Dropping the guard closes the batch and runs the deferred
/// recalculation, even when the batch is left early by `?` or a panic.
pub struct UpdateGuard<'a> {
    workbook: &'a mut Workbook,
    sheet: usize,
}

impl UpdateGuard<'_> {
    /// Index of the sheet this batch is open on
    pub fn sheet(&self) -> usize {
        self.sheet
    }
}

impl Deref for UpdateGuard<'_> {
    type Target = Workbook;

    fn deref(&self) -> &Workbook {
        self.workbook
    }
}

impl DerefMut for UpdateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Workbook {
        self.workbook
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.workbook.end_update(self.sheet) {
            warn!(sheet = self.sheet, error = %e, "failed to close update batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn number(wb: &Workbook, row: u32, col: u16) -> CellData {
        wb.value(0, row, col).unwrap()
    }

    #[test]
    fn test_dependents_follow_writes() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "1").unwrap();
        wb.set_input(0, 1, 0, "=A1+1").unwrap();
        wb.set_input(0, 2, 0, "=A2*10").unwrap();
        assert_eq!(number(&wb, 2, 0), CellData::Number(20.0));

        wb.set_input(0, 0, 0, "4").unwrap();
        assert_eq!(number(&wb, 1, 0), CellData::Number(5.0));
        assert_eq!(number(&wb, 2, 0), CellData::Number(50.0));
    }

    #[test]
    fn test_formula_replacing_formula_drops_old_edges() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "1").unwrap();
        wb.set_input(0, 0, 1, "2").unwrap();
        wb.set_input(0, 1, 0, "=A1").unwrap();
        wb.set_input(0, 1, 0, "=B1").unwrap();

        wb.set_input(0, 0, 0, "100").unwrap();
        assert_eq!(number(&wb, 1, 0), CellData::Number(2.0));
        assert_eq!(wb.calc.graph.dependents(CellKey::new(0, 0, 0)).count(), 0);
    }

    #[test]
    fn test_cycle_resolves_and_recovers() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "=A2+1").unwrap();
        wb.set_input(0, 1, 0, "=A1+1").unwrap();
        wb.set_input(0, 2, 0, "=A1*2").unwrap();
        assert_eq!(number(&wb, 0, 0), CellData::Error(CellError::Circular));
        assert_eq!(number(&wb, 1, 0), CellData::Error(CellError::Circular));
        assert_eq!(number(&wb, 2, 0), CellData::Error(CellError::Circular));

        wb.set_input(0, 1, 0, "5").unwrap();
        assert_eq!(number(&wb, 0, 0), CellData::Number(6.0));
        assert_eq!(number(&wb, 2, 0), CellData::Number(12.0));
    }

    #[test]
    fn test_self_reference_is_circular() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "=SUM(A1:A3)").unwrap();
        assert_eq!(number(&wb, 0, 0), CellData::Error(CellError::Circular));
    }

    #[test]
    fn test_batch_defers_until_closed() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "1").unwrap();
        wb.set_input(0, 0, 1, "=A1*3").unwrap();

        wb.begin_update(0).unwrap();
        assert!(matches!(wb.begin_update(0), Err(Error::BatchInProgress(_))));
        wb.set_input(0, 0, 0, "2").unwrap();
        wb.set_input(0, 0, 2, "=B1+1").unwrap();
        assert_eq!(number(&wb, 0, 1), CellData::Number(3.0));
        assert_eq!(number(&wb, 0, 2), CellData::Empty);
        assert!(wb.is_updating(0));

        let stats = wb.end_update(0).unwrap();
        assert!(!wb.is_updating(0));
        assert_eq!(stats.cells_calculated, 2);
        assert_eq!(number(&wb, 0, 1), CellData::Number(6.0));
        assert_eq!(number(&wb, 0, 2), CellData::Number(7.0));
    }

    #[test]
    fn test_guard_closes_batch_on_early_exit() {
        fn fill(wb: &mut Workbook) -> Result<()> {
            let mut guard = wb.batch(0)?;
            guard.set_input(0, 0, 0, "9")?;
            guard.set_input(0, 5000, 0, "1")?;
            Ok(())
        }

        let mut wb = Workbook::new();
        wb.set_input(0, 0, 1, "=A1+1").unwrap();
        assert!(fill(&mut wb).is_err());
        assert!(!wb.is_updating(0));
        assert_eq!(number(&wb, 0, 1), CellData::Number(10.0));
    }

    #[test]
    fn test_batch_is_per_sheet() {
        let mut wb = Workbook::new();
        let other = wb.add_sheet("Other").unwrap();
        wb.set_input(0, 0, 1, "=Other!A1*2").unwrap();

        wb.begin_update(0).unwrap();
        wb.set_input(other, 0, 0, "4").unwrap();
        assert_eq!(number(&wb, 0, 1), CellData::Number(0.0));
        wb.end_update(0).unwrap();
        assert_eq!(number(&wb, 0, 1), CellData::Number(8.0));
    }

    #[test]
    fn test_volatile_cells_rerun_every_pass() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "=RAND()").unwrap();
        wb.set_input(0, 0, 1, "=A1*0+1").unwrap();

        let stats = wb.recalculate_all();
        assert_eq!(stats.formula_count, 2);
        assert_eq!(stats.volatile_cells, 1);

        let stats = wb.recalculate(Vec::new());
        assert_eq!(stats.cells_calculated, 2);

        wb.set_calculation_options(CalculationOptions {
            recalculate_volatile: false,
        });
        let stats = wb.recalculate(Vec::new());
        assert_eq!(stats.cells_calculated, 0);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let mut wb = Workbook::new();
        wb.add_sheet_with_size("Long", 20_000, 1).unwrap();
        {
            let mut guard = wb.batch(1).unwrap();
            guard.set_input(1, 0, 0, "1").unwrap();
            for row in 1..20_000u32 {
                guard.set_input(1, row, 0, &format!("=A{}+1", row)).unwrap();
            }
        }
        assert_eq!(wb.value(1, 19_999, 0).unwrap(), CellData::Number(20_000.0));
    }
}
