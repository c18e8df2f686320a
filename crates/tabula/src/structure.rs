//! Row and column insertion/deletion
//!
//! The worksheet shifts its own storage; the workbook then rewrites every
//! formula that points into the changed sheet and re-registers everything.

use tabula_core::Result;
use tabula_formula::{FormulaAdjustment, StructuralChange};
use tracing::debug;

use crate::workbook::Workbook;

impl Workbook {
    /// Insert `count` empty rows before row `at`
    pub fn insert_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.check_sheet(sheet)?;
        self.sheets[sheet].insert_rows(at, count)?;
        self.apply_structural(sheet, StructuralChange::InsertRows { at, count })
    }

    /// Delete rows `at..at + count`
    ///
    /// References to deleted cells become `#REF!`.
    pub fn delete_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.check_sheet(sheet)?;
        self.sheets[sheet].delete_rows(at, count)?;
        self.apply_structural(sheet, StructuralChange::DeleteRows { at, count })
    }

    /// Insert `count` empty columns before column `at`
    pub fn insert_columns(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.check_sheet(sheet)?;
        self.sheets[sheet].insert_columns(at, count)?;
        self.apply_structural(sheet, StructuralChange::InsertColumns { at, count })
    }

    /// Delete columns `at..at + count`
    ///
    /// References to deleted cells become `#REF!`.
    pub fn delete_columns(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.check_sheet(sheet)?;
        self.sheets[sheet].delete_columns(at, count)?;
        self.apply_structural(sheet, StructuralChange::DeleteColumns { at, count })
    }

    fn apply_structural(&mut self, sheet: usize, change: StructuralChange) -> Result<()> {
        let target = self.sheets[sheet].name().to_string();
        let mut rewritten = 0usize;

        for (index, ws) in self.sheets.iter_mut().enumerate() {
            let rewrites: Vec<(u32, u16, String)> = ws
                .formula_cells()
                .filter_map(|(row, col, text)| {
                    let adjusted =
                        FormulaAdjustment::apply_structural(text, &change, &target, index == sheet);
                    (adjusted != text).then_some((row, col, adjusted))
                })
                .collect();
            rewritten += rewrites.len();
            for (row, col, text) in rewrites {
                ws.cell_mut(row, col)?.formula = Some(text);
            }
        }

        debug!(sheet = %target, ?change, rewritten, "structural edit");
        self.rebuild();
        Ok(())
    }
}
