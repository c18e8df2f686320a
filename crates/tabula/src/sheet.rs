//! Mutable sheet handle
//!
//! [`Sheet`] is a thin view of one sheet inside a [`Workbook`]. It takes A1
//! addresses and forwards to the workbook, which owns the dependency graph
//! and does the actual work.

use tabula_core::{CellData, CellRef, RangeRef, Result, Worksheet};

use crate::calculation::CalculationStats;
use crate::filter::Criterion;
use crate::sort::SortOrder;
use crate::workbook::Workbook;

/// A mutable handle on one sheet of a workbook
#[derive(Debug)]
pub struct Sheet<'a> {
    workbook: &'a mut Workbook,
    index: usize,
}

impl<'a> Sheet<'a> {
    pub(crate) fn new(workbook: &'a mut Workbook, index: usize) -> Self {
        Self { workbook, index }
    }

    /// Index of the sheet in its workbook
    pub fn index(&self) -> usize {
        self.index
    }

    /// The underlying worksheet, for reading
    pub fn worksheet(&self) -> &Worksheet {
        &self.workbook.sheets[self.index]
    }

    /// The owning workbook, for cross-sheet reads
    pub fn workbook(&self) -> &Workbook {
        self.workbook
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        self.worksheet().name()
    }

    /// Number of rows in the grid
    pub fn row_count(&self) -> u32 {
        self.worksheet().row_count()
    }

    /// Number of columns in the grid
    pub fn column_count(&self) -> u16 {
        self.worksheet().column_count()
    }

    // === Cells ===

    /// Value of a cell by A1 address
    pub fn value(&self, address: &str) -> Result<CellData> {
        self.worksheet().value_a1(address)
    }

    /// Formula text of a cell by A1 address
    pub fn formula(&self, address: &str) -> Result<Option<&str>> {
        let at = CellRef::parse(address)?;
        self.workbook.formula(self.index, at.row, at.col)
    }

    /// Set a cell from user input (see [`Workbook::set_input`])
    pub fn set_input(&mut self, address: &str, input: &str) -> Result<()> {
        let at = CellRef::parse(address)?;
        self.workbook.set_input(self.index, at.row, at.col, input)
    }

    /// Set a literal value
    pub fn set_value(&mut self, address: &str, value: CellData) -> Result<()> {
        let at = CellRef::parse(address)?;
        self.workbook.set_value(self.index, at.row, at.col, value)
    }

    /// Set a formula
    pub fn set_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let at = CellRef::parse(address)?;
        self.workbook.set_formula(self.index, at.row, at.col, formula)
    }

    /// Clear a cell's contents
    pub fn clear(&mut self, address: &str) -> Result<()> {
        let at = CellRef::parse(address)?;
        self.workbook.clear_cell(self.index, at.row, at.col)
    }

    /// Set a cell's style index
    pub fn set_style_index(&mut self, address: &str, style_index: u32) -> Result<()> {
        let at = CellRef::parse(address)?;
        self.workbook.set_style_index(self.index, at.row, at.col, style_index)
    }

    // === Batches ===

    /// Open an update batch on this sheet
    pub fn begin_update(&mut self) -> Result<()> {
        self.workbook.begin_update(self.index)
    }

    /// Close this sheet's update batch and recalculate
    pub fn end_update(&mut self) -> Result<CalculationStats> {
        self.workbook.end_update(self.index)
    }

    /// Check if an update batch is open on this sheet
    pub fn is_updating(&self) -> bool {
        self.workbook.is_updating(self.index)
    }

    // === Structure ===

    /// Insert `count` rows before row `at`
    pub fn insert_rows(&mut self, at: u32, count: u32) -> Result<()> {
        self.workbook.insert_rows(self.index, at, count)
    }

    /// Delete rows `at..at + count`
    pub fn delete_rows(&mut self, at: u32, count: u32) -> Result<()> {
        self.workbook.delete_rows(self.index, at, count)
    }

    /// Insert `count` columns before column `at`
    pub fn insert_columns(&mut self, at: u16, count: u16) -> Result<()> {
        self.workbook.insert_columns(self.index, at, count)
    }

    /// Delete columns `at..at + count`
    pub fn delete_columns(&mut self, at: u16, count: u16) -> Result<()> {
        self.workbook.delete_columns(self.index, at, count)
    }

    // === Sort and filter ===

    /// Sort a range (see [`Workbook::sort`])
    pub fn sort(
        &mut self,
        range: RangeRef,
        order: SortOrder,
        key_index: u16,
        skip_header_row: bool,
    ) -> Result<bool> {
        self.workbook
            .sort(self.index, range, order, key_index, skip_header_row)
    }

    /// Hide the rows of `range` that fail `criterion`
    pub fn filter(&mut self, range: RangeRef, criterion: &dyn Criterion) -> Result<u32> {
        self.workbook.filter(self.index, range, criterion)
    }

    /// Unhide the rows of `range`
    pub fn clear_filter(&mut self, range: RangeRef) -> Result<()> {
        self.workbook.clear_filter(self.index, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::Error;

    #[test]
    fn test_a1_forwarding() {
        let mut wb = Workbook::new();
        let mut sheet = wb.sheet_mut(0).unwrap();
        sheet.set_value("B2", CellData::Number(3.0)).unwrap();
        sheet.set_formula("C2", "B2*B2").unwrap();

        assert_eq!(sheet.name(), "Sheet1");
        assert_eq!(sheet.value("c2").unwrap(), CellData::Number(9.0));
        assert_eq!(sheet.formula("C2").unwrap(), Some("=B2*B2"));
        assert!(matches!(sheet.set_input("2B", "1"), Err(Error::InvalidAddress(_))));

        sheet.clear("B2").unwrap();
        assert_eq!(sheet.value("C2").unwrap(), CellData::Number(0.0));
    }

    #[test]
    fn test_handle_by_name() {
        let mut wb = Workbook::new();
        wb.add_sheet("Totals").unwrap();
        let sheet = wb.sheet_by_name_mut("TOTALS").unwrap();
        assert_eq!(sheet.index(), 1);
        assert!(matches!(wb.sheet_by_name_mut("Nope"), Err(Error::SheetNotFound(_))));
    }
}
