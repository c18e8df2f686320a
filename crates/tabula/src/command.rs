//! Undoable workbook commands
//!
//! Each command snapshots exactly what it is about to change when it
//! executes, and puts that snapshot back when it is unexecuted. The undo
//! stack itself belongs to the caller.

use tabula_core::{Cell, CellRef, Error, RangeRef, Result, Worksheet};
use tabula_formula::CellKey;
use tracing::debug;

use crate::clipboard::Clipboard;
use crate::filter::Criterion;
use crate::sort::SortOrder;
use crate::workbook::Workbook;

/// A reversible mutation of a workbook
pub trait Command {
    /// Apply the command; `Ok(false)` means there was nothing to do and
    /// nothing needs undoing
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool>;

    /// Restore the state captured by the last `execute`
    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()>;
}

fn not_executed() -> Error {
    Error::other("command has not been executed")
}

impl Workbook {
    /// Put back a full set of sheets and recalculate
    fn restore_sheets(&mut self, sheets: Vec<Worksheet>) {
        self.batches.resize_with(sheets.len(), Default::default);
        self.sheets = sheets;
        self.rebuild();
    }

    /// Put back one sheet and recalculate
    fn restore_sheet(&mut self, index: usize, sheet: Worksheet) -> Result<()> {
        self.check_sheet(index)?;
        self.sheets[index] = sheet;
        self.rebuild();
        Ok(())
    }

    /// Put back one cell and recalculate its dependents
    fn restore_cell(&mut self, sheet: usize, row: u32, col: u16, cell: Option<Cell>) -> Result<()> {
        self.put_cell(sheet, row, col, cell)?;
        self.recalculate(Some(CellKey::new(sheet, row, col)));
        Ok(())
    }

    fn hidden_rows_in(&self, sheet: usize, range: &RangeRef) -> Vec<u32> {
        self.sheets[sheet]
            .hidden_rows()
            .filter(|row| (range.first_row()..=range.last_row()).contains(row))
            .collect()
    }
}

/// Insert rows before a row
#[derive(Debug)]
pub struct InsertRowBeforeCommand {
    sheet: usize,
    row: u32,
    count: u32,
    snapshot: Option<Vec<Worksheet>>,
}

impl InsertRowBeforeCommand {
    pub fn new(sheet: usize, row: u32, count: u32) -> Self {
        Self {
            sheet,
            row,
            count,
            snapshot: None,
        }
    }
}

impl Command for InsertRowBeforeCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        if self.count == 0 {
            return Ok(false);
        }
        // Formulas on every sheet may be rewritten
        let snapshot = workbook.sheets.clone();
        workbook.insert_rows(self.sheet, self.row, self.count)?;
        self.snapshot = Some(snapshot);
        Ok(true)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let sheets = self.snapshot.take().ok_or_else(not_executed)?;
        workbook.restore_sheets(sheets);
        Ok(())
    }
}

/// Insert columns before a column
#[derive(Debug)]
pub struct InsertColumnBeforeCommand {
    sheet: usize,
    column: u16,
    count: u16,
    snapshot: Option<Vec<Worksheet>>,
}

impl InsertColumnBeforeCommand {
    pub fn new(sheet: usize, column: u16, count: u16) -> Self {
        Self {
            sheet,
            column,
            count,
            snapshot: None,
        }
    }
}

impl Command for InsertColumnBeforeCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        if self.count == 0 {
            return Ok(false);
        }
        let snapshot = workbook.sheets.clone();
        workbook.insert_columns(self.sheet, self.column, self.count)?;
        self.snapshot = Some(snapshot);
        Ok(true)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let sheets = self.snapshot.take().ok_or_else(not_executed)?;
        workbook.restore_sheets(sheets);
        Ok(())
    }
}

/// Delete a run of rows
#[derive(Debug)]
pub struct DeleteRowsCommand {
    sheet: usize,
    row: u32,
    count: u32,
    snapshot: Option<Vec<Worksheet>>,
}

impl DeleteRowsCommand {
    pub fn new(sheet: usize, row: u32, count: u32) -> Self {
        Self {
            sheet,
            row,
            count,
            snapshot: None,
        }
    }
}

impl Command for DeleteRowsCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        if self.count == 0 {
            return Ok(false);
        }
        let snapshot = workbook.sheets.clone();
        workbook.delete_rows(self.sheet, self.row, self.count)?;
        self.snapshot = Some(snapshot);
        Ok(true)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let sheets = self.snapshot.take().ok_or_else(not_executed)?;
        workbook.restore_sheets(sheets);
        Ok(())
    }
}

/// Delete a run of columns
#[derive(Debug)]
pub struct DeleteColumnsCommand {
    sheet: usize,
    column: u16,
    count: u16,
    snapshot: Option<Vec<Worksheet>>,
}

impl DeleteColumnsCommand {
    pub fn new(sheet: usize, column: u16, count: u16) -> Self {
        Self {
            sheet,
            column,
            count,
            snapshot: None,
        }
    }
}

impl Command for DeleteColumnsCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        if self.count == 0 {
            return Ok(false);
        }
        let snapshot = workbook.sheets.clone();
        workbook.delete_columns(self.sheet, self.column, self.count)?;
        self.snapshot = Some(snapshot);
        Ok(true)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let sheets = self.snapshot.take().ok_or_else(not_executed)?;
        workbook.restore_sheets(sheets);
        Ok(())
    }
}

/// Set one cell from user input
#[derive(Debug)]
pub struct SetCellCommand {
    sheet: usize,
    at: CellRef,
    input: String,
    previous: Option<Option<Cell>>,
}

impl SetCellCommand {
    pub fn new(sheet: usize, at: CellRef, input: impl Into<String>) -> Self {
        Self {
            sheet,
            at,
            input: input.into(),
            previous: None,
        }
    }
}

impl Command for SetCellCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        workbook.check_sheet(self.sheet)?;
        let before = workbook.sheets[self.sheet]
            .cell(self.at.row, self.at.col)?
            .cloned();
        let unchanged = before.as_ref().map(Cell::input_text).unwrap_or_default() == self.input;
        if unchanged {
            return Ok(false);
        }

        workbook.set_input(self.sheet, self.at.row, self.at.col, &self.input)?;
        self.previous = Some(before);
        Ok(true)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let before = self.previous.take().ok_or_else(not_executed)?;
        workbook.restore_cell(self.sheet, self.at.row, self.at.col, before)
    }
}

/// Paste a clipboard snapshot
#[derive(Debug)]
pub struct PasteCommand {
    clipboard: Clipboard,
    sheet: usize,
    at: CellRef,
    snapshot: Option<Vec<Worksheet>>,
}

impl PasteCommand {
    /// The command keeps its own copy of the clipboard, so it can be
    /// executed again after an undo
    pub fn new(clipboard: Clipboard, sheet: usize, at: CellRef) -> Self {
        Self {
            clipboard,
            sheet,
            at,
            snapshot: None,
        }
    }
}

impl Command for PasteCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        if self.clipboard.is_empty() {
            return Ok(false);
        }
        // A cut touches its source sheet as well
        let snapshot = workbook.sheets.clone();
        workbook.paste_range(&self.clipboard, self.sheet, self.at)?;
        self.snapshot = Some(snapshot);
        Ok(true)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let sheets = self.snapshot.take().ok_or_else(not_executed)?;
        workbook.restore_sheets(sheets);
        Ok(())
    }
}

/// Sort a range
#[derive(Debug)]
pub struct SortCommand {
    sheet: usize,
    range: RangeRef,
    order: SortOrder,
    key_index: u16,
    skip_header_row: bool,
    snapshot: Option<Worksheet>,
}

impl SortCommand {
    pub fn new(sheet: usize, range: RangeRef, order: SortOrder, key_index: u16, skip_header_row: bool) -> Self {
        Self {
            sheet,
            range,
            order,
            key_index,
            skip_header_row,
            snapshot: None,
        }
    }
}

impl Command for SortCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        workbook.check_sheet(self.sheet)?;
        let snapshot = workbook.sheets[self.sheet].clone();
        let changed = workbook.sort(
            self.sheet,
            self.range,
            self.order,
            self.key_index,
            self.skip_header_row,
        )?;
        if changed {
            self.snapshot = Some(snapshot);
        }
        Ok(changed)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let sheet = self.snapshot.take().ok_or_else(not_executed)?;
        workbook.restore_sheet(self.sheet, sheet)
    }
}

/// Filter the rows of a range
pub struct FilterCommand {
    sheet: usize,
    range: RangeRef,
    criterion: Box<dyn Criterion>,
    previous: Option<Vec<u32>>,
}

impl FilterCommand {
    pub fn new(sheet: usize, range: RangeRef, criterion: impl Criterion + 'static) -> Self {
        Self {
            sheet,
            range,
            criterion: Box::new(criterion),
            previous: None,
        }
    }
}

impl Command for FilterCommand {
    fn execute(&mut self, workbook: &mut Workbook) -> Result<bool> {
        workbook.check_sheet(self.sheet)?;
        let before = workbook.hidden_rows_in(self.sheet, &self.range);
        workbook.filter(self.sheet, self.range, self.criterion.as_ref())?;
        let after = workbook.hidden_rows_in(self.sheet, &self.range);

        if before == after {
            return Ok(false);
        }
        self.previous = Some(before);
        Ok(true)
    }

    fn unexecute(&mut self, workbook: &mut Workbook) -> Result<()> {
        let hidden = self.previous.take().ok_or_else(not_executed)?;
        workbook.check_sheet(self.sheet)?;
        let ws = &mut workbook.sheets[self.sheet];
        for row in self.range.first_row()..=self.range.last_row() {
            ws.set_row_hidden(row, hidden.binary_search(&row).is_ok())?;
        }
        debug!(sheet = ws.name(), restored = hidden.len(), "restored hidden rows");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::GreaterThanCriterion;
    use pretty_assertions::assert_eq;
    use tabula_core::CellData;

    fn at(address: &str) -> CellRef {
        CellRef::parse(address).unwrap()
    }

    fn seeded() -> Workbook {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "3").unwrap();
        wb.set_input(0, 1, 0, "1").unwrap();
        wb.set_input(0, 2, 0, "=A1+A2").unwrap();
        wb.set_style_index(0, 1, 0, 4).unwrap();
        wb
    }

    #[test]
    fn test_set_cell_undo_restores_formula_and_style() {
        let mut wb = seeded();
        let mut cmd = SetCellCommand::new(0, at("A3"), "10");
        assert!(cmd.execute(&mut wb).unwrap());
        assert_eq!(wb.value(0, 2, 0).unwrap(), CellData::Number(10.0));

        cmd.unexecute(&mut wb).unwrap();
        assert_eq!(wb.formula(0, 2, 0).unwrap(), Some("=A1+A2"));
        assert_eq!(wb.value(0, 2, 0).unwrap(), CellData::Number(4.0));

        // Writing the same input again is a no-op
        let mut same = SetCellCommand::new(0, at("A3"), "=A1+A2");
        assert!(!same.execute(&mut wb).unwrap());
        assert!(same.unexecute(&mut wb).is_err());
    }

    #[test]
    fn test_delete_rows_undo_is_exact() {
        let mut wb = seeded();
        wb.filter(0, RangeRef::parse("A1:A2").unwrap(), &GreaterThanCriterion::new(0, CellData::Number(2.0)))
            .unwrap();
        let before: Vec<Worksheet> = wb.worksheets().cloned().collect();

        let mut cmd = DeleteRowsCommand::new(0, 0, 1);
        assert!(cmd.execute(&mut wb).unwrap());
        assert_eq!(wb.formula(0, 1, 0).unwrap(), Some("=#REF!+A1"));
        assert_eq!(wb.worksheet(0).unwrap().row_count(), 999);

        cmd.unexecute(&mut wb).unwrap();
        let after: Vec<Worksheet> = wb.worksheets().cloned().collect();
        assert_eq!(after, before);
        assert_eq!(wb.value(0, 2, 0).unwrap(), CellData::Number(4.0));
    }

    #[test]
    fn test_insert_commands_round_trip() {
        let mut wb = seeded();
        let mut rows = InsertRowBeforeCommand::new(0, 1, 3);
        let mut cols = InsertColumnBeforeCommand::new(0, 0, 2);
        assert!(rows.execute(&mut wb).unwrap());
        assert!(cols.execute(&mut wb).unwrap());
        assert_eq!(wb.formula(0, 5, 2).unwrap(), Some("=C1+C5"));

        cols.unexecute(&mut wb).unwrap();
        rows.unexecute(&mut wb).unwrap();
        assert_eq!(wb.formula(0, 2, 0).unwrap(), Some("=A1+A2"));
        assert!(!InsertRowBeforeCommand::new(0, 0, 0).execute(&mut wb).unwrap());
    }

    #[test]
    fn test_delete_columns_round_trip() {
        let mut wb = seeded();
        wb.set_input(0, 0, 1, "=A1*2").unwrap();
        let mut cmd = DeleteColumnsCommand::new(0, 0, 1);
        assert!(cmd.execute(&mut wb).unwrap());
        assert_eq!(wb.formula(0, 0, 0).unwrap(), Some("=#REF!*2"));
        cmd.unexecute(&mut wb).unwrap();
        assert_eq!(wb.value(0, 0, 1).unwrap(), CellData::Number(6.0));
    }

    #[test]
    fn test_sort_and_filter_undo() {
        let mut wb = seeded();
        let range = RangeRef::parse("A1:A2").unwrap();

        let mut sort = SortCommand::new(0, range, SortOrder::Ascending, 0, false);
        assert!(sort.execute(&mut wb).unwrap());
        assert_eq!(wb.value(0, 0, 0).unwrap(), CellData::Number(1.0));
        assert_eq!(wb.worksheet(0).unwrap().style_index(0, 0), 4);
        sort.unexecute(&mut wb).unwrap();
        assert_eq!(wb.value(0, 0, 0).unwrap(), CellData::Number(3.0));
        assert_eq!(wb.worksheet(0).unwrap().style_index(1, 0), 4);

        let mut filter = FilterCommand::new(0, range, GreaterThanCriterion::new(0, CellData::Number(2.0)));
        assert!(filter.execute(&mut wb).unwrap());
        assert!(wb.worksheet(0).unwrap().is_row_hidden(1));
        filter.unexecute(&mut wb).unwrap();
        assert!(!wb.worksheet(0).unwrap().is_row_hidden(1));
    }

    #[test]
    fn test_paste_undo_and_redo() {
        let mut wb = seeded();
        let mut clipboard = Clipboard::new();
        clipboard.cut(&wb, 0, RangeRef::parse("A3").unwrap()).unwrap();

        let mut paste = PasteCommand::new(clipboard, 0, at("B3"));
        assert!(paste.execute(&mut wb).unwrap());
        assert_eq!(wb.formula(0, 2, 1).unwrap(), Some("=A1+A2"));
        assert_eq!(wb.formula(0, 2, 0).unwrap(), None);

        paste.unexecute(&mut wb).unwrap();
        assert_eq!(wb.formula(0, 2, 0).unwrap(), Some("=A1+A2"));
        assert_eq!(wb.formula(0, 2, 1).unwrap(), None);

        assert!(paste.execute(&mut wb).unwrap());
        assert_eq!(wb.value(0, 2, 1).unwrap(), CellData::Number(4.0));
        assert!(!PasteCommand::new(Clipboard::new(), 0, at("A1"))
            .execute(&mut wb)
            .unwrap());
    }
}
