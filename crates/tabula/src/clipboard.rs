//! Copy, cut and paste of cell ranges
//!
//! The clipboard holds a snapshot of the source cells taken at copy time.
//! Pasting a copy shifts relative references by the distance between
//! source and destination; pasting a cut moves contents verbatim and
//! clears the source.

use tabula_core::{Cell, CellRef, Error, RangeRef, Result};
use tabula_formula::{CellKey, FormulaAdjustment};
use tracing::debug;

use crate::workbook::Workbook;

/// How the clipboard was filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardMode {
    Copy,
    Cut,
}

#[derive(Debug, Clone)]
struct Content {
    mode: ClipboardMode,
    sheet: usize,
    source: RangeRef,
    /// Stored cells, keyed by offset from the source's top-left corner
    cells: Vec<(u32, u16, Cell)>,
}

/// Snapshot of a copied or cut range
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    content: Option<Content>,
}

impl Clipboard {
    /// Create an empty clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a range
    pub fn copy(&mut self, workbook: &Workbook, sheet: usize, range: RangeRef) -> Result<()> {
        self.fill(workbook, sheet, range, ClipboardMode::Copy)
    }

    /// Cut a range; the source is cleared by the next paste
    pub fn cut(&mut self, workbook: &Workbook, sheet: usize, range: RangeRef) -> Result<()> {
        self.fill(workbook, sheet, range, ClipboardMode::Cut)
    }

    /// Check if there is nothing to paste
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    /// How the clipboard was filled, if it holds anything
    pub fn mode(&self) -> Option<ClipboardMode> {
        self.content.as_ref().map(|c| c.mode)
    }

    /// Sheet and range the content came from
    pub fn source(&self) -> Option<(usize, RangeRef)> {
        self.content.as_ref().map(|c| (c.sheet, c.source))
    }

    /// Empty the clipboard
    pub fn clear(&mut self) {
        self.content = None;
    }

    /// Paste at `at` on `sheet`
    ///
    /// A cut can only be pasted once; the clipboard is emptied afterwards.
    pub fn paste(&mut self, workbook: &mut Workbook, sheet: usize, at: CellRef) -> Result<Option<RangeRef>> {
        let pasted = workbook.paste_range(self, sheet, at)?;
        if self.mode() == Some(ClipboardMode::Cut) {
            self.clear();
        }
        Ok(pasted)
    }

    fn fill(&mut self, workbook: &Workbook, sheet: usize, range: RangeRef, mode: ClipboardMode) -> Result<()> {
        let ws = workbook
            .worksheet(sheet)
            .ok_or(Error::SheetOutOfBounds(sheet, workbook.sheet_count()))?;
        if !ws.contains_range(&range) {
            return Err(Error::InvalidRange(range.to_a1_string()));
        }

        let (top, left) = (range.first_row(), range.first_col());
        let cells = ws
            .cells()
            .filter(|(row, col, _)| range.contains(*row, *col))
            .map(|(row, col, cell)| (row - top, col - left, cell.clone()))
            .collect();

        self.content = Some(Content {
            mode,
            sheet,
            source: range,
            cells,
        });
        Ok(())
    }
}

impl Workbook {
    /// Paste clipboard content with its top-left corner at `at`
    ///
    /// Every cell of the destination rectangle is replaced, blanks
    /// included. Returns the destination range, or `None` for an empty
    /// clipboard. The clipboard itself is left untouched.
    pub fn paste_range(&mut self, clipboard: &Clipboard, sheet: usize, at: CellRef) -> Result<Option<RangeRef>> {
        let Some(content) = &clipboard.content else {
            return Ok(None);
        };
        self.check_sheet(sheet)?;

        let source = content.source;
        let bottom = at.row as u64 + source.row_count() as u64 - 1;
        let right = at.col as u64 + source.col_count() as u64 - 1;
        let ws = &self.sheets[sheet];
        if bottom >= ws.row_count() as u64 || right >= ws.column_count() as u64 {
            return Err(Error::InvalidRange(format!(
                "paste at {} does not fit sheet '{}'",
                at.to_a1_string(),
                ws.name()
            )));
        }
        let dest = RangeRef::from_indices(at.row, at.col, bottom as u32, right as u16);

        let mut touched = Vec::new();
        if content.mode == ClipboardMode::Cut {
            self.check_sheet(content.sheet)?;
            touched.extend(self.stored_in(content.sheet, &source));
        }
        touched.extend(self.stored_in(sheet, &dest));
        for &key in &touched {
            self.put_cell(key.sheet, key.row, key.col, None)?;
        }

        let row_delta = at.row as i64 - source.first_row() as i64;
        let col_delta = at.col as i64 - source.first_col() as i64;
        for (dr, dc, cell) in &content.cells {
            let mut cell = cell.clone();
            if content.mode == ClipboardMode::Copy {
                if let Some(formula) = &cell.formula {
                    cell.formula = Some(FormulaAdjustment::adjust_relative(formula, row_delta, col_delta));
                }
            }
            let (row, col) = (at.row + dr, at.col + dc);
            self.put_cell(sheet, row, col, Some(cell))?;
            touched.push(CellKey::new(sheet, row, col));
        }

        debug!(
            mode = ?content.mode,
            from = %source.to_a1_string(),
            to = %dest.to_a1_string(),
            cells = content.cells.len(),
            "pasted range"
        );
        self.recalculate(touched);
        Ok(Some(dest))
    }

    /// Keys of the stored cells inside a range
    fn stored_in(&self, sheet: usize, range: &RangeRef) -> Vec<CellKey> {
        self.sheets[sheet]
            .cells()
            .filter(|(row, col, _)| range.contains(*row, *col))
            .map(|(row, col, _)| CellKey::new(sheet, row, col))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::CellData;

    fn at(address: &str) -> CellRef {
        CellRef::parse(address).unwrap()
    }

    fn range(text: &str) -> RangeRef {
        RangeRef::parse(text).unwrap()
    }

    #[test]
    fn test_copy_adjusts_relative_references() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "2").unwrap();
        wb.set_input(0, 1, 0, "3").unwrap();
        wb.set_input(0, 0, 1, "=A1*$A$1").unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.copy(&wb, 0, range("B1")).unwrap();
        let dest = clipboard.paste(&mut wb, 0, at("B2")).unwrap();

        assert_eq!(dest, Some(range("B2")));
        assert_eq!(wb.formula(0, 1, 1).unwrap(), Some("=A2*$A$1"));
        assert_eq!(wb.value(0, 1, 1).unwrap(), CellData::Number(6.0));
        assert_eq!(clipboard.mode(), Some(ClipboardMode::Copy));
        assert_eq!(wb.formula(0, 0, 1).unwrap(), Some("=A1*$A$1"));
    }

    #[test]
    fn test_copy_off_grid_becomes_ref_error() {
        let mut wb = Workbook::new();
        wb.set_input(0, 1, 1, "=A1").unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.copy(&wb, 0, range("B2")).unwrap();
        clipboard.paste(&mut wb, 0, at("A1")).unwrap();
        assert_eq!(wb.formula(0, 0, 0).unwrap(), Some("=#REF!"));
    }

    #[test]
    fn test_cut_moves_verbatim_and_clears_source() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "4").unwrap();
        wb.set_input(0, 0, 1, "=A1+1").unwrap();
        wb.set_style_index(0, 0, 1, 7).unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.cut(&wb, 0, range("A1:B1")).unwrap();
        clipboard.paste(&mut wb, 0, at("C5")).unwrap();

        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.cell(0, 0).unwrap(), None);
        assert_eq!(ws.cell(0, 1).unwrap(), None);
        assert_eq!(ws.formula(4, 3), Some("=A1+1"));
        assert_eq!(ws.style_index(4, 3), 7);
        // Verbatim: still reads A1, which is now empty
        assert_eq!(ws.value(4, 3).unwrap(), CellData::Number(1.0));
        assert!(clipboard.is_empty());
    }

    #[test]
    fn test_paste_replaces_destination_blanks() {
        let mut wb = Workbook::new();
        wb.set_input(0, 0, 0, "1").unwrap();
        wb.set_input(0, 5, 1, "old").unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.copy(&wb, 0, range("A1:B1")).unwrap();
        clipboard.paste(&mut wb, 0, at("A6")).unwrap();

        assert_eq!(wb.value(0, 5, 0).unwrap(), CellData::Number(1.0));
        assert_eq!(wb.value(0, 5, 1).unwrap(), CellData::Empty);
    }

    #[test]
    fn test_paste_bounds_and_empty_clipboard() {
        let mut wb = Workbook::new();
        let mut clipboard = Clipboard::new();
        assert_eq!(clipboard.paste(&mut wb, 0, at("A1")).unwrap(), None);

        clipboard.copy(&wb, 0, range("A1:C3")).unwrap();
        assert!(matches!(
            clipboard.paste(&mut wb, 0, at("Y1")),
            Err(Error::InvalidRange(_))
        ));
        assert!(clipboard.copy(&wb, 0, range("A1:A1001")).is_err());
    }
}
