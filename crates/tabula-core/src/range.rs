//! Read-only views over a rectangle of a worksheet

use crate::cell::{CellData, CellRef, RangeRef};
use crate::worksheet::Worksheet;

static EMPTY: CellData = CellData::Empty;

/// A borrowed view of a range of cells in a worksheet
///
/// Positions passed to the view are offsets from the range's top-left
/// corner. Nothing is copied: values are read from the worksheet on demand.
#[derive(Debug, Clone, Copy)]
pub struct RangeView<'a> {
    worksheet: &'a Worksheet,
    range: RangeRef,
}

impl<'a> RangeView<'a> {
    /// Create a view over `range`
    pub fn new(worksheet: &'a Worksheet, range: RangeRef) -> Self {
        Self { worksheet, range }
    }

    /// The underlying worksheet
    pub fn worksheet(&self) -> &'a Worksheet {
        self.worksheet
    }

    /// The range as written
    pub fn range(&self) -> RangeRef {
        self.range
    }

    /// Number of rows covered
    pub fn row_count(&self) -> u32 {
        self.range.row_count()
    }

    /// Number of columns covered
    pub fn col_count(&self) -> u16 {
        self.range.col_count()
    }

    /// Total number of cells covered
    pub fn cell_count(&self) -> u64 {
        self.range.cell_count()
    }

    /// Absolute position of an offset inside the range
    pub fn absolute(&self, row: u32, col: u16) -> CellRef {
        CellRef::new(self.range.first_row() + row, self.range.first_col() + col)
    }

    /// Value at an offset (Empty for unset cells or offsets outside the range)
    pub fn value(&self, row: u32, col: u16) -> &'a CellData {
        if row >= self.row_count() || col >= self.col_count() {
            return &EMPTY;
        }
        let at = self.absolute(row, col);
        self.worksheet.value_ref(at.row, at.col).unwrap_or(&EMPTY)
    }

    /// Lazily iterate over (position, value) row by row
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &'a CellData)> + 'a {
        let worksheet = self.worksheet;
        self.range
            .cells()
            .map(move |at| (at, worksheet.value_ref(at.row, at.col).unwrap_or(&EMPTY)))
    }

    /// Lazily iterate over values row by row
    pub fn values(&self) -> impl Iterator<Item = &'a CellData> + 'a {
        self.cells().map(|(_, v)| v)
    }

    /// Values of one row of the range (offset-based)
    pub fn row_values(&self, row: u32) -> impl Iterator<Item = &'a CellData> + 'a {
        let view = *self;
        (0..self.col_count()).map(move |c| view.value(row, c))
    }

    /// Values of one column of the range (offset-based)
    pub fn col_values(&self, col: u16) -> impl Iterator<Item = &'a CellData> + 'a {
        let view = *self;
        (0..self.row_count()).map(move |r| view.value(r, col))
    }

    /// Check if an absolute row of the worksheet is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.worksheet.is_row_hidden(row)
    }

    /// Formula text at an absolute position
    pub fn formula_at(&self, at: CellRef) -> Option<&'a str> {
        self.worksheet.formula(at.row, at.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use pretty_assertions::assert_eq;

    fn sheet() -> Worksheet {
        let mut ws = Worksheet::new("Sheet1", 10, 10);
        ws.set_cell(0, 0, Cell::new(1.0.into())).unwrap();
        ws.set_cell(0, 1, Cell::new("a".into())).unwrap();
        ws.set_cell(1, 1, Cell::new(2.0.into())).unwrap();
        ws
    }

    #[test]
    fn test_offsets_follow_top_left() {
        let ws = sheet();
        let view = RangeView::new(&ws, RangeRef::parse("B2:A1").unwrap());
        assert_eq!(view.value(0, 0), &CellData::Number(1.0));
        assert_eq!(view.value(1, 1), &CellData::Number(2.0));
        assert_eq!(view.value(1, 0), &CellData::Empty);
        assert_eq!(view.value(5, 5), &CellData::Empty);
    }

    #[test]
    fn test_row_major_values() {
        let ws = sheet();
        let view = RangeView::new(&ws, RangeRef::parse("A1:B2").unwrap());
        let values: Vec<_> = view.values().cloned().collect();
        assert_eq!(
            values,
            vec![
                CellData::Number(1.0),
                CellData::text("a"),
                CellData::Empty,
                CellData::Number(2.0),
            ]
        );
        let col: Vec<_> = view.col_values(1).cloned().collect();
        assert_eq!(col, vec![CellData::text("a"), CellData::Number(2.0)]);
    }
}
