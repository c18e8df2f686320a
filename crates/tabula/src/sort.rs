//! Range sorting
//!
//! Sorting moves raw cell contents (formula text included) verbatim, then
//! re-registers the moved cells at their new positions and recalculates
//! them in one pass.

use std::cmp::Ordering;

use tabula_core::{Cell, CellData, Error, RangeRef, Result};
use tabula_formula::{compare_values, CellKey};
use tracing::debug;

use crate::workbook::Workbook;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One row (or column) of the range being sorted
struct Record {
    key: CellData,
    cells: Vec<Option<Cell>>,
}

fn is_blank(value: &CellData) -> bool {
    match value {
        CellData::Empty => true,
        CellData::Text(s) => s.is_empty(),
        _ => false,
    }
}

/// Blanks go last in both directions; everything else follows the
/// comparison operators (numbers, then text, then booleans)
fn compare_keys(a: &CellData, b: &CellData, order: SortOrder) -> Ordering {
    match (is_blank(a), is_blank(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = compare_values(a, b);
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        }
    }
}

impl Workbook {
    /// Sort the rows of `range` by the values in absolute column
    /// `key_index`, keeping each row's cells together
    ///
    /// With `skip_header_row` the first row stays in place. A single-row
    /// range sorts its columns by their own values instead, and ignores
    /// `key_index` and `skip_header_row`. The sort is stable.
    ///
    /// Returns `false` when there were fewer than two rows to order.
    pub fn sort(
        &mut self,
        sheet: usize,
        range: RangeRef,
        order: SortOrder,
        key_index: u16,
        skip_header_row: bool,
    ) -> Result<bool> {
        self.check_sheet(sheet)?;
        if !self.sheets[sheet].contains_range(&range) {
            return Err(Error::InvalidRange(format!(
                "{} is outside sheet '{}'",
                range.to_a1_string(),
                self.sheets[sheet].name()
            )));
        }

        let slots: Vec<Vec<(u32, u16)>> = if range.row_count() == 1 {
            let row = range.first_row();
            (range.first_col()..=range.last_col())
                .map(|col| vec![(row, col)])
                .collect()
        } else {
            if !(range.first_col()..=range.last_col()).contains(&key_index) {
                return Err(Error::InvalidRange(format!(
                    "sort key column {} is outside {}",
                    key_index,
                    range.to_a1_string()
                )));
            }
            let first = range.first_row() + u32::from(skip_header_row);
            (first..=range.last_row())
                .map(|row| {
                    (range.first_col()..=range.last_col())
                        .map(|col| (row, col))
                        .collect()
                })
                .collect()
        };
        if slots.len() < 2 {
            return Ok(false);
        }

        let ws = &mut self.sheets[sheet];
        let mut records = Vec::with_capacity(slots.len());
        for slot in &slots {
            let key = match slot.iter().find(|(_, col)| slot.len() == 1 || *col == key_index) {
                Some(&(row, col)) => ws.value(row, col)?,
                None => CellData::Empty,
            };
            let mut cells = Vec::with_capacity(slot.len());
            for &(row, col) in slot {
                cells.push(ws.take_cell(row, col)?);
            }
            records.push(Record { key, cells });
        }

        // sort_by is stable
        records.sort_by(|a, b| compare_keys(&a.key, &b.key, order));

        let mut moved = Vec::new();
        for (slot, record) in slots.iter().zip(records) {
            for (&(row, col), cell) in slot.iter().zip(record.cells) {
                self.put_cell(sheet, row, col, cell)?;
                moved.push(CellKey::new(sheet, row, col));
            }
        }

        debug!(
            sheet = self.sheets[sheet].name(),
            range = %range.to_a1_string(),
            ?order,
            records = slots.len(),
            "sorted range"
        );
        self.recalculate(moved);
        Ok(true)
    }
}
