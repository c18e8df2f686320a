//! Worksheet storage type

use crate::cell::{Cell, CellData, CellRef, CellStorage, RangeRef};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A bounded grid of cells with a name
///
/// The grid has a fixed `row_count x column_count` size that changes only
/// through structural edits. Direct access outside the grid is an `Err`;
/// formula evaluation turns the same situation into `#REF!` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    row_count: u32,
    column_count: u16,
    cells: CellStorage,
}

impl Worksheet {
    /// Create a worksheet with the given name and dimensions
    pub fn new<S: Into<String>>(name: S, row_count: u32, column_count: u16) -> Self {
        Self {
            name: name.into(),
            row_count: row_count.clamp(1, MAX_ROWS),
            column_count: column_count.clamp(1, MAX_COLS),
            cells: CellStorage::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name (the workbook validates uniqueness)
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Number of rows in the grid
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Number of columns in the grid
    pub fn column_count(&self) -> u16 {
        self.column_count
    }

    /// Check that a position lies inside the grid
    pub fn validate_cell_position(&self, row: u32, col: u16) -> Result<()> {
        if row >= self.row_count {
            return Err(Error::RowOutOfBounds(row, self.row_count.saturating_sub(1)));
        }
        if col >= self.column_count {
            return Err(Error::ColumnOutOfBounds(col, self.column_count.saturating_sub(1)));
        }
        Ok(())
    }

    /// Check if a position lies inside the grid
    pub fn in_bounds(&self, row: u32, col: u16) -> bool {
        row < self.row_count && col < self.column_count
    }

    /// Check if every cell of a range lies inside the grid
    pub fn contains_range(&self, range: &RangeRef) -> bool {
        self.in_bounds(range.last_row(), range.last_col())
    }

    // === Cell Access ===

    /// Get a stored cell by indices
    pub fn cell(&self, row: u32, col: u16) -> Result<Option<&Cell>> {
        self.validate_cell_position(row, col)?;
        Ok(self.cells.get(row, col))
    }

    /// Get a stored cell by A1 address
    pub fn cell_a1(&self, address: &str) -> Result<Option<&Cell>> {
        let r = CellRef::parse(address)?;
        self.cell(r.row, r.col)
    }

    /// Get a mutable cell, creating it on first access
    pub fn cell_mut(&mut self, row: u32, col: u16) -> Result<&mut Cell> {
        self.validate_cell_position(row, col)?;
        Ok(self.cells.get_or_create(row, col))
    }

    /// Get a mutable cell by A1 address, creating it on first access
    pub fn cell_mut_a1(&mut self, address: &str) -> Result<&mut Cell> {
        let r = CellRef::parse(address)?;
        self.cell_mut(r.row, r.col)
    }

    /// Get a cell's value (Empty when nothing is stored)
    pub fn value(&self, row: u32, col: u16) -> Result<CellData> {
        Ok(self
            .cell(row, col)?
            .map(|c| c.value.clone())
            .unwrap_or_default())
    }

    /// Get a cell's value by A1 address
    pub fn value_a1(&self, address: &str) -> Result<CellData> {
        let r = CellRef::parse(address)?;
        self.value(r.row, r.col)
    }

    /// Borrow a cell's value without bounds checking
    pub fn value_ref(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col).map(|c| &c.value)
    }

    /// Formula text of a cell, if it holds one
    pub fn formula(&self, row: u32, col: u16) -> Option<&str> {
        self.cells.get(row, col).and_then(|c| c.formula.as_deref())
    }

    /// Style index of a cell (0 when nothing is stored)
    pub fn style_index(&self, row: u32, col: u16) -> u32 {
        self.cells.get(row, col).map(|c| c.style_index).unwrap_or(0)
    }

    // === Cell Modification ===

    /// Replace a cell wholesale
    pub fn set_cell(&mut self, row: u32, col: u16, cell: Cell) -> Result<()> {
        self.validate_cell_position(row, col)?;
        self.cells.set(row, col, cell);
        Ok(())
    }

    /// Remove a cell, returning what was stored
    pub fn take_cell(&mut self, row: u32, col: u16) -> Result<Option<Cell>> {
        self.validate_cell_position(row, col)?;
        Ok(self.cells.remove(row, col))
    }

    /// Store the cached result of a formula cell
    pub fn set_cached_value(&mut self, row: u32, col: u16, value: CellData) {
        if let Some(cell) = self.cells.get_mut(row, col) {
            cell.value = value;
        }
    }

    /// Set the style index of a cell
    pub fn set_style_index(&mut self, row: u32, col: u16, style_index: u32) -> Result<()> {
        self.cell_mut(row, col)?.style_index = style_index;
        Ok(())
    }

    // === Iteration ===

    /// Iterate over stored cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16, &Cell)> {
        self.cells.iter()
    }

    /// Iterate over formula cells with their text
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells
            .iter()
            .filter_map(|(r, c, cell)| cell.formula.as_deref().map(|f| (r, c, f)))
    }

    /// Smallest range covering every stored cell
    pub fn used_range(&self) -> Option<RangeRef> {
        let (r0, c0, r1, c1) = self.cells.used_bounds()?;
        Some(RangeRef::from_indices(r0, c0, r1, c1))
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    // === Row visibility ===

    /// Check if a row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.cells.is_row_hidden(row)
    }

    /// Hide or unhide a row
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) -> Result<()> {
        if row >= self.row_count {
            return Err(Error::RowOutOfBounds(row, self.row_count.saturating_sub(1)));
        }
        self.cells.set_row_hidden(row, hidden);
        Ok(())
    }

    /// Hidden rows in ascending order
    pub fn hidden_rows(&self) -> impl Iterator<Item = u32> + '_ {
        self.cells.hidden_rows()
    }

    // === Structural edits ===
    //
    // These shift storage and dimensions only. Rewriting formulas that
    // point at shifted cells is the caller's job.

    /// Insert `count` empty rows before row `at`
    pub fn insert_rows(&mut self, at: u32, count: u32) -> Result<()> {
        if at > self.row_count {
            return Err(Error::RowOutOfBounds(at, self.row_count));
        }
        let new_count = self.row_count as u64 + count as u64;
        if new_count > MAX_ROWS as u64 {
            return Err(Error::RowOutOfBounds(new_count as u32, MAX_ROWS));
        }
        self.cells.insert_rows(at, count);
        self.row_count = new_count as u32;
        Ok(())
    }

    /// Delete rows `at..at + count`
    pub fn delete_rows(&mut self, at: u32, count: u32) -> Result<()> {
        let end = at as u64 + count as u64;
        if count == 0 || end > self.row_count as u64 {
            return Err(Error::InvalidRange(format!(
                "cannot delete rows {}..{} of {}",
                at, end, self.row_count
            )));
        }
        if count >= self.row_count {
            return Err(Error::InvalidRange("cannot delete every row".into()));
        }
        self.cells.delete_rows(at, count);
        self.row_count -= count;
        Ok(())
    }

    /// Insert `count` empty columns before column `at`
    pub fn insert_columns(&mut self, at: u16, count: u16) -> Result<()> {
        if at > self.column_count {
            return Err(Error::ColumnOutOfBounds(at, self.column_count));
        }
        let new_count = self.column_count as u32 + count as u32;
        if new_count > MAX_COLS as u32 {
            return Err(Error::ColumnOutOfBounds(MAX_COLS, MAX_COLS - 1));
        }
        self.cells.insert_columns(at, count);
        self.column_count = new_count as u16;
        Ok(())
    }

    /// Delete columns `at..at + count`
    pub fn delete_columns(&mut self, at: u16, count: u16) -> Result<()> {
        let end = at as u32 + count as u32;
        if count == 0 || end > self.column_count as u32 {
            return Err(Error::InvalidRange(format!(
                "cannot delete columns {}..{} of {}",
                at, end, self.column_count
            )));
        }
        if count >= self.column_count {
            return Err(Error::InvalidRange("cannot delete every column".into()));
        }
        self.cells.delete_columns(at, count);
        self.column_count -= count;
        Ok(())
    }
}
