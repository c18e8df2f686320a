//! Sparse cell storage
//!
//! Only cells that were touched are stored, in a row-based BTreeMap. Rows
//! and columns can be shifted in place for structural edits.

use std::collections::{BTreeMap, BTreeSet};

use super::CellData;

/// A single stored cell
///
/// Holds the raw input (formula text for formula cells), the cached
/// evaluated value and an opaque style index owned by the presentation
/// layer.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    /// Formula text including the leading `=`, if this is a formula cell
    pub formula: Option<String>,
    /// Literal value, or the cached result for formula cells
    pub value: CellData,
    /// Index into the caller's style table (0 = default style)
    pub style_index: u32,
}

impl Cell {
    /// Create a literal cell
    pub fn new(value: CellData) -> Self {
        Self {
            formula: None,
            value,
            style_index: 0,
        }
    }

    /// Create a formula cell with no cached value yet
    pub fn formula<S: Into<String>>(text: S) -> Self {
        Self {
            formula: Some(text.into()),
            value: CellData::Empty,
            style_index: 0,
        }
    }

    /// Check if the cell holds a formula
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Check if the cell carries nothing worth storing
    pub fn is_blank(&self) -> bool {
        self.formula.is_none() && self.value.is_empty() && self.style_index == 0
    }

    /// The raw contents as a user would type them
    pub fn input_text(&self) -> String {
        match &self.formula {
            Some(f) => f.clone(),
            None => self.value.display_text(),
        }
    }
}

/// Sparse storage for one sheet's cells and row flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStorage {
    rows: BTreeMap<u32, BTreeMap<u16, Cell>>,
    hidden_rows: BTreeSet<u32>,
}

impl CellStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&Cell> {
        self.rows.get(&row)?.get(&col)
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut Cell> {
        self.rows.get_mut(&row)?.get_mut(&col)
    }

    /// Get a cell, creating an empty one on first access
    pub fn get_or_create(&mut self, row: u32, col: u16) -> &mut Cell {
        self.rows.entry(row).or_default().entry(col).or_default()
    }

    /// Store a cell (blank cells are removed instead)
    pub fn set(&mut self, row: u32, col: u16, cell: Cell) {
        if cell.is_blank() {
            self.remove(row, col);
        } else {
            self.rows.entry(row).or_default().insert(col, cell);
        }
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<Cell> {
        let row_map = self.rows.get_mut(&row)?;
        let cell = row_map.remove(&col);
        if row_map.is_empty() {
            self.rows.remove(&row);
        }
        cell
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over stored cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &Cell)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, cell)| (row, col, cell)))
    }

    /// Iterate over the stored cells of one row
    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &Cell)> {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(&col, cell)| (col, cell)))
    }

    /// Bounds of stored cells as (min_row, min_col, max_row, max_col)
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;
        let mut min_col = u16::MAX;
        let mut max_col = 0;
        for cols in self.rows.values() {
            if let (Some(first), Some(last)) = (cols.keys().next(), cols.keys().next_back()) {
                min_col = min_col.min(*first);
                max_col = max_col.max(*last);
            }
        }
        Some((min_row, min_col, max_row, max_col))
    }

    /// Check if a row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.hidden_rows.contains(&row)
    }

    /// Hide or unhide a row
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        if hidden {
            self.hidden_rows.insert(row);
        } else {
            self.hidden_rows.remove(&row);
        }
    }

    /// Hidden row indices in ascending order
    pub fn hidden_rows(&self) -> impl Iterator<Item = u32> + '_ {
        self.hidden_rows.iter().copied()
    }

    // === Structural shifts ===

    /// Move rows `>= at` down by `count`
    pub fn insert_rows(&mut self, at: u32, count: u32) {
        let moved = self.rows.split_off(&at);
        for (row, cols) in moved {
            self.rows.insert(row + count, cols);
        }
        let hidden = self.hidden_rows.split_off(&at);
        self.hidden_rows.extend(hidden.into_iter().map(|r| r + count));
    }

    /// Remove rows `at..at + count` and move the rows below up
    pub fn delete_rows(&mut self, at: u32, count: u32) {
        let mut tail = self.rows.split_off(&at);
        let below = tail.split_off(&at.saturating_add(count));
        for (row, cols) in below {
            self.rows.insert(row - count, cols);
        }
        let mut hidden_tail = self.hidden_rows.split_off(&at);
        let hidden_below = hidden_tail.split_off(&at.saturating_add(count));
        self.hidden_rows
            .extend(hidden_below.into_iter().map(|r| r - count));
    }

    /// Move columns `>= at` right by `count`
    pub fn insert_columns(&mut self, at: u16, count: u16) {
        for cols in self.rows.values_mut() {
            let moved = cols.split_off(&at);
            for (col, cell) in moved {
                cols.insert(col + count, cell);
            }
        }
    }

    /// Remove columns `at..at + count` and move the columns to the right left
    pub fn delete_columns(&mut self, at: u16, count: u16) {
        for cols in self.rows.values_mut() {
            let mut tail = cols.split_off(&at);
            let right = tail.split_off(&at.saturating_add(count));
            for (col, cell) in right {
                cols.insert(col - count, cell);
            }
        }
        self.rows.retain(|_, cols| !cols.is_empty());
    }
}
