//! Cell reference and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell reference (e.g., "A1", "$B$2")
///
/// Column letters and row numbers follow A1 notation. A `$` before either
/// axis makes that axis absolute: it survives copy/paste and structural
/// edits unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRef {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellRef {
    /// Create a new cell reference with relative axes
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a cell reference with explicit absolute/relative flags
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Create a fully absolute reference ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self::with_absolute(row, col, true, true)
    }

    /// Parse a cell reference from A1-style notation (case-insensitive)
    ///
    /// # Examples
    /// ```
    /// use tabula_core::CellRef;
    ///
    /// let r = CellRef::parse("a1").unwrap();
    /// assert_eq!((r.row, r.col), (0, 0));
    ///
    /// let r = CellRef::parse("$B$2").unwrap();
    /// assert_eq!((r.row, r.col), (1, 1));
    /// assert!(r.row_absolute && r.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = bytes.first() == Some(&b'$');
        if col_absolute {
            pos += 1;
        }

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }
        let col = Self::letters_to_column(&s[col_start..pos])?;

        let row_absolute = bytes.get(pos) == Some(&b'$');
        if row_absolute {
            pos += 1;
        }

        let row_str = &s[pos..];
        if row_str.is_empty() || !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!("invalid row number in '{}'", s)));
        }
        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;
        if row == 0 {
            return Err(Error::InvalidAddress(format!("row number must be >= 1 in '{}'", s)));
        }
        let row = row - 1;
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert a column index to letters (0 = A, 25 = Z, 26 = AA)
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::with_capacity(3);
        let mut n = col as u32 + 1;
        while n > 0 {
            n -= 1;
            letters.push((n % 26) as u8 + b'A');
            n /= 26;
        }
        letters.iter().rev().map(|&b| b as char).collect()
    }

    /// Convert column letters to an index (A = 0, Z = 25, AA = 26)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }
        // "XFD" is the widest valid column; anything longer overflows
        if letters.len() > 3 {
            return Err(Error::InvalidAddress(format!("column '{}' too wide", letters)));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!("invalid column letter '{}'", c)));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        let col = col - 1;
        if col >= MAX_COLS as u32 {
            return Err(Error::ColumnOutOfBounds(col.min(u16::MAX as u32) as u16, MAX_COLS - 1));
        }
        Ok(col as u16)
    }

    /// Format as an A1-style string, keeping `$` markers
    pub fn to_a1_string(&self) -> String {
        let mut out = String::with_capacity(8);
        if self.col_absolute {
            out.push('$');
        }
        out.push_str(&Self::column_to_letters(self.col));
        if self.row_absolute {
            out.push('$');
        }
        out.push_str(&(self.row + 1).to_string());
        out
    }

    /// Same position with both axes relative
    pub fn to_relative(self) -> Self {
        Self::new(self.row, self.col)
    }

    /// Create a range from this reference to another, preserving order
    pub fn to(&self, other: CellRef) -> RangeRef {
        RangeRef::new(*self, other)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10")
///
/// The corners are kept exactly as written: `B3:A1` stays `B3:A1`. Use
/// [`RangeRef::top_left`] and [`RangeRef::bottom_right`] for the covered
/// rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeRef {
    /// First corner as written
    pub start: CellRef,
    /// Second corner as written
    pub end: CellRef,
}

impl RangeRef {
    /// Create a new range without reordering the corners
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self { start, end }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellRef::new(start_row, start_col),
            CellRef::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(cell: CellRef) -> Self {
        Self::new(cell, cell)
    }

    /// Parse a range from A1:B10 notation (a lone reference is a 1x1 range)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((start, end)) => Ok(Self::new(CellRef::parse(start)?, CellRef::parse(end)?)),
            None => Ok(Self::single(CellRef::parse(s)?)),
        }
    }

    /// Top row covered by the range
    pub fn first_row(&self) -> u32 {
        self.start.row.min(self.end.row)
    }

    /// Bottom row covered by the range
    pub fn last_row(&self) -> u32 {
        self.start.row.max(self.end.row)
    }

    /// Leftmost column covered by the range
    pub fn first_col(&self) -> u16 {
        self.start.col.min(self.end.col)
    }

    /// Rightmost column covered by the range
    pub fn last_col(&self) -> u16 {
        self.start.col.max(self.end.col)
    }

    /// Top-left corner of the covered rectangle (relative)
    pub fn top_left(&self) -> CellRef {
        CellRef::new(self.first_row(), self.first_col())
    }

    /// Bottom-right corner of the covered rectangle (relative)
    pub fn bottom_right(&self) -> CellRef {
        CellRef::new(self.last_row(), self.last_col())
    }

    /// Check if a position is inside the covered rectangle
    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.first_row()
            && row <= self.last_row()
            && col >= self.first_col()
            && col <= self.last_col()
    }

    /// Number of rows covered
    pub fn row_count(&self) -> u32 {
        self.last_row() - self.first_row() + 1
    }

    /// Number of columns covered
    pub fn col_count(&self) -> u16 {
        self.last_col() - self.first_col() + 1
    }

    /// Total number of cells covered
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Lazily iterate over every covered position, row by row
    pub fn cells(&self) -> RangeCells {
        RangeCells {
            first_col: self.first_col(),
            last_col: self.last_col(),
            last_row: self.last_row(),
            row: self.first_row(),
            col: self.first_col(),
            remaining: self.cell_count(),
        }
    }

    /// Format as A1:B10 (a 1x1 range prints as a single reference)
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start, self.end)
        }
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for RangeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Row-major iterator over the positions of a [`RangeRef`]
#[derive(Debug, Clone)]
pub struct RangeCells {
    first_col: u16,
    last_col: u16,
    last_row: u32,
    row: u32,
    col: u16,
    remaining: u64,
}

impl Iterator for RangeCells {
    type Item = CellRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let cell = CellRef::new(self.row, self.col);
        self.remaining -= 1;

        if self.col == self.last_col {
            self.col = self.first_col;
            if self.row < self.last_row {
                self.row += 1;
            }
        } else {
            self.col += 1;
        }
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for RangeCells {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(CellRef::column_to_letters(0), "A");
        assert_eq!(CellRef::column_to_letters(25), "Z");
        assert_eq!(CellRef::column_to_letters(26), "AA");
        assert_eq!(CellRef::column_to_letters(701), "ZZ");
        assert_eq!(CellRef::column_to_letters(702), "AAA");
        assert_eq!(CellRef::column_to_letters(16383), "XFD");
    }

    #[test]
    fn test_letters_to_column() {
        assert_eq!(CellRef::letters_to_column("A").unwrap(), 0);
        assert_eq!(CellRef::letters_to_column("AB").unwrap(), 27);
        assert_eq!(CellRef::letters_to_column("xfd").unwrap(), 16383);
        assert!(CellRef::letters_to_column("XFE").is_err());
        assert!(CellRef::letters_to_column("ABCD").is_err());
    }

    #[test]
    fn test_parse_case_insensitive_and_absolute() {
        assert_eq!(CellRef::parse("a1").unwrap(), CellRef::new(0, 0));
        assert_eq!(CellRef::parse("aa10").unwrap(), CellRef::new(9, 26));

        let r = CellRef::parse("$C5").unwrap();
        assert!(r.col_absolute);
        assert!(!r.row_absolute);

        let r = CellRef::parse("C$5").unwrap();
        assert!(!r.col_absolute);
        assert!(r.row_absolute);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "A", "1", "A0", "A1B", "A-1", "A1048577", "1A"] {
            assert!(CellRef::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_display_uppercases() {
        assert_eq!(CellRef::parse("b7").unwrap().to_string(), "B7");
        assert_eq!(CellRef::absolute(0, 0).to_string(), "$A$1");
    }

    #[test]
    fn test_range_keeps_corner_order() {
        let range = RangeRef::parse("B3:A1").unwrap();
        assert_eq!(range.start, CellRef::new(2, 1));
        assert_eq!(range.end, CellRef::new(0, 0));
        assert_eq!(range.to_string(), "B3:A1");
        assert_eq!(range.top_left(), CellRef::new(0, 0));
        assert_eq!(range.bottom_right(), CellRef::new(2, 1));
        assert_eq!(range.row_count(), 3);
        assert_eq!(range.col_count(), 2);
    }

    #[test]
    fn test_range_cells_row_major() {
        let cells: Vec<_> = RangeRef::parse("B2:A1").unwrap().cells().collect();
        assert_eq!(
            cells,
            vec![
                CellRef::new(0, 0),
                CellRef::new(0, 1),
                CellRef::new(1, 0),
                CellRef::new(1, 1),
            ]
        );
    }

    #[test]
    fn test_range_cells_is_lazy_and_sized() {
        let range = RangeRef::parse("A1:XFD1048576").unwrap();
        let mut iter = range.cells();
        assert_eq!(iter.next(), Some(CellRef::new(0, 0)));
        assert_eq!(iter.next(), Some(CellRef::new(0, 1)));
        assert_eq!(iter.len() as u64, range.cell_count() - 2);
    }

    #[test]
    fn test_range_contains() {
        let range = RangeRef::parse("D4:B2").unwrap();
        assert!(range.contains(1, 1));
        assert!(range.contains(3, 3));
        assert!(!range.contains(0, 0));
        assert!(!range.contains(4, 1));
    }

    proptest! {
        #[test]
        fn prop_a1_round_trip(
            col in 0u16..MAX_COLS,
            row in 0u32..MAX_ROWS,
            col_abs: bool,
            row_abs: bool,
            lower: bool,
        ) {
            let text = CellRef::with_absolute(row, col, row_abs, col_abs).to_string();
            let typed = if lower { text.to_lowercase() } else { text.clone() };
            prop_assert_eq!(CellRef::parse(&typed).unwrap().to_string(), text);
        }
    }
}
