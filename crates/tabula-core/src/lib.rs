//! # tabula-core
//!
//! Core data structures for the tabula formula engine.
//!
//! This crate provides the fundamental types used throughout tabula:
//! - [`CellData`] and [`CellError`] - Evaluated cell values, errors included
//! - [`CellRef`] and [`RangeRef`] - A1 addressing with absolute/relative axes
//! - [`Cell`] - Raw input, cached value and style of a stored cell
//! - [`Worksheet`] - A named, bounded grid of cells
//! - [`RangeView`] - A lazy, borrowed view over a rectangle of a worksheet
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{Cell, CellData, Worksheet};
//!
//! let mut sheet = Worksheet::new("Sheet1", 100, 26);
//! sheet.set_cell(0, 0, Cell::new(CellData::Number(42.0))).unwrap();
//!
//! assert_eq!(sheet.value_a1("A1").unwrap(), CellData::Number(42.0));
//! assert!(sheet.cell_a1("AA1").is_err());
//! ```

pub mod cell;
pub mod date;
pub mod error;
pub mod range;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{
    format_number, parse_number, Cell, CellData, CellError, CellRef, CellStorage, RangeCells,
    RangeRef,
};
pub use error::{Error, Result};
pub use range::RangeView;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
