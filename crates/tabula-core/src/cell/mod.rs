//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellData`] - The evaluated value of a cell
//! - [`CellRef`] - A cell's location (e.g., "A1", "$B$2")
//! - [`RangeRef`] - A rectangle of cells (e.g., "A1:B10")
//! - [`Cell`] - Raw contents, cached value and style of a stored cell

mod address;
mod storage;
mod value;

pub use address::{CellRef, RangeCells, RangeRef};
pub use storage::{Cell, CellStorage};
pub use value::{format_number, parse_number, CellData, CellError};
