//! # tabula
//!
//! A spreadsheet formula engine that keeps every formula cell consistent
//! as its inputs change.
//!
//! ## Features
//!
//! - Excel-style formulas with cross-sheet references
//! - Incremental recalculation over a dependency graph
//! - Circular references resolve to `#CIRCULAR!` instead of looping
//! - Update batches that defer recalculation
//! - Row/column insertion and deletion with reference rewriting
//! - Sorting, filtering, copy/cut/paste and undoable commands
//!
//! ## Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let mut sheet = workbook.sheet_mut(0).unwrap();
//!
//! sheet.set_input("A1", "5").unwrap();
//! sheet.set_input("A2", "150").unwrap();
//! sheet
//!     .set_input("A3", "=IF(AND(A1>1,A2<100),A1,\"Out of range\")")
//!     .unwrap();
//! assert_eq!(sheet.value("A3").unwrap(), CellData::text("Out of range"));
//!
//! sheet.insert_rows(0, 1).unwrap();
//! assert_eq!(sheet.formula("A4").unwrap(), Some("=IF(AND(A2>1,A3<100),A2,\"Out of range\")"));
//! ```

pub mod calculation;
pub mod clipboard;
pub mod command;
pub mod filter;
pub mod prelude;
pub mod sheet;
pub mod sort;
mod structure;
pub mod workbook;

pub use calculation::{CalculationOptions, CalculationStats, UpdateGuard};
pub use clipboard::{Clipboard, ClipboardMode};
pub use command::{
    Command, DeleteColumnsCommand, DeleteRowsCommand, FilterCommand, InsertColumnBeforeCommand,
    InsertRowBeforeCommand, PasteCommand, SetCellCommand, SortCommand,
};
pub use filter::{
    AndCriterion, Criterion, EqualsCriterion, GreaterThanCriterion, LessThanCriterion, OrCriterion,
};
pub use sheet::Sheet;
pub use sort::SortOrder;
pub use workbook::{Workbook, WorkbookSettings};

// Re-export core types
pub use tabula_core::{
    Cell, CellData, CellError, CellRef, Error, RangeRef, RangeView, Result, Worksheet, MAX_COLS,
    MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use tabula_formula::{
    find_function_hint, parse_formula, FormulaAdjustment, FormulaError, FormulaExpr,
    FunctionHint, FunctionRegistry, ParsedFormula,
};
