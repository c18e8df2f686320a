//! Prelude module - common imports for tabula users
//!
//! ```rust
//! use tabula::prelude::*;
//! ```

pub use crate::{
    // Filtering
    AndCriterion,
    // Calculation types
    CalculationOptions,
    CalculationStats,
    // Cell types
    CellData,
    CellError,
    CellRef,
    Clipboard,
    // Commands
    Command,
    Criterion,
    DeleteColumnsCommand,
    DeleteRowsCommand,
    EqualsCriterion,
    // Error types
    Error,
    FilterCommand,
    GreaterThanCriterion,
    InsertColumnBeforeCommand,
    InsertRowBeforeCommand,
    LessThanCriterion,
    OrCriterion,
    PasteCommand,
    RangeRef,
    Result,
    SetCellCommand,
    // Main types
    Sheet,
    SortCommand,
    SortOrder,
    Workbook,
    WorkbookSettings,
    Worksheet,
};
