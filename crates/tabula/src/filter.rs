//! Row filtering
//!
//! A filter hides each row of a range that fails a [`Criterion`] and
//! unhides each row that passes. Criteria look at one absolute column of
//! the row; [`AndCriterion`] and [`OrCriterion`] combine them.

use std::cmp::Ordering;

use tabula_core::{parse_number, CellData, Error, RangeRef, Result, Worksheet};
use tabula_formula::compare_values;
use tracing::debug;

use crate::workbook::Workbook;

/// A test applied to one row of a worksheet
pub trait Criterion {
    /// Check if `row` of `sheet` passes
    fn matches(&self, sheet: &Worksheet, row: u32) -> bool;
}

/// Numeric view of a value, reading numeric text as a number
fn numeric(value: &CellData) -> Option<f64> {
    match value {
        CellData::Text(s) => parse_number(s.trim()),
        CellData::Empty => None,
        other => other.as_number(),
    }
}

/// Order a cell value against a criterion value, `None` when they do not
/// compare
fn compare(cell: &CellData, wanted: &CellData) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (numeric(cell), numeric(wanted)) {
        return a.partial_cmp(&b);
    }
    match (cell, wanted) {
        (CellData::Text(_), CellData::Text(_)) | (CellData::Boolean(_), CellData::Boolean(_)) => {
            Some(compare_values(cell, wanted))
        }
        _ => None,
    }
}

fn cell_value(sheet: &Worksheet, row: u32, column: u16) -> &CellData {
    const EMPTY: &CellData = &CellData::Empty;
    sheet.value_ref(row, column).unwrap_or(EMPTY)
}

/// Passes rows whose value in `column` equals `value`
///
/// Numbers and numeric text compare numerically; text compares
/// case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualsCriterion {
    pub column: u16,
    pub value: CellData,
}

impl EqualsCriterion {
    pub fn new(column: u16, value: CellData) -> Self {
        Self { column, value }
    }
}

impl Criterion for EqualsCriterion {
    fn matches(&self, sheet: &Worksheet, row: u32) -> bool {
        let cell = cell_value(sheet, row, self.column);
        match (cell, &self.value) {
            (CellData::Empty, wanted) | (wanted, CellData::Empty) => {
                wanted.is_empty() || matches!(wanted, CellData::Text(s) if s.is_empty())
            }
            _ => compare(cell, &self.value) == Some(Ordering::Equal),
        }
    }
}

/// Passes rows whose value in `column` is greater than `value`
#[derive(Debug, Clone, PartialEq)]
pub struct GreaterThanCriterion {
    pub column: u16,
    pub value: CellData,
}

impl GreaterThanCriterion {
    pub fn new(column: u16, value: CellData) -> Self {
        Self { column, value }
    }
}

impl Criterion for GreaterThanCriterion {
    fn matches(&self, sheet: &Worksheet, row: u32) -> bool {
        compare(cell_value(sheet, row, self.column), &self.value) == Some(Ordering::Greater)
    }
}

/// Passes rows whose value in `column` is less than `value`
#[derive(Debug, Clone, PartialEq)]
pub struct LessThanCriterion {
    pub column: u16,
    pub value: CellData,
}

impl LessThanCriterion {
    pub fn new(column: u16, value: CellData) -> Self {
        Self { column, value }
    }
}

impl Criterion for LessThanCriterion {
    fn matches(&self, sheet: &Worksheet, row: u32) -> bool {
        compare(cell_value(sheet, row, self.column), &self.value) == Some(Ordering::Less)
    }
}

/// Passes rows that pass every inner criterion
#[derive(Default)]
pub struct AndCriterion {
    criteria: Vec<Box<dyn Criterion>>,
}

impl AndCriterion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion
    pub fn with(mut self, criterion: impl Criterion + 'static) -> Self {
        self.criteria.push(Box::new(criterion));
        self
    }
}

impl Criterion for AndCriterion {
    fn matches(&self, sheet: &Worksheet, row: u32) -> bool {
        self.criteria.iter().all(|c| c.matches(sheet, row))
    }
}

/// Passes rows that pass at least one inner criterion
#[derive(Default)]
pub struct OrCriterion {
    criteria: Vec<Box<dyn Criterion>>,
}

impl OrCriterion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion
    pub fn with(mut self, criterion: impl Criterion + 'static) -> Self {
        self.criteria.push(Box::new(criterion));
        self
    }
}

impl Criterion for OrCriterion {
    fn matches(&self, sheet: &Worksheet, row: u32) -> bool {
        self.criteria.iter().any(|c| c.matches(sheet, row))
    }
}

impl Workbook {
    /// Hide the rows of `range` that fail `criterion`, unhide the rest
    ///
    /// Returns the number of rows hidden.
    pub fn filter(&mut self, sheet: usize, range: RangeRef, criterion: &dyn Criterion) -> Result<u32> {
        self.check_range(sheet, &range)?;
        let ws = &mut self.sheets[sheet];

        let mut hidden = 0;
        for row in range.first_row()..=range.last_row() {
            let pass = criterion.matches(ws, row);
            ws.set_row_hidden(row, !pass)?;
            if !pass {
                hidden += 1;
            }
        }

        debug!(sheet = ws.name(), range = %range.to_a1_string(), hidden, "filtered range");
        Ok(hidden)
    }

    /// Unhide every row of `range`
    pub fn clear_filter(&mut self, sheet: usize, range: RangeRef) -> Result<()> {
        self.check_range(sheet, &range)?;
        let ws = &mut self.sheets[sheet];
        for row in range.first_row()..=range.last_row() {
            ws.set_row_hidden(row, false)?;
        }
        debug!(sheet = ws.name(), range = %range.to_a1_string(), "cleared filter");
        Ok(())
    }

    fn check_range(&self, sheet: usize, range: &RangeRef) -> Result<()> {
        self.check_sheet(sheet)?;
        if !self.sheets[sheet].contains_range(range) {
            return Err(Error::InvalidRange(range.to_a1_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let rows = [("apple", "3"), ("Banana", "12"), ("cherry", "7"), ("date", "12")];
        for (row, (name, qty)) in rows.iter().enumerate() {
            wb.set_input(0, row as u32, 0, name).unwrap();
            wb.set_input(0, row as u32, 1, qty).unwrap();
        }
        wb.set_value(0, 3, 1, CellData::text("12")).unwrap();
        wb
    }

    fn hidden(wb: &Workbook) -> Vec<u32> {
        wb.worksheet(0).unwrap().hidden_rows().collect()
    }

    #[test]
    fn test_numeric_text_equals_number() {
        let mut wb = workbook();
        let range = RangeRef::parse("A1:B4").unwrap();
        let count = wb
            .filter(0, range, &EqualsCriterion::new(1, CellData::Number(12.0)))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(hidden(&wb), vec![0, 2]);
    }

    #[test]
    fn test_text_equality_ignores_case() {
        let mut wb = workbook();
        let range = RangeRef::parse("A1:B4").unwrap();
        wb.filter(0, range, &EqualsCriterion::new(0, CellData::text("banana")))
            .unwrap();
        assert_eq!(hidden(&wb), vec![0, 2, 3]);
    }

    #[test]
    fn test_refilter_unhides_passing_rows() {
        let mut wb = workbook();
        let range = RangeRef::parse("A1:B4").unwrap();
        wb.filter(0, range, &LessThanCriterion::new(1, CellData::Number(5.0)))
            .unwrap();
        assert_eq!(hidden(&wb), vec![1, 2, 3]);

        wb.filter(0, range, &GreaterThanCriterion::new(1, CellData::Number(5.0)))
            .unwrap();
        assert_eq!(hidden(&wb), vec![0]);

        wb.clear_filter(0, range).unwrap();
        assert!(hidden(&wb).is_empty());
    }

    #[test]
    fn test_combined_criteria() {
        let mut wb = workbook();
        let range = RangeRef::parse("A1:B4").unwrap();

        let between = AndCriterion::new()
            .with(GreaterThanCriterion::new(1, CellData::Number(3.0)))
            .with(LessThanCriterion::new(1, CellData::Number(10.0)));
        assert_eq!(wb.filter(0, range, &between).unwrap(), 3);
        assert_eq!(hidden(&wb), vec![0, 1, 3]);

        let either = OrCriterion::new()
            .with(EqualsCriterion::new(0, CellData::text("apple")))
            .with(EqualsCriterion::new(0, CellData::text("date")));
        assert_eq!(wb.filter(0, range, &either).unwrap(), 2);
        assert_eq!(hidden(&wb), vec![1, 2]);
    }

    #[test]
    fn test_text_never_compares_with_numbers() {
        let mut wb = workbook();
        let range = RangeRef::parse("A1:A4").unwrap();
        let count = wb
            .filter(0, range, &GreaterThanCriterion::new(0, CellData::Number(0.0)))
            .unwrap();
        assert_eq!(count, 4);
        assert!(wb.filter(0, RangeRef::parse("A1:A2000").unwrap(), &AndCriterion::new()).is_err());
    }
}
