//! Workbook type - the live document structure

use tabula_core::{Cell, CellData, Error, Result, Worksheet, MAX_SHEET_NAME_LEN};
use tabula_formula::{evaluate_formula, parse_formula, CellKey, EvaluationContext, FormulaAdjustment};
use tracing::debug;

use crate::calculation::{Batch, CalcState, CalculationOptions};
use crate::sheet::Sheet;

/// Workbook-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookSettings {
    /// Row count of sheets created without explicit dimensions
    pub default_row_count: u32,
    /// Column count of sheets created without explicit dimensions
    pub default_column_count: u16,
}

impl Default for WorkbookSettings {
    fn default() -> Self {
        Self {
            default_row_count: 1000,
            default_column_count: 26,
        }
    }
}

/// A workbook: ordered, uniquely named sheets plus the calculation state
/// that keeps every formula cell up to date
///
/// Every write goes through the workbook so the dependency graph always
/// matches the stored formulas. Reads can go straight to a [`Worksheet`].
#[derive(Debug)]
pub struct Workbook {
    pub(crate) sheets: Vec<Worksheet>,
    /// Batch state, parallel to `sheets`
    pub(crate) batches: Vec<Batch>,
    pub(crate) calc: CalcState,
    pub(crate) options: CalculationOptions,
    settings: WorkbookSettings,
}

impl Workbook {
    /// Create a workbook with a single sheet named "Sheet1"
    pub fn new() -> Self {
        Self::with_settings(WorkbookSettings::default())
    }

    /// Create a workbook with custom settings and a single "Sheet1"
    pub fn with_settings(settings: WorkbookSettings) -> Self {
        let first = Worksheet::new(
            "Sheet1",
            settings.default_row_count,
            settings.default_column_count,
        );
        Self {
            sheets: vec![first],
            batches: vec![Batch::default()],
            calc: CalcState::default(),
            options: CalculationOptions::default(),
            settings,
        }
    }

    /// Get workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Get mutable workbook settings
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        &mut self.settings
    }

    /// Get the calculation options
    pub fn calculation_options(&self) -> &CalculationOptions {
        &self.options
    }

    /// Replace the calculation options
    pub fn set_calculation_options(&mut self, options: CalculationOptions) {
        self.options = options;
    }

    // === Sheets ===

    /// Get the number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Get a worksheet by index for reading
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    /// Get a worksheet by name (case-insensitive) for reading
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.sheets.iter()
    }

    /// Get the index of a sheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Get a mutable handle on a sheet by index
    pub fn sheet_mut(&mut self, index: usize) -> Result<Sheet<'_>> {
        self.check_sheet(index)?;
        Ok(Sheet::new(self, index))
    }

    /// Get a mutable handle on a sheet by name (case-insensitive)
    pub fn sheet_by_name_mut(&mut self, name: &str) -> Result<Sheet<'_>> {
        let index = self
            .sheet_index(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        Ok(Sheet::new(self, index))
    }

    /// Add a sheet with the default dimensions
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        let (rows, cols) = (
            self.settings.default_row_count,
            self.settings.default_column_count,
        );
        self.add_sheet_with_size(name, rows, cols)
    }

    /// Add a sheet with explicit dimensions
    ///
    /// Formulas that already name the new sheet start resolving against it.
    pub fn add_sheet_with_size(&mut self, name: &str, row_count: u32, column_count: u16) -> Result<usize> {
        self.validate_sheet_name(name, None)?;

        let index = self.sheets.len();
        self.sheets.push(Worksheet::new(name, row_count, column_count));
        self.batches.push(Batch::default());
        debug!(sheet = name, index, "added sheet");

        self.rebuild();
        Ok(index)
    }

    /// Remove a sheet, returning it
    ///
    /// Formulas on other sheets that named it evaluate to `#REF!`. The
    /// last remaining sheet cannot be removed.
    pub fn remove_sheet(&mut self, index: usize) -> Result<Worksheet> {
        self.check_sheet(index)?;
        if self.sheets.len() == 1 {
            return Err(Error::other("cannot remove the last sheet"));
        }

        let removed = self.sheets.remove(index);
        self.batches.remove(index);
        debug!(sheet = removed.name(), index, "removed sheet");

        self.rebuild();
        Ok(removed)
    }

    /// Rename a sheet, rewriting every formula that names it
    pub fn rename_sheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        self.check_sheet(index)?;
        self.validate_sheet_name(new_name, Some(index))?;

        let old_name = self.sheets[index].name().to_string();
        for ws in &mut self.sheets {
            let rewrites: Vec<(u32, u16, String)> = ws
                .formula_cells()
                .filter_map(|(row, col, text)| {
                    let renamed = FormulaAdjustment::rename_sheet(text, &old_name, new_name);
                    (renamed != text).then_some((row, col, renamed))
                })
                .collect();
            for (row, col, text) in rewrites {
                ws.cell_mut(row, col)?.formula = Some(text);
            }
        }
        self.sheets[index].set_name(new_name);
        debug!(from = %old_name, to = new_name, "renamed sheet");

        self.rebuild();
        Ok(())
    }

    /// Validate a sheet name, optionally ignoring one sheet for the
    /// duplicate check
    fn validate_sheet_name(&self, name: &str, exclude: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        let taken = self
            .sheets
            .iter()
            .enumerate()
            .any(|(i, ws)| Some(i) != exclude && ws.name().eq_ignore_ascii_case(name));
        if taken {
            return Err(Error::DuplicateSheetName(name.into()));
        }
        Ok(())
    }

    pub(crate) fn check_sheet(&self, index: usize) -> Result<()> {
        if index >= self.sheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.sheets.len()));
        }
        Ok(())
    }

    // === Cells ===

    /// Get a cell's value
    pub fn value(&self, sheet: usize, row: u32, col: u16) -> Result<CellData> {
        self.check_sheet(sheet)?;
        self.sheets[sheet].value(row, col)
    }

    /// Formula text of a cell, if it holds one
    pub fn formula(&self, sheet: usize, row: u32, col: u16) -> Result<Option<&str>> {
        self.check_sheet(sheet)?;
        let ws = &self.sheets[sheet];
        ws.validate_cell_position(row, col)?;
        Ok(ws.formula(row, col))
    }

    /// Set a cell from user input
    ///
    /// Text starting with `=` becomes a formula; anything else is stored as
    /// a literal (numbers and booleans are recognised). Empty input clears
    /// the cell's contents. The cell's style index is kept.
    pub fn set_input(&mut self, sheet: usize, row: u32, col: u16, input: &str) -> Result<()> {
        let cell = if input.len() > 1 && input.starts_with('=') {
            Cell::formula(input)
        } else {
            Cell::new(CellData::from_input(input))
        };
        self.write_contents(sheet, row, col, cell)
    }

    /// Set a literal value, replacing any formula
    pub fn set_value(&mut self, sheet: usize, row: u32, col: u16, value: CellData) -> Result<()> {
        self.write_contents(sheet, row, col, Cell::new(value))
    }

    /// Set a formula; a missing leading `=` is added
    pub fn set_formula(&mut self, sheet: usize, row: u32, col: u16, formula: &str) -> Result<()> {
        let text = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };
        self.write_contents(sheet, row, col, Cell::formula(text))
    }

    /// Clear a cell's contents, keeping its style index
    pub fn clear_cell(&mut self, sheet: usize, row: u32, col: u16) -> Result<()> {
        self.write_contents(sheet, row, col, Cell::default())
    }

    /// Set the opaque style index of a cell
    pub fn set_style_index(&mut self, sheet: usize, row: u32, col: u16, style_index: u32) -> Result<()> {
        self.check_sheet(sheet)?;
        let ws = &mut self.sheets[sheet];
        ws.set_style_index(row, col, style_index)?;
        if ws.cell(row, col)?.is_some_and(Cell::is_blank) {
            ws.take_cell(row, col)?;
        }
        Ok(())
    }

    /// Evaluate a formula as if it lived at the given cell, without storing
    /// it
    pub fn evaluate(&self, sheet: usize, row: u32, col: u16, formula: &str) -> Result<CellData> {
        self.check_sheet(sheet)?;
        self.sheets[sheet].validate_cell_position(row, col)?;
        let parsed = parse_formula(formula);
        let ctx = EvaluationContext::new(&self.sheets, sheet, row, col);
        Ok(evaluate_formula(parsed.root.as_ref(), &ctx))
    }

    /// Replace the contents of a cell (keeping its style) and recalculate
    fn write_contents(&mut self, sheet: usize, row: u32, col: u16, mut cell: Cell) -> Result<()> {
        self.check_sheet(sheet)?;
        cell.style_index = self.sheets[sheet].style_index(row, col);
        self.put_cell(sheet, row, col, Some(cell))?;
        self.recalculate(Some(CellKey::new(sheet, row, col)));
        Ok(())
    }

    /// Store a cell (or remove it) and update its registration, without
    /// recalculating
    pub(crate) fn put_cell(&mut self, sheet: usize, row: u32, col: u16, cell: Option<Cell>) -> Result<()> {
        self.check_sheet(sheet)?;
        let ws = &mut self.sheets[sheet];
        match cell {
            Some(cell) if !cell.is_blank() => ws.set_cell(row, col, cell)?,
            _ => {
                ws.take_cell(row, col)?;
            }
        }
        self.register(CellKey::new(sheet, row, col));
        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}
