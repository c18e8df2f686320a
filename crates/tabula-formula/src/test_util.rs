//! Helpers for evaluating formulas against a scratch sheet in tests

use tabula_core::{Cell, CellData, CellRef, Worksheet};

use crate::evaluator::{evaluate_formula, EvaluationContext};
use crate::parser::parse_formula;

/// A 100x26 sheet with the given literal inputs
pub fn sheet_with(cells: &[(&str, &str)]) -> Worksheet {
    let mut ws = Worksheet::new("Sheet1", 100, 26);
    for (address, input) in cells {
        let at = CellRef::parse(address).unwrap();
        ws.set_cell(at.row, at.col, Cell::new(CellData::from_input(input)))
            .unwrap();
    }
    ws
}

/// Evaluate from Z100 so test cells never collide with the formula cell
pub fn eval_sheets(sheets: &[Worksheet], formula: &str) -> CellData {
    let parsed = parse_formula(formula);
    let ctx = EvaluationContext::new(sheets, 0, 99, 25);
    evaluate_formula(parsed.root.as_ref(), &ctx)
}

pub fn eval_with(cells: &[(&str, &str)], formula: &str) -> CellData {
    eval_sheets(&[sheet_with(cells)], formula)
}

pub fn eval(formula: &str) -> CellData {
    eval_with(&[], formula)
}
