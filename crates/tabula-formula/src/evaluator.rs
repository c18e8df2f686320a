//! Formula evaluator
//!
//! Walks a formula AST against the workbook's sheets and produces a
//! [`CellData`]. Errors are values: nothing here returns `Err`.

use std::cmp::Ordering;

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference};
use crate::functions::{ArgKind, FunctionRegistry};
use tabula_core::{CellData, CellError, RangeRef, RangeView, Worksheet};

/// Context for formula evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Every sheet of the workbook, in order
    pub sheets: &'a [Worksheet],
    /// Index of the sheet holding the formula
    pub current_sheet: usize,
    /// Row of the formula cell
    pub current_row: u32,
    /// Column of the formula cell
    pub current_col: u16,
}

/// A range argument handed to a function without being flattened
#[derive(Debug, Clone, Copy)]
pub struct RangeArg<'a> {
    /// Index of the sheet the range lives on
    pub sheet: usize,
    /// Lazy view over the range's cells
    pub view: RangeView<'a>,
}

impl<'a> RangeArg<'a> {
    /// The range as written
    pub fn range(&self) -> RangeRef {
        self.view.range()
    }

    /// The single value of a 1x1 range
    pub fn single_value(&self) -> Option<&'a CellData> {
        (self.view.cell_count() == 1).then(|| self.view.value(0, 0))
    }
}

/// An evaluated function argument
#[derive(Debug, Clone)]
pub enum Arg<'a> {
    Value(CellData),
    Range(RangeArg<'a>),
}

impl<'a> Arg<'a> {
    /// Scalar view of the argument: 1x1 ranges collapse to their value,
    /// larger ranges are `#VALUE!`
    pub fn scalar(&self) -> CellData {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Range(r) => r
                .single_value()
                .cloned()
                .unwrap_or(CellData::Error(CellError::Value)),
        }
    }

    /// The range, if this argument is one
    pub fn as_range(&self) -> Option<&RangeArg<'a>> {
        match self {
            Arg::Range(r) => Some(r),
            Arg::Value(_) => None,
        }
    }
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(sheets: &'a [Worksheet], sheet: usize, row: u32, col: u16) -> Self {
        Self {
            sheets,
            current_sheet: sheet,
            current_row: row,
            current_col: col,
        }
    }

    /// Resolve an optional sheet name (case-insensitive) to an index
    pub fn sheet_index(&self, name: Option<&str>) -> Option<usize> {
        match name {
            None => (self.current_sheet < self.sheets.len()).then_some(self.current_sheet),
            Some(name) => self
                .sheets
                .iter()
                .position(|ws| ws.name().eq_ignore_ascii_case(name)),
        }
    }

    /// Value of a referenced cell; unknown sheets and out-of-bounds
    /// positions are `#REF!`
    pub fn cell_value(&self, reference: &CellReference) -> CellData {
        let Some(index) = self.sheet_index(reference.sheet.as_deref()) else {
            return CellData::Error(CellError::Ref);
        };
        let ws = &self.sheets[index];
        let at = reference.address;
        if !ws.in_bounds(at.row, at.col) {
            return CellData::Error(CellError::Ref);
        }
        ws.value_ref(at.row, at.col).cloned().unwrap_or_default()
    }

    /// Resolve a range reference; any part outside the sheet is `#REF!`
    pub fn range(&self, reference: &RangeReference) -> Result<RangeArg<'a>, CellError> {
        let index = self
            .sheet_index(reference.sheet.as_deref())
            .ok_or(CellError::Ref)?;
        let ws = &self.sheets[index];
        if !ws.contains_range(&reference.range) {
            return Err(CellError::Ref);
        }
        Ok(RangeArg {
            sheet: index,
            view: RangeView::new(ws, reference.range),
        })
    }
}

/// Evaluate a whole formula tree the way a cell stores it
///
/// A missing root is `#VALUE!`, a bare range is summed and an Empty result
/// becomes 0.
pub fn evaluate_formula(root: Option<&FormulaExpr>, ctx: &EvaluationContext) -> CellData {
    let result = match root {
        None => CellData::Error(CellError::Value),
        Some(FormulaExpr::RangeRef(r)) => match ctx.range(r) {
            Ok(range) => sum_range(&range),
            Err(e) => CellData::Error(e),
        },
        Some(expr) => evaluate(expr, ctx),
    };
    match result {
        CellData::Empty => CellData::Number(0.0),
        other => other,
    }
}

fn sum_range(range: &RangeArg) -> CellData {
    let mut total = 0.0;
    for value in range.view.values() {
        match value {
            CellData::Error(e) => return CellData::Error(*e),
            v => total += v.as_number().unwrap_or(0.0),
        }
    }
    CellData::Number(total)
}

/// Evaluate an expression in scalar context
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> CellData {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => CellData::Number(*n),
        FormulaExpr::String(s) => CellData::Text(s.clone()),
        FormulaExpr::Boolean(b) => CellData::Boolean(*b),
        FormulaExpr::Error(e) => CellData::Error(*e),

        // === References ===
        FormulaExpr::CellRef(r) => ctx.cell_value(r),
        // Ranges only make sense where something flattens them
        FormulaExpr::RangeRef(r) => match ctx.range(r) {
            Ok(_) => CellData::Error(CellError::Value),
            Err(e) => CellData::Error(e),
        },

        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> CellData {
    let left_val = evaluate(left, ctx);
    if let Some(e) = left_val.error() {
        return CellData::Error(e);
    }
    let right_val = evaluate(right, ctx);
    if let Some(e) = right_val.error() {
        return CellData::Error(e);
    }

    if op.is_comparison() {
        let ord = compare_values(&left_val, &right_val);
        let result = match op {
            BinaryOperator::Equal => ord == Ordering::Equal,
            BinaryOperator::NotEqual => ord != Ordering::Equal,
            BinaryOperator::LessThan => ord == Ordering::Less,
            BinaryOperator::LessEqual => ord != Ordering::Greater,
            BinaryOperator::GreaterThan => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        };
        return CellData::Boolean(result);
    }

    if op == BinaryOperator::Concat {
        return match (left_val.to_text(), right_val.to_text()) {
            (Ok(l), Ok(r)) => CellData::Text(l + &r),
            (Err(e), _) | (_, Err(e)) => CellData::Error(e),
        };
    }

    let (l, r) = match (left_val.to_number(), right_val.to_number()) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => return CellData::Error(e),
    };
    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        _ => {
            if r == 0.0 {
                return CellData::Error(CellError::Div0);
            }
            l / r
        }
    };
    if result.is_finite() {
        CellData::Number(result)
    } else {
        CellData::Error(CellError::Num)
    }
}

/// Order two values the way comparison operators do
///
/// Numbers (and dates) sort before text, text before booleans. Text
/// compares case-insensitively. Empty takes the type of the other side.
pub fn compare_values(left: &CellData, right: &CellData) -> Ordering {
    fn rank(v: &CellData) -> u8 {
        match v {
            CellData::Number(_) | CellData::Date(_) | CellData::Empty => 0,
            CellData::Text(_) => 1,
            CellData::Boolean(_) => 2,
            CellData::Error(_) => 3,
        }
    }

    match (left, right) {
        (CellData::Empty, CellData::Empty) => Ordering::Equal,
        (CellData::Empty, CellData::Text(s)) => "".cmp(s.as_str()),
        (CellData::Text(s), CellData::Empty) => s.as_str().cmp(""),
        (CellData::Empty, CellData::Boolean(b)) => false.cmp(b),
        (CellData::Boolean(b), CellData::Empty) => b.cmp(&false),
        (CellData::Text(l), CellData::Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (CellData::Boolean(l), CellData::Boolean(r)) => l.cmp(r),
        (CellData::Error(l), CellData::Error(r)) => (*l as u8).cmp(&(*r as u8)),
        _ if rank(left) == 0 && rank(right) == 0 => {
            let l = left.as_number().unwrap_or(0.0);
            let r = right.as_number().unwrap_or(0.0);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        _ => rank(left).cmp(&rank(right)),
    }
}

fn evaluate_function(name: &str, args: &[FormulaExpr], ctx: &EvaluationContext) -> CellData {
    let Some(func) = FunctionRegistry::global().get(name) else {
        return CellData::Error(CellError::Name);
    };
    if !func.accepts(args.len()) {
        return CellData::Error(CellError::Value);
    }

    let mut evaluated = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        evaluated.push(evaluate_arg(arg, func.arg_kind(i), ctx));
    }

    (func.implementation)(&evaluated, ctx).unwrap_or_else(CellData::Error)
}

fn evaluate_arg<'a>(expr: &FormulaExpr, kind: ArgKind, ctx: &EvaluationContext<'a>) -> Arg<'a> {
    let range = match (kind, expr) {
        (ArgKind::Scalar, FormulaExpr::RangeRef(r)) => {
            // Implicit single-cell ranges are accepted as scalars
            return match ctx.range(r) {
                Ok(range) => Arg::Value(
                    range
                        .single_value()
                        .cloned()
                        .unwrap_or(CellData::Error(CellError::Value)),
                ),
                Err(e) => Arg::Value(CellData::Error(e)),
            };
        }
        (ArgKind::Scalar, _) => return Arg::Value(evaluate(expr, ctx)),
        (_, FormulaExpr::RangeRef(r)) => r.clone(),
        (_, FormulaExpr::CellRef(c)) => RangeReference {
            sheet: c.sheet.clone(),
            range: RangeRef::single(c.address),
        },
        _ => return Arg::Value(evaluate(expr, ctx)),
    };
    match ctx.range(&range) {
        Ok(r) => Arg::Range(r),
        Err(e) => Arg::Value(CellData::Error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;
    use tabula_core::Cell;

    fn sheets() -> Vec<Worksheet> {
        let mut s1 = Worksheet::new("Sheet1", 5, 5);
        s1.set_cell(0, 0, Cell::new(5.0.into())).unwrap();
        s1.set_cell(1, 0, Cell::new(150.0.into())).unwrap();
        s1.set_cell(2, 0, Cell::new("15".into())).unwrap();
        s1.set_cell(3, 0, Cell::new("abc".into())).unwrap();
        let mut s2 = Worksheet::new("Data Sheet", 5, 5);
        s2.set_cell(0, 2, Cell::new(7.0.into())).unwrap();
        s2.set_cell(0, 0, Cell::new(1.0.into())).unwrap();
        s2.set_cell(1, 1, Cell::new(2.0.into())).unwrap();
        vec![s1, s2]
    }

    fn eval_in(sheets: &[Worksheet], formula: &str) -> CellData {
        let parsed = parse_formula(formula);
        let ctx = EvaluationContext::new(sheets, 0, 4, 4);
        evaluate_formula(parsed.root.as_ref(), &ctx)
    }

    fn eval(formula: &str) -> CellData {
        eval_in(&sheets(), formula)
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval("=1+2*3"), CellData::Number(7.0));
        assert_eq!(eval("=(1+2)*3"), CellData::Number(9.0));
        assert_eq!(eval("=10-4-3"), CellData::Number(3.0));
        assert_eq!(eval("=0-8.9"), CellData::Number(-8.9));
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(eval("=A3+1"), CellData::Number(16.0));
        assert_eq!(eval("=\"15\"*2"), CellData::Number(30.0));
        assert_eq!(eval("=A4+1"), CellData::Error(CellError::Value));
        assert_eq!(eval("=TRUE+1"), CellData::Number(2.0));
        assert_eq!(eval("=E1+1"), CellData::Number(1.0));
    }

    #[test]
    fn test_errors_short_circuit_left_first() {
        assert_eq!(eval("=1/0"), CellData::Error(CellError::Div0));
        assert_eq!(eval("=#REF!+1/0"), CellData::Error(CellError::Ref));
        assert_eq!(eval("=1/0+#REF!"), CellData::Error(CellError::Div0));
        assert_eq!(eval("=#N/A&\"x\""), CellData::Error(CellError::NA));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("=A1>1"), CellData::Boolean(true));
        assert_eq!(eval("=\"abc\"=\"ABC\""), CellData::Boolean(true));
        assert_eq!(eval("=1<\"a\""), CellData::Boolean(true));
        assert_eq!(eval("=\"z\"<TRUE"), CellData::Boolean(true));
        assert_eq!(eval("=E1=0"), CellData::Boolean(true));
        assert_eq!(eval("=E1=\"\""), CellData::Boolean(true));
    }

    #[test]
    fn test_concat() {
        assert_eq!(eval("=\"a\"&1&TRUE"), CellData::text("a1TRUE"));
    }

    #[test]
    fn test_out_of_bounds_is_ref() {
        assert_eq!(eval("=F1"), CellData::Error(CellError::Ref));
        assert_eq!(eval("=A6"), CellData::Error(CellError::Ref));
        assert_eq!(eval("=SUM(A2:A6)"), CellData::Error(CellError::Ref));
        assert_eq!(eval("=Nope!A1"), CellData::Error(CellError::Ref));
    }

    #[test]
    fn test_cross_sheet() {
        assert_eq!(eval("='data sheet'!C1"), CellData::Number(7.0));
        assert_eq!(eval("=SUM('Data Sheet'!A1:B2)"), CellData::Number(3.0));
    }

    #[test]
    fn test_bare_range_is_sum() {
        assert_eq!(eval("=A1:A2"), CellData::Number(155.0));
        assert_eq!(eval("=A1:A2+1"), CellData::Error(CellError::Value));
    }

    #[test]
    fn test_empty_result_is_zero() {
        assert_eq!(eval("=E2"), CellData::Number(0.0));
    }

    #[test]
    fn test_missing_root_is_value_error() {
        assert_eq!(eval("A1"), CellData::Error(CellError::Value));
    }

    #[test]
    fn test_function_resolution() {
        assert_eq!(eval("=sum(1,2)"), CellData::Number(3.0));
        assert_eq!(eval("=NOPE(1)"), CellData::Error(CellError::Name));
        assert_eq!(eval("=ROUND()"), CellData::Error(CellError::Value));
        assert_eq!(eval("=foo"), CellData::Error(CellError::Name));
    }

    #[test]
    fn test_if_and() {
        assert_eq!(
            eval("=IF(AND(A1>1,A2<100),A1,\"Out of range\")"),
            CellData::text("Out of range")
        );
    }
}
