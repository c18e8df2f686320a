//! Logical functions

use tabula_core::{CellData, CellError};

use super::{number, scalar, FunctionResult};
use crate::evaluator::{Arg, EvaluationContext};

/// IF(condition, if_true, [if_false])
pub fn fn_if(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let condition = scalar(args, 0).to_bool()?;
    if condition {
        Ok(scalar(args, 1))
    } else if args.len() > 2 {
        Ok(scalar(args, 2))
    } else {
        Ok(CellData::Boolean(false))
    }
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    match scalar(args, 0) {
        CellData::Error(_) => Ok(scalar(args, 1)),
        value => Ok(value),
    }
}

/// Fold the logical values of every argument
///
/// Text and blanks inside ranges are ignored; with no logical values at
/// all the result is `#VALUE!`.
fn logical_values(args: &[Arg]) -> Result<Vec<bool>, CellError> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Range(r) => {
                for value in r.view.values() {
                    match value {
                        CellData::Boolean(b) => out.push(*b),
                        CellData::Number(n) => out.push(*n != 0.0),
                        CellData::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            Arg::Value(CellData::Empty) => {}
            Arg::Value(v) => out.push(v.to_bool()?),
        }
    }
    if out.is_empty() {
        return Err(CellError::Value);
    }
    Ok(out)
}

/// AND function
pub fn fn_and(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(logical_values(args)?.into_iter().all(|b| b)))
}

/// OR function
pub fn fn_or(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(logical_values(args)?.into_iter().any(|b| b)))
}

/// NOT function
pub fn fn_not(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(!scalar(args, 0).to_bool()?))
}

/// CHOOSE(index, value1, ...)
pub fn fn_choose(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let index = number(args, 0)?.trunc();
    if index < 1.0 || index >= args.len() as f64 {
        return Err(CellError::Value);
    }
    Ok(scalar(args, index as usize))
}
