//! Information functions

use tabula_core::{CellData, CellError};

use super::{scalar, FunctionResult};
use crate::evaluator::{Arg, EvaluationContext};

/// ISBLANK(value)
pub fn fn_isblank(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(scalar(args, 0).is_empty()))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(scalar(args, 0).is_numeric()))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(matches!(scalar(args, 0), CellData::Text(_))))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(scalar(args, 0).is_error()))
}

/// ISNA(value)
pub fn fn_isna(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Boolean(matches!(
        scalar(args, 0),
        CellData::Error(CellError::NA)
    )))
}
