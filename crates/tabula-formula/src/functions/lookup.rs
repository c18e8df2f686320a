//! Lookup and reference functions

use std::cmp::Ordering;

use tabula_core::{CellData, CellError, RangeView};

use super::criteria::text_matches;
use super::{number, opt_bool, opt_number, range, scalar, FunctionResult};
use crate::evaluator::{compare_values, Arg, EvaluationContext};

fn same_kind(a: &CellData, b: &CellData) -> bool {
    matches!(
        (a, b),
        (
            CellData::Number(_) | CellData::Date(_),
            CellData::Number(_) | CellData::Date(_)
        ) | (CellData::Text(_), CellData::Text(_))
            | (CellData::Boolean(_), CellData::Boolean(_))
    )
}

/// Exact-match equality; text patterns may use wildcards
fn values_equal(lookup: &CellData, candidate: &CellData, wildcards: bool) -> bool {
    match (lookup, candidate) {
        (CellData::Text(pattern), CellData::Text(text)) if wildcards => text_matches(pattern, text),
        (CellData::Text(a), CellData::Text(b)) => a.to_lowercase() == b.to_lowercase(),
        (CellData::Empty, CellData::Empty) => true,
        (a, b) if same_kind(a, b) => compare_values(a, b) == Ordering::Equal,
        _ => false,
    }
}

/// Values of a one-row or one-column range
fn line(view: &RangeView) -> Option<Vec<CellData>> {
    if view.row_count() == 1 {
        Some(view.row_values(0).cloned().collect())
    } else if view.col_count() == 1 {
        Some(view.col_values(0).cloned().collect())
    } else {
        None
    }
}

/// How a lookup locates its value
#[derive(Debug, Clone, Copy, PartialEq)]
enum MatchMode {
    Exact { wildcards: bool },
    /// Exact, else the largest value below
    NextSmaller,
    /// Exact, else the smallest value above
    NextLarger,
}

/// Position of `lookup` in `values`, scanning forward or backward
fn find(values: &[CellData], lookup: &CellData, mode: MatchMode, reverse: bool) -> Option<usize> {
    let order: Box<dyn Iterator<Item = usize>> = if reverse {
        Box::new((0..values.len()).rev())
    } else {
        Box::new(0..values.len())
    };

    let mut best: Option<usize> = None;
    for i in order {
        let candidate = &values[i];
        match mode {
            MatchMode::Exact { wildcards } => {
                if values_equal(lookup, candidate, wildcards) {
                    return Some(i);
                }
            }
            MatchMode::NextSmaller | MatchMode::NextLarger => {
                if !same_kind(lookup, candidate) {
                    continue;
                }
                let ord = compare_values(candidate, lookup);
                if ord == Ordering::Equal {
                    return Some(i);
                }
                let wanted = if mode == MatchMode::NextSmaller {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                if ord == wanted {
                    let better = best.map_or(true, |b| {
                        compare_values(candidate, &values[b]) == wanted.reverse()
                    });
                    if better {
                        best = Some(i);
                    }
                }
            }
        }
    }
    best
}

/// Sorted-data search: the last entry not greater (or not less) than the
/// lookup before the order breaks
fn find_sorted(values: &[CellData], lookup: &CellData, descending: bool) -> Option<usize> {
    let mut best = None;
    for (i, candidate) in values.iter().enumerate() {
        if !same_kind(lookup, candidate) {
            continue;
        }
        let ord = compare_values(candidate, lookup);
        let within = if descending {
            ord != Ordering::Less
        } else {
            ord != Ordering::Greater
        };
        if within {
            best = Some(i);
        } else {
            break;
        }
    }
    best
}

fn lookup_value(args: &[Arg]) -> Result<CellData, CellError> {
    match scalar(args, 0) {
        CellData::Error(e) => Err(e),
        v => Ok(v),
    }
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    table_lookup(args, false)
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    table_lookup(args, true)
}

fn table_lookup(args: &[Arg], horizontal: bool) -> FunctionResult {
    let lookup = lookup_value(args)?;
    let table = range(args, 1)?.view;
    let index = number(args, 2)?.trunc();
    let approximate = opt_bool(args, 3, true)?;

    let width = if horizontal {
        table.row_count() as f64
    } else {
        table.col_count() as f64
    };
    if index < 1.0 {
        return Err(CellError::Value);
    }
    if index > width {
        return Err(CellError::Ref);
    }

    let keys: Vec<CellData> = if horizontal {
        table.row_values(0).cloned().collect()
    } else {
        table.col_values(0).cloned().collect()
    };

    let found = if approximate {
        find_sorted(&keys, &lookup, false)
    } else {
        find(&keys, &lookup, MatchMode::Exact { wildcards: true }, false)
    };
    let at = found.ok_or(CellError::NA)?;
    let offset = index as u32 - 1;
    let value = if horizontal {
        table.value(offset, at as u16)
    } else {
        table.value(at as u32, offset as u16)
    };
    Ok(value.clone())
}

/// MATCH(lookup_value, lookup_array, [match_type])
///
/// match_type 1 (default) finds the largest value not above the lookup in
/// ascending data, 0 an exact match, -1 the smallest value not below it in
/// descending data. The result is 1-based.
pub fn fn_match(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let lookup = lookup_value(args)?;
    let values = line(&range(args, 1)?.view).ok_or(CellError::NA)?;
    let match_type = opt_number(args, 2, 1.0)?;

    let found = if match_type == 0.0 {
        find(&values, &lookup, MatchMode::Exact { wildcards: true }, false)
    } else {
        find_sorted(&values, &lookup, match_type < 0.0)
    };
    found
        .map(|i| CellData::Number(i as f64 + 1.0))
        .ok_or(CellError::NA)
}

/// XLOOKUP(lookup_value, lookup_array, return_array, [if_not_found],
/// [match_mode], [search_mode])
pub fn fn_xlookup(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let lookup = lookup_value(args)?;
    let lookup_view = range(args, 1)?.view;
    let return_view = range(args, 2)?.view;
    let keys = line(&lookup_view).ok_or(CellError::Value)?;

    let mode = match opt_number(args, 4, 0.0)? as i64 {
        0 => MatchMode::Exact { wildcards: false },
        -1 => MatchMode::NextSmaller,
        1 => MatchMode::NextLarger,
        2 => MatchMode::Exact { wildcards: true },
        _ => return Err(CellError::Value),
    };
    let reverse = match opt_number(args, 5, 1.0)? as i64 {
        1 | 2 => false,
        -1 | -2 => true,
        _ => return Err(CellError::Value),
    };

    let Some(at) = find(&keys, &lookup, mode, reverse) else {
        return match args.get(3) {
            Some(_) => Ok(scalar(args, 3)),
            None => Err(CellError::NA),
        };
    };

    // The return array runs parallel to the lookup array
    let value = if lookup_view.row_count() == 1 && lookup_view.col_count() > 1 {
        if return_view.col_count() as usize != keys.len() {
            return Err(CellError::Value);
        }
        return_view.value(0, at as u16)
    } else {
        if return_view.row_count() as usize != keys.len() {
            return Err(CellError::Value);
        }
        return_view.value(at as u32, 0)
    };
    Ok(value.clone())
}

/// INDEX(array, row_num, [column_num])
///
/// A zero row picks the addressed column's first cell and a zero column
/// the addressed row's first cell. Both zero (or omitted) is `#VALUE!`.
pub fn fn_index(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let view = range(args, 0)?.view;
    let mut row = opt_number(args, 1, 0.0)?.trunc();
    let mut col = opt_number(args, 2, 0.0)?.trunc();
    if row < 0.0 || col < 0.0 {
        return Err(CellError::Value);
    }
    // A single index into a one-row range addresses its columns
    if args.len() == 2 && view.row_count() == 1 && view.col_count() > 1 {
        std::mem::swap(&mut row, &mut col);
    }
    if row == 0.0 && col == 0.0 {
        return Err(CellError::Value);
    }
    if row > view.row_count() as f64 || col > view.col_count() as f64 {
        return Err(CellError::Ref);
    }
    let r = (row as u32).saturating_sub(1);
    let c = (col as u16).saturating_sub(1);
    Ok(view.value(r, c).clone())
}

/// ROW([reference])
pub fn fn_row(args: &[Arg], ctx: &EvaluationContext) -> FunctionResult {
    if args.is_empty() {
        return Ok(CellData::Number(ctx.current_row as f64 + 1.0));
    }
    Ok(CellData::Number(range(args, 0)?.range().first_row() as f64 + 1.0))
}

/// ROWS(array)
pub fn fn_rows(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(range(args, 0)?.view.row_count() as f64))
}

/// COLUMN([reference])
pub fn fn_column(args: &[Arg], ctx: &EvaluationContext) -> FunctionResult {
    if args.is_empty() {
        return Ok(CellData::Number(ctx.current_col as f64 + 1.0));
    }
    Ok(CellData::Number(range(args, 0)?.range().first_col() as f64 + 1.0))
}

/// COLUMNS(array)
pub fn fn_columns(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(range(args, 0)?.view.col_count() as f64))
}
