//! Statistical functions, including SUBTOTAL and AGGREGATE

use tabula_core::{CellData, CellError};

use super::criteria::CriteriaMatcher;
use super::{collect_numbers, number, range, scalar, FunctionResult};
use crate::evaluator::{Arg, EvaluationContext};
use crate::lexer::{tokenize, TokenKind};

/// AVERAGE function
pub fn fn_average(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    average(&numbers)
}

/// MIN function (0 when there are no numbers)
pub fn fn_min(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    Ok(CellData::Number(numbers.iter().copied().reduce(f64::min).unwrap_or(0.0)))
}

/// MAX function (0 when there are no numbers)
pub fn fn_max(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    Ok(CellData::Number(numbers.iter().copied().reduce(f64::max).unwrap_or(0.0)))
}

/// COUNT function: numeric cells in ranges, numeric-looking direct values
pub fn fn_count(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let mut count = 0usize;
    for arg in args {
        match arg {
            Arg::Range(r) => count += r.view.values().filter(|v| v.is_numeric()).count(),
            Arg::Value(CellData::Empty | CellData::Error(_)) => {}
            Arg::Value(v) => count += v.to_number().is_ok() as usize,
        }
    }
    Ok(CellData::Number(count as f64))
}

/// COUNTA function: every non-empty value, errors included
pub fn fn_counta(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let mut count = 0usize;
    for arg in args {
        match arg {
            Arg::Range(r) => count += r.view.values().filter(|v| !v.is_empty()).count(),
            Arg::Value(v) => count += !v.is_empty() as usize,
        }
    }
    Ok(CellData::Number(count as f64))
}

/// COUNTBLANK function: empty cells and empty strings
pub fn fn_countblank(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let r = range(args, 0)?;
    let count = r
        .view
        .values()
        .filter(|v| match v {
            CellData::Empty => true,
            CellData::Text(s) => s.is_empty(),
            _ => false,
        })
        .count();
    Ok(CellData::Number(count as f64))
}

/// MEDIAN function
pub fn fn_median(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let mut numbers = collect_numbers(args)?;
    median(&mut numbers)
}

/// LARGE(array, k)
pub fn fn_large(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(&args[..1])?;
    kth(numbers, number(args, 1)?, true)
}

/// SMALL(array, k)
pub fn fn_small(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(&args[..1])?;
    kth(numbers, number(args, 1)?, false)
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let r = range(args, 0)?;
    let matcher = CriteriaMatcher::new(&scalar(args, 1));
    let count = r.view.values().filter(|v| matcher.matches(v)).count();
    Ok(CellData::Number(count as f64))
}

/// AVERAGEIF(range, criteria, [average_range])
pub fn fn_averageif(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let test_range = range(args, 0)?;
    let matcher = CriteriaMatcher::new(&scalar(args, 1));
    let avg_view = match args.get(2) {
        Some(_) => range(args, 2)?.view,
        None => test_range.view,
    };

    let mut numbers = Vec::new();
    for r in 0..test_range.view.row_count() {
        for c in 0..test_range.view.col_count() {
            if !matcher.matches(test_range.view.value(r, c)) {
                continue;
            }
            let at = avg_view.absolute(r, c);
            match avg_view.worksheet().value_ref(at.row, at.col) {
                Some(CellData::Error(e)) => return Err(*e),
                Some(v) => numbers.extend(v.as_number()),
                None => {}
            }
        }
    }
    average(&numbers)
}

// === SUBTOTAL / AGGREGATE ===

/// Which cells an aggregation skips
#[derive(Debug, Clone, Copy, Default)]
struct SkipRules {
    nested: bool,
    hidden: bool,
    errors: bool,
}

/// Values gathered for an aggregation
#[derive(Debug, Default)]
struct Gathered {
    numbers: Vec<f64>,
    non_empty: usize,
}

/// Check if formula text calls SUBTOTAL or AGGREGATE
fn is_aggregate_formula(formula: &str) -> bool {
    let tokens = tokenize(formula);
    tokens.windows(2).any(|pair| match (&pair[0].kind, &pair[1].kind) {
        (TokenKind::Identifier(name), TokenKind::LParen) => {
            name.eq_ignore_ascii_case("SUBTOTAL") || name.eq_ignore_ascii_case("AGGREGATE")
        }
        _ => false,
    })
}

fn gather(args: &[Arg], rules: SkipRules) -> Result<Gathered, CellError> {
    let mut out = Gathered::default();
    for arg in args {
        match arg {
            Arg::Range(r) => {
                for (at, value) in r.view.cells() {
                    if rules.hidden && r.view.is_row_hidden(at.row) {
                        continue;
                    }
                    if rules.nested && r.view.formula_at(at).is_some_and(is_aggregate_formula) {
                        continue;
                    }
                    match value {
                        CellData::Empty => {}
                        CellData::Error(_) if rules.errors => {}
                        CellData::Error(e) => return Err(*e),
                        v => {
                            out.non_empty += 1;
                            out.numbers.extend(v.as_number());
                        }
                    }
                }
            }
            Arg::Value(CellData::Error(_)) if rules.errors => {}
            Arg::Value(CellData::Error(e)) => return Err(*e),
            Arg::Value(CellData::Empty) => {}
            Arg::Value(v) => {
                out.non_empty += 1;
                out.numbers.push(v.to_number()?);
            }
        }
    }
    Ok(out)
}

/// SUBTOTAL(function_num, ref1, ...)
///
/// Codes 1-11 and 101-111. Cells holding SUBTOTAL or AGGREGATE formulas
/// are always skipped; the 10x codes also skip hidden rows.
pub fn fn_subtotal(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let code = number(args, 0)?.trunc() as i64;
    let (function, hidden) = match code {
        1..=11 => (code, false),
        101..=111 => (code - 100, true),
        _ => return Err(CellError::Value),
    };
    let refs = &args[1..];
    if refs.iter().any(|a| a.as_range().is_none()) {
        // Only references can be subtotalled; errors pass through
        return Err(refs
            .iter()
            .find_map(|a| match a {
                Arg::Value(CellData::Error(e)) => Some(*e),
                _ => None,
            })
            .unwrap_or(CellError::Value));
    }
    let rules = SkipRules {
        nested: true,
        hidden,
        errors: false,
    };
    let mut gathered = gather(refs, rules)?;
    apply(function, &mut gathered, None)
}

/// AGGREGATE(function_num, options, ref1, [ref2 | k])
///
/// Functions 1-19; options 0-7 choose which of nested aggregates, hidden
/// rows and error values are skipped. Functions 14-19 take `k` as the
/// fourth argument.
pub fn fn_aggregate(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let function = number(args, 0)?.trunc() as i64;
    let options = number(args, 1)?.trunc() as i64;
    if !(1..=19).contains(&function) || !(0..=7).contains(&options) {
        return Err(CellError::Value);
    }
    let rules = SkipRules {
        nested: options <= 3,
        hidden: matches!(options, 1 | 3 | 5 | 7),
        errors: matches!(options, 2 | 3 | 6 | 7),
    };

    let (refs, k) = if function >= 14 {
        if args.len() != 4 {
            return Err(CellError::Value);
        }
        (&args[2..3], Some(number(args, 3)?))
    } else {
        (&args[2..], None)
    };
    let mut gathered = gather(refs, rules)?;
    apply(function, &mut gathered, k)
}

fn apply(function: i64, g: &mut Gathered, k: Option<f64>) -> FunctionResult {
    let n = g.numbers.len();
    let numbers = &mut g.numbers;
    match function {
        1 => average(numbers),
        2 => Ok(CellData::Number(n as f64)),
        3 => Ok(CellData::Number(g.non_empty as f64)),
        4 => Ok(CellData::Number(numbers.iter().copied().reduce(f64::max).unwrap_or(0.0))),
        5 => Ok(CellData::Number(numbers.iter().copied().reduce(f64::min).unwrap_or(0.0))),
        6 if n == 0 => Ok(CellData::Number(0.0)),
        6 => Ok(CellData::Number(numbers.iter().product())),
        7 => variance(numbers, true).map(|v| CellData::Number(v.sqrt())),
        8 => variance(numbers, false).map(|v| CellData::Number(v.sqrt())),
        9 => Ok(CellData::Number(numbers.iter().sum())),
        10 => variance(numbers, true).map(CellData::Number),
        11 => variance(numbers, false).map(CellData::Number),
        12 => median(numbers),
        13 => mode(numbers),
        14 => kth(std::mem::take(numbers), k.unwrap_or(0.0), true),
        15 => kth(std::mem::take(numbers), k.unwrap_or(0.0), false),
        16 => percentile_inc(numbers, k.unwrap_or(-1.0)),
        17 => quartile(numbers, k.unwrap_or(-1.0), true),
        18 => percentile_exc(numbers, k.unwrap_or(-1.0)),
        19 => quartile(numbers, k.unwrap_or(-1.0), false),
        _ => Err(CellError::Value),
    }
}

// === Numeric helpers ===

fn average(numbers: &[f64]) -> FunctionResult {
    if numbers.is_empty() {
        return Err(CellError::Div0);
    }
    Ok(CellData::Number(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

fn sort(numbers: &mut [f64]) {
    numbers.sort_by(|a, b| a.total_cmp(b));
}

fn median(numbers: &mut [f64]) -> FunctionResult {
    if numbers.is_empty() {
        return Err(CellError::Num);
    }
    sort(numbers);
    let mid = numbers.len() / 2;
    let value = if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    } else {
        numbers[mid]
    };
    Ok(CellData::Number(value))
}

fn mode(numbers: &[f64]) -> FunctionResult {
    // Most frequent value; ties go to the first one seen
    let mut best: Option<(f64, usize)> = None;
    for (i, &x) in numbers.iter().enumerate() {
        let count = numbers[i..].iter().filter(|&&y| y == x).count();
        if count > 1 && best.map_or(true, |(_, c)| count > c) {
            best = Some((x, count));
        }
    }
    best.map(|(x, _)| CellData::Number(x)).ok_or(CellError::NA)
}

fn variance(numbers: &[f64], sample: bool) -> Result<f64, CellError> {
    let n = numbers.len();
    let denominator = if sample { n.saturating_sub(1) } else { n };
    if denominator == 0 {
        return Err(CellError::Div0);
    }
    let mean = numbers.iter().sum::<f64>() / n as f64;
    let squares: f64 = numbers.iter().map(|x| (x - mean).powi(2)).sum();
    Ok(squares / denominator as f64)
}

fn kth(mut numbers: Vec<f64>, k: f64, largest: bool) -> FunctionResult {
    let k = k.ceil();
    if k < 1.0 || k > numbers.len() as f64 {
        return Err(CellError::Num);
    }
    sort(&mut numbers);
    if largest {
        numbers.reverse();
    }
    Ok(CellData::Number(numbers[k as usize - 1]))
}

fn interpolate(sorted: &[f64], rank: f64) -> f64 {
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    sorted[lower] + (rank - lower as f64) * (sorted[upper] - sorted[lower])
}

fn percentile_inc(numbers: &mut [f64], k: f64) -> FunctionResult {
    if numbers.is_empty() || !(0.0..=1.0).contains(&k) {
        return Err(CellError::Num);
    }
    sort(numbers);
    let rank = k * (numbers.len() - 1) as f64;
    Ok(CellData::Number(interpolate(numbers, rank)))
}

fn percentile_exc(numbers: &mut [f64], k: f64) -> FunctionResult {
    let n = numbers.len() as f64;
    if numbers.is_empty() || k <= 0.0 || k >= 1.0 {
        return Err(CellError::Num);
    }
    let rank = k * (n + 1.0) - 1.0;
    if rank < 0.0 || rank > n - 1.0 {
        return Err(CellError::Num);
    }
    sort(numbers);
    Ok(CellData::Number(interpolate(numbers, rank)))
}

fn quartile(numbers: &mut [f64], quart: f64, inclusive: bool) -> FunctionResult {
    let quart = quart.trunc();
    if inclusive {
        if !(0.0..=4.0).contains(&quart) {
            return Err(CellError::Num);
        }
        percentile_inc(numbers, quart / 4.0)
    } else {
        if !(1.0..=3.0).contains(&quart) {
            return Err(CellError::Num);
        }
        percentile_exc(numbers, quart / 4.0)
    }
}
