//! Math functions

use rand::Rng;
use tabula_core::{CellData, CellError};

use super::criteria::CriteriaMatcher;
use super::{collect_numbers, number, opt_number, range, round_half_away, scalar, FunctionResult};
use crate::evaluator::{Arg, EvaluationContext};

/// SUM function
pub fn fn_sum(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(collect_numbers(args)?.iter().sum()))
}

/// PRODUCT function
pub fn fn_product(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    if numbers.is_empty() {
        return Ok(CellData::Number(0.0));
    }
    Ok(CellData::Number(numbers.iter().product()))
}

/// ABS function
pub fn fn_abs(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(number(args, 0)?.abs()))
}

/// MOD function (result takes the divisor's sign)
pub fn fn_mod(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number(args, 0)?;
    let d = number(args, 1)?;
    if d == 0.0 {
        return Err(CellError::Div0);
    }
    Ok(CellData::Number(n - d * (n / d).floor()))
}

/// INT function (rounds down toward negative infinity)
pub fn fn_int(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(number(args, 0)?.floor()))
}

fn digits(args: &[Arg], i: usize) -> Result<i32, CellError> {
    Ok(opt_number(args, i, 0.0)?.trunc().clamp(-308.0, 308.0) as i32)
}

/// ROUND function, half away from zero
pub fn fn_round(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number(args, 0)?;
    Ok(CellData::Number(round_half_away(n, digits(args, 1)?)))
}

/// Scale, apply `f` to the magnitude, scale back
fn round_with(n: f64, digits: i32, f: fn(f64) -> f64) -> f64 {
    let factor = 10f64.powi(digits.abs());
    let magnitude = n.abs();
    let rounded = if digits >= 0 {
        // Strip representation noise before rounding outward
        f((magnitude * factor * 1e9).round() / 1e9) / factor
    } else {
        f(magnitude / factor) * factor
    };
    rounded.copysign(n)
}

/// ROUNDUP function (away from zero)
pub fn fn_roundup(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number(args, 0)?;
    Ok(CellData::Number(round_with(n, digits(args, 1)?, f64::ceil)))
}

/// ROUNDDOWN function (toward zero)
pub fn fn_rounddown(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number(args, 0)?;
    Ok(CellData::Number(round_with(n, digits(args, 1)?, f64::floor)))
}

/// TRUNC function
pub fn fn_trunc(args: &[Arg], ctx: &EvaluationContext) -> FunctionResult {
    fn_rounddown(args, ctx)
}

/// RAND function (volatile)
pub fn fn_rand(_args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(rand::thread_rng().gen::<f64>()))
}

/// RANDBETWEEN function (volatile)
pub fn fn_randbetween(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let low = number(args, 0)?.ceil();
    let high = number(args, 1)?.floor();
    if low > high {
        return Err(CellError::Num);
    }
    let n = rand::thread_rng().gen_range(low as i64..=high as i64);
    Ok(CellData::Number(n as f64))
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let test_range = range(args, 0)?;
    let matcher = CriteriaMatcher::new(&scalar(args, 1));
    // The sum range takes the test range's shape from its top-left corner
    let sum_view = match args.get(2) {
        Some(_) => range(args, 2)?.view,
        None => test_range.view,
    };

    let mut total = 0.0;
    for r in 0..test_range.view.row_count() {
        for c in 0..test_range.view.col_count() {
            if !matcher.matches(test_range.view.value(r, c)) {
                continue;
            }
            let at = sum_view.absolute(r, c);
            match sum_view.worksheet().value_ref(at.row, at.col) {
                Some(CellData::Error(e)) => return Err(*e),
                Some(v) => total += v.as_number().unwrap_or(0.0),
                None => {}
            }
        }
    }
    Ok(CellData::Number(total))
}

#[cfg(test)]
mod tests {
    use crate::test_util::{eval, eval_with};
    use pretty_assertions::assert_eq;
    use tabula_core::{CellData, CellError};

    #[test]
    fn test_sum_ignores_text_in_ranges() {
        let cells = [("A1", "1"), ("A2", "x"), ("A3", "2"), ("A4", "TRUE")];
        assert_eq!(eval_with(&cells, "=SUM(A1:A4)"), CellData::Number(3.0));
        assert_eq!(eval_with(&cells, "=SUM(A1:A4,\"5\",TRUE)"), CellData::Number(9.0));
        assert_eq!(eval("=SUM(\"x\")"), CellData::Error(CellError::Value));
    }

    #[test]
    fn test_sum_propagates_errors() {
        let cells = [("A1", "1"), ("A2", "#N/A")];
        assert_eq!(eval_with(&cells, "=SUM(A1:A2)"), CellData::Error(CellError::NA));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(eval("=ROUND(2.5,0)"), CellData::Number(3.0));
        assert_eq!(eval("=ROUND(0-2.5,0)"), CellData::Number(-3.0));
        assert_eq!(eval("=ROUND(3.14159,2)"), CellData::Number(3.14));
        assert_eq!(eval("=ROUND(1234,0-2)"), CellData::Number(1200.0));
    }

    #[test]
    fn test_roundup_rounddown_trunc_int() {
        assert_eq!(eval("=ROUNDUP(3.2,0)"), CellData::Number(4.0));
        assert_eq!(eval("=ROUNDUP(0-3.2,0)"), CellData::Number(-4.0));
        assert_eq!(eval("=ROUNDDOWN(3.789,1)"), CellData::Number(3.7));
        assert_eq!(eval("=TRUNC(0-8.9)"), CellData::Number(-8.0));
        assert_eq!(eval("=INT(0-8.9)"), CellData::Number(-9.0));
    }

    #[test]
    fn test_mod_and_abs() {
        assert_eq!(eval("=MOD(10,3)"), CellData::Number(1.0));
        assert_eq!(eval("=MOD(0-10,3)"), CellData::Number(2.0));
        assert_eq!(eval("=MOD(1,0)"), CellData::Error(CellError::Div0));
        assert_eq!(eval("=ABS(0-4)"), CellData::Number(4.0));
    }

    #[test]
    fn test_product() {
        assert_eq!(eval("=PRODUCT(2,3,4)"), CellData::Number(24.0));
    }

    #[test]
    fn test_rand_ranges() {
        for _ in 0..20 {
            let CellData::Number(n) = eval("=RAND()") else {
                panic!("RAND must be numeric");
            };
            assert!((0.0..1.0).contains(&n));
            let CellData::Number(n) = eval("=RANDBETWEEN(1,3)") else {
                panic!("RANDBETWEEN must be numeric");
            };
            assert!([1.0, 2.0, 3.0].contains(&n));
        }
        assert_eq!(eval("=RANDBETWEEN(5,1)"), CellData::Error(CellError::Num));
    }

    #[test]
    fn test_sumif() {
        let cells = [
            ("A1", "apple"),
            ("A2", "pear"),
            ("A3", "apricot"),
            ("B1", "10"),
            ("B2", "20"),
            ("B3", "30"),
        ];
        assert_eq!(eval_with(&cells, "=SUMIF(A1:A3,\"ap*\",B1:B3)"), CellData::Number(40.0));
        assert_eq!(eval_with(&cells, "=SUMIF(B1:B3,\">15\")"), CellData::Number(50.0));
        assert_eq!(eval_with(&cells, "=SUMIF(A1:A3,\"pear\",B1)"), CellData::Number(20.0));
    }
}
