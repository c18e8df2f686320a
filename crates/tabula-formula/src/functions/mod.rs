//! Built-in functions
//!
//! Every function is a plain `fn` registered once in a global, immutable
//! table keyed by its uppercase name.

pub mod criteria;
pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
mod number_format;
pub mod statistical;
pub mod text;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use tabula_core::{CellData, CellError};

use crate::evaluator::{Arg, EvaluationContext, RangeArg};
use crate::hint::{find_function_hint, FunctionHint};

/// What a function returns: a value, or the error it evaluates to
pub type FunctionResult = Result<CellData, CellError>;

/// Function implementation signature
pub type FunctionImpl = fn(&[Arg<'_>], &EvaluationContext<'_>) -> FunctionResult;

/// How an argument position is evaluated before the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Evaluated to a single value; a 1x1 range collapses to its cell
    Scalar,
    /// Cell and range references arrive as lazy ranges
    Range,
    /// References arrive as ranges, anything else as a value
    Any,
}

/// Function definition
#[derive(Debug)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Kind per position; the last entry repeats for further arguments
    pub arg_kinds: &'static [ArgKind],
    /// Is volatile (recalculates every pass)
    pub volatile: bool,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check an argument count against the arity contract
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Kind of the argument at `index`
    pub fn arg_kind(&self, index: usize) -> ArgKind {
        self.arg_kinds
            .get(index)
            .or_else(|| self.arg_kinds.last())
            .copied()
            .unwrap_or(ArgKind::Scalar)
    }
}

/// A function hint with its definition attached, when the name is known
#[derive(Debug)]
pub struct ResolvedHint<'a> {
    pub hint: FunctionHint,
    pub function: Option<&'a FunctionDef>,
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

use ArgKind::{Any, Range, Scalar};

const S: &[ArgKind] = &[Scalar];
const ANY: &[ArgKind] = &[Any];
const RANGE: &[ArgKind] = &[Range];
const CRITERIA: &[ArgKind] = &[Range, Scalar, Range];
const LOOKUP: &[ArgKind] = &[Scalar, Range, Scalar];
const XLOOKUP: &[ArgKind] = &[Scalar, Range, Range, Scalar];
const INDEX: &[ArgKind] = &[Range, Scalar];
const SUBTOTAL: &[ArgKind] = &[Scalar, Range];
const AGGREGATE: &[ArgKind] = &[Scalar, Scalar, Any];
const TEXTJOIN: &[ArgKind] = &[Scalar, Scalar, Any];
const K_ARG: &[ArgKind] = &[Any, Scalar];

impl FunctionRegistry {
    /// The shared registry of built-in functions
    pub fn global() -> &'static FunctionRegistry {
        &REGISTRY
    }

    fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_statistical_functions();
        registry.register_logical_functions();
        registry.register_info_functions();
        registry.register_lookup_functions();
        registry.register_text_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_ascii_uppercase().as_str())
    }

    /// Check if a function re-evaluates on every pass
    pub fn is_volatile(&self, name: &str) -> bool {
        self.get(name).is_some_and(|f| f.volatile)
    }

    /// Sorted names of every registered function
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Hint for the function call enclosing `caret` (a char offset)
    pub fn function_hint(&self, formula: &str, caret: usize) -> Option<ResolvedHint<'_>> {
        let hint = find_function_hint(formula, caret)?;
        let function = self.get(&hint.name);
        Some(ResolvedHint { hint, function })
    }

    fn register(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        arg_kinds: &'static [ArgKind],
        implementation: FunctionImpl,
    ) {
        self.functions.insert(
            name,
            FunctionDef {
                name,
                min_args,
                max_args,
                arg_kinds,
                volatile: false,
                implementation,
            },
        );
    }

    fn register_volatile(&mut self, name: &'static str, max_args: usize, implementation: FunctionImpl) {
        self.functions.insert(
            name,
            FunctionDef {
                name,
                min_args: max_args,
                max_args: Some(max_args),
                arg_kinds: S,
                volatile: true,
                implementation,
            },
        );
    }

    fn register_math_functions(&mut self) {
        self.register("SUM", 1, None, ANY, math::fn_sum);
        self.register("PRODUCT", 1, None, ANY, math::fn_product);
        self.register("ABS", 1, Some(1), S, math::fn_abs);
        self.register("MOD", 2, Some(2), S, math::fn_mod);
        self.register("INT", 1, Some(1), S, math::fn_int);
        self.register("ROUND", 2, Some(2), S, math::fn_round);
        self.register("ROUNDUP", 2, Some(2), S, math::fn_roundup);
        self.register("ROUNDDOWN", 2, Some(2), S, math::fn_rounddown);
        self.register("TRUNC", 1, Some(2), S, math::fn_trunc);
        self.register("SUMIF", 2, Some(3), CRITERIA, math::fn_sumif);
        self.register_volatile("RAND", 0, math::fn_rand);
        self.register_volatile("RANDBETWEEN", 2, math::fn_randbetween);
    }

    fn register_statistical_functions(&mut self) {
        self.register("AVERAGE", 1, None, ANY, statistical::fn_average);
        self.register("MIN", 1, None, ANY, statistical::fn_min);
        self.register("MAX", 1, None, ANY, statistical::fn_max);
        self.register("COUNT", 1, None, ANY, statistical::fn_count);
        self.register("COUNTA", 1, None, ANY, statistical::fn_counta);
        self.register("COUNTBLANK", 1, Some(1), RANGE, statistical::fn_countblank);
        self.register("MEDIAN", 1, None, ANY, statistical::fn_median);
        self.register("LARGE", 2, Some(2), K_ARG, statistical::fn_large);
        self.register("SMALL", 2, Some(2), K_ARG, statistical::fn_small);
        self.register("COUNTIF", 2, Some(2), CRITERIA, statistical::fn_countif);
        self.register("AVERAGEIF", 2, Some(3), CRITERIA, statistical::fn_averageif);
        self.register("SUBTOTAL", 2, None, SUBTOTAL, statistical::fn_subtotal);
        self.register("AGGREGATE", 3, None, AGGREGATE, statistical::fn_aggregate);
    }

    fn register_logical_functions(&mut self) {
        self.register("IF", 2, Some(3), S, logical::fn_if);
        self.register("IFERROR", 2, Some(2), S, logical::fn_iferror);
        self.register("AND", 1, None, ANY, logical::fn_and);
        self.register("OR", 1, None, ANY, logical::fn_or);
        self.register("NOT", 1, Some(1), S, logical::fn_not);
        self.register("CHOOSE", 2, None, S, logical::fn_choose);
    }

    fn register_info_functions(&mut self) {
        self.register("ISBLANK", 1, Some(1), S, info::fn_isblank);
        self.register("ISNUMBER", 1, Some(1), S, info::fn_isnumber);
        self.register("ISTEXT", 1, Some(1), S, info::fn_istext);
        self.register("ISERROR", 1, Some(1), S, info::fn_iserror);
        self.register("ISNA", 1, Some(1), S, info::fn_isna);
    }

    fn register_lookup_functions(&mut self) {
        self.register("VLOOKUP", 3, Some(4), LOOKUP, lookup::fn_vlookup);
        self.register("HLOOKUP", 3, Some(4), LOOKUP, lookup::fn_hlookup);
        self.register("MATCH", 2, Some(3), LOOKUP, lookup::fn_match);
        self.register("XLOOKUP", 3, Some(6), XLOOKUP, lookup::fn_xlookup);
        self.register("INDEX", 1, Some(3), INDEX, lookup::fn_index);
        self.register("ROW", 0, Some(1), RANGE, lookup::fn_row);
        self.register("ROWS", 1, Some(1), RANGE, lookup::fn_rows);
        self.register("COLUMN", 0, Some(1), RANGE, lookup::fn_column);
        self.register("COLUMNS", 1, Some(1), RANGE, lookup::fn_columns);
    }

    fn register_text_functions(&mut self) {
        self.register("LEFT", 1, Some(2), S, text::fn_left);
        self.register("RIGHT", 1, Some(2), S, text::fn_right);
        self.register("MID", 3, Some(3), S, text::fn_mid);
        self.register("LEN", 1, Some(1), S, text::fn_len);
        self.register("FIND", 2, Some(3), S, text::fn_find);
        self.register("SEARCH", 2, Some(3), S, text::fn_search);
        self.register("SUBSTITUTE", 3, Some(4), S, text::fn_substitute);
        self.register("REPLACE", 4, Some(4), S, text::fn_replace);
        self.register("TRIM", 1, Some(1), S, text::fn_trim);
        self.register("PROPER", 1, Some(1), S, text::fn_proper);
        self.register("UPPER", 1, Some(1), S, text::fn_upper);
        self.register("LOWER", 1, Some(1), S, text::fn_lower);
        self.register("REPT", 2, Some(2), S, text::fn_rept);
        self.register("TEXT", 2, Some(2), S, text::fn_text);
        self.register("TEXTJOIN", 3, None, TEXTJOIN, text::fn_textjoin);
        self.register("CONCAT", 1, None, ANY, text::fn_concat);
        self.register("CONCATENATE", 1, None, S, text::fn_concatenate);
    }

    fn register_date_functions(&mut self) {
        self.register_volatile("TODAY", 0, date::fn_today);
        self.register_volatile("NOW", 0, date::fn_now);
        self.register("DATE", 3, Some(3), S, date::fn_date);
        self.register("YEAR", 1, Some(1), S, date::fn_year);
        self.register("MONTH", 1, Some(1), S, date::fn_month);
        self.register("DAY", 1, Some(1), S, date::fn_day);
        self.register("HOUR", 1, Some(1), S, date::fn_hour);
        self.register("MINUTE", 1, Some(1), S, date::fn_minute);
        self.register("SECOND", 1, Some(1), S, date::fn_second);
        self.register("WEEKDAY", 1, Some(2), S, date::fn_weekday);
        self.register("WEEKNUM", 1, Some(2), S, date::fn_weeknum);
        self.register("VALUE", 1, Some(1), S, date::fn_value);
    }
}

// === Argument helpers shared by the function modules ===

/// Scalar value of argument `i` (Empty when omitted)
pub(crate) fn scalar(args: &[Arg], i: usize) -> CellData {
    args.get(i).map(Arg::scalar).unwrap_or_default()
}

/// Argument `i` coerced to a number
pub(crate) fn number(args: &[Arg], i: usize) -> Result<f64, CellError> {
    scalar(args, i).to_number()
}

/// Optional numeric argument; omitted or blank uses `default`
pub(crate) fn opt_number(args: &[Arg], i: usize, default: f64) -> Result<f64, CellError> {
    match args.get(i).map(Arg::scalar) {
        None | Some(CellData::Empty) => Ok(default),
        Some(v) => v.to_number(),
    }
}

/// Argument `i` coerced to text
pub(crate) fn text(args: &[Arg], i: usize) -> Result<String, CellError> {
    scalar(args, i).to_text()
}

/// Optional boolean argument
pub(crate) fn opt_bool(args: &[Arg], i: usize, default: bool) -> Result<bool, CellError> {
    match args.get(i).map(Arg::scalar) {
        None | Some(CellData::Empty) => Ok(default),
        Some(v) => v.to_bool(),
    }
}

/// Argument `i` as a range; errors pass through, other values are `#VALUE!`
pub(crate) fn range<'r, 'a>(args: &'r [Arg<'a>], i: usize) -> Result<&'r RangeArg<'a>, CellError> {
    match args.get(i) {
        Some(Arg::Range(r)) => Ok(r),
        Some(Arg::Value(CellData::Error(e))) => Err(*e),
        _ => Err(CellError::Value),
    }
}

/// Collect numbers the way SUM does
///
/// Inside ranges only numbers and dates count. Direct values are coerced,
/// so `SUM("3", TRUE)` is 4 but `SUM("x")` is `#VALUE!`. Errors win.
pub(crate) fn collect_numbers(args: &[Arg]) -> Result<Vec<f64>, CellError> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Range(r) => {
                for value in r.view.values() {
                    if let CellData::Error(e) = value {
                        return Err(*e);
                    }
                    if let Some(n) = value.as_number() {
                        out.push(n);
                    }
                }
            }
            Arg::Value(CellData::Empty) => {}
            Arg::Value(v) => out.push(v.to_number()?),
        }
    }
    Ok(out)
}

/// Flatten every argument into values, ranges row by row
pub(crate) fn flatten<'r>(args: &'r [Arg<'r>]) -> impl Iterator<Item = CellData> + 'r {
    args.iter().flat_map(|arg| -> Box<dyn Iterator<Item = CellData> + 'r> {
        match arg {
            Arg::Range(r) => Box::new(r.view.values().cloned()),
            Arg::Value(v) => Box::new(std::iter::once(v.clone())),
        }
    })
}

/// Round half away from zero to `digits` decimal places
pub(crate) fn round_half_away(n: f64, digits: i32) -> f64 {
    // 2.675 * 100 is 267.4999..., so nudge by a relative epsilon first
    let nudge = |x: f64| x + x.signum() * x.abs() * 1e-12;
    if digits >= 0 {
        let factor = 10f64.powi(digits);
        nudge(n * factor).round() / factor
    } else {
        let factor = 10f64.powi(-digits);
        nudge(n / factor).round() * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::global();
        assert_eq!(registry.get("sum").map(|f| f.name), Some("SUM"));
        assert!(registry.get("NOPE").is_none());
        assert!(registry.is_volatile("rand"));
        assert!(registry.is_volatile("TODAY"));
        assert!(!registry.is_volatile("SUM"));
    }

    #[test]
    fn test_arity_and_kinds() {
        let registry = FunctionRegistry::global();
        let vlookup = registry.get("VLOOKUP").unwrap();
        assert!(!vlookup.accepts(2));
        assert!(vlookup.accepts(4));
        assert!(!vlookup.accepts(5));
        assert_eq!(vlookup.arg_kind(1), ArgKind::Range);
        assert_eq!(vlookup.arg_kind(3), ArgKind::Scalar);

        let sum = registry.get("SUM").unwrap();
        assert!(sum.accepts(30));
        assert_eq!(sum.arg_kind(10), ArgKind::Any);
    }

    #[test]
    fn test_every_listed_function_is_registered() {
        let registry = FunctionRegistry::global();
        for name in [
            "SUM", "AVERAGE", "MIN", "MAX", "COUNT", "COUNTA", "LARGE", "SMALL", "SUBTOTAL",
            "AGGREGATE", "RAND", "RANDBETWEEN", "ROUND", "ROUNDUP", "ROUNDDOWN", "TRUNC", "INT",
            "IF", "IFERROR", "AND", "OR", "NOT", "CHOOSE", "VLOOKUP", "HLOOKUP", "INDEX",
            "XLOOKUP", "ROW", "ROWS", "COLUMN", "COLUMNS", "LEFT", "RIGHT", "MID", "LEN", "FIND",
            "SEARCH", "SUBSTITUTE", "REPLACE", "TRIM", "PROPER", "UPPER", "LOWER", "REPT", "TEXT",
            "TEXTJOIN", "CONCAT", "TODAY", "NOW", "YEAR", "MONTH", "DAY", "HOUR", "MINUTE",
            "SECOND", "WEEKDAY", "WEEKNUM", "VALUE",
        ] {
            assert!(registry.get(name).is_some(), "{} missing", name);
        }
    }

    #[test]
    fn test_round_half_away() {
        assert_eq!(round_half_away(2.5, 0), 3.0);
        assert_eq!(round_half_away(-2.5, 0), -3.0);
        assert_eq!(round_half_away(2.675, 2), 2.68);
        assert_eq!(round_half_away(1234.5678, -2), 1200.0);
        assert_eq!(round_half_away(0.4, 0), 0.0);
    }
}
