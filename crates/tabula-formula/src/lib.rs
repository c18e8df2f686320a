//! # tabula-formula
//!
//! Formula language for tabula.
//!
//! This crate provides:
//! - Tokenizing and error-recovering parsing (text → AST)
//! - Evaluation against a set of worksheets (AST → value)
//! - The built-in function registry and editor function hints
//! - Dependency tracking and cycle-aware scheduling
//! - Token-level reference rewriting for structural edits
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{Cell, CellData, Worksheet};
//! use tabula_formula::{evaluate_formula, parse_formula, EvaluationContext};
//!
//! let mut sheet = Worksheet::new("Sheet1", 10, 10);
//! sheet.set_cell(0, 0, Cell::new(CellData::Number(2.0))).unwrap();
//!
//! let parsed = parse_formula("=A1*21");
//! let sheets = [sheet];
//! let ctx = EvaluationContext::new(&sheets, 0, 0, 1);
//! assert_eq!(evaluate_formula(parsed.root.as_ref(), &ctx), CellData::Number(42.0));
//! ```

pub mod adjust;
pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod hint;
pub mod lexer;
pub mod parser;

#[cfg(test)]
mod test_util;

pub use adjust::{FormulaAdjustment, StructuralChange};
pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, Reference};
pub use dependency::{precedents_of, CalcGroup, CellKey, DependencyGraph};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{compare_values, evaluate, evaluate_formula, Arg, EvaluationContext, RangeArg};
pub use functions::{ArgKind, FunctionDef, FunctionRegistry, ResolvedHint};
pub use hint::{find_function_hint, FunctionHint};
pub use parser::{parse_formula, parse_reference, ParsedFormula};
