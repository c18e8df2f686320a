//! Formula abstract syntax tree types

use std::fmt;
use tabula_core::{format_number, CellError, CellRef, RangeRef};

/// Formula expression AST
///
/// Parenthesized groups have no node of their own; the tree shape already
/// encodes them.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal (`#REF!` left behind by reference rewriting, etc.)
    Error(CellError),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },

    // === Function call ===
    Function { name: String, args: Vec<FormulaExpr> },
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellRef,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: RangeRef,
}

/// A reference leaf of a formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reference<'a> {
    Cell(&'a CellReference),
    Range(&'a RangeReference),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Text
    Concat,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOperator {
    /// Surface syntax of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Concat => "&",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }

    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 1,
            BinaryOperator::Concat => 2,
            BinaryOperator::Add | BinaryOperator::Subtract => 3,
            BinaryOperator::Multiply | BinaryOperator::Divide => 4,
        }
    }

    /// Check if this is a comparison
    pub fn is_comparison(&self) -> bool {
        self.precedence() == 1
    }
}

impl FormulaExpr {
    /// Collect every cell and range reference in the tree, left to right
    pub fn references(&self) -> Vec<Reference<'_>> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                FormulaExpr::CellRef(r) => out.push(Reference::Cell(r)),
                FormulaExpr::RangeRef(r) => out.push(Reference::Range(r)),
                FormulaExpr::BinaryOp { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
                FormulaExpr::Function { args, .. } => stack.extend(args.iter().rev()),
                _ => {}
            }
        }
        out
    }

    /// Names of every function called in the tree
    pub fn function_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                FormulaExpr::Function { name, args } => {
                    out.push(name.as_str());
                    stack.extend(args.iter());
                }
                FormulaExpr::BinaryOp { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
                _ => {}
            }
        }
        out
    }

    fn fmt_operand(
        &self,
        f: &mut fmt::Formatter<'_>,
        parent: BinaryOperator,
        right_side: bool,
    ) -> fmt::Result {
        let needs_parens = match self {
            FormulaExpr::BinaryOp { op, .. } => {
                op.precedence() < parent.precedence()
                    || (right_side && op.precedence() == parent.precedence())
            }
            _ => false,
        };
        if needs_parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// Write a sheet prefix, quoting names that are not plain identifiers
pub fn write_sheet_prefix(f: &mut impl fmt::Write, sheet: &str) -> fmt::Result {
    let plain = !sheet.is_empty()
        && !sheet.starts_with(|c: char| c.is_ascii_digit())
        && sheet.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if plain {
        write!(f, "{}!", sheet)
    } else {
        write!(f, "'{}'!", sheet.replace('\'', "''"))
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write_sheet_prefix(f, sheet)?;
        }
        write!(f, "{}", self.address)
    }
}

impl fmt::Display for RangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write_sheet_prefix(f, sheet)?;
        }
        write!(f, "{}:{}", self.range.start, self.range.end)
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(n) => f.write_str(&format_number(*n)),
            FormulaExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            FormulaExpr::Error(e) => f.write_str(e.as_str()),
            FormulaExpr::CellRef(r) => write!(f, "{}", r),
            FormulaExpr::RangeRef(r) => write!(f, "{}", r),
            FormulaExpr::BinaryOp { op, left, right } => {
                left.fmt_operand(f, *op, false)?;
                f.write_str(op.symbol())?;
                right.fmt_operand(f, *op, true)
            }
            FormulaExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}
