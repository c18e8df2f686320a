//! Formula parser
//!
//! A recursive descent parser that never gives up: malformed input yields
//! the best partial tree it could build plus diagnostics. Precedence, lowest
//! to highest:
//!
//! 1. Comparison: `=`, `<>`, `<`, `<=`, `>`, `>=`
//! 2. Concatenation: `&`
//! 3. Addition/Subtraction: `+`, `-`
//! 4. Multiplication/Division: `*`, `/`
//! 5. Range: `:`
//! 6. Primary: literals, references, function calls, parentheses

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{tokenize, CellToken, Token, TokenKind};
use tabula_core::{CellError, RangeRef};

/// Deepest allowed nesting of parentheses and function calls
pub const MAX_NESTING_DEPTH: usize = 64;

/// Most binary operators allowed in one formula
pub const MAX_OPERATORS: usize = 1024;

/// Result of parsing a formula
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFormula {
    /// Best-effort tree (None when nothing usable was found)
    pub root: Option<FormulaExpr>,
    /// Diagnostics, each starting with "Unexpected token"
    pub errors: Vec<String>,
}

impl ParsedFormula {
    /// Check if the formula parsed without diagnostics
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.root.is_some()
    }

    /// Convert into a strict result, failing on the first diagnostic
    pub fn into_result(self) -> FormulaResult<FormulaExpr> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(FormulaError::Parse(first));
        }
        self.root
            .ok_or_else(|| FormulaError::Parse("Unexpected token end of input".into()))
    }
}

/// Parse a formula string
///
/// # Example
/// ```rust
/// use tabula_formula::parse_formula;
///
/// let parsed = parse_formula("=SUM(A1:A10)*2");
/// assert!(parsed.is_ok());
///
/// let parsed = parse_formula("=1+");
/// assert!(parsed.root.is_some());
/// assert!(parsed.errors[0].starts_with("Unexpected token"));
/// ```
pub fn parse_formula(formula: &str) -> ParsedFormula {
    let tokens = tokenize(formula);
    let mut parser = FormulaParser::new(&tokens);

    if !matches!(parser.current(), TokenKind::Equals) {
        let msg = format!(
            "Unexpected token {} at 0: formulas must start with '='",
            parser.current().describe()
        );
        tracing::trace!(formula, "formula without leading '='");
        return ParsedFormula {
            root: None,
            errors: vec![msg],
        };
    }
    parser.consume();

    let root = parser.parse_comparison();
    if !matches!(parser.current(), TokenKind::Eof) {
        parser.error("expected end of formula");
    }

    if !parser.errors.is_empty() {
        tracing::trace!(formula, errors = ?parser.errors, "formula parsed with errors");
    }
    ParsedFormula {
        root,
        errors: parser.errors,
    }
}

/// Parse a bare reference such as `B2`, `A1:C3` or `'My Sheet'!A1:B2`
///
/// A single cell comes back as a one-cell range.
pub fn parse_reference(text: &str) -> FormulaResult<RangeReference> {
    let tokens = tokenize(text.trim());
    let mut parser = FormulaParser::new(&tokens);
    let expr = parser.parse_range();
    let complete = parser.errors.is_empty() && matches!(parser.current(), TokenKind::Eof);

    match expr {
        Some(FormulaExpr::RangeRef(range)) if complete => Ok(range),
        Some(FormulaExpr::CellRef(cell)) if complete => Ok(RangeReference {
            sheet: cell.sheet,
            range: RangeRef::single(cell.address),
        }),
        _ => Err(FormulaError::InvalidReference(text.to_string())),
    }
}

struct FormulaParser<'t> {
    tokens: &'t [Token],
    pos: usize,
    errors: Vec<String>,
    /// Token index of the last reported error, to avoid repeats
    last_error_at: Option<usize>,
    /// Open parentheses and function calls around the current token
    depth: usize,
    operators: usize,
}

impl<'t> FormulaParser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            last_error_at: None,
            depth: 0,
            operators: 0,
        }
    }

    // === Token helpers ===

    fn current_token(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn current(&self) -> &'t TokenKind {
        static EOF: TokenKind = TokenKind::Eof;
        self.current_token().map(|t| &t.kind).unwrap_or(&EOF)
    }

    fn peek(&self) -> &'t TokenKind {
        static EOF: TokenKind = TokenKind::Eof;
        self.tokens.get(self.pos + 1).map(|t| &t.kind).unwrap_or(&EOF)
    }

    fn consume(&mut self) {
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
    }

    fn error(&mut self, expected: &str) {
        if self.last_error_at == Some(self.pos) {
            return;
        }
        self.last_error_at = Some(self.pos);
        let offset = self.current_token().map(|t| t.span.start).unwrap_or(0);
        self.errors.push(format!(
            "Unexpected token {} at {}: {}",
            self.current().describe(),
            offset,
            expected
        ));
    }

    /// Report an error and stop parsing: everything up to the end of input
    /// is left out of the tree
    fn abandon(&mut self, expected: &str) {
        self.error(expected);
        self.pos = self.tokens.len().saturating_sub(1);
        self.last_error_at = Some(self.pos);
    }

    /// Open one nesting level, or abandon the formula when it is too deep
    fn enter(&mut self) -> bool {
        if self.depth >= MAX_NESTING_DEPTH {
            self.abandon("formula nesting too deep");
            return false;
        }
        self.depth += 1;
        true
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Count a binary operator, or abandon the formula when it has too many
    fn count_operator(&mut self) -> bool {
        if self.operators >= MAX_OPERATORS {
            self.abandon("formula has too many operators");
            return false;
        }
        self.operators += 1;
        true
    }

    // === Expression levels ===

    fn parse_comparison(&mut self) -> Option<FormulaExpr> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.current() {
                TokenKind::Equals => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::Less => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::Greater => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => return Some(left),
            };
            if !self.count_operator() {
                return Some(left);
            }
            self.consume();
            let Some(right) = self.parse_concat() else {
                return Some(left);
            };
            left = binary(op, left, right);
        }
    }

    fn parse_concat(&mut self) -> Option<FormulaExpr> {
        let mut left = self.parse_additive()?;
        while matches!(self.current(), TokenKind::Ampersand) {
            if !self.count_operator() {
                break;
            }
            self.consume();
            let Some(right) = self.parse_additive() else {
                return Some(left);
            };
            left = binary(BinaryOperator::Concat, left, right);
        }
        Some(left)
    }

    fn parse_additive(&mut self) -> Option<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => return Some(left),
            };
            if !self.count_operator() {
                return Some(left);
            }
            self.consume();
            let Some(right) = self.parse_multiplicative() else {
                return Some(left);
            };
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Option<FormulaExpr> {
        let mut left = self.parse_range()?;
        loop {
            let op = match self.current() {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => return Some(left),
            };
            if !self.count_operator() {
                return Some(left);
            }
            self.consume();
            let Some(right) = self.parse_range() else {
                return Some(left);
            };
            left = binary(op, left, right);
        }
    }

    fn parse_range(&mut self) -> Option<FormulaExpr> {
        let left = self.parse_primary()?;
        if !matches!(self.current(), TokenKind::Colon) {
            return Some(left);
        }

        let FormulaExpr::CellRef(start) = &left else {
            self.error("':' must follow a cell reference");
            return Some(left);
        };
        self.consume();

        let TokenKind::CellIdentifier(CellToken { sheet, address }) = self.current() else {
            self.error("expected a cell reference after ':'");
            return Some(left);
        };
        // Sheet2!A1:B2 puts the second corner on Sheet2 too
        let end_sheet = sheet.as_ref().or(start.sheet.as_ref());
        let same_sheet = match (&start.sheet, end_sheet) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        if !same_sheet {
            self.error("range corners must be on the same sheet");
            self.consume();
            return Some(left);
        }
        self.consume();

        Some(FormulaExpr::RangeRef(RangeReference {
            sheet: start.sheet.clone(),
            range: RangeRef::new(start.address, *address),
        }))
    }

    fn parse_primary(&mut self) -> Option<FormulaExpr> {
        match self.current() {
            TokenKind::Number(n) => {
                self.consume();
                Some(FormulaExpr::Number(*n))
            }
            TokenKind::String(s) => {
                self.consume();
                Some(FormulaExpr::String(s.clone()))
            }
            TokenKind::ErrorLiteral(e) => {
                self.consume();
                Some(FormulaExpr::Error(*e))
            }
            TokenKind::CellIdentifier(CellToken { sheet, address }) => {
                self.consume();
                Some(FormulaExpr::CellRef(CellReference {
                    sheet: sheet.clone(),
                    address: *address,
                }))
            }
            TokenKind::LParen => {
                if !self.enter() {
                    return None;
                }
                self.consume();
                let inner = self.parse_comparison();
                if matches!(self.current(), TokenKind::RParen) {
                    self.consume();
                } else {
                    self.error("expected ')'");
                }
                self.leave();
                inner
            }
            TokenKind::Identifier(name) => {
                if matches!(self.peek(), TokenKind::LParen) {
                    if !self.enter() {
                        return None;
                    }
                    self.consume();
                    let call = self.parse_function_call(name);
                    self.leave();
                    return Some(call);
                }
                if name.eq_ignore_ascii_case("TRUE") {
                    self.consume();
                    return Some(FormulaExpr::Boolean(true));
                }
                if name.eq_ignore_ascii_case("FALSE") {
                    self.consume();
                    return Some(FormulaExpr::Boolean(false));
                }
                self.error("unknown name");
                self.consume();
                Some(FormulaExpr::Error(CellError::Name))
            }
            TokenKind::Minus | TokenKind::Plus => {
                self.error("unary operators are not supported, write 0-x");
                None
            }
            TokenKind::Eof => {
                self.error("expected an operand");
                None
            }
            _ => {
                self.error("expected an operand");
                None
            }
        }
    }

    /// Parse `(args)` after a function name; the name is already consumed
    fn parse_function_call(&mut self, name: &str) -> FormulaExpr {
        let name = name.to_uppercase();
        self.consume(); // '('

        let mut args = Vec::new();
        if matches!(self.current(), TokenKind::RParen) {
            self.consume();
            return FormulaExpr::Function { name, args };
        }

        loop {
            match self.parse_comparison() {
                Some(arg) => args.push(arg),
                None => self.skip_argument(),
            }
            match self.current() {
                TokenKind::Comma => self.consume(),
                TokenKind::RParen => {
                    self.consume();
                    break;
                }
                TokenKind::Eof => {
                    self.error("expected ',' or ')'");
                    break;
                }
                _ => {
                    self.error("expected ',' or ')'");
                    self.skip_argument();
                    if matches!(self.current(), TokenKind::Comma) {
                        self.consume();
                    } else {
                        if matches!(self.current(), TokenKind::RParen) {
                            self.consume();
                        }
                        break;
                    }
                }
            }
        }

        FormulaExpr::Function { name, args }
    }

    /// Skip to the next `,` or `)` at the current nesting depth
    fn skip_argument(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current() {
                TokenKind::Eof => return,
                TokenKind::Comma | TokenKind::RParen if depth == 0 => return,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
            self.consume();
        }
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::CellRef;

    fn parse_ok(formula: &str) -> FormulaExpr {
        let parsed = parse_formula(formula);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        parsed.root.unwrap()
    }

    fn cell(a1: &str) -> FormulaExpr {
        FormulaExpr::CellRef(CellReference {
            sheet: None,
            address: CellRef::parse(a1).unwrap(),
        })
    }

    #[test]
    fn test_parse_reference() {
        let r = parse_reference("'My Sheet'!B2:A1").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("My Sheet"));
        assert_eq!(r.range.top_left(), CellRef::parse("A1").unwrap());

        let single = parse_reference(" c3 ").unwrap();
        assert_eq!(single.range.cell_count(), 1);

        assert!(matches!(parse_reference("A1+1"), Err(FormulaError::InvalidReference(_))));
        assert!(parse_reference("SUM").is_err());
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_ok("=42"), FormulaExpr::Number(42.0));
        assert_eq!(parse_ok("=\"hi\""), FormulaExpr::String("hi".into()));
        assert_eq!(parse_ok("=true"), FormulaExpr::Boolean(true));
        assert_eq!(parse_ok("=#N/A"), FormulaExpr::Error(CellError::NA));
    }

    #[test]
    fn test_parse_precedence() {
        assert_eq!(parse_ok("=1+2*3").to_string(), "1+2*3");
        assert_eq!(
            parse_ok("=1+2*3"),
            binary(
                BinaryOperator::Add,
                FormulaExpr::Number(1.0),
                binary(
                    BinaryOperator::Multiply,
                    FormulaExpr::Number(2.0),
                    FormulaExpr::Number(3.0)
                )
            )
        );
        // Left associative
        assert_eq!(parse_ok("=10-4-3").to_string(), "10-4-3");
        assert_eq!(parse_ok("=10-(4-3)").to_string(), "10-(4-3)");
    }

    #[test]
    fn test_parse_comparison_and_concat() {
        assert_eq!(
            parse_ok("=A1&\"x\"=B1"),
            binary(
                BinaryOperator::Equal,
                binary(BinaryOperator::Concat, cell("A1"), FormulaExpr::String("x".into())),
                cell("B1")
            )
        );
        assert_eq!(parse_ok("=A1<>1").to_string(), "A1<>1");
    }

    #[test]
    fn test_grouping_has_no_node() {
        assert_eq!(parse_ok("=((A1))"), cell("A1"));
    }

    #[test]
    fn test_parse_function() {
        let expr = parse_ok("=sum(A1:B2, 3)");
        let FormulaExpr::Function { name, args } = expr else {
            panic!("expected function");
        };
        assert_eq!(name, "SUM");
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].to_string(), "A1:B2");
        assert_eq!(parse_ok("=RAND()").to_string(), "RAND()");
    }

    #[test]
    fn test_reversed_range_is_preserved() {
        let FormulaExpr::RangeRef(r) = parse_ok("=B3:A1") else {
            panic!("expected range");
        };
        assert_eq!(r.range.start, CellRef::parse("B3").unwrap());
        assert_eq!(r.range.end, CellRef::parse("A1").unwrap());
    }

    #[test]
    fn test_cross_sheet_ranges() {
        assert_eq!(parse_ok("=Sheet2!A1:B2").to_string(), "Sheet2!A1:B2");
        assert_eq!(parse_ok("=Sheet2!A1:sheet2!B2").to_string(), "Sheet2!A1:B2");

        let parsed = parse_formula("=Sheet1!A1:Sheet2!B2");
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].starts_with("Unexpected token"));

        let parsed = parse_formula("=A1:Sheet2!B2");
        assert!(!parsed.errors.is_empty());
    }

    #[test]
    fn test_missing_equals() {
        let parsed = parse_formula("1+2");
        assert_eq!(parsed.root, None);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].starts_with("Unexpected token"));
    }

    #[test]
    fn test_missing_operand_keeps_left() {
        let parsed = parse_formula("=1+");
        assert_eq!(parsed.root, Some(FormulaExpr::Number(1.0)));
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_missing_close_paren() {
        let parsed = parse_formula("=SUM(1,2");
        assert_eq!(parsed.root.unwrap().to_string(), "SUM(1,2)");
        assert_eq!(parsed.errors.len(), 1);

        let parsed = parse_formula("=(1+2");
        assert_eq!(parsed.root.unwrap().to_string(), "1+2");
        assert!(parsed.errors[0].starts_with("Unexpected token"));
    }

    #[test]
    fn test_bad_argument_is_skipped() {
        let parsed = parse_formula("=SUM(1,*,3)");
        assert_eq!(parsed.root.unwrap().to_string(), "SUM(1,3)");
        assert_eq!(parsed.errors.len(), 1);

        let parsed = parse_formula("=SUM(1 2,3)");
        assert_eq!(parsed.root.unwrap().to_string(), "SUM(1,3)");
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_unary_minus_is_rejected() {
        let parsed = parse_formula("=-8.9");
        assert!(!parsed.errors.is_empty());
        assert!(parsed.errors.iter().all(|e| e.starts_with("Unexpected token")));
        assert_eq!(parse_ok("=0-8.9").to_string(), "0-8.9");
    }

    #[test]
    fn test_trailing_tokens() {
        let parsed = parse_formula("=1 2");
        assert_eq!(parsed.root, Some(FormulaExpr::Number(1.0)));
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_missing_range_end() {
        let parsed = parse_formula("=A1:");
        assert_eq!(parsed.root, Some(cell("A1")));
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_unknown_name_becomes_name_error() {
        let parsed = parse_formula("=foo+1");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(
            parsed.root,
            Some(binary(
                BinaryOperator::Add,
                FormulaExpr::Error(CellError::Name),
                FormulaExpr::Number(1.0)
            ))
        );
    }

    #[test]
    fn test_deep_nesting_is_cut_off() {
        let depth = 10_000;
        let formula = format!("={}1{}", "(".repeat(depth), ")".repeat(depth));
        let parsed = parse_formula(&formula);
        assert_eq!(parsed.root, None);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].starts_with("Unexpected token"));
        assert!(parsed.errors[0].ends_with("formula nesting too deep"));

        let calls = format!("={}1{}", "ABS(".repeat(depth), ")".repeat(depth));
        let parsed = parse_formula(&calls);
        assert!(parsed.errors[0].ends_with("formula nesting too deep"));

        let limit = MAX_NESTING_DEPTH;
        let deepest = format!("={}1{}", "(".repeat(limit), ")".repeat(limit));
        assert_eq!(parse_ok(&deepest), FormulaExpr::Number(1.0));
    }

    #[test]
    fn test_operator_count_is_capped() {
        let within = format!("=1{}", "+1".repeat(MAX_OPERATORS));
        assert!(parse_formula(&within).is_ok());

        let over = format!("=1{}", "+1".repeat(10_000));
        let parsed = parse_formula(&over);
        assert!(parsed.root.is_some());
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].ends_with("formula has too many operators"));
    }

    #[test]
    fn test_into_result() {
        assert!(parse_formula("=1+1").into_result().is_ok());
        assert!(matches!(
            parse_formula("=1+").into_result(),
            Err(FormulaError::Parse(_))
        ));
    }
}
