//! Reference rewriting for structural edits, copy/paste and sheet renames
//!
//! Rewrites work on the token stream and splice new text into the original
//! formula at each reference's span, so spacing, casing and everything that
//! is not a reference survive untouched.

use std::ops::Range;

use tabula_core::{CellRef, MAX_COLS, MAX_ROWS};

use crate::ast::write_sheet_prefix;
use crate::lexer::{tokenize, CellToken, TokenKind};

const REF_ERROR: &str = "#REF!";

/// A row or column insertion/deletion on one sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralChange {
    InsertRows { at: u32, count: u32 },
    DeleteRows { at: u32, count: u32 },
    InsertColumns { at: u16, count: u16 },
    DeleteColumns { at: u16, count: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Col,
}

impl Axis {
    fn limit(self) -> u32 {
        match self {
            Axis::Row => MAX_ROWS,
            Axis::Col => MAX_COLS as u32,
        }
    }

    fn get(self, r: &CellRef) -> (u32, bool) {
        match self {
            Axis::Row => (r.row, r.row_absolute),
            Axis::Col => (r.col as u32, r.col_absolute),
        }
    }

    fn set(self, r: &mut CellRef, value: u32) {
        match self {
            Axis::Row => r.row = value,
            Axis::Col => r.col = value as u16,
        }
    }
}

impl StructuralChange {
    fn parts(&self) -> (Axis, bool, u32, u32) {
        match *self {
            StructuralChange::InsertRows { at, count } => (Axis::Row, true, at, count),
            StructuralChange::DeleteRows { at, count } => (Axis::Row, false, at, count),
            StructuralChange::InsertColumns { at, count } => {
                (Axis::Col, true, at as u32, count as u32)
            }
            StructuralChange::DeleteColumns { at, count } => {
                (Axis::Col, false, at as u32, count as u32)
            }
        }
    }

    /// Move one coordinate; `None` when it was deleted or pushed off the grid
    fn shift_point(&self, (value, absolute): (u32, bool)) -> Option<u32> {
        let (axis, insert, at, count) = self.parts();
        if insert {
            if absolute || value < at {
                return Some(value);
            }
            let moved = value + count;
            (moved < axis.limit()).then_some(moved)
        } else if (at..at.saturating_add(count)).contains(&value) {
            None
        } else if !absolute && value >= at + count {
            Some(value - count)
        } else {
            Some(value)
        }
    }

    /// Move both ends of a range along the changed axis
    ///
    /// A deleted end snaps to the nearest surviving line, so a partly
    /// deleted range shrinks. `None` when nothing survives.
    fn shift_span(&self, lo: (u32, bool), hi: (u32, bool)) -> Option<(u32, u32)> {
        let (axis, insert, at, count) = self.parts();
        if insert {
            let new_lo = self.shift_point(lo)?;
            let new_hi = self.shift_point(hi).unwrap_or(axis.limit() - 1);
            return Some((new_lo, new_hi));
        }

        let deleted = at..at.saturating_add(count);
        let new_lo = if deleted.contains(&lo.0) {
            at
        } else {
            self.shift_point(lo)?
        };
        let new_hi = if deleted.contains(&hi.0) {
            at.checked_sub(1)?
        } else {
            self.shift_point(hi)?
        };
        (new_lo <= new_hi).then_some((new_lo, new_hi))
    }
}

/// A reference found in a formula's token stream
struct Site<'t> {
    span: Range<usize>,
    first: (&'t CellToken, Range<usize>),
    /// Second corner of a range
    second: Option<(&'t CellToken, Range<usize>)>,
}

impl Site<'_> {
    /// Sheet the reference names, if any
    fn sheet(&self) -> Option<&str> {
        self.first
            .0
            .sheet
            .as_deref()
            .or_else(|| self.second.as_ref().and_then(|(t, _)| t.sheet.as_deref()))
    }
}

/// The text of a token up to and including its `!`, or empty
fn sheet_prefix<'f>(formula: &'f str, span: &Range<usize>) -> &'f str {
    let text = &formula[span.clone()];
    match text.rfind('!') {
        Some(bang) => &text[..=bang],
        None => "",
    }
}

/// Splice an edit into every reference of `formula`
///
/// `edit` returns the replacement text for a site, or `None` to keep it.
fn rewrite_references<F>(formula: &str, mut edit: F) -> String
where
    F: FnMut(&Site, &str) -> Option<String>,
{
    let tokens = tokenize(formula);
    let mut out = String::with_capacity(formula.len());
    let mut copied = 0;
    let mut i = 0;

    while i < tokens.len() {
        let TokenKind::CellIdentifier(first) = &tokens[i].kind else {
            i += 1;
            continue;
        };
        let first_span = tokens[i].span.clone();

        let second = match (tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(colon), Some(end)) if colon.kind == TokenKind::Colon => match &end.kind {
                TokenKind::CellIdentifier(second) => Some((second, end.span.clone())),
                _ => None,
            },
            _ => None,
        };
        let span = match &second {
            Some((_, end)) => first_span.start..end.end,
            None => first_span.clone(),
        };
        i += if second.is_some() { 3 } else { 1 };

        let site = Site {
            span,
            first: (first, first_span),
            second,
        };
        if let Some(replacement) = edit(&site, formula) {
            out.push_str(&formula[copied..site.span.start]);
            out.push_str(&replacement);
            copied = site.span.end;
        }
    }

    out.push_str(&formula[copied..]);
    out
}

/// Render a site with new corner addresses, keeping each token's prefix
fn render(site: &Site, formula: &str, first: CellRef, second: Option<CellRef>) -> String {
    let mut out = String::new();
    out.push_str(sheet_prefix(formula, &site.first.1));
    out.push_str(&first.to_a1_string());
    if let (Some((_, span)), Some(address)) = (&site.second, second) {
        out.push(':');
        out.push_str(sheet_prefix(formula, span));
        out.push_str(&address.to_a1_string());
    }
    out
}

/// Formula rewriting operations
pub struct FormulaAdjustment;

impl FormulaAdjustment {
    /// Shift relative references by a row and column delta, for copy/paste
    ///
    /// Each delta only touches the relative components of its own axis. A
    /// reference pushed outside the grid becomes `#REF!`.
    pub fn adjust_relative(formula: &str, row_delta: i64, col_delta: i64) -> String {
        if row_delta == 0 && col_delta == 0 {
            return formula.to_string();
        }

        let shift = |address: CellRef| -> Option<CellRef> {
            let mut out = address;
            for (axis, delta) in [(Axis::Row, row_delta), (Axis::Col, col_delta)] {
                let (value, absolute) = axis.get(&address);
                if absolute || delta == 0 {
                    continue;
                }
                let moved = value as i64 + delta;
                if moved < 0 || moved >= axis.limit() as i64 {
                    return None;
                }
                axis.set(&mut out, moved as u32);
            }
            Some(out)
        };

        rewrite_references(formula, |site, formula| {
            let first = shift(site.first.0.address);
            let second = site.second.as_ref().map(|(t, _)| shift(t.address));
            match (first, second) {
                (Some(a), None) => Some(render(site, formula, a, None)),
                (Some(a), Some(Some(b))) => Some(render(site, formula, a, Some(b))),
                _ => Some(REF_ERROR.to_string()),
            }
        })
    }

    /// Rewrite references for a row/column insertion or deletion
    ///
    /// Only references that point at the changed sheet move: those naming
    /// `target_sheet`, plus unprefixed ones when the formula itself lives
    /// on that sheet (`on_target`).
    pub fn apply_structural(
        formula: &str,
        change: &StructuralChange,
        target_sheet: &str,
        on_target: bool,
    ) -> String {
        let (axis, ..) = change.parts();

        rewrite_references(formula, |site, formula| {
            let affected = match site.sheet() {
                Some(sheet) => sheet.eq_ignore_ascii_case(target_sheet),
                None => on_target,
            };
            if !affected {
                return None;
            }

            let first = site.first.0.address;
            let replacement = match &site.second {
                None => match change.shift_point(axis.get(&first)) {
                    Some(value) => {
                        let mut moved = first;
                        axis.set(&mut moved, value);
                        render(site, formula, moved, None)
                    }
                    None => REF_ERROR.to_string(),
                },
                Some((second, _)) => {
                    let second = second.address;
                    let (a, b) = (axis.get(&first), axis.get(&second));
                    let reversed = a.0 > b.0;
                    let (lo, hi) = if reversed { (b, a) } else { (a, b) };
                    match change.shift_span(lo, hi) {
                        Some((new_lo, new_hi)) => {
                            let (va, vb) = if reversed {
                                (new_hi, new_lo)
                            } else {
                                (new_lo, new_hi)
                            };
                            let (mut x, mut y) = (first, second);
                            axis.set(&mut x, va);
                            axis.set(&mut y, vb);
                            render(site, formula, x, Some(y))
                        }
                        None => REF_ERROR.to_string(),
                    }
                }
            };
            (replacement != formula[site.span.clone()]).then_some(replacement)
        })
    }

    /// Point prefixes naming `old` (any case) at `new`
    pub fn rename_sheet(formula: &str, old: &str, new: &str) -> String {
        let mut new_prefix = String::new();
        // Writing into a String cannot fail
        let _ = write_sheet_prefix(&mut new_prefix, new);

        rewrite_references(formula, |site, formula| {
            let renames = |token: &CellToken| {
                token
                    .sheet
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(old))
            };
            let touched = renames(site.first.0) || site.second.as_ref().is_some_and(|(t, _)| renames(t));
            if !touched {
                return None;
            }

            let part = |token: &CellToken, span: &Range<usize>| {
                let prefix = if renames(token) {
                    new_prefix.as_str()
                } else {
                    sheet_prefix(formula, span)
                };
                format!("{}{}", prefix, token.address.to_a1_string())
            };
            let mut out = part(site.first.0, &site.first.1);
            if let Some((token, span)) = &site.second {
                out.push(':');
                out.push_str(&part(token, span));
            }
            Some(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(formula: &str, change: StructuralChange) -> String {
        FormulaAdjustment::apply_structural(formula, &change, "Sheet1", true)
    }

    #[test]
    fn test_insert_rows_shifts_relative_only() {
        let change = StructuralChange::InsertRows { at: 1, count: 2 };
        assert_eq!(rows("=A1+A2", change), "=A1+A4");
        assert_eq!(rows("=A$2+$A2", change), "=A$2+$A4");
        assert_eq!(rows("=SUM(A1:A5)", change), "=SUM(A1:A7)");
        assert_eq!(rows("= a2 * 2", change), "= A4 * 2");
    }

    #[test]
    fn test_delete_rows_makes_ref_errors() {
        let change = StructuralChange::DeleteRows { at: 1, count: 1 };
        assert_eq!(rows("=A2", change), "=#REF!");
        assert_eq!(rows("=$A$2", change), "=#REF!");
        assert_eq!(rows("=A3+Sheet1!A1", change), "=A2+Sheet1!A1");
        assert_eq!(rows("=SUM(A2:B2)", change), "=SUM(#REF!)");
    }

    #[test]
    fn test_delete_rows_shrinks_ranges() {
        let change = StructuralChange::DeleteRows { at: 2, count: 2 };
        assert_eq!(rows("=SUM(A1:A10)", change), "=SUM(A1:A8)");
        assert_eq!(rows("=SUM(A3:A10)", change), "=SUM(A3:A8)");
        assert_eq!(rows("=SUM(A1:A3)", change), "=SUM(A1:A2)");
        assert_eq!(rows("=SUM(A10:A1)", change), "=SUM(A8:A1)");
    }

    #[test]
    fn test_columns() {
        let insert = StructuralChange::InsertColumns { at: 0, count: 1 };
        assert_eq!(rows("=A1&$B1", insert), "=B1&$B1");
        let delete = StructuralChange::DeleteColumns { at: 1, count: 1 };
        assert_eq!(rows("=SUM(A1:C1)+B5", delete), "=SUM(A1:B1)+#REF!");
    }

    #[test]
    fn test_only_target_sheet_moves() {
        let change = StructuralChange::InsertRows { at: 0, count: 1 };
        let on_other = |f: &str| FormulaAdjustment::apply_structural(f, &change, "Data", false);
        assert_eq!(on_other("=A1+Data!A1+'data'!B2"), "=A1+Data!A2+'data'!B3");
        assert_eq!(on_other("=Data!A1:Data!A2"), "=Data!A2:Data!A3");
    }

    #[test]
    fn test_adjust_relative() {
        assert_eq!(FormulaAdjustment::adjust_relative("=A1+$B$2", 2, 1), "=B3+$B$2");
        assert_eq!(FormulaAdjustment::adjust_relative("=A$1+$A1", 3, 3), "=D$1+$A4");
        assert_eq!(FormulaAdjustment::adjust_relative("=SUM(A1:B2)", 1, 0), "=SUM(A2:B3)");
        assert_eq!(FormulaAdjustment::adjust_relative("=A1", -1, 0), "=#REF!");
        assert_eq!(FormulaAdjustment::adjust_relative("=\"A1\"&A1", 1, 0), "=\"A1\"&A2");
    }

    #[test]
    fn test_rename_sheet() {
        assert_eq!(
            FormulaAdjustment::rename_sheet("=sheet2!A1+Other!B2", "Sheet2", "My Data"),
            "='My Data'!A1+Other!B2"
        );
        assert_eq!(
            FormulaAdjustment::rename_sheet("='Old'!$A$1:Old!B2", "old", "New"),
            "=New!$A$1:New!B2"
        );
    }
}
