//! Criteria matching for SUMIF, COUNTIF and AVERAGEIF, plus the wildcard
//! patterns shared with SEARCH and the lookup functions
//!
//! A criterion is one of:
//! - a number: numeric equality (`5`)
//! - a comparison: `">5"`, `"<=10"`, `"<>0"`, `"=apple"`
//! - text: case-insensitive match with `*`, `?` and `~` escapes
//! - an empty string: matches blank cells

use std::cmp::Ordering;

use regex::Regex;
use tabula_core::{parse_number, CellData};

/// Check if a pattern uses `*` or `?` (or escapes with `~`)
pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?', '~'])
}

/// Translate an Excel wildcard pattern into a case-insensitive regex
///
/// `*` matches any run of characters, `?` exactly one, and `~` makes the
/// next character literal. With `anchored` the whole text must match.
pub fn wildcard_regex(pattern: &str, anchored: bool) -> Option<Regex> {
    let mut re = String::from("(?is)");
    if anchored {
        re.push('^');
    }
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '~' => match chars.next() {
                Some(next) => re.push_str(&regex::escape(&next.to_string())),
                None => re.push_str(&regex::escape("~")),
            },
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    if anchored {
        re.push('$');
    }
    Regex::new(&re).ok()
}

/// Case-insensitive whole-text match, wildcards included
pub fn text_matches(pattern: &str, text: &str) -> bool {
    if has_wildcards(pattern) {
        wildcard_regex(pattern, true).is_some_and(|re| re.is_match(text))
    } else {
        pattern.to_lowercase() == text.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn test(self, ord: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ord == Ordering::Equal,
            ComparisonOp::NotEqual => ord != Ordering::Equal,
            ComparisonOp::LessThan => ord == Ordering::Less,
            ComparisonOp::LessEqual => ord != Ordering::Greater,
            ComparisonOp::GreaterThan => ord == Ordering::Greater,
            ComparisonOp::GreaterEqual => ord != Ordering::Less,
        }
    }
}

#[derive(Debug)]
enum CriteriaType {
    Number(ComparisonOp, f64),
    Text(ComparisonOp, String),
    Pattern { negate: bool, regex: Regex },
    Boolean(ComparisonOp, bool),
    Blank { negate: bool },
}

/// Criteria matcher for the *IF functions
#[derive(Debug)]
pub struct CriteriaMatcher {
    criteria_type: CriteriaType,
}

impl CriteriaMatcher {
    /// Build a matcher from a criterion value
    pub fn new(criteria: &CellData) -> Self {
        let criteria_type = match criteria {
            CellData::Number(n) => CriteriaType::Number(ComparisonOp::Equal, *n),
            CellData::Date(_) => {
                CriteriaType::Number(ComparisonOp::Equal, criteria.as_number().unwrap_or(0.0))
            }
            CellData::Boolean(b) => CriteriaType::Boolean(ComparisonOp::Equal, *b),
            CellData::Text(s) => Self::parse_text_criteria(s),
            CellData::Empty => CriteriaType::Blank { negate: false },
            CellData::Error(e) => CriteriaType::Text(ComparisonOp::Equal, e.as_str().to_string()),
        };
        Self { criteria_type }
    }

    fn parse_text_criteria(s: &str) -> CriteriaType {
        // Longer operators first
        let (op, rest) = [
            (">=", ComparisonOp::GreaterEqual),
            ("<=", ComparisonOp::LessEqual),
            ("<>", ComparisonOp::NotEqual),
            (">", ComparisonOp::GreaterThan),
            ("<", ComparisonOp::LessThan),
            ("=", ComparisonOp::Equal),
        ]
        .into_iter()
        .find_map(|(prefix, op)| s.strip_prefix(prefix).map(|rest| (op, rest)))
        .unwrap_or((ComparisonOp::Equal, s));

        if rest.is_empty() {
            return match op {
                ComparisonOp::NotEqual => CriteriaType::Blank { negate: true },
                _ => CriteriaType::Blank { negate: false },
            };
        }
        if let Some(n) = parse_number(rest.trim()) {
            return CriteriaType::Number(op, n);
        }
        if rest.eq_ignore_ascii_case("TRUE") || rest.eq_ignore_ascii_case("FALSE") {
            return CriteriaType::Boolean(op, rest.eq_ignore_ascii_case("TRUE"));
        }
        if matches!(op, ComparisonOp::Equal | ComparisonOp::NotEqual) && has_wildcards(rest) {
            if let Some(regex) = wildcard_regex(rest, true) {
                return CriteriaType::Pattern {
                    negate: op == ComparisonOp::NotEqual,
                    regex,
                };
            }
        }
        CriteriaType::Text(op, rest.to_lowercase())
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &CellData) -> bool {
        let is_blank = match value {
            CellData::Empty => true,
            CellData::Text(s) => s.is_empty(),
            _ => false,
        };
        match &self.criteria_type {
            CriteriaType::Blank { negate } => is_blank != *negate,
            // Only real numbers compare against numeric criteria
            CriteriaType::Number(op, target) => match value.as_number() {
                Some(n) => op.test(n.partial_cmp(target).unwrap_or(Ordering::Equal)),
                None => *op == ComparisonOp::NotEqual,
            },
            CriteriaType::Boolean(op, target) => match value {
                CellData::Boolean(b) => op.test(b.cmp(target)),
                _ => *op == ComparisonOp::NotEqual,
            },
            CriteriaType::Text(op, target) => match value {
                CellData::Text(s) => op.test(s.to_lowercase().as_str().cmp(target.as_str())),
                CellData::Error(e) => op.test(e.as_str().to_lowercase().cmp(target)),
                _ => *op == ComparisonOp::NotEqual,
            },
            CriteriaType::Pattern { negate, regex } => {
                let hit = match value {
                    CellData::Text(s) => regex.is_match(s),
                    _ => false,
                };
                hit != *negate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matches(criteria: impl Into<CellData>, value: impl Into<CellData>) -> bool {
        CriteriaMatcher::new(&criteria.into()).matches(&value.into())
    }

    #[test]
    fn test_numeric_criteria() {
        assert!(matches(5.0, 5.0));
        assert!(!matches(5.0, "5"));
        assert!(matches(">5", 6.0));
        assert!(!matches(">5", 5.0));
        assert!(matches(">=5", 5.0));
        assert!(matches("<>0", 3.0));
        assert!(matches("<>0", "text"));
        assert!(matches("=10", 10.0));
    }

    #[test]
    fn test_text_criteria() {
        assert!(matches("apple", "APPLE"));
        assert!(!matches("apple", "apples"));
        assert!(matches("<>apple", "pear"));
        assert!(matches(">b", "c"));
    }

    #[test]
    fn test_wildcards() {
        assert!(matches("app*", "Apple"));
        assert!(matches("?ear", "pear"));
        assert!(!matches("?ear", "spear"));
        assert!(matches("<>app*", "pear"));
        assert!(matches("what~?", "what?"));
        assert!(!matches("what~?", "whats"));
        assert!(matches("1~*2", "1*2"));
    }

    #[test]
    fn test_blank_criteria() {
        assert!(matches("", CellData::Empty));
        assert!(matches("=", ""));
        assert!(!matches("", 0.0));
        assert!(matches("<>", 1.0));
        assert!(!matches("<>", CellData::Empty));
    }

    #[test]
    fn test_wildcard_regex_unanchored() {
        let re = wildcard_regex("b?d", false).unwrap();
        assert_eq!(re.find("a bad day").map(|m| m.start()), Some(2));
        assert!(text_matches("A*C", "abc"));
        assert!(!text_matches("a.c", "abc"));
    }
}
