//! Cell value types

use crate::date;
use chrono::NaiveDateTime;
use std::fmt;

/// The evaluated contents of a cell
///
/// Errors are ordinary values here: they flow through formulas like any
/// other variant.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellData {
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean value (TRUE/FALSE)
    Boolean(bool),
    /// Date-time value
    Date(NaiveDateTime),
    /// Error value (#VALUE!, #REF!, etc.)
    Error(CellError),
    /// No value
    #[default]
    Empty,
}

impl CellData {
    /// Create a text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellData::Text(s.into())
    }

    /// Interpret user input the way a grid editor would: numbers,
    /// TRUE/FALSE and error literals are typed, anything else is text.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return CellData::Empty;
        }
        if let Some(n) = parse_number(trimmed) {
            return CellData::Number(n);
        }
        if trimmed.eq_ignore_ascii_case("TRUE") {
            return CellData::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return CellData::Boolean(false);
        }
        if let Some(e) = CellError::parse(trimmed) {
            return CellData::Error(e);
        }
        CellData::Text(input.to_string())
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellData::Empty)
    }

    /// Check if the value is an error
    pub fn is_error(&self) -> bool {
        matches!(self, CellData::Error(_))
    }

    /// Check if the value is a number or a date
    pub fn is_numeric(&self) -> bool {
        matches!(self, CellData::Number(_) | CellData::Date(_))
    }

    /// The error carried by this value, if any
    pub fn error(&self) -> Option<CellError> {
        match self {
            CellData::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Coerce to a number for arithmetic
    ///
    /// Empty is 0, booleans are 1/0, dates are their serial number and
    /// numeric-looking text is parsed. Other text is `#VALUE!`.
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            CellData::Number(n) => Ok(*n),
            CellData::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            CellData::Date(dt) => Ok(date::serial_from_datetime(*dt)),
            CellData::Empty => Ok(0.0),
            CellData::Text(s) => parse_number(s.trim()).ok_or(CellError::Value),
            CellData::Error(e) => Err(*e),
        }
    }

    /// Number held directly by this value (no text parsing)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellData::Number(n) => Some(*n),
            CellData::Date(dt) => Some(date::serial_from_datetime(*dt)),
            _ => None,
        }
    }

    /// Coerce to a boolean for logical functions
    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self {
            CellData::Boolean(b) => Ok(*b),
            CellData::Number(n) => Ok(*n != 0.0),
            CellData::Date(_) => Ok(true),
            CellData::Empty => Ok(false),
            CellData::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(CellError::Value)
                }
            }
            CellData::Error(e) => Err(*e),
        }
    }

    /// Coerce to text for string functions and concatenation
    pub fn to_text(&self) -> Result<String, CellError> {
        match self {
            CellData::Error(e) => Err(*e),
            other => Ok(other.display_text()),
        }
    }

    /// Text shown for this value in a grid cell
    pub fn display_text(&self) -> String {
        match self {
            CellData::Number(n) => format_number(*n),
            CellData::Text(s) => s.clone(),
            CellData::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellData::Date(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
            CellData::Error(e) => e.as_str().to_string(),
            CellData::Empty => String::new(),
        }
    }

    /// Get the type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            CellData::Number(_) => "number",
            CellData::Text(_) => "text",
            CellData::Boolean(_) => "boolean",
            CellData::Date(_) => "date",
            CellData::Error(_) => "error",
            CellData::Empty => "empty",
        }
    }
}

/// Parse a number the way cell input and text coercion accept it
///
/// Accepts plain decimals, exponents, a leading sign, thousands separators
/// and a trailing percent sign.
pub fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    if let Some(body) = s.strip_suffix('%') {
        return parse_number(body.trim_end()).map(|n| n / 100.0);
    }
    let cleaned: String;
    let text = if s.contains(',') {
        cleaned = s.replace(',', "");
        cleaned.as_str()
    } else {
        s
    };
    // Reject words f64::from_str would accept
    if !text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format a number for display without trailing noise
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return CellError::Num.as_str().to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let rounded = format!("{:.15}", n);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    // Fall back to shortest round-trip form for very large/small values
    if trimmed.len() > 20 || trimmed == "0" || trimmed == "-0" {
        format!("{}", n)
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for CellData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<bool> for CellData {
    fn from(b: bool) -> Self {
        CellData::Boolean(b)
    }
}

impl From<i32> for CellData {
    fn from(n: i32) -> Self {
        CellData::Number(n as f64)
    }
}

impl From<i64> for CellData {
    fn from(n: i64) -> Self {
        CellData::Number(n as f64)
    }
}

impl From<f64> for CellData {
    fn from(n: f64) -> Self {
        CellData::Number(n)
    }
}

impl From<&str> for CellData {
    fn from(s: &str) -> Self {
        CellData::text(s)
    }
}

impl From<String> for CellData {
    fn from(s: String) -> Self {
        CellData::Text(s)
    }
}

impl From<NaiveDateTime> for CellData {
    fn from(dt: NaiveDateTime) -> Self {
        CellData::Date(dt)
    }
}

impl From<CellError> for CellData {
    fn from(e: CellError) -> Self {
        CellData::Error(e)
    }
}

/// Formula error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellError {
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid or deleted reference
    Ref,
    /// #DIV/0! - Division by zero
    Div0,
    /// #NAME? - Unrecognized name
    Name,
    /// #CIRCULAR! - Dependency cycle
    Circular,
    /// #N/A - Value not available
    NA,
    /// #NUM! - Argument outside the function's domain
    Num,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Div0 => "#DIV/0!",
            CellError::Name => "#NAME?",
            CellError::Circular => "#CIRCULAR!",
            CellError::NA => "#N/A",
            CellError::Num => "#NUM!",
        }
    }

    /// Parse an error literal (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#DIV/0!" => Some(CellError::Div0),
            "#NAME?" => Some(CellError::Name),
            "#CIRCULAR!" => Some(CellError::Circular),
            "#N/A" => Some(CellError::NA),
            "#NUM!" => Some(CellError::Num),
            _ => None,
        }
    }

    /// All error values, in literal-matching order
    pub const ALL: [CellError; 7] = [
        CellError::Value,
        CellError::Ref,
        CellError::Div0,
        CellError::Name,
        CellError::Circular,
        CellError::NA,
        CellError::Num,
    ];
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
