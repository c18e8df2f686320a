//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use tabula_core::{CellData, CellError};

use super::criteria::wildcard_regex;
use super::number_format::format_value;
use super::{flatten, opt_bool, opt_number, scalar, text, FunctionResult};
use crate::evaluator::{Arg, EvaluationContext};

/// Longest string a text function may produce
const MAX_TEXT_LEN: usize = 32_767;

/// A count argument that must be a non-negative integer
fn count(args: &[Arg], i: usize, default: f64) -> Result<usize, CellError> {
    let n = opt_number(args, i, default)?.trunc();
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

/// A 1-based position argument
fn position(args: &[Arg], i: usize, default: f64) -> Result<usize, CellError> {
    let n = opt_number(args, i, default)?.trunc();
    if n < 1.0 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let n = count(args, 1, 1.0)?;
    Ok(CellData::Text(s.chars().take(n).collect()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let n = count(args, 1, 1.0)?;
    let len = s.chars().count();
    Ok(CellData::Text(s.chars().skip(len.saturating_sub(n)).collect()))
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let start = position(args, 1, 1.0)?;
    let n = count(args, 2, 0.0)?;
    Ok(CellData::Text(s.chars().skip(start - 1).take(n).collect()))
}

/// LEN(text)
pub fn fn_len(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(text(args, 0)?.chars().count() as f64))
}

/// FIND(find_text, within_text, [start_num]), case-sensitive
pub fn fn_find(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let needle = text(args, 0)?;
    let haystack = text(args, 1)?;
    let start = position(args, 2, 1.0)?;
    if start > haystack.chars().count() + 1 {
        return Err(CellError::Value);
    }
    let from = byte_offset(&haystack, start - 1);
    let at = haystack[from..].find(&needle).ok_or(CellError::Value)?;
    let chars_before = haystack[..from + at].chars().count();
    Ok(CellData::Number(chars_before as f64 + 1.0))
}

/// SEARCH(find_text, within_text, [start_num]), case-insensitive with
/// wildcards
pub fn fn_search(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let needle = text(args, 0)?;
    let haystack = text(args, 1)?;
    let start = position(args, 2, 1.0)?;
    if start > haystack.chars().count() + 1 {
        return Err(CellError::Value);
    }
    if needle.is_empty() {
        return Ok(CellData::Number(start as f64));
    }
    let regex = wildcard_regex(&needle, false).ok_or(CellError::Value)?;
    let from = byte_offset(&haystack, start - 1);
    let found = regex.find(&haystack[from..]).ok_or(CellError::Value)?;
    let chars_before = haystack[..from + found.start()].chars().count();
    Ok(CellData::Number(chars_before as f64 + 1.0))
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let old = text(args, 1)?;
    let new = text(args, 2)?;
    if old.is_empty() {
        return Ok(CellData::Text(s));
    }
    if args.len() < 4 {
        return Ok(CellData::Text(s.replace(&old, &new)));
    }

    let instance = position(args, 3, 1.0)?;
    match s.match_indices(&old).nth(instance - 1) {
        Some((at, _)) => {
            let mut out = String::with_capacity(s.len());
            out.push_str(&s[..at]);
            out.push_str(&new);
            out.push_str(&s[at + old.len()..]);
            Ok(CellData::Text(out))
        }
        None => Ok(CellData::Text(s)),
    }
}

/// REPLACE(old_text, start_num, num_chars, new_text)
pub fn fn_replace(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let start = position(args, 1, 1.0)?;
    let n = count(args, 2, 0.0)?;
    let new = text(args, 3)?;

    let from = byte_offset(&s, start - 1);
    let to = byte_offset(&s, (start - 1).saturating_add(n));
    let mut out = String::with_capacity(s.len() + new.len());
    out.push_str(&s[..from]);
    out.push_str(&new);
    out.push_str(&s[to..]);
    Ok(CellData::Text(out))
}

/// TRIM(text): strip leading and trailing spaces, collapse inner runs
pub fn fn_trim(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
    Ok(CellData::Text(words.join(" ")))
}

/// PROPER(text)
pub fn fn_proper(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let mut out = String::with_capacity(s.len());
    let mut after_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if after_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(c);
            after_letter = false;
        }
    }
    Ok(CellData::Text(out))
}

/// UPPER(text)
pub fn fn_upper(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Text(text(args, 0)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Text(text(args, 0)?.to_lowercase()))
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let s = text(args, 0)?;
    let times = count(args, 1, 0.0)?;
    if s.chars().count().saturating_mul(times) > MAX_TEXT_LEN {
        return Err(CellError::Value);
    }
    Ok(CellData::Text(s.repeat(times)))
}

/// TEXT(value, format_text)
pub fn fn_text(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let format = text(args, 1)?;
    format_value(&scalar(args, 0), &format).map(CellData::Text)
}

/// TEXTJOIN(delimiter, ignore_empty, text1, ...)
pub fn fn_textjoin(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let delimiter = text(args, 0)?;
    let ignore_empty = opt_bool(args, 1, true)?;

    let mut parts = Vec::new();
    for value in flatten(&args[2..]) {
        let part = value.to_text()?;
        if ignore_empty && part.is_empty() {
            continue;
        }
        parts.push(part);
    }
    let joined = parts.join(&delimiter);
    if joined.chars().count() > MAX_TEXT_LEN {
        return Err(CellError::Value);
    }
    Ok(CellData::Text(joined))
}

/// CONCAT(text1, ...), ranges included
pub fn fn_concat(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let mut out = String::new();
    for value in flatten(args) {
        out.push_str(&value.to_text()?);
    }
    Ok(CellData::Text(out))
}

/// CONCATENATE(text1, ...)
pub fn fn_concatenate(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let mut out = String::new();
    for i in 0..args.len() {
        out.push_str(&text(args, i)?);
    }
    Ok(CellData::Text(out))
}
