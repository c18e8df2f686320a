//! Format codes for TEXT(value, format_text)
//!
//! A format is up to three `;`-separated sections (positive, negative,
//! zero). Each section is either a number pattern (`0`, `#`, `,`, `.`,
//! `%`, `E+`) or a date pattern (`y m d h s`, `AM/PM`). Quoted text and
//! `\`-escaped characters are copied through.

use chrono::{Datelike, NaiveDateTime, Timelike};
use tabula_core::{date, CellData, CellError};

use super::round_half_away;

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Digits(String),
    Percent,
    Date(DateCode),
    AmPm,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DateCode {
    Year(usize),
    Month(usize),
    Day(usize),
    Hour(usize),
    Minute(usize),
    Second(usize),
}

/// Render `value` with `format`
pub fn format_value(value: &CellData, format: &str) -> Result<String, CellError> {
    let n = match value {
        CellData::Error(e) => return Err(*e),
        CellData::Text(s) => match value.to_number() {
            Ok(n) => n,
            Err(_) => return Ok(s.clone()),
        },
        CellData::Boolean(_) => return Ok(value.display_text()),
        other => other.to_number()?,
    };

    let sections = split_sections(format);
    let (section, n, signed) = match sections.as_slice() {
        [_, neg, ..] if n < 0.0 => (*neg, -n, false),
        [_, _, zero, ..] if n == 0.0 => (*zero, n, false),
        [first, ..] => (*first, n, true),
        [] => return Ok(String::new()),
    };

    let pieces = lex(section);
    if pieces.iter().any(|p| matches!(p, Piece::Date(_))) {
        render_date(&resolve_minutes(pieces), n)
    } else {
        Ok(render_number(&pieces, n, signed))
    }
}

fn split_sections(format: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in format.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                sections.push(&format[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(&format[start..]);
    sections
}

fn lex(section: &str) -> Vec<Piece> {
    let chars: Vec<char> = section.chars().collect();
    let mut pieces = Vec::new();
    let mut i = 0;

    let push_literal = |pieces: &mut Vec<Piece>, s: &str| {
        if let Some(Piece::Literal(prev)) = pieces.last_mut() {
            prev.push_str(s);
        } else {
            pieces.push(Piece::Literal(s.to_string()));
        }
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == '"')
                    .map_or(chars.len(), |p| i + 1 + p);
                let text: String = chars[i + 1..end].iter().collect();
                push_literal(&mut pieces, &text);
                i = end + 1;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    push_literal(&mut pieces, &next.to_string());
                }
                i += 2;
            }
            '0' | '#' | ',' | '.' => {
                let mut digits = String::new();
                while i < chars.len() {
                    match chars[i] {
                        ch @ ('0' | '#' | ',' | '.') => digits.push(ch),
                        ch @ ('E' | 'e') if matches!(chars.get(i + 1), Some('+' | '-')) => {
                            digits.push(ch.to_ascii_uppercase());
                            digits.push(chars[i + 1]);
                            i += 1;
                        }
                        _ => break,
                    }
                    i += 1;
                }
                pieces.push(Piece::Digits(digits));
            }
            '%' => {
                pieces.push(Piece::Percent);
                i += 1;
            }
            _ if starts_with_ignore_case(&chars[i..], "AM/PM") => {
                pieces.push(Piece::AmPm);
                i += 5;
            }
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => {
                let lower = c.to_ascii_lowercase();
                let len = chars[i..]
                    .iter()
                    .take_while(|ch| ch.to_ascii_lowercase() == lower)
                    .count();
                let code = match lower {
                    'y' => DateCode::Year(len),
                    'm' => DateCode::Month(len),
                    'd' => DateCode::Day(len),
                    'h' => DateCode::Hour(len),
                    _ => DateCode::Second(len),
                };
                pieces.push(Piece::Date(code));
                i += len;
            }
            _ => {
                push_literal(&mut pieces, &c.to_string());
                i += 1;
            }
        }
    }
    pieces
}

fn starts_with_ignore_case(chars: &[char], needle: &str) -> bool {
    let n = needle.chars().count();
    chars.len() >= n
        && chars[..n]
            .iter()
            .zip(needle.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b))
}

/// `m`/`mm` right after hours or right before seconds means minutes
fn resolve_minutes(mut pieces: Vec<Piece>) -> Vec<Piece> {
    let codes: Vec<(usize, DateCode)> = pieces
        .iter()
        .enumerate()
        .filter_map(|(i, p)| match p {
            Piece::Date(code) => Some((i, *code)),
            _ => None,
        })
        .collect();

    for (k, &(index, code)) in codes.iter().enumerate() {
        if let DateCode::Month(len) = code {
            if len > 2 {
                continue;
            }
            let after_hour = k > 0 && matches!(codes[k - 1].1, DateCode::Hour(_));
            let before_second = matches!(codes.get(k + 1), Some((_, DateCode::Second(_))));
            if after_hour || before_second {
                pieces[index] = Piece::Date(DateCode::Minute(len));
            }
        }
    }
    pieces
}

fn render_date(pieces: &[Piece], serial: f64) -> Result<String, CellError> {
    let dt: NaiveDateTime = date::datetime_from_serial(serial).ok_or(CellError::Value)?;
    let twelve_hour = pieces.iter().any(|p| *p == Piece::AmPm);
    let padded = |n: u32, len: usize| {
        if len >= 2 {
            format!("{:02}", n)
        } else {
            n.to_string()
        }
    };

    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Digits(s) => out.push_str(s),
            Piece::Percent => out.push('%'),
            Piece::AmPm => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
            Piece::Date(code) => match *code {
                DateCode::Year(len) if len <= 2 => {
                    out.push_str(&format!("{:02}", dt.year().rem_euclid(100)))
                }
                DateCode::Year(_) => out.push_str(&format!("{:04}", dt.year())),
                DateCode::Month(len) => match len {
                    1 | 2 => out.push_str(&padded(dt.month(), len)),
                    3 => out.push_str(&dt.format("%b").to_string()),
                    4 => out.push_str(&dt.format("%B").to_string()),
                    _ => out.push_str(&dt.format("%B").to_string()[..1]),
                },
                DateCode::Day(len) => match len {
                    1 | 2 => out.push_str(&padded(dt.day(), len)),
                    3 => out.push_str(&dt.format("%a").to_string()),
                    _ => out.push_str(&dt.format("%A").to_string()),
                },
                DateCode::Hour(len) => {
                    let hour = if twelve_hour {
                        match dt.hour() % 12 {
                            0 => 12,
                            h => h,
                        }
                    } else {
                        dt.hour()
                    };
                    out.push_str(&padded(hour, len));
                }
                DateCode::Minute(len) => out.push_str(&padded(dt.minute(), len)),
                DateCode::Second(len) => out.push_str(&padded(dt.second(), len)),
            },
        }
    }
    Ok(out)
}

fn render_number(pieces: &[Piece], n: f64, signed: bool) -> String {
    let percents = pieces.iter().filter(|p| **p == Piece::Percent).count();
    let scaled = n * 100f64.powi(percents as i32);
    let pattern = pieces.iter().find_map(|p| match p {
        Piece::Digits(d) => Some(d.as_str()),
        _ => None,
    });

    let body = match pattern {
        Some(pattern) if pattern.contains('E') => scientific(scaled.abs(), pattern),
        Some(pattern) => fixed(scaled.abs(), pattern),
        None => String::new(),
    };
    let negative = signed && scaled < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0');

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    let mut placed = false;
    for piece in pieces {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Percent => out.push('%'),
            Piece::Digits(_) if !placed => {
                out.push_str(&body);
                placed = true;
            }
            _ => {}
        }
    }
    out
}

fn fixed(n: f64, pattern: &str) -> String {
    let (int_pattern, frac_pattern) = match pattern.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (pattern, None),
    };
    let decimals = frac_pattern.map_or(0, |f| f.chars().filter(|c| matches!(c, '0' | '#')).count());
    let optional = frac_pattern.map_or(0, |f| f.chars().filter(|&c| c == '#').count());
    let min_int = int_pattern.chars().filter(|&c| c == '0').count();
    let grouped = int_pattern.contains(',');

    let rendered = format!("{:.*}", decimals, round_half_away(n, decimals as i32));
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));

    let mut int_digits = if int_part == "0" && min_int == 0 {
        String::new()
    } else {
        int_part.to_string()
    };
    while int_digits.len() < min_int {
        int_digits.insert(0, '0');
    }
    if grouped {
        int_digits = group_thousands(&int_digits);
    }

    let mut frac = frac_part.to_string();
    for _ in 0..optional {
        if frac.ends_with('0') {
            frac.pop();
        }
    }

    match frac_pattern {
        Some(_) => format!("{}.{}", int_digits, frac),
        None => int_digits,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn scientific(n: f64, pattern: &str) -> String {
    let (mantissa_pattern, exp_pattern) = pattern.split_once('E').unwrap_or((pattern, "+0"));
    let show_plus = exp_pattern.starts_with('+');
    let exp_digits = exp_pattern.chars().filter(|&c| c == '0').count().max(1);
    let decimals = mantissa_pattern
        .split_once('.')
        .map_or(0, |(_, f)| f.chars().filter(|c| matches!(c, '0' | '#')).count());

    let mut exponent = if n == 0.0 { 0 } else { n.log10().floor() as i32 };
    let mut mantissa = round_half_away(n / 10f64.powi(exponent), decimals as i32);
    if mantissa >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    }

    let sign = if exponent < 0 {
        "-"
    } else if show_plus {
        "+"
    } else {
        ""
    };
    format!(
        "{:.*}E{}{:0width$}",
        decimals,
        mantissa,
        sign,
        exponent.abs(),
        width = exp_digits
    )
}
