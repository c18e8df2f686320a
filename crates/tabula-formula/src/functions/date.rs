//! Date/time functions
//!
//! Dates travel through formulas as serial numbers in the 1900 date
//! system (see [`tabula_core::date`]). Serial 1 is 1900-01-01, which the
//! 1900 system treats as a Sunday.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tabula_core::{date, parse_number, CellData, CellError};

use super::{number, opt_number, scalar, FunctionResult};
use crate::evaluator::{Arg, EvaluationContext};

/// Text layouts VALUE accepts as dates or times
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%m/%d/%Y %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%b-%Y", "%B %d, %Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M:%S %p"];

fn serial_arg(args: &[Arg], i: usize) -> Result<f64, CellError> {
    let serial = number(args, i)?;
    if !(0.0..date::MAX_SERIAL).contains(&serial) {
        return Err(CellError::Num);
    }
    Ok(serial)
}

fn ymd(args: &[Arg]) -> Result<(i32, u32, u32), CellError> {
    date::ymd_from_serial(serial_arg(args, 0)?).ok_or(CellError::Num)
}

fn time_of(args: &[Arg]) -> Result<NaiveTime, CellError> {
    Ok(date::time_from_fraction(serial_arg(args, 0)?.fract()))
}

/// Day of week of a serial, 0 = Sunday
fn weekday_index(serial: f64) -> i64 {
    (serial.floor() as i64 - 1).rem_euclid(7)
}

/// TODAY()
pub fn fn_today(_args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let today = Local::now().date_naive();
    Ok(CellData::Number(date::serial_from_date(today) as f64))
}

/// NOW()
pub fn fn_now(_args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let now = Local::now().naive_local();
    Ok(CellData::Number(date::serial_from_datetime(now)))
}

/// DATE(year, month, day)
///
/// Years 0-1899 are offset from 1900. Months and days outside their normal
/// range roll over into neighbouring months and years.
pub fn fn_date(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let mut year = number(args, 0)?.trunc() as i64;
    let month = number(args, 1)?.trunc() as i64;
    let day = number(args, 2)?.trunc() as i64;

    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(1900..=9999).contains(&year) {
        return Err(CellError::Num);
    }

    let months = month
        .checked_sub(1)
        .and_then(|m| m.checked_add(year * 12))
        .ok_or(CellError::Num)?;
    let first_year = i32::try_from(months.div_euclid(12)).map_err(|_| CellError::Num)?;
    let first = NaiveDate::from_ymd_opt(first_year, months.rem_euclid(12) as u32 + 1, 1)
        .ok_or(CellError::Num)?;
    let offset = day
        .checked_sub(1)
        .and_then(Duration::try_days)
        .ok_or(CellError::Num)?;
    let target = first.checked_add_signed(offset).ok_or(CellError::Num)?;

    let serial = date::serial_from_date(target);
    if serial < 0 || serial as f64 >= date::MAX_SERIAL {
        return Err(CellError::Num);
    }
    Ok(CellData::Number(serial as f64))
}

/// YEAR(serial_number)
pub fn fn_year(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(ymd(args)?.0 as f64))
}

/// MONTH(serial_number)
pub fn fn_month(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(ymd(args)?.1 as f64))
}

/// DAY(serial_number)
pub fn fn_day(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(ymd(args)?.2 as f64))
}

/// HOUR(serial_number)
pub fn fn_hour(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(time_of(args)?.hour() as f64))
}

/// MINUTE(serial_number)
pub fn fn_minute(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(time_of(args)?.minute() as f64))
}

/// SECOND(serial_number)
pub fn fn_second(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(CellData::Number(time_of(args)?.second() as f64))
}

/// First day of the week (0 = Sunday) for a WEEKDAY/WEEKNUM return type
fn week_start(return_type: i64, allow_zero_based: bool) -> Option<(i64, bool)> {
    match return_type {
        1 | 17 => Some((0, false)),
        2 | 11 => Some((1, false)),
        3 if allow_zero_based => Some((1, true)),
        12..=16 => Some((return_type - 10, false)),
        _ => None,
    }
}

/// WEEKDAY(serial_number, [return_type])
pub fn fn_weekday(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let serial = serial_arg(args, 0)?;
    let return_type = opt_number(args, 1, 1.0)?.trunc() as i64;
    let (start, zero_based) = week_start(return_type, true).ok_or(CellError::Num)?;

    let offset = (weekday_index(serial) - start).rem_euclid(7);
    let value = if zero_based { offset } else { offset + 1 };
    Ok(CellData::Number(value as f64))
}

/// WEEKNUM(serial_number, [return_type])
///
/// Week 1 contains January 1st; type 21 uses ISO 8601 weeks instead.
pub fn fn_weeknum(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    let serial = serial_arg(args, 0)?;
    let return_type = opt_number(args, 1, 1.0)?.trunc() as i64;

    if return_type == 21 {
        let dt = date::datetime_from_serial(serial).ok_or(CellError::Num)?;
        return Ok(CellData::Number(dt.iso_week().week() as f64));
    }

    let (start, _) = week_start(return_type, false).ok_or(CellError::Num)?;
    let (year, _, _) = date::ymd_from_serial(serial).ok_or(CellError::Num)?;
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(CellError::Num)?;
    let jan1_serial = date::serial_from_date(jan1);

    let lead = (weekday_index(jan1_serial as f64) - start).rem_euclid(7);
    let days = serial.floor() as i64 - jan1_serial;
    Ok(CellData::Number(((days + lead) / 7 + 1) as f64))
}

/// VALUE(text): numbers, percentages, dates and times written as text
pub fn fn_value(args: &[Arg], _ctx: &EvaluationContext) -> FunctionResult {
    match scalar(args, 0) {
        CellData::Number(n) => Ok(CellData::Number(n)),
        CellData::Date(dt) => Ok(CellData::Number(date::serial_from_datetime(dt))),
        CellData::Empty => Ok(CellData::Number(0.0)),
        CellData::Error(e) => Err(e),
        CellData::Boolean(_) => Err(CellError::Value),
        CellData::Text(s) => parse_value(s.trim()).map(CellData::Number).ok_or(CellError::Value),
    }
}

fn parse_value(s: &str) -> Option<f64> {
    if let Some(n) = parse_number(s) {
        return Some(n);
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(date::serial_from_datetime(dt));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return Some(date::serial_from_date(d) as f64);
        }
    }
    for format in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(s, format) {
            return Some(t.num_seconds_from_midnight() as f64 / 86_400.0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::test_util::eval;
    use pretty_assertions::assert_eq;
    use tabula_core::{CellData, CellError};

    #[test]
    fn test_date_serials() {
        assert_eq!(eval("=DATE(2024,1,15)"), CellData::Number(45306.0));
        assert_eq!(eval("=DATE(2024,1,0)"), CellData::Number(45291.0));
        assert_eq!(eval("=DATE(2023,13,15)"), CellData::Number(45306.0));
        assert_eq!(eval("=DATE(124,1,15)"), CellData::Number(45306.0));
        assert_eq!(eval("=DATE(10000,1,1)"), CellData::Error(CellError::Num));
    }

    #[test]
    fn test_huge_arguments_are_num_errors() {
        let num = CellData::Error(CellError::Num);
        assert_eq!(eval("=DATE(2020,1,1E15)"), num);
        assert_eq!(eval("=DATE(2020,1E20,1)"), num);
        assert_eq!(eval("=DATE(2020,1,0-1E15)"), num);
        assert_eq!(eval("=DATE(1E18,1,1)"), num);
        assert_eq!(eval("=DATE(9999,12,32)"), num);
        assert_eq!(eval("=DATE(9999,12,31)"), CellData::Number(2_958_465.0));
        assert_eq!(eval("=YEAR(1E300)"), num);
        assert_eq!(eval("=MONTH(1E20)"), num);
        assert_eq!(eval("=DAY(2958466)"), num);
        assert_eq!(eval("=WEEKNUM(1E300)"), num);
        assert_eq!(eval("=WEEKDAY(1E300)"), num);
        assert_eq!(eval("=HOUR(1E300)"), num);
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval("=YEAR(45306)"), CellData::Number(2024.0));
        assert_eq!(eval("=MONTH(45306)"), CellData::Number(1.0));
        assert_eq!(eval("=DAY(45306)"), CellData::Number(15.0));
        assert_eq!(eval("=DAY(60)"), CellData::Number(29.0));
        assert_eq!(eval("=YEAR(0-1)"), CellData::Error(CellError::Num));
        assert_eq!(eval("=YEAR(\"x\")"), CellData::Error(CellError::Value));
    }

    #[test]
    fn test_time_parts() {
        assert_eq!(eval("=HOUR(45306.75)"), CellData::Number(18.0));
        assert_eq!(eval("=MINUTE(0.5+7/1440)"), CellData::Number(7.0));
        assert_eq!(eval("=SECOND(30/86400)"), CellData::Number(30.0));
    }

    #[test]
    fn test_weekday_return_types() {
        // 2024-01-15 is a Monday
        assert_eq!(eval("=WEEKDAY(45306)"), CellData::Number(2.0));
        assert_eq!(eval("=WEEKDAY(45306,2)"), CellData::Number(1.0));
        assert_eq!(eval("=WEEKDAY(45306,3)"), CellData::Number(0.0));
        assert_eq!(eval("=WEEKDAY(45306,12)"), CellData::Number(7.0));
        assert_eq!(eval("=WEEKDAY(45306,17)"), CellData::Number(2.0));
        assert_eq!(eval("=WEEKDAY(45306,9)"), CellData::Error(CellError::Num));
    }

    #[test]
    fn test_weeknum() {
        // 2024-01-01 is a Monday
        assert_eq!(eval("=WEEKNUM(DATE(2024,1,6))"), CellData::Number(1.0));
        assert_eq!(eval("=WEEKNUM(DATE(2024,1,7))"), CellData::Number(2.0));
        assert_eq!(eval("=WEEKNUM(DATE(2024,1,7),2)"), CellData::Number(1.0));
        assert_eq!(eval("=WEEKNUM(DATE(2024,1,15))"), CellData::Number(3.0));
        assert_eq!(eval("=WEEKNUM(DATE(2021,1,1),21)"), CellData::Number(53.0));
        assert_eq!(eval("=WEEKNUM(45306,3)"), CellData::Error(CellError::Num));
    }

    #[test]
    fn test_value() {
        assert_eq!(eval("=VALUE(\"1,234.5\")"), CellData::Number(1234.5));
        assert_eq!(eval("=VALUE(\"50%\")"), CellData::Number(0.5));
        assert_eq!(eval("=VALUE(\"2024-01-15\")"), CellData::Number(45306.0));
        assert_eq!(eval("=VALUE(\"18:00\")"), CellData::Number(0.75));
        assert_eq!(eval("=VALUE(\"abc\")"), CellData::Error(CellError::Value));
    }

    #[test]
    fn test_today_is_whole_day() {
        match eval("=TODAY()") {
            CellData::Number(n) => assert_eq!(n.fract(), 0.0),
            other => panic!("unexpected {:?}", other),
        }
    }
}
