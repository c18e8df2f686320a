//! Serial date conversions (1900 date system)
//!
//! Dates are exchanged with formulas as serial numbers: whole days since
//! 1899-12-31 plus a fractional time of day. The 1900 system keeps the
//! historical phantom day 1900-02-29 as serial 60, so every date from
//! 1900-03-01 onwards is one day later than a plain day count.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// First serial past 9999-12-31, the last representable date
pub const MAX_SERIAL: f64 = 2_958_466.0;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 31).unwrap_or(NaiveDate::MIN)
}

fn phantom_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 3, 1).unwrap_or(NaiveDate::MIN)
}

/// Serial day number for a calendar date
pub fn serial_from_date(date: NaiveDate) -> i64 {
    let days = (date - epoch()).num_days();
    if date >= phantom_cutoff() {
        days + 1
    } else {
        days
    }
}

/// Serial number (with time fraction) for a date-time
pub fn serial_from_datetime(dt: NaiveDateTime) -> f64 {
    let day = serial_from_date(dt.date()) as f64;
    let secs = dt.time().num_seconds_from_midnight() as f64
        + dt.time().nanosecond() as f64 / 1_000_000_000.0;
    day + secs / SECONDS_PER_DAY
}

/// Calendar (year, month, day) for a serial day, reporting serial 60 as
/// 1900-02-29
pub fn ymd_from_serial(serial: f64) -> Option<(i32, u32, u32)> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_SERIAL {
        return None;
    }
    let days = serial.floor() as i64;
    if days == 60 {
        return Some((1900, 2, 29));
    }
    if days == 0 {
        return Some((1900, 1, 0));
    }
    let date = date_from_serial_day(days)?;
    Some((date.year(), date.month(), date.day()))
}

fn date_from_serial_day(days: i64) -> Option<NaiveDate> {
    let adjusted = if days > 60 { days - 1 } else { days };
    epoch().checked_add_signed(Duration::try_days(adjusted)?)
}

/// Date-time for a serial number. Serial 60 has no real calendar date and
/// maps to 1900-02-28.
pub fn datetime_from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_SERIAL {
        return None;
    }
    let days = serial.floor() as i64;
    let date = date_from_serial_day(days.max(1))?;
    Some(NaiveDateTime::new(date, time_from_fraction(serial - days as f64)))
}

/// Time of day for the fractional part of a serial number
pub fn time_from_fraction(fraction: f64) -> NaiveTime {
    let secs = (fraction.rem_euclid(1.0) * SECONDS_PER_DAY).round() as u32;
    let secs = secs.min(86_399);
    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_known_serials() {
        assert_eq!(serial_from_date(ymd(1900, 1, 1)), 1);
        assert_eq!(serial_from_date(ymd(1900, 2, 28)), 59);
        assert_eq!(serial_from_date(ymd(1900, 3, 1)), 61);
        assert_eq!(serial_from_date(ymd(2024, 1, 15)), 45306);
    }

    #[test]
    fn test_phantom_leap_day() {
        assert_eq!(ymd_from_serial(60.0), Some((1900, 2, 29)));
        assert_eq!(ymd_from_serial(61.0), Some((1900, 3, 1)));
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = NaiveDateTime::new(ymd(2024, 1, 15), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        let serial = serial_from_datetime(dt);
        assert_eq!(serial, 45306.75);
        assert_eq!(datetime_from_serial(serial), Some(dt));
    }

    #[test]
    fn test_negative_serial_is_rejected() {
        assert_eq!(ymd_from_serial(-1.0), None);
        assert_eq!(datetime_from_serial(-0.5), None);
    }

    #[test]
    fn test_serials_past_year_9999_are_rejected() {
        assert_eq!(ymd_from_serial(2_958_465.0), Some((9999, 12, 31)));
        assert_eq!(ymd_from_serial(MAX_SERIAL), None);
        assert_eq!(ymd_from_serial(1e20), None);
        assert_eq!(ymd_from_serial(1e300), None);
        assert_eq!(datetime_from_serial(1e300), None);
        assert_eq!(date_from_serial_day(i64::MAX), None);
    }
}
