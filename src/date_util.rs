use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};

use crate::error::{Error, Result};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Get the quarter (1-4) for a given date.
pub fn quarter_of(d: NaiveDate) -> u8 {
    ((d.month() - 1) / 3 + 1) as u8
}

/// Round to two decimal places. Values that are not finite collapse to 0.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator * 100`, rounded to an integer; 0 when the
/// denominator is 0.
pub fn percentage(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    (numerator as f64 / denominator as f64 * 100.0).round() as u32
}

/// Convert a minute count to hours, rounded to two decimals.
pub fn minutes_to_hours(minutes: i64) -> f64 {
    round2(minutes as f64 / 60.0)
}

/// Whole days between two instants, rounded up, never less than 1.
pub fn ceil_days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    if millis <= 0 {
        return 1;
    }
    ((millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY).max(1)
}

/// Every calendar day from `start` to `end`, both inclusive. Empty when
/// `end < start`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Parse a calendar date. Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp,
/// in which case the date is taken in the timestamp's own offset.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .map_err(|_| Error::InvalidDate(format!("expected YYYY-MM-DD or RFC 3339, got {s:?}")))
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidDate(format!("expected RFC 3339 timestamp, got {s:?}")))
}

/// Canonical storage form: UTC with millisecond precision, so lexical order
/// matches chronological order.
pub fn to_storage_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The UTC instant at which `date` begins in `offset`.
pub fn start_of_day(date: NaiveDate, offset: &FixedOffset) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// The UTC instant at which the day after `date` begins in `offset`.
pub fn end_of_day_exclusive(date: NaiveDate, offset: &FixedOffset) -> DateTime<Utc> {
    start_of_day(date, offset) + Duration::days(1)
}

/// Parse a UTC offset such as `+02:00`, `-0530` or `Z`.
pub fn parse_offset(s: &str) -> Result<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| Error::Config("invalid offset".into()));
    }
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(Error::Config(format!("offset must start with + or -: {s}"))),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Config(format!("offset must look like +HH:MM: {s}")));
    }
    let hours: i32 = digits[..2].parse().map_err(|_| Error::Config(s.to_string()))?;
    let minutes: i32 = digits[2..].parse().map_err(|_| Error::Config(s.to_string()))?;
    if hours > 23 || minutes > 59 {
        return Err(Error::Config(format!("offset out of range: {s}")));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| Error::Config(format!("offset out of range: {s}")))
}
