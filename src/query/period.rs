use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::date_util::{last_day_of_month, parse_date, quarter_of};
use crate::error::{Error, Result};

static RE_QUARTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").unwrap());
static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_ROLLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,4})[dD]$").unwrap());

/// A named window of calendar days, resolved against a reference "today".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Quarter(i32, u8),
    Month(i32, u8),
    Week(i32, u8),
    /// The last N days, ending on (and including) the given day.
    Rolling(u32, NaiveDate),
    YearToDate(NaiveDate),
    QuarterToDate(NaiveDate),
    MonthToDate(NaiveDate),
    Range(NaiveDate, NaiveDate),
}

impl Period {
    /// Parse a period string.
    ///
    /// Supported formats:
    /// - `2025` year
    /// - `2025-Q1` quarter
    /// - `2025-01` month
    /// - `2025-W05` ISO week
    /// - `30d` rolling last N days
    /// - `ytd`, `qtd`, `mtd` to date
    /// - `2025-01-01..2025-01-31` explicit range
    pub fn parse(s: &str, today: NaiveDate) -> Result<Self> {
        let s = s.trim();

        match s.to_lowercase().as_str() {
            "ytd" => return Ok(Period::YearToDate(today)),
            "qtd" => return Ok(Period::QuarterToDate(today)),
            "mtd" => return Ok(Period::MonthToDate(today)),
            _ => {}
        }

        if let Some((start, end)) = s.split_once("..") {
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            if end < start {
                return Err(Error::PeriodParse(format!("range ends before it starts: {s}")));
            }
            return Ok(Period::Range(start, end));
        }

        if let Some(caps) = RE_ROLLING.captures(s) {
            let n: u32 = parse_capture(&caps[1], s)?;
            if n == 0 {
                return Err(Error::PeriodParse(format!("rolling window must be at least 1 day: {s}")));
            }
            return Ok(Period::Rolling(n, today));
        }

        if s.len() == 4 {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Period::Year(year));
            }
        }

        if let Some(caps) = RE_QUARTER.captures(s) {
            return Ok(Period::Quarter(parse_capture(&caps[1], s)?, parse_capture(&caps[2], s)?));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let week: u8 = parse_capture(&caps[2], s)?;
            if (1..=53).contains(&week) {
                return Ok(Period::Week(parse_capture(&caps[1], s)?, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let month: u8 = parse_capture(&caps[2], s)?;
            if (1..=12).contains(&month) {
                return Ok(Period::Month(parse_capture(&caps[1], s)?, month));
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Canonical key string.
    pub fn to_key(&self) -> String {
        match self {
            Period::Year(y) => format!("{y}"),
            Period::Quarter(y, q) => format!("{y}-Q{q}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
            Period::Rolling(n, _) => format!("{n}d"),
            Period::YearToDate(d) => format!("{}-ytd", d.year()),
            Period::QuarterToDate(d) => format!("{}-Q{}-td", d.year(), quarter_of(*d)),
            Period::MonthToDate(d) => format!("{}-{:02}-td", d.year(), d.month()),
            Period::Range(a, b) => format!("{a}..{b}"),
        }
    }

    /// Inclusive start and end day.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        let invalid = || Error::PeriodParse(format!("no such period: {}", self.to_key()));
        let ymd = |y: i32, m: u32, d: u32| NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid);

        match *self {
            Period::Year(y) => Ok((ymd(y, 1, 1)?, ymd(y, 12, 31)?)),
            Period::Quarter(y, q) => {
                let start_month = (q as u32 - 1) * 3 + 1;
                Ok((ymd(y, start_month, 1)?, last_day_of_month(y, q as u32 * 3)))
            }
            Period::Month(y, m) => Ok((ymd(y, m as u32, 1)?, last_day_of_month(y, m as u32))),
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(y, w as u32, Weekday::Mon).ok_or_else(invalid)?;
                Ok((start, start + Duration::days(6)))
            }
            Period::Rolling(n, as_of) => Ok((as_of - Duration::days(n as i64 - 1), as_of)),
            Period::YearToDate(today) => Ok((ymd(today.year(), 1, 1)?, today)),
            Period::QuarterToDate(today) => {
                let start_month = (quarter_of(today) as u32 - 1) * 3 + 1;
                Ok((ymd(today.year(), start_month, 1)?, today))
            }
            Period::MonthToDate(today) => Ok((ymd(today.year(), today.month(), 1)?, today)),
            Period::Range(start, end) => Ok((start, end)),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_key())
    }
}

fn parse_capture<T: std::str::FromStr>(raw: &str, whole: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::PeriodParse(format!("invalid number in period: {whole}")))
}
