use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::date_util::{end_of_day_exclusive, start_of_day};
use crate::error::{Error, Result};

/// Narrows the records a report is computed over. Every field is optional;
/// the date bounds only take effect when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsFilter {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AnalyticsFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, id: &str) -> Self {
        self.user_id = Some(id.to_string());
        self
    }

    pub fn project(mut self, id: &str) -> Self {
        self.project_id = Some(id.to_string());
        self
    }

    pub fn start(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn end(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn between(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start(start).end(end)
    }

    /// Both dates, or `InvalidRange` when either is missing or the end comes
    /// before the start.
    pub fn require_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end < start => Err(Error::InvalidRange(format!(
                "endDate {end} is before startDate {start}"
            ))),
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(Error::missing_range()),
        }
    }

    /// Half-open instant bounds `[start 00:00, end + 1 day 00:00)` in the
    /// given offset, or `None` unless both dates are set.
    pub fn instant_bounds(&self, offset: &FixedOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                Some((start_of_day(start, offset), end_of_day_exclusive(end, offset)))
            }
            _ => None,
        }
    }

    /// The same filter with the user dropped. The team report scopes by
    /// project and dates only.
    pub fn without_user(&self) -> Self {
        Self {
            user_id: None,
            ..self.clone()
        }
    }
}
