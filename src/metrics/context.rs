use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::records::TaskStatus;

/// Statuses that count as done unless configured otherwise.
pub const DEFAULT_DONE_STATUSES: [TaskStatus; 2] = [TaskStatus::Done, TaskStatus::Completed];

/// Everything a report needs besides the records themselves: the instant the
/// report is built at, the offset that defines calendar days, and which
/// statuses mark a task as done.
#[derive(Debug, Clone)]
pub struct ReportContext {
    now: DateTime<Utc>,
    offset: FixedOffset,
    done_statuses: Vec<TaskStatus>,
}

impl ReportContext {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now,
            offset,
            done_statuses: DEFAULT_DONE_STATUSES.to_vec(),
        }
    }

    /// A context pinned to the host clock and its local offset.
    pub fn local() -> Self {
        let now = Local::now();
        Self::new(now.with_timezone(&Utc), *now.offset())
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Replace the done statuses. An empty list keeps the defaults, since no
    /// task could ever complete otherwise.
    pub fn with_done_statuses(mut self, statuses: Vec<TaskStatus>) -> Self {
        if !statuses.is_empty() {
            self.done_statuses = statuses;
        }
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    pub fn done_statuses(&self) -> &[TaskStatus] {
        &self.done_statuses
    }

    pub fn is_done(&self, status: TaskStatus) -> bool {
        self.done_statuses.contains(&status)
    }

    /// The calendar day `now` falls on.
    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now)
    }

    /// The calendar day an instant falls on.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }
}

/// Parse a comma-separated list of status names such as `done,COMPLETED`.
pub fn parse_status_list(raw: &str) -> Result<Vec<TaskStatus>> {
    let statuses = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| TaskStatus::parse(s).ok_or_else(|| Error::Config(format!("unknown task status: {s}"))))
        .collect::<Result<Vec<_>>>()?;
    if statuses.is_empty() {
        return Err(Error::Config("at least one done status is required".into()));
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_date_respects_offset() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 23, 30, 0).unwrap();
        let utc = ReportContext::new(now, FixedOffset::east_opt(0).unwrap());
        assert_eq!(utc.today(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());

        let plus2 = utc.clone().with_offset(FixedOffset::east_opt(7200).unwrap());
        assert_eq!(plus2.today(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
    }

    #[test]
    fn test_done_statuses() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let ctx = ReportContext::new(now, FixedOffset::east_opt(0).unwrap());
        assert!(ctx.is_done(TaskStatus::Done));
        assert!(ctx.is_done(TaskStatus::Completed));
        assert!(!ctx.is_done(TaskStatus::InReview));

        let strict = ctx.clone().with_done_statuses(vec![TaskStatus::Done]);
        assert!(!strict.is_done(TaskStatus::Completed));

        let unchanged = ctx.with_done_statuses(Vec::new());
        assert!(unchanged.is_done(TaskStatus::Completed));
    }

    #[test]
    fn test_parse_status_list() {
        assert_eq!(
            parse_status_list("done, COMPLETED").unwrap(),
            vec![TaskStatus::Done, TaskStatus::Completed]
        );
        assert_eq!(parse_status_list("in_review").unwrap(), vec![TaskStatus::InReview]);
        assert!(matches!(parse_status_list("finished"), Err(Error::Config(_))));
        assert!(matches!(parse_status_list(" , "), Err(Error::Config(_))));
    }
}
