//! Date-indexed series. Every series covers each calendar day of its window,
//! including days with no activity.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::date_util::days_inclusive;
use crate::metrics::context::ReportContext;
use crate::metrics::types::{BurndownPoint, DailyTrend};
use crate::records::Task;

/// Length of the rolling window used by the productivity report.
pub const TREND_WINDOW_DAYS: i64 = 14;

/// Created and completed counts for each of the last 14 days, today
/// included, oldest first.
pub fn daily_trends(tasks: &[Task], ctx: &ReportContext) -> Vec<DailyTrend> {
    let end = ctx.today();
    let start = end - Duration::days(TREND_WINDOW_DAYS - 1);

    let mut by_day: BTreeMap<NaiveDate, DailyTrend> = days_inclusive(start, end)
        .map(|date| {
            (
                date,
                DailyTrend {
                    date,
                    completed: 0,
                    created: 0,
                },
            )
        })
        .collect();

    for task in tasks {
        if let Some(day) = by_day.get_mut(&ctx.local_date(task.created_at)) {
            day.created += 1;
        }
        if ctx.is_done(task.status) {
            if let Some(day) = by_day.get_mut(&ctx.local_date(task.updated_at)) {
                day.completed += 1;
            }
        }
    }

    by_day.into_values().collect()
}

/// Ideal-versus-actual burndown over `[start, end]`.
///
/// `ideal` is the straight-line count of tasks that should be done after the
/// days elapsed since `start`; `actual` is the number of tasks completed on
/// that day; `tasks_remaining` subtracts the running total of `actual`.
pub fn burndown(
    tasks: &[Task],
    start: NaiveDate,
    end: NaiveDate,
    ctx: &ReportContext,
) -> Vec<BurndownPoint> {
    if tasks.is_empty() {
        return empty_burndown(start, end);
    }

    let total = tasks.len() as u64;
    let total_days = (end - start).num_days().max(1);
    let per_day = total as f64 / total_days as f64;

    let mut completed_on: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for task in tasks.iter().filter(|t| ctx.is_done(t.status)) {
        *completed_on.entry(ctx.local_date(task.updated_at)).or_insert(0) += 1;
    }

    days_inclusive(start, end)
        .scan(0u64, |done_so_far, date| {
            let elapsed = (date - start).num_days();
            let actual = completed_on.get(&date).copied().unwrap_or(0);
            *done_so_far += actual;
            Some(BurndownPoint {
                date,
                ideal: (per_day * elapsed as f64).round() as u64,
                actual,
                tasks_remaining: total.saturating_sub(*done_so_far),
            })
        })
        .collect()
}

/// The all-zero skeleton over `[start, end]`.
pub fn empty_burndown(start: NaiveDate, end: NaiveDate) -> Vec<BurndownPoint> {
    days_inclusive(start, end)
        .map(|date| BurndownPoint {
            date,
            ideal: 0,
            actual: 0,
            tasks_remaining: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{TaskPriority, TaskStatus};
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn ctx_at(now: DateTime<Utc>) -> ReportContext {
        ReportContext::new(now, FixedOffset::east_opt(0).unwrap())
    }

    fn task(id: &str, status: TaskStatus, created: DateTime<Utc>, updated: DateTime<Utc>) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            status,
            priority: TaskPriority::Low,
            due_date: None,
            estimated_hours: None,
            actual_hours: None,
            created_at: created,
            updated_at: updated,
            assignees: Vec::new(),
            project: None,
            time_entries: Vec::new(),
        }
    }

    #[test]
    fn test_daily_trends_always_fourteen_days() {
        let ctx = ctx_at(at(2025, 3, 15, 12));
        let trends = daily_trends(&[], &ctx);
        assert_eq!(trends.len(), 14);
        assert_eq!(trends[0].date, date(2025, 3, 2));
        assert_eq!(trends[13].date, date(2025, 3, 15));
        assert!(trends.windows(2).all(|w| w[0].date < w[1].date));
        assert!(trends.iter().all(|d| d.created == 0 && d.completed == 0));
    }

    #[test]
    fn test_daily_trends_counts() {
        let ctx = ctx_at(at(2025, 3, 15, 12));
        let tasks = vec![
            task("a", TaskStatus::Done, at(2025, 3, 10, 9), at(2025, 3, 12, 9)),
            task("b", TaskStatus::Todo, at(2025, 3, 10, 15), at(2025, 3, 12, 9)),
            task("c", TaskStatus::Completed, at(2025, 3, 15, 8), at(2025, 3, 15, 11)),
            // Created before the window, completed inside it
            task("d", TaskStatus::Done, at(2025, 1, 1, 9), at(2025, 3, 2, 0)),
        ];
        let trends = daily_trends(&tasks, &ctx);
        let on = |d: NaiveDate| trends.iter().find(|t| t.date == d).unwrap();

        assert_eq!(on(date(2025, 3, 10)).created, 2);
        assert_eq!(on(date(2025, 3, 12)).completed, 1);
        assert_eq!(on(date(2025, 3, 15)).created, 1);
        assert_eq!(on(date(2025, 3, 15)).completed, 1);
        assert_eq!(on(date(2025, 3, 2)).completed, 1);
        assert_eq!(trends.iter().map(|t| t.created).sum::<u64>(), 3);
    }

    #[test]
    fn test_daily_trends_use_local_days() {
        // 23:30 UTC on the 14th is already the 15th at +02:00
        let now = at(2025, 3, 15, 12);
        let ctx = ctx_at(now).with_offset(FixedOffset::east_opt(7200).unwrap());
        let late = Utc.with_ymd_and_hms(2025, 3, 14, 23, 30, 0).unwrap();
        let trends = daily_trends(&[task("a", TaskStatus::Todo, late, late)], &ctx);
        assert_eq!(trends[13].date, date(2025, 3, 15));
        assert_eq!(trends[13].created, 1);
    }

    #[test]
    fn test_burndown_length_matches_range() {
        let ctx = ctx_at(at(2024, 2, 1, 0));
        let tasks = vec![task("a", TaskStatus::Todo, at(2024, 1, 1, 0), at(2024, 1, 1, 0))];
        let series = burndown(&tasks, date(2024, 1, 1), date(2024, 1, 5), &ctx);
        assert_eq!(series.len(), 5);
        assert_eq!(series[0].date, date(2024, 1, 1));
        assert_eq!(series[4].date, date(2024, 1, 5));
    }

    #[test]
    fn test_burndown_single_day_range() {
        let ctx = ctx_at(at(2024, 2, 1, 0));
        let tasks: Vec<_> = (0..10)
            .map(|i| task(&format!("t{i}"), TaskStatus::Todo, at(2024, 1, 3, 9), at(2024, 1, 3, 9)))
            .collect();
        let series = burndown(&tasks, date(2024, 1, 3), date(2024, 1, 3), &ctx);
        assert_eq!(
            series,
            vec![BurndownPoint {
                date: date(2024, 1, 3),
                ideal: 0,
                actual: 0,
                tasks_remaining: 10,
            }]
        );
    }

    #[test]
    fn test_burndown_ideal_and_running_remaining() {
        let ctx = ctx_at(at(2024, 2, 1, 0));
        let created = at(2024, 1, 1, 9);
        let tasks = vec![
            task("a", TaskStatus::Done, created, at(2024, 1, 2, 10)),
            task("b", TaskStatus::Done, created, at(2024, 1, 2, 16)),
            task("c", TaskStatus::Done, created, at(2024, 1, 5, 10)),
            task("d", TaskStatus::InReview, created, at(2024, 1, 3, 10)),
            // Completed after the window: never counted
            task("e", TaskStatus::Done, created, at(2024, 1, 9, 10)),
        ];
        let series = burndown(&tasks, date(2024, 1, 1), date(2024, 1, 5), &ctx);

        // 5 tasks over 4 days: 1.25 per elapsed day
        let ideal: Vec<_> = series.iter().map(|p| p.ideal).collect();
        assert_eq!(ideal, vec![0, 1, 3, 4, 5]);
        let actual: Vec<_> = series.iter().map(|p| p.actual).collect();
        assert_eq!(actual, vec![0, 2, 0, 0, 1]);
        let remaining: Vec<_> = series.iter().map(|p| p.tasks_remaining).collect();
        assert_eq!(remaining, vec![5, 3, 3, 3, 2]);
    }

    #[test]
    fn test_empty_burndown_skeleton() {
        let ctx = ctx_at(at(2024, 2, 1, 0));
        let series = burndown(&[], date(2024, 1, 1), date(2024, 1, 3), &ctx);
        assert_eq!(series.len(), 3);
        assert!(series
            .iter()
            .all(|p| p.ideal == 0 && p.actual == 0 && p.tasks_remaining == 0));
    }
}
