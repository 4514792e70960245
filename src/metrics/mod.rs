pub mod context;
pub mod tasks;
pub mod team;
pub mod time;
pub mod trend;
pub mod types;

pub use context::ReportContext;
pub use types::*;

use crate::error::Result;
use crate::query::{AnalyticsFilter, TaskQuery, TimeEntryQuery};
use crate::records::{Task, TimeEntry};
use crate::storage::Database;

/// Productivity report over an already fetched task list.
pub fn productivity(tasks: &[Task], ctx: &ReportContext) -> ProductivityMetrics {
    let m = tasks::task_metrics(tasks, ctx);
    ProductivityMetrics {
        completed_tasks: m.completed_tasks,
        total_tasks: m.total_tasks,
        productivity_score: m.productivity_score,
        on_time_completion_rate: m.on_time_completion_rate,
        overdue_tasks: m.overdue_tasks,
        time_estimate_accuracy: m.time_estimate_accuracy,
        priority_distribution: m.priority_distribution,
        daily_trends: trend::daily_trends(tasks, ctx),
    }
}

/// Time-tracking report over an already fetched entry list.
pub fn time_tracking(entries: &[TimeEntry]) -> TimeTrackingMetrics {
    time::aggregate_time(entries)
}

/// Team report over already fetched tasks and entries. Requires both dates
/// on `filter`.
pub fn team_performance(
    filter: &AnalyticsFilter,
    tasks: &[Task],
    entries: &[TimeEntry],
    ctx: &ReportContext,
) -> Result<TeamPerformanceMetrics> {
    team::team_performance(filter, tasks, entries, ctx)
}

/// Fetch the tasks matching `filter` and compute the productivity report.
pub async fn compute_productivity(
    db: &Database,
    filter: &AnalyticsFilter,
    ctx: &ReportContext,
) -> Result<ProductivityMetrics> {
    let tasks = TaskQuery::from_filter(filter, ctx.offset()).fetch(db).await?;
    log::debug!("productivity report over {} tasks", tasks.len());
    Ok(productivity(&tasks, ctx))
}

/// Fetch the time entries matching `filter` and compute the time report.
pub async fn compute_time_tracking(
    db: &Database,
    filter: &AnalyticsFilter,
    ctx: &ReportContext,
) -> Result<TimeTrackingMetrics> {
    let entries = TimeEntryQuery::from_filter(filter, ctx.offset()).fetch(db).await?;
    log::debug!("time report over {} entries", entries.len());
    Ok(time_tracking(&entries))
}

/// Fetch the project's tasks and entries in the filter's range and compute
/// the team report. The user on `filter` is ignored.
pub async fn compute_team_performance(
    db: &Database,
    filter: &AnalyticsFilter,
    ctx: &ReportContext,
) -> Result<TeamPerformanceMetrics> {
    filter.require_range()?;
    let scope = filter.without_user();
    let tasks = TaskQuery::from_filter(&scope, ctx.offset()).fetch(db).await?;
    let entries = TimeEntryQuery::from_filter(&scope, ctx.offset()).fetch(db).await?;
    log::debug!(
        "team report over {} tasks and {} entries",
        tasks.len(),
        entries.len()
    );
    team_performance(&scope, &tasks, &entries, ctx)
}
