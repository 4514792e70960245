//! Task-level figures: completion, punctuality, overdue work, estimate
//! accuracy and priority mix.

use crate::date_util::percentage;
use crate::metrics::context::ReportContext;
use crate::metrics::types::{PriorityDistribution, TaskMetrics};
use crate::records::{Task, TaskPriority};

/// Compute every task-level figure for a list of tasks.
pub fn task_metrics(tasks: &[Task], ctx: &ReportContext) -> TaskMetrics {
    let completed = count_completed(tasks, ctx);
    TaskMetrics {
        completed_tasks: completed as u64,
        total_tasks: tasks.len() as u64,
        productivity_score: percentage(completed, tasks.len()),
        on_time_completion_rate: on_time_completion_rate(tasks, ctx),
        overdue_tasks: count_overdue(tasks, ctx) as u64,
        time_estimate_accuracy: time_estimate_accuracy(tasks),
        priority_distribution: priority_distribution(tasks),
    }
}

pub fn count_completed(tasks: &[Task], ctx: &ReportContext) -> usize {
    tasks.iter().filter(|t| ctx.is_done(t.status)).count()
}

/// Share of completed tasks that were finished by their due date. A task
/// without a due date is on time; otherwise its last update must not be
/// later than the due date.
pub fn on_time_completion_rate(tasks: &[Task], ctx: &ReportContext) -> u32 {
    let (on_time, completed) = tasks
        .iter()
        .filter(|t| ctx.is_done(t.status))
        .fold((0usize, 0usize), |(on_time, completed), t| {
            let punctual = t.due_date.map_or(true, |due| due >= t.updated_at);
            (on_time + usize::from(punctual), completed + 1)
        });
    percentage(on_time, completed)
}

/// Open tasks whose due date has already passed.
pub fn count_overdue(tasks: &[Task], ctx: &ReportContext) -> usize {
    let now = ctx.now();
    tasks
        .iter()
        .filter(|t| !ctx.is_done(t.status))
        .filter(|t| t.due_date.is_some_and(|due| due < now))
        .count()
}

/// Score from 0 to 100 of how close estimates were to logged time.
///
/// Only tasks with a positive estimate and at least one time entry take part.
/// The mean absolute difference in hours is scaled by 100 and subtracted
/// from 100, floored at 0.
pub fn time_estimate_accuracy(tasks: &[Task]) -> u32 {
    let (diff_sum, sampled) = tasks
        .iter()
        .filter(|t| !t.time_entries.is_empty())
        .filter_map(|t| match t.estimated_hours {
            Some(estimate) if estimate > 0.0 => Some((estimate, t.logged_minutes())),
            _ => None,
        })
        .fold((0.0f64, 0usize), |(sum, n), (estimate, minutes)| {
            let actual = minutes as f64 / 60.0;
            (sum + (estimate - actual).abs(), n + 1)
        });
    if sampled == 0 {
        return 0;
    }
    let avg_diff = diff_sum / sampled as f64;
    (100.0 - avg_diff * 100.0).max(0.0).round() as u32
}

/// High, medium and low counts. Critical and urgent tasks are left out.
pub fn priority_distribution(tasks: &[Task]) -> PriorityDistribution {
    tasks.iter().fold(PriorityDistribution::default(), |mut dist, t| {
        match t.priority {
            TaskPriority::High => dist.high += 1,
            TaskPriority::Medium => dist.medium += 1,
            TaskPriority::Low => dist.low += 1,
            TaskPriority::Critical | TaskPriority::Urgent => {}
        }
        dist
    })
}
