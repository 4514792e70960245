//! Team performance: velocity, burndown, per-member contribution and overall
//! completion over an explicit date range.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::NaiveDate;

use crate::date_util::{minutes_to_hours, percentage, round2};
use crate::error::Result;
use crate::metrics::context::ReportContext;
use crate::metrics::tasks::count_completed;
use crate::metrics::trend::{burndown, empty_burndown};
use crate::metrics::types::{CompletionRates, TeamMemberContribution, TeamPerformanceMetrics};
use crate::query::filter::AnalyticsFilter;
use crate::records::{Task, TimeEntry, UserRef};

/// Build the team report for the range carried by `filter`.
///
/// Fails with `InvalidRange` when the filter lacks either date or the range
/// is reversed. With no tasks the report is the zero skeleton: velocity 0, a
/// zeroed burndown for every day, no contributions.
pub fn team_performance(
    filter: &AnalyticsFilter,
    tasks: &[Task],
    entries: &[TimeEntry],
    ctx: &ReportContext,
) -> Result<TeamPerformanceMetrics> {
    let (start, end) = filter.require_range()?;

    if tasks.is_empty() {
        return Ok(TeamPerformanceMetrics {
            team_velocity: 0.0,
            burndown: empty_burndown(start, end),
            individual_contributions: Vec::new(),
            completion_rates: CompletionRates::default(),
        });
    }

    Ok(TeamPerformanceMetrics {
        team_velocity: team_velocity(tasks, start, end, ctx),
        burndown: burndown(tasks, start, end, ctx),
        individual_contributions: individual_contributions(entries, ctx),
        completion_rates: completion_rates(tasks, ctx),
    })
}

/// Completed tasks per day of the period, to 2 decimals. A same-day range
/// counts as one day.
pub fn team_velocity(tasks: &[Task], start: NaiveDate, end: NaiveDate, ctx: &ReportContext) -> f64 {
    let days = (end - start).num_days().max(1);
    round2(count_completed(tasks, ctx) as f64 / days as f64)
}

struct Member<'a> {
    user: &'a UserRef,
    minutes: i64,
    done_entries: u64,
}

/// Hours and completed tasks per user, largest contributor first.
///
/// Every entry a member logged against a done task adds one to their
/// completed count. Contribution percentages are shares of all logged minutes.
pub fn individual_contributions(
    entries: &[TimeEntry],
    ctx: &ReportContext,
) -> Vec<TeamMemberContribution> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut members: Vec<Member<'_>> = Vec::new();

    for entry in entries {
        let idx = *index.entry(entry.user.id.as_str()).or_insert_with(|| {
            members.push(Member {
                user: &entry.user,
                minutes: 0,
                done_entries: 0,
            });
            members.len() - 1
        });
        let member = &mut members[idx];
        member.minutes = member.minutes.saturating_add(entry.minutes());
        if entry.task.as_ref().is_some_and(|t| ctx.is_done(t.status)) {
            member.done_entries += 1;
        }
    }

    let total_minutes = members
        .iter()
        .fold(0i64, |acc, m| acc.saturating_add(m.minutes));
    members.sort_by_key(|m| Reverse(m.minutes));

    members
        .into_iter()
        .map(|m| TeamMemberContribution {
            user_id: m.user.id.clone(),
            user_name: m.user.display_name(),
            avatar_url: m.user.avatar_url.clone(),
            hours_logged: minutes_to_hours(m.minutes),
            tasks_completed: m.done_entries,
            contribution_percentage: if total_minutes > 0 {
                round2(m.minutes as f64 / total_minutes as f64 * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}

pub fn completion_rates(tasks: &[Task], ctx: &ReportContext) -> CompletionRates {
    let completed = count_completed(tasks, ctx);
    CompletionRates {
        total: tasks.len() as u64,
        completed: completed as u64,
        percentage: percentage(completed, tasks.len()),
    }
}
