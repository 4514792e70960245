//! Time aggregation: logged minutes rolled up into hours per task and per
//! project.
//!
//! Minutes are summed as integers and only converted to hours (and rounded)
//! when the output is formatted, so the same input always yields the same
//! figures and the per-task buckets add up to the total.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::date_util::{ceil_days_between, minutes_to_hours, round2};
use crate::metrics::types::{ProjectTaskHours, ProjectTimeSummary, TaskTimeSummary, TimeTrackingMetrics};
use crate::records::{sum_minutes, TimeEntry};

pub const NO_TASK: &str = "No Task";
pub const NO_PROJECT: &str = "No Project";

/// Grouping key for time rolled up by task or by project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    Linked(String),
    /// Entries with no task (or no project). This bucket is always emitted,
    /// even when nothing falls into it.
    Unlinked,
}

impl Bucket {
    pub fn task_of(entry: &TimeEntry) -> Self {
        match &entry.task {
            Some(task) => Bucket::Linked(task.id.clone()),
            None => Bucket::Unlinked,
        }
    }

    pub fn project_of(entry: &TimeEntry) -> Self {
        match &entry.project {
            Some(project) => Bucket::Linked(project.id.clone()),
            None => Bucket::Unlinked,
        }
    }

    pub fn into_id(self) -> Option<String> {
        match self {
            Bucket::Linked(id) => Some(id),
            Bucket::Unlinked => None,
        }
    }
}

/// Accumulators keyed by bucket, remembering first-seen order so that ties
/// keep a stable position after sorting.
struct Groups<A> {
    index: HashMap<Bucket, usize>,
    slots: Vec<(Bucket, A)>,
}

impl<A> Groups<A> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
        }
    }

    fn seeded(unlinked: A) -> Self {
        let mut groups = Self::new();
        groups.index.insert(Bucket::Unlinked, 0);
        groups.slots.push((Bucket::Unlinked, unlinked));
        groups
    }

    fn slot(&mut self, bucket: Bucket, init: impl FnOnce() -> A) -> &mut A {
        let idx = match self.index.get(&bucket) {
            Some(&idx) => idx,
            None => {
                let idx = self.slots.len();
                self.index.insert(bucket.clone(), idx);
                self.slots.push((bucket, init()));
                idx
            }
        };
        &mut self.slots[idx].1
    }

    /// Consume into a list ordered by `minutes` descending.
    fn into_sorted(self, minutes: impl Fn(&A) -> i64) -> Vec<(Bucket, A)> {
        let mut slots = self.slots;
        slots.sort_by_key(|(_, acc)| Reverse(minutes(acc)));
        slots
    }
}

struct TaskAcc {
    name: String,
    minutes: i64,
    entries: Vec<TimeEntry>,
}

struct TaskHoursAcc {
    name: String,
    minutes: i64,
}

struct ProjectAcc {
    name: String,
    minutes: i64,
    tasks: Groups<TaskHoursAcc>,
}

fn task_name(entry: &TimeEntry) -> String {
    entry
        .task
        .as_ref()
        .map(|t| t.title.clone())
        .unwrap_or_else(|| NO_TASK.to_string())
}

fn project_name(entry: &TimeEntry) -> String {
    entry
        .project
        .as_ref()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| NO_PROJECT.to_string())
}

/// Build the time-tracking report from a list of entries.
pub fn aggregate_time(entries: &[TimeEntry]) -> TimeTrackingMetrics {
    let total_minutes = sum_minutes(entries);
    TimeTrackingMetrics {
        total_hours: minutes_to_hours(total_minutes),
        daily_average: daily_average(entries),
        by_task: group_by_task(entries),
        by_project: group_by_project(entries),
    }
}

/// Total hours divided by the number of days spanned by the entries' start
/// times (at least one). 0 for no entries.
pub fn daily_average(entries: &[TimeEntry]) -> f64 {
    let first = entries.iter().map(|e| e.start_time).min();
    let last = entries.iter().map(|e| e.start_time).max();
    let (Some(first), Some(last)) = (first, last) else {
        return 0.0;
    };
    let total_minutes = sum_minutes(entries);
    let days = ceil_days_between(first, last);
    round2(total_minutes as f64 / 60.0 / days as f64)
}

/// Hours per task, most hours first. The "No Task" bucket is always present.
pub fn group_by_task(entries: &[TimeEntry]) -> Vec<TaskTimeSummary> {
    let unlinked = TaskAcc {
        name: NO_TASK.to_string(),
        minutes: 0,
        entries: Vec::new(),
    };
    let groups = entries.iter().fold(Groups::seeded(unlinked), |mut groups, entry| {
        let acc = groups.slot(Bucket::task_of(entry), || TaskAcc {
            name: task_name(entry),
            minutes: 0,
            entries: Vec::new(),
        });
        acc.minutes = acc.minutes.saturating_add(entry.minutes());
        acc.entries.push(entry.clone());
        groups
    });

    groups
        .into_sorted(|acc| acc.minutes)
        .into_iter()
        .map(|(bucket, acc)| TaskTimeSummary {
            task_id: bucket.into_id(),
            task_name: acc.name,
            total_hours: minutes_to_hours(acc.minutes),
            entries: acc.entries,
        })
        .collect()
}

/// Hours per project with a nested per-task breakdown, both levels most
/// hours first. The "No Project" bucket is always present.
pub fn group_by_project(entries: &[TimeEntry]) -> Vec<ProjectTimeSummary> {
    let unlinked = ProjectAcc {
        name: NO_PROJECT.to_string(),
        minutes: 0,
        tasks: Groups::new(),
    };
    let groups = entries.iter().fold(Groups::seeded(unlinked), |mut groups, entry| {
        let project = groups.slot(Bucket::project_of(entry), || ProjectAcc {
            name: project_name(entry),
            minutes: 0,
            tasks: Groups::new(),
        });
        project.minutes = project.minutes.saturating_add(entry.minutes());
        let task = project.tasks.slot(Bucket::task_of(entry), || TaskHoursAcc {
            name: task_name(entry),
            minutes: 0,
        });
        task.minutes = task.minutes.saturating_add(entry.minutes());
        groups
    });

    groups
        .into_sorted(|acc| acc.minutes)
        .into_iter()
        .map(|(bucket, acc)| ProjectTimeSummary {
            project_id: bucket.into_id(),
            project_name: acc.name,
            total_hours: minutes_to_hours(acc.minutes),
            tasks: acc
                .tasks
                .into_sorted(|t| t.minutes)
                .into_iter()
                .map(|(bucket, t)| ProjectTaskHours {
                    task_id: bucket.into_id(),
                    task_name: t.name,
                    total_hours: minutes_to_hours(t.minutes),
                })
                .collect(),
        })
        .collect()
}
