//! Input records consumed by the analytics engine.
//!
//! These are read-only views handed over by the data layer. The engine never
//! mutates them and keeps no reference to them after a report is built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status of a task. Both the board statuses and the legacy
/// `NOT_STARTED`/`COMPLETED` pair are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "backlog")]
    Backlog,
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "in_review")]
    InReview,
    #[serde(rename = "done")]
    Done,
    #[serde(rename = "blocked")]
    Blocked,
    #[serde(rename = "NOT_STARTED")]
    NotStarted,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Done,
        TaskStatus::Blocked,
        TaskStatus::NotStarted,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::InReview => "in_review",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
            TaskPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            "critical" => Some(TaskPriority::Critical),
            "urgent" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }
}

/// A user as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserRef {
    /// First and last name joined by a space.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

/// The slice of a task that a time entry carries along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub user: UserRef,
    pub task: Option<TaskRef>,
    pub project: Option<ProjectRef>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed minutes. The only source of truth for logged time: an entry
    /// without it contributes nothing, whatever its start and end say.
    pub duration_minutes: Option<i64>,
    pub description: Option<String>,
}

/// Longest duration a single entry may carry: one week.
pub const MAX_ENTRY_MINUTES: i64 = 7 * 24 * 60;

impl TimeEntry {
    pub fn minutes(&self) -> i64 {
        self.duration_minutes.unwrap_or(0)
    }
}

/// Total minutes over `entries`, saturating at `i64::MAX`.
pub fn sum_minutes<'a>(entries: impl IntoIterator<Item = &'a TimeEntry>) -> i64 {
    entries
        .into_iter()
        .fold(0i64, |acc, e| acc.saturating_add(e.minutes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub created_at: DateTime<Utc>,
    /// Last modification; stands in for the completion time of done tasks.
    pub updated_at: DateTime<Utc>,
    pub assignees: Vec<UserRef>,
    pub project: Option<ProjectRef>,
    /// Every time entry logged against this task, regardless of the report
    /// filter.
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
}

impl Task {
    pub fn logged_minutes(&self) -> i64 {
        sum_minutes(&self.time_entries)
    }

    pub fn to_task_ref(&self) -> TaskRef {
        TaskRef {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
        }
    }
}
