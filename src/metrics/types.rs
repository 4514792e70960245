use chrono::NaiveDate;
use serde::Serialize;

use crate::records::TimeEntry;

/// Counts of high, medium and low priority tasks. Critical and urgent tasks
/// are not tallied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityDistribution {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

/// Tasks created and completed on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub completed: u64,
    pub created: u64,
}

/// Figures derived from a task list alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetrics {
    pub completed_tasks: u64,
    pub total_tasks: u64,
    /// Completed over total, as an integer percentage.
    pub productivity_score: u32,
    pub on_time_completion_rate: u32,
    pub overdue_tasks: u64,
    pub time_estimate_accuracy: u32,
    pub priority_distribution: PriorityDistribution,
}

/// Productivity report for a user and/or project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityMetrics {
    pub completed_tasks: u64,
    pub total_tasks: u64,
    pub productivity_score: u32,
    pub on_time_completion_rate: u32,
    pub overdue_tasks: u64,
    pub time_estimate_accuracy: u32,
    pub priority_distribution: PriorityDistribution,
    /// Always the 14 days ending today, oldest first.
    pub daily_trends: Vec<DailyTrend>,
}

/// Hours logged against one task (or against no task).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimeSummary {
    pub task_id: Option<String>,
    pub task_name: String,
    pub total_hours: f64,
    pub entries: Vec<TimeEntry>,
}

/// Hours logged against one task inside a project bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTaskHours {
    pub task_id: Option<String>,
    pub task_name: String,
    pub total_hours: f64,
}

/// Hours logged against one project (or against no project).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTimeSummary {
    pub project_id: Option<String>,
    pub project_name: String,
    pub total_hours: f64,
    pub tasks: Vec<ProjectTaskHours>,
}

/// Time-tracking report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeTrackingMetrics {
    pub total_hours: f64,
    pub daily_average: f64,
    pub by_task: Vec<TaskTimeSummary>,
    pub by_project: Vec<ProjectTimeSummary>,
}

/// One day of a burndown chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub ideal: u64,
    pub actual: u64,
    pub tasks_remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberContribution {
    pub user_id: String,
    pub user_name: String,
    pub avatar_url: Option<String>,
    pub hours_logged: f64,
    pub tasks_completed: u64,
    pub contribution_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRates {
    pub total: u64,
    pub completed: u64,
    pub percentage: u32,
}

/// Team performance report over an explicit date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPerformanceMetrics {
    pub team_velocity: f64,
    pub burndown: Vec<BurndownPoint>,
    pub individual_contributions: Vec<TeamMemberContribution>,
    pub completion_rates: CompletionRates,
}
