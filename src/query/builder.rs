use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{Connection, Row};

use crate::date_util::to_storage_ts;
use crate::error::{Error, Result};
use crate::query::filter::AnalyticsFilter;
use crate::records::{ProjectRef, Task, TaskRef, TimeEntry, UserRef};
use crate::storage::repository::{opt_ts_column, priority_column, status_column, ts_column};
use crate::storage::Database;

type SqlParams = Vec<Box<dyn rusqlite::types::ToSql>>;

/// Builder for task lookups. Every task comes back with its assignees, its
/// project and all of its time entries.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    user_id: Option<String>,
    project_id: Option<String>,
    created_from: Option<String>,
    created_until: Option<String>,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks matching a report filter: assigned to the user, in the project,
    /// created within the filter's days in `offset`.
    pub fn from_filter(filter: &AnalyticsFilter, offset: &FixedOffset) -> Self {
        let mut query = Self::new();
        if let Some(ref id) = filter.user_id {
            query = query.assignee(id);
        }
        if let Some(ref id) = filter.project_id {
            query = query.project(id);
        }
        if let Some((from, until)) = filter.instant_bounds(offset) {
            query = query.created_between(from, until);
        }
        query
    }

    pub fn assignee(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    /// Created at or after `from` and strictly before `until`.
    pub fn created_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.created_from = Some(to_storage_ts(from));
        self.created_until = Some(to_storage_ts(until));
        self
    }

    /// Execute the query and hydrate each task.
    pub async fn fetch(self, db: &Database) -> Result<Vec<Task>> {
        let query = self;
        db.reader()
            .call(move |conn| {
                let (sql, params) = query.build_sql();
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(param_refs.as_slice(), task_from_row)?;
                let mut tasks = rows.collect::<std::result::Result<Vec<Task>, _>>()?;

                for task in &mut tasks {
                    task.assignees = load_assignees(conn, &task.id)?;
                    task.time_entries = TimeEntryQuery::new().task(&task.id).run(conn)?;
                }
                Ok::<Vec<Task>, rusqlite::Error>(tasks)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn build_sql(&self) -> (String, SqlParams) {
        let mut params: SqlParams = Vec::new();
        let mut joins = Vec::new();
        let mut wheres = Vec::new();
        let mut param_idx = 1;

        let select = "SELECT t.task_id, t.title, t.status, t.priority, t.due_date,
                t.estimated_hours, t.actual_hours, t.created_at, t.updated_at,
                p.project_id, p.name
            FROM fact_tasks t
            LEFT JOIN dim_projects p ON p.project_id = t.project_id";

        // Assignee filter (join through bridge)
        if let Some(ref id) = self.user_id {
            joins.push(format!(
                "JOIN bridge_task_assignees bta ON bta.task_id = t.task_id AND bta.user_id = ?{param_idx}"
            ));
            params.push(Box::new(id.clone()));
            param_idx += 1;
        }

        if let Some(ref id) = self.project_id {
            wheres.push(format!("t.project_id = ?{param_idx}"));
            params.push(Box::new(id.clone()));
            param_idx += 1;
        }

        if let Some(ref ts) = self.created_from {
            wheres.push(format!("t.created_at >= ?{param_idx}"));
            params.push(Box::new(ts.clone()));
            param_idx += 1;
        }
        if let Some(ref ts) = self.created_until {
            wheres.push(format!("t.created_at < ?{param_idx}"));
            params.push(Box::new(ts.clone()));
        }

        (assemble(select, &joins, &wheres, "t.created_at, t.task_id"), params)
    }
}

/// Builder for time entry lookups, ordered by start time.
#[derive(Debug, Clone, Default)]
pub struct TimeEntryQuery {
    user_id: Option<String>,
    project_id: Option<String>,
    task_id: Option<String>,
    started_from: Option<String>,
    started_until: Option<String>,
}

impl TimeEntryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries matching a report filter: logged by the user, against the
    /// project, started within the filter's days in `offset`.
    pub fn from_filter(filter: &AnalyticsFilter, offset: &FixedOffset) -> Self {
        let mut query = Self::new();
        if let Some(ref id) = filter.user_id {
            query = query.user(id);
        }
        if let Some(ref id) = filter.project_id {
            query = query.project(id);
        }
        if let Some((from, until)) = filter.instant_bounds(offset) {
            query = query.started_between(from, until);
        }
        query
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    /// Started at or after `from` and strictly before `until`.
    pub fn started_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.started_from = Some(to_storage_ts(from));
        self.started_until = Some(to_storage_ts(until));
        self
    }

    pub async fn fetch(self, db: &Database) -> Result<Vec<TimeEntry>> {
        let query = self;
        db.reader()
            .call(move |conn| query.run(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn run(&self, conn: &Connection) -> std::result::Result<Vec<TimeEntry>, rusqlite::Error> {
        let (sql, params) = self.build_sql();
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), entry_from_row)?;
        rows.collect()
    }

    fn build_sql(&self) -> (String, SqlParams) {
        let mut params: SqlParams = Vec::new();
        let mut wheres = Vec::new();
        let mut param_idx = 1;

        let select = "SELECT e.entry_id, e.start_time, e.end_time, e.duration_minutes,
                e.description,
                u.user_id, u.first_name, u.last_name, u.avatar_url,
                t.task_id, t.title, t.status,
                p.project_id, p.name
            FROM fact_time_entries e
            JOIN dim_users u ON u.user_id = e.user_id
            LEFT JOIN fact_tasks t ON t.task_id = e.task_id
            LEFT JOIN dim_projects p ON p.project_id = e.project_id";

        if let Some(ref id) = self.user_id {
            wheres.push(format!("e.user_id = ?{param_idx}"));
            params.push(Box::new(id.clone()));
            param_idx += 1;
        }
        if let Some(ref id) = self.project_id {
            wheres.push(format!("e.project_id = ?{param_idx}"));
            params.push(Box::new(id.clone()));
            param_idx += 1;
        }
        if let Some(ref id) = self.task_id {
            wheres.push(format!("e.task_id = ?{param_idx}"));
            params.push(Box::new(id.clone()));
            param_idx += 1;
        }
        if let Some(ref ts) = self.started_from {
            wheres.push(format!("e.start_time >= ?{param_idx}"));
            params.push(Box::new(ts.clone()));
            param_idx += 1;
        }
        if let Some(ref ts) = self.started_until {
            wheres.push(format!("e.start_time < ?{param_idx}"));
            params.push(Box::new(ts.clone()));
        }

        (assemble(select, &[], &wheres, "e.start_time, e.entry_id"), params)
    }
}

fn assemble(select: &str, joins: &[String], wheres: &[String], order_by: &str) -> String {
    let mut sql = select.to_string();
    for join in joins {
        sql.push(' ');
        sql.push_str(join);
    }
    if !wheres.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&wheres.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {order_by}"));
    sql
}

fn task_from_row(row: &Row<'_>) -> std::result::Result<Task, rusqlite::Error> {
    let project = match row.get::<_, Option<String>>(9)? {
        Some(id) => Some(ProjectRef {
            id,
            name: row.get(10)?,
        }),
        None => None,
    };
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        status: status_column(row, 2)?,
        priority: priority_column(row, 3)?,
        due_date: opt_ts_column(row, 4)?,
        estimated_hours: row.get(5)?,
        actual_hours: row.get(6)?,
        created_at: ts_column(row, 7)?,
        updated_at: ts_column(row, 8)?,
        assignees: Vec::new(),
        project,
        time_entries: Vec::new(),
    })
}

fn entry_from_row(row: &Row<'_>) -> std::result::Result<TimeEntry, rusqlite::Error> {
    let task = match row.get::<_, Option<String>>(9)? {
        Some(id) => Some(TaskRef {
            id,
            title: row.get(10)?,
            status: status_column(row, 11)?,
        }),
        None => None,
    };
    let project = match row.get::<_, Option<String>>(12)? {
        Some(id) => Some(ProjectRef {
            id,
            name: row.get(13)?,
        }),
        None => None,
    };
    Ok(TimeEntry {
        id: row.get(0)?,
        start_time: ts_column(row, 1)?,
        end_time: opt_ts_column(row, 2)?,
        duration_minutes: row.get(3)?,
        description: row.get(4)?,
        user: UserRef {
            id: row.get(5)?,
            first_name: row.get(6)?,
            last_name: row.get(7)?,
            avatar_url: row.get(8)?,
        },
        task,
        project,
    })
}

fn load_assignees(conn: &Connection, task_id: &str) -> std::result::Result<Vec<UserRef>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT u.user_id, u.first_name, u.last_name, u.avatar_url
         FROM bridge_task_assignees bta
         JOIN dim_users u ON u.user_id = bta.user_id
         WHERE bta.task_id = ?1
         ORDER BY bta.position",
    )?;
    let rows = stmt.query_map([task_id], |row| {
        Ok(UserRef {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            avatar_url: row.get(3)?,
        })
    })?;
    rows.collect()
}
