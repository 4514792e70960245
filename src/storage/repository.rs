use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::date_util::{parse_timestamp, to_storage_ts};
use crate::error::Error;
use crate::import::dataset::{ProjectRecord, TaskRecord, TimeEntryRecord, UserRecord};
use crate::records::{TaskPriority, TaskStatus};

// ── Users ──────────────────────────────────────────────────────────

pub fn upsert_user(conn: &Connection, user: &UserRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO dim_users (user_id, first_name, last_name, email, avatar_url, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET
           first_name = excluded.first_name,
           last_name = excluded.last_name,
           email = COALESCE(excluded.email, dim_users.email),
           avatar_url = COALESCE(excluded.avatar_url, dim_users.avatar_url),
           cached_at = excluded.cached_at",
        params![
            user.id,
            user.first_name,
            user.last_name,
            user.email,
            user.avatar_url
        ],
    )?;
    Ok(())
}

pub fn user_exists(conn: &Connection, user_id: &str) -> Result<bool, rusqlite::Error> {
    exists(conn, "SELECT 1 FROM dim_users WHERE user_id = ?1", user_id)
}

// ── Projects ───────────────────────────────────────────────────────

pub fn upsert_project(conn: &Connection, project: &ProjectRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO dim_projects (project_id, name, cached_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(project_id) DO UPDATE SET
           name = excluded.name, cached_at = excluded.cached_at",
        params![project.id, project.name],
    )?;
    Ok(())
}

pub fn project_exists(conn: &Connection, project_id: &str) -> Result<bool, rusqlite::Error> {
    exists(conn, "SELECT 1 FROM dim_projects WHERE project_id = ?1", project_id)
}

// ── Tasks ──────────────────────────────────────────────────────────

/// Insert or replace a task together with its assignee list.
pub fn upsert_task(conn: &Connection, task: &TaskRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO fact_tasks (
            task_id, title, status, priority, due_date,
            estimated_hours, actual_hours, created_at, updated_at,
            project_id, cached_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))
        ON CONFLICT(task_id) DO UPDATE SET
            title=excluded.title, status=excluded.status, priority=excluded.priority,
            due_date=excluded.due_date, estimated_hours=excluded.estimated_hours,
            actual_hours=excluded.actual_hours, created_at=excluded.created_at,
            updated_at=excluded.updated_at, project_id=excluded.project_id,
            cached_at=excluded.cached_at",
        params![
            task.id,
            task.title,
            task.status.as_str(),
            task.priority.as_str(),
            task.due_date.map(to_storage_ts),
            task.estimated_hours,
            task.actual_hours,
            to_storage_ts(task.created_at),
            to_storage_ts(task.updated_at),
            task.project_id,
        ],
    )?;

    conn.execute(
        "DELETE FROM bridge_task_assignees WHERE task_id = ?1",
        params![task.id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO bridge_task_assignees (task_id, user_id, position)
         VALUES (?1, ?2, ?3)",
    )?;
    for (position, user_id) in task.assignee_ids.iter().enumerate() {
        stmt.execute(params![task.id, user_id, position as i64])?;
    }
    Ok(())
}

pub fn task_exists(conn: &Connection, task_id: &str) -> Result<bool, rusqlite::Error> {
    exists(conn, "SELECT 1 FROM fact_tasks WHERE task_id = ?1", task_id)
}

// ── Time Entries ───────────────────────────────────────────────────

pub fn upsert_time_entry(conn: &Connection, entry: &TimeEntryRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO fact_time_entries (
            entry_id, user_id, task_id, project_id, start_time, end_time,
            duration_minutes, description, cached_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
        ON CONFLICT(entry_id) DO UPDATE SET
            user_id=excluded.user_id, task_id=excluded.task_id,
            project_id=excluded.project_id, start_time=excluded.start_time,
            end_time=excluded.end_time, duration_minutes=excluded.duration_minutes,
            description=excluded.description, cached_at=excluded.cached_at",
        params![
            entry.id,
            entry.user_id,
            entry.task_id,
            entry.project_id,
            to_storage_ts(entry.start_time),
            entry.end_time.map(to_storage_ts),
            entry.duration_minutes,
            entry.description,
        ],
    )?;
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Import Jobs ────────────────────────────────────────────────────

pub fn insert_import_job(
    conn: &Connection,
    source: &str,
    status: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO import_jobs (source, status, started_at)
         VALUES (?1, ?2, datetime('now'))",
        params![source, status],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_import_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    imported_items: u64,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE import_jobs SET
            status = ?2, completed_at = datetime('now'),
            imported_items = ?3, error_message = ?4
         WHERE id = ?1",
        params![job_id, status, imported_items as i64, error_message],
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportJob {
    pub id: i64,
    pub source: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub imported_items: u64,
    pub error_message: Option<String>,
}

pub fn last_import_job(conn: &Connection) -> Result<Option<ImportJob>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, source, status, started_at, completed_at, imported_items, error_message
         FROM import_jobs ORDER BY id DESC LIMIT 1",
        [],
        |row| {
            Ok(ImportJob {
                id: row.get(0)?,
                source: row.get(1)?,
                status: row.get(2)?,
                started_at: row.get(3)?,
                completed_at: row.get(4)?,
                imported_items: row.get::<_, i64>(5)? as u64,
                error_message: row.get(6)?,
            })
        },
    )
    .optional()
}

// ── Status ─────────────────────────────────────────────────────────

/// Row counts per record table plus the most recent import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub users: u64,
    pub projects: u64,
    pub tasks: u64,
    pub time_entries: u64,
    pub last_import: Option<ImportJob>,
}

pub fn store_status(conn: &Connection) -> Result<StoreStatus, rusqlite::Error> {
    let count = |table: &str| -> Result<u64, rusqlite::Error> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as u64)
    };
    Ok(StoreStatus {
        users: count("dim_users")?,
        projects: count("dim_projects")?,
        tasks: count("fact_tasks")?,
        time_entries: count("fact_time_entries")?,
        last_import: last_import_job(conn)?,
    })
}

// ── Helpers ────────────────────────────────────────────────────────

fn exists(conn: &Connection, sql: &str, id: &str) -> Result<bool, rusqlite::Error> {
    Ok(conn
        .query_row(sql, params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

fn conversion_failure(idx: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Read a stored RFC 3339 timestamp column.
pub(crate) fn ts_column(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn opt_ts_column(
    row: &Row<'_>,
    idx: usize,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_timestamp(&s).map_err(|e| conversion_failure(idx, e)))
        .transpose()
}

pub(crate) fn status_column(row: &Row<'_>, idx: usize) -> Result<TaskStatus, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    TaskStatus::parse(&raw)
        .ok_or_else(|| conversion_failure(idx, Error::Other(format!("unknown task status: {raw}"))))
}

pub(crate) fn priority_column(row: &Row<'_>, idx: usize) -> Result<TaskPriority, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    TaskPriority::parse(&raw)
        .ok_or_else(|| conversion_failure(idx, Error::Other(format!("unknown task priority: {raw}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::TimeZone;

    fn ada() -> UserRecord {
        UserRecord {
            id: "u1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            avatar_url: None,
        }
    }

    fn task(id: &str, assignees: &[&str]) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: format!("Task {id}"),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            due_date: None,
            estimated_hours: Some(3.0),
            actual_hours: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 3, 9, 0, 0).unwrap(),
            assignee_ids: assignees.iter().map(|s| s.to_string()).collect(),
            project_id: None,
        }
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "done_statuses", "done")?;
                let val = get_config(conn, "done_statuses")?;
                assert_eq!(val, Some("done".to_string()));

                let missing = get_config(conn, "nonexistent")?;
                assert_eq!(missing, None);

                set_config(conn, "utc_offset", "+02:00")?;
                let all = list_config(conn)?;
                assert_eq!(all.len(), 2);
                assert_eq!(all[0].0, "done_statuses");
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_user_upsert_keeps_known_email() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                upsert_user(conn, &ada())?;
                let mut renamed = ada();
                renamed.last_name = "King".to_string();
                renamed.email = None;
                upsert_user(conn, &renamed)?;

                let (last, email): (String, Option<String>) = conn.query_row(
                    "SELECT last_name, email FROM dim_users WHERE user_id = 'u1'",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                assert_eq!(last, "King");
                assert_eq!(email.as_deref(), Some("ada@example.com"));
                assert!(user_exists(conn, "u1")?);
                assert!(!user_exists(conn, "u2")?);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_task_upsert_replaces_assignees() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                upsert_user(conn, &ada())?;
                let mut alan = ada();
                alan.id = "u2".to_string();
                upsert_user(conn, &alan)?;

                upsert_task(conn, &task("t1", &["u1", "u2"]))?;
                upsert_task(conn, &task("t1", &["u2"]))?;

                let assignees: Vec<String> = {
                    let mut stmt = conn.prepare(
                        "SELECT user_id FROM bridge_task_assignees WHERE task_id = 't1' ORDER BY position",
                    )?;
                    let rows = stmt.query_map([], |row| row.get(0))?;
                    rows.collect::<Result<_, _>>()?
                };
                assert_eq!(assignees, vec!["u2".to_string()]);

                let created: String = conn.query_row(
                    "SELECT created_at FROM fact_tasks WHERE task_id = 't1'",
                    [],
                    |row| row.get(0),
                )?;
                assert_eq!(created, "2025-01-02T09:00:00.000Z");
                assert!(task_exists(conn, "t1")?);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_import_job_and_status() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let empty = store_status(conn)?;
                assert_eq!(empty.tasks, 0);
                assert_eq!(empty.last_import, None);

                let job_id = insert_import_job(conn, "fixtures.json", "running")?;
                assert!(job_id > 0);
                upsert_user(conn, &ada())?;
                upsert_project(
                    conn,
                    &ProjectRecord {
                        id: "p1".to_string(),
                        name: "Apollo".to_string(),
                    },
                )?;
                update_import_job(conn, job_id, "completed", 2, None)?;

                let status = store_status(conn)?;
                assert_eq!(status.users, 1);
                assert_eq!(status.projects, 1);
                let job = status.last_import.unwrap();
                assert_eq!(job.status, "completed");
                assert_eq!(job.imported_items, 2);
                assert!(project_exists(conn, "p1")?);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bad_stored_timestamp_is_a_conversion_error() {
        let db = Database::open_memory().await.unwrap();

        let result = db
            .reader()
            .call(|conn| {
                conn.query_row("SELECT 'yesterday'", [], |row| ts_column(row, 0))
            })
            .await;
        assert!(result.is_err());
    }
}
