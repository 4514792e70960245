pub mod dataset;

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::records::MAX_ENTRY_MINUTES;
use crate::storage::repository;
use crate::storage::Database;

pub use dataset::{Dataset, ProjectRecord, TaskRecord, TimeEntryRecord, UserRecord};

/// The parts of a dataset, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Section {
    Users,
    Projects,
    Tasks,
    TimeEntries,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Users => "users",
            Section::Projects => "projects",
            Section::Tasks => "tasks",
            Section::TimeEntries => "time_entries",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callbacks fired while a dataset is written.
pub trait ImportProgress {
    fn on_section_start(&self, _section: Section, _total: usize) {}
    fn on_section_complete(&self, _section: Section, _written: usize) {}
}

pub struct NoopProgress;

impl ImportProgress for NoopProgress {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    Running,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Running => "running",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }
}

/// Counts written by a successful import. Failures surface as `Err` and are
/// recorded on the `import_jobs` row instead.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub users: u64,
    pub projects: u64,
    pub tasks: u64,
    pub time_entries: u64,
}

impl ImportReport {
    pub fn total(&self) -> u64 {
        self.users + self.projects + self.tasks + self.time_entries
    }
}

enum SectionEvent {
    Started(Section, usize),
    Completed(Section, usize),
}

impl SectionEvent {
    fn notify(self, progress: &dyn ImportProgress) {
        match self {
            SectionEvent::Started(section, n) => progress.on_section_start(section, n),
            SectionEvent::Completed(section, n) => progress.on_section_complete(section, n),
        }
    }
}

/// Read a dataset from a JSON file.
pub async fn load_file(path: impl AsRef<Path>) -> Result<Dataset> {
    let raw = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write a dataset to the store in a single transaction.
///
/// Every reference (assignee, task project, entry user/task/project) must
/// resolve to a record in the dataset or already in the store; otherwise
/// nothing is written and `Error::Import` names the offending record. The
/// attempt is recorded in `import_jobs` either way.
pub async fn import_dataset(
    db: &Database,
    dataset: Dataset,
    source: &str,
    progress: &dyn ImportProgress,
) -> Result<ImportReport> {
    let job_id = db
        .writer()
        .call({
            let source = source.to_string();
            move |conn| {
                repository::insert_import_job(conn, &source, ImportStatus::Running.as_str())
            }
        })
        .await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let write = db
        .writer()
        .call(move |conn| Ok::<_, rusqlite::Error>(apply(conn, &dataset, &tx)));
    tokio::pin!(write);

    let outcome = loop {
        tokio::select! {
            Some(event) = rx.recv() => event.notify(progress),
            res = &mut write => break res,
        }
    };
    while let Ok(event) = rx.try_recv() {
        event.notify(progress);
    }

    let outcome = outcome.map_err(Error::from).and_then(|inner| inner);
    let (status, items, message) = match &outcome {
        Ok(report) => (ImportStatus::Completed, report.total(), None),
        Err(e) => (ImportStatus::Failed, 0, Some(e.to_string())),
    };
    db.writer()
        .call(move |conn| {
            repository::update_import_job(conn, job_id, status.as_str(), items, message.as_deref())
        })
        .await?;

    let mut report = outcome.inspect_err(|e| log::warn!("import of {source} failed: {e}"))?;
    report.source = source.to_string();
    log::info!(
        "imported {} users, {} projects, {} tasks, {} time entries from {source}",
        report.users,
        report.projects,
        report.tasks,
        report.time_entries
    );
    Ok(report)
}

fn apply(
    conn: &mut Connection,
    dataset: &Dataset,
    events: &mpsc::UnboundedSender<SectionEvent>,
) -> Result<ImportReport> {
    let tx = conn.transaction()?;
    // A closed receiver only means nobody is listening.
    let emit = |event| {
        let _ = events.send(event);
    };

    emit(SectionEvent::Started(Section::Users, dataset.users.len()));
    for user in &dataset.users {
        repository::upsert_user(&tx, user)?;
    }
    emit(SectionEvent::Completed(Section::Users, dataset.users.len()));

    emit(SectionEvent::Started(Section::Projects, dataset.projects.len()));
    for project in &dataset.projects {
        repository::upsert_project(&tx, project)?;
    }
    emit(SectionEvent::Completed(Section::Projects, dataset.projects.len()));

    emit(SectionEvent::Started(Section::Tasks, dataset.tasks.len()));
    for task in &dataset.tasks {
        let record = format!("task {}", task.id);
        if let Some(ref project_id) = task.project_id {
            require(repository::project_exists(&tx, project_id)?, &record, "project", project_id)?;
        }
        for user_id in &task.assignee_ids {
            require(repository::user_exists(&tx, user_id)?, &record, "assignee", user_id)?;
        }
        repository::upsert_task(&tx, task)?;
    }
    emit(SectionEvent::Completed(Section::Tasks, dataset.tasks.len()));

    emit(SectionEvent::Started(Section::TimeEntries, dataset.time_entries.len()));
    for entry in &dataset.time_entries {
        let record = format!("time entry {}", entry.id);
        require(repository::user_exists(&tx, &entry.user_id)?, &record, "user", &entry.user_id)?;
        if let Some(ref task_id) = entry.task_id {
            require(repository::task_exists(&tx, task_id)?, &record, "task", task_id)?;
        }
        if let Some(ref project_id) = entry.project_id {
            require(repository::project_exists(&tx, project_id)?, &record, "project", project_id)?;
        }
        if let Some(minutes) = entry.duration_minutes {
            if minutes < 0 {
                return Err(Error::Import {
                    record,
                    message: "duration_minutes must not be negative".into(),
                });
            }
            if minutes > MAX_ENTRY_MINUTES {
                return Err(Error::Import {
                    record,
                    message: format!("duration_minutes exceeds {MAX_ENTRY_MINUTES}"),
                });
            }
        }
        repository::upsert_time_entry(&tx, entry)?;
    }
    emit(SectionEvent::Completed(Section::TimeEntries, dataset.time_entries.len()));

    tx.commit()?;

    Ok(ImportReport {
        source: String::new(),
        users: dataset.users.len() as u64,
        projects: dataset.projects.len() as u64,
        tasks: dataset.tasks.len() as u64,
        time_entries: dataset.time_entries.len() as u64,
    })
}

fn require(found: bool, record: &str, kind: &str, id: &str) -> Result<()> {
    if found {
        Ok(())
    } else {
        Err(Error::Import {
            record: record.to_string(),
            message: format!("unknown {kind} {id}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    const FIXTURE: &str = r#"{
        "users": [
            {"id": "u1", "first_name": "Ada", "last_name": "Lovelace", "email": null, "avatar_url": null},
            {"id": "u2", "first_name": "Alan", "last_name": "Turing"}
        ],
        "projects": [{"id": "p1", "name": "Apollo"}],
        "tasks": [
            {"id": "t1", "title": "Wire burndown", "status": "done", "priority": "high",
             "due_date": "2025-01-10T00:00:00Z", "estimated_hours": 4.0, "actual_hours": null,
             "created_at": "2025-01-01T09:00:00Z", "updated_at": "2025-01-09T17:00:00Z",
             "assignee_ids": ["u1", "u2"], "project_id": "p1"}
        ],
        "time_entries": [
            {"id": "e1", "user_id": "u1", "task_id": "t1", "project_id": "p1",
             "start_time": "2025-01-02T09:00:00Z", "end_time": null,
             "duration_minutes": 90, "description": null},
            {"id": "e2", "user_id": "u2", "start_time": "2025-01-03T09:00:00Z"}
        ]
    }"#;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ImportProgress for Recorder {
        fn on_section_start(&self, section: Section, total: usize) {
            self.events.lock().unwrap().push(format!("start {section} {total}"));
        }
        fn on_section_complete(&self, section: Section, written: usize) {
            self.events.lock().unwrap().push(format!("done {section} {written}"));
        }
    }

    async fn count(db: &Database, table: &'static str) -> i64 {
        db.reader()
            .call(move |conn| {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_import_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let db = Database::open_memory().await.unwrap();
        let dataset = load_file(file.path()).await.unwrap();
        let recorder = Recorder::default();
        let report = import_dataset(&db, dataset, "fixture.json", &recorder).await.unwrap();

        assert_eq!(report.source, "fixture.json");
        assert_eq!((report.users, report.projects, report.tasks, report.time_entries), (2, 1, 1, 2));
        assert_eq!(count(&db, "bridge_task_assignees").await, 2);
        assert_eq!(count(&db, "fact_time_entries").await, 2);

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events.first().map(String::as_str), Some("start users 2"));
        assert_eq!(events.last().map(String::as_str), Some("done time_entries 2"));
        assert_eq!(events.len(), 8);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let db = Database::open_memory().await.unwrap();
        for _ in 0..2 {
            let dataset: Dataset = serde_json::from_str(FIXTURE).unwrap();
            import_dataset(&db, dataset, "fixture.json", &NoopProgress).await.unwrap();
        }
        assert_eq!(count(&db, "fact_tasks").await, 1);
        assert_eq!(count(&db, "fact_time_entries").await, 2);
        assert_eq!(count(&db, "import_jobs").await, 2);
    }

    #[tokio::test]
    async fn test_references_to_existing_records_resolve() {
        let db = Database::open_memory().await.unwrap();
        let dataset: Dataset = serde_json::from_str(FIXTURE).unwrap();
        import_dataset(&db, dataset, "base", &NoopProgress).await.unwrap();

        let follow_up: Dataset = serde_json::from_str(
            r#"{"time_entries": [{"id": "e9", "user_id": "u2", "task_id": "t1",
                "start_time": "2025-01-04T09:00:00Z", "duration_minutes": 15}]}"#,
        )
        .unwrap();
        let report = import_dataset(&db, follow_up, "follow-up", &NoopProgress).await.unwrap();
        assert_eq!(report.time_entries, 1);
        assert_eq!(count(&db, "fact_time_entries").await, 3);
    }

    #[tokio::test]
    async fn test_dangling_reference_writes_nothing() {
        let db = Database::open_memory().await.unwrap();
        let mut dataset: Dataset = serde_json::from_str(FIXTURE).unwrap();
        dataset.time_entries[1].task_id = Some("missing".to_string());

        let err = import_dataset(&db, dataset, "broken.json", &NoopProgress)
            .await
            .unwrap_err();
        match err {
            Error::Import { record, message } => {
                assert_eq!(record, "time entry e2");
                assert_eq!(message, "unknown task missing");
            }
            other => panic!("expected import error, got {other:?}"),
        }
        assert_eq!(count(&db, "dim_users").await, 0);
        assert_eq!(count(&db, "fact_tasks").await, 0);

        let status = db
            .reader()
            .call(|conn| repository::last_import_job(conn))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, "failed");
        assert!(status.error_message.unwrap().contains("unknown task missing"));
    }

    #[tokio::test]
    async fn test_unknown_assignee_is_rejected() {
        let db = Database::open_memory().await.unwrap();
        let mut dataset: Dataset = serde_json::from_str(FIXTURE).unwrap();
        dataset.tasks[0].assignee_ids.push("ghost".to_string());
        let err = import_dataset(&db, dataset, "x", &NoopProgress).await.unwrap_err();
        assert!(matches!(err, Error::Import { ref message, .. } if message == "unknown assignee ghost"));
    }

    #[tokio::test]
    async fn test_load_file_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"users\": [").unwrap();
        assert!(matches!(load_file(file.path()).await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_oversized_duration_is_rejected() {
        let db = Database::open_memory().await.unwrap();
        let mut dataset: Dataset = serde_json::from_str(FIXTURE).unwrap();
        dataset.time_entries[0].duration_minutes = Some(i64::MAX / 2 + 1);

        let err = import_dataset(&db, dataset, "huge.json", &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Import { ref record, ref message }
                if record == "time entry e1" && message.starts_with("duration_minutes exceeds")
        ));
        assert_eq!(count(&db, "fact_time_entries").await, 0);

        let mut dataset: Dataset = serde_json::from_str(FIXTURE).unwrap();
        dataset.time_entries[0].duration_minutes = Some(MAX_ENTRY_MINUTES);
        import_dataset(&db, dataset, "week.json", &NoopProgress).await.unwrap();
    }
}
