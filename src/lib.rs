pub mod date_util;
pub mod error;
pub mod import;
pub mod metrics;
pub mod query;
pub mod records;
pub mod storage;

pub use error::{Error, Result};
pub use import::{Dataset, ImportProgress, ImportReport, ImportStatus, NoopProgress, Section};
pub use metrics::{
    ProductivityMetrics, ReportContext, TeamPerformanceMetrics, TimeTrackingMetrics,
};
pub use query::{AnalyticsFilter, Period};
pub use records::{ProjectRef, Task, TaskPriority, TaskRef, TaskStatus, TimeEntry, UserRef};
pub use storage::Database;

// Re-export repository types needed by the binary crate, but not the module itself
pub use storage::repository::{ImportJob, StoreStatus};

use std::path::Path;

use date_util::parse_offset;
use metrics::context::parse_status_list;
use storage::repository;

/// Config key holding the comma-separated statuses that count as done.
pub const CONFIG_DONE_STATUSES: &str = "done_statuses";
/// Config key holding the UTC offset that defines calendar days.
pub const CONFIG_UTC_OFFSET: &str = "utc_offset";

/// Main entry point: reports, imports and configuration over one store.
pub struct TeamPulse {
    db: Database,
}

impl TeamPulse {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// A context for "now" on the host clock, adjusted by the stored config.
    pub async fn report_context(&self) -> Result<ReportContext> {
        self.configure(ReportContext::local()).await
    }

    /// Apply the stored `utc_offset` and `done_statuses` to `base`. Invalid
    /// stored values are logged and skipped.
    pub async fn configure(&self, base: ReportContext) -> Result<ReportContext> {
        let mut ctx = base;
        if let Some(raw) = self.config_get(CONFIG_UTC_OFFSET).await? {
            match parse_offset(&raw) {
                Ok(offset) => ctx = ctx.with_offset(offset),
                Err(e) => log::warn!("ignoring {CONFIG_UTC_OFFSET}={raw:?}: {e}"),
            }
        }
        if let Some(raw) = self.config_get(CONFIG_DONE_STATUSES).await? {
            match parse_status_list(&raw) {
                Ok(statuses) => ctx = ctx.with_done_statuses(statuses),
                Err(e) => log::warn!("ignoring {CONFIG_DONE_STATUSES}={raw:?}: {e}"),
            }
        }
        Ok(ctx)
    }

    // ── Reports ─────────────────────────────────────────────────────

    pub async fn productivity(
        &self,
        filter: &AnalyticsFilter,
        ctx: &ReportContext,
    ) -> Result<ProductivityMetrics> {
        metrics::compute_productivity(&self.db, filter, ctx).await
    }

    pub async fn time_tracking(
        &self,
        filter: &AnalyticsFilter,
        ctx: &ReportContext,
    ) -> Result<TimeTrackingMetrics> {
        metrics::compute_time_tracking(&self.db, filter, ctx).await
    }

    pub async fn team_performance(
        &self,
        filter: &AnalyticsFilter,
        ctx: &ReportContext,
    ) -> Result<TeamPerformanceMetrics> {
        metrics::compute_team_performance(&self.db, filter, ctx).await
    }

    // ── Import ──────────────────────────────────────────────────────

    /// Load a JSON dataset from disk and write it to the store.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        progress: &dyn ImportProgress,
    ) -> Result<ImportReport> {
        let path = path.as_ref();
        let dataset = import::load_file(path).await?;
        self.import_dataset(dataset, &path.display().to_string(), progress)
            .await
    }

    pub async fn import_dataset(
        &self,
        dataset: Dataset,
        source: &str,
        progress: &dyn ImportProgress,
    ) -> Result<ImportReport> {
        import::import_dataset(&self.db, dataset, source, progress).await
    }

    // ── Status ──────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<StoreStatus> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::store_status(conn))
            .await?)
    }

    // ── Config ──────────────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await?)
    }

    /// Store a config value. Recognised keys are validated first; any other
    /// key is stored verbatim.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let value = match key {
            CONFIG_DONE_STATUSES => parse_status_list(value)?
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(","),
            CONFIG_UTC_OFFSET => {
                parse_offset(value)?;
                value.trim().to_string()
            }
            _ => value.to_string(),
        };
        self.db
            .writer()
            .call({
                let key = key.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await?;
        Ok(())
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    fn base() -> ReportContext {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        ReportContext::new(now, FixedOffset::east_opt(0).unwrap())
    }

    async fn pulse() -> TeamPulse {
        TeamPulse::new(Database::open_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_config_set_validates_known_keys() {
        let tp = pulse().await;
        assert!(matches!(
            tp.config_set(CONFIG_DONE_STATUSES, "shipped").await,
            Err(Error::Config(_))
        ));
        assert!(matches!(
            tp.config_set(CONFIG_UTC_OFFSET, "two hours").await,
            Err(Error::Config(_))
        ));

        tp.config_set(CONFIG_DONE_STATUSES, " done , in_review ").await.unwrap();
        assert_eq!(
            tp.config_get(CONFIG_DONE_STATUSES).await.unwrap().as_deref(),
            Some("done,in_review")
        );

        tp.config_set("team_name", "anything goes").await.unwrap();
        assert_eq!(tp.config_list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_configure_applies_stored_values() {
        let tp = pulse().await;
        tp.config_set(CONFIG_UTC_OFFSET, "+02:00").await.unwrap();
        tp.config_set(CONFIG_DONE_STATUSES, "done").await.unwrap();

        let ctx = tp.configure(base()).await.unwrap();
        assert_eq!(ctx.offset().local_minus_utc(), 7200);
        assert!(ctx.is_done(TaskStatus::Done));
        assert!(!ctx.is_done(TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_configure_skips_invalid_stored_values() {
        let tp = pulse().await;
        // Written behind config_set's back
        tp.db()
            .writer()
            .call(|conn| repository::set_config(conn, CONFIG_UTC_OFFSET, "bogus"))
            .await
            .unwrap();

        let ctx = tp.configure(base()).await.unwrap();
        assert_eq!(ctx.offset().local_minus_utc(), 0);
        assert!(ctx.is_done(TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_import_then_report() {
        let tp = pulse().await;
        let dataset: Dataset = serde_json::from_str(
            r#"{
                "users": [{"id": "u1", "first_name": "Ada", "last_name": "Lovelace"}],
                "projects": [{"id": "p1", "name": "Apollo"}],
                "tasks": [
                    {"id": "t1", "title": "A", "status": "done", "created_at": "2025-01-01T09:00:00Z",
                     "updated_at": "2025-01-02T09:00:00Z", "assignee_ids": ["u1"], "project_id": "p1"},
                    {"id": "t2", "title": "B", "status": "todo", "created_at": "2025-01-02T09:00:00Z",
                     "updated_at": "2025-01-02T09:00:00Z", "assignee_ids": ["u1"], "project_id": "p1"}
                ],
                "time_entries": [
                    {"id": "e1", "user_id": "u1", "task_id": "t1", "project_id": "p1",
                     "start_time": "2025-01-01T10:00:00Z", "duration_minutes": 60}
                ]
            }"#,
        )
        .unwrap();
        tp.import_dataset(dataset, "inline", &NoopProgress).await.unwrap();

        let status = tp.status().await.unwrap();
        assert_eq!(status.tasks, 2);
        assert_eq!(status.last_import.map(|j| j.source), Some("inline".to_string()));

        let ctx = tp.configure(base()).await.unwrap();
        let filter = AnalyticsFilter::new().project("p1").between(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        );
        let team = tp.team_performance(&filter, &ctx).await.unwrap();
        assert_eq!(team.completion_rates.percentage, 50);
        assert_eq!(team.team_velocity, 1.0);
        assert_eq!(team.individual_contributions[0].hours_logged, 1.0);

        let time = tp.time_tracking(&filter, &ctx).await.unwrap();
        assert_eq!(time.total_hours, 1.0);

        let prod = tp.productivity(&filter.clone().user("u1"), &ctx).await.unwrap();
        assert_eq!(prod.productivity_score, 50);
    }
}
