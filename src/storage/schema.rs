use rusqlite_migration::{Migrations, M};

/// Tables every fresh store must contain after migrating.
pub const TABLES: [&str; 7] = [
    "dim_users",
    "dim_projects",
    "fact_tasks",
    "bridge_task_assignees",
    "fact_time_entries",
    "app_config",
    "import_jobs",
];

/// Schema migrations, applied in order on open.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_to_empty_db() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        migrations().to_latest(&mut conn).unwrap();

        for table in TABLES {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "missing table {table}");
        }
    }
}
