use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Import error for {record}: {message}")]
    Import { record: String, message: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid period format: {0}")]
    PeriodParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The error raised when a report that needs an explicit window is asked
    /// for without one.
    pub fn missing_range() -> Self {
        Error::InvalidRange("startDate and endDate must be defined".into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_range_message() {
        let err = Error::missing_range();
        assert!(matches!(err, Error::InvalidRange(_)));
        assert_eq!(
            err.to_string(),
            "Invalid date range: startDate and endDate must be defined"
        );
    }

    #[test]
    fn test_import_error_display() {
        let err = Error::Import {
            record: "time_entry:e1".into(),
            message: "unknown user u9".into(),
        };
        assert_eq!(err.to_string(), "Import error for time_entry:e1: unknown user u9");
    }
}
