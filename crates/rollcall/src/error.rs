//! Error types for rollcall.
//!
//! This module defines all error types used throughout the rollcall crate.
//! Remote reads and writes are kept apart (`Fetch` vs `Submit`) because the
//! engines treat them differently: a failed submission is collected into a
//! save report, while a failed fetch is surfaced to the caller.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::record::ChildId;

/// The main error type for rollcall operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Remote Service Errors ===
    /// A remote read failed (transport or server error).
    #[error("failed to fetch {what}: {message}")]
    Fetch {
        /// What was being fetched, e.g. `attendance for 2024-03-01`.
        what: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A single create or update submission failed.
    #[error("failed to submit attendance for child {child_id} on {date}: {message}")]
    Submit {
        /// The child whose record was being submitted.
        child_id: ChildId,
        /// The attendance date of the record.
        date: NaiveDate,
        /// Description of what went wrong.
        message: String,
    },

    /// The remote service answered with a payload that does not decode.
    #[error("malformed payload from {endpoint}: {message}")]
    MalformedPayload {
        /// The endpoint that produced the payload.
        endpoint: String,
        /// The decoding failure.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // === Attendance Errors ===
    /// An edit referenced a child that is not in the open buffer.
    #[error("child {0} is not on the active roster for the open date")]
    UnknownChild(ChildId),

    /// An operation needed an open date but none has been loaded.
    #[error("no attendance date is open")]
    NoOpenDate,

    // === Report Errors ===
    /// Layout, rasterization or document encoding failed.
    #[error("report generation failed: {message}")]
    ReportGeneration {
        /// Description of what went wrong.
        message: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for rollcall operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a fetch error.
    #[must_use]
    pub fn fetch(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a submission error for one child's record.
    #[must_use]
    pub fn submit(child_id: ChildId, date: NaiveDate, message: impl Into<String>) -> Self {
        Self::Submit {
            child_id,
            date,
            message: message.into(),
        }
    }

    /// Create a malformed payload error.
    #[must_use]
    pub fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a report generation error.
    #[must_use]
    pub fn report(message: impl Into<String>) -> Self {
        Self::ReportGeneration {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a recoverable remote read failure.
    #[must_use]
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Check if this error is a per-record submission failure.
    #[must_use]
    pub fn is_submit_error(&self) -> bool {
        matches!(self, Self::Submit { .. })
    }

    /// Check if this error must reach the UI layer untouched.
    ///
    /// Malformed server payloads and internal bugs are never converted into
    /// a result flag.
    #[must_use]
    pub fn is_catastrophic(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. } | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fetch_error_display() {
        let err = Error::fetch("attendance for 2024-03-01", "connection refused");
        assert_eq!(
            err.to_string(),
            "failed to fetch attendance for 2024-03-01: connection refused"
        );
        assert!(err.is_fetch_error());
        assert!(!err.is_submit_error());
    }

    #[test]
    fn test_submit_error_display() {
        let err = Error::submit(7, date(2024, 3, 1), "HTTP 500");
        let msg = err.to_string();
        assert!(msg.contains("child 7"));
        assert!(msg.contains("2024-03-01"));
        assert!(msg.contains("HTTP 500"));
        assert!(err.is_submit_error());
    }

    #[test]
    fn test_malformed_payload_is_catastrophic() {
        let err = Error::malformed("GET attendance", "expected a list");
        assert!(err.is_catastrophic());
        assert!(!err.is_fetch_error());
        assert!(err.to_string().contains("GET attendance"));
    }

    #[test]
    fn test_fetch_error_is_not_catastrophic() {
        assert!(!Error::fetch("x", "y").is_catastrophic());
        assert!(Error::internal("bug").is_catastrophic());
    }

    #[test]
    fn test_report_error_display() {
        let err = Error::report("image too large");
        assert_eq!(err.to_string(), "report generation failed: image too large");
    }

    #[test]
    fn test_unknown_child_display() {
        assert!(Error::UnknownChild(42).to_string().contains("42"));
        assert_eq!(Error::NoOpenDate.to_string(), "no attendance date is open");
    }

    #[test]
    fn test_io_errors_are_not_remote_errors() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "roster.json").into();
        assert!(err.to_string().contains("roster.json"));
        assert!(!err.is_fetch_error());
        assert!(!err.is_catastrophic());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<Vec<i64>>("{\"childId\": 1}").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let sqlite_err = conn
            .execute("INSERT INTO attendance (child_id) VALUES (1)", [])
            .unwrap_err();
        let err: Error = sqlite_err.into();
        assert!(matches!(err, Error::DatabaseQuery(_)));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "base_url is required".to_string(),
        };
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
