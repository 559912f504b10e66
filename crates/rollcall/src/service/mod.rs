//! Remote attendance data service.
//!
//! The engines only ever talk to the source of truth through
//! [`AttendanceService`]. Two backends are provided:
//!
//! - [`HttpAttendanceService`]: the HTTP-shaped remote service
//!   (`GET attendance?date=`, `GET attendance?childId=`,
//!   `GET attendance/summary`, `POST attendance`, `PUT attendance/{id}`).
//! - [`SqliteAttendanceService`]: a local `SQLite` store with the same
//!   contract, used for offline operation and tests.
//!
//! Reads fail with [`Error::Fetch`](crate::Error::Fetch), writes with
//! [`Error::Submit`](crate::Error::Submit), and undecodable payloads with
//! [`Error::MalformedPayload`](crate::Error::MalformedPayload).

mod http;
mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::analytics::MonthlySummary;
use crate::error::Result;
use crate::record::{AttendanceRecord, ChildId, RecordId};

pub use http::HttpAttendanceService;
pub use sqlite::SqliteAttendanceService;

/// The remote source of truth for attendance records.
#[async_trait]
pub trait AttendanceService: Send + Sync {
    /// Name of this backend (for logging).
    fn name(&self) -> &'static str;

    /// All records on one date, for every child.
    ///
    /// # Errors
    ///
    /// Returns a fetch error on transport or server failure.
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>>;

    /// All records of one child across every date.
    ///
    /// # Errors
    ///
    /// Returns a fetch error on transport or server failure.
    async fn fetch_by_child(&self, child_id: ChildId) -> Result<Vec<AttendanceRecord>>;

    /// Present counts per day for one month.
    ///
    /// # Errors
    ///
    /// Returns a fetch error on transport or server failure.
    async fn monthly_summary(&self, year: i32, month: u32) -> Result<MonthlySummary>;

    /// Persist a new record and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns a submit error if the record could not be created.
    async fn create(&self, record: &AttendanceRecord) -> Result<AttendanceRecord>;

    /// Overwrite an existing record and return the stored version.
    ///
    /// # Errors
    ///
    /// Returns a submit error if the record could not be updated.
    async fn update(
        &self,
        record_id: RecordId,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord>;
}
