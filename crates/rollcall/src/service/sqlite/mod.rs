//! Local `SQLite`-backed attendance service.
//!
//! Implements the same contract as the HTTP service against a database
//! file, so the whole attendance workflow runs offline. The schema enforces
//! one record per child and date.

mod schema;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::AttendanceService;
use crate::analytics::MonthlySummary;
use crate::error::{Error, Result};
use crate::record::{format_date, parse_date, AttendanceRecord, ChildId, RecordId};

const SELECT_COLUMNS: &str =
    "SELECT id, child_id, date, is_present, absence_reason, reported_by FROM attendance";

/// Attendance service persisting to a local `SQLite` database.
#[derive(Debug)]
pub struct SqliteAttendanceService {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection, serialized across callers.
    conn: Mutex<Connection>,
}

impl SqliteAttendanceService {
    /// Open or create an attendance database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and migrates the schema to the current version.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening attendance database at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::initialize_schema(&mut conn)?;

        info!("Attendance database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database, for tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        schema::initialize_schema(&mut conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count all stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        param: impl rusqlite::ToSql,
    ) -> rusqlite::Result<Vec<AttendanceRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map([param], Self::row_to_record)?
            .filter_map(|row| match row {
                Ok(Some(record)) => Some(Ok(record)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn get_by_id(conn: &Connection, id: RecordId) -> rusqlite::Result<Option<AttendanceRecord>> {
        Ok(conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                Self::row_to_record,
            )
            .optional()?
            .flatten())
    }

    /// Convert a database row to a record; rows with unreadable dates are skipped.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Option<AttendanceRecord>> {
        let id: i64 = row.get(0)?;
        let date_str: String = row.get(2)?;
        let Some(date) = parse_date(&date_str) else {
            warn!("Skipping attendance row {} with invalid date {}", id, date_str);
            return Ok(None);
        };

        Ok(Some(AttendanceRecord {
            record_id: Some(id),
            child_id: row.get(1)?,
            date,
            is_present: row.get(3)?,
            absence_reason: row.get(4)?,
            reported_by: row.get(5)?,
        }))
    }

    fn stored_reason(record: &AttendanceRecord) -> &str {
        if record.is_present {
            ""
        } else {
            record.absence_reason.as_str()
        }
    }
}

#[async_trait]
impl AttendanceService for SqliteAttendanceService {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let conn = self.conn.lock().await;
        Self::query_records(
            &conn,
            &format!("{SELECT_COLUMNS} WHERE date = ?1 ORDER BY id"),
            format_date(date),
        )
        .map_err(|e| Error::fetch(format!("attendance for {date}"), e.to_string()))
    }

    async fn fetch_by_child(&self, child_id: ChildId) -> Result<Vec<AttendanceRecord>> {
        let conn = self.conn.lock().await;
        Self::query_records(
            &conn,
            &format!("{SELECT_COLUMNS} WHERE child_id = ?1 ORDER BY date"),
            child_id,
        )
        .map_err(|e| Error::fetch(format!("attendance for child {child_id}"), e.to_string()))
    }

    async fn monthly_summary(&self, year: i32, month: u32) -> Result<MonthlySummary> {
        let what = format!("attendance summary for {year}-{month:02}");
        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return Err(Error::fetch(what, "invalid month"));
        };
        let next = first
            .checked_add_months(chrono::Months::new(1))
            .ok_or_else(|| Error::fetch(what.clone(), "month out of range"))?;

        let conn = self.conn.lock().await;
        let rows = (|| -> rusqlite::Result<Vec<(String, u32)>> {
            let mut stmt = conn.prepare(
                r"
                SELECT date, COUNT(*) FROM attendance
                WHERE is_present = 1 AND date >= ?1 AND date < ?2
                GROUP BY date ORDER BY date
                ",
            )?;
            let rows = stmt
                .query_map(params![format_date(first), format_date(next)], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })()
        .map_err(|e| Error::fetch(what, e.to_string()))?;

        let mut summary = MonthlySummary::new(first.year(), first.month());
        for (date, count) in rows {
            if let Some(date) = parse_date(&date) {
                summary.set(date, count);
            }
        }
        Ok(summary)
    }

    async fn create(&self, record: &AttendanceRecord) -> Result<AttendanceRecord> {
        let fail = |message: String| Error::submit(record.child_id, record.date, message);
        let conn = self.conn.lock().await;

        let inserted = conn.execute(
            r"
            INSERT INTO attendance (child_id, date, is_present, absence_reason, reported_by, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            ",
            params![
                record.child_id,
                format_date(record.date),
                record.is_present,
                Self::stored_reason(record),
                record.reported_by,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(fail(format!(
                    "a record already exists for child {} on {}",
                    record.child_id, record.date
                )));
            }
            Err(e) => return Err(fail(e.to_string())),
        }

        let id = conn.last_insert_rowid();
        debug!("Created attendance record {} for child {}", id, record.child_id);
        Self::get_by_id(&conn, id)
            .map_err(|e| fail(e.to_string()))?
            .ok_or_else(|| Error::internal(format!("record {id} vanished after insert")))
    }

    async fn update(
        &self,
        record_id: RecordId,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord> {
        let fail = |message: String| Error::submit(record.child_id, record.date, message);
        let conn = self.conn.lock().await;

        let affected = conn
            .execute(
                r"
                UPDATE attendance
                SET child_id = ?2, date = ?3, is_present = ?4, absence_reason = ?5,
                    reported_by = ?6, updated_at = datetime('now')
                WHERE id = ?1
                ",
                params![
                    record_id,
                    record.child_id,
                    format_date(record.date),
                    record.is_present,
                    Self::stored_reason(record),
                    record.reported_by,
                ],
            )
            .map_err(|e| fail(e.to_string()))?;

        if affected == 0 {
            return Err(fail(format!("record {record_id} not found")));
        }

        debug!("Updated attendance record {}", record_id);
        Self::get_by_id(&conn, record_id)
            .map_err(|e| fail(e.to_string()))?
            .ok_or_else(|| Error::internal(format!("record {record_id} vanished after update")))
    }
}
