//! `SQLite` schema and versioned migrations for the local attendance store.
//!
//! Each migration is a list of statements applied inside one transaction;
//! the applied version is tracked in the `metadata` table.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// SQL statement to create the metadata table for storing key-value pairs.
const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Version 1: attendance records, one row per child and date.
const V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS attendance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        child_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        is_present INTEGER NOT NULL,
        absence_reason TEXT NOT NULL DEFAULT '',
        reported_by INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE (child_id, date)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
    "CREATE INDEX IF NOT EXISTS idx_attendance_child ON attendance(child_id)",
];

/// All migrations in order; index + 1 is the version they produce.
const MIGRATIONS: &[&[&str]] = &[V1];

/// The current schema version.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the database schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a migration fails or the stored version is unreadable.
pub fn initialize_schema(conn: &mut Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for (index, statements) in MIGRATIONS.iter().enumerate().skip(version_index(version)) {
        let target = i32::try_from(index + 1)
            .map_err(|_| Error::internal("migration index out of range"))?;
        let tx = conn.transaction()?;
        for statement in *statements {
            tx.execute(statement, [])
                .map_err(|e| Error::DatabaseMigration {
                    message: format!("migration to version {target} failed: {e}"),
                })?;
        }
        set_schema_version(&tx, target)?;
        tx.commit()?;
        debug!("Applied schema migration {}", target);
    }

    if version < CURRENT_VERSION {
        info!(
            "Database schema migrated from version {} to {}",
            version, CURRENT_VERSION
        );
    }
    Ok(())
}

fn version_index(version: i32) -> usize {
    usize::try_from(version).unwrap_or(0)
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
pub(crate) fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}
