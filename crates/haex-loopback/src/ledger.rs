//! Host-side record of applied migrations.
//!
//! One row per `(extension_id, migration_name)`. The ledger, not the
//! extension version, decides whether a migration runs again.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

pub const LEDGER_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS haex_extension_migrations (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    extension_id TEXT NOT NULL,
    extension_version TEXT NOT NULL,
    migration_name TEXT NOT NULL,
    sql TEXT NOT NULL,
    applied_at TEXT NOT NULL,
    UNIQUE(extension_id, migration_name)
);
";

/// A migration the ledger records as applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Position in global application order.
    pub seq: i64,
    pub name: String,
    /// Extension version that first applied this migration.
    pub extension_version: String,
    pub sql: String,
    pub applied_at: DateTime<Utc>,
}

pub(crate) fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(LEDGER_SCHEMA)
}

/// SQL recorded for `name`, if it has been applied.
pub(crate) fn applied_sql(
    conn: &Connection,
    extension_id: &str,
    name: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT sql FROM haex_extension_migrations
         WHERE extension_id = ?1 AND migration_name = ?2",
        params![extension_id, name],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn record(
    conn: &Connection,
    extension_id: &str,
    extension_version: &str,
    name: &str,
    sql: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO haex_extension_migrations
             (extension_id, extension_version, migration_name, sql, applied_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            extension_id,
            extension_version,
            name,
            sql,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Every applied migration for `extension_id`, oldest first.
pub(crate) fn list(conn: &Connection, extension_id: &str) -> rusqlite::Result<Vec<AppliedMigration>> {
    let mut stmt = conn.prepare(
        "SELECT seq, migration_name, extension_version, sql, applied_at
         FROM haex_extension_migrations
         WHERE extension_id = ?1
         ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![extension_id], |row| {
        let applied_at: String = row.get(4)?;
        Ok(AppliedMigration {
            seq: row.get(0)?,
            name: row.get(1)?,
            extension_version: row.get(2)?,
            sql: row.get(3)?,
            applied_at: parse_timestamp(&applied_at).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
        })
    })?;
    rows.collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)),
    }
}
