use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use haex_common::{Error, ExtensionInfo, FailurePolicy, HostError, Result};
use haex_sdk::migrations::{FailedMigration, Migration, MigrationRegistration, MigrationResult};
use haex_sdk::{ExecuteResult, HostRequest, HostResponse, QueryResult, RequestGateway, SqlStatement};
use rusqlite::{Connection, Transaction, params_from_iter, types::Value};
use tracing::{debug, info, warn};

use crate::convert::{from_sqlite, sql_error, to_sqlite};
use crate::guard::NamespaceGuard;
use crate::ledger::{self, AppliedMigration};

/// Error codes the host puts in [`HostError::code`].
pub mod error_code {
    pub const NAMESPACE_VIOLATION: &str = "NAMESPACE_VIOLATION";
    pub const INVALID_MIGRATION: &str = "INVALID_MIGRATION";
    pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
    pub const SQL_ERROR: &str = "SQL_ERROR";
}

/// SQLite-backed host for one extension identity.
pub struct LoopbackHost {
    conn: Mutex<Connection>,
    identity: ExtensionInfo,
    guard: NamespaceGuard,
    policy: FailurePolicy,
}

impl LoopbackHost {
    pub fn open(db_path: &Path, identity: ExtensionInfo, policy: FailurePolicy) -> Result<Self> {
        info!("opening loopback host database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open host database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Self::with_connection(conn, identity, policy)
    }

    pub fn in_memory(identity: ExtensionInfo, policy: FailurePolicy) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Self::with_connection(conn, identity, policy)
    }

    fn with_connection(
        conn: Connection,
        identity: ExtensionInfo,
        policy: FailurePolicy,
    ) -> Result<Self> {
        ledger::ensure_schema(&conn)
            .map_err(|e| Error::Database(format!("failed to create migration ledger: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            guard: NamespaceGuard::new(identity.clone()),
            identity,
            policy,
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("host database lock poisoned".into()))
    }

    pub fn identity(&self) -> &ExtensionInfo {
        &self.identity
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Ledger entries for this host's extension, in application order.
    pub fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        let conn = self.connection()?;
        ledger::list(&conn, &self.identity.extension_id())
            .map_err(|e| Error::Database(format!("failed to read migration ledger: {e}")))
    }

    /// Answer one request the way the real host would.
    pub fn handle(&self, request: HostRequest) -> Result<HostResponse> {
        debug!(method = request.method(), "loopback host handling request");
        match request {
            HostRequest::Query(stmt) => self.query(&stmt).map(HostResponse::Rows),
            HostRequest::Execute(stmt) => self.execute(&stmt).map(HostResponse::Executed),
            HostRequest::Transaction(stmts) => {
                self.transaction(&stmts).map(HostResponse::Transaction)
            }
            HostRequest::RegisterMigrations(registration) => self
                .register_migrations(&registration)
                .map(HostResponse::Migrations),
            HostRequest::GetExtensionInfo => Ok(HostResponse::ExtensionInfo(self.identity.clone())),
        }
    }

    pub fn query(&self, stmt: &SqlStatement) -> Result<QueryResult> {
        self.guard.check(&stmt.sql)?;
        let conn = self.connection()?;
        let _confined = self.guard.confine(&conn);
        run_query(&conn, stmt).map_err(|e| Error::Host(sql_error(e)))
    }

    pub fn execute(&self, stmt: &SqlStatement) -> Result<ExecuteResult> {
        self.guard.check(&stmt.sql)?;
        let conn = self.connection()?;
        let _confined = self.guard.confine(&conn);
        run_execute(&conn, stmt).map_err(|e| Error::Host(sql_error(e)))
    }

    /// Run `stmts` atomically. Nothing is written unless every statement
    /// passes the namespace check and executes.
    pub fn transaction(&self, stmts: &[SqlStatement]) -> Result<Vec<ExecuteResult>> {
        for stmt in stmts {
            self.guard.check(&stmt.sql)?;
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(sql_error)?;
        let results = {
            let _confined = self.guard.confine(&tx);
            stmts
                .iter()
                .map(|stmt| run_execute(&tx, stmt))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_error)?
        };
        tx.commit().map_err(sql_error)?;
        Ok(results)
    }

    /// Apply the pending part of a migration set.
    ///
    /// Migrations already in the ledger are skipped by name. Pending ones are
    /// namespace-checked before anything runs, then applied sorted by name,
    /// each inside its own savepoint of one outer transaction. Migration SQL
    /// runs confined to the namespace; the ledger row is written after.
    pub fn register_migrations(
        &self,
        registration: &MigrationRegistration,
    ) -> Result<MigrationResult> {
        validate_registration(registration)?;

        let extension_id = self.identity.extension_id();
        let mut conn = self.connection()?;

        let mut result = MigrationResult::default();
        let mut pending: Vec<&Migration> = Vec::new();
        for migration in &registration.migrations {
            match ledger::applied_sql(&conn, &extension_id, &migration.name).map_err(sql_error)? {
                Some(recorded) => {
                    if recorded != migration.sql {
                        warn!(
                            "migration {} was already applied with different SQL; keeping the recorded version",
                            migration.name
                        );
                    }
                    result.already_applied_count += 1;
                    result.applied_migrations.push(migration.name.clone());
                }
                None => pending.push(migration),
            }
        }
        pending.sort_by(|a, b| a.name.cmp(&b.name));

        let mut runnable = Vec::with_capacity(pending.len());
        for migration in pending {
            match self.guard.check(&migration.sql) {
                Ok(()) => runnable.push(migration),
                Err(err) => match self.policy {
                    FailurePolicy::AbortAll => {
                        warn!("rejecting migration set: {} violates namespace", migration.name);
                        return Err(err.into());
                    }
                    FailurePolicy::SkipFailed => result.failed.push(FailedMigration {
                        name: migration.name.clone(),
                        reason: err.to_string(),
                    }),
                },
            }
        }

        let mut tx = conn.transaction().map_err(sql_error)?;
        for migration in runnable {
            match apply_one(
                &mut tx,
                &self.guard,
                &extension_id,
                &registration.extension_version,
                migration,
            ) {
                Ok(()) => {
                    debug!("applied migration {}", migration.name);
                    result.applied_count += 1;
                    result.applied_migrations.push(migration.name.clone());
                }
                Err(e) => {
                    let err = sql_error(e);
                    match self.policy {
                        FailurePolicy::AbortAll => {
                            warn!("migration {} failed, rolling back the set: {err}", migration.name);
                            let code = if err.code == error_code::NAMESPACE_VIOLATION {
                                error_code::NAMESPACE_VIOLATION
                            } else {
                                error_code::MIGRATION_FAILED
                            };
                            return Err(HostError::new(
                                code,
                                format!("migration {} failed: {}", migration.name, err.message),
                            )
                            .into());
                        }
                        FailurePolicy::SkipFailed => {
                            warn!("migration {} failed, continuing: {err}", migration.name);
                            result.failed.push(FailedMigration {
                                name: migration.name.clone(),
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
        tx.commit().map_err(sql_error)?;

        result.applied_migrations.sort();
        info!(
            extension = %self.identity,
            applied = result.applied_count,
            already_applied = result.already_applied_count,
            failed = result.failed.len(),
            "migration set processed"
        );
        Ok(result)
    }
}

#[async_trait]
impl RequestGateway for LoopbackHost {
    async fn request(&self, request: HostRequest) -> Result<HostResponse> {
        self.handle(request)
    }
}

fn validate_registration(registration: &MigrationRegistration) -> std::result::Result<(), HostError> {
    let invalid = |message: String| HostError::new(error_code::INVALID_MIGRATION, message);

    if registration.extension_version.trim().is_empty() {
        return Err(invalid("extension version cannot be empty".into()));
    }

    let mut seen = HashSet::new();
    for migration in &registration.migrations {
        if migration.name.trim().is_empty() {
            return Err(invalid("migration name cannot be empty".into()));
        }
        if !seen.insert(migration.name.as_str()) {
            return Err(invalid(format!(
                "migration {} appears more than once",
                migration.name
            )));
        }
    }
    Ok(())
}

fn apply_one(
    tx: &mut Transaction<'_>,
    guard: &NamespaceGuard,
    extension_id: &str,
    extension_version: &str,
    migration: &Migration,
) -> rusqlite::Result<()> {
    let sp = tx.savepoint()?;
    {
        let _confined = guard.confine(&sp);
        sp.execute_batch(&migration.sql)?;
    }
    ledger::record(
        &sp,
        extension_id,
        extension_version,
        &migration.name,
        &migration.sql,
    )?;
    sp.commit()
}

fn run_query(conn: &Connection, stmt: &SqlStatement) -> rusqlite::Result<QueryResult> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = prepared.query(params_from_iter(stmt.params.iter().map(to_sqlite)))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(from_sqlite(row.get::<_, Value>(index)?));
        }
        out.push(values);
    }

    Ok(QueryResult { columns, rows: out })
}

fn run_execute(conn: &Connection, stmt: &SqlStatement) -> rusqlite::Result<ExecuteResult> {
    let rows_affected = conn.execute(&stmt.sql, params_from_iter(stmt.params.iter().map(to_sqlite)))?;
    let last_insert_id = is_insert(&stmt.sql).then(|| conn.last_insert_rowid());
    Ok(ExecuteResult {
        rows_affected: rows_affected as u64,
        last_insert_id,
    })
}

fn is_insert(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE")
}
