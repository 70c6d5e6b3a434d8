//! Migration registration.
//!
//! The host is the only owner of migration state. A registration call submits
//! the full migration set for an extension version; the host skips names it
//! has already applied, applies the rest sorted by name, and reports what
//! happened. Nothing is cached here between calls.

use std::path::Path;
use std::sync::Arc;

use haex_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::gateway::{RequestGateway, dispatch};
use crate::protocol::HostRequest;

/// A named unit of schema change. The SQL is opaque to the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRegistration {
    pub extension_version: String,
    pub migrations: Vec<Migration>,
}

impl MigrationRegistration {
    /// Check the caller-side preconditions of a registration.
    pub fn validate(&self) -> Result<()> {
        if self.extension_version.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "extension version cannot be empty".into(),
            ));
        }
        if let Some(index) = self
            .migrations
            .iter()
            .position(|m| m.name.trim().is_empty())
        {
            return Err(Error::InvalidArgument(format!(
                "migration at position {index} has an empty name"
            )));
        }
        Ok(())
    }
}

/// A migration the host tried and could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMigration {
    pub name: String,
    pub reason: String,
}

/// Host summary of one registration call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    /// Migrations applied by this call.
    pub applied_count: usize,
    /// Migrations skipped because an earlier call already applied them.
    pub already_applied_count: usize,
    /// Every submitted migration that is now applied, new or old.
    #[serde(default)]
    pub applied_migrations: Vec<String>,
    /// Migrations that failed when the host continues past failures.
    #[serde(default)]
    pub failed: Vec<FailedMigration>,
}

impl MigrationResult {
    /// True when the call changed nothing on the host.
    pub fn is_noop(&self) -> bool {
        self.applied_count == 0 && self.failed.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_applied(&self, name: &str) -> bool {
        self.applied_migrations.iter().any(|n| n == name)
    }
}

/// Submits migration sets to the host.
#[derive(Clone)]
pub struct MigrationRegistrar {
    gateway: Arc<dyn RequestGateway>,
}

impl MigrationRegistrar {
    pub fn new(gateway: Arc<dyn RequestGateway>) -> Self {
        Self { gateway }
    }

    /// Ask the host to apply `migrations` for `extension_version`.
    ///
    /// Submission order does not matter. Gateway and host failures are
    /// returned unchanged; retrying is up to the caller.
    pub async fn register(
        &self,
        extension_version: &str,
        migrations: Vec<Migration>,
    ) -> Result<MigrationResult> {
        let registration = MigrationRegistration {
            extension_version: extension_version.to_string(),
            migrations,
        };
        registration.validate()?;

        debug!(
            version = %registration.extension_version,
            count = registration.migrations.len(),
            "registering migrations"
        );

        let mut result = dispatch(
            self.gateway.as_ref(),
            HostRequest::RegisterMigrations(registration),
        )
        .await?
        .into_migrations()?;
        result.applied_migrations.sort();

        info!(
            applied = result.applied_count,
            already_applied = result.already_applied_count,
            failed = result.failed.len(),
            "migration registration finished"
        );
        for failure in &result.failed {
            warn!("migration {} failed on host: {}", failure.name, failure.reason);
        }

        Ok(result)
    }
}

/// Read every `*.sql` file in `dir` as a migration named after its file stem.
///
/// The returned list is sorted by name, which is the order the host applies
/// pending migrations in.
pub fn load_migrations_dir(dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("skipping migration with non UTF-8 name: {}", path.display());
            continue;
        };
        let sql = std::fs::read_to_string(&path)?;
        migrations.push(Migration::new(name, sql));
    }

    migrations.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(
        "loaded {} migration(s) from {}",
        migrations.len(),
        dir.display()
    );
    Ok(migrations)
}
