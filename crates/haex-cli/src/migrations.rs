use std::path::Path;

use anyhow::{Context, Result};
use haex_common::{ExtensionInfo, FailurePolicy};
use haex_config::ExtensionManifest;
use haex_loopback::LoopbackHost;
use haex_sdk::{HaexClient, Migration, MigrationResult, load_migrations_dir};
use tracing::info;

/// Migrations in `dir`, in the order the host will apply them.
pub fn plan(dir: &Path) -> Result<Vec<Migration>> {
    load_migrations_dir(dir)
        .with_context(|| format!("failed to read migrations from {}", dir.display()))
}

pub fn print_plan(dir: &Path, migrations: &[Migration]) {
    println!("Migrations in {}", dir.display());
    if migrations.is_empty() {
        println!("  (none)");
    }
    for (i, m) in migrations.iter().enumerate() {
        println!("  {:>3}. {} ({} bytes)", i + 1, m.name, m.sql.len());
    }
}

pub fn identity_from_manifest(manifest: &ExtensionManifest) -> Result<ExtensionInfo> {
    let public_key = manifest
        .public_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .context("manifest has no publicKey; cannot derive the table namespace")?;
    Ok(ExtensionInfo::new(
        public_key,
        &manifest.name,
        &manifest.version,
    ))
}

/// Register every migration in `dir` against a loopback host at `db_path`.
pub async fn apply(
    dir: &Path,
    db_path: &Path,
    identity: ExtensionInfo,
    policy: FailurePolicy,
) -> Result<MigrationResult> {
    let migrations = plan(dir)?;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    info!(
        "applying {} migration(s) for {identity} with policy {}",
        migrations.len(),
        policy.as_str()
    );
    let version = identity.version.clone();
    let host = LoopbackHost::open(db_path, identity, policy)?;
    let result = HaexClient::from_gateway(host)
        .register_migrations(&version, migrations)
        .await?;
    Ok(result)
}

pub fn print_result(result: &MigrationResult) {
    println!("Migration Report");
    println!("────────────────");
    println!("  Applied now:     {}", result.applied_count);
    println!("  Already applied: {}", result.already_applied_count);
    for name in &result.applied_migrations {
        println!("    - {name}");
    }
    if !result.failed.is_empty() {
        println!("  Failed ({}):", result.failed.len());
        for f in &result.failed {
            println!("    - {}: {}", f.name, f.reason);
        }
    }
}
