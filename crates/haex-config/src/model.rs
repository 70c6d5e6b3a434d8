use haex_common::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project-level settings for SDK tooling, read from `haex.config.{yml,toml}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaexConfig {
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    #[serde(default = "default_package_path")]
    pub package_path: PathBuf,

    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// SQLite file backing the local loopback host.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for HaexConfig {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            package_path: default_package_path(),
            migrations_dir: default_migrations_dir(),
            database_path: default_database_path(),
            failure_policy: FailurePolicy::default(),
            log_level: Some("info".to_string()),
        }
    }
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("haextension").join("manifest.json")
}

fn default_package_path() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("haextension").join("migrations")
}

fn default_database_path() -> PathBuf {
    PathBuf::from(".haex").join("dev.db")
}
