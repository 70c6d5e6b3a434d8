use std::path::{Path, PathBuf};

use haex_common::{Error, Result};
use tracing::info;

use crate::manifest::ManifestLoader;
use crate::model::HaexConfig;

pub const YAML_CONFIG_FILE: &str = "haex.config.yml";
pub const TOML_CONFIG_FILE: &str = "haex.config.toml";

pub struct ConfigLoader {
    project_dir: PathBuf,
}

impl ConfigLoader {
    pub fn with_dir(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Returns true if a config file (YAML or TOML) exists in the project.
    pub fn config_file_exists(&self) -> bool {
        self.project_dir.join(YAML_CONFIG_FILE).exists()
            || self.project_dir.join(TOML_CONFIG_FILE).exists()
    }

    /// Read the project config from the project directory root.
    ///
    /// `haex.config.yml` wins over `haex.config.toml`; with neither present the
    /// defaults apply. Paths inside the file stay relative to the project
    /// directory and are resolved with [`ConfigLoader::resolve`].
    pub fn load(&self) -> Result<HaexConfig> {
        let yaml_path = self.project_dir.join(YAML_CONFIG_FILE);
        if yaml_path.exists() {
            let contents = read_config(&yaml_path)?;
            return serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("invalid {}: {e}", yaml_path.display()))
            });
        }

        let toml_path = self.project_dir.join(TOML_CONFIG_FILE);
        if toml_path.exists() {
            let contents = read_config(&toml_path)?;
            return toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("invalid {}: {e}", toml_path.display()))
            });
        }

        info!(
            "no haex config in {}, using defaults",
            self.project_dir.display()
        );
        Ok(HaexConfig::default())
    }

    /// Resolve a configured path against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    /// Manifest loader wired to the configured manifest and package paths.
    pub fn manifest_loader(&self, config: &HaexConfig) -> ManifestLoader {
        ManifestLoader::new(&self.project_dir)
            .with_manifest_path(&config.manifest_path)
            .with_package_path(&config.package_path)
    }
}

fn read_config(path: &Path) -> Result<String> {
    info!("loading config from {}", path.display());
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::ConfigLoader;
    use haex_common::FailurePolicy;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[test]
    fn load_returns_default_when_no_config_exists() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let loader = ConfigLoader::with_dir(dir.path());
        assert!(!loader.config_file_exists());
        let config = loader.load().expect("load should succeed");

        assert_eq!(
            config.manifest_path,
            PathBuf::from("haextension").join("manifest.json")
        );
        assert_eq!(config.failure_policy, FailurePolicy::AbortAll);
        assert_eq!(config.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn load_prefers_yaml_over_toml_when_both_exist() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        fs::write(
            dir.path().join("haex.config.yml"),
            "migrations_dir: db/migrations\nfailure_policy: skip_failed\n",
        )
        .expect("failed to write yaml config");
        fs::write(
            dir.path().join("haex.config.toml"),
            "migrations_dir = \"other\"\n",
        )
        .expect("failed to write toml config");

        let loader = ConfigLoader::with_dir(dir.path());
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.failure_policy, FailurePolicy::SkipFailed);
    }

    #[test]
    fn load_reads_toml_when_yaml_missing() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        fs::write(
            dir.path().join("haex.config.toml"),
            "database_path = \"data/local.db\"\nlog_level = \"debug\"\n",
        )
        .expect("failed to write toml config");

        let loader = ConfigLoader::with_dir(dir.path());
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.database_path, PathBuf::from("data/local.db"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.package_path, PathBuf::from("package.json"));
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::write(dir.path().join("haex.config.yml"), "failure_policy: [nope")
            .expect("failed to write yaml config");

        let err = ConfigLoader::with_dir(dir.path())
            .load()
            .expect_err("malformed yaml must fail");
        assert!(matches!(err, haex_common::Error::Config(_)));
        assert!(err.to_string().contains("invalid"));
        assert!(err.to_string().contains("haex.config.yml"));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let loader = ConfigLoader::with_dir("/project");
        assert_eq!(
            loader.resolve(Path::new("/abs/dev.db")),
            PathBuf::from("/abs/dev.db")
        );
        assert_eq!(
            loader.resolve(Path::new("rel/dev.db")),
            PathBuf::from("/project/rel/dev.db")
        );
    }
}
