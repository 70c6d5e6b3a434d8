//! Extension manifest model and layered resolution.
//!
//! A manifest is resolved from an ordered list of optional layers: the
//! extension's own `manifest.json` first, then the project's `package.json`.
//! Each field takes the first value present in that order.

use std::path::{Path, PathBuf};

use haex_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fully resolved extension metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub single_instance: bool,
    #[serde(default)]
    pub display_mode: DisplayMode,
}

/// Per-capability permission requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub database: Vec<PermissionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filesystem: Vec<PermissionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<PermissionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shell: Vec<PermissionEntry>,
}

impl Permissions {
    pub fn is_empty(&self) -> bool {
        self.database.is_empty()
            && self.filesystem.is_empty()
            && self.http.is_empty()
            && self.shell.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Auto,
    Window,
    Iframe,
}

/// One optional layer of manifest data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub entry: Option<String>,
    pub icon: Option<String>,
    pub public_key: Option<String>,
    pub signature: Option<String>,
    pub permissions: Option<Permissions>,
    pub homepage: Option<String>,
    pub description: Option<String>,
    pub single_instance: Option<bool>,
    pub display_mode: Option<DisplayMode>,
}

impl PartialManifest {
    /// Fill the fields missing from `self` with the values in `lower`.
    pub fn merge(self, lower: PartialManifest) -> PartialManifest {
        PartialManifest {
            name: first_text(self.name, lower.name),
            version: first_text(self.version, lower.version),
            author: first_text(self.author, lower.author),
            entry: first_text(self.entry, lower.entry),
            icon: first_text(self.icon, lower.icon),
            public_key: first_text(self.public_key, lower.public_key),
            signature: first_text(self.signature, lower.signature),
            permissions: self.permissions.or(lower.permissions),
            homepage: first_text(self.homepage, lower.homepage),
            description: first_text(self.description, lower.description),
            single_instance: self.single_instance.or(lower.single_instance),
            display_mode: self.display_mode.or(lower.display_mode),
        }
    }

    /// Merge layers in priority order and finish the result.
    ///
    /// Returns `None` when no layer supplies `name` or `version`.
    pub fn resolve(layers: impl IntoIterator<Item = PartialManifest>) -> Option<ExtensionManifest> {
        layers
            .into_iter()
            .fold(PartialManifest::default(), PartialManifest::merge)
            .finish()
    }

    fn finish(self) -> Option<ExtensionManifest> {
        Some(ExtensionManifest {
            name: first_text(self.name, None)?,
            version: first_text(self.version, None)?,
            author: self.author,
            entry: self.entry,
            icon: self.icon,
            public_key: self.public_key,
            signature: self.signature,
            permissions: self.permissions.unwrap_or_default(),
            homepage: self.homepage,
            description: self.description,
            single_instance: self.single_instance.unwrap_or(false),
            display_mode: self.display_mode.unwrap_or_default(),
        })
    }
}

fn first_text(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.filter(|v| !v.trim().is_empty()))
}

/// The subset of `package.json` that can stand in for manifest fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDescriptor {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub author: Option<PackageAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PackageAuthor {
    Name(String),
    Person { name: String },
}

impl From<PackageDescriptor> for PartialManifest {
    fn from(pkg: PackageDescriptor) -> Self {
        PartialManifest {
            name: pkg.name,
            version: pkg.version,
            description: pkg.description,
            homepage: pkg.homepage,
            author: pkg.author.map(|author| match author {
                PackageAuthor::Name(name) | PackageAuthor::Person { name } => name,
            }),
            ..PartialManifest::default()
        }
    }
}

/// Reads the manifest layers of an extension project.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    project_dir: PathBuf,
    manifest_path: PathBuf,
    package_path: PathBuf,
}

impl ManifestLoader {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            manifest_path: PathBuf::from("haextension").join("manifest.json"),
            package_path: PathBuf::from("package.json"),
        }
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_package_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_path = path.into();
        self
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.project_dir.join(&self.manifest_path)
    }

    pub fn package_file(&self) -> PathBuf {
        self.project_dir.join(&self.package_path)
    }

    /// Resolve the extension manifest.
    ///
    /// Missing or unreadable metadata is not an error: a warning is logged and
    /// `None` is returned so callers can continue without it.
    pub fn load(&self) -> Option<ExtensionManifest> {
        let manifest_file = self.manifest_file();
        let manifest_layer = match read_json::<PartialManifest>(&manifest_file) {
            Ok(Some(layer)) => layer,
            Ok(None) => {
                warn!(
                    "no extension manifest at {}, extension metadata unavailable",
                    manifest_file.display()
                );
                return None;
            }
            Err(e) => {
                warn!("{e}, extension metadata unavailable");
                return None;
            }
        };

        let package_file = self.package_file();
        let package_layer = match read_json::<PackageDescriptor>(&package_file) {
            Ok(Some(pkg)) => PartialManifest::from(pkg),
            Ok(None) => {
                debug!("no package descriptor at {}", package_file.display());
                PartialManifest::default()
            }
            Err(e) => {
                warn!("ignoring package descriptor: {e}");
                PartialManifest::default()
            }
        };

        let resolved = PartialManifest::resolve([manifest_layer, package_layer]);
        if resolved.is_none() {
            warn!(
                "manifest {} lacks name or version and {} does not provide them, extension metadata unavailable",
                manifest_file.display(),
                package_file.display()
            );
        }
        resolved
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Manifest(format!("failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| Error::Manifest(format!("failed to parse {}: {e}", path.display())))
}
