use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the parts of a namespaced table name.
pub const TABLE_NAMESPACE_SEPARATOR: &str = "__";

/// Identity of the calling extension as the host knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInfo {
    pub public_key: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ExtensionInfo {
    pub fn new(
        public_key: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            name: name.into(),
            version: version.into(),
            display_name: None,
        }
    }

    /// Stable key the host uses to own migration state for this extension.
    pub fn extension_id(&self) -> String {
        format!(
            "{}{}{}",
            self.public_key, TABLE_NAMESPACE_SEPARATOR, self.name
        )
    }

    /// Prefix every table owned by this extension must carry.
    pub fn table_prefix(&self) -> String {
        format!("{}{}", self.extension_id(), TABLE_NAMESPACE_SEPARATOR)
    }

    /// Fully namespaced name for one of this extension's tables.
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix(), table)
    }

    /// Whether `table` lives inside this extension's namespace.
    pub fn owns_table(&self, table: &str) -> bool {
        let prefix = self.table_prefix();
        table.len() > prefix.len() && table.starts_with(&prefix)
    }
}

/// How a host treats a migration set when one of its migrations fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Roll back the whole registration call and report it as failed.
    #[default]
    AbortAll,
    /// Record the failing migration and keep applying the remaining ones.
    SkipFailed,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AbortAll => "abort_all",
            Self::SkipFailed => "skip_failed",
        }
    }
}

impl fmt::Display for ExtensionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
