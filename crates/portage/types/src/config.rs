//! Configuration files participating in a workflow

use serde::{Deserialize, Serialize};

/// A configuration file, identified relative to its root
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Full path as loaded
    pub path: String,
    /// Root the identifier is computed against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl ConfigFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            root: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Path relative to the root, e.g. `admin/foo/bar` under root `admin`
    /// is `foo/bar`. Stable across machines, so it feeds into identities.
    pub fn identifier(&self) -> &str {
        let Some(root) = self.root.as_deref() else {
            return &self.path;
        };
        let root = root.trim_end_matches('/');
        match self.path.strip_prefix(root) {
            Some(rest) if rest.starts_with('/') => &rest[1..],
            _ => &self.path,
        }
    }
}

impl std::fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
