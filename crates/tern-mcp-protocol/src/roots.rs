//! Root directory types (`roots/list`)

use serde::{Deserialize, Serialize};

/// A root directory the server may operate on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    /// file:// URI of the root
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build from a filesystem path
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(format!("file://{}", path.as_ref().display()))
    }
}

/// `roots/list` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    pub roots: Vec<Root>,
}

impl ListRootsResult {
    pub fn new(roots: Vec<Root>) -> Self {
        Self { roots }
    }
}
