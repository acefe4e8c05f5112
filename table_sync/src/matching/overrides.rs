//! Manual client -> server table mappings
//!
//! The map is loaded and saved as a whole. The matcher receives its own copy,
//! so edits only take effect on the next matching run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Client table name -> server table name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideMap {
    entries: IndexMap<String, String>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON or YAML file; a missing file is an empty map
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No override file, starting empty");
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let map = if is_yaml(path) {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(map)
    }

    /// Save the whole map, replacing the file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        fs::write(path, content)?;
        Ok(())
    }

    /// Add or replace a mapping
    pub fn insert(&mut self, client: impl Into<String>, server: impl Into<String>) -> Result<()> {
        let client = client.into();
        let server = server.into();
        if client.is_empty() || server.is_empty() {
            return Err(Error::OverrideError("table names must not be empty".into()));
        }
        self.entries.insert(client, server);
        Ok(())
    }

    pub fn remove(&mut self, client: &str) -> Option<String> {
        self.entries.shift_remove(client)
    }

    pub fn get(&self, client: &str) -> Option<&str> {
        self.entries.get(client).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
