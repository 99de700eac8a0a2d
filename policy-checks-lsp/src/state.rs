//! Global key/value state that outlives a single editor session
//!
//! Values live in a [`DashMap`] and, for the persistent variant, are written
//! to a JSON file in the user data directory after every update
//! (`~/.local/share/policy-checks/global-state.json` on Linux).

use std::path::{Path, PathBuf};

use anyhow::Context;
use dashmap::DashMap;
use serde_json::Value;

use crate::logger::get_logger;

const STATE_FILE_NAME: &str = "global-state.json";

/// Key/value store shared by all commands
#[derive(Debug, Default)]
pub struct GlobalState {
    values: DashMap<String, Value>,
    path: Option<PathBuf>,
}

impl GlobalState {
    /// State that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load state from `path`, starting empty if the file is missing or unreadable
    pub fn load(path: PathBuf) -> Self {
        let values = DashMap::new();
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<serde_json::Map<String, Value>>(&content) {
                Ok(map) => {
                    for (key, value) in map {
                        values.insert(key, value);
                    }
                }
                Err(e) => tracing::warn!("Ignoring corrupt state file {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to read state file {}: {}", path.display(), e),
        }

        Self {
            values,
            path: Some(path),
        }
    }

    /// Load state from the default location, or fall back to memory only
    pub fn load_default() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load(path),
            Err(e) => {
                tracing::warn!("Global state will not be persisted: {}", e);
                Self::in_memory()
            }
        }
    }

    fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("policy-checks").join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.value().clone())
    }

    /// Boolean value for `key`; missing or non-boolean values read as `false`
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Update `key` in memory, then persist.
    ///
    /// The in-memory value is always updated. A failed write is logged at
    /// verbose level and otherwise ignored.
    pub async fn set(&self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
        if let Err(e) = self.persist().await {
            get_logger().verbose(&format!("Failed to update global state: {:#}", e));
        }
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot: serde_json::Map<String, Value> = self
            .values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let content = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_get_set() {
        let state = GlobalState::in_memory();
        assert!(state.get("missing").is_none());
        assert!(!state.get_bool("missing"));

        state.set("flag", json!(true)).await;
        assert!(state.get_bool("flag"));
        assert!(state.path().is_none());
    }

    #[tokio::test]
    async fn test_non_boolean_reads_as_false() {
        let state = GlobalState::in_memory();
        state.set("flag", json!("yes")).await;
        assert!(!state.get_bool("flag"));
    }

    #[tokio::test]
    async fn test_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(STATE_FILE_NAME);

        let state = GlobalState::load(path.clone());
        state.set("counter", json!(3)).await;
        state.set("flag", json!(true)).await;
        assert!(path.exists());

        let reloaded = GlobalState::load(path);
        assert_eq!(reloaded.get("counter"), Some(json!(3)));
        assert!(reloaded.get_bool("flag"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::write(&path, "not json").unwrap();

        let state = GlobalState::load(path);
        assert!(state.get("anything").is_none());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_value_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::create_dir(&path).unwrap();

        let state = GlobalState::load(path);
        state.set("flag", json!(true)).await;
        assert!(state.get_bool("flag"));
    }
}
