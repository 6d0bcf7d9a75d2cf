//! Task registry — the task-identity prefixes observed by the last
//! successful cycle.
//!
//! The graph schema advertises one graph per prefix. Prefixes are only
//! known after allocations have been collected, so the schema always
//! trails the data by one cycle.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Deduplicated, first-seen-ordered set of task-identity prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRegistry {
    prefixes: Vec<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with `prefixes`, dropping exact duplicates and
    /// keeping the first occurrence of each.
    pub fn rebuild<I, S>(&mut self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut next = Vec::new();
        for prefix in prefixes {
            let prefix = prefix.into();
            if seen.insert(prefix.clone()) {
                next.push(prefix);
            }
        }
        debug!(before = self.prefixes.len(), after = next.len(), "task registry rebuilt");
        self.prefixes = next;
    }

    /// Contents as of the last rebuild. Empty before the first one.
    pub fn current_prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Load a registry saved by [`TaskRegistry::save`]. A missing file
    /// yields an empty registry.
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no saved task registry");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| RegistryError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    /// Persist the registry as JSON.
    ///
    /// Writes to a sibling temp file and renames it into place so a reader
    /// never sees a half-written registry.
    pub fn save(&self, path: &Path) -> RegistryResult<()> {
        let io_err = |source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        };

        let json = serde_json::to_vec_pretty(self).map_err(|source| RegistryError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.current_prefixes().is_empty());
    }

    #[test]
    fn rebuild_dedups_in_first_seen_order() {
        let mut registry = TaskRegistry::new();
        registry.rebuild(["b_g_t", "a_g_t", "b_g_t", "c_g_t", "a_g_t"]);
        assert_eq!(registry.current_prefixes(), ["b_g_t", "a_g_t", "c_g_t"]);
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let mut registry = TaskRegistry::new();
        registry.rebuild(["old_g_t"]);
        registry.rebuild(["new_g_t"]);
        assert_eq!(registry.current_prefixes(), ["new_g_t"]);

        registry.rebuild(Vec::<String>::new());
        assert!(registry.is_empty());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let input = vec!["x_a_1", "y_b_2", "x_a_1", "z_c_3", "y_b_2"];

        let mut registry = TaskRegistry::new();
        registry.rebuild(input.clone());
        let first = registry.current_prefixes().to_vec();
        registry.rebuild(input);
        assert_eq!(registry.current_prefixes(), first.as_slice());
        assert_eq!(first, vec!["x_a_1", "y_b_2", "z_c_3"]);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut registry = TaskRegistry::new();
        registry.rebuild(["web_fe_nginx", "web_fe_envoy"]);
        registry.save(&path).unwrap();

        let loaded = TaskRegistry::load(&path).unwrap();
        assert_eq!(loaded, registry);
        assert!(!dir.path().join("registry.json.tmp").exists());
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = TaskRegistry::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn load_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = TaskRegistry::load(&path).unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }
}
