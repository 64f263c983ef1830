//! Path-addressed configuration store
//!
//! A `ConfigStore` holds a tree of values addressed by dotted paths
//! (`"counters.claimedHive"`). It backs both user settings and the persisted
//! per-account state. Leaves are kept in a flat concurrent map so that reads
//! from accessors never contend with the session writing its state.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Path-addressed value store
#[derive(Debug, Default)]
pub struct ConfigStore {
    /// Leaf values keyed by full dotted path
    leaves: DashMap<String, Value>,
    /// File the store was loaded from (and is saved to)
    file: Option<PathBuf>,
}

impl ConfigStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory store from a JSON tree
    pub fn from_value(value: Value) -> Self {
        let store = Self::new();
        store.insert_tree("", value);
        store
    }

    /// Load a store from a YAML file
    ///
    /// A missing file yields an empty store bound to that path, so the first
    /// `save()` creates it.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let mut store = if path.exists() {
            let yaml = load_yaml(path)?;
            let json = serde_json::to_value(yaml).map_err(|e| ConfigError::InvalidValue {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            Self::from_value(json)
        } else {
            debug!("Store file {:?} missing, starting empty", path);
            Self::new()
        };
        store.file = Some(path.to_path_buf());
        Ok(store)
    }

    /// Get a typed value at a path
    ///
    /// A path naming an inner node yields the assembled subtree.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<T> {
        let value = self
            .get_value(path)
            .ok_or_else(|| ConfigError::PathNotFound {
                path: path.to_string(),
            })?;
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Get the raw value at a path
    pub fn get_value(&self, path: &str) -> Option<Value> {
        if let Some(leaf) = self.leaves.get(path) {
            return Some(leaf.clone());
        }

        let prefix = format!("{path}.");
        let mut subtree = Map::new();
        for entry in self.leaves.iter() {
            if let Some(rest) = entry.key().strip_prefix(&prefix) {
                insert_nested(&mut subtree, rest, entry.value().clone());
            }
        }
        if subtree.is_empty() {
            None
        } else {
            Some(Value::Object(subtree))
        }
    }

    /// Check whether a path holds a value
    pub fn contains(&self, path: &str) -> bool {
        self.get_value(path).is_some()
    }

    /// Set the value at a path, replacing anything previously under it
    pub fn set(&self, path: &str, value: impl Serialize) -> ConfigResult<()> {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::InvalidValue {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        trace!(path, ?value, "Setting store value");

        self.remove(path);
        // A leaf stored at an ancestor would shadow the new subtree
        for (at, _) in path.match_indices('.') {
            self.leaves.remove(&path[..at]);
        }
        self.insert_tree(path, value);
        Ok(())
    }

    /// Remove the value (or subtree) at a path
    pub fn remove(&self, path: &str) {
        let prefix = format!("{path}.");
        self.leaves
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    /// Assemble the whole store as a JSON tree
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        for entry in self.leaves.iter() {
            insert_nested(&mut root, entry.key(), entry.value().clone());
        }
        Value::Object(root)
    }

    /// Write the store back to its file as YAML
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.file.as_ref().ok_or(ConfigError::NoBackingFile)?;
        let yaml = serde_yaml::to_string(&self.to_value())?;
        fs::write(path, yaml).map_err(|e| ConfigError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        debug!("Saved store to {:?}", path);
        Ok(())
    }

    /// File backing this store, if any
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    fn insert_tree(&self, path: &str, value: Value) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key
                    } else {
                        format!("{path}.{key}")
                    };
                    self.insert_tree(&child_path, child);
                }
            }
            leaf => {
                if !path.is_empty() {
                    self.leaves.insert(path.to_string(), leaf);
                }
            }
        }
    }
}

fn insert_nested(root: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            root.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_nested(map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_get_leaf_and_subtree() {
        let store = ConfigStore::from_value(json!({
            "window": {"fallbackToPublicServer": true, "retries": 3},
            "vicHop": {"enabled": false}
        }));

        assert!(store.get::<bool>("window.fallbackToPublicServer").unwrap());
        assert_eq!(store.get::<i64>("window.retries").unwrap(), 3);
        assert_eq!(
            store.get_value("window").unwrap(),
            json!({"fallbackToPublicServer": true, "retries": 3})
        );
    }

    #[test]
    fn test_missing_and_mistyped() {
        let store = ConfigStore::from_value(json!({"a": {"b": "text"}}));

        assert!(matches!(
            store.get::<bool>("a.c"),
            Err(ConfigError::PathNotFound { .. })
        ));
        assert!(matches!(
            store.get::<bool>("a.b"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_set_replaces_subtree() {
        let store = ConfigStore::from_value(json!({"counters": {"claimedHive": -1, "x": 1}}));

        store.set("counters.claimedHive", 3).unwrap();
        assert_eq!(store.get::<i64>("counters.claimedHive").unwrap(), 3);

        store.set("counters", json!({"y": 2})).unwrap();
        assert!(!store.contains("counters.x"));
        assert_eq!(store.get::<i64>("counters.y").unwrap(), 2);
    }

    #[test]
    fn test_set_below_leaf_replaces_it() {
        let store = ConfigStore::new();

        store.set("counters", 5).unwrap();
        store.set("counters.claimedHive", 3).unwrap();

        assert_eq!(store.get_value("counters").unwrap(), json!({"claimedHive": 3}));
        assert_eq!(store.to_value(), json!({"counters": {"claimedHive": 3}}));

        store.set("a.b.c", true).unwrap();
        store.set("a.b.c.d", 1).unwrap();
        store.set("a", "flat").unwrap();
        assert_eq!(store.to_value()["a"], json!("flat"));
    }

    #[test]
    fn test_remove() {
        let store = ConfigStore::from_value(json!({"a": {"b": 1, "c": 2}, "d": 3}));
        store.remove("a");
        assert!(!store.contains("a.b"));
        assert_eq!(store.to_value(), json!({"d": 3}));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.yaml");

        let store = ConfigStore::load(&path).unwrap();
        store.set("status", "Idling").unwrap();
        store.set("counters.claimedHive", 4).unwrap();
        store.save().unwrap();

        let reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.get::<String>("status").unwrap(), "Idling");
        assert_eq!(reloaded.get::<i64>("counters.claimedHive").unwrap(), 4);
    }

    #[test]
    fn test_save_without_file() {
        let store = ConfigStore::new();
        assert!(matches!(store.save(), Err(ConfigError::NoBackingFile)));
    }
}
