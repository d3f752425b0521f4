//! JSON-file backed key/value store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::kv::{KeyValueStore, StoreError};

/// Durable store persisted as a single JSON object on disk.
///
/// The whole map is rewritten on every mutation (write to a sibling temp file,
/// then rename), so a crash never leaves a half-written file behind. The
/// in-memory view changes only after the write lands, so memory never claims
/// a mutation the disk does not hold.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    inner: RwLock<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// An unreadable or corrupt file is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let map = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!(path = %path.display(), "discarding corrupt store file: {err}");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), "store file unreadable, starting empty: {err}");
                BTreeMap::new()
            }
        };

        Ok(Self {
            path,
            inner: RwLock::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");

        std::fs::write(&tmp, payload).map_err(|source| StoreError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read().ok()?;
        map.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = map.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if !map.contains_key(key) {
            return Ok(());
        }
        let mut next = map.clone();
        next.remove(key);
        self.persist(&next)?;
        *map = next;
        Ok(())
    }
}

/// Resolve the default store location: `{app_data_dir}/quorum/session.json`.
pub fn default_store_path() -> Option<PathBuf> {
    let base = dirs::data_dir().or_else(|| {
        dirs::home_dir().map(|mut h| {
            h.push(".local");
            h.push("share");
            h
        })
    })?;

    let mut path = base;
    path.push("quorum");
    path.push("session.json");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("quorum-store-{}", uuid::Uuid::now_v7()));
        dir.push("session.json");
        dir
    }

    #[test]
    fn values_survive_reopen() {
        let path = scratch_path();

        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("auth.credential", "abc").unwrap();
        store.set("auth.platform_operator", "true").unwrap();
        drop(store);

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.get("auth.credential").as_deref(), Some("abc"));
        assert_eq!(reopened.get("auth.platform_operator").as_deref(), Some("true"));

        reopened.remove("auth.credential").unwrap();
        drop(reopened);

        let again = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(again.get("auth.credential"), None);
        assert_eq!(again.get("auth.platform_operator").as_deref(), Some("true"));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(store.get("auth.credential"), None);
    }

    #[test]
    fn failed_write_leaves_memory_matching_disk() {
        let path = scratch_path();
        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("auth.credential", "abc").unwrap();

        // A directory where the temp file should go makes every write fail.
        std::fs::create_dir_all(path.with_extension("json.tmp")).unwrap();

        assert!(store.remove("auth.credential").is_err());
        assert_eq!(store.get("auth.credential").as_deref(), Some("abc"));

        assert!(store.set("auth.credential", "xyz").is_err());
        assert_eq!(store.get("auth.credential").as_deref(), Some("abc"));

        drop(store);
        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.get("auth.credential").as_deref(), Some("abc"));
    }
}
