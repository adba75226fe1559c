use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use kit::constants::LOCAL_DATA_KEY_PREFIX;
use kit::serde::{de::DeserializeOwned, Serialize};
use kit::serde_json;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("failed to get system data directory")]
    MissingDataDir,
    #[error("{0}")]
    Io(String),
    #[error("failed to (de)serialize '{key}': {message}")]
    Serialization { key: String, message: String },
}

/// Key-value store surviving restarts, keyed by logical name.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

pub fn make_local_data_key(name: &str) -> String {
    format!("{LOCAL_DATA_KEY_PREFIX}.{name}")
}

pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    name: &str,
) -> Result<Option<T>, StoreError> {
    let key = make_local_data_key(name);
    let Some(raw) = store.get(&key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StoreError::Serialization { key, message: e.to_string() })
}

pub fn write_json<T: Serialize>(
    store: &mut dyn KeyValueStore,
    name: &str,
    value: &T,
) -> Result<(), StoreError> {
    let key = make_local_data_key(name);
    let raw = serde_json::to_string(value)
        .map_err(|e| StoreError::Serialization { key: key.clone(), message: e.to_string() })?;
    store.set(&key, &raw)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: BTreeMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a TOML table on disk, rewritten on every mutation.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens `<data_dir>/stacks-wallet/local-state.toml`, or the file under `data_dir` when given.
    pub fn in_data_dir(data_dir: Option<&Path>) -> Result<Self, StoreError> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::data_dir().ok_or(StoreError::MissingDataDir)?.join("stacks-wallet"),
        };
        Self::open(data_dir.join("local-state.toml"))
    }

    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self { path, entries: BTreeMap::new() });
        }

        let mut file = std::fs::File::open(&path)
            .map_err(|e| StoreError::Io(format!("Failed to open local state file: {}", e)))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .map_err(|e| StoreError::Io(format!("Failed to read local state file: {}", e)))?;

        let entries = toml::from_str(&buf).map_err(|e| StoreError::Serialization {
            key: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to disk, leaving the in-memory table untouched.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("Failed to create data directory: {}", e)))?;
        }

        let toml = toml::to_string(entries).map_err(|e| StoreError::Serialization {
            key: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut file = std::fs::File::create(&self.path)
            .map_err(|e| StoreError::Io(format!("Failed to create local state file: {}", e)))?;
        file.write_all(toml.as_bytes())
            .map_err(|e| StoreError::Io(format!("Failed to write local state: {}", e)))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)?;
        self.entries = entries;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut entries = self.entries.clone();
        entries.remove(key);
        self.flush(&entries)?;
        self.entries = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("stacks-wallet-store-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = scratch_dir("reopen");
        let mut store = FileStore::in_data_dir(Some(&dir)).unwrap();
        assert_eq!(store.get("stacks-wallet.networkKey").unwrap(), None);

        write_json(&mut store, "networkKey", &"testnet").unwrap();
        store.set("stacks-wallet.other", "1").unwrap();
        store.remove("stacks-wallet.other").unwrap();

        let reopened = FileStore::in_data_dir(Some(&dir)).unwrap();
        let key: Option<String> = read_json(&reopened, "networkKey").unwrap();
        assert_eq!(key.as_deref(), Some("testnet"));
        assert_eq!(reopened.get("stacks-wallet.other").unwrap(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_writes_leave_entries_unchanged() {
        let dir = scratch_dir("blocked");
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let mut store = FileStore::open(blocker.join("local-state.toml")).unwrap();
        let result = store.set("stacks-wallet.networkKey", r#""testnet""#);
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.get("stacks-wallet.networkKey").unwrap(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_values_surface_as_serialization_errors() {
        let mut store = InMemoryStore::new();
        store.set(&make_local_data_key("networkKey"), "{not json").unwrap();
        let err = read_json::<String>(&store, "networkKey").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }
}
