use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::TankobonError;

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TankobonError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), TankobonError>;
    fn delete(&self, key: &str) -> Result<(), TankobonError>;
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TankobonError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| TankobonError::Cache("cache lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), TankobonError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TankobonError::Cache("cache lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), TankobonError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TankobonError::Cache("cache lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: Utf8PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn entry_path(&self, key: &str) -> Utf8PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name = digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();
        self.root.join(format!("{name}.json"))
    }
}

impl CacheStore for JsonDirStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TankobonError> {
        match fs::read(self.entry_path(key).as_std_path()) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(TankobonError::Cache(err.to_string())),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), TankobonError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| TankobonError::Cache(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".entry")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| TankobonError::Cache(err.to_string()))?;
        temp.write_all(value)
            .map_err(|err| TankobonError::Cache(err.to_string()))?;
        temp.persist(self.entry_path(key).as_std_path())
            .map_err(|err| TankobonError::Cache(err.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), TankobonError> {
        match fs::remove_file(self.entry_path(key).as_std_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(TankobonError::Cache(err.to_string())),
        }
    }
}

pub struct TypedCache<T> {
    name: &'static str,
    store: Arc<dyn CacheStore>,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCache<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            store: self.store.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> TypedCache<T> {
    pub fn new(name: &'static str, store: Arc<dyn CacheStore>) -> Self {
        Self {
            name,
            store,
            marker: PhantomData,
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<T>, TankobonError> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(cache = self.name, key, "cache miss");
                return Ok(None);
            }
            Err(err) => {
                warn!(cache = self.name, key, error = %err, "cache read failed, evicting");
                self.evict(key)?;
                return Ok(None);
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => {
                debug!(cache = self.name, key, "cache hit");
                Ok(Some(value))
            }
            Err(err) => {
                warn!(cache = self.name, key, error = %err, "corrupt cache entry, evicting");
                self.evict(key)?;
                Ok(None)
            }
        }
    }

    pub fn set(&self, key: &str, value: &T) -> Result<(), TankobonError> {
        let raw = serde_json::to_vec(value).map_err(|err| TankobonError::Cache(err.to_string()))?;
        self.store.set(key, &raw)
    }

    pub fn delete(&self, key: &str) -> Result<(), TankobonError> {
        self.store.delete(key)
    }

    fn evict(&self, key: &str) -> Result<(), TankobonError> {
        self.store.delete(key).map_err(|err| {
            TankobonError::Cache(format!("failed to evict {key:?} from {}: {err}", self.name))
        })
    }
}
