use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::cache::{CacheStore, JsonDirStore};
use crate::error::TankobonError;

#[derive(Clone)]
pub struct ResolverStores {
    pub query_to_ids: Arc<dyn CacheStore>,
    pub title_to_id: Arc<dyn CacheStore>,
    pub id_to_record: Arc<dyn CacheStore>,
    pub access_token: Arc<dyn CacheStore>,
}

impl ResolverStores {
    pub fn in_memory() -> Self {
        use crate::cache::MemoryCacheStore;
        Self {
            query_to_ids: Arc::new(MemoryCacheStore::new()),
            title_to_id: Arc::new(MemoryCacheStore::new()),
            id_to_record: Arc::new(MemoryCacheStore::new()),
            access_token: Arc::new(MemoryCacheStore::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, TankobonError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.cache_dir().join("tankobon")).ok()
            })
            .ok_or_else(|| {
                TankobonError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { cache_root })
    }

    pub fn new_with_paths(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn query_ids_dir(&self) -> Utf8PathBuf {
        self.cache_root.join("anilist").join("query-ids")
    }

    pub fn title_id_dir(&self) -> Utf8PathBuf {
        self.cache_root.join("anilist").join("title-id")
    }

    pub fn records_dir(&self) -> Utf8PathBuf {
        self.cache_root.join("anilist").join("records")
    }

    pub fn auth_dir(&self) -> Utf8PathBuf {
        self.cache_root.join("anilist").join("auth")
    }

    pub fn resolver_stores(&self) -> ResolverStores {
        ResolverStores {
            query_to_ids: Arc::new(JsonDirStore::new(self.query_ids_dir())),
            title_to_id: Arc::new(JsonDirStore::new(self.title_id_dir())),
            id_to_record: Arc::new(JsonDirStore::new(self.records_dir())),
            access_token: Arc::new(JsonDirStore::new(self.auth_dir())),
        }
    }

    pub fn clear_cache(&self) -> Result<Vec<Utf8PathBuf>, TankobonError> {
        let mut removed = Vec::new();
        for dir in [self.query_ids_dir(), self.title_id_dir(), self.records_dir()] {
            if dir.as_std_path().exists() {
                fs::remove_dir_all(dir.as_std_path())
                    .map_err(|err| TankobonError::Filesystem(err.to_string()))?;
                removed.push(dir);
            }
        }
        Ok(removed)
    }
}
