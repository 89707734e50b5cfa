use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    config::Config,
    error::{AppError, Result},
};

const REDIS_KEY_PREFIX: &str = "clarityxo:";

/// Scoped key-value store for serialized cache envelopes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// One file per key under a local directory.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        // Write beside the target then rename so readers never see a torn file.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }
}

pub struct RedisCacheStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn namespaced(key: &str) -> String {
        format!("{}{}", REDIS_KEY_PREFIX, key)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::namespaced(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(Self::namespaced(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::namespaced(key)).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Build the store selected by `CACHE_BACKEND`.
pub async fn cache_store_from_config(config: &Config) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.cache_backend.as_str() {
        "redis" => Arc::new(RedisCacheStore::connect(&config.redis_url).await?),
        "memory" => Arc::new(MemoryCacheStore::new()),
        "file" => Arc::new(FileCacheStore::new(&config.cache_dir)),
        other => {
            return Err(AppError::Internal(format!(
                "Unsupported cache backend: {}",
                other
            )))
        }
    };
    tracing::info!("Stats cache backend: {}", config.cache_backend);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "clarityxo-cache-test-{}-{}-{}",
            tag,
            std::process::id(),
            rand::random::<u32>()
        ))
    }

    #[tokio::test]
    async fn memory_store_round_trip_and_remove() {
        let store = MemoryCacheStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_and_overwrites() {
        let dir = temp_dir("persist");
        let store = FileCacheStore::new(&dir);
        store.set("clarityxo_stats", "one").await.unwrap();
        store.set("clarityxo_stats", "two").await.unwrap();

        let reopened = FileCacheStore::new(&dir);
        assert_eq!(
            reopened.get("clarityxo_stats").await.unwrap().as_deref(),
            Some("two")
        );

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn file_store_missing_key_and_remove_are_quiet() {
        let dir = temp_dir("missing");
        let store = FileCacheStore::new(&dir);
        assert_eq!(store.get("absent").await.unwrap(), None);
        store.remove("absent").await.unwrap();
    }

    #[test]
    fn file_store_sanitizes_keys() {
        let store = FileCacheStore::new("/tmp/cache");
        let path = store.path_for("../etc/passwd");
        assert_eq!(path, PathBuf::from("/tmp/cache/___etc_passwd.json"));
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let mut config = crate::config::test_config();
        config.cache_backend = "sqlite".to_string();
        assert!(cache_store_from_config(&config).await.is_err());
    }
}
