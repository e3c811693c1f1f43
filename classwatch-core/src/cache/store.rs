//! Durable backends for the fingerprint cache

use crate::error::{Result, WatchError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// Where the serialized cache lives between sessions
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Previously written data, or `None` if nothing was ever saved
    async fn read(&self) -> Result<Option<String>>;

    async fn write(&self, data: String) -> Result<()>;
}

/// Stores the cache as a JSON file, replacing it atomically on write
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CacheStore for JsonFileStore {
    async fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WatchError::io(&self.path, e)),
        }
    }

    async fn write(&self, data: String) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| WatchError::io(parent, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).await.map_err(|e| WatchError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| WatchError::io(&self.path, e))?;

        Ok(())
    }
}

/// Keeps the serialized cache in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store as if a previous session had saved `data`
    pub fn with_data(data: impl Into<String>) -> Self {
        Self { data: Mutex::new(Some(data.into())), writes: Mutex::new(0) }
    }

    pub fn contents(&self) -> Option<String> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of completed writes
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    async fn write(&self, data: String) -> Result<()> {
        *self.data.lock().unwrap_or_else(|e| e.into_inner()) = Some(data);
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
