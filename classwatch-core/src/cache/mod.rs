//! Persisted fingerprint cache
//!
//! Maps note identifiers to the last observed `{fingerprint, fileClass,
//! lastModifiedTime}`. Mutations are synchronous and mark the cache dirty;
//! writes to the [`CacheStore`] are coalesced to at most one per save
//! interval, plus a final flush at shutdown.

pub mod store;

pub use store::{CacheStore, JsonFileStore, MemoryStore};

use crate::error::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Last observed state of a single note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintEntry {
    pub fingerprint: String,
    pub file_class: String,
    pub last_modified_time: u64,
}

/// Fingerprint cache with a dirty bit and a debounced flush
#[derive(Clone)]
pub struct FingerprintCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: DashMap<String, FingerprintEntry>,
    dirty: AtomicBool,
    save_task: Mutex<Option<JoinHandle<()>>>,
    /// Held for the whole of a write so flushes never overlap
    write_lock: tokio::sync::Mutex<()>,
    store: Arc<dyn CacheStore>,
    save_interval: Duration,
}

impl FingerprintCache {
    pub fn new(store: Arc<dyn CacheStore>, save_interval: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                dirty: AtomicBool::new(false),
                save_task: Mutex::new(None),
                write_lock: tokio::sync::Mutex::new(()),
                store,
                save_interval,
            }),
        }
    }

    /// Populate from the store. Missing or malformed data leaves the cache
    /// empty; this never fails.
    pub async fn load(&self) {
        let data = match self.inner.store.read().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("No persisted fingerprint cache, starting empty");
                return;
            }
            Err(e) => {
                warn!("Failed to read fingerprint cache, starting empty: {}", e);
                return;
            }
        };

        match serde_json::from_str::<Vec<(String, FingerprintEntry)>>(&data) {
            Ok(pairs) => {
                self.inner.entries.clear();
                let count = pairs.len();
                for (id, entry) in pairs {
                    self.inner.entries.insert(id, entry);
                }
                info!("Loaded fingerprint cache with {} entries", count);
            }
            Err(e) => {
                warn!("Malformed fingerprint cache, starting empty: {}", e);
                self.inner.entries.clear();
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<FingerprintEntry> {
        self.inner.entries.get(id).map(|e| e.value().clone())
    }

    pub fn set(&self, id: impl Into<String>, entry: FingerprintEntry) {
        self.inner.entries.insert(id.into(), entry);
        self.mark_dirty();
    }

    pub fn delete(&self, id: &str) -> Option<FingerprintEntry> {
        let removed = self.inner.entries.remove(id).map(|(_, entry)| entry);
        self.mark_dirty();
        removed
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
        self.mark_dirty();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// All entries, sorted by identifier
    pub fn snapshot(&self) -> Vec<(String, FingerprintEntry)> {
        self.inner.snapshot()
    }

    /// Arm the save timer unless one is already pending
    pub fn schedule_save(&self) {
        let mut slot = self.inner.save_task.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            trace!("Cache save already scheduled");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, cache save not scheduled");
            return;
        };

        let inner = Arc::clone(&self.inner);
        *slot = Some(runtime.spawn(async move {
            tokio::time::sleep(inner.save_interval).await;
            inner.save_task.lock().unwrap_or_else(PoisonError::into_inner).take();
            // Failure is already logged and leaves the cache dirty.
            let _ = inner.flush().await;
        }));
    }

    /// Write the cache now if dirty
    pub async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    /// Cancel the pending timer and flush once. Used at shutdown.
    ///
    /// A save that is already writing is waited for, then anything changed
    /// since its snapshot is written.
    pub async fn cleanup(&self) {
        let pending = self.inner.save_task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = pending {
            task.abort();
        }

        if let Err(e) = self.inner.flush().await {
            warn!("Final fingerprint cache flush failed: {}", e);
        }
    }

    fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.schedule_save();
    }
}

impl CacheInner {
    fn snapshot(&self) -> Vec<(String, FingerprintEntry)> {
        let mut pairs: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    async fn flush(&self) -> Result<()> {
        let _writing = self.write_lock.lock().await;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let pairs = self.snapshot();
        let result = match serde_json::to_string(&pairs) {
            Ok(data) => self.store.write(data).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                debug!("Saved fingerprint cache ({} entries)", pairs.len());
                Ok(())
            }
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                warn!("Failed to save fingerprint cache: {}", e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for FingerprintCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintCache")
            .field("entries", &self.len())
            .field("dirty", &self.is_dirty())
            .field("save_interval", &self.inner.save_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const INTERVAL: Duration = Duration::from_secs(15);

    fn entry(fingerprint: &str, class: &str, mtime: u64) -> FingerprintEntry {
        FingerprintEntry {
            fingerprint: fingerprint.to_string(),
            file_class: class.to_string(),
            last_modified_time: mtime,
        }
    }

    /// Fails the first `failures` writes, then behaves like a memory store
    struct FlakyStore {
        failures: AtomicUsize,
        inner: MemoryStore,
    }

    #[async_trait]
    impl CacheStore for FlakyStore {
        async fn read(&self) -> Result<Option<String>> {
            self.inner.read().await
        }

        async fn write(&self, data: String) -> Result<()> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(WatchError::io("cache.json", std::io::Error::other("disk full")));
            }
            self.inner.write(data).await
        }
    }

    /// Takes `delay` to complete every write
    struct SlowStore {
        delay: Duration,
        inner: MemoryStore,
    }

    #[async_trait]
    impl CacheStore for SlowStore {
        async fn read(&self) -> Result<Option<String>> {
            self.inner.read().await
        }

        async fn write(&self, data: String) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.write(data).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_is_debounced() {
        let store = Arc::new(MemoryStore::new());
        let cache = FingerprintCache::new(store.clone(), INTERVAL);

        cache.set("a.md", entry("a", "note", 1));
        tokio::time::sleep(Duration::from_secs(5)).await;
        cache.set("b.md", entry("b", "book", 2));
        cache.delete("a.md");

        assert_eq!(store.write_count(), 0);
        assert!(cache.is_dirty());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(store.write_count(), 1);
        assert!(!cache.is_dirty());

        // The timer is not re-armed by the earlier mutations.
        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_persistence() {
        let store = Arc::new(MemoryStore::new());
        let cache = FingerprintCache::new(store.clone(), INTERVAL);
        for i in 0..20u64 {
            cache.set(format!("notes/{i}.md"), entry(&format!("fp{i}"), "book", 1000 + i));
        }
        cache.flush().await.unwrap();

        let reloaded = FingerprintCache::new(store, INTERVAL);
        reloaded.load().await;

        assert_eq!(reloaded.len(), 20);
        for i in 0..20u64 {
            assert_eq!(
                reloaded.get(&format!("notes/{i}.md")),
                Some(entry(&format!("fp{i}"), "book", 1000 + i))
            );
        }
        assert!(!reloaded.is_dirty());
    }

    #[tokio::test]
    async fn test_persisted_format() {
        let store = Arc::new(MemoryStore::new());
        let cache = FingerprintCache::new(store.clone(), INTERVAL);
        cache.set("book/dune.md", entry("a", "note", 1000));
        cache.flush().await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&store.contents().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                ["book/dune.md", {"fingerprint": "a", "fileClass": "note", "lastModifiedTime": 1000}]
            ])
        );
    }

    #[tokio::test]
    async fn test_load_malformed_falls_back_to_empty() {
        let cache = FingerprintCache::new(Arc::new(MemoryStore::with_data("{not json")), INTERVAL);
        cache.load().await;
        assert!(cache.is_empty());

        let cache = FingerprintCache::new(Arc::new(MemoryStore::new()), INTERVAL);
        cache.load().await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_stays_dirty_and_retries() {
        let store = Arc::new(FlakyStore { failures: AtomicUsize::new(1), inner: MemoryStore::new() });
        let cache = FingerprintCache::new(store.clone(), INTERVAL);

        cache.set("a.md", entry("a", "note", 1));
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert!(cache.is_dirty());
        assert_eq!(store.inner.write_count(), 0);

        cache.set("b.md", entry("b", "note", 2));
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert!(!cache.is_dirty());
        assert_eq!(store.inner.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_flushes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let cache = FingerprintCache::new(store.clone(), INTERVAL);

        cache.set("a.md", entry("a", "note", 1));
        cache.cleanup().await;
        assert_eq!(store.write_count(), 1);

        // The cancelled timer never writes a second time.
        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(store.write_count(), 1);

        // Nothing dirty, nothing written.
        cache.cleanup().await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_marks_dirty() {
        let cache = FingerprintCache::new(Arc::new(MemoryStore::new()), INTERVAL);
        cache.set("a.md", entry("a", "note", 1));
        cache.flush().await.unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_waits_for_running_save() {
        let store = Arc::new(SlowStore { delay: Duration::from_secs(5), inner: MemoryStore::new() });
        let cache = FingerprintCache::new(store.clone(), INTERVAL);

        cache.set("a.md", entry("a", "note", 1));
        // The timer fires and starts a write that takes five seconds
        tokio::time::sleep(INTERVAL + Duration::from_millis(100)).await;
        assert!(!cache.is_dirty());
        assert_eq!(store.inner.write_count(), 0);

        // Changed while that write is still running
        cache.set("b.md", entry("b", "book", 2));
        cache.cleanup().await;

        assert_eq!(store.inner.write_count(), 2);
        assert!(!cache.is_dirty());
        let persisted = store.inner.contents().unwrap();
        assert!(persisted.contains("\"a.md\""));
        assert!(persisted.contains("\"b.md\""));
    }
}
