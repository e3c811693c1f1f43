//! Key-scoped debouncing of async callbacks
//!
//! Each key has at most one pending payload and one armed timer. Scheduling
//! again replaces the payload and restarts the timer, so a burst of updates
//! produces a single callback carrying the last payload. A key whose
//! callback is still running is never invoked a second time concurrently.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

type Callback<P> = Arc<dyn Fn(String, P) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Debounces callbacks per key
///
/// Cloning yields another handle to the same debouncer.
pub struct Debouncer<P> {
    inner: Arc<DebouncerInner<P>>,
}

struct DebouncerInner<P> {
    quiet_period: Duration,
    callback: Callback<P>,
    pending: DashMap<String, P>,
    timers: DashMap<String, ArmedTimer>,
    in_flight: DashSet<String>,
    generation: AtomicU64,
}

struct ArmedTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl<P> Clone for Debouncer<P> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<P: Send + Sync + 'static> Debouncer<P> {
    /// Create a debouncer that calls `callback(key, payload)` once a key has
    /// been quiet for `quiet_period`
    pub fn new<F, Fut>(quiet_period: Duration, callback: F) -> Self
    where
        F: Fn(String, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: Callback<P> = Arc::new(move |key, payload| callback(key, payload).boxed());

        Self {
            inner: Arc::new(DebouncerInner {
                quiet_period,
                callback,
                pending: DashMap::new(),
                timers: DashMap::new(),
                in_flight: DashSet::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the pending payload for `key` and restart its timer
    pub fn schedule(&self, key: impl Into<String>, payload: P) {
        let key = key.into();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, callback for {} not scheduled", key);
            return;
        };

        if self.inner.pending.insert(key.clone(), payload).is_some() {
            trace!("Replaced pending payload for {}", key);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let timer_key = key.clone();

        // Hold the slot while spawning so the new timer cannot look for
        // itself before it has been recorded.
        let slot = self.inner.timers.entry(key);
        let task = runtime.spawn(async move {
            tokio::time::sleep(inner.quiet_period).await;

            // Only the most recently armed timer for a key may fire.
            if inner
                .timers
                .remove_if(&timer_key, |_, armed| armed.generation == generation)
                .is_none()
            {
                return;
            }
            inner.fire(timer_key).await;
        });

        let armed = ArmedTimer { generation, task };
        let previous = match slot {
            Entry::Occupied(mut occupied) => Some(occupied.insert(armed)),
            Entry::Vacant(vacant) => {
                vacant.insert(armed);
                None
            }
        };
        if let Some(previous) = previous {
            previous.task.abort();
        }
    }

    /// True while the callback for `key` is executing
    pub fn is_processing(&self, key: &str) -> bool {
        self.inner.in_flight.contains(key)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.inner.pending.contains_key(key)
    }

    /// Number of keys with a payload waiting for its timer
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of callbacks currently executing
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Cancel every timer and forget all pending and in-flight state
    pub fn clear(&self) {
        let keys: Vec<String> = self.inner.timers.iter().map(|t| t.key().clone()).collect();
        for key in keys {
            if let Some((_, armed)) = self.inner.timers.remove(&key) {
                armed.task.abort();
            }
        }
        self.inner.pending.clear();
        self.inner.in_flight.clear();
        debug!("Debouncer cleared");
    }
}

impl<P: Send + Sync + 'static> DebouncerInner<P> {
    async fn fire(&self, key: String) {
        let Some((_, payload)) = self.pending.remove(&key) else {
            debug!("Timer fired for {} with nothing pending", key);
            return;
        };

        if !self.in_flight.insert(key.clone()) {
            debug!("Callback for {} still running, dropping newer payload", key);
            return;
        }

        let outcome = AssertUnwindSafe((self.callback)(key.clone(), payload))
            .catch_unwind()
            .await;

        self.in_flight.remove(&key);
        self.pending.remove(&key);

        match outcome {
            Ok(Ok(())) => trace!("Callback for {} completed", key),
            Ok(Err(e)) => error!("Callback for {} failed: {:#}", key, e),
            Err(_) => warn!("Callback for {} panicked", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::sleep;

    const QUIET: Duration = Duration::from_millis(1000);

    type Calls = Arc<Mutex<Vec<(String, u32)>>>;

    fn recording(quiet: Duration, work: Duration) -> (Debouncer<u32>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let debouncer = Debouncer::new(quiet, move |key: String, payload: u32| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push((key, payload));
                sleep(work).await;
                Ok(())
            }
        });
        (debouncer, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_payload_wins() {
        let (debouncer, calls) = recording(QUIET, Duration::ZERO);

        debouncer.schedule("book/dune.md", 1);
        sleep(Duration::from_millis(300)).await;
        debouncer.schedule("book/dune.md", 2);
        sleep(Duration::from_millis(300)).await;
        debouncer.schedule("book/dune.md", 3);
        assert_eq!(debouncer.pending_count(), 1);

        sleep(Duration::from_millis(900)).await;
        assert!(calls.lock().unwrap().is_empty());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(*calls.lock().unwrap(), vec![("book/dune.md".to_string(), 3)]);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let (debouncer, calls) = recording(QUIET, Duration::ZERO);

        debouncer.schedule("a.md", 1);
        debouncer.schedule("b.md", 2);
        sleep(QUIET * 2).await;

        let mut seen = calls.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![("a.md".to_string(), 1), ("b.md".to_string(), 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_key_drops_new_invocation() {
        let (debouncer, calls) = recording(QUIET, Duration::from_secs(5));

        debouncer.schedule("a.md", 1);
        sleep(QUIET + Duration::from_millis(10)).await;
        assert!(debouncer.is_processing("a.md"));

        // Fires while the first callback is still running.
        debouncer.schedule("a.md", 2);
        sleep(QUIET + Duration::from_millis(10)).await;
        assert!(!debouncer.is_pending("a.md"));

        sleep(Duration::from_secs(10)).await;
        assert!(!debouncer.is_processing("a.md"));
        assert_eq!(*calls.lock().unwrap(), vec![("a.md".to_string(), 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_poison_key() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let sink = attempts.clone();
        let debouncer = Debouncer::new(QUIET, move |_key: String, payload: u32| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(payload);
                if payload == 1 {
                    anyhow::bail!("handler exploded");
                }
                if payload == 2 {
                    panic!("handler panicked");
                }
                Ok(())
            }
        });

        debouncer.schedule("a.md", 1);
        sleep(QUIET * 2).await;
        assert!(!debouncer.is_processing("a.md"));

        debouncer.schedule("a.md", 2);
        sleep(QUIET * 2).await;
        assert!(!debouncer.is_processing("a.md"));

        debouncer.schedule("a.md", 3);
        sleep(QUIET * 2).await;
        assert_eq!(*attempts.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_timers() {
        let (debouncer, calls) = recording(QUIET, Duration::ZERO);

        debouncer.schedule("a.md", 1);
        debouncer.schedule("b.md", 2);
        debouncer.clear();
        assert_eq!(debouncer.pending_count(), 0);

        sleep(QUIET * 3).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_schedule_without_runtime_is_dropped() {
        let (debouncer, calls) = recording(QUIET, Duration::ZERO);

        debouncer.schedule("a.md", 1);

        assert!(!debouncer.is_pending("a.md"));
        assert_eq!(debouncer.pending_count(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }
}
