use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Time-boxed set of notes whose events were caused by our own callback
///
/// Entries expire on their own after the cooldown. Suppressing a note again
/// restarts its window. Expiry timers are fire-and-forget: [`clear`] empties
/// the set and any timer that fires afterwards finds nothing to remove.
///
/// [`clear`]: SuppressionWindow::clear
#[derive(Clone)]
pub struct SuppressionWindow {
    inner: Arc<WindowInner>,
}

struct WindowInner {
    cooldown: Duration,
    /// identifier -> generation of the timer allowed to expire it
    active: DashMap<String, u64>,
    generation: AtomicU64,
}

impl SuppressionWindow {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(WindowInner {
                cooldown,
                active: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Ignore events for `id` for the cooldown period
    pub fn suppress(&self, id: impl Into<String>) {
        let id = id.into();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, {} not suppressed", id);
            return;
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.active.insert(id.clone(), generation);
        debug!("Suppressing self-caused events for {} ({:?})", id, self.inner.cooldown);

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            tokio::time::sleep(inner.cooldown).await;
            if inner.active.remove_if(&id, |_, g| *g == generation).is_some() {
                trace!("Suppression expired for {}", id);
            }
        });
    }

    pub fn is_suppressed(&self, id: &str) -> bool {
        self.inner.active.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.active.is_empty()
    }

    pub fn clear(&self) {
        self.inner.active.clear();
    }
}

impl std::fmt::Debug for SuppressionWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionWindow")
            .field("cooldown", &self.inner.cooldown)
            .field("active", &self.len())
            .finish()
    }
}
