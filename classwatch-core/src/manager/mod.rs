//! File class change orchestration
//!
//! [`FileClassManager`] receives host events, filters them, compares each
//! note's fresh state with the fingerprint cache, and debounces a call to the
//! [`ClassChangeHandler`] when a note's class changes. Notes handed to the
//! handler are suppressed for a cooldown so that the renames and edits the
//! handler makes are not mistaken for new user changes.
//!
//! Per note the manager moves through: unknown (no cache entry), tracked,
//! pending (callback scheduled), in flight (callback running) and suppressed
//! (cooldown after a callback). See [`NoteState`].

use crate::cache::{CacheStore, FingerprintCache};
use crate::config::EngineConfig;
use crate::host::{
    CachedMetadata, ClassChange, ClassChangeHandler, ClassResolver, MetadataProvider, NoteEvent,
    NoteRef,
};
use crate::monitor::{Debouncer, NoteFilter, StateComputer};
use crate::self_monitor::SuppressionWindow;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace};


/// Where a single note currently is in the detection pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoteState {
    Unknown,
    Tracked,
    Pending,
    InFlight,
    Suppressed,
}

/// Point-in-time counters for logging and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub enabled: bool,
    pub cached_notes: usize,
    pub pending_callbacks: usize,
    pub in_flight: usize,
    pub suppressed: usize,
}

/// Detects file class changes and invokes the handler once per change
pub struct FileClassManager {
    config: EngineConfig,
    filter: NoteFilter,
    states: StateComputer,
    cache: FingerprintCache,
    debouncer: Debouncer<ClassChange>,
    suppression: SuppressionWindow,
    enabled: AtomicBool,
}

impl FileClassManager {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CacheStore>,
        metadata: Arc<dyn MetadataProvider>,
        resolver: Arc<dyn ClassResolver>,
        handler: Arc<dyn ClassChangeHandler>,
    ) -> Self {
        let suppression = SuppressionWindow::new(config.suppression_cooldown());

        let window = suppression.clone();
        let debouncer = Debouncer::new(config.quiet_period(), move |key: String, change: ClassChange| {
            let window = window.clone();
            let handler = Arc::clone(&handler);
            async move {
                window.suppress(key.as_str());
                info!(
                    "File class of {} changed: {:?} -> {:?}",
                    key, change.old_class, change.new_class
                );
                handler.on_class_change(change).await
            }
        });

        Self {
            filter: NoteFilter::new(&config.note_extension, &config.excluded_paths),
            states: StateComputer::new(metadata, resolver),
            cache: FingerprintCache::new(store, config.save_interval()),
            debouncer,
            suppression,
            enabled: AtomicBool::new(true),
            config,
        }
    }

    /// Load the persisted cache. Never fails.
    pub async fn load(&self) {
        self.cache.load().await;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    /// Dispatch a host event to its handler
    pub fn handle_event(&self, event: NoteEvent) {
        if self.config.debug {
            debug!("Event for {}: {:?}", event.path().unwrap_or("(no note)"), event);
        }

        match event {
            NoteEvent::Created(note) => self.on_create(&note),
            NoteEvent::Modified(note) => self.on_modify(&note),
            NoteEvent::Deleted(path) => self.on_delete(&path),
            NoteEvent::Renamed { note, old_path } => self.on_rename(&note, &old_path),
            NoteEvent::MetadataChanged { note, data, metadata } => {
                self.on_metadata_changed(&note, &data, &metadata)
            }
            NoteEvent::ActiveNoteChanged(note) => self.on_active_note_changed(note.as_ref()),
        }
    }

    pub fn on_create(&self, note: &NoteRef) {
        self.on_modify(note);
    }

    pub fn on_modify(&self, note: &NoteRef) {
        let metadata = self.states.cached_metadata(note);
        self.process(note, metadata.as_ref());
    }

    /// The host re-parsed a note; use its parse instead of fetching one
    pub fn on_metadata_changed(&self, note: &NoteRef, data: &str, metadata: &CachedMetadata) {
        trace!("Metadata recomputed for {} ({} bytes)", note.path, data.len());
        self.process(note, Some(metadata));
    }

    pub fn on_delete(&self, path: &str) {
        if !self.is_enabled() {
            return;
        }
        if self.cache.delete(path).is_some() {
            trace!("Forgot deleted note {}", path);
        }
    }

    pub fn on_rename(&self, note: &NoteRef, old_path: &str) {
        if !self.is_enabled() {
            return;
        }

        if self.is_self_caused(old_path) || self.is_self_caused(&note.path) {
            trace!("Ignoring self-caused rename {} -> {}", old_path, note.path);
            self.cache.delete(old_path);
            return;
        }

        self.cache.delete(old_path);
        self.on_modify(note);
    }

    /// Warm the cache for the focused note without scheduling anything
    pub fn on_active_note_changed(&self, note: Option<&NoteRef>) {
        let metadata = note.and_then(|n| self.states.cached_metadata(n));
        if let Some(note) = note {
            self.observe(note, metadata.as_ref());
        }
    }

    /// Record a note's current state without scheduling a callback. Used to
    /// warm the cache at startup and on focus changes.
    pub fn observe(&self, note: &NoteRef, metadata: Option<&CachedMetadata>) {
        if !self.is_applicable(Some(note), metadata) {
            return;
        }

        if self.is_unchanged(note) {
            return;
        }

        let state = self.states.compute(note, metadata);
        self.cache.set(note.path.clone(), state);
    }

    /// Enable or disable the engine. Disabling forgets every cached entry,
    /// pending callback and suppression.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if !enabled {
            self.cache.clear();
            self.debouncer.clear();
            self.suppression.clear();
        }
        if was != enabled {
            info!("File class detection {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Filter check, rejecting everything while disabled
    pub fn is_applicable(&self, note: Option<&NoteRef>, metadata: Option<&CachedMetadata>) -> bool {
        self.is_enabled() && self.filter.is_applicable(note, metadata)
    }

    pub fn state_of(&self, id: &str) -> NoteState {
        if self.debouncer.is_processing(id) {
            NoteState::InFlight
        } else if self.suppression.is_suppressed(id) {
            NoteState::Suppressed
        } else if self.debouncer.is_pending(id) {
            NoteState::Pending
        } else if self.cache.get(id).is_some() {
            NoteState::Tracked
        } else {
            NoteState::Unknown
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            enabled: self.is_enabled(),
            cached_notes: self.cache.len(),
            pending_callbacks: self.debouncer.pending_count(),
            in_flight: self.debouncer.in_flight_count(),
            suppressed: self.suppression.len(),
        }
    }

    /// Cancel pending callbacks and flush the cache. Call at shutdown.
    pub async fn cleanup(&self) {
        self.debouncer.clear();
        self.cache.cleanup().await;
        info!("File class manager stopped");
    }

    fn is_self_caused(&self, id: &str) -> bool {
        self.suppression.is_suppressed(id) || self.debouncer.is_processing(id)
    }

    fn is_unchanged(&self, note: &NoteRef) -> bool {
        let unchanged = self
            .cache
            .get(&note.path)
            .is_some_and(|entry| entry.last_modified_time == note.mtime);
        if unchanged && self.config.debug {
            debug!("{} unchanged since last observation", note.path);
        }
        unchanged
    }

    fn process(&self, note: &NoteRef, metadata: Option<&CachedMetadata>) {
        if !self.is_applicable(Some(note), metadata) {
            return;
        }

        let previous = self.cache.get(&note.path);
        if previous.as_ref().is_some_and(|entry| entry.last_modified_time == note.mtime) {
            trace!("{} unchanged since last observation", note.path);
            return;
        }

        let current = self.states.compute(note, metadata);
        self.cache.set(note.path.clone(), current.clone());

        let Some(previous) = previous else {
            if self.config.debug {
                debug!("First observation of {} (class {:?})", note.path, current.file_class);
            }
            return;
        };

        if previous.fingerprint == current.fingerprint {
            return;
        }

        if previous.file_class == current.file_class && !self.config.notify_on_any_change {
            if self.config.debug {
                debug!("{} changed but kept class {:?}", note.path, current.file_class);
            }
            return;
        }

        if self.is_self_caused(&note.path) {
            trace!("Ignoring self-caused change to {}", note.path);
            return;
        }

        let change = ClassChange {
            note: note.clone(),
            frontmatter: metadata.and_then(|m| m.frontmatter.clone()).unwrap_or_default(),
            old_class: previous.file_class,
            new_class: current.file_class,
        };
        if self.config.debug {
            debug!(
                "Scheduling class change for {}: {:?} -> {:?}",
                note.path, change.old_class, change.new_class
            );
        }
        self.debouncer.schedule(note.path.clone(), change);
    }
}

impl std::fmt::Debug for FileClassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileClassManager")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
