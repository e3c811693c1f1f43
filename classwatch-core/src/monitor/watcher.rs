//! Vault watcher built on the notify crate
//!
//! Turns raw filesystem events into [`NoteEvent`]s. Each event refreshes the
//! [`VaultIndex`] before it is forwarded.

use crate::error::Result;
use crate::host::NoteEvent;
use crate::monitor::vault::{VaultIndex, is_ignored};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Keeps the OS watcher and the translation task alive. Dropping it stops
/// watching.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watches a vault directory for note changes
pub struct VaultWatcher {
    index: Arc<VaultIndex>,
    extension: String,
    gitignore: Option<Gitignore>,
}

impl VaultWatcher {
    /// Create a watcher over `index.root()`, honouring the vault's
    /// `.gitignore` if it has one
    pub fn new(index: Arc<VaultIndex>, extension: impl Into<String>) -> Self {
        let mut builder = GitignoreBuilder::new(index.root());
        let gitignore_path = index.root().join(".gitignore");
        if gitignore_path.is_file() {
            if let Some(e) = builder.add(&gitignore_path) {
                warn!("Failed to read {:?}: {}", gitignore_path, e);
            }
        }
        let gitignore = match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring vault .gitignore: {}", e);
                None
            }
        };

        Self { index, extension: extension.into(), gitignore }
    }

    /// Start watching. Note events arrive on the returned receiver until the
    /// handle is dropped.
    pub fn start(self) -> Result<(WatchHandle, mpsc::UnboundedReceiver<NoteEvent>)> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if raw_tx.send(event).is_err() {
                    trace!("Watcher event dropped, translator stopped");
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        })?;

        watcher.watch(self.index.root(), RecursiveMode::Recursive)?;
        info!("Watching vault: {:?}", self.index.root());

        let task = tokio::spawn(async move {
            while let Some(event) = raw_rx.recv().await {
                for note_event in self.translate(event).await {
                    if tx.send(note_event).is_err() {
                        debug!("Note event receiver dropped, stopping watcher");
                        return;
                    }
                }
            }
        });

        Ok((WatchHandle { _watcher: watcher, task }, rx))
    }

    /// Identifier for a path worth reporting, if it is one
    fn accept(&self, path: &Path) -> Option<String> {
        let id = self.index.note_id(path)?;

        if is_ignored(Path::new(&id)) {
            trace!("Ignoring hidden or temporary path: {:?}", path);
            return None;
        }

        if let Some(gitignore) = &self.gitignore {
            if gitignore.matched_path_or_any_parents(path, false).is_ignore() {
                trace!("Ignoring path due to gitignore: {:?}", path);
                return None;
            }
        }

        let matches_kind = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension));

        matches_kind.then_some(id)
    }

    async fn translate(&self, event: Event) -> Vec<NoteEvent> {
        let mut out = Vec::new();

        match event.kind {
            EventKind::Create(_) => {
                for path in &event.paths {
                    if let Some(id) = self.accept(path) {
                        if let Some(snapshot) = self.read(&id).await {
                            out.push(NoteEvent::Created(snapshot.note));
                        }
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                let old = self.accept(&event.paths[0]);
                let new = self.accept(&event.paths[1]);
                match (old, new) {
                    (Some(old_path), Some(new_id)) => {
                        self.index.rename(&old_path, &new_id);
                        if let Some(snapshot) = self.read(&new_id).await {
                            out.push(NoteEvent::Renamed { note: snapshot.note, old_path });
                        }
                    }
                    (Some(old_path), None) => {
                        self.index.forget(&old_path);
                        out.push(NoteEvent::Deleted(old_path));
                    }
                    (None, Some(new_id)) => {
                        if let Some(snapshot) = self.read(&new_id).await {
                            out.push(NoteEvent::Created(snapshot.note));
                        }
                    }
                    (None, None) => {}
                }
            }
            // Tracked halves of a rename; the paired `Both` event follows.
            EventKind::Modify(ModifyKind::Name(RenameMode::From | RenameMode::To))
                if event.attrs.tracker().is_some() => {}
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in &event.paths {
                    let Some(id) = self.accept(path) else { continue };
                    if path.exists() {
                        if let Some(snapshot) = self.read(&id).await {
                            out.push(NoteEvent::Created(snapshot.note));
                        }
                    } else {
                        self.index.forget(&id);
                        out.push(NoteEvent::Deleted(id));
                    }
                }
            }
            EventKind::Modify(_) => {
                for path in &event.paths {
                    if let Some(id) = self.accept(path) {
                        if let Some(snapshot) = self.read(&id).await {
                            out.push(NoteEvent::MetadataChanged {
                                note: snapshot.note,
                                data: snapshot.text,
                                metadata: snapshot.metadata,
                            });
                        }
                    }
                }
            }
            EventKind::Remove(_) => {
                for path in &event.paths {
                    if let Some(id) = self.accept(path) {
                        self.index.forget(&id);
                        out.push(NoteEvent::Deleted(id));
                    }
                }
            }
            _ => {}
        }

        out
    }

    async fn read(&self, id: &str) -> Option<crate::monitor::vault::NoteSnapshot> {
        match self.index.refresh(id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to read {}: {}", id, e);
                None
            }
        }
    }
}
