//! Filesystem-backed host: a directory of markdown notes
//!
//! [`VaultIndex`] plays the part of the host's metadata cache. The watcher
//! refreshes it before forwarding an event, so the engine always sees the
//! parse that matches the event it is handling.

use crate::error::{Result, WatchError};
use crate::host::{CachedMetadata, Frontmatter, MetadataProvider, NoteRef};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Parse the leading frontmatter block of a note.
///
/// `Ok(None)` when the text has no block, an empty map for an empty block.
pub fn parse_frontmatter(id: &str, text: &str) -> Result<Option<Frontmatter>> {
    let Some(block) = regex_utils::frontmatter::extract(text) else {
        return Ok(None);
    };

    let has_content = block.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    });
    if !has_content {
        return Ok(Some(Frontmatter::new()));
    }

    let value: Value = serde_yaml::from_str(block)
        .map_err(|e| WatchError::frontmatter(id, e.to_string()))?;

    match value {
        Value::Null => Ok(Some(Frontmatter::new())),
        Value::Object(map) => Ok(Some(map)),
        other => Err(WatchError::frontmatter(
            id,
            format!("expected a mapping, found {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Paths the vault adapter never reports: anything under a hidden
/// directory (`.git`, `.classwatch`, editor state) and temporary files.
pub fn is_ignored(relative: &Path) -> bool {
    let hidden = relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    });
    if hidden {
        return true;
    }

    relative
        .file_name()
        .map(|name| regex_utils::note_name::is_temporary(&name.to_string_lossy()))
        .unwrap_or(false)
}

/// A freshly read note
#[derive(Debug, Clone)]
pub struct NoteSnapshot {
    pub note: NoteRef,
    pub text: String,
    pub metadata: CachedMetadata,
}

/// Parsed metadata for every note seen in a vault directory
#[derive(Debug)]
pub struct VaultIndex {
    root: PathBuf,
    entries: DashMap<String, CachedMetadata>,
}

impl VaultIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), entries: DashMap::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vault-relative identifier with `/` separators
    pub fn note_id(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        (!parts.is_empty()).then(|| parts.join("/"))
    }

    pub fn absolute(&self, id: &str) -> PathBuf {
        id.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Re-read a note from disk and update the index.
    ///
    /// `Ok(None)` if the path no longer exists or is not a file. A malformed
    /// frontmatter block is logged and indexed as "no frontmatter".
    pub async fn refresh(&self, id: &str) -> Result<Option<NoteSnapshot>> {
        let path = self.absolute(id);

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.forget(id);
                return Ok(None);
            }
            Err(e) => return Err(WatchError::io(&path, e)),
        };

        let mtime = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis().max(0) as u64)
            .unwrap_or_default();

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.forget(id);
                return Ok(None);
            }
            Err(e) => return Err(WatchError::io(&path, e)),
        };

        let frontmatter = match parse_frontmatter(id, &text) {
            Ok(frontmatter) => frontmatter,
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        let metadata = CachedMetadata { frontmatter };
        self.entries.insert(id.to_string(), metadata.clone());

        Ok(Some(NoteSnapshot { note: NoteRef::new(id, mtime), text, metadata }))
    }

    pub fn forget(&self, id: &str) {
        self.entries.remove(id);
    }

    /// Move an indexed entry to a new identifier
    pub fn rename(&self, old_id: &str, new_id: &str) {
        if let Some((_, metadata)) = self.entries.remove(old_id) {
            self.entries.insert(new_id.to_string(), metadata);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read every note with `extension` under the root
    pub async fn scan(&self, extension: &str) -> Vec<NoteSnapshot> {
        let ids: Vec<String> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || entry
                        .path()
                        .strip_prefix(&self.root)
                        .map(|relative| !is_ignored(relative))
                        .unwrap_or(false)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable vault entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            })
            .filter_map(|entry| self.note_id(entry.path()))
            .collect();

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            match self.refresh(&id).await {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {}
                Err(e) => warn!("Failed to read {}: {}", id, e),
            }
        }

        debug!("Scanned {} notes under {:?}", snapshots.len(), self.root);
        snapshots
    }
}

impl MetadataProvider for VaultIndex {
    fn cached_metadata(&self, path: &str) -> Option<CachedMetadata> {
        self.entries.get(path).map(|m| m.value().clone())
    }
}
