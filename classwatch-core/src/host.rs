//! Host-facing types and the seams the engine depends on
//!
//! The engine never talks to a document store directly. It is handed note
//! references and events, asks a [`MetadataProvider`] for parsed metadata,
//! asks a [`ClassResolver`] what class a note has, and reports confirmed
//! changes to a [`ClassChangeHandler`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parsed frontmatter. Keys are kept sorted so serialisation is stable.
pub type Frontmatter = serde_json::Map<String, Value>;

/// A reference to a single note as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    /// Stable path-like identifier, relative to the vault root
    pub path: String,
    /// File name without extension, used as the note title
    pub basename: String,
    /// Extension without the leading dot
    pub extension: String,
    /// Host modification time, milliseconds since the epoch
    pub mtime: u64,
    /// The host is in the middle of writing this note
    pub saving: bool,
}

impl NoteRef {
    /// Build a reference from a relative path, deriving basename and extension
    pub fn new(path: impl Into<String>, mtime: u64) -> Self {
        let path = path.into();
        let file_name = path.rsplit('/').next().unwrap_or_default();
        let basename = regex_utils::note_name::basename(file_name).to_string();
        let extension = if basename.len() < file_name.len() {
            file_name[basename.len() + 1..].to_string()
        } else {
            String::new()
        };

        Self { path, basename, extension, mtime, saving: false }
    }
}

/// Host-side cached parse of a note
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedMetadata {
    pub frontmatter: Option<Frontmatter>,
}

impl CachedMetadata {
    pub fn with_frontmatter(frontmatter: Frontmatter) -> Self {
        Self { frontmatter: Some(frontmatter) }
    }
}

/// Inbound host notifications
#[derive(Debug, Clone)]
pub enum NoteEvent {
    Created(NoteRef),
    Modified(NoteRef),
    Deleted(String),
    Renamed { note: NoteRef, old_path: String },
    /// The host re-parsed a note; carries the raw text and the parse result
    MetadataChanged { note: NoteRef, data: String, metadata: CachedMetadata },
    /// Focus moved to another note, or to nothing
    ActiveNoteChanged(Option<NoteRef>),
}

impl NoteEvent {
    /// Identifier the event is about, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            NoteEvent::Created(note)
            | NoteEvent::Modified(note)
            | NoteEvent::Renamed { note, .. }
            | NoteEvent::MetadataChanged { note, .. } => Some(&note.path),
            NoteEvent::Deleted(path) => Some(path),
            NoteEvent::ActiveNoteChanged(note) => note.as_ref().map(|n| n.path.as_str()),
        }
    }
}

/// A confirmed, debounced classification change handed to the handler
#[derive(Debug, Clone, PartialEq)]
pub struct ClassChange {
    pub note: NoteRef,
    pub frontmatter: Frontmatter,
    pub old_class: String,
    pub new_class: String,
}

/// Source of the host's cached metadata for a note
pub trait MetadataProvider: Send + Sync {
    fn cached_metadata(&self, path: &str) -> Option<CachedMetadata>;
}

/// Deduces the file class from a note's frontmatter
pub trait ClassResolver: Send + Sync {
    fn file_class(&self, frontmatter: &Frontmatter) -> Option<String>;
}

/// Business logic run once per confirmed class change
#[async_trait]
pub trait ClassChangeHandler: Send + Sync {
    async fn on_class_change(&self, change: ClassChange) -> Result<()>;
}

/// Reads the class from a single frontmatter key
#[derive(Debug, Clone)]
pub struct FieldClassResolver {
    field: String,
}

impl FieldClassResolver {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl ClassResolver for FieldClassResolver {
    fn file_class(&self, frontmatter: &Frontmatter) -> Option<String> {
        let value = match frontmatter.get(&self.field)? {
            Value::String(s) => s.trim(),
            Value::Array(items) => items.iter().find_map(Value::as_str)?.trim(),
            _ => return None,
        };

        (!value.is_empty()).then(|| value.to_string())
    }
}
