//! Core functionality for classwatch
//!
//! This crate watches a vault of markdown notes and reports when a note's
//! file class changes, including the fingerprint cache, the debounced
//! callback scheduling and the filesystem adapter used by the CLI.

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod manager;
pub mod monitor;
pub mod self_monitor;

pub use cache::{CacheStore, FingerprintCache, FingerprintEntry, JsonFileStore, MemoryStore};
pub use config::EngineConfig;
pub use error::{Result, WatchError};
pub use host::{
    CachedMetadata, ClassChange, ClassChangeHandler, ClassResolver, FieldClassResolver,
    Frontmatter, MetadataProvider, NoteEvent, NoteRef,
};
pub use manager::{EngineStats, FileClassManager, NoteState};
