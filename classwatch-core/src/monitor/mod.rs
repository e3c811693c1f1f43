//! Note monitoring and change detection
//!
//! This module provides the building blocks the orchestrator wires together:
//! - Applicability filtering of raw note events
//! - Fingerprint and file class computation
//! - Per-note debouncing of the change callback
//! - A filesystem vault adapter (index + notify watcher)

pub mod debouncer;
pub mod filter;
pub mod fingerprint;
pub mod vault;
pub mod watcher;

pub use debouncer::Debouncer;
pub use filter::NoteFilter;
pub use fingerprint::{StateComputer, fingerprint};
pub use vault::{NoteSnapshot, VaultIndex, parse_frontmatter};
pub use watcher::{VaultWatcher, WatchHandle};
