//! Applicability filter for note events
//!
//! Cheap, stateless checks run on every host event before any hashing
//! happens. A note passes only if it is the recognised kind, has an
//! identifier and a title, is not mid-save, is not excluded, and the host has
//! a parsed frontmatter block for it.

use crate::host::{CachedMetadata, NoteRef};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{trace, warn};

/// Decides whether a note event is worth processing
#[derive(Debug, Clone)]
pub struct NoteFilter {
    extension: String,
    excluded_prefixes: Vec<String>,
    excluded_globs: GlobSet,
}

impl NoteFilter {
    /// Build a filter. Entries of `excluded` containing glob metacharacters
    /// are compiled as globs, everything else is a path prefix.
    pub fn new(extension: impl Into<String>, excluded: &[String]) -> Self {
        let mut excluded_prefixes = Vec::new();
        let mut builder = GlobSetBuilder::new();

        for pattern in excluded {
            if pattern.contains(['*', '?', '[', '{']) {
                match Glob::new(pattern) {
                    Ok(glob) => {
                        builder.add(glob);
                    }
                    Err(e) => warn!("Ignoring invalid exclusion pattern {:?}: {}", pattern, e),
                }
            } else if !pattern.is_empty() {
                excluded_prefixes.push(pattern.trim_start_matches("./").to_string());
            }
        }

        let excluded_globs = builder.build().unwrap_or_else(|e| {
            warn!("Failed to compile exclusion patterns: {}", e);
            GlobSet::empty()
        });

        Self {
            extension: extension.into().trim_start_matches('.').to_lowercase(),
            excluded_prefixes,
            excluded_globs,
        }
    }

    /// Full applicability check against the host's cached metadata
    pub fn is_applicable(&self, note: Option<&NoteRef>, metadata: Option<&CachedMetadata>) -> bool {
        let Some(note) = note else {
            return false;
        };

        if !self.is_candidate(note) {
            return false;
        }

        if metadata.and_then(|m| m.frontmatter.as_ref()).is_none() {
            trace!("Skipping {}: no frontmatter", note.path);
            return false;
        }

        true
    }

    /// Checks that need only the note reference
    pub fn is_candidate(&self, note: &NoteRef) -> bool {
        if !note.extension.eq_ignore_ascii_case(&self.extension) {
            return false;
        }

        if note.path.is_empty() || note.basename.is_empty() {
            trace!("Skipping note without identifier or title: {:?}", note);
            return false;
        }

        if note.saving {
            trace!("Skipping {}: save in progress", note.path);
            return false;
        }

        if self.is_excluded(&note.path) {
            trace!("Skipping {}: excluded path", note.path);
            return false;
        }

        true
    }

    /// Whether a path falls under an excluded prefix or pattern
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
            || self.excluded_globs.is_match(path)
    }
}
