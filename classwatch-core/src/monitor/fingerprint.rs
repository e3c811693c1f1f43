//! Note state computation
//!
//! The fingerprint is a SHA-256 over the note title followed by the JSON
//! serialisation of its frontmatter, so any metadata edit or rename changes
//! it. The file class comes from the injected [`ClassResolver`].

use crate::cache::FingerprintEntry;
use crate::host::{CachedMetadata, ClassResolver, Frontmatter, MetadataProvider, NoteRef};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hex-encoded SHA-256 of `title` + serialized `frontmatter`
pub fn fingerprint(title: &str, frontmatter: &Frontmatter) -> String {
    let serialized = serde_json::to_string(frontmatter).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derives `{fingerprint, fileClass, lastModifiedTime}` for notes
#[derive(Clone)]
pub struct StateComputer {
    metadata: Arc<dyn MetadataProvider>,
    resolver: Arc<dyn ClassResolver>,
}

impl StateComputer {
    pub fn new(metadata: Arc<dyn MetadataProvider>, resolver: Arc<dyn ClassResolver>) -> Self {
        Self { metadata, resolver }
    }

    /// Host metadata for a note
    pub fn cached_metadata(&self, note: &NoteRef) -> Option<CachedMetadata> {
        self.metadata.cached_metadata(&note.path)
    }

    /// Compute the state of `note`, fetching metadata from the host when
    /// `cache` is not supplied. A missing class is an empty string.
    pub fn compute(&self, note: &NoteRef, cache: Option<&CachedMetadata>) -> FingerprintEntry {
        let fetched;
        let cache = match cache {
            Some(cache) => Some(cache),
            None => {
                fetched = self.cached_metadata(note);
                fetched.as_ref()
            }
        };

        let empty = Frontmatter::new();
        let frontmatter = cache.and_then(|c| c.frontmatter.as_ref()).unwrap_or(&empty);

        FingerprintEntry {
            fingerprint: fingerprint(&note.basename, frontmatter),
            file_class: self.resolver.file_class(frontmatter).unwrap_or_default(),
            last_modified_time: note.mtime,
        }
    }
}

impl std::fmt::Debug for StateComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateComputer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FieldClassResolver;
    use serde_json::json;
    use std::collections::HashMap;

    struct FixedMetadata(HashMap<String, CachedMetadata>);

    impl MetadataProvider for FixedMetadata {
        fn cached_metadata(&self, path: &str) -> Option<CachedMetadata> {
            self.0.get(path).cloned()
        }
    }

    fn frontmatter(value: serde_json::Value) -> Frontmatter {
        value.as_object().cloned().unwrap()
    }

    fn computer(entries: Vec<(&str, Frontmatter)>) -> StateComputer {
        let map = entries
            .into_iter()
            .map(|(p, fm)| (p.to_string(), CachedMetadata::with_frontmatter(fm)))
            .collect();
        StateComputer::new(
            Arc::new(FixedMetadata(map)),
            Arc::new(FieldClassResolver::new("fileClass")),
        )
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint("dune", &Frontmatter::new());
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        // sha256("dune{}")
        assert_eq!(fp, format!("{:x}", Sha256::digest(b"dune{}")));
    }

    #[test]
    fn test_fingerprint_sensitive_to_title_and_any_field() {
        let base = frontmatter(json!({"fileClass": "book", "rating": 4}));
        let changed = frontmatter(json!({"fileClass": "book", "rating": 5}));

        assert_ne!(fingerprint("dune", &base), fingerprint("dune", &changed));
        assert_ne!(fingerprint("dune", &base), fingerprint("Dune", &base));
        assert_eq!(fingerprint("dune", &base), fingerprint("dune", &base.clone()));
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a: Frontmatter = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let b: Frontmatter = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(fingerprint("x", &a), fingerprint("x", &b));
    }

    #[test]
    fn test_compute_fetches_metadata() {
        let computer = computer(vec![("book/dune.md", frontmatter(json!({"fileClass": "book"})))]);
        let note = NoteRef::new("book/dune.md", 1050);

        let state = computer.compute(&note, None);
        assert_eq!(state.file_class, "book");
        assert_eq!(state.last_modified_time, 1050);
    }

    #[test]
    fn test_compute_prefers_supplied_metadata() {
        let computer = computer(vec![("book/dune.md", frontmatter(json!({"fileClass": "book"})))]);
        let note = NoteRef::new("book/dune.md", 1050);
        let supplied = CachedMetadata::with_frontmatter(frontmatter(json!({"fileClass": "film"})));

        assert_eq!(computer.compute(&note, Some(&supplied)).file_class, "film");
    }

    #[test]
    fn test_compute_missing_class_is_empty() {
        let computer = computer(vec![]);
        let state = computer.compute(&NoteRef::new("loose.md", 1), None);
        assert_eq!(state.file_class, "");
        assert_eq!(state.fingerprint, fingerprint("loose", &Frontmatter::new()));
    }
}
