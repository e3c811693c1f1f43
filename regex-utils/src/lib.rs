//! Regex utilities for classwatch
//! Extracted to a separate crate for compilation optimization

use once_cell::sync::Lazy;
use regex::Regex;

/// Frontmatter block extraction
pub mod frontmatter {
    use super::*;

    /// Leading `---` fenced block. The body group is absent for `---\n---`.
    pub static BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?s)\A\x{FEFF}?---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)")
            .expect("Invalid regex pattern")
    });

    /// Return the raw YAML between the fences, or `None` if the text does
    /// not open with a frontmatter block.
    pub fn extract(text: &str) -> Option<&str> {
        let caps = BLOCK_PATTERN.captures(text)?;
        Some(caps.get(1).map_or("", |m| m.as_str()))
    }
}

/// Note file name helpers
pub mod note_name {
    use super::*;

    /// Editor swap, backup and lock files that never represent a note.
    pub static TEMPORARY_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:^\.#|^~\$|~$|\.(?:tmp|swp|swx|bak|crswap)$)")
            .expect("Invalid regex pattern")
    });

    pub fn is_temporary(file_name: &str) -> bool {
        TEMPORARY_PATTERN.is_match(file_name)
    }

    /// File name without its final extension. Dotfiles keep their name.
    pub fn basename(file_name: &str) -> &str {
        match file_name.rfind('.') {
            Some(0) | None => file_name,
            Some(idx) => &file_name[..idx],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontmatter_extraction() {
        let text = "---\nfileClass: book\ntitle: Dune\n---\n# Dune\n";
        assert_eq!(frontmatter::extract(text), Some("fileClass: book\ntitle: Dune"));
    }

    #[test]
    fn test_frontmatter_crlf_and_empty() {
        assert_eq!(frontmatter::extract("---\r\na: 1\r\n---\r\nbody"), Some("a: 1"));
        assert_eq!(frontmatter::extract("---\n---\n"), Some(""));
        assert_eq!(frontmatter::extract("---\nkey: v\n---"), Some("key: v"));
    }

    #[test]
    fn test_no_frontmatter() {
        assert_eq!(frontmatter::extract("# Title\n---\na: 1\n---\n"), None);
        assert_eq!(frontmatter::extract("---\nunterminated: true\n"), None);
    }

    #[test]
    fn test_temporary_names() {
        assert!(note_name::is_temporary(".#dune.md"));
        assert!(note_name::is_temporary("dune.md~"));
        assert!(note_name::is_temporary("dune.md.swp"));
        assert!(note_name::is_temporary("dune.md.tmp"));
        assert!(!note_name::is_temporary("dune.md"));
        assert!(!note_name::is_temporary("backup plan.md"));
    }

    #[test]
    fn test_basename() {
        assert_eq!(note_name::basename("dune.md"), "dune");
        assert_eq!(note_name::basename("dune - part 2.md"), "dune - part 2");
        assert_eq!(note_name::basename("README"), "README");
        assert_eq!(note_name::basename(".hidden"), ".hidden");
    }
}
