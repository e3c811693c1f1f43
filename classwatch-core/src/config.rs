//! Engine configuration
//!
//! Loaded from TOML. Every field has a default so a partial file (or no file
//! at all) yields a working engine.

use crate::error::WatchError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory inside a vault where classwatch keeps its own files
pub const DATA_DIR: &str = ".classwatch";

/// Configuration for the change-detection engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Verbose per-event tracing. Never changes behaviour.
    pub debug: bool,

    /// Quiet period before a debounced callback fires
    pub quiet_period_ms: u64,

    /// Interval between cache flushes while dirty
    pub save_interval_ms: u64,

    /// How long events caused by our own callback are ignored
    pub suppression_cooldown_ms: u64,

    /// Extension of documents treated as notes
    pub note_extension: String,

    /// Path prefixes or glob patterns never processed
    pub excluded_paths: Vec<String>,

    /// Frontmatter key holding the file class
    pub class_field: String,

    /// File name of the persisted fingerprint cache
    pub cache_file: String,

    /// Schedule a callback on any metadata change, not only class changes
    pub notify_on_any_change: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            quiet_period_ms: 1_000,
            save_interval_ms: 15_000,
            suppression_cooldown_ms: 10_000,
            note_extension: "md".to_string(),
            excluded_paths: Vec::new(),
            class_field: "fileClass".to_string(),
            cache_file: "fileclass-cache.json".to_string(),
            notify_on_any_change: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.note_extension.is_empty() || self.note_extension.starts_with('.') {
            return Err(WatchError::config(format!(
                "note_extension must be a bare extension such as \"md\", got {:?}",
                self.note_extension
            )));
        }
        if self.class_field.trim().is_empty() {
            return Err(WatchError::config("class_field must not be empty"));
        }
        if self.cache_file.is_empty() || self.cache_file.contains(['/', '\\']) {
            return Err(WatchError::config(format!(
                "cache_file must be a plain file name, got {:?}",
                self.cache_file
            )));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Resolve the config for a vault: explicit path, then the vault's data
    /// directory, then the user config directory, then defaults.
    pub fn resolve(explicit: Option<&Path>, vault: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let candidates = vault
            .map(|v| v.join(DATA_DIR).join("config.toml"))
            .into_iter()
            .chain(Self::user_config_path());

        for candidate in candidates {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }

        Ok(Self::default())
    }

    /// `~/.config/classwatch/config.toml` or the platform equivalent
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("classwatch").join("config.toml"))
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }

    pub fn suppression_cooldown(&self) -> Duration {
        Duration::from_millis(self.suppression_cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.quiet_period(), Duration::from_secs(1));
        assert_eq!(config.save_interval(), Duration::from_secs(15));
        assert_eq!(config.suppression_cooldown(), Duration::from_secs(10));
        assert_eq!(config.class_field, "fileClass");
        assert!(!config.debug);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
debug = true
excluded_paths = ["templates/", "**/archive/**"]
"#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.excluded_paths.len(), 2);
        assert_eq!(config.quiet_period_ms, 1_000);
        assert_eq!(config.note_extension, "md");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = EngineConfig {
            quiet_period_ms: 250,
            class_field: "type".to_string(),
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_resolve_prefers_vault_config() {
        let temp_dir = TempDir::new().unwrap();
        let vault = temp_dir.path();
        let config = EngineConfig { suppression_cooldown_ms: 42, ..Default::default() };
        config.save(&vault.join(DATA_DIR).join("config.toml")).unwrap();

        let resolved = EngineConfig::resolve(None, Some(vault)).unwrap();
        assert_eq!(resolved.suppression_cooldown_ms, 42);
    }

    #[test]
    fn test_resolve_explicit_missing_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert!(EngineConfig::resolve(Some(&missing), None).is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(EngineConfig::default().validate().is_ok());

        let config = EngineConfig { note_extension: ".md".to_string(), ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, WatchError::Config { .. }));

        let config = EngineConfig { class_field: " ".to_string(), ..Default::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { cache_file: "../cache.json".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "class_field = \"\"\n").unwrap();

        let err = EngineConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Configuration error: class_field must not be empty"));
    }
}
