//! Watch a vault and report file class changes

use crate::cli::app::WatchArgs;
use anyhow::{Context, Result};
use async_trait::async_trait;
use classwatch_core::config::DATA_DIR;
use classwatch_core::monitor::{VaultIndex, VaultWatcher};
use classwatch_core::{
    CacheStore, ClassChange, ClassChangeHandler, EngineConfig, FieldClassResolver,
    FileClassManager, JsonFileStore, MemoryStore, NoteEvent,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Reports class changes on stdout
#[derive(Debug, Default)]
pub struct LogHandler;

#[async_trait]
impl ClassChangeHandler for LogHandler {
    async fn on_class_change(&self, change: ClassChange) -> Result<()> {
        println!("{}", describe(&change));
        Ok(())
    }
}

fn describe(change: &ClassChange) -> String {
    let class = |c: &str| if c.is_empty() { "(none)".to_string() } else { c.to_string() };
    format!("{}: {} -> {}", change.note.path, class(&change.old_class), class(&change.new_class))
}

/// Where a vault's fingerprint cache is persisted
pub fn cache_path(vault: &Path, config: &EngineConfig) -> PathBuf {
    vault.join(DATA_DIR).join(&config.cache_file)
}

pub async fn execute(args: WatchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let vault = args
        .vault
        .canonicalize()
        .with_context(|| format!("Vault not found: {}", args.vault.display()))?;
    let config = EngineConfig::resolve(config_path.as_deref(), Some(&vault))?;

    let store: Arc<dyn CacheStore> = if args.no_persist {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonFileStore::new(cache_path(&vault, &config)))
    };

    let index = Arc::new(VaultIndex::new(&vault));
    let manager = FileClassManager::new(
        config.clone(),
        store,
        index.clone(),
        Arc::new(FieldClassResolver::new(config.class_field.clone())),
        Arc::new(LogHandler),
    );
    manager.load().await;

    // Catch up on edits made while nothing was watching
    let notes = index.scan(&config.note_extension).await;
    for snapshot in &notes {
        manager.on_metadata_changed(&snapshot.note, &snapshot.text, &snapshot.metadata);
    }
    info!("Indexed {} notes in {}", notes.len(), vault.display());

    let (_handle, mut events) = VaultWatcher::new(index, config.note_extension.clone()).start()?;
    run_until(&manager, &mut events, tokio::signal::ctrl_c()).await;

    manager.cleanup().await;
    Ok(())
}

/// Feed events to the manager until the channel closes or `shutdown`
/// resolves. Returns true when stopped by `shutdown`.
async fn run_until<F: Future>(
    manager: &FileClassManager,
    events: &mut mpsc::UnboundedReceiver<NoteEvent>,
    shutdown: F,
) -> bool {
    let mut status = tokio::time::interval(Duration::from_secs(60));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => manager.handle_event(event),
                None => {
                    warn!("Watcher stopped");
                    return false;
                }
            },
            _ = status.tick() => debug!("{:?}", manager.stats()),
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                return true;
            }
        }
    }
}
