//! Compute the state of a single note

use crate::cli::app::StateArgs;
use anyhow::{Context, Result, bail};
use classwatch_core::monitor::{StateComputer, VaultIndex};
use classwatch_core::{EngineConfig, FieldClassResolver};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn execute(args: StateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let note = args
        .note
        .canonicalize()
        .with_context(|| format!("Note not found: {}", args.note.display()))?;
    let (Some(dir), Some(name)) = (note.parent(), note.file_name()) else {
        bail!("Not a note file: {}", note.display());
    };

    let config = EngineConfig::resolve(config_path.as_deref(), None)?;
    let index = Arc::new(VaultIndex::new(dir));
    let id = name.to_string_lossy();

    let Some(snapshot) = index.refresh(&id).await? else {
        bail!("Could not read {}", note.display());
    };

    let states = StateComputer::new(index, Arc::new(FieldClassResolver::new(config.class_field)));
    let entry = states.compute(&snapshot.note, Some(&snapshot.metadata));

    println!("Note:        {}", note.display());
    println!("File class:  {}", if entry.file_class.is_empty() { "(none)" } else { entry.file_class.as_str() });
    println!("Fingerprint: {}", entry.fingerprint);
    println!("Modified:    {}", entry.last_modified_time);
    if snapshot.metadata.frontmatter.is_none() {
        println!("(no frontmatter; this note would be ignored)");
    }

    Ok(())
}
