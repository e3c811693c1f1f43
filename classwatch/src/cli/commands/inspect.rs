//! Show the persisted fingerprint cache of a vault

use super::watch::cache_path;
use crate::cli::app::InspectArgs;
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use classwatch_core::{EngineConfig, FingerprintCache, FingerprintEntry, JsonFileStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct Row<'a> {
    note: &'a str,
    file_class: &'a str,
    fingerprint: &'a str,
    modified: String,
}

fn timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

fn row<'a>(id: &'a str, entry: &'a FingerprintEntry) -> Row<'a> {
    Row {
        note: id,
        file_class: &entry.file_class,
        fingerprint: &entry.fingerprint,
        modified: timestamp(entry.last_modified_time),
    }
}

pub async fn execute(args: InspectArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = EngineConfig::resolve(config_path.as_deref(), Some(&args.vault))?;
    let path = cache_path(&args.vault, &config);

    let cache = FingerprintCache::new(Arc::new(JsonFileStore::new(&path)), config.save_interval());
    cache.load().await;
    let entries = cache.snapshot();

    if args.json {
        let rows: Vec<Row<'_>> = entries.iter().map(|(id, entry)| row(id, entry)).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No cached notes in {}", path.display());
        return Ok(());
    }

    println!("Fingerprint cache: {}", path.display());
    println!("═══════════════════════════════════════");
    for (id, entry) in &entries {
        let r = row(id, entry);
        let class = if r.file_class.is_empty() { "-" } else { r.file_class };
        println!("{:<40} {:<16} {}  {}", r.note, class, r.modified, &r.fingerprint[..r.fingerprint.len().min(12)]);
    }
    println!("═══════════════════════════════════════");
    println!("{} notes", entries.len());

    Ok(())
}
