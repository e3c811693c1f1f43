use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "classwatch",
    version,
    about = "Classwatch - React when a note's file class changes",
    long_about = "Classwatch watches a vault of markdown notes and reports every note whose file class (the `fileClass` frontmatter field by default) changes, debounced and without reacting to its own follow-up edits."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a vault and report file class changes
    #[command(about = "Watch a vault and report file class changes until interrupted")]
    Watch(WatchArgs),

    /// Show the persisted fingerprint cache
    #[command(about = "Show the persisted fingerprint cache of a vault")]
    Inspect(InspectArgs),

    /// Compute the state of a single note
    #[command(about = "Compute the fingerprint and file class of a single note")]
    State(StateArgs),
}

#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Vault root directory
    #[arg(default_value = ".")]
    pub vault: PathBuf,

    /// Keep the fingerprint cache in memory only
    #[arg(long)]
    pub no_persist: bool,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Vault root directory
    #[arg(default_value = ".")]
    pub vault: PathBuf,

    /// Print the cache as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct StateArgs {
    /// Note file
    pub note: PathBuf,
}
