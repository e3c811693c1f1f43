use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments first to get verbosity level
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    debug!("Command: {:?}", cli.command);

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Watch(args) => runtime.block_on(cli::commands::watch::execute(args, cli.config)),
        Commands::Inspect(args) => {
            runtime.block_on(cli::commands::inspect::execute(args, cli.config))
        }
        Commands::State(args) => runtime.block_on(cli::commands::state::execute(args, cli.config)),
    }
}
