//! DiscForge CLI - Command-line interface for disc image expansion

pub mod commands;
pub mod progress;

use clap::Parser;
use commands::Commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "discforge")]
#[command(about = "DiscForge: expand and patch PSX/PSP disc images", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the DiscForge CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging; RUST_LOG selects the level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
