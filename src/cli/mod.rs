//! `revq` command-line runner.

mod fetch;
mod sites;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub use fetch::FetchArgs;

#[derive(Parser)]
#[command(name = "revq")]
#[command(about = "Harvest product reviews from e-commerce pages")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest reviews for one product URL and write them as JSON
    Fetch(FetchArgs),

    /// List registered sites
    Sites,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Fetch(args) => fetch::cmd_fetch(&settings, args).await,
        Commands::Sites => sites::cmd_sites(&settings),
    }
}
