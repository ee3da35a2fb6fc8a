//! Researcher CLI: product research ingestion and scheduling.
//!
//! Discovers sources for a topic, fetches and stores them, and turns them
//! into summaries and a Markdown report, once or on a schedule.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
