//! slugforge CLI: classify, tag and slug CJK articles for publishing.
//!
//! Reads raw documents as JSON, assigns a category, picks tags and builds an
//! English URL slug for each, translating terms through a cached set of
//! public translation backends.

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
