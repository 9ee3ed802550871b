//! SowTrace CLI — source-of-wealth narrative structuring tool.
//!
//! Converts upstream-extracted candidate lists into canonical,
//! deduplicated, chain-resolved, completeness-scored reports for
//! compliance review.

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
