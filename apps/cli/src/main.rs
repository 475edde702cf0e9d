//! docsetter CLI: package statically generated documentation as a docset.
//!
//! Rewrites a built site for offline browsing, adds table-of-contents
//! anchors and builds the searchable index from the site's navigation.

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
