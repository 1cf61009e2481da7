//! SeoForge CLI: turn a keyword sheet and a sitemap into a ready-to-publish
//! SEO article.
//!
//! Picks a keyword, studies the competition, plans the article, and writes
//! it as Markdown and HTML.

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
