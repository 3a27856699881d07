mod cache;
mod commands;
mod config;
mod llm;
mod research;
mod search;
mod text;

use clap::Parser;
use tracing::Level;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    // Load env
    let _ = dotenv::dotenv();

    commands::run(cli).await
}
