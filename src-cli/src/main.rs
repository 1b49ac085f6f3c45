//! Vibe Reader - command-line host for the annotation engine
//!
//! Mounts chapter XHTML into a reading container, replays the annotations
//! stored for the book, and applies one command to them.

mod cli;
mod commands;
mod state;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so rendered output stays pipeable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::Cli::parse();
    tracing::debug!("Data directory: {:?}", cli.data_dir);

    let output = commands::run(cli).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
