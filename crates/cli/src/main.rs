mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use transflow_core::config::{load_dotenv, Config};

use crate::cli::Cli;
use crate::commands::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(rules_dir) = cli.rules_dir {
        if cli.versions_dir.is_none() {
            config.storage.versions_dir = rules_dir.join("versions");
        }
        config.storage.rules_dir = rules_dir;
    }
    if let Some(versions_dir) = cli.versions_dir {
        config.storage.versions_dir = versions_dir;
    }
    config.log_summary();

    let app = App::build(config).await?;
    app.dispatch(cli.command).await
}
