mod auth;
mod cli;
mod config;
mod engine;
mod error;
mod gitlab;
mod output;
mod server;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = config::load_dotenv(&std::env::current_dir()?)?;
    env_logger::init();

    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting pipeline-sweeper");
    cli.execute().await?;

    Ok(())
}
