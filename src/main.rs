#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use stylegen::Config;
use stylegen::cli::Cli;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load_or_init()?;
    stylegen::app::dispatch::dispatch(cli, config).await
}
