mod adapters;
mod api;
mod cli;
mod config;
mod dates;
mod db;
mod error;
mod fetch;
mod grading;
mod models;
mod normalize;
mod scheduler;
mod scoring;
mod snapshot;
mod worker;

use clap::Parser;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();

    let cli = Cli::parse();
    cli::run(cli, config).await
}
