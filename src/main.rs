mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use secondcheck::api;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => api::run(args.address, args.data_dir).await?,
    }

    Ok(())
}
