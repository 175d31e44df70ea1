use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "secondcheck")]
#[command(about = "Automated second-check verification for ERP job documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the verification service (HTTP API + listener pool)
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the API server to (overrides config)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Root directory for persistent state (overrides config)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}
