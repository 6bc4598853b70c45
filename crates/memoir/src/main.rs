//! memoir - client memory CLI
//!
//! Thin operator front end over memoir-core: list clients, inspect stored
//! memory, and run context preparation or session finalization by hand.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("memoir=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = config::Config::load()?;

    match cli.command {
        Commands::Clients(cmd) => commands::clients::execute(cmd, &config),
        Commands::Show(cmd) => commands::show::execute(cmd, &config),
        Commands::Context { client, message, json } => {
            commands::context::execute(&client, &message, json, &config).await
        }
        Commands::Finalize { client, transcript, json } => {
            commands::finalize::execute(&client, &transcript, json, &config).await
        }
        Commands::Version => {
            println!("memoir {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
