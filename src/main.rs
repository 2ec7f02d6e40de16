mod cli;
mod config;
mod dashboard;
mod db;
mod embedding;
mod error;
mod extract;
mod improve;
mod knowledge;
mod server;
mod session;
mod similarity;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engram", version, about = "Persistent knowledge MCP server for AI coding assistants")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Start the read-only web dashboard
    Dashboard,
    /// Print store statistics
    Stats,
    /// Export all non-purged records as JSON
    Export {
        /// Export only this project
        #[arg(long)]
        project: Option<String>,
        /// Print to stdout only, skip the snapshot file
        #[arg(long)]
        no_save: bool,
    },
    /// Run the retention sweeps (dry-run by default)
    Forget {
        /// Apply the sweep instead of previewing it
        #[arg(long)]
        apply: bool,
    },
    /// Merge near-duplicate records (dry-run by default)
    Consolidate {
        /// Consolidate only this project
        #[arg(long)]
        project: Option<String>,
        /// Apply the merges instead of previewing them
        #[arg(long)]
        apply: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::EngramConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve_stdio(config).await?;
        }
        Command::Dashboard => {
            dashboard::serve_dashboard(config).await?;
        }
        Command::Stats => {
            cli::stats::show_stats(&config)?;
        }
        Command::Export { project, no_save } => {
            cli::export::export(&config, project.as_deref(), no_save)?;
        }
        Command::Forget { apply } => {
            cli::maintenance::forget(&config, apply)?;
        }
        Command::Consolidate { project, apply } => {
            cli::maintenance::consolidate(&config, project.as_deref(), apply)?;
        }
    }

    Ok(())
}
