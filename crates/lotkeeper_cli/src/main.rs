//! Lotkeeper CLI
//!
//! Command-line tools for inspecting a Lotkeeper offline store.
//!
//! # Commands
//!
//! - `queue` - List pending and failed sync queue items
//! - `retry` - Move a failed queue item back to pending
//! - `inspect` - Display per-collection record counts

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Lotkeeper offline store command-line tools.
#[derive(Parser)]
#[command(name = "lotkeeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pending and failed sync queue items
    Queue {
        /// Show only failed items
        #[arg(short, long)]
        failed: bool,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Move a failed queue item back to pending
    Retry {
        /// Queue item id
        id: Uuid,
    },

    /// Display per-collection record counts
    Inspect {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Queue { failed, format } => {
            let path = cli.path.ok_or("Store path required for queue")?;
            commands::queue::run(&path, failed, &format)?;
        }
        Commands::Retry { id } => {
            let path = cli.path.ok_or("Store path required for retry")?;
            commands::retry::run(&path, id)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Version => {
            println!("Lotkeeper CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
