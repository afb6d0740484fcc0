//! docingest CLI
//!
//! Command-line tools for building and submitting transaction entries.
//!
//! # Commands
//!
//! - `encode` - Encode a JSON operation list and show the canonical entry
//! - `submit` - Submit a JSON operation list to an in-memory log

mod commands;
mod ops_json;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docingest command-line tools.
#[derive(Parser)]
#[command(name = "docingest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format shared by all commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode operations and print the canonical entry
    Encode {
        /// JSON file with the operation list ("-" for stdin)
        #[arg(short, long)]
        ops: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Submit operations to an in-memory log
    Submit {
        /// JSON file with the operation list ("-" for stdin)
        #[arg(short, long)]
        ops: PathBuf,

        /// Use the non-blocking submission path
        #[arg(short = 'a', long = "async")]
        use_async: bool,

        /// Submit the same operations this many times
        #[arg(short, long, default_value = "1")]
        repeat: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Encode { ops, format } => {
            commands::encode::run(&ops, format)?;
        }
        Commands::Submit {
            ops,
            use_async,
            repeat,
            format,
        } => {
            commands::submit::run(&ops, use_async, repeat, format)?;
        }
        Commands::Version => {
            println!("docingest CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
