//! TideWAL CLI
//!
//! Command-line tools for TideWAL transaction logs.
//!
//! # Commands
//!
//! - `inspect` - Display segments, latest checkpoint and bookkeeping
//! - `dump-log` - Dump log entries for debugging
//! - `verify` - Verify log integrity
//! - `plan` - Show what a recovery would replay, without changing anything

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidewal_core::DEFAULT_BATCH_SIZE;
use tracing_subscriber::EnvFilter;

/// TideWAL command-line log tools.
#[derive(Parser)]
#[command(name = "tidewal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
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
    /// Display segments, latest checkpoint and bookkeeping
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump log entries for debugging
    DumpLog {
        /// Segment to start in (defaults to the oldest)
        #[arg(long)]
        log_version: Option<u64>,

        /// Start from this offset within the segment
        #[arg(short, long)]
        offset: Option<u64>,

        /// Maximum number of entries to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify log integrity
    Verify,

    /// Show what a recovery would replay, without changing anything
    Plan {
        /// Transactions per applied batch
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::DumpLog {
            log_version,
            offset,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Log path required for dump-log")?;
            commands::dump_log::run(&path, log_version, offset, limit, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Plan { batch_size, format } => {
            let path = cli.path.ok_or("Log path required for plan")?;
            commands::plan::run(&path, batch_size, &format)?;
        }
        Commands::Version => {
            println!("TideWAL CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("TideWAL Core v{}", tidewal_core::VERSION);
        }
    }

    Ok(())
}
