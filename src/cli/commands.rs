//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Visma.net Financials extractor CLI
#[derive(Parser, Debug)]
#[command(name = "visma-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON); falls back to VISMA_* environment
    /// variables when omitted
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (JSON); omitted = in-memory state for this run only
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test credentials and API reachability
    Check,

    /// List available stream names
    Streams,

    /// Extract data from streams
    Read {
        /// Streams to extract (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,

        /// Output file (JSON lines); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Abort the whole run on the first stream failure
        #[arg(long)]
        fail_fast: bool,
    },
}
