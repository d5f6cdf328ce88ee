//! CLI module
//!
//! Command-line interface for the extractor.
//!
//! # Commands
//!
//! - `check` - Test credentials and API reachability
//! - `streams` - List the stream catalog
//! - `read` - Extract data from streams

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
