//! # visma-extract
//!
//! Incremental extractor for the Visma.net Financials REST API.
//!
//! ## Features
//!
//! - **OAuth2 client credentials**: token fetched once per run and cached
//! - **Page-number pagination**: every list endpoint walked to exhaustion
//! - **Hierarchical streams**: parent records feed context into child
//!   stream requests (branch → budgets, general ledger transactions)
//! - **Bounded partitions**: year-month periods and financial years stand
//!   in for date filters the API does not accept
//! - **Incremental sync**: per-stream replication cursors tighten the
//!   `lastModifiedDateTime` lower bound on later runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use visma_extract::auth::{Authenticator, OAuthConfig};
//! use visma_extract::config::ConnectorConfig;
//! use visma_extract::engine::Pipeline;
//! use visma_extract::http::{HttpClient, HttpClientConfig};
//! use visma_extract::output::JsonLinesSink;
//! use visma_extract::state::StateStore;
//! use visma_extract::streams::visma_catalog;
//!
//! #[tokio::main]
//! async fn main() -> visma_extract::Result<()> {
//!     let config = ConnectorConfig::from_env()?;
//!     let auth = Authenticator::new(OAuthConfig::from_connector(&config));
//!     let client = HttpClient::with_auth(HttpClientConfig::from_connector(&config), auth);
//!
//!     let catalog = visma_catalog();
//!     let mut state = StateStore::in_memory();
//!     let mut sink = JsonLinesSink::stdout();
//!
//!     let stats = Pipeline::new(&client, &catalog, &config, &mut state, &mut sink)
//!         .run()
//!         .await?;
//!     eprintln!("{} records", stats.records_emitted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Pipeline                             │
//! │  per stream: partitions → pages → records → children        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────┬──────────┬──────┴──────┬────────────┬────────────┐
//! │   Auth   │   HTTP   │  Paginate   │ Partition  │   Output   │
//! ├──────────┼──────────┼─────────────┼────────────┼────────────┤
//! │ OAuth2   │ GET      │ Page number │ Period     │ JSON lines │
//! │ cached   │ Retry    │ short-page  │ Fin. year  │ Memory     │
//! │ token    │ Backoff  │ stop rule   │ Ledger ×   │            │
//! │          │ Rate lim │             │ year cross │            │
//! └──────────┴──────────┴─────────────┴────────────┴────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(missing_docs)] // TODO: document the error variants before 1.0

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the extractor
pub mod error;

/// Common types and type aliases
pub mod types;

/// Connector configuration
pub mod config;

/// OAuth2 authentication
pub mod auth;

/// HTTP transport with retry and rate limiting
pub mod http;

/// Page-number pagination
pub mod pagination;

/// Partition enumeration (periods, financial years)
pub mod partition;

/// Request parameter construction
pub mod params;

/// Stream definitions and the stream graph
pub mod streams;

/// Replication state
pub mod state;

/// Output boundary
pub mod output;

/// Extraction engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
