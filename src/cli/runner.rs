//! CLI runner - executes commands

use crate::auth::{Authenticator, OAuthConfig};
use crate::cli::commands::{Cli, Commands};
use crate::config::ConnectorConfig;
use crate::engine::{Pipeline, SyncConfig};
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig};
use crate::output::{JsonLinesSink, RecordSink};
use crate::state::StateStore;
use crate::streams::visma_catalog;
use crate::types::StringMap;
use std::path::PathBuf;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Streams => self.streams(),
            Commands::Read {
                streams,
                output,
                fail_fast,
            } => self.read(streams.as_deref(), output.clone(), *fail_fast).await,
        }
    }

    /// Load configuration from the given file or the environment
    fn load_config(&self) -> Result<ConnectorConfig> {
        match &self.cli.config {
            Some(path) => ConnectorConfig::from_file(path),
            None => ConnectorConfig::from_env(),
        }
    }

    /// Build the authenticated HTTP client for one run
    fn build_client(&self, config: &ConnectorConfig) -> HttpClient {
        let authenticator = Authenticator::new(OAuthConfig::from_connector(config));
        HttpClient::with_auth(HttpClientConfig::from_connector(config), authenticator)
    }

    /// Test credentials and API reachability with a single probe request
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = self.build_client(&config);

        let mut params = StringMap::new();
        params.insert("pageNumber".to_string(), "1".to_string());
        client.get_json("/v1/ledger", &params).await?;

        println!("Connection OK");
        Ok(())
    }

    /// List the stream catalog
    fn streams(&self) -> Result<()> {
        for name in visma_catalog().names() {
            println!("{name}");
        }
        Ok(())
    }

    /// Extract data from the selected streams
    async fn read(
        &self,
        streams: Option<&str>,
        output: Option<PathBuf>,
        fail_fast: bool,
    ) -> Result<()> {
        let config = self.load_config()?;
        let catalog = visma_catalog();
        let client = self.build_client(&config);

        let mut state = match &self.cli.state {
            Some(path) => StateStore::from_file(path)?,
            None => StateStore::in_memory(),
        };

        let mut sink: Box<dyn RecordSink> = match output {
            Some(path) => Box::new(JsonLinesSink::new(std::fs::File::create(path)?)),
            None => Box::new(JsonLinesSink::stdout()),
        };

        let select = streams
            .map(|s| {
                s.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let sync_config = SyncConfig::new()
            .with_fail_fast(fail_fast)
            .with_select(select);

        let stats = Pipeline::new(&client, &catalog, &config, &mut state, sink.as_mut())
            .with_sync_config(sync_config)
            .run()
            .await?;

        info!(
            records = stats.records_emitted,
            pages = stats.pages_fetched,
            streams = stats.streams_synced,
            partitions = stats.partitions_synced,
            errors = stats.errors,
            duration_ms = stats.duration_ms,
            "extraction finished"
        );
        eprintln!(
            "Synced {} records across {} streams ({} pages, {} partitions, {} errors) in {}ms",
            stats.records_emitted,
            stats.streams_synced,
            stats.pages_fetched,
            stats.partitions_synced,
            stats.errors,
            stats.duration_ms
        );
        Ok(())
    }
}
