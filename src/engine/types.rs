//! Engine types
//!
//! Run configuration and statistics for the extraction pipeline.

/// Configuration for one extraction run
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Abort the whole run on the first stream failure instead of
    /// continuing with sibling streams
    pub fail_fast: bool,
    /// Restrict the run to these root streams (empty = all)
    pub select: Vec<String>,
}

impl SyncConfig {
    /// Create a default run config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fail fast mode
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Restrict the run to the given root streams
    #[must_use]
    pub fn with_select(mut self, select: Vec<String>) -> Self {
        self.select = select;
        self
    }

    /// Whether the given stream is selected for this run
    pub fn is_selected(&self, stream: &str) -> bool {
        self.select.is_empty() || self.select.iter().any(|s| s == stream)
    }
}

/// Statistics from an extraction run
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total records emitted
    pub records_emitted: usize,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Root streams completed
    pub streams_synced: usize,
    /// Partitions fully paginated
    pub partitions_synced: usize,
    /// Root streams that failed
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an emitted record
    pub fn add_record(&mut self) {
        self.records_emitted += 1;
    }

    /// Add a fetched page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a completed root stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a completed partition
    pub fn add_partition(&mut self) {
        self.partitions_synced += 1;
    }

    /// Add a failed root stream
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
