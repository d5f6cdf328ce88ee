//! State types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Replication state for the whole connector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state keyed by stream name
    #[serde(default)]
    pub streams: HashMap<String, StreamState>,
}

/// Replication state for one stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamState {
    /// Highest replication-key value emitted so far
    #[serde(default)]
    pub cursor: Option<String>,
}

impl State {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cursor for a stream
    pub fn cursor(&self, stream: &str) -> Option<&str> {
        self.streams
            .get(stream)
            .and_then(|s| s.cursor.as_deref())
    }

    /// Advance the cursor for a stream; keeps the maximum of the current
    /// and the new value. Returns true if the cursor moved.
    pub fn advance_cursor(&mut self, stream: &str, value: &str) -> bool {
        let entry = self.streams.entry(stream.to_string()).or_default();
        match &entry.cursor {
            Some(current) if current.as_str() >= value => false,
            _ => {
                entry.cursor = Some(value.to_string());
                true
            }
        }
    }
}
