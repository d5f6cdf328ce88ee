//! State store implementation
//!
//! File-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Loads, mutates, and persists replication state
#[derive(Debug)]
pub struct StateStore {
    /// Path to the state file; `None` for in-memory stores
    path: Option<PathBuf>,
    /// Current state
    state: State,
}

impl StateStore {
    /// Create an in-memory store (no persistence)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: State::new(),
        }
    }

    /// Create a store backed by a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
        } else {
            State::new()
        };

        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// Get the cursor for a stream
    pub fn cursor(&self, stream: &str) -> Option<&str> {
        self.state.cursor(stream)
    }

    /// Advance the cursor for a stream (max-wins). Returns true if moved.
    pub fn advance_cursor(&mut self, stream: &str, value: &str) -> bool {
        self.state.advance_cursor(stream, value)
    }

    /// Borrow the full state
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Persist the state. Writes to a temporary file and renames so a
    /// crash never leaves a half-written state file. No-op for in-memory
    /// stores.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&self.state)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, contents)
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| Error::state(format!("Failed to replace state file: {e}")))?;
        Ok(())
    }
}
