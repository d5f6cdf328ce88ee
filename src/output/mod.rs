//! Output boundary
//!
//! Every extracted record is handed off keyed by stream name as a mapping
//! of field name to JSON value. The [`RecordSink`] trait is the seam; the
//! built-in sinks write JSON lines or collect records in memory.

use crate::error::Result;
use crate::types::OutputRecord;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

/// Receives extracted records, keyed by stream name
pub trait RecordSink: Send {
    /// Write one record
    fn write(&mut self, stream: &str, record: &OutputRecord) -> Result<()>;

    /// Flush any buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One line of JSON-lines output
#[derive(Debug, Serialize)]
struct RecordLine<'a> {
    stream: &'a str,
    record: &'a OutputRecord,
}

/// Writes each record as one JSON line: `{"stream": ..., "record": {...}}`
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Create a sink writing to the given writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consume the sink and return the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    /// Create a sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, stream: &str, record: &OutputRecord) -> Result<()> {
        let line = RecordLine { stream, record };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects records per stream in memory; used by tests and the runner's
/// summary output
#[derive(Debug, Default)]
pub struct MemorySink {
    records: HashMap<String, Vec<OutputRecord>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records collected for a stream, in emission order
    pub fn records(&self, stream: &str) -> &[OutputRecord] {
        self.records.get(stream).map_or(&[], Vec::as_slice)
    }

    /// Total record count across all streams
    pub fn total(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Stream names that received at least one record
    pub fn streams(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, stream: &str, record: &OutputRecord) -> Result<()> {
        self.records
            .entry(stream.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}
