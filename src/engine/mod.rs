//! Extraction engine
//!
//! Drives the full extraction for every stream in the catalog. Per
//! (stream, context) instance the flow is: enumerate partitions if the
//! stream declares any, then paginate each partition to exhaustion, emit
//! every record, and for hierarchical streams run each child's full flow
//! per parent record, depth-first, before moving to the next parent record.
//!
//! The traversal is single-threaded and sequential: exactly one request is
//! in flight at a time. Records are emitted in server order within a page,
//! pages in ascending page-number order, partitions oldest first. The
//! active (context, partition) pair is threaded explicitly through every
//! call; nothing is smuggled through instance state.

mod types;

pub use types::{SyncConfig, SyncStats};

use crate::config::ConnectorConfig;
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::output::RecordSink;
use crate::pagination::{PageNumberPaginator, PaginationState};
use crate::params::{build_params, Context, ParamScope};
use crate::partition::Partition;
use crate::state::StateStore;
use crate::streams::{record_field, Catalog, CrossEnumeration, StreamSpec};
use crate::types::{JsonValue, RawRecord};
use chrono::{NaiveDate, Utc};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info};

/// Orchestrates extraction across the stream graph
pub struct Pipeline<'a> {
    /// Request execution collaborator
    transport: &'a dyn Transport,
    /// Stream definitions and dependency graph
    catalog: &'a Catalog,
    /// Connector configuration
    config: &'a ConnectorConfig,
    /// Replication cursor store
    state: &'a mut StateStore,
    /// Output boundary
    sink: &'a mut dyn RecordSink,
    /// Run configuration
    run_config: SyncConfig,
    /// Statistics
    stats: SyncStats,
    /// Upper bound for partition enumeration
    today: NaiveDate,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline over the given collaborators
    pub fn new(
        transport: &'a dyn Transport,
        catalog: &'a Catalog,
        config: &'a ConnectorConfig,
        state: &'a mut StateStore,
        sink: &'a mut dyn RecordSink,
    ) -> Self {
        Self {
            transport,
            catalog,
            config,
            state,
            sink,
            run_config: SyncConfig::default(),
            stats: SyncStats::default(),
            today: Utc::now().date_naive(),
        }
    }

    /// Set the run configuration
    #[must_use]
    pub fn with_sync_config(mut self, run_config: SyncConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Override the date bounding partition enumeration
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Run every selected root stream.
    ///
    /// Root streams are independent: a failure aborts that stream and its
    /// descendants but records already emitted stay emitted and sibling
    /// streams continue, unless `fail_fast` is set.
    pub async fn run(&mut self) -> Result<SyncStats> {
        let start = Instant::now();

        let roots: Vec<StreamSpec> = self
            .catalog
            .roots()
            .filter(|s| self.run_config.is_selected(s.name))
            .copied()
            .collect();

        for spec in roots {
            info!(stream = spec.name, "syncing stream");
            match self.run_stream(spec, None).await {
                Ok(()) => self.stats.add_stream(),
                Err(e) => {
                    self.stats.add_error();
                    error!(
                        stream = spec.name,
                        error = %e,
                        "stream failed, remaining work for it and its descendants aborted"
                    );
                    if self.run_config.fail_fast {
                        return Err(e);
                    }
                }
            }
        }

        self.sink.flush()?;
        self.state.save()?;
        self.stats.set_duration(start.elapsed().as_millis() as u64);
        Ok(self.stats.clone())
    }

    /// Run one stream instance for one inherited context (or none).
    ///
    /// Boxed because child streams recurse back into this from the page
    /// loop.
    fn run_stream<'b>(
        &'b mut self,
        spec: StreamSpec,
        context: Option<Context>,
    ) -> BoxFuture<'b, Result<()>> {
        Box::pin(async move {
            match self.resolve_partitions(spec).await? {
                Some(partitions) => {
                    for partition in partitions {
                        debug!(
                            stream = spec.name,
                            partition = %partition.id,
                            "processing partition"
                        );
                        self.page_loop(spec, context.as_ref(), Some(&partition)).await?;
                        self.stats.add_partition();
                    }
                }
                None => self.page_loop(spec, context.as_ref(), None).await?,
            }
            Ok(())
        })
    }

    /// Paginate one (stream, context, partition) combination to exhaustion.
    ///
    /// Pages are fetched lazily, one at a time; a page's records are
    /// dropped before the next page is requested.
    async fn page_loop(
        &mut self,
        spec: StreamSpec,
        context: Option<&Context>,
        partition: Option<&Partition>,
    ) -> Result<()> {
        let paginator = PageNumberPaginator::new(self.config.page_size);
        let mut page_state = PaginationState::start();
        let start_date = self.effective_start_date(&spec);
        let children: Vec<StreamSpec> = self
            .catalog
            .children_of(spec.name)
            .into_iter()
            .copied()
            .collect();

        loop {
            let scope = ParamScope {
                stream: spec.name,
                context,
                partition,
            };
            let params = build_params(
                page_state.page,
                spec.replication_key,
                start_date.as_deref(),
                spec.params,
                &scope,
            )?;

            let body = self.transport.fetch(spec.path, params.as_map()).await?;
            self.stats.add_page();

            let records = extract_records(spec.name, body)?;
            let count = records.len();
            debug!(
                stream = spec.name,
                page = page_state.page,
                records = count,
                "fetched page"
            );

            for raw in records {
                let record = match spec.post_process {
                    Some(transform) => match transform(raw) {
                        Some(record) => record,
                        None => continue,
                    },
                    None => raw,
                };

                if let Some(key) = spec.replication_key {
                    if let Some(value) = record_field(&record, key) {
                        self.state.advance_cursor(spec.name, &value);
                    }
                }

                self.sink.write(spec.name, &record)?;
                self.stats.add_record();

                // Children run to completion before the next parent record
                if let Some(derive) = spec.child_context {
                    if !children.is_empty() {
                        let child_context = derive(&record)?;
                        for child in &children {
                            self.run_stream(*child, Some(child_context.clone())).await?;
                        }
                    }
                }
            }

            if paginator.next(count, &mut page_state).is_done() {
                break;
            }
        }

        Ok(())
    }

    /// Resolve the partition list for a stream, or `None` when the stream
    /// is unpartitioned.
    ///
    /// A declared partition sequence is enumerated from the configured
    /// start date (malformed start dates surface here). A cross-enumerated
    /// sibling dimension is fetched first and crossed with the declared
    /// sequence.
    async fn resolve_partitions(&mut self, spec: StreamSpec) -> Result<Option<Vec<Partition>>> {
        let declared = match spec.partitions {
            Some(partitions) => {
                let start = self.config.start_date_parsed()?;
                Some(partitions.enumerate(start, self.today)?)
            }
            None => None,
        };

        let Some(cross) = spec.cross_enumerate else {
            return Ok(declared);
        };

        let values = self.cross_values(spec.name, cross).await?;
        let combined = match declared {
            Some(partitions) => {
                let mut out = Vec::with_capacity(values.len() * partitions.len());
                for value in &values {
                    for partition in &partitions {
                        let mut crossed = Partition::new(format!("{value}:{}", partition.id));
                        crossed.values.extend(
                            partition
                                .values
                                .iter()
                                .map(|(k, v)| (k.clone(), v.clone())),
                        );
                        crossed
                            .values
                            .insert(cross.partition_key.to_string(), value.clone());
                        out.push(crossed);
                    }
                }
                out
            }
            None => values
                .iter()
                .map(|value| Partition::new(value).with_value(cross.partition_key, value))
                .collect(),
        };

        Ok(Some(combined))
    }

    /// Enumerate a sibling stream's full record set out of band and
    /// collect the distinct values of the configured field, in first-seen
    /// order.
    async fn cross_values(&mut self, stream: &str, cross: CrossEnumeration) -> Result<Vec<String>> {
        let sibling = *self.catalog.get(cross.stream)?;
        info!(
            stream,
            sibling = sibling.name,
            "cross-enumerating sibling stream for a derived dimension; the sibling \
             also runs as its own top-level stream"
        );

        let paginator = PageNumberPaginator::new(self.config.page_size);
        let mut page_state = PaginationState::start();
        let scope = ParamScope::bare(sibling.name);
        let mut seen = HashSet::new();
        let mut values = Vec::new();

        loop {
            // Full record set: no date filter, no cursor
            let params = build_params(
                page_state.page,
                sibling.replication_key,
                None,
                sibling.params,
                &scope,
            )?;
            let body = self.transport.fetch(sibling.path, params.as_map()).await?;
            self.stats.add_page();

            let records = extract_records(sibling.name, body)?;
            let count = records.len();
            for record in &records {
                if let Some(value) = record_field(record, cross.value_field) {
                    if seen.insert(value.clone()) {
                        values.push(value);
                    }
                }
            }

            if paginator.next(count, &mut page_state).is_done() {
                break;
            }
        }

        Ok(values)
    }

    /// Lower bound for the generic date filter: the stored replication
    /// cursor when it is later than the configured start date.
    fn effective_start_date(&self, spec: &StreamSpec) -> Option<String> {
        let configured = self.config.start_date.clone();
        let cursor = spec
            .replication_key
            .and_then(|_| self.state.cursor(spec.name))
            .map(str::to_string);

        match (configured, cursor) {
            (Some(configured), Some(cursor)) => Some(configured.max(cursor)),
            (configured, cursor) => cursor.or(configured),
        }
    }
}

/// Extract records from a response body.
///
/// The body must be a JSON array of objects, or an object carrying exactly
/// one array at the document root. Anything else is fatal for the request;
/// there is no partial-page recovery.
pub fn extract_records(stream: &str, body: JsonValue) -> Result<Vec<RawRecord>> {
    let items = match body {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => {
            let mut arrays: Vec<Vec<JsonValue>> = map
                .into_iter()
                .filter_map(|(_, value)| match value {
                    JsonValue::Array(items) => Some(items),
                    _ => None,
                })
                .collect();
            if arrays.len() == 1 {
                arrays.pop().unwrap()
            } else {
                return Err(Error::extraction(
                    stream,
                    "expected a single array at the document root",
                ));
            }
        }
        other => {
            return Err(Error::extraction(
                stream,
                format!("expected a top-level array, got {}", json_type(&other)),
            ))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            JsonValue::Object(record) => Ok(record),
            other => Err(Error::extraction(
                stream,
                format!("expected object records, got {}", json_type(&other)),
            )),
        })
        .collect()
}

/// Human-readable JSON type name for error messages
fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests;
