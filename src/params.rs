//! Request parameter construction
//!
//! Builds the query parameters for one page fetch from the pagination
//! state, the stream's replication key, the configured start date, and the
//! active (context, partition) pair. Layers apply in order and later layers
//! may remove or override earlier keys:
//!
//! 1. pagination (`pageNumber`)
//! 2. replication ordering (`sort=asc`, `order_by=<key>`)
//! 3. start-date filter (`lastModifiedDateTime` with a `>=` comparator)
//! 4. stream-specific override
//!
//! The builder only reads its inputs; calling it twice with identical
//! inputs yields identical maps.

use crate::error::{Error, Result};
use crate::pagination::PAGE_PARAM;
use crate::partition::Partition;
use crate::types::StringMap;
use std::collections::BTreeMap;

/// Query parameter carrying the replication date filter
pub const MODIFIED_SINCE_PARAM: &str = "lastModifiedDateTime";

/// Query parameter carrying the date filter comparator
pub const MODIFIED_SINCE_CONDITION_PARAM: &str = "lastModifiedDateTimeCondition";

/// URL-encoded `>=` comparator token
pub const GREATER_OR_EQUAL: &str = "%3E%3D";

// ============================================================================
// Context
// ============================================================================

/// Data inherited from a parent record, consumed by child request
/// construction. Created per parent record, passed by value, immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add a value (builder style)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Check if the context has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the context values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ============================================================================
// Request Parameters
// ============================================================================

/// The query parameter map under construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    params: StringMap,
}

impl RequestParams {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any existing value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Remove a parameter
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    /// Remove every parameter set so far
    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// Get a parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Check whether a parameter is present
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Consume into the underlying map for the transport layer
    pub fn into_map(self) -> StringMap {
        self.params
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &StringMap {
        &self.params
    }
}

// ============================================================================
// Parameter Scope
// ============================================================================

/// The (context, partition) pair active for the current page fetch.
///
/// Lookups fail loudly: a stream override asking for a context key that was
/// never provided is a graph-wiring defect, not a condition to default away.
#[derive(Debug, Clone, Copy)]
pub struct ParamScope<'a> {
    /// Stream the parameters are being built for (used in errors)
    pub stream: &'a str,
    /// Context inherited from the parent record, if any
    pub context: Option<&'a Context>,
    /// Active partition, if the stream is partitioned
    pub partition: Option<&'a Partition>,
}

impl<'a> ParamScope<'a> {
    /// Scope with neither context nor partition
    pub fn bare(stream: &'a str) -> Self {
        Self {
            stream,
            context: None,
            partition: None,
        }
    }

    /// Look up a context key, failing if the key (or the whole context) is
    /// absent
    pub fn require_context(&self, key: &str) -> Result<&'a str> {
        self.context
            .and_then(|ctx| ctx.get(key))
            .ok_or_else(|| Error::missing_context(self.stream, key))
    }

    /// Look up a partition value, failing if no partition is active or the
    /// key is missing
    pub fn require_partition_value(&self, key: &str) -> Result<&'a str> {
        self.partition
            .and_then(|p| p.get(key))
            .ok_or_else(|| Error::missing_partition(self.stream, key))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// A stream-specific parameter override.
///
/// Runs after the shared layers and may delete any of their keys (drop
/// pagination, replace the generic date filter with a period filter) and
/// add its own keys derived from the scope.
pub type ParamOverrideFn = fn(&mut RequestParams, &ParamScope<'_>) -> Result<()>;

/// Build the full parameter map for one page fetch
pub fn build_params(
    page: u32,
    replication_key: Option<&str>,
    start_date: Option<&str>,
    override_fn: Option<ParamOverrideFn>,
    scope: &ParamScope<'_>,
) -> Result<RequestParams> {
    let mut params = RequestParams::new();

    // 1. Pagination
    params.set(PAGE_PARAM, page.to_string());

    // 2. Replication ordering
    if let Some(key) = replication_key {
        params.set("sort", "asc");
        params.set("order_by", key);
    }

    // 3. Start-date filter
    if let Some(start) = start_date {
        params.set(MODIFIED_SINCE_PARAM, start);
        params.set(MODIFIED_SINCE_CONDITION_PARAM, GREATER_OR_EQUAL);
    }

    // 4. Stream-specific override
    if let Some(apply) = override_fn {
        apply(&mut params, scope)?;
    }

    Ok(params)
}
