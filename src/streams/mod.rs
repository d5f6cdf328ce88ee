//! Stream definitions and the stream graph
//!
//! Each resource the API exposes is described by a [`StreamSpec`]: an
//! immutable descriptor holding the endpoint path, key fields, the parent
//! reference for hierarchical streams, and the per-stream customization
//! functions (parameter override, child-context projection, partition
//! choice). The pipeline is generic; everything stream-specific lives in
//! these descriptors.
//!
//! The [`Catalog`] owns the ordered spec list and validates the dependency
//! graph: parents must exist and be declared before their children, so the
//! graph is acyclic by construction.

mod catalog;

pub use catalog::visma_catalog;

use crate::error::{Error, Result};
use crate::params::{Context, ParamOverrideFn};
use crate::partition::PartitionSpec;
use crate::types::{JsonValue, OutputRecord, RawRecord};

/// Derives the context a parent record hands to its child streams.
///
/// Must be a pure function of the record: the same record always yields the
/// same context.
pub type ChildContextFn = fn(&OutputRecord) -> Result<Context>;

/// Optional per-record transform applied before emission.
///
/// Returning `None` suppresses the record.
pub type PostProcessFn = fn(RawRecord) -> Option<OutputRecord>;

/// Out-of-band enumeration of a sibling stream's full record set, crossed
/// with the stream's declared partitions to form a derived iteration
/// dimension (e.g. every ledger x every financial year).
///
/// This duplicates the sibling's own top-level run; the duplication is
/// preserved deliberately rather than deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossEnumeration {
    /// Sibling stream to enumerate
    pub stream: &'static str,
    /// Field extracted from each sibling record
    pub value_field: &'static str,
    /// Partition value key the extracted field is stored under
    pub partition_key: &'static str,
}

/// Immutable descriptor for one stream
#[derive(Debug, Clone, Copy)]
pub struct StreamSpec {
    /// Stream name, used to key emitted records
    pub name: &'static str,
    /// Endpoint path relative to the API base URL
    pub path: &'static str,
    /// Fields uniquely identifying a record within this stream (non-empty)
    pub primary_keys: &'static [&'static str],
    /// Field used to order records for incremental extraction
    pub replication_key: Option<&'static str>,
    /// Parent stream; this stream runs once per parent record
    pub parent: Option<&'static str>,
    /// Partition sequence, for endpoints without open-ended date filters
    pub partitions: Option<PartitionSpec>,
    /// Sibling cross-enumeration combined with `partitions`
    pub cross_enumerate: Option<CrossEnumeration>,
    /// Stream-specific parameter override
    pub params: Option<ParamOverrideFn>,
    /// Projection of a record into child-stream context
    pub child_context: Option<ChildContextFn>,
    /// Per-record transform, may suppress records
    pub post_process: Option<PostProcessFn>,
}

impl StreamSpec {
    /// Create a spec with the given identity and no customization
    pub const fn new(
        name: &'static str,
        path: &'static str,
        primary_keys: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            path,
            primary_keys,
            replication_key: None,
            parent: None,
            partitions: None,
            cross_enumerate: None,
            params: None,
            child_context: None,
            post_process: None,
        }
    }

    /// Set the replication key
    #[must_use]
    pub const fn replicate_on(mut self, key: &'static str) -> Self {
        self.replication_key = Some(key);
        self
    }

    /// Set the parent stream
    #[must_use]
    pub const fn child_of(mut self, parent: &'static str) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the partition sequence
    #[must_use]
    pub const fn partitioned_by(mut self, partitions: PartitionSpec) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Set the sibling cross-enumeration
    #[must_use]
    pub const fn crossed_with(mut self, cross: CrossEnumeration) -> Self {
        self.cross_enumerate = Some(cross);
        self
    }

    /// Set the parameter override
    #[must_use]
    pub const fn with_params(mut self, params: ParamOverrideFn) -> Self {
        self.params = Some(params);
        self
    }

    /// Set the child-context projection
    #[must_use]
    pub const fn with_child_context(mut self, derive: ChildContextFn) -> Self {
        self.child_context = Some(derive);
        self
    }

    /// Set the post-process transform
    #[must_use]
    pub const fn with_post_process(mut self, transform: PostProcessFn) -> Self {
        self.post_process = Some(transform);
        self
    }

    /// Whether this stream iterates partitions (declared or derived)
    pub fn is_partitioned(&self) -> bool {
        self.partitions.is_some() || self.cross_enumerate.is_some()
    }
}

/// The ordered set of stream definitions and their dependency graph
#[derive(Debug, Clone)]
pub struct Catalog {
    specs: Vec<StreamSpec>,
}

impl Catalog {
    /// Build a catalog from specs, validating the graph
    pub fn from_specs(specs: Vec<StreamSpec>) -> Result<Self> {
        let catalog = Self { specs };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate the stream graph.
    ///
    /// Primary keys must be non-empty, parents and cross-enumeration
    /// targets must exist, and a parent must be declared before any of its
    /// children. Declaration order doubles as enumeration order, so the
    /// ordering rule makes cycles impossible.
    fn validate(&self) -> Result<()> {
        for (idx, spec) in self.specs.iter().enumerate() {
            if spec.primary_keys.is_empty() {
                return Err(Error::graph(format!(
                    "stream '{}' has no primary keys",
                    spec.name
                )));
            }
            if self.specs.iter().filter(|s| s.name == spec.name).count() > 1 {
                return Err(Error::graph(format!("duplicate stream name '{}'", spec.name)));
            }
            if let Some(parent) = spec.parent {
                let parent_idx = self
                    .specs
                    .iter()
                    .position(|s| s.name == parent)
                    .ok_or_else(|| {
                        Error::graph(format!(
                            "stream '{}' references unknown parent '{parent}'",
                            spec.name
                        ))
                    })?;
                if parent_idx >= idx {
                    return Err(Error::graph(format!(
                        "parent '{parent}' must be declared before child '{}'",
                        spec.name
                    )));
                }
                if self.specs[parent_idx].child_context.is_none() {
                    return Err(Error::graph(format!(
                        "parent '{parent}' of '{}' declares no child-context projection",
                        spec.name
                    )));
                }
            }
            if let Some(cross) = spec.cross_enumerate {
                let target = self
                    .specs
                    .iter()
                    .find(|s| s.name == cross.stream)
                    .ok_or_else(|| {
                        Error::graph(format!(
                            "stream '{}' cross-enumerates unknown stream '{}'",
                            spec.name, cross.stream
                        ))
                    })?;
                if target.parent.is_some() {
                    return Err(Error::graph(format!(
                        "stream '{}' cross-enumerates '{}', which has a parent and cannot \
                         be fetched standalone",
                        spec.name, cross.stream
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Result<&StreamSpec> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::StreamNotFound {
                stream: name.to_string(),
            })
    }

    /// Streams without a parent, in declaration order
    pub fn roots(&self) -> impl Iterator<Item = &StreamSpec> {
        self.specs.iter().filter(|s| s.parent.is_none())
    }

    /// Child streams of the given parent, in declaration order
    pub fn children_of(&self, parent: &str) -> Vec<&StreamSpec> {
        self.specs
            .iter()
            .filter(|s| s.parent == Some(parent))
            .collect()
    }

    /// All stream names, in declaration order
    pub fn names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.name).collect()
    }

    /// Iterate over all specs
    pub fn iter(&self) -> impl Iterator<Item = &StreamSpec> {
        self.specs.iter()
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Extract a field from a record as a string, following dot-separated
/// nesting (e.g. `ledger.id`)
pub fn record_field(record: &OutputRecord, path: &str) -> Option<String> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current: &JsonValue = record.get(first)?;
    for part in parts {
        current = current.get(part)?;
    }
    match current {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
