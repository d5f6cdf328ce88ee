//! Tests for the extraction engine
//!
//! Drive the pipeline against a scripted in-memory transport so every
//! request/response pair is deterministic.

use super::*;
use crate::config::ConnectorConfig;
use crate::output::{MemorySink, RecordSink};
use crate::params::{RequestParams, MODIFIED_SINCE_CONDITION_PARAM, MODIFIED_SINCE_PARAM};
use crate::partition::PartitionSpec;
use crate::types::{OutputRecord, StringMap};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Scripted transport
// ============================================================================

/// Serves queued responses per path and records every call
#[derive(Default)]
struct FakeTransport {
    responses: Mutex<HashMap<String, VecDeque<JsonValue>>>,
    calls: Mutex<Vec<(String, StringMap)>>,
}

impl FakeTransport {
    fn new() -> Self {
        Self::default()
    }

    fn enqueue(&self, path: &str, body: JsonValue) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(body);
    }

    fn calls(&self) -> Vec<(String, StringMap)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, path: &str) -> Vec<StringMap> {
        self.calls()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, params)| params)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, path: &str, params: &StringMap) -> Result<JsonValue> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), params.clone()));
        self.responses
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| Error::Other(format!("no scripted response for {path}")))
    }
}

/// Records (stream, record) pairs in emission order
#[derive(Default)]
struct SeqSink {
    events: Vec<(String, OutputRecord)>,
}

impl RecordSink for SeqSink {
    fn write(&mut self, stream: &str, record: &OutputRecord) -> Result<()> {
        self.events.push((stream.to_string(), record.clone()));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config() -> ConnectorConfig {
    ConnectorConfig::new("id", "secret", "tenant")
}

fn parent_context(record: &OutputRecord) -> Result<Context> {
    let number = record_field(record, "number")
        .ok_or_else(|| Error::extraction("parents", "record is missing 'number'"))?;
    Ok(Context::from_pairs([("branchNumber", number)]))
}

fn context_without_keys(_record: &OutputRecord) -> Result<Context> {
    Ok(Context::new())
}

fn child_params(params: &mut RequestParams, scope: &ParamScope<'_>) -> Result<()> {
    params.set("branch", scope.require_context("branchNumber")?);
    Ok(())
}

fn period_params(params: &mut RequestParams, scope: &ParamScope<'_>) -> Result<()> {
    params.remove(MODIFIED_SINCE_PARAM);
    params.remove(MODIFIED_SINCE_CONDITION_PARAM);
    params.set("periodId", scope.require_partition_value("period")?);
    Ok(())
}

fn matrix_params(params: &mut RequestParams, scope: &ParamScope<'_>) -> Result<()> {
    params.clear();
    params.set("ledger", scope.require_partition_value("ledger")?);
    params.set(
        "financialYear",
        scope.require_partition_value("financialYear")?,
    );
    Ok(())
}

fn drop_flagged(record: crate::types::RawRecord) -> Option<OutputRecord> {
    if record.get("skip").and_then(JsonValue::as_bool) == Some(true) {
        return None;
    }
    Some(record)
}

// ============================================================================
// Pagination behavior
// ============================================================================

#[tokio::test]
async fn test_paginates_until_short_page() {
    let transport = FakeTransport::new();
    transport.enqueue("/v1/item", json!([{"id": 1}, {"id": 2}]));
    transport.enqueue("/v1/item", json!([{"id": 3}, {"id": 4}]));
    transport.enqueue("/v1/item", json!([{"id": 5}]));

    let catalog =
        Catalog::from_specs(vec![StreamSpec::new("items", "/v1/item", &["id"])]).unwrap();
    let config = config().with_page_size(2);
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let stats = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.pages_fetched, 3);
    assert_eq!(stats.records_emitted, 5);
    assert_eq!(stats.streams_synced, 1);
    assert_eq!(stats.errors, 0);

    // Pages were requested in ascending order starting from 1
    let pages: Vec<_> = transport
        .calls_to("/v1/item")
        .iter()
        .map(|p| p.get("pageNumber").cloned().unwrap())
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);

    // Records arrive in server order
    let ids: Vec<_> = sink
        .records("items")
        .iter()
        .map(|r| r.get("id").unwrap().as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_full_page_then_empty_page_is_two_fetches() {
    let transport = FakeTransport::new();
    transport.enqueue("/v1/item", json!([{"id": 1}, {"id": 2}]));
    transport.enqueue("/v1/item", json!([]));

    let catalog =
        Catalog::from_specs(vec![StreamSpec::new("items", "/v1/item", &["id"])]).unwrap();
    let config = config().with_page_size(2);
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let stats = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.records_emitted, 2);
}

// ============================================================================
// Record extraction
// ============================================================================

#[test]
fn test_extract_records_top_level_array() {
    let records = extract_records("items", json!([{"id": 1}, {"id": 2}])).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_extract_records_array_nested_at_root() {
    let records =
        extract_records("items", json!({"items": [{"id": 1}], "count": 1})).unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_extract_records_rejects_scalar_body() {
    let err = extract_records("items", json!("oops")).unwrap_err();
    assert!(matches!(err, Error::RecordExtraction { .. }));
}

#[test]
fn test_extract_records_rejects_ambiguous_object() {
    let err =
        extract_records("items", json!({"a": [{"id": 1}], "b": [{"id": 2}]})).unwrap_err();
    assert!(matches!(err, Error::RecordExtraction { .. }));
}

#[test]
fn test_extract_records_rejects_non_object_elements() {
    let err = extract_records("items", json!([1, 2, 3])).unwrap_err();
    assert!(matches!(err, Error::RecordExtraction { .. }));
}

#[tokio::test]
async fn test_unexpected_body_fails_the_stream() {
    let transport = FakeTransport::new();
    transport.enqueue("/v1/item", json!({"error": "oops"}));

    let catalog =
        Catalog::from_specs(vec![StreamSpec::new("items", "/v1/item", &["id"])]).unwrap();
    let config = config();
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let stats = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.records_emitted, 0);
}

// ============================================================================
// Parent / child traversal
// ============================================================================

#[tokio::test]
async fn test_child_runs_depth_first_per_parent_record() {
    let transport = FakeTransport::new();
    transport.enqueue(
        "/v1/parent",
        json!([{"number": "B1"}, {"number": "B2"}]),
    );
    transport.enqueue("/v1/child", json!([{"id": "c1"}]));
    transport.enqueue("/v1/child", json!([{"id": "c2"}]));

    let catalog = Catalog::from_specs(vec![
        StreamSpec::new("parents", "/v1/parent", &["number"])
            .with_child_context(parent_context),
        StreamSpec::new("children", "/v1/child", &["id"])
            .child_of("parents")
            .with_params(child_params),
    ])
    .unwrap();
    let config = config();
    let mut state = StateStore::in_memory();
    let mut sink = SeqSink::default();

    Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    // Each child request carries the context of the parent record that
    // spawned it
    let child_calls = transport.calls_to("/v1/child");
    assert_eq!(child_calls.len(), 2);
    assert_eq!(child_calls[0].get("branch").unwrap(), "B1");
    assert_eq!(child_calls[1].get("branch").unwrap(), "B2");

    // All of a parent record's descendants are emitted before the next
    // parent record
    let order: Vec<&str> = sink.events.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(order, vec!["parents", "children", "parents", "children"]);
}

#[tokio::test]
async fn test_missing_context_key_aborts_stream() {
    let transport = FakeTransport::new();
    transport.enqueue("/v1/parent", json!([{"number": "B1"}]));

    let catalog = Catalog::from_specs(vec![
        StreamSpec::new("parents", "/v1/parent", &["number"])
            .with_child_context(context_without_keys),
        StreamSpec::new("children", "/v1/child", &["id"])
            .child_of("parents")
            .with_params(child_params),
    ])
    .unwrap();
    let config = config();
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let err = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .with_sync_config(SyncConfig::new().with_fail_fast(true))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MissingContextKey { ref stream, ref key }
            if stream == "children" && key == "branchNumber"
    ));
}

#[tokio::test]
async fn test_sibling_stream_continues_after_failure() {
    let transport = FakeTransport::new();
    transport.enqueue("/v1/bad", json!("not records"));
    transport.enqueue("/v1/good", json!([{"id": 1}]));

    let catalog = Catalog::from_specs(vec![
        StreamSpec::new("bad", "/v1/bad", &["id"]),
        StreamSpec::new("good", "/v1/good", &["id"]),
    ])
    .unwrap();
    let config = config();
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let stats = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.streams_synced, 1);
    assert_eq!(sink.records("good").len(), 1);
}

// ============================================================================
// Partitioned streams
// ============================================================================

#[tokio::test]
async fn test_partitioned_stream_paginates_each_period() {
    let transport = FakeTransport::new();
    transport.enqueue("/v2/journaltransaction", json!([{"batchNumber": 1}]));
    transport.enqueue("/v2/journaltransaction", json!([{"batchNumber": 2}]));
    transport.enqueue("/v2/journaltransaction", json!([{"batchNumber": 3}]));

    let catalog = Catalog::from_specs(vec![StreamSpec::new(
        "journal_transactions",
        "/v2/journaltransaction",
        &["batchNumber"],
    )
    .partitioned_by(PartitionSpec::MonthlyPeriods)
    .with_params(period_params)])
    .unwrap();
    let config = config().with_start_date("2023-06-15");
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let stats = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .with_today(date(2023, 8, 1))
        .run()
        .await
        .unwrap();

    assert_eq!(stats.partitions_synced, 3);
    assert_eq!(stats.records_emitted, 3);

    let periods: Vec<_> = transport
        .calls_to("/v2/journaltransaction")
        .iter()
        .map(|p| p.get("periodId").cloned().unwrap())
        .collect();
    assert_eq!(periods, vec!["202306", "202307", "202308"]);
}

#[tokio::test]
async fn test_malformed_start_date_is_fatal_at_enumeration() {
    let transport = FakeTransport::new();

    let catalog = Catalog::from_specs(vec![StreamSpec::new(
        "journal_transactions",
        "/v2/journaltransaction",
        &["batchNumber"],
    )
    .partitioned_by(PartitionSpec::MonthlyPeriods)
    .with_params(period_params)])
    .unwrap();
    let config = config().with_start_date("June 2023");
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let err = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .with_sync_config(SyncConfig::new().with_fail_fast(true))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidConfigValue { .. }));
    assert!(transport.calls().is_empty());
}

// ============================================================================
// Cross-enumeration
// ============================================================================

#[tokio::test]
async fn test_cross_enumeration_crosses_siblings_with_partitions() {
    let transport = FakeTransport::new();
    transport.enqueue(
        "/v1/ledger",
        json!([{"internalId": "L1"}, {"internalId": "L2"}]),
    );
    for _ in 0..4 {
        transport.enqueue("/v1/balance", json!([{"amount": "1.00"}]));
    }

    let catalog = Catalog::from_specs(vec![
        StreamSpec::new("ledgers", "/v1/ledger", &["internalId"]),
        StreamSpec::new("balances", "/v1/balance", &["id"])
            .partitioned_by(PartitionSpec::FinancialYears)
            .crossed_with(CrossEnumeration {
                stream: "ledgers",
                value_field: "internalId",
                partition_key: "ledger",
            })
            .with_params(matrix_params),
    ])
    .unwrap();
    let config = config();
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let stats = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .with_today(date(2024, 6, 1))
        .with_sync_config(SyncConfig::new().with_select(vec!["balances".to_string()]))
        .run()
        .await
        .unwrap();

    // ledger x financial year, ledgers outermost, years oldest first
    let matrix: Vec<_> = transport
        .calls_to("/v1/balance")
        .iter()
        .map(|p| {
            (
                p.get("ledger").cloned().unwrap(),
                p.get("financialYear").cloned().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        matrix,
        vec![
            ("L1".to_string(), "2023".to_string()),
            ("L1".to_string(), "2024".to_string()),
            ("L2".to_string(), "2023".to_string()),
            ("L2".to_string(), "2024".to_string()),
        ]
    );

    // The out-of-band enumeration emits nothing for the sibling stream
    assert!(sink.records("ledgers").is_empty());
    assert_eq!(stats.partitions_synced, 4);
    assert_eq!(stats.records_emitted, 4);
}

// ============================================================================
// Replication cursor
// ============================================================================

#[tokio::test]
async fn test_cursor_advances_and_tightens_next_run() {
    let catalog = Catalog::from_specs(vec![StreamSpec::new("items", "/v1/item", &["id"])
        .replicate_on("lastModifiedDateTime")])
    .unwrap();
    let config = config().with_start_date("2023-01-01");
    let mut state = StateStore::in_memory();

    let transport = FakeTransport::new();
    transport.enqueue(
        "/v1/item",
        json!([
            {"id": 1, "lastModifiedDateTime": "2023-05-02"},
            {"id": 2, "lastModifiedDateTime": "2023-09-30"}
        ]),
    );
    let mut sink = MemorySink::new();
    Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    assert_eq!(state.cursor("items"), Some("2023-09-30"));
    // The first run used the configured start date
    let first_calls = transport.calls_to("/v1/item");
    assert_eq!(
        first_calls[0].get(MODIFIED_SINCE_PARAM).unwrap(),
        "2023-01-01"
    );

    // A later run filters from the stored cursor instead
    let transport = FakeTransport::new();
    transport.enqueue("/v1/item", json!([]));
    let mut sink = MemorySink::new();
    Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    let second_calls = transport.calls_to("/v1/item");
    assert_eq!(
        second_calls[0].get(MODIFIED_SINCE_PARAM).unwrap(),
        "2023-09-30"
    );
    assert_eq!(
        second_calls[0].get(MODIFIED_SINCE_CONDITION_PARAM).unwrap(),
        "%3E%3D"
    );
}

// ============================================================================
// Post-processing
// ============================================================================

#[tokio::test]
async fn test_post_process_can_suppress_records() {
    let transport = FakeTransport::new();
    transport.enqueue(
        "/v1/item",
        json!([{"id": 1}, {"id": 2, "skip": true}, {"id": 3}]),
    );

    let catalog = Catalog::from_specs(vec![StreamSpec::new("items", "/v1/item", &["id"])
        .with_post_process(drop_flagged)])
    .unwrap();
    let config = config();
    let mut state = StateStore::in_memory();
    let mut sink = MemorySink::new();

    let stats = Pipeline::new(&transport, &catalog, &config, &mut state, &mut sink)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.records_emitted, 2);
    let ids: Vec<_> = sink
        .records("items")
        .iter()
        .map(|r| r.get("id").unwrap().as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);
}
