// crates/correlator-core/tests/batch_orchestrator.rs
// ============================================================================
// Module: Batch Orchestrator Unit Tests
// Description: Tests for the per-event pipeline and response envelope.
// Purpose: Validate partial-failure semantics, idempotent replay, and
//          envelope invariants against the in-memory store.
// Dependencies: correlator-core, serde_json
// ============================================================================

//! ## Overview
//! Drives batches through validate, prepare, and store stages using the
//! in-memory lineage store. Scenarios cover the single-completion happy
//! path, duplicate replay, validation failure reporting, assertion
//! extraction, and the envelope count invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use correlator_core::BatchOrchestrator;
use correlator_core::BatchResponse;
use correlator_core::BatchStatus;
use correlator_core::InMemoryLineageStore;
use correlator_core::IngestError;
use correlator_core::IngestErrorKind;
use correlator_core::JobRunId;
use correlator_core::RunState;
use correlator_core::UrnNormalizer;
use serde_json::Value;
use serde_json::json;

fn completion_event() -> Value {
    json!({
        "eventTime": "2025-10-21T10:05:00Z",
        "eventType": "COMPLETE",
        "producer": "https://github.com/dbt-labs/dbt-core/v1.8.2",
        "schemaURL": "https://openlineage.io/spec/2-0-2/OpenLineage.json",
        "run": { "runId": "550e8400-e29b-41d4-a716-446655440000" },
        "job": { "namespace": "dbt://x", "name": "transform_orders" },
        "outputs": [
            { "namespace": "postgres://db:5432", "name": "analytics.public.orders" }
        ]
    })
}

fn ingest(store: &InMemoryLineageStore, events: &[Value]) -> Result<BatchResponse, IngestError> {
    let normalizer = UrnNormalizer::empty();
    BatchOrchestrator::new(&normalizer, store).ingest_batch(events)
}

fn assert_envelope_invariants(response: &BatchResponse) {
    let summary = response.summary;
    assert_eq!(summary.successful + summary.failed, summary.received);
    assert_eq!(response.failed_events.len() as u64, summary.failed);
    assert_eq!(summary.retriable + summary.non_retriable, summary.failed);
    assert_eq!(response.status == BatchStatus::Success, summary.failed == 0);
    assert_eq!(response.status == BatchStatus::Error, summary.successful == 0);
}

#[test]
fn single_dbt_completion_creates_run_and_edge() {
    let store = InMemoryLineageStore::new();
    let response = ingest(&store, &[completion_event()]).expect("batch is usable");
    assert_envelope_invariants(&response);
    assert_eq!(response.status, BatchStatus::Success);
    assert_eq!(response.summary.received, 1);
    assert_eq!(response.summary.successful, 1);

    let run = store
        .run(&JobRunId::new("dbt:550e8400-e29b-41d4-a716-446655440000"))
        .expect("run row exists");
    assert_eq!(run.current_state, Some(RunState::Complete));
    assert!(run.completed_at.is_some());
    assert_eq!(run.producer_version.as_deref(), Some("1.8.2"));
    let edges = store.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].job_run_id.as_str(), "dbt:550e8400-e29b-41d4-a716-446655440000");
    assert_eq!(edges[0].dataset_urn.as_str(), "postgres://db:5432/analytics.public.orders");
    assert_eq!(edges[0].edge_type, correlator_core::EdgeType::Output);
    assert_eq!(store.dataset_count(), 1);
}

#[test]
fn duplicate_replay_is_successful_without_new_rows() {
    let store = InMemoryLineageStore::new();
    let first = ingest(&store, &[completion_event()]).expect("first batch");
    assert_eq!(first.summary.successful, 1);
    let second = ingest(&store, &[completion_event()]).expect("second batch");
    assert_envelope_invariants(&second);
    assert_eq!(second.status, BatchStatus::Success);
    assert_eq!(second.summary.successful, 1);
    assert_eq!(store.edge_count(), 1, "replay must not add edge rows");
}

#[test]
fn missing_event_time_reports_a_validation_failure() {
    let mut event = completion_event();
    event.as_object_mut().expect("object").remove("eventTime");
    let store = InMemoryLineageStore::new();
    let response = ingest(&store, &[event]).expect("batch is usable");
    assert_envelope_invariants(&response);
    assert_eq!(response.status, BatchStatus::Error);
    assert_eq!(response.summary.failed, 1);
    assert_eq!(response.summary.non_retriable, 1);
    assert_eq!(response.summary.retriable, 0);
    assert!(response.failed_events[0].reason.contains("eventTime"));
    assert!(!response.failed_events[0].retriable);
    assert!(response.failures_all(IngestErrorKind::Validation));
}

#[test]
fn assertions_produce_test_results() {
    let event = json!({
        "eventTime": "2025-10-21T10:05:00Z",
        "eventType": "COMPLETE",
        "producer": "https://github.com/dbt-labs/dbt-core/v1.8.2",
        "schemaURL": "https://openlineage.io/spec/2-0-2/OpenLineage.json",
        "run": { "runId": "550e8400-e29b-41d4-a716-446655440000" },
        "job": { "namespace": "dbt://x", "name": "transform_orders" },
        "inputs": [{
            "namespace": "postgres://db:5432",
            "name": "analytics.public.orders",
            "facets": {
                "dataQualityAssertions": {
                    "assertions": [
                        { "assertion": "not_null(order_id)", "success": true },
                        { "assertion": "unique(order_id)", "success": false }
                    ]
                }
            }
        }],
        "outputs": [
            { "namespace": "postgres://db:5432", "name": "analytics.public.orders" }
        ]
    });
    let store = InMemoryLineageStore::new();
    let response = ingest(&store, &[event]).expect("batch is usable");
    assert_eq!(response.summary.successful, 1);
    assert_eq!(store.test_result_count(), 2);
}

#[test]
fn empty_batch_is_an_input_error() {
    let store = InMemoryLineageStore::new();
    let error = ingest(&store, &[]).expect_err("empty batches fail whole");
    assert_eq!(error.kind(), IngestErrorKind::Input);
    assert!(!error.retriable());
}

#[test]
fn one_failure_does_not_roll_back_neighbors() {
    let mut broken = completion_event();
    broken["run"]["runId"] = json!("not-a-uuid");
    let store = InMemoryLineageStore::new();
    let response = ingest(&store, &[completion_event(), broken]).expect("batch is usable");
    assert_envelope_invariants(&response);
    assert_eq!(response.status, BatchStatus::Partial);
    assert_eq!(response.summary.successful, 1);
    assert_eq!(response.summary.failed, 1);
    assert_eq!(response.failed_events[0].index, 1);
    assert_eq!(store.edge_count(), 1, "the valid event's writes must persist");
}

#[test]
fn malformed_event_value_fails_validation_not_the_batch() {
    let store = InMemoryLineageStore::new();
    let response =
        ingest(&store, &[json!("not an object")]).expect("batch stays usable");
    assert_envelope_invariants(&response);
    assert_eq!(response.status, BatchStatus::Error);
    assert!(response.failures_all(IngestErrorKind::Validation));
}

#[test]
fn out_of_order_events_converge_on_latest_state() {
    let run_id = "99999999-8888-7777-6666-555555555555";
    let complete = json!({
        "eventTime": "2025-10-21T10:10:00Z",
        "eventType": "COMPLETE",
        "producer": "https://airflow.apache.org",
        "schemaURL": "https://openlineage.io/spec/2-0-2/OpenLineage.json",
        "run": { "runId": run_id },
        "job": { "namespace": "airflow://prod", "name": "daily_dag" }
    });
    let late_start = json!({
        "eventTime": "2025-10-21T10:00:00Z",
        "eventType": "START",
        "producer": "https://airflow.apache.org",
        "schemaURL": "https://openlineage.io/spec/2-0-2/OpenLineage.json",
        "run": { "runId": run_id },
        "job": { "namespace": "airflow://prod", "name": "daily_dag" }
    });
    let store = InMemoryLineageStore::new();
    let response = ingest(&store, &[complete, late_start]).expect("batch is usable");
    assert_eq!(response.summary.successful, 2);
    let run = store.run(&JobRunId::new(format!("airflow:{run_id}"))).expect("run row exists");
    assert_eq!(run.current_state, Some(RunState::Complete), "stale START must not regress state");
    assert!(run.completed_at.is_some());
    assert_eq!(
        run.started_at.unix_timestamp(),
        1_761_040_800,
        "the earlier event still backfills started_at"
    );
}
