// crates/correlator-core/tests/event_validation.rs
// ============================================================================
// Module: Event Validator Unit Tests
// Description: Tests for OpenLineage event validation and facet extraction.
// Purpose: Validate required-field rejection and assertion extraction.
// Dependencies: correlator-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises structural and semantic validation of single events: required
//! fields, RFC-3339 and UUID shape checks, dataset element checks, parent
//! facet handling, and data-quality assertion extraction.

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

use correlator_core::EventType;
use correlator_core::RunEvent;
use correlator_core::ValidationError;
use correlator_core::validate_event;
use serde_json::json;

fn sample_event() -> serde_json::Value {
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

fn parse(value: serde_json::Value) -> RunEvent {
    serde_json::from_value(value).expect("wire model accepts the event")
}

#[test]
fn valid_event_passes() {
    let validated = validate_event(&parse(sample_event())).expect("event is valid");
    assert_eq!(validated.event_type, EventType::Complete);
    assert_eq!(validated.raw_run_id.as_str(), "550e8400-e29b-41d4-a716-446655440000");
    assert_eq!(validated.job_namespace, "dbt://x");
    assert_eq!(validated.outputs.len(), 1);
    assert!(validated.inputs.is_empty());
}

#[test]
fn missing_event_time_names_the_field() {
    let mut event = sample_event();
    event.as_object_mut().expect("object").remove("eventTime");
    let error = validate_event(&parse(event)).expect_err("eventTime is required");
    assert!(error.to_string().contains("eventTime"));
}

#[test]
fn non_rfc3339_event_time_is_rejected() {
    let mut event = sample_event();
    event["eventTime"] = json!("21/10/2025 10:05");
    let error = validate_event(&parse(event)).expect_err("malformed time");
    assert!(matches!(error, ValidationError::InvalidField { ref field, .. } if field == "eventTime"));
}

#[test]
fn unknown_event_type_is_rejected() {
    let mut event = sample_event();
    event["eventType"] = json!("FINISHED");
    let error = validate_event(&parse(event)).expect_err("unknown event type");
    assert!(error.to_string().contains("eventType"));
}

#[test]
fn non_url_producer_is_rejected() {
    let mut event = sample_event();
    event["producer"] = json!("not a url");
    let error = validate_event(&parse(event)).expect_err("producer must be a URL");
    assert!(error.to_string().contains("producer"));
}

#[test]
fn non_uuid_run_id_is_rejected() {
    let mut event = sample_event();
    event["run"]["runId"] = json!("not-a-uuid");
    let error = validate_event(&parse(event)).expect_err("runId must be UUID-shaped");
    assert!(error.to_string().contains("run.runId"));
}

#[test]
fn missing_job_namespace_is_rejected() {
    let mut event = sample_event();
    event["job"] = json!({ "name": "transform_orders" });
    let error = validate_event(&parse(event)).expect_err("job.namespace is required");
    assert!(error.to_string().contains("job.namespace"));
}

#[test]
fn dataset_elements_require_namespace_and_name() {
    let mut event = sample_event();
    event["inputs"] = json!([{ "namespace": "postgres://db:5432" }]);
    let error = validate_event(&parse(event)).expect_err("input name is required");
    assert!(error.to_string().contains("inputs[0].name"));
}

#[test]
fn empty_dataset_arrays_are_allowed() {
    let mut event = sample_event();
    event["outputs"] = json!([]);
    let validated = validate_event(&parse(event)).expect("empty arrays are fine");
    assert!(validated.outputs.is_empty());
}

#[test]
fn assertions_are_extracted_from_input_facets() {
    let mut event = sample_event();
    event["inputs"] = json!([{
        "namespace": "postgres://db:5432",
        "name": "analytics.public.orders",
        "facets": {
            "dataQualityAssertions": {
                "assertions": [
                    { "assertion": "not_null(order_id)", "success": true },
                    { "assertion": "unique(order_id)", "success": false, "column": "order_id" }
                ]
            }
        }
    }]);
    let validated = validate_event(&parse(event)).expect("assertions are valid");
    let assertions = &validated.inputs[0].assertions;
    assert_eq!(assertions.len(), 2);
    assert!(assertions[0].success);
    assert!(!assertions[1].success);
    assert_eq!(assertions[1].column.as_deref(), Some("order_id"));
}

#[test]
fn assertion_without_success_is_rejected() {
    let mut event = sample_event();
    event["inputs"] = json!([{
        "namespace": "postgres://db:5432",
        "name": "analytics.public.orders",
        "facets": {
            "dataQualityAssertions": {
                "assertions": [{ "assertion": "not_null(order_id)" }]
            }
        }
    }]);
    let error = validate_event(&parse(event)).expect_err("success is required");
    assert!(error.to_string().contains("success"));
}

#[test]
fn unknown_facets_are_preserved_but_not_interpreted() {
    let mut event = sample_event();
    event["run"]["facets"] = json!({
        "nominalTime": { "nominalStartTime": "2025-10-21T10:00:00Z" }
    });
    let parsed = parse(event);
    let run = parsed.run.as_ref().expect("run section");
    assert!(run.facets.other.contains_key("nominalTime"));
    validate_event(&parsed).expect("unknown facets never fail validation");
}

#[test]
fn parent_facet_carries_parent_identity() {
    let mut event = sample_event();
    event["run"]["facets"] = json!({
        "parent": {
            "_producer": "https://airflow.apache.org",
            "run": { "runId": "11111111-2222-3333-4444-555555555555" },
            "job": { "namespace": "airflow://prod", "name": "daily_dag" }
        }
    });
    let validated = validate_event(&parse(event)).expect("parent facet is valid");
    let parent = validated.parent.expect("parent present");
    assert_eq!(parent.raw_run_id.as_str(), "11111111-2222-3333-4444-555555555555");
    assert_eq!(parent.producer, "https://airflow.apache.org");
    assert_eq!(parent.job_name.as_deref(), Some("daily_dag"));
}

#[test]
fn parent_facet_without_run_id_is_rejected() {
    let mut event = sample_event();
    event["run"]["facets"] = json!({ "parent": { "job": { "name": "daily_dag" } } });
    let error = validate_event(&parse(event)).expect_err("parent runId is required");
    assert!(error.to_string().contains("parent"));
}
