// crates/correlator-core/tests/monotonic_state.rs
// ============================================================================
// Module: Monotonic State Property Tests
// Description: Convergence tests for out-of-order run state updates.
// Purpose: Validate that any interleaving of one run's events converges on
//          the latest terminal state, else the latest state overall.
// Dependencies: correlator-core, proptest
// ============================================================================

//! ## Overview
//! Generates random event sets for a single run with distinct event times,
//! ingests them in a shuffled order, and checks the stored state against the
//! order-independent expectation: the greatest-by-event-time terminal event
//! when any exists, else the greatest-by-event-time event overall.

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

use correlator_core::InMemoryLineageStore;
use correlator_core::JobRunId;
use correlator_core::LineageStore;
use correlator_core::RunState;
use correlator_core::UrnNormalizer;
use correlator_core::prepare_event;
use correlator_core::validate_event;
use proptest::prelude::*;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;

/// Event types a producer can emit, indexed by the generated value.
const EVENT_TYPES: [&str; 5] = ["START", "RUNNING", "COMPLETE", "FAIL", "ABORT"];

/// Base event time; generated events add one minute per index.
const BASE: OffsetDateTime = datetime!(2025-10-21 10:00:00 UTC);

fn ingest_typed(store: &InMemoryLineageStore, event_type: &str, minute: usize) {
    let event_time = (BASE + Duration::minutes(minute as i64))
        .format(&Rfc3339)
        .expect("format event time");
    let event = serde_json::json!({
        "eventTime": event_time,
        "eventType": event_type,
        "producer": "https://airflow.apache.org",
        "schemaURL": "https://openlineage.io/spec/2-0-2/OpenLineage.json",
        "run": { "runId": "00000000-0000-4000-8000-000000000001" },
        "job": { "namespace": "airflow://prod", "name": "daily_dag" }
    });
    let run_event = serde_json::from_value(event).expect("wire model accepts the event");
    let validated = validate_event(&run_event).expect("event is valid");
    store
        .ingest_event(&prepare_event(&UrnNormalizer::empty(), &validated))
        .expect("ingest succeeds");
}

fn is_terminal(event_type: &str) -> bool {
    matches!(event_type, "COMPLETE" | "FAIL" | "ABORT")
}

proptest! {
    #[test]
    fn any_interleaving_converges_on_the_expected_state(
        ordered in prop::collection::vec(0usize..EVENT_TYPES.len(), 1..8)
            .prop_map(|types| types.into_iter().enumerate().collect::<Vec<_>>())
            .prop_shuffle(),
    ) {
        let store = InMemoryLineageStore::new();
        for (minute, type_index) in &ordered {
            ingest_typed(&store, EVENT_TYPES[*type_index], *minute);
        }

        // Expected winner: greatest-by-time terminal event when any exists,
        // else the greatest-by-time event overall.
        let winner = ordered
            .iter()
            .filter(|(_, type_index)| is_terminal(EVENT_TYPES[*type_index]))
            .max_by_key(|(minute, _)| *minute)
            .or_else(|| ordered.iter().max_by_key(|(minute, _)| *minute))
            .expect("at least one event");
        let expected_state =
            RunState::parse(EVENT_TYPES[winner.1]).expect("event types map to states");

        let run = store
            .run(&JobRunId::new("airflow:00000000-0000-4000-8000-000000000001"))
            .expect("run row exists");
        prop_assert_eq!(run.current_state, Some(expected_state));
        if expected_state.is_terminal() {
            let expected_completed = BASE + Duration::minutes(winner.0 as i64);
            prop_assert_eq!(run.completed_at, Some(expected_completed));
        } else {
            prop_assert_eq!(run.completed_at, None);
        }
        let earliest = ordered.iter().map(|(minute, _)| *minute).min().expect("events");
        prop_assert_eq!(run.started_at, BASE + Duration::minutes(earliest as i64));
    }
}
