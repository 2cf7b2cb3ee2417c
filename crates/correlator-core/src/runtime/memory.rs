// crates/correlator-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Lineage Store
// Description: Mutex-guarded in-memory implementation of the lineage store.
// Purpose: Back the batch orchestrator in tests and embedded scenarios
//          without a storage engine.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The in-memory store applies the same single-event semantics as the
//! relational store: idempotency fingerprints gate all writes, run rows
//! follow the monotonic state policy, and edges and test results are
//! idempotent sets. Derived views do not exist here; `refresh_views` is a
//! no-op.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::core::identifiers::DatasetUrn;
use crate::core::identifiers::JobRunId;
use crate::core::record::EdgeType;
use crate::core::record::LineageEdge;
use crate::core::record::PreparedDataset;
use crate::core::record::PreparedEvent;
use crate::core::record::PreparedTestResult;
use crate::core::record::RunRecord;
use crate::core::record::RunState;
use crate::interfaces::IngestError;
use crate::interfaces::IngestReceipt;
use crate::interfaces::LineageStore;
use crate::interfaces::StoreError;
use crate::interfaces::ViewRefreshReport;

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable store state behind the mutex.
#[derive(Debug, Default)]
struct MemoryState {
    /// Run rows keyed by canonical run identity.
    runs: BTreeMap<String, RunRecord>,
    /// Dataset rows keyed by canonical URN.
    datasets: BTreeMap<String, PreparedDataset>,
    /// Edge triples `(job_run_id, dataset_urn, edge_type)`.
    edges: BTreeSet<(String, String, &'static str)>,
    /// Test-result uniqueness tuples.
    test_keys: BTreeSet<(String, String, String, i128)>,
    /// Test-result rows paired with their run identity.
    tests: Vec<(JobRunId, PreparedTestResult)>,
    /// Idempotency fingerprints with their recording time.
    fingerprints: BTreeMap<String, OffsetDateTime>,
}

/// In-memory [`LineageStore`] for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryLineageStore {
    /// Guarded store state.
    state: Mutex<MemoryState>,
}

impl InMemoryLineageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored run row for a canonical identity, if any.
    #[must_use]
    pub fn run(&self, job_run_id: &JobRunId) -> Option<RunRecord> {
        let state = self.state.lock().ok()?;
        state.runs.get(job_run_id.as_str()).cloned()
    }

    /// Returns the number of stored edge rows.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.state.lock().map(|state| state.edges.len()).unwrap_or(0)
    }

    /// Returns the stored edges as typed rows, sorted by their triple.
    #[must_use]
    pub fn edges(&self) -> Vec<LineageEdge> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .edges
            .iter()
            .map(|(job_run_id, dataset_urn, edge_type)| LineageEdge {
                job_run_id: JobRunId::new(job_run_id.clone()),
                dataset_urn: DatasetUrn::new(dataset_urn.clone()),
                edge_type: if *edge_type == EdgeType::Output.as_str() {
                    EdgeType::Output
                } else {
                    EdgeType::Input
                },
            })
            .collect()
    }

    /// Returns the number of stored test-result rows.
    #[must_use]
    pub fn test_result_count(&self) -> usize {
        self.state.lock().map(|state| state.tests.len()).unwrap_or(0)
    }

    /// Returns the number of distinct dataset rows.
    #[must_use]
    pub fn dataset_count(&self) -> usize {
        self.state.lock().map(|state| state.datasets.len()).unwrap_or(0)
    }
}

// ============================================================================
// SECTION: Store Implementation
// ============================================================================

impl LineageStore for InMemoryLineageStore {
    fn ingest_event(&self, event: &PreparedEvent) -> Result<IngestReceipt, IngestError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(IngestError::Internal("store lock poisoned".to_string()));
        };
        if state.fingerprints.contains_key(&event.fingerprint) {
            return Ok(IngestReceipt {
                duplicate: true,
            });
        }

        upsert_run(&mut state.runs, event);
        for dataset in event.inputs.iter().chain(event.outputs.iter()) {
            state.datasets.insert(dataset.urn.as_str().to_string(), dataset.clone());
        }
        for dataset in &event.inputs {
            state.edges.insert((
                event.job_run_id.as_str().to_string(),
                dataset.urn.as_str().to_string(),
                EdgeType::Input.as_str(),
            ));
        }
        for dataset in &event.outputs {
            state.edges.insert((
                event.job_run_id.as_str().to_string(),
                dataset.urn.as_str().to_string(),
                EdgeType::Output.as_str(),
            ));
        }
        for test in &event.test_results {
            let key = (
                event.job_run_id.as_str().to_string(),
                test.test_name.clone(),
                test.dataset_urn.as_str().to_string(),
                test.executed_at.unix_timestamp_nanos(),
            );
            if state.test_keys.insert(key) {
                state.tests.push((event.job_run_id.clone(), test.clone()));
            }
        }
        state.fingerprints.insert(event.fingerprint.clone(), event.event_time);
        Ok(IngestReceipt {
            duplicate: false,
        })
    }

    fn refresh_views(&self) -> Result<ViewRefreshReport, StoreError> {
        Ok(ViewRefreshReport::default())
    }

    fn prune_idempotency_keys(&self, older_than: OffsetDateTime) -> Result<u64, StoreError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(StoreError::Io("store lock poisoned".to_string()));
        };
        let before = state.fingerprints.len();
        state.fingerprints.retain(|_, recorded| *recorded >= older_than);
        Ok((before - state.fingerprints.len()) as u64)
    }
}

/// Applies the monotonic run upsert to the in-memory run map.
fn upsert_run(runs: &mut BTreeMap<String, RunRecord>, event: &PreparedEvent) {
    let incoming_state = event.event_type.run_state();
    match runs.get_mut(event.job_run_id.as_str()) {
        None => {
            let completed_at = incoming_state
                .filter(|state| state.is_terminal())
                .map(|_| event.event_time);
            runs.insert(
                event.job_run_id.as_str().to_string(),
                RunRecord {
                    job_run_id: event.job_run_id.clone(),
                    raw_run_id: event.raw_run_id.clone(),
                    job_name: event.job_name.clone(),
                    job_namespace: event.job_namespace.clone(),
                    current_state: incoming_state,
                    event_type: event.event_type,
                    event_time: event.event_time,
                    started_at: event.event_time,
                    completed_at,
                    producer_name: event.producer_name.clone(),
                    producer_version: event.producer_version.clone(),
                    parent_run_id: event.parent_run_id.clone(),
                },
            );
        }
        Some(run) => {
            if event.event_time < run.started_at {
                run.started_at = event.event_time;
            }
            let stored = run.current_state.map(|state| (state, run.event_time));
            if let Some(incoming) = incoming_state {
                if RunState::should_apply(stored, incoming, event.event_time) {
                    run.current_state = Some(incoming);
                    run.event_type = event.event_type;
                    run.event_time = event.event_time;
                    if incoming.is_terminal() {
                        run.completed_at = Some(event.event_time);
                    }
                }
            }
            if run.parent_run_id.is_none() {
                run.parent_run_id = event.parent_run_id.clone();
            }
        }
    }
}
