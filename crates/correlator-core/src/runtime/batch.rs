// crates/correlator-core/src/runtime/batch.rs
// ============================================================================
// Module: Batch Orchestrator
// Description: Sequential per-event pipeline with partial-failure semantics.
// Purpose: Drive validate, prepare, and store stages per event and assemble
//          the batch response envelope.
// Dependencies: crate::{core, interfaces, resolve}, serde_json
// ============================================================================

//! ## Overview
//! A batch is an ordered array of raw JSON events. Each event runs through
//! validation, canonicalization, and a single-event store transaction; one
//! event's failure never rolls back another's success. The response envelope
//! holds the contract invariants by construction: `successful + failed ==
//! received`, `failed_events.len() == failed`, and `status` agrees with the
//! counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::event::RunEvent;
use crate::core::event::ValidatedEvent;
use crate::core::identifiers::canonicalize;
use crate::core::identifiers::producer_version;
use crate::core::record::PreparedEvent;
use crate::core::record::PreparedTestResult;
use crate::core::record::TestStatus;
use crate::interfaces::IngestError;
use crate::interfaces::IngestErrorKind;
use crate::interfaces::LineageStore;
use crate::resolve::UrnNormalizer;
use crate::runtime::fingerprint::event_fingerprint;
use crate::runtime::validate::validate_event;

// ============================================================================
// SECTION: Response Envelope
// ============================================================================

/// Batch disposition derived from the outcome counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every event succeeded.
    Success,
    /// Some events succeeded and some failed.
    Partial,
    /// Every event failed.
    Error,
}

/// Outcome counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Events received in the batch.
    pub received: u64,
    /// Events ingested (including idempotent duplicates).
    pub successful: u64,
    /// Events rejected.
    pub failed: u64,
    /// Rejected events the producer should retry.
    pub retriable: u64,
    /// Rejected events that will never succeed unchanged.
    pub non_retriable: u64,
}

/// One rejected event in the batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEvent {
    /// Zero-based index of the event in the submitted array.
    pub index: usize,
    /// Human-readable rejection reason.
    pub reason: String,
    /// True when the producer should retry the event.
    pub retriable: bool,
    /// Error kind classification, for transport-level dispositions.
    #[serde(skip)]
    pub kind: IngestErrorKind,
}

/// Batch response envelope returned to producers.
///
/// # Invariants
/// - `summary.successful + summary.failed == summary.received`.
/// - `failed_events.len() == summary.failed`.
/// - `status` is `success` iff `failed == 0` and `error` iff
///   `successful == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Batch disposition.
    pub status: BatchStatus,
    /// Outcome counters.
    pub summary: BatchSummary,
    /// Rejected events in array order.
    pub failed_events: Vec<FailedEvent>,
}

impl BatchResponse {
    /// Returns true when every rejected event failed with the given kind.
    #[must_use]
    pub fn failures_all(&self, kind: IngestErrorKind) -> bool {
        self.failed_events.iter().all(|failed| failed.kind == kind)
    }
}

// ============================================================================
// SECTION: Event Preparation
// ============================================================================

/// Canonicalizes a validated event into its prepared, store-ready form.
///
/// Applies the composition contract exactly once: alias on the job and
/// dataset namespaces, then pattern rewriting on the joined dataset URNs.
/// Assertion outcomes on inputs become prepared test results against the
/// canonical input URN, and the idempotency fingerprint is computed over the
/// canonical identity tuple.
#[must_use]
pub fn prepare_event(normalizer: &UrnNormalizer, validated: &ValidatedEvent) -> PreparedEvent {
    let job_run_id = canonicalize(&validated.producer, validated.raw_run_id.as_str());
    let parent_run_id = validated
        .parent
        .as_ref()
        .map(|parent| canonicalize(&parent.producer, parent.raw_run_id.as_str()));

    let mut test_results = Vec::new();
    let mut inputs = Vec::with_capacity(validated.inputs.len());
    for dataset in &validated.inputs {
        let prepared = normalizer.canonical_dataset(&dataset.namespace, &dataset.name);
        for assertion in &dataset.assertions {
            test_results.push(PreparedTestResult {
                test_name: assertion.name.clone(),
                test_type: "dataQualityAssertion".to_string(),
                dataset_urn: prepared.urn.clone(),
                status: if assertion.success {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                },
                message: assertion.column.clone(),
                executed_at: validated.event_time,
                duration_ms: None,
            });
        }
        inputs.push(prepared);
    }
    let outputs: Vec<_> = validated
        .outputs
        .iter()
        .map(|dataset| normalizer.canonical_dataset(&dataset.namespace, &dataset.name))
        .collect();

    let input_urns: Vec<_> = inputs.iter().map(|dataset| dataset.urn.clone()).collect();
    let output_urns: Vec<_> = outputs.iter().map(|dataset| dataset.urn.clone()).collect();
    let fingerprint = event_fingerprint(
        &validated.producer,
        &validated.raw_run_id,
        validated.event_time,
        validated.event_type,
        &input_urns,
        &output_urns,
    );

    PreparedEvent {
        job_run_id,
        raw_run_id: validated.raw_run_id.clone(),
        parent_run_id,
        producer_name: validated.producer.clone(),
        producer_version: producer_version(&validated.producer),
        event_time: validated.event_time,
        event_type: validated.event_type,
        job_namespace: normalizer.resolve_namespace(&validated.job_namespace),
        job_name: validated.job_name.clone(),
        inputs,
        outputs,
        test_results,
        fingerprint,
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Sequential batch ingestion over a lineage store.
pub struct BatchOrchestrator<'a> {
    /// Two-stage URN normalizer applied at write time.
    normalizer: &'a UrnNormalizer,
    /// Transactional event sink.
    store: &'a dyn LineageStore,
}

impl<'a> BatchOrchestrator<'a> {
    /// Creates an orchestrator over the given normalizer and store.
    #[must_use]
    pub const fn new(normalizer: &'a UrnNormalizer, store: &'a dyn LineageStore) -> Self {
        Self {
            normalizer,
            store,
        }
    }

    /// Ingests an ordered batch of raw events.
    ///
    /// Events are processed in array order, each in its own transaction.
    /// Per-event failures are captured in the envelope and never abort the
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Input`] when the batch itself is unusable
    /// (empty array); per-event errors are reported in the envelope instead.
    pub fn ingest_batch(&self, events: &[Value]) -> Result<BatchResponse, IngestError> {
        if events.is_empty() {
            return Err(IngestError::Input("empty batch".to_string()));
        }
        let mut summary = BatchSummary {
            received: events.len() as u64,
            ..BatchSummary::default()
        };
        let mut failed_events = Vec::new();
        for (index, raw) in events.iter().enumerate() {
            match self.ingest_one(raw) {
                Ok(()) => summary.successful += 1,
                Err(error) => {
                    summary.failed += 1;
                    if error.retriable() {
                        summary.retriable += 1;
                    } else {
                        summary.non_retriable += 1;
                    }
                    tracing::debug!(index, error = %error, "event rejected");
                    failed_events.push(FailedEvent {
                        index,
                        reason: error.to_string(),
                        retriable: error.retriable(),
                        kind: error.kind(),
                    });
                }
            }
        }
        let status = if summary.failed == 0 {
            BatchStatus::Success
        } else if summary.successful == 0 {
            BatchStatus::Error
        } else {
            BatchStatus::Partial
        };
        Ok(BatchResponse {
            status,
            summary,
            failed_events,
        })
    }

    /// Runs one event through validate, prepare, and store.
    fn ingest_one(&self, raw: &Value) -> Result<(), IngestError> {
        let event: RunEvent = serde_json::from_value(raw.clone())
            .map_err(|err| IngestError::Validation(format!("malformed event: {err}")))?;
        let validated =
            validate_event(&event).map_err(|err| IngestError::Validation(err.to_string()))?;
        let prepared = prepare_event(self.normalizer, &validated);
        let receipt = self.store.ingest_event(&prepared)?;
        if receipt.duplicate {
            tracing::debug!(
                job_run_id = prepared.job_run_id.as_str(),
                "duplicate event absorbed by idempotency gate"
            );
        }
        Ok(())
    }
}
