// crates/correlator-core/src/core/record.rs
// ============================================================================
// Module: Lineage Graph Records
// Description: Persisted rows of the lineage graph and their state rules.
// Purpose: Define runs, datasets, edges, and test results plus the monotonic
//          run-state transition policy applied at ingestion.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! These types mirror the relational rows owned by the store. All other
//! components hold transient values derived from rows. Rows are created by
//! ingestion and never updated in place, with the single exception of the
//! run's monotonic `current_state`/`event_type`/`completed_at` fields.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::DatasetUrn;
use crate::core::identifiers::JobRunId;
use crate::core::identifiers::RawRunId;

// ============================================================================
// SECTION: Event and Run States
// ============================================================================

/// OpenLineage run event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Run started.
    Start,
    /// Run is in progress.
    Running,
    /// Run finished successfully.
    Complete,
    /// Run failed.
    Fail,
    /// Run was aborted.
    Abort,
    /// Metadata-only event that never changes run state.
    Other,
}

impl EventType {
    /// Parses the wire form (`START`, `RUNNING`, ...) of an event type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "START" => Some(Self::Start),
            "RUNNING" => Some(Self::Running),
            "COMPLETE" => Some(Self::Complete),
            "FAIL" => Some(Self::Fail),
            "ABORT" => Some(Self::Abort),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }

    /// Returns the wire form of this event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Fail => "FAIL",
            Self::Abort => "ABORT",
            Self::Other => "OTHER",
        }
    }

    /// Returns the run state this event type drives, if any.
    ///
    /// `OTHER` events carry metadata only and never change run state.
    #[must_use]
    pub const fn run_state(self) -> Option<RunState> {
        match self {
            Self::Start => Some(RunState::Start),
            Self::Running => Some(RunState::Running),
            Self::Complete => Some(RunState::Complete),
            Self::Fail => Some(RunState::Fail),
            Self::Abort => Some(RunState::Abort),
            Self::Other => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Run started.
    Start,
    /// Run is in progress.
    Running,
    /// Run finished successfully.
    Complete,
    /// Run failed.
    Fail,
    /// Run was aborted.
    Abort,
}

impl RunState {
    /// Parses the wire form of a run state.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "START" => Some(Self::Start),
            "RUNNING" => Some(Self::Running),
            "COMPLETE" => Some(Self::Complete),
            "FAIL" => Some(Self::Fail),
            "ABORT" => Some(Self::Abort),
            _ => None,
        }
    }

    /// Returns the wire form of this run state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Fail => "FAIL",
            Self::Abort => "ABORT",
        }
    }

    /// Returns true for states a run can never leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Fail | Self::Abort)
    }

    /// Decides whether an incoming event may overwrite the stored state.
    ///
    /// Terminal states always win over non-terminal ones regardless of
    /// event time; within the same class, the later-by-event-time state
    /// wins. Any interleaving of the same event set therefore converges on
    /// the latest terminal state when one exists, else the latest state
    /// overall.
    #[must_use]
    pub fn should_apply(
        stored: Option<(Self, OffsetDateTime)>,
        incoming: Self,
        incoming_time: OffsetDateTime,
    ) -> bool {
        match stored {
            None => true,
            Some((state, time)) => {
                if incoming.is_terminal() != state.is_terminal() {
                    incoming.is_terminal()
                } else {
                    incoming_time >= time
                }
            }
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single data-quality assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Assertion held.
    Passed,
    /// Assertion was evaluated and did not hold.
    Failed,
    /// Assertion could not be evaluated.
    Error,
    /// Assertion was skipped by the producer.
    Skipped,
}

impl TestStatus {
    /// Parses the wire form of a test status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "error" => Some(Self::Error),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns the wire form of this test status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    /// Returns true when the status represents an incident.
    #[must_use]
    pub const fn is_incident(self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a lineage edge relative to the job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// The run read the dataset.
    Input,
    /// The run wrote the dataset.
    Output,
}

impl EdgeType {
    /// Returns the wire form of this edge type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Persisted Rows
// ============================================================================

/// One execution of a job as persisted by the store.
///
/// # Invariants
/// - `job_run_id` is unique.
/// - State fields advance only per [`RunState::should_apply`].
/// - `completed_at` is set only when a terminal state was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Canonical `tool:runID` identity.
    pub job_run_id: JobRunId,
    /// Raw run identifier exactly as the producer emitted it.
    pub raw_run_id: RawRunId,
    /// Job name from the producer.
    pub job_name: String,
    /// Canonical (alias-resolved) job namespace.
    pub job_namespace: String,
    /// Current run state; absent when only metadata events were observed.
    pub current_state: Option<RunState>,
    /// Last applied event type.
    pub event_type: EventType,
    /// Event time of the last applied state update.
    #[serde(with = "time::serde::rfc3339")]
    pub event_time: OffsetDateTime,
    /// Earliest observed event time for the run.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Event time of the terminal event, when one was observed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Producer URL that emitted the run's events.
    pub producer_name: String,
    /// Producer version when derivable from the producer URL.
    pub producer_version: Option<String>,
    /// Canonical identity of the orchestrating parent run, when declared.
    pub parent_run_id: Option<JobRunId>,
}

/// A producer-dataset relation, tagged input or output.
///
/// # Invariants
/// - `(job_run_id, dataset_urn, edge_type)` is unique.
/// - Edges are additive and never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    /// Canonical run identity.
    pub job_run_id: JobRunId,
    /// Canonical dataset URN.
    pub dataset_urn: DatasetUrn,
    /// Edge direction.
    pub edge_type: EdgeType,
}

// ============================================================================
// SECTION: Prepared Event
// ============================================================================

/// A dataset reference after full canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedDataset {
    /// Canonical URN (alias-resolved namespace joined with the name, then
    /// pattern-rewritten).
    pub urn: DatasetUrn,
    /// Namespace component of the canonical URN.
    pub namespace: String,
    /// Name component of the canonical URN.
    pub name: String,
}

/// One extracted data-quality assertion outcome, ready for insertion.
///
/// # Invariants
/// - `(job_run_id, test_name, dataset_urn, executed_at)` is unique in the
///   store; duplicates are dropped on conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedTestResult {
    /// Assertion name, e.g. `not_null(order_id)`.
    pub test_name: String,
    /// Assertion category; always `dataQualityAssertion` for facet-derived
    /// results.
    pub test_type: String,
    /// Canonical URN of the tested dataset.
    pub dataset_urn: DatasetUrn,
    /// Outcome of the assertion.
    pub status: TestStatus,
    /// Optional message (the asserted column, when reported).
    pub message: Option<String>,
    /// Execution time (the enclosing event's time).
    #[serde(with = "time::serde::rfc3339")]
    pub executed_at: OffsetDateTime,
    /// Optional duration in milliseconds.
    pub duration_ms: Option<i64>,
}

/// A fully validated and canonicalized event, ready for transactional
/// ingestion.
///
/// # Invariants
/// - All URNs and the job namespace are canonical; the store never
///   re-resolves them.
/// - `fingerprint` is the idempotency key for exactly this event content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedEvent {
    /// Canonical run identity.
    pub job_run_id: JobRunId,
    /// Raw producer run identifier.
    pub raw_run_id: RawRunId,
    /// Canonical identity of the declared parent run.
    pub parent_run_id: Option<JobRunId>,
    /// Producer URL.
    pub producer_name: String,
    /// Producer version when derivable.
    pub producer_version: Option<String>,
    /// Event time.
    #[serde(with = "time::serde::rfc3339")]
    pub event_time: OffsetDateTime,
    /// Event type.
    pub event_type: EventType,
    /// Canonical job namespace.
    pub job_namespace: String,
    /// Job name.
    pub job_name: String,
    /// Canonicalized input datasets.
    pub inputs: Vec<PreparedDataset>,
    /// Canonicalized output datasets.
    pub outputs: Vec<PreparedDataset>,
    /// Test results extracted from data-quality assertion facets.
    pub test_results: Vec<PreparedTestResult>,
    /// Idempotency fingerprint (hex SHA-256).
    pub fingerprint: String,
}
