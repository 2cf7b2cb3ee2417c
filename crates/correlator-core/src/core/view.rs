// crates/correlator-core/src/core/view.rs
// ============================================================================
// Module: Correlation Read Model
// Description: Rows served by the correlation reader and health analysis.
// Purpose: Define the derived-view row shapes, query filters, and
//          orphan/suggestion payloads shared by store and server.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The read model is a pure function of committed store state. Incident rows
//! come from the incident correlation view, impact rows from the recursive
//! downstream closure, and health payloads from comparing tested URNs with
//! produced URNs. Optional timestamps serialize as JSON `null`, never as a
//! zero sentinel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::DatasetUrn;
use crate::core::identifiers::JobRunId;
use crate::core::record::RunRecord;
use crate::core::record::RunState;
use crate::core::record::TestStatus;

// ============================================================================
// SECTION: Incident Rows
// ============================================================================

/// Correlation outcome of one tested dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    /// A producing run was found via an output edge.
    Correlated,
    /// No output edge exists for the tested dataset.
    Orphan,
    /// An output edge exists but its run row is missing.
    Unknown,
}

/// One row of the incident correlation view: a failed or errored test joined
/// to its producing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRow {
    /// Surrogate test-result identifier.
    pub test_result_id: i64,
    /// Assertion name.
    pub test_name: String,
    /// Assertion category.
    pub test_type: String,
    /// Test outcome; always failed or error inside the view.
    pub status: TestStatus,
    /// Optional producer-supplied message.
    pub message: Option<String>,
    /// Assertion execution time.
    #[serde(with = "time::serde::rfc3339")]
    pub executed_at: OffsetDateTime,
    /// Canonical URN of the tested dataset.
    pub dataset_urn: DatasetUrn,
    /// Name component of the tested dataset.
    pub dataset_name: String,
    /// Namespace component of the tested dataset.
    pub dataset_namespace: String,
    /// Producer that reported the test.
    pub test_producer: String,
    /// Canonical identity of the producing run, when correlated.
    pub job_run_id: Option<JobRunId>,
    /// Producing job name, when correlated.
    pub job_name: Option<String>,
    /// Producing job namespace, when correlated.
    pub job_namespace: Option<String>,
    /// Producing run state, when correlated.
    pub job_state: Option<RunState>,
    /// Producing run completion time, when observed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub job_completed_at: Option<OffsetDateTime>,
    /// Producer URL of the producing run, when correlated.
    pub job_producer: Option<String>,
}

/// Full incident detail, including parent-run fields where present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentDetail {
    /// The incident row itself.
    pub incident: IncidentRow,
    /// Correlation outcome for the tested dataset.
    pub correlation_status: CorrelationStatus,
    /// Parent run of the producing run, when declared and stored.
    pub parent: Option<RunRecord>,
}

/// Filter over the incident correlation view; `None` fields are ignored and
/// present fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    /// Producing run state filter.
    pub job_status: Option<RunState>,
    /// Producer URL filter (exact match on the producing run's producer).
    pub producer_name: Option<String>,
    /// Tested dataset URN filter (exact match).
    pub dataset_urn: Option<String>,
    /// Producing run identity filter (exact match).
    pub job_run_id: Option<String>,
    /// Tool filter (prefix match on the producing run identity).
    pub tool: Option<String>,
    /// Lower bound (inclusive) on test execution time.
    pub executed_after: Option<OffsetDateTime>,
    /// Upper bound (inclusive) on test execution time.
    pub executed_before: Option<OffsetDateTime>,
}

/// Pagination window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum rows to return.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// One page of incidents plus the full filtered count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentPage {
    /// Incident rows for the requested window.
    pub incidents: Vec<IncidentRow>,
    /// Total rows matching the filter, independent of pagination.
    pub total: u64,
}

// ============================================================================
// SECTION: Traversal Rows
// ============================================================================

/// One row of the materialized downstream closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactRow {
    /// Run whose blast radius the row belongs to.
    pub job_run_id: JobRunId,
    /// Affected dataset URN.
    pub dataset_urn: DatasetUrn,
    /// Name component of the affected dataset.
    pub dataset_name: String,
    /// Hop count from the run's direct outputs (depth 0).
    pub depth: i64,
}

/// One downstream dataset reached through consuming jobs, with the dataset
/// it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamRow {
    /// Affected dataset URN.
    pub dataset_urn: DatasetUrn,
    /// Name component of the affected dataset.
    pub name: String,
    /// Hop count; always at least 1.
    pub depth: i64,
    /// URN of the dataset this one was derived from.
    pub parent_urn: DatasetUrn,
    /// Producer URL of the run that wrote the dataset, when known.
    pub producer: Option<String>,
}

/// One upstream dataset reached backward through producing jobs, with the
/// dataset it feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamRow {
    /// Upstream dataset URN.
    pub dataset_urn: DatasetUrn,
    /// Name component of the upstream dataset.
    pub name: String,
    /// Hop count; always at least 1.
    pub depth: i64,
    /// URN of the downstream dataset this one feeds.
    pub child_urn: DatasetUrn,
    /// Producer URL of the run that wrote the dataset, when known.
    pub producer: Option<String>,
}

/// Run detail with its direct lineage edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDetail {
    /// The run row.
    pub run: RunRecord,
    /// URNs the run read.
    pub inputs: Vec<DatasetUrn>,
    /// URNs the run wrote.
    pub outputs: Vec<DatasetUrn>,
}

// ============================================================================
// SECTION: Summary Rows
// ============================================================================

/// One row of the seven-day incident summary, keyed by run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentIncidentRow {
    /// Canonical run identity.
    pub job_run_id: JobRunId,
    /// Job name.
    pub job_name: String,
    /// Canonical job namespace.
    pub job_namespace: String,
    /// Producer URL.
    pub producer_name: String,
    /// Failed-test count in the window.
    pub failed_tests: u64,
    /// Errored-test count in the window.
    pub error_tests: u64,
    /// Distinct datasets with incidents in the window.
    pub datasets_affected: u64,
    /// Most recent failure time in the window.
    #[serde(with = "time::serde::rfc3339")]
    pub last_failure_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Orphans and Suggestions
// ============================================================================

/// A produced dataset whose extracted table name equals an orphan's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikelyMatch {
    /// URN of the candidate produced dataset.
    pub dataset_urn: DatasetUrn,
    /// Match confidence; `1.0` for exact table-name equality.
    pub confidence: f64,
}

/// A dataset with test results but no producing output edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanDataset {
    /// URN under which the validator reported tests.
    pub dataset_urn: DatasetUrn,
    /// Number of test results recorded against the URN.
    pub test_count: u64,
    /// Most recent test execution against the URN.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_tested_at: Option<OffsetDateTime>,
    /// Candidate produced dataset, when one matches.
    pub likely_match: Option<LikelyMatch>,
}

/// An advisory rewrite template that would turn orphans into matches.
///
/// # Invariants
/// - Applying `pattern` → `canonical` to each member of `orphans_resolved`
///   yields a URN present among produced datasets at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPattern {
    /// Source template, e.g. `demo_postgres/{name}`.
    pub pattern: String,
    /// Canonical template, e.g. `postgresql://demo/{name}`.
    pub canonical: String,
    /// Number of orphans the suggestion resolves.
    pub resolves_count: u64,
    /// Orphan URNs the suggestion resolves.
    pub orphans_resolved: Vec<DatasetUrn>,
}

/// Aggregate correlation health.
///
/// # Invariants
/// - `correlation_rate` is within `[0, 1]` and equals `1.0` when no tested
///   datasets exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationHealth {
    /// Fraction of tested datasets that are also produced.
    pub correlation_rate: f64,
    /// Distinct tested dataset URNs.
    pub total_datasets: u64,
    /// Distinct produced dataset URNs.
    pub produced_datasets: u64,
    /// Tested datasets that are also produced.
    pub correlated_datasets: u64,
    /// Tested-but-never-produced datasets.
    pub orphan_datasets: Vec<OrphanDataset>,
    /// Advisory rewrite templates, never auto-applied.
    pub suggested_patterns: Vec<SuggestedPattern>,
}
