// crates/correlator-server/src/contract.rs
// ============================================================================
// Module: HTTP API Contract
// Description: Response shapes for the correlation query endpoints.
// Purpose: Keep the wire contract explicit and separate from core rows.
// Dependencies: correlator-core, serde, time
// ============================================================================

//! ## Overview
//! All responses use snake_case keys. Optional timestamps serialize as JSON
//! `null`, never as a sentinel date. The batch ingestion envelope comes
//! straight from the core orchestrator; the shapes here cover the query
//! endpoints, which compose core read-model rows into API payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use correlator_core::CorrelationStatus;
use correlator_core::DownstreamRow;
use correlator_core::IncidentRow;
use correlator_core::RunRecord;
use correlator_core::TestStatus;
use correlator_core::UpstreamRow;
use correlator_core::ViewRefreshReport;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Error Shape
// ============================================================================

/// Body for non-envelope error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error description.
    pub error: String,
}

// ============================================================================
// SECTION: Incident List
// ============================================================================

/// One incident in the list response, with its blast-radius count.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentSummary {
    /// Incident row fields, flattened.
    #[serde(flatten)]
    pub incident: IncidentRow,
    /// Downstream datasets at risk (depth >= 1).
    pub downstream_count: u64,
}

/// Paged incident list plus the orphan banner count.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentListResponse {
    /// Incidents in the requested window.
    pub incidents: Vec<IncidentSummary>,
    /// Total incidents matching the filter.
    pub total: u64,
    /// Requested page size.
    pub limit: u32,
    /// Requested page offset.
    pub offset: u32,
    /// Count of tested-but-never-produced datasets, for the banner.
    pub orphan_count: u64,
}

// ============================================================================
// SECTION: Incident Detail
// ============================================================================

/// Test portion of an incident detail.
#[derive(Debug, Clone, Serialize)]
pub struct TestBody {
    /// Surrogate test-result identifier.
    pub id: i64,
    /// Assertion name.
    pub name: String,
    /// Assertion category.
    pub test_type: String,
    /// Test outcome.
    pub status: TestStatus,
    /// Optional producer-supplied message.
    pub message: Option<String>,
    /// Assertion execution time.
    #[serde(with = "time::serde::rfc3339")]
    pub executed_at: OffsetDateTime,
    /// Producer that reported the test.
    pub producer: String,
}

/// Dataset portion of an incident detail.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetBody {
    /// Canonical dataset URN.
    pub urn: String,
    /// Name component.
    pub name: String,
    /// Namespace component.
    pub namespace: String,
}

/// Full incident detail response.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentDetailResponse {
    /// The failing test.
    pub test: TestBody,
    /// The tested dataset.
    pub dataset: DatasetBody,
    /// Producing run, when correlated.
    pub job: Option<RunRecord>,
    /// Upstream datasets feeding the tested dataset, with anchors.
    pub upstream: Vec<UpstreamRow>,
    /// Downstream datasets at risk, with their parents.
    pub downstream: Vec<DownstreamRow>,
    /// Correlation outcome for the tested dataset.
    pub correlation_status: CorrelationStatus,
    /// Parent run of the producing run, when declared.
    pub parent: Option<RunRecord>,
    /// Orchestration chain from root to the producing run.
    pub orchestration: Vec<RunRecord>,
}

impl IncidentDetailResponse {
    /// Splits an incident row into the test and dataset bodies.
    #[must_use]
    pub fn bodies(row: &IncidentRow) -> (TestBody, DatasetBody) {
        (
            TestBody {
                id: row.test_result_id,
                name: row.test_name.clone(),
                test_type: row.test_type.clone(),
                status: row.status,
                message: row.message.clone(),
                executed_at: row.executed_at,
                producer: row.test_producer.clone(),
            },
            DatasetBody {
                urn: row.dataset_urn.as_str().to_string(),
                name: row.dataset_name.clone(),
                namespace: row.dataset_namespace.clone(),
            },
        )
    }
}

// ============================================================================
// SECTION: Operational Responses
// ============================================================================

/// Liveness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthzResponse {
    /// Probe status label.
    pub status: &'static str,
}

/// View refresh response.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    /// Per-view refresh durations in execution order.
    #[serde(flatten)]
    pub report: ViewRefreshReport,
}

/// Seven-day incident summary response.
#[derive(Debug, Clone, Serialize)]
pub struct RecentIncidentsResponse {
    /// Summary rows ordered by most recent failure.
    pub recent: Vec<correlator_core::RecentIncidentRow>,
}

// ============================================================================
// SECTION: Query Parameters
// ============================================================================

/// Query parameters accepted by the incident list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentsQuery {
    /// Maximum rows to return.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Rows to skip.
    #[serde(default)]
    pub offset: Option<u32>,
    /// Lower bound (inclusive, RFC-3339) on test execution time.
    #[serde(default)]
    pub since: Option<String>,
    /// Tool filter (prefix match on the producing run identity).
    #[serde(default)]
    pub tool: Option<String>,
    /// Producer URL filter.
    #[serde(default)]
    pub producer: Option<String>,
    /// Tested dataset URN filter.
    #[serde(default)]
    pub dataset_urn: Option<String>,
    /// Producing run identity filter.
    #[serde(default)]
    pub job_run_id: Option<String>,
}

/// Query parameters accepted by the recent incidents endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentQuery {
    /// Maximum rows to return.
    #[serde(default)]
    pub limit: Option<u32>,
}
