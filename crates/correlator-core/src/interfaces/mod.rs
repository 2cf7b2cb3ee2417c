// crates/correlator-core/src/interfaces/mod.rs
// ============================================================================
// Module: Correlator Interfaces
// Description: Backend-agnostic interfaces for ingestion and correlation.
// Purpose: Define the contract surfaces between the core pipeline and the
//          relational store.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the correlator integrates with persistence without
//! embedding engine-specific details. Implementations must honor the
//! partial-failure semantics of single-event transactions: one event's
//! failure never rolls back another's success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::identifiers::DatasetUrn;
use crate::core::identifiers::JobRunId;
use crate::core::record::PreparedEvent;
use crate::core::view::CorrelationHealth;
use crate::core::view::DownstreamRow;
use crate::core::view::ImpactRow;
use crate::core::view::IncidentDetail;
use crate::core::view::IncidentFilter;
use crate::core::view::IncidentPage;
use crate::core::view::OrphanDataset;
use crate::core::view::Page;
use crate::core::view::RecentIncidentRow;
use crate::core::view::RunDetail;
use crate::core::view::UpstreamRow;

// ============================================================================
// SECTION: Error Taxonomy
// ============================================================================

/// Stable error kind labels surfaced by the ingestion pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestErrorKind {
    /// A single event failed structural or semantic validation.
    Validation,
    /// The batch body itself is unusable.
    Input,
    /// A uniqueness conflict survived retry.
    Conflict,
    /// A transient storage fault; the producer should retry the event.
    Transient,
    /// An unexpected invariant violation.
    #[default]
    Internal,
    /// The referenced entity does not exist.
    NotFound,
    /// The caller's deadline was reached.
    Cancelled,
}

impl IngestErrorKind {
    /// Returns a stable label for this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Input => "input",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Internal => "internal",
            Self::NotFound => "not_found",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Ingestion pipeline errors.
///
/// # Invariants
/// - Only [`IngestError::Transient`] is retriable.
/// - Messages never embed raw event payloads.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// Event failed validation.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Batch input unusable.
    #[error("invalid input: {0}")]
    Input(String),
    /// Uniqueness conflict after retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Transient storage fault.
    #[error("transient store error: {0}")]
    Transient(String),
    /// Unexpected invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
    /// Referenced entity missing.
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller deadline reached.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl IngestError {
    /// Returns the kind classification for this error.
    #[must_use]
    pub const fn kind(&self) -> IngestErrorKind {
        match self {
            Self::Validation(_) => IngestErrorKind::Validation,
            Self::Input(_) => IngestErrorKind::Input,
            Self::Conflict(_) => IngestErrorKind::Conflict,
            Self::Transient(_) => IngestErrorKind::Transient,
            Self::Internal(_) => IngestErrorKind::Internal,
            Self::NotFound(_) => IngestErrorKind::NotFound,
            Self::Cancelled(_) => IngestErrorKind::Cancelled,
        }
    }

    /// Returns true when the producer should retry the event.
    #[must_use]
    pub const fn retriable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Read-path and maintenance errors from the store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Storage engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Invalid stored data.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Caller deadline reached.
    #[error("store operation cancelled: {0}")]
    Cancelled(String),
}

// ============================================================================
// SECTION: Lineage Store
// ============================================================================

/// Receipt for one ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// True when the idempotency gate absorbed the event without writes.
    pub duplicate: bool,
}

/// Duration of one refreshed correlation view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRefresh {
    /// View name.
    pub view: String,
    /// Refresh duration in milliseconds.
    pub duration_ms: u64,
}

/// Report for one dependency-ordered view refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRefreshReport {
    /// Refreshed views in execution order.
    pub refreshed: Vec<ViewRefresh>,
}

/// Transactional writer for the lineage graph.
pub trait LineageStore: Send + Sync {
    /// Ingests one prepared event inside a single transaction.
    ///
    /// A fingerprint hit reports success with the `duplicate` marker and
    /// causes no writes. Any step failure rolls the whole transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] classified per the error taxonomy.
    fn ingest_event(&self, event: &PreparedEvent) -> Result<IngestReceipt, IngestError>;

    /// Refreshes the correlation views in dependency order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a refresh step fails; earlier steps are
    /// not rolled back.
    fn refresh_views(&self) -> Result<ViewRefreshReport, StoreError>;

    /// Deletes idempotency fingerprints recorded before the cutoff and
    /// returns the number removed.
    ///
    /// Retention scheduling is an operator concern; this is only the
    /// primitive.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the deletion fails.
    fn prune_idempotency_keys(&self, older_than: OffsetDateTime) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Correlation Reader
// ============================================================================

/// Read-only correlation queries over committed state.
///
/// Implementations must not mutate and must serve from the derived read
/// model; callers rely on every method being a pure function of committed
/// rows.
pub trait CorrelationReader: Send + Sync {
    /// Lists incidents matching the filter, with the full filtered count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn incidents(&self, filter: &IncidentFilter, page: Page) -> Result<IncidentPage, StoreError>;

    /// Fetches one incident with parent-run fields, or `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn incident_by_id(&self, test_result_id: i64) -> Result<Option<IncidentDetail>, StoreError>;

    /// Reads the materialized blast radius for a run.
    ///
    /// `max_depth` semantics: `0` is unlimited within the ten-hop ceiling,
    /// `-1` restricts to depth 0 (direct outputs), positive values cap the
    /// depth.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn lineage_impact(
        &self,
        job_run_id: &JobRunId,
        max_depth: i64,
    ) -> Result<Vec<ImpactRow>, StoreError>;

    /// Traverses downstream datasets through consuming jobs; depth >= 1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn downstream_with_parents(
        &self,
        job_run_id: &JobRunId,
        max_depth: i64,
    ) -> Result<Vec<DownstreamRow>, StoreError>;

    /// Traverses upstream datasets through producing jobs, anchored at the
    /// tested dataset; depth >= 1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn upstream_with_children(
        &self,
        dataset_urn: &DatasetUrn,
        job_run_id: &JobRunId,
        max_depth: i64,
    ) -> Result<Vec<UpstreamRow>, StoreError>;

    /// Batch downstream-dataset counts keyed by run; missing key means 0.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn downstream_counts(
        &self,
        job_run_ids: &[JobRunId],
    ) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Reads the seven-day incident summary, most recent failures first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn recent_incidents(&self, limit: u32) -> Result<Vec<RecentIncidentRow>, StoreError>;

    /// Lists tested-but-never-produced datasets with likely matches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn orphan_datasets(&self) -> Result<Vec<OrphanDataset>, StoreError>;

    /// Aggregates correlation health: rate, counts, orphans, suggestions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn correlation_health(&self) -> Result<CorrelationHealth, StoreError>;

    /// Fetches one run with its direct lineage edges, or `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn run_detail(&self, job_run_id: &JobRunId) -> Result<Option<RunDetail>, StoreError>;
}
