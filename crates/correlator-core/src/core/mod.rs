// crates/correlator-core/src/core/mod.rs
// ============================================================================
// Module: Correlator Core Types
// Description: Canonical domain and wire types for the incident correlator.
// Purpose: Provide stable, serializable types for runs, datasets, and tests.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core types define the OpenLineage wire model accepted at ingestion, the
//! persisted lineage graph rows, and the read-model rows served by the
//! correlation reader. These types are the canonical source of truth for any
//! derived API surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod event;
pub mod identifiers;
pub mod record;
pub mod view;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use event::AssertionOutcome;
pub use event::DataQualityAssertion;
pub use event::DatasetRef;
pub use event::EventDataset;
pub use event::JobSection;
pub use event::ParentRunFacet;
pub use event::RunEvent;
pub use event::RunSection;
pub use event::ValidatedEvent;
pub use event::ValidatedParent;
pub use identifiers::DatasetUrn;
pub use identifiers::JobRunId;
pub use identifiers::RawRunId;
pub use identifiers::TOOL_UNKNOWN;
pub use identifiers::canonicalize;
pub use identifiers::extract_table_name;
pub use identifiers::producer_version;
pub use identifiers::split_urn;
pub use record::EdgeType;
pub use record::EventType;
pub use record::LineageEdge;
pub use record::PreparedDataset;
pub use record::PreparedEvent;
pub use record::PreparedTestResult;
pub use record::RunRecord;
pub use record::RunState;
pub use record::TestStatus;
pub use view::CorrelationHealth;
pub use view::CorrelationStatus;
pub use view::DownstreamRow;
pub use view::ImpactRow;
pub use view::IncidentDetail;
pub use view::IncidentFilter;
pub use view::IncidentPage;
pub use view::IncidentRow;
pub use view::LikelyMatch;
pub use view::OrphanDataset;
pub use view::Page;
pub use view::RecentIncidentRow;
pub use view::RunDetail;
pub use view::SuggestedPattern;
pub use view::UpstreamRow;
