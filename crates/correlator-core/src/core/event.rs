// crates/correlator-core/src/core/event.rs
// ============================================================================
// Module: OpenLineage Wire Model
// Description: Serde model for incoming OpenLineage run events.
// Purpose: Accept the 2-0-2 event shape with open-world facets and carry the
//          validated form used by the ingestion pipeline.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! The wire model is deliberately loose: every field the validator checks is
//! optional here so a single malformed event fails with a precise
//! `validation` error instead of failing the whole batch at the
//! deserialization boundary. Facets are open-world; unrecognized facets are
//! preserved as raw JSON and never interpreted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::identifiers::RawRunId;
use crate::core::record::EventType;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// One OpenLineage run event as received from a producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    /// Event time in RFC-3339 form.
    #[serde(default)]
    pub event_time: Option<String>,
    /// Event type (`START`, `RUNNING`, `COMPLETE`, `FAIL`, `ABORT`,
    /// `OTHER`).
    #[serde(default)]
    pub event_type: Option<String>,
    /// Producer URL.
    #[serde(default)]
    pub producer: Option<String>,
    /// Schema URL for the event shape.
    #[serde(default, rename = "schemaURL")]
    pub schema_url: Option<String>,
    /// Run section carrying the producer run identifier and run facets.
    #[serde(default)]
    pub run: Option<RunSection>,
    /// Job section identifying the executing job.
    #[serde(default)]
    pub job: Option<JobSection>,
    /// Datasets the run read.
    #[serde(default)]
    pub inputs: Vec<DatasetRef>,
    /// Datasets the run wrote.
    #[serde(default)]
    pub outputs: Vec<DatasetRef>,
}

/// Run section of an OpenLineage event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSection {
    /// Opaque, UUID-shaped producer run identifier.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Run facets; only `parent` is interpreted.
    #[serde(default)]
    pub facets: RunFacets,
}

/// Facets attached to the run section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFacets {
    /// Parent run facet carrying the orchestrating run's identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRunFacet>,
    /// Unrecognized facets, preserved but not interpreted.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Parent run facet (`run.facets.parent`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentRunFacet {
    /// Producer URL of the facet's emitter, when reported.
    #[serde(default, rename = "_producer", skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    /// Parent run subsection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<FacetRun>,
    /// Parent job subsection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<FacetJob>,
    /// Unrecognized facet fields, preserved but not interpreted.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Run subsection inside a facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetRun {
    /// Opaque run identifier.
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Job subsection inside a facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetJob {
    /// Job namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Job name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Job section of an OpenLineage event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSection {
    /// Tool-specific job namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Job name.
    #[serde(default)]
    pub name: Option<String>,
    /// Job facets, preserved but not interpreted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Value>,
}

/// Dataset reference in the inputs or outputs array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Tool-specific dataset namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Dataset name inside the namespace.
    #[serde(default)]
    pub name: Option<String>,
    /// Dataset facets; only `dataQualityAssertions` is interpreted.
    #[serde(default)]
    pub facets: DatasetFacets,
}

/// Facets attached to a dataset reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFacets {
    /// Data-quality assertion outcomes evaluated against the dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality_assertions: Option<DataQualityAssertionsFacet>,
    /// Unrecognized facets, preserved but not interpreted.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// The `dataQualityAssertions` dataset facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityAssertionsFacet {
    /// Individual assertion outcomes.
    #[serde(default)]
    pub assertions: Vec<DataQualityAssertion>,
    /// Unrecognized facet fields, preserved but not interpreted.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// One assertion inside the `dataQualityAssertions` facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityAssertion {
    /// Assertion name, e.g. `not_null(order_id)`.
    #[serde(default)]
    pub assertion: Option<String>,
    /// Whether the assertion held.
    #[serde(default)]
    pub success: Option<bool>,
    /// Optional asserted column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

// ============================================================================
// SECTION: Validated Types
// ============================================================================

/// One assertion outcome after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    /// Assertion name.
    pub name: String,
    /// Whether the assertion held.
    pub success: bool,
    /// Optional asserted column.
    pub column: Option<String>,
}

/// A dataset reference after validation, still in producer vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDataset {
    /// Raw producer namespace.
    pub namespace: String,
    /// Raw dataset name.
    pub name: String,
    /// Assertion outcomes attached to the dataset.
    pub assertions: Vec<AssertionOutcome>,
}

/// Validated parent run identity from the `parent` facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedParent {
    /// Raw parent run identifier.
    pub raw_run_id: RawRunId,
    /// Producer URL used to canonicalize the parent identity.
    pub producer: String,
    /// Parent job namespace, when declared.
    pub job_namespace: Option<String>,
    /// Parent job name, when declared.
    pub job_name: Option<String>,
}

/// A structurally and semantically valid OpenLineage event.
///
/// # Invariants
/// - `event_time` parsed from RFC-3339; `raw_run_id` is UUID-shaped;
///   `producer` parses as a URL.
/// - Identifiers remain in producer vocabulary; canonicalization happens in
///   a separate preparation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEvent {
    /// Parsed event time.
    pub event_time: OffsetDateTime,
    /// Parsed event type.
    pub event_type: EventType,
    /// Producer URL, verbatim.
    pub producer: String,
    /// Schema URL, verbatim.
    pub schema_url: String,
    /// Raw producer run identifier.
    pub raw_run_id: RawRunId,
    /// Raw job namespace.
    pub job_namespace: String,
    /// Job name.
    pub job_name: String,
    /// Declared parent run, when the facet is present.
    pub parent: Option<ValidatedParent>,
    /// Validated input datasets.
    pub inputs: Vec<EventDataset>,
    /// Validated output datasets.
    pub outputs: Vec<EventDataset>,
}
