// crates/correlator-core/src/core/identifiers.rs
// ============================================================================
// Module: Correlator Identifiers
// Description: Canonical identifiers for runs and datasets across producers.
// Purpose: Provide strongly typed identifiers with stable wire forms plus the
//          canonicalization rules that derive them.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Heterogeneous producers name the same logical objects differently. This
//! module defines the canonical `tool:runID` run identity, the canonical
//! dataset URN, and the helpers that derive them: producer-URL tool
//! detection, table-name extraction, and URN splitting. Identifiers are
//! opaque strings on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Canonical job-run identifier in `tool:runID` form.
///
/// # Invariants
/// - Always contains exactly one tool token from the closed set, a `:`, then
///   the producer's run identifier verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRunId(String);

impl JobRunId {
    /// Creates a job-run identifier from an already-canonical string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the tool token prefix (the part before the first `:`).
    #[must_use]
    pub fn tool(&self) -> &str {
        match self.0.find(':') {
            Some(index) => &self.0[..index],
            None => &self.0,
        }
    }
}

impl fmt::Display for JobRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for JobRunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobRunId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Opaque run identifier exactly as emitted by a producer.
///
/// # Invariants
/// - Never normalized; UUID shape is enforced at validation, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRunId(String);

impl RawRunId {
    /// Creates a raw run identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RawRunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RawRunId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Canonical dataset URN in `namespace/name` form.
///
/// # Invariants
/// - The stored form is always post-normalization (alias then pattern).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetUrn(String);

impl DatasetUrn {
    /// Creates a dataset URN from an already-canonical string.
    #[must_use]
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Returns the URN as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DatasetUrn {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DatasetUrn {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Tool token assigned to producers that match no known tool.
pub const TOOL_UNKNOWN: &str = "unknown";

/// Prefix the correlator's own producer adapters embed in their URLs.
///
/// # Invariants
/// - Stripped before tool detection so adapter URLs resolve to the wrapped
///   tool rather than to the adapter repository host.
const ADAPTER_PREFIX: &str = "correlator-io/adapter-";

/// Ordered substring-to-token mappings scanned against producer URLs.
///
/// # Invariants
/// - First match wins; order is part of the canonical identity contract.
/// - Tokens form a closed set; additions require a coordinated rollout.
const TOOL_TOKENS: &[(&str, &str)] = &[
    ("dbt", "dbt"),
    ("airflow", "airflow"),
    ("spark", "spark"),
    ("dagster", "dagster"),
    ("great-expectations", "great_expectations"),
    ("great_expectations", "great_expectations"),
    ("flink", "flink"),
];

/// Derives the canonical `tool:runID` identity for a job run.
///
/// The tool token is selected by scanning the lowercased producer URL against
/// the ordered substring table; the correlator's own adapter prefix is
/// stripped first. Unknown producers map to [`TOOL_UNKNOWN`]. The run
/// identifier is passed through verbatim.
#[must_use]
pub fn canonicalize(producer_url: &str, run_id: &str) -> JobRunId {
    let lowered = producer_url.to_ascii_lowercase();
    let scanned = match lowered.find(ADAPTER_PREFIX) {
        Some(index) => &lowered[index + ADAPTER_PREFIX.len()..],
        None => lowered.as_str(),
    };
    for (needle, token) in TOOL_TOKENS {
        if scanned.contains(needle) {
            return JobRunId::new(format!("{token}:{run_id}"));
        }
    }
    JobRunId::new(format!("{TOOL_UNKNOWN}:{run_id}"))
}

/// Extracts the bare table name from a dataset URN.
///
/// Returns the last `/`-segment of the URN, then the last `.`-segment of
/// that. Used only for fuzzy orphan matching, never for identity.
#[must_use]
pub fn extract_table_name(urn: &str) -> &str {
    let segment = match urn.rfind('/') {
        Some(index) => &urn[index + 1..],
        None => urn,
    };
    match segment.rfind('.') {
        Some(index) => &segment[index + 1..],
        None => segment,
    }
}

/// Splits a canonical URN into `(namespace, name)` at the final `/`.
///
/// Returns `None` when the URN contains no separator; such URNs cannot
/// participate in template suggestions because `{name}` captures exclude
/// `/`.
#[must_use]
pub fn split_urn(urn: &str) -> Option<(&str, &str)> {
    let index = urn.rfind('/')?;
    Some((&urn[..index], &urn[index + 1..]))
}

/// Extracts an optional producer version from a producer URL.
///
/// Producers commonly append a trailing version segment (`.../v1.8.2`); a
/// final path segment shaped like a dotted version number is reported,
/// anything else yields `None`.
#[must_use]
pub fn producer_version(producer_url: &str) -> Option<String> {
    let trimmed = producer_url.trim_end_matches('/');
    let segment = match trimmed.rfind('/') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    };
    let digits = segment.strip_prefix('v').unwrap_or(segment);
    if digits.is_empty() {
        return None;
    }
    let versionish = digits.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
        && digits.chars().any(|ch| ch.is_ascii_digit());
    if versionish {
        Some(digits.to_string())
    } else {
        None
    }
}
