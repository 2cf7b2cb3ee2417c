// crates/correlator-core/src/runtime/fingerprint.rs
// ============================================================================
// Module: Idempotency Fingerprint
// Description: Content fingerprint for at-most-once event ingestion.
// Purpose: Derive a stable hex digest from the event identity tuple.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! The fingerprint covers `(producer, runID, eventTime, eventType, sorted
//! dataset URNs)`. Two submissions of the same event content always produce
//! the same digest, and the store records it inside the ingestion
//! transaction so the gate is strictly at-most-once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;

use crate::core::identifiers::DatasetUrn;
use crate::core::identifiers::RawRunId;
use crate::core::record::EventType;

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

/// Computes the idempotency fingerprint for one event.
///
/// Input and output URNs are concatenated and sorted before hashing, so the
/// fingerprint is insensitive to array order within the event. Event time is
/// folded in as epoch nanoseconds, which is total and lossless for RFC-3339
/// inputs.
#[must_use]
pub fn event_fingerprint(
    producer_name: &str,
    raw_run_id: &RawRunId,
    event_time: OffsetDateTime,
    event_type: EventType,
    inputs: &[DatasetUrn],
    outputs: &[DatasetUrn],
) -> String {
    let mut urns: Vec<&str> = inputs
        .iter()
        .map(DatasetUrn::as_str)
        .chain(outputs.iter().map(DatasetUrn::as_str))
        .collect();
    urns.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(producer_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(raw_run_id.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(event_time.unix_timestamp_nanos().to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(event_type.as_str().as_bytes());
    for urn in urns {
        hasher.update(b"\n");
        hasher.update(urn.as_bytes());
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}
