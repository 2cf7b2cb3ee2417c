// crates/correlator-core/src/runtime/validate.rs
// ============================================================================
// Module: Event Validator
// Description: Structural and semantic validation of one OpenLineage event.
// Purpose: Turn the loose wire model into a fully typed validated event or a
//          precise field-level rejection.
// Dependencies: thiserror, time, url, uuid
// ============================================================================

//! ## Overview
//! Validation is strict on required fields and open-world on facets. A
//! failure names the offending field so producers can repair events without
//! guesswork. Identifiers stay in producer vocabulary here; normalization is
//! a separate step.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;
use uuid::Uuid;

use crate::core::event::AssertionOutcome;
use crate::core::event::DatasetRef;
use crate::core::event::EventDataset;
use crate::core::event::RunEvent;
use crate::core::event::ValidatedEvent;
use crate::core::event::ValidatedParent;
use crate::core::identifiers::RawRunId;
use crate::core::record::EventType;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Field-level validation failure for a single event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A mandatory field is absent or empty.
    #[error("missing required field: {0}")]
    MissingField(String),
    /// A field is present but semantically invalid.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Dotted path of the offending field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl ValidationError {
    /// Builds an invalid-field error.
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates one OpenLineage event.
///
/// Required fields: `eventTime` (RFC-3339), `eventType` (one of the six),
/// `producer` (URL), `schemaURL`, `run.runId` (UUID-shaped), `job.namespace`
/// and `job.name`. Input and output arrays may be empty, but every element
/// needs `namespace` and `name`. The `parent` run facet and
/// `dataQualityAssertions` dataset facet are interpreted; all other facets
/// pass through untouched.
///
/// # Errors
///
/// Returns [`ValidationError`] naming the offending field.
pub fn validate_event(event: &RunEvent) -> Result<ValidatedEvent, ValidationError> {
    let event_time = require(event.event_time.as_deref(), "eventTime")?;
    let event_time = OffsetDateTime::parse(event_time, &Rfc3339)
        .map_err(|err| ValidationError::invalid("eventTime", format!("not RFC-3339: {err}")))?;

    let event_type = require(event.event_type.as_deref(), "eventType")?;
    let event_type = EventType::parse(event_type)
        .ok_or_else(|| ValidationError::invalid("eventType", format!("unknown: {event_type}")))?;

    let producer = require(event.producer.as_deref(), "producer")?;
    Url::parse(producer)
        .map_err(|err| ValidationError::invalid("producer", format!("not a URL: {err}")))?;

    let schema_url = require(event.schema_url.as_deref(), "schemaURL")?;

    let run = event.run.as_ref().ok_or_else(|| ValidationError::MissingField("run".to_string()))?;
    let raw_run_id = require(run.run_id.as_deref(), "run.runId")?;
    Uuid::parse_str(raw_run_id)
        .map_err(|err| ValidationError::invalid("run.runId", format!("not UUID-shaped: {err}")))?;

    let job = event.job.as_ref().ok_or_else(|| ValidationError::MissingField("job".to_string()))?;
    let job_namespace = require(job.namespace.as_deref(), "job.namespace")?;
    let job_name = require(job.name.as_deref(), "job.name")?;

    let parent = match &run.facets.parent {
        None => None,
        Some(facet) => {
            let facet_run = facet
                .run
                .as_ref()
                .ok_or_else(|| ValidationError::MissingField("run.facets.parent.run".to_string()))?;
            let parent_run_id = require(facet_run.run_id.as_deref(), "run.facets.parent.run.runId")?;
            Some(ValidatedParent {
                raw_run_id: RawRunId::new(parent_run_id),
                producer: facet
                    .producer
                    .clone()
                    .unwrap_or_else(|| producer.to_string()),
                job_namespace: facet.job.as_ref().and_then(|job| job.namespace.clone()),
                job_name: facet.job.as_ref().and_then(|job| job.name.clone()),
            })
        }
    };

    let inputs = validate_datasets(&event.inputs, "inputs")?;
    let outputs = validate_datasets(&event.outputs, "outputs")?;

    Ok(ValidatedEvent {
        event_time,
        event_type,
        producer: producer.to_string(),
        schema_url: schema_url.to_string(),
        raw_run_id: RawRunId::new(raw_run_id),
        job_namespace: job_namespace.to_string(),
        job_name: job_name.to_string(),
        parent,
        inputs,
        outputs,
    })
}

/// Returns a trimmed-nonempty string field or a missing-field error.
fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ValidationError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}

/// Validates one dataset array, extracting assertion outcomes.
fn validate_datasets(
    datasets: &[DatasetRef],
    field: &str,
) -> Result<Vec<EventDataset>, ValidationError> {
    let mut validated = Vec::with_capacity(datasets.len());
    for (index, dataset) in datasets.iter().enumerate() {
        let namespace = require(dataset.namespace.as_deref(), &format!("{field}[{index}].namespace"))?;
        let name = require(dataset.name.as_deref(), &format!("{field}[{index}].name"))?;
        let mut assertions = Vec::new();
        if let Some(facet) = &dataset.facets.data_quality_assertions {
            for (assertion_index, assertion) in facet.assertions.iter().enumerate() {
                let path = format!(
                    "{field}[{index}].facets.dataQualityAssertions.assertions[{assertion_index}]"
                );
                let name = require(assertion.assertion.as_deref(), &format!("{path}.assertion"))?;
                let success = assertion
                    .success
                    .ok_or_else(|| ValidationError::MissingField(format!("{path}.success")))?;
                assertions.push(AssertionOutcome {
                    name: name.to_string(),
                    success,
                    column: assertion.column.clone(),
                });
            }
        }
        validated.push(EventDataset {
            namespace: namespace.to_string(),
            name: name.to_string(),
            assertions,
        });
    }
    Ok(validated)
}
