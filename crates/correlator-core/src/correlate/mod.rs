// crates/correlator-core/src/correlate/mod.rs
// ============================================================================
// Module: Orphan and Pattern Analysis
// Description: Tested-vs-produced gap analysis and rewrite suggestions.
// Purpose: Identify datasets the validator and producer disagree on and
//          propose configuration that would repair the correlation.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! An orphan is a dataset URN that appears in test results but never as the
//! target of an output edge. Orphans are matched against produced URNs by
//! extracted table name, and matched orphans are grouped into advisory
//! rewrite templates. Suggestions are never applied automatically; operators
//! review them and update configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::core::identifiers::DatasetUrn;
use crate::core::identifiers::extract_table_name;
use crate::core::identifiers::split_urn;
use crate::core::view::CorrelationHealth;
use crate::core::view::LikelyMatch;
use crate::core::view::OrphanDataset;
use crate::core::view::SuggestedPattern;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// One distinct tested dataset as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestedDataset {
    /// URN under which tests were recorded.
    pub urn: DatasetUrn,
    /// Number of recorded test results.
    pub test_count: u64,
    /// Most recent test execution time.
    pub last_tested_at: Option<OffsetDateTime>,
}

// ============================================================================
// SECTION: Orphan Detection
// ============================================================================

/// Finds tested datasets that no run has produced.
///
/// Each orphan is matched against produced URNs by equality of
/// [`extract_table_name`]; an exact table-name match carries confidence
/// `1.0` and anything weaker is left unmatched. Candidates are scanned in
/// sorted URN order so ties resolve deterministically.
#[must_use]
pub fn find_orphans(tested: &[TestedDataset], produced: &[DatasetUrn]) -> Vec<OrphanDataset> {
    let produced_set: BTreeSet<&str> = produced.iter().map(DatasetUrn::as_str).collect();
    let mut by_table: BTreeMap<&str, &DatasetUrn> = BTreeMap::new();
    for urn in produced {
        by_table.entry(extract_table_name(urn.as_str())).or_insert(urn);
    }

    let mut orphans = Vec::new();
    for dataset in tested {
        if produced_set.contains(dataset.urn.as_str()) {
            continue;
        }
        let table = extract_table_name(dataset.urn.as_str());
        let likely_match = by_table.get(table).map(|candidate| LikelyMatch {
            dataset_urn: (*candidate).clone(),
            confidence: 1.0,
        });
        orphans.push(OrphanDataset {
            dataset_urn: dataset.urn.clone(),
            test_count: dataset.test_count,
            last_tested_at: dataset.last_tested_at,
            likely_match,
        });
    }
    orphans
}

// ============================================================================
// SECTION: Pattern Suggestions
// ============================================================================

/// Proposes rewrite templates that would turn orphans into matches.
///
/// Only orphans whose likely match shares the full dataset-name component
/// participate; that guarantees substituting `{name}` reproduces the
/// produced URN exactly. Orphans are grouped by the
/// `(orphan namespace, canonical namespace)` pair and emitted as one
/// suggestion per group, sorted by resolved count descending with
/// lexicographic pattern tie-breaks.
#[must_use]
pub fn suggest_patterns(orphans: &[OrphanDataset]) -> Vec<SuggestedPattern> {
    let mut groups: BTreeMap<(String, String), Vec<DatasetUrn>> = BTreeMap::new();
    for orphan in orphans {
        let Some(likely) = &orphan.likely_match else {
            continue;
        };
        let Some((orphan_namespace, orphan_name)) = split_urn(orphan.dataset_urn.as_str()) else {
            continue;
        };
        let Some((canonical_namespace, canonical_name)) = split_urn(likely.dataset_urn.as_str())
        else {
            continue;
        };
        if orphan_name != canonical_name {
            continue;
        }
        groups
            .entry((orphan_namespace.to_string(), canonical_namespace.to_string()))
            .or_default()
            .push(orphan.dataset_urn.clone());
    }

    let mut suggestions: Vec<SuggestedPattern> = groups
        .into_iter()
        .map(|((orphan_namespace, canonical_namespace), resolved)| SuggestedPattern {
            pattern: format!("{orphan_namespace}/{{name}}"),
            canonical: format!("{canonical_namespace}/{{name}}"),
            resolves_count: resolved.len() as u64,
            orphans_resolved: resolved,
        })
        .collect();
    suggestions.sort_by(|left, right| {
        right
            .resolves_count
            .cmp(&left.resolves_count)
            .then_with(|| left.pattern.cmp(&right.pattern))
    });
    suggestions
}

// ============================================================================
// SECTION: Health Aggregation
// ============================================================================

/// Aggregates correlation health from tested and produced datasets.
///
/// The correlation rate is the fraction of tested datasets that are also
/// produced, defined as `1.0` when nothing is tested.
#[must_use]
pub fn analyze_correlation(
    tested: &[TestedDataset],
    produced: &[DatasetUrn],
) -> CorrelationHealth {
    let produced_set: BTreeSet<&str> = produced.iter().map(DatasetUrn::as_str).collect();
    let correlated = tested
        .iter()
        .filter(|dataset| produced_set.contains(dataset.urn.as_str()))
        .count() as u64;
    let total = tested.len() as u64;
    let correlation_rate = if total == 0 {
        1.0
    } else {
        correlated as f64 / total as f64
    };
    let orphan_datasets = find_orphans(tested, produced);
    let suggested_patterns = suggest_patterns(&orphan_datasets);
    CorrelationHealth {
        correlation_rate,
        total_datasets: total,
        produced_datasets: produced_set.len() as u64,
        correlated_datasets: correlated,
        orphan_datasets,
        suggested_patterns,
    }
}
