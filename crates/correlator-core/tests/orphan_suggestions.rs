// crates/correlator-core/tests/orphan_suggestions.rs
// ============================================================================
// Module: Orphan and Suggestion Unit Tests
// Description: Tests for tested-vs-produced analysis and rewrite templates.
// Purpose: Validate orphan detection, likely matching, suggestion grouping,
//          and correlation-rate bounds.
// Dependencies: correlator-core
// ============================================================================

//! ## Overview
//! Exercises the orphan detector and pattern suggester with the literal
//! dbt-vs-validator naming mismatch scenario plus grouping, ordering, and
//! soundness checks.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use correlator_core::DatasetUrn;
use correlator_core::TestedDataset;
use correlator_core::analyze_correlation;
use correlator_core::find_orphans;
use correlator_core::suggest_patterns;

fn tested(urns: &[&str]) -> Vec<TestedDataset> {
    urns.iter()
        .map(|urn| TestedDataset {
            urn: DatasetUrn::new(*urn),
            test_count: 1,
            last_tested_at: None,
        })
        .collect()
}

fn produced(urns: &[&str]) -> Vec<DatasetUrn> {
    urns.iter().map(|urn| DatasetUrn::new(*urn)).collect()
}

#[test]
fn orphan_with_exact_table_match_gets_full_confidence() {
    let orphans = find_orphans(
        &tested(&["demo_postgres/marts.customers"]),
        &produced(&["postgresql://demo/marts.customers"]),
    );
    assert_eq!(orphans.len(), 1);
    let likely = orphans[0].likely_match.as_ref().expect("likely match present");
    assert_eq!(likely.dataset_urn.as_str(), "postgresql://demo/marts.customers");
    assert!((likely.confidence - 1.0).abs() < f64::EPSILON);
}

#[test]
fn produced_dataset_is_not_an_orphan() {
    let orphans = find_orphans(
        &tested(&["postgresql://demo/marts.customers"]),
        &produced(&["postgresql://demo/marts.customers"]),
    );
    assert!(orphans.is_empty());
}

#[test]
fn orphan_without_table_match_stays_unmatched() {
    let orphans = find_orphans(
        &tested(&["demo_postgres/marts.customers"]),
        &produced(&["postgresql://demo/marts.orders"]),
    );
    assert_eq!(orphans.len(), 1);
    assert!(orphans[0].likely_match.is_none());
}

#[test]
fn suggestion_covers_the_naming_mismatch_scenario() {
    let orphans = find_orphans(
        &tested(&["demo_postgres/marts.customers"]),
        &produced(&["postgresql://demo/marts.customers"]),
    );
    let suggestions = suggest_patterns(&orphans);
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].pattern, "demo_postgres/{name}");
    assert_eq!(suggestions[0].canonical, "postgresql://demo/{name}");
    assert_eq!(suggestions[0].resolves_count, 1);
    assert_eq!(suggestions[0].orphans_resolved[0].as_str(), "demo_postgres/marts.customers");
}

#[test]
fn suggestions_require_full_name_equality() {
    // Table names match (customers) but the name components differ, so
    // substituting {name} would not reproduce the produced URN.
    let orphans = find_orphans(
        &tested(&["demo_postgres/staging.customers"]),
        &produced(&["postgresql://demo/marts.customers"]),
    );
    assert!(orphans[0].likely_match.is_some());
    assert!(suggest_patterns(&orphans).is_empty());
}

#[test]
fn suggestions_group_by_namespace_pair_and_sort_by_count() {
    let orphans = find_orphans(
        &tested(&[
            "demo_postgres/marts.customers",
            "demo_postgres/marts.orders",
            "legacy_wh/facts.revenue",
        ]),
        &produced(&[
            "postgresql://demo/marts.customers",
            "postgresql://demo/marts.orders",
            "warehouse://main/facts.revenue",
        ]),
    );
    let suggestions = suggest_patterns(&orphans);
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].pattern, "demo_postgres/{name}");
    assert_eq!(suggestions[0].resolves_count, 2);
    assert_eq!(suggestions[1].pattern, "legacy_wh/{name}");
    assert_eq!(suggestions[1].resolves_count, 1);
}

#[test]
fn equal_counts_tie_break_lexicographically() {
    let orphans = find_orphans(
        &tested(&["zeta/marts.a", "alpha/marts.b"]),
        &produced(&["postgresql://z/marts.a", "postgresql://a/marts.b"]),
    );
    let suggestions = suggest_patterns(&orphans);
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].pattern, "alpha/{name}");
    assert_eq!(suggestions[1].pattern, "zeta/{name}");
}

#[test]
fn suggestion_application_reproduces_produced_urns() {
    let produced_urns = produced(&[
        "postgresql://demo/marts.customers",
        "postgresql://demo/marts.orders",
    ]);
    let orphans = find_orphans(
        &tested(&["demo_postgres/marts.customers", "demo_postgres/marts.orders"]),
        &produced_urns,
    );
    for suggestion in suggest_patterns(&orphans) {
        let prefix = suggestion.pattern.trim_end_matches("{name}");
        let target = suggestion.canonical.trim_end_matches("{name}");
        for orphan in &suggestion.orphans_resolved {
            let name = orphan.as_str().strip_prefix(prefix).expect("orphan matches pattern");
            let rewritten = format!("{target}{name}");
            assert!(
                produced_urns.iter().any(|urn| urn.as_str() == rewritten),
                "rewritten {rewritten} must be a produced URN"
            );
        }
    }
}

#[test]
fn correlation_rate_is_one_with_no_tested_datasets() {
    let health = analyze_correlation(&[], &produced(&["postgresql://demo/marts.customers"]));
    assert!((health.correlation_rate - 1.0).abs() < f64::EPSILON);
    assert_eq!(health.total_datasets, 0);
    assert_eq!(health.produced_datasets, 1);
}

#[test]
fn correlation_rate_counts_correlated_fraction() {
    let health = analyze_correlation(
        &tested(&["postgresql://demo/marts.customers", "demo_postgres/marts.orders"]),
        &produced(&["postgresql://demo/marts.customers", "postgresql://demo/marts.orders"]),
    );
    assert!((health.correlation_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(health.correlated_datasets, 1);
    assert_eq!(health.orphan_datasets.len(), 1);
    assert_eq!(health.suggested_patterns.len(), 1);
    assert!(health.correlation_rate >= 0.0 && health.correlation_rate <= 1.0);
}
