// crates/correlator-core/tests/canonical_id.rs
// ============================================================================
// Module: Canonical Identity Unit Tests
// Description: Tests for producer-URL tool detection and URN helpers.
// Purpose: Validate canonical run identity derivation and table extraction.
// Dependencies: correlator-core
// ============================================================================

//! ## Overview
//! Exercises `canonicalize`, `extract_table_name`, `split_urn`, and
//! `producer_version` against representative producer URLs and URNs.

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

use correlator_core::canonicalize;
use correlator_core::extract_table_name;
use correlator_core::producer_version;
use correlator_core::split_urn;

#[test]
fn dbt_producer_maps_to_dbt_token() {
    let id = canonicalize(
        "https://github.com/dbt-labs/dbt-core/v1.8.2",
        "550e8400-e29b-41d4-a716-446655440000",
    );
    assert_eq!(id.as_str(), "dbt:550e8400-e29b-41d4-a716-446655440000");
    assert_eq!(id.tool(), "dbt");
}

#[test]
fn airflow_and_spark_producers_map_to_their_tokens() {
    let airflow = canonicalize("https://airflow.apache.org", "run-1");
    assert_eq!(airflow.as_str(), "airflow:run-1");
    let spark = canonicalize("https://github.com/OpenLineage/OpenLineage/tree/1.9.1/integration/spark", "run-2");
    assert_eq!(spark.as_str(), "spark:run-2");
}

#[test]
fn unknown_producer_maps_to_unknown_token() {
    let id = canonicalize("https://example.com/some-tool", "abc");
    assert_eq!(id.as_str(), "unknown:abc");
}

#[test]
fn adapter_prefix_is_stripped_before_matching() {
    let id = canonicalize("https://github.com/correlator-io/adapter-dagster", "r");
    assert_eq!(id.tool(), "dagster");
}

#[test]
fn matching_is_case_insensitive() {
    let id = canonicalize("https://GitHub.com/DBT-Labs/DBT-core", "r");
    assert_eq!(id.tool(), "dbt");
}

#[test]
fn run_id_passes_through_verbatim() {
    let raw = "550E8400-E29B-41D4-A716-446655440000";
    let id = canonicalize("https://airflow.apache.org", raw);
    assert_eq!(id.as_str(), format!("airflow:{raw}"));
}

#[test]
fn great_expectations_variants_share_a_token() {
    let dashed = canonicalize("https://github.com/great-expectations/great_expectations", "r");
    assert_eq!(dashed.tool(), "great_expectations");
    let underscored = canonicalize("https://greatexpectations.io/great_expectations", "r");
    assert_eq!(underscored.tool(), "great_expectations");
}

#[test]
fn extract_table_name_takes_last_path_then_last_dot_segment() {
    assert_eq!(extract_table_name("postgres://db:5432/analytics.public.orders"), "orders");
    assert_eq!(extract_table_name("demo_postgres/marts.customers"), "customers");
    assert_eq!(extract_table_name("warehouse/plain"), "plain");
    assert_eq!(extract_table_name("nodelimiters"), "nodelimiters");
    assert_eq!(extract_table_name(""), "");
}

#[test]
fn split_urn_splits_at_final_slash() {
    assert_eq!(
        split_urn("postgresql://demo/marts.customers"),
        Some(("postgresql://demo", "marts.customers"))
    );
    assert_eq!(split_urn("demo_postgres/marts.customers"), Some(("demo_postgres", "marts.customers")));
    assert_eq!(split_urn("bare"), None);
}

#[test]
fn producer_version_detects_trailing_version_segments() {
    assert_eq!(
        producer_version("https://github.com/dbt-labs/dbt-core/v1.8.2"),
        Some("1.8.2".to_string())
    );
    assert_eq!(producer_version("https://github.com/apache/airflow/2.9.0"), Some("2.9.0".to_string()));
    assert_eq!(producer_version("https://airflow.apache.org"), None);
    assert_eq!(producer_version("https://example.com/tool/"), None);
}
