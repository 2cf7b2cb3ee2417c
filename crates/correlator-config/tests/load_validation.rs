// crates/correlator-config/tests/load_validation.rs
// ============================================================================
// Module: Configuration Loading Tests
// Description: Tests for YAML loading and degrade-to-empty semantics.
// Purpose: Validate path resolution and every degradation path.
// Dependencies: correlator-config, tempfile
// ============================================================================

//! ## Overview
//! Exercises configuration loading: well-formed files, missing files,
//! invalid YAML, absent keys, and normalizer construction from loaded
//! entries.

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

use std::io::Write;
use std::path::Path;

use correlator_config::CorrelatorConfig;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("correlator.yaml");
    let mut file = std::fs::File::create(&path).expect("create config file");
    file.write_all(content.as_bytes()).expect("write config file");
    path
}

#[test]
fn well_formed_config_loads_aliases_and_patterns() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        "namespace_aliases:\n  demo_postgres: postgresql://demo\n  legacy_wh: warehouse://main\n\
         dataset_patterns:\n  - pattern: \"s3_raw/{path*}\"\n    canonical: \"s3://raw-bucket/{path*}\"\n",
    );
    let config = CorrelatorConfig::load_file(&path);
    assert_eq!(config.namespace_aliases.len(), 2);
    assert_eq!(
        config.namespace_aliases.get("demo_postgres").map(String::as_str),
        Some("postgresql://demo")
    );
    assert_eq!(config.dataset_patterns.len(), 1);
    assert_eq!(config.dataset_patterns[0].pattern, "s3_raw/{path*}");
}

#[test]
fn missing_file_degrades_to_empty() {
    let config = CorrelatorConfig::load_file(Path::new("/nonexistent/correlator.yaml"));
    assert_eq!(config, CorrelatorConfig::default());
}

#[test]
fn invalid_yaml_degrades_to_empty() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "namespace_aliases: [not, a, mapping\n");
    let config = CorrelatorConfig::load_file(&path);
    assert_eq!(config, CorrelatorConfig::default());
}

#[test]
fn absent_keys_degrade_to_empty_sections() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "unrelated_key: 1\n");
    let config = CorrelatorConfig::load_file(&path);
    assert!(config.namespace_aliases.is_empty());
    assert!(config.dataset_patterns.is_empty());
}

#[test]
fn explicit_path_wins_over_default_resolution() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "namespace_aliases:\n  a: b\n");
    let resolved = CorrelatorConfig::resolve_path(Some(&path));
    assert_eq!(resolved, path);
}

#[test]
fn loaded_config_builds_a_working_normalizer() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        "namespace_aliases:\n  demo_postgres: postgres_demo\n\
         dataset_patterns:\n  - pattern: \"postgres_demo/{name}\"\n    canonical: \"postgresql://demo/{name}\"\n",
    );
    let config = CorrelatorConfig::load_file(&path);
    let normalizer = config.build_normalizer();
    let dataset = normalizer.canonical_dataset("demo_postgres", "marts.customers");
    assert_eq!(dataset.urn.as_str(), "postgresql://demo/marts.customers");
}

#[test]
fn malformed_entries_are_dropped_during_normalizer_build() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        "namespace_aliases:\n  self: self\n\
         dataset_patterns:\n  - pattern: \"broken/{name\"\n    canonical: \"x/{name}\"\n",
    );
    let config = CorrelatorConfig::load_file(&path);
    let normalizer = config.build_normalizer();
    let dataset = normalizer.canonical_dataset("self", "table");
    assert_eq!(dataset.urn.as_str(), "self/table");
}
