// crates/correlator-config/src/lib.rs
// ============================================================================
// Module: Correlator Configuration
// Description: YAML configuration for namespace aliases and dataset patterns.
// Purpose: Load operator-maintained identity configuration with
//          degrade-to-empty semantics.
// Dependencies: correlator-core, serde, serde_yaml
// ============================================================================

//! ## Overview
//! The correlator reads one YAML file with two recognized keys:
//! `namespace_aliases` (source namespace to canonical namespace) and
//! `dataset_patterns` (ordered `{pattern, canonical}` template pairs). The
//! file path comes from `CORRELATOR_CONFIG_PATH`, defaulting to
//! `./correlator.yaml`. A missing, unreadable, or invalid file degrades to
//! an empty configuration with a warning rather than an error: identity
//! configuration is an operational aid, never a liveness dependency.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use correlator_core::AliasResolver;
use correlator_core::PatternResolver;
use correlator_core::UrnNormalizer;
use correlator_core::resolve::PatternEntry;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable naming the configuration file path.
pub const CONFIG_PATH_ENV: &str = "CORRELATOR_CONFIG_PATH";

/// Default configuration file path relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./correlator.yaml";

/// Maximum accepted configuration file size.
const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Identity configuration for the correlator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Source namespace to canonical namespace mapping.
    #[serde(default)]
    pub namespace_aliases: BTreeMap<String, String>,
    /// Ordered dataset-URN rewrite templates.
    #[serde(default)]
    pub dataset_patterns: Vec<PatternEntry>,
}

impl CorrelatorConfig {
    /// Loads configuration from an explicit path, the environment override,
    /// or the default location, in that order.
    ///
    /// Every failure mode degrades to an empty configuration with a logged
    /// warning; this function never fails.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = Self::resolve_path(path);
        Self::load_file(&resolved)
    }

    /// Resolves the effective configuration path.
    #[must_use]
    pub fn resolve_path(path: Option<&Path>) -> PathBuf {
        if let Some(path) = path {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Loads configuration from one file, degrading to empty on any failure.
    #[must_use]
    pub fn load_file(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "config file missing; continuing with empty identity configuration"
                );
                return Self::default();
            }
            Ok(metadata) if metadata.len() > MAX_CONFIG_BYTES => {
                tracing::warn!(
                    path = %path.display(),
                    size = metadata.len(),
                    "config file exceeds size limit; continuing with empty identity configuration"
                );
                return Self::default();
            }
            Ok(_) => {}
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "config file unreadable; continuing with empty identity configuration"
                );
                return Self::default();
            }
        };
        match serde_yaml::from_str::<Self>(&content) {
            Ok(config) => {
                if config.namespace_aliases.is_empty() && config.dataset_patterns.is_empty() {
                    tracing::warn!(
                        path = %path.display(),
                        "config file defines no aliases or patterns"
                    );
                }
                config
            }
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "config file is not valid YAML; continuing with empty identity configuration"
                );
                Self::default()
            }
        }
    }

    /// Builds the immutable URN normalizer from this configuration.
    ///
    /// Alias construction and pattern compilation apply their own entry
    /// dropping rules; the normalizer is safe to share across threads for
    /// the process lifetime.
    #[must_use]
    pub fn build_normalizer(&self) -> UrnNormalizer {
        UrnNormalizer::new(
            AliasResolver::new(&self.namespace_aliases),
            PatternResolver::new(&self.dataset_patterns),
        )
    }
}
