// crates/correlator-core/src/resolve/mod.rs
// ============================================================================
// Module: Identity Resolution
// Description: Namespace aliasing and dataset-URN pattern rewriting.
// Purpose: Compose the two-stage rewriter applied uniformly at ingestion.
// Dependencies: crate::resolve::{alias, pattern}
// ============================================================================

//! ## Overview
//! Producers and validators disagree on naming. Resolution happens in two
//! stages: an exact-match namespace alias table, then a template-based
//! dataset-URN rewriter. Both resolvers are built once from configuration
//! and immutable afterwards, so concurrent readers need no locking.
//! Canonicalization is applied exactly once, at ingestion write time; reads
//! use the already-canonical form.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod alias;
pub mod pattern;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use alias::AliasResolver;
pub use pattern::PatternEntry;
pub use pattern::PatternResolver;

use crate::core::identifiers::DatasetUrn;
use crate::core::identifiers::split_urn;
use crate::core::record::PreparedDataset;

// ============================================================================
// SECTION: Normalizer
// ============================================================================

/// Two-stage URN normalizer: alias on the namespace, then pattern on the
/// joined URN.
///
/// # Invariants
/// - Immutable after construction; safe for concurrent reads.
#[derive(Debug)]
pub struct UrnNormalizer {
    /// Exact-match namespace rewriter.
    aliases: AliasResolver,
    /// Template-based URN rewriter.
    patterns: PatternResolver,
}

impl UrnNormalizer {
    /// Builds a normalizer from constructed resolvers.
    #[must_use]
    pub const fn new(aliases: AliasResolver, patterns: PatternResolver) -> Self {
        Self {
            aliases,
            patterns,
        }
    }

    /// Builds a normalizer with empty alias and pattern tables.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(AliasResolver::default(), PatternResolver::default())
    }

    /// Resolves a namespace through the alias table only.
    #[must_use]
    pub fn resolve_namespace(&self, namespace: &str) -> String {
        self.aliases.resolve(namespace)
    }

    /// Canonicalizes a raw dataset reference.
    ///
    /// The canonical URN is the pattern rewrite of the alias-resolved
    /// namespace joined with the raw name. The returned dataset carries the
    /// namespace and name components re-split from the final URN so pattern
    /// rewrites that cross the namespace boundary stay consistent.
    #[must_use]
    pub fn canonical_dataset(&self, namespace: &str, name: &str) -> PreparedDataset {
        let joined = format!("{}/{}", self.aliases.resolve(namespace), name);
        let urn = self.patterns.resolve(&joined);
        let (split_namespace, split_name) = match split_urn(&urn) {
            Some((ns, n)) => (ns.to_string(), n.to_string()),
            None => (String::new(), urn.clone()),
        };
        PreparedDataset {
            urn: DatasetUrn::new(urn),
            namespace: split_namespace,
            name: split_name,
        }
    }
}
