// crates/correlator-core/src/resolve/alias.rs
// ============================================================================
// Module: Namespace Alias Resolver
// Description: Exact-match namespace rewriting with cycle defence.
// Purpose: Reconcile tool-specific namespaces onto canonical ones.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! The alias table maps source namespaces to canonical namespaces.
//! Construction is deterministic (sorted alias key order) and rejects
//! entries that would make resolution loop: empty keys or values,
//! self-references, and additions that close a cycle through the existing
//! chain. Transitive chains that do not close are accepted and walked to
//! their end at resolution time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Immutable exact-match namespace resolver.
///
/// # Invariants
/// - The internal map never contains an entry whose chain revisits its own
///   key; `resolve` terminates for every input.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    /// Alias-to-canonical namespace map.
    map: BTreeMap<String, String>,
}

impl AliasResolver {
    /// Builds a resolver from a configuration map.
    ///
    /// Entries are applied in sorted alias-key order. Each key and value is
    /// trimmed; entries with empty sides, self-references, or cycle-closing
    /// targets are dropped with a warning.
    #[must_use]
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let mut map = BTreeMap::new();
        for (raw_key, raw_value) in aliases {
            let key = raw_key.trim();
            let value = raw_value.trim();
            if key.is_empty() || value.is_empty() {
                tracing::warn!(alias = raw_key.as_str(), "dropping alias with empty side");
                continue;
            }
            if key == value {
                tracing::warn!(alias = key, "dropping self-referential alias");
                continue;
            }
            if Self::closes_cycle(&map, key, value) {
                tracing::warn!(alias = key, canonical = value, "dropping cycle-closing alias");
                continue;
            }
            map.insert(key.to_string(), value.to_string());
        }
        Self {
            map,
        }
    }

    /// Returns true when inserting `key -> value` would close a cycle in the
    /// under-construction map.
    fn closes_cycle(map: &BTreeMap<String, String>, key: &str, value: &str) -> bool {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut current = value;
        while let Some(next) = map.get(current) {
            if !visited.insert(current) {
                return true;
            }
            if next == key {
                return true;
            }
            current = next;
        }
        false
    }

    /// Resolves a namespace, following transitive chains to their end.
    ///
    /// Each key is visited at most once; a revisit returns the value reached
    /// so far (defensive, unreachable under the construction guarantees).
    /// Namespaces without an alias pass through unchanged.
    #[must_use]
    pub fn resolve(&self, namespace: &str) -> String {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut current = namespace;
        while let Some(next) = self.map.get(current) {
            if !visited.insert(current) {
                break;
            }
            current = next;
        }
        current.to_string()
    }

    /// Returns the number of accepted alias entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true when no alias entries were accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
