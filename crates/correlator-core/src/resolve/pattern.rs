// crates/correlator-core/src/resolve/pattern.rs
// ============================================================================
// Module: Dataset Pattern Resolver
// Description: Template-based dataset-URN rewriting with first-match order.
// Purpose: Rewrite whole URNs between tool vocabularies using placeholder
//          templates compiled to anchored regexes.
// Dependencies: regex, tracing
// ============================================================================

//! ## Overview
//! A pattern entry maps a source template to a canonical template. Literal
//! template text is regex-escaped; `{name}` placeholders become named
//! captures matching `[^/]+` and `{name*}` placeholders match `.+`. Compiled
//! patterns are scanned in the order given and the first match wins; inputs
//! that match nothing pass through unchanged. Invalid entries are dropped at
//! construction with a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Entries
// ============================================================================

/// One configured rewrite template pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    /// Source template, e.g. `demo_postgres/{name}`.
    pub pattern: String,
    /// Canonical template, e.g. `postgresql://demo/{name}`.
    pub canonical: String,
}

/// A compiled source template with its substitution target.
#[derive(Debug, Clone)]
struct CompiledPattern {
    /// Anchored regex compiled from the source template.
    regex: Regex,
    /// Canonical template the captures substitute into.
    canonical: String,
}

// ============================================================================
// SECTION: Template Compilation
// ============================================================================

/// A parsed segment of a template.
enum TemplateSegment {
    /// Literal text, matched or emitted verbatim.
    Literal(String),
    /// Placeholder with its name and whether it spans `/` separators.
    Placeholder {
        /// Capture name.
        name: String,
        /// True for `{name*}` placeholders matching `.+`.
        greedy: bool,
    },
}

/// Parses a template into literal and placeholder segments.
///
/// Returns `None` for malformed templates: unbalanced braces or placeholder
/// names that are not valid capture identifiers.
fn parse_template(template: &str) -> Option<Vec<TemplateSegment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let close = after_open.find('}')?;
        let body = &after_open[..close];
        let (name, greedy) = match body.strip_suffix('*') {
            Some(stripped) => (stripped, true),
            None => (body, false),
        };
        if !is_capture_name(name) {
            return None;
        }
        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(TemplateSegment::Placeholder {
            name: name.to_string(),
            greedy,
        });
        rest = &after_open[close + 1..];
    }
    if rest.contains('}') {
        return None;
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(TemplateSegment::Literal(literal));
    }
    Some(segments)
}

/// Returns true when the name is a valid regex capture identifier.
fn is_capture_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Compiles a source template into an anchored regex and collects its
/// placeholder names.
fn compile_source(template: &str) -> Option<(Regex, BTreeSet<String>)> {
    let segments = parse_template(template)?;
    let mut source = String::from("^");
    let mut names = BTreeSet::new();
    for segment in &segments {
        match segment {
            TemplateSegment::Literal(text) => source.push_str(&regex::escape(text)),
            TemplateSegment::Placeholder {
                name,
                greedy,
            } => {
                if !names.insert(name.clone()) {
                    return None;
                }
                let class = if *greedy { ".+" } else { "[^/]+" };
                source.push_str(&format!("(?P<{name}>{class})"));
            }
        }
    }
    source.push('$');
    let regex = Regex::new(&source).ok()?;
    Some((regex, names))
}

/// Collects the placeholder names referenced by a canonical template.
fn canonical_names(template: &str) -> Option<BTreeSet<String>> {
    let segments = parse_template(template)?;
    let mut names = BTreeSet::new();
    for segment in segments {
        if let TemplateSegment::Placeholder {
            name, ..
        } = segment
        {
            names.insert(name);
        }
    }
    Some(names)
}

/// Substitutes captures into a canonical template.
fn substitute(template: &str, captures: &regex::Captures<'_>) -> String {
    let Some(segments) = parse_template(template) else {
        return template.to_string();
    };
    let mut output = String::new();
    for segment in segments {
        match segment {
            TemplateSegment::Literal(text) => output.push_str(&text),
            TemplateSegment::Placeholder {
                name, ..
            } => {
                if let Some(value) = captures.name(&name) {
                    output.push_str(value.as_str());
                }
            }
        }
    }
    output
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Immutable first-match-wins dataset-URN rewriter.
///
/// # Invariants
/// - Compiled pattern order equals accepted configuration order.
/// - Every canonical template references only placeholders its source
///   template captures.
#[derive(Debug, Clone, Default)]
pub struct PatternResolver {
    /// Compiled patterns in configuration order.
    patterns: Vec<CompiledPattern>,
}

impl PatternResolver {
    /// Builds a resolver from configured template pairs.
    ///
    /// Entries with empty fields, malformed templates, duplicate or invalid
    /// placeholder names, or canonical placeholders missing from the source
    /// are dropped with a warning; the remaining entries keep their order.
    #[must_use]
    pub fn new(entries: &[PatternEntry]) -> Self {
        let mut patterns = Vec::with_capacity(entries.len());
        for entry in entries {
            let source = entry.pattern.trim();
            let canonical = entry.canonical.trim();
            if source.is_empty() || canonical.is_empty() {
                tracing::warn!(pattern = entry.pattern.as_str(), "dropping pattern with empty side");
                continue;
            }
            let Some((regex, source_names)) = compile_source(source) else {
                tracing::warn!(pattern = source, "dropping pattern that does not compile");
                continue;
            };
            let Some(target_names) = canonical_names(canonical) else {
                tracing::warn!(pattern = source, "dropping pattern with malformed canonical");
                continue;
            };
            if !target_names.is_subset(&source_names) {
                tracing::warn!(
                    pattern = source,
                    "dropping pattern whose canonical references uncaptured placeholders"
                );
                continue;
            }
            patterns.push(CompiledPattern {
                regex,
                canonical: canonical.to_string(),
            });
        }
        Self {
            patterns,
        }
    }

    /// Rewrites a URN using the first matching pattern.
    ///
    /// Inputs that match no pattern pass through unchanged.
    #[must_use]
    pub fn resolve(&self, urn: &str) -> String {
        for pattern in &self.patterns {
            if let Some(captures) = pattern.regex.captures(urn) {
                return substitute(&pattern.canonical, &captures);
            }
        }
        urn.to_string()
    }

    /// Returns the number of accepted pattern entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true when no pattern entries were accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
