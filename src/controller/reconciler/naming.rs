//! # Naming
//!
//! Derived record names and remote identifiers. Every call site that
//! creates, looks up or deletes a derived object goes through these
//! functions so they always agree on the identifier.

use crate::constants::DEFAULT_VERSION_SPECIFIER;

/// Normalize a version specifier; absent, empty and whitespace-only become `"default"`
#[must_use]
pub fn version_specifier(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(spec) if !spec.is_empty() => spec.to_string(),
        _ => DEFAULT_VERSION_SPECIFIER.to_string(),
    }
}

/// Version label sent to APIM
///
/// Only an unnamed version goes without a label; an explicit `"default"` is
/// sent as written.
#[must_use]
pub fn remote_version_label(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|spec| !spec.is_empty())
        .map(str::to_string)
}

/// Remote identifier of a top-level record: `{namespace}-{name}`
#[must_use]
pub fn parent_remote_id(namespace: &str, name: &str) -> String {
    format!("{namespace}-{name}")
}

/// Name of the child record a parent derives for one version
#[must_use]
pub fn child_record_name(parent: &str, raw_specifier: Option<&str>) -> String {
    format!("{parent}-{}", version_specifier(raw_specifier))
}
