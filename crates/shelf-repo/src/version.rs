//! Lenient semver parsing and ordering.
//!
//! Chart versions in the wild are not always three-segment semver: `1.0`
//! and `2` are common. Strict parsing would eject those charts from the
//! index, so missing core segments are padded with zeros before handing
//! the string to `semver`. Pre-release and build suffixes pass through
//! unchanged.

use std::cmp::Ordering;

use semver::Version;

/// Parse a version string, padding missing core segments (`1.0` →
/// `1.0.0`). Returns `None` only when the string is not a version at all.
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    // Split off pre-release/build suffixes before padding the core.
    let suffix_at = trimmed.find(['-', '+']);
    let (core, suffix) = match suffix_at {
        Some(at) => trimmed.split_at(at),
        None => (trimmed, ""),
    };

    let segments = core.split('.').count();
    if segments == 0 || segments > 3 || core.is_empty() {
        return None;
    }
    let mut padded = core.to_string();
    for _ in segments..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}

/// Total order over version strings.
///
/// Parseable versions order by semver; a parseable version always orders
/// above an unparseable one; two unparseable versions fall back to string
/// comparison so the index order stays deterministic.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
