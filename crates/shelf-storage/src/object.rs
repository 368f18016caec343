//! The stored-object model.
//!
//! An [`Object`] is one artifact in the backing store. Listings return
//! objects without content (path + metadata only); content is fetched on
//! demand via [`Backend::get_object`](crate::Backend::get_object).

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A single object in blob storage.
///
/// `path` is the object's key and is unique within any listing. The
/// change-detection identity of an object is `(path, meta)` where meta is
/// the content hash when the backend provides one and the last-modified
/// timestamp otherwise. Two listings' entries for the same path with
/// differing meta are classified as an update by [`diff`](crate::diff).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// Object key, e.g. `alpha-1.2.0.pkg`. Unique within a listing.
    pub path: String,
    /// Object content. Empty in listings; populated by `get_object`.
    pub content: Bytes,
    /// Last-modified timestamp reported by the backend.
    pub last_modified: DateTime<Utc>,
    /// Content hash when the backend exposes one (e.g. an object-store
    /// ETag). Preferred over `last_modified` as the diff identity because
    /// it is stable for unchanged content across metadata-only churn.
    pub content_hash: Option<String>,
}

impl Object {
    /// Construct a content-less listing entry.
    pub fn listed(path: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            content: Bytes::new(),
            last_modified,
            content_hash: None,
        }
    }

    /// Whether the object's path ends with the given suffix (including the
    /// leading dot, e.g. `".pkg"`). This is the only filename structure the
    /// storage layer ever inspects.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.path.ends_with(suffix)
    }

    /// Whether this object's change-detection meta matches another's.
    ///
    /// Hashes are compared when both sides carry one; otherwise the
    /// last-modified timestamps decide.
    pub fn same_meta(&self, other: &Object) -> bool {
        match (&self.content_hash, &other.content_hash) {
            (Some(a), Some(b)) => a == b,
            _ => self.last_modified == other.last_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn listed_object_has_no_content() {
        let o = Object::listed("alpha-1.0.pkg", ts(100));
        assert!(o.content.is_empty());
        assert_eq!(o.path, "alpha-1.0.pkg");
        assert!(o.content_hash.is_none());
    }

    #[test]
    fn has_suffix_discriminates_package_and_provenance() {
        let pkg = Object::listed("alpha-1.0.pkg", ts(1));
        let prov = Object::listed("alpha-1.0.pkg.prov", ts(1));
        assert!(pkg.has_suffix(".pkg"));
        assert!(!pkg.has_suffix(".pkg.prov"));
        assert!(prov.has_suffix(".pkg.prov"));
        // A provenance file does not match the bare package suffix.
        assert!(!prov.has_suffix(".pkg"));
    }

    #[test]
    fn same_meta_prefers_content_hash() {
        let mut a = Object::listed("x.pkg", ts(1));
        let mut b = Object::listed("x.pkg", ts(2));
        a.content_hash = Some("abc".to_string());
        b.content_hash = Some("abc".to_string());
        // Hashes equal — timestamps are ignored.
        assert!(a.same_meta(&b));

        b.content_hash = Some("def".to_string());
        assert!(!a.same_meta(&b));
    }

    #[test]
    fn same_meta_falls_back_to_timestamp() {
        let a = Object::listed("x.pkg", ts(1));
        let b = Object::listed("x.pkg", ts(1));
        let c = Object::listed("x.pkg", ts(2));
        assert!(a.same_meta(&b));
        assert!(!a.same_meta(&c));

        // One-sided hash cannot be compared; timestamps decide.
        let mut d = Object::listed("x.pkg", ts(1));
        d.content_hash = Some("abc".to_string());
        assert!(a.same_meta(&d));
    }
}
