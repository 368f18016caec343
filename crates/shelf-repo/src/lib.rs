//! # shelf-repo — Chart Packages and the Repository Index
//!
//! The repository-format layer of shelf: what a chart package *is*, how its
//! canonical filename is derived, and how the set of stored packages becomes
//! the `index.yaml` that clients consume.
//!
//! ## Contents
//!
//! - [`chart`] — decoding a chart tarball (or its provenance file) into a
//!   [`ChartVersion`], and the bidirectional filename conventions
//!   `<name>-<version>.pkg` / `<name>-<version>.pkg.prov`.
//! - [`index`] — the in-memory [`Index`]: name → newest-first versions, a
//!   cached `index.yaml` serialization, and the base chart URL.
//! - [`version`] — lenient semver ordering (`1.0` counts as `1.0.0`).
//!
//! Index mutation is not synchronized here; the coherence engine in
//! `shelf-api` owns the locking discipline and calls in serially.

pub mod chart;
pub mod index;
pub mod version;

pub use chart::{
    chart_metadata_from_bytes, chart_package_filename, chart_package_filename_from_content,
    chart_version_from_object, provenance_filename, provenance_filename_from_content,
    ChartError, ChartMetadata, ChartVersion,
};
pub use index::Index;

/// File extension of chart packages, without the leading dot.
pub const CHART_PACKAGE_FILE_EXTENSION: &str = "pkg";

/// File extension of detached provenance files, without the leading dot.
pub const PROVENANCE_FILE_EXTENSION: &str = "pkg.prov";

/// Content type served for `index.yaml`.
pub const INDEX_FILE_CONTENT_TYPE: &str = "application/x-yaml";

/// Content type served for chart package downloads.
pub const CHART_PACKAGE_CONTENT_TYPE: &str = "application/x-tar";

/// Content type served for provenance file downloads.
pub const PROVENANCE_FILE_CONTENT_TYPE: &str = "application/pgp-signature";
