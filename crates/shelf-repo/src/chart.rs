//! Chart package decoding and canonical filenames.
//!
//! A chart package is a gzipped tarball whose top-level directory carries a
//! `Chart.yaml` manifest. Uploads never choose their own path: the stored
//! filename is always derived from the decoded manifest, so an artifact at
//! `<name>-<version>.pkg` is guaranteed to contain exactly that chart.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Component;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use shelf_storage::Object;

use crate::{CHART_PACKAGE_FILE_EXTENSION, PROVENANCE_FILE_EXTENSION};

/// Decoding failure taxonomy.
///
/// The invalid-content variants are absorbed by the reconciler and loader
/// (a broken artifact is logged and omitted from the index, never fatal);
/// they become client errors only when the bytes came from an upload.
#[derive(Debug, Error)]
pub enum ChartError {
    /// Content is not a decodable chart package.
    #[error("invalid chart package")]
    InvalidChartPackage,

    /// Content is not a decodable provenance file.
    #[error("invalid provenance file")]
    InvalidProvenanceFile,

    /// The index failed to serialize.
    #[error("index serialization failed: {0}")]
    Serialization(String),
}

impl ChartError {
    /// Whether this is one of the absorbed invalid-content kinds.
    pub fn is_invalid_artifact(&self) -> bool {
        matches!(self, Self::InvalidChartPackage | Self::InvalidProvenanceFile)
    }
}

/// The chart manifest embedded in a package's `Chart.yaml`.
///
/// `name` and `version` are the identity; everything else is carried
/// opaquely so the index reproduces whatever the packager wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "appVersion", skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One releasable chart version as it appears in the repository index.
///
/// Identity is `(name, version)` — the index replaces rather than
/// duplicates on a repeated add of the same pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartVersion {
    #[serde(flatten)]
    pub metadata: ChartMetadata,
    /// Download URLs. Produced relative (`charts/<filename>`); the index
    /// prepends the configured base chart URL on insertion.
    pub urls: Vec<String>,
    pub created: DateTime<Utc>,
    /// SHA-256 of the package bytes, lowercase hex. Empty when the chart
    /// was decoded from listing metadata alone (content not fetched).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
}

impl ChartVersion {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Whether this entry has the same `(name, version)` identity as another.
    pub fn same_identity(&self, other: &ChartVersion) -> bool {
        self.name() == other.name() && self.version() == other.version()
    }
}

/// Canonical package filename for a chart: `<name>-<version>.pkg`.
pub fn chart_package_filename(name: &str, version: &str) -> String {
    format!("{name}-{version}.{CHART_PACKAGE_FILE_EXTENSION}")
}

/// Canonical provenance filename for a chart: `<name>-<version>.pkg.prov`.
pub fn provenance_filename(name: &str, version: &str) -> String {
    format!("{name}-{version}.{PROVENANCE_FILE_EXTENSION}")
}

/// Decode the `Chart.yaml` manifest out of chart package bytes.
pub fn chart_metadata_from_bytes(content: &[u8]) -> Result<ChartMetadata, ChartError> {
    if content.is_empty() {
        return Err(ChartError::InvalidChartPackage);
    }

    let decoder = GzDecoder::new(content);
    let mut archive = tar::Archive::new(decoder);
    let entries = archive
        .entries()
        .map_err(|_| ChartError::InvalidChartPackage)?;

    for entry in entries {
        let mut entry = entry.map_err(|_| ChartError::InvalidChartPackage)?;
        let is_manifest = {
            let path = entry.path().map_err(|_| ChartError::InvalidChartPackage)?;
            let mut components = path.components();
            matches!(
                (components.next(), components.next(), components.next()),
                (Some(Component::Normal(_)), Some(Component::Normal(file)), None)
                    if file == "Chart.yaml"
            )
        };
        if !is_manifest {
            continue;
        }

        let mut manifest = String::new();
        entry
            .read_to_string(&mut manifest)
            .map_err(|_| ChartError::InvalidChartPackage)?;
        let metadata: ChartMetadata =
            serde_yaml::from_str(&manifest).map_err(|_| ChartError::InvalidChartPackage)?;
        if metadata.name.is_empty() || metadata.version.is_empty() {
            return Err(ChartError::InvalidChartPackage);
        }
        return Ok(metadata);
    }

    Err(ChartError::InvalidChartPackage)
}

/// Derive the canonical package filename from uploaded chart bytes.
pub fn chart_package_filename_from_content(content: &[u8]) -> Result<String, ChartError> {
    let metadata = chart_metadata_from_bytes(content)?;
    Ok(chart_package_filename(&metadata.name, &metadata.version))
}

/// Identity fields of the chart a provenance file attests to.
#[derive(Debug, Deserialize)]
struct ProvenanceSubject {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

/// Derive the canonical provenance filename from uploaded provenance bytes.
///
/// A provenance file is a PGP clearsigned message whose body embeds the
/// chart manifest. The signature itself is not verified here — only the
/// embedded name and version are read.
pub fn provenance_filename_from_content(content: &[u8]) -> Result<String, ChartError> {
    let text = std::str::from_utf8(content).map_err(|_| ChartError::InvalidProvenanceFile)?;
    let begin = text
        .find("-----BEGIN PGP SIGNED MESSAGE-----")
        .ok_or(ChartError::InvalidProvenanceFile)?;
    let signature = text
        .find("-----BEGIN PGP SIGNATURE-----")
        .ok_or(ChartError::InvalidProvenanceFile)?;
    if signature <= begin {
        return Err(ChartError::InvalidProvenanceFile);
    }

    // The signed body starts after the armor headers' trailing blank line.
    let block = &text[begin..signature];
    let body = block
        .find("\n\n")
        .map(|at| &block[at + 2..])
        .ok_or(ChartError::InvalidProvenanceFile)?;
    // The manifest document ends at the yaml end-of-document marker when a
    // files section follows.
    let document = body.split("\n...").next().unwrap_or(body);

    let subject: ProvenanceSubject =
        serde_yaml::from_str(document).map_err(|_| ChartError::InvalidProvenanceFile)?;
    if subject.name.is_empty() || subject.version.is_empty() {
        return Err(ChartError::InvalidProvenanceFile);
    }
    Ok(provenance_filename(&subject.name, &subject.version))
}

/// Recover `(name, version)` from a package filename.
///
/// Listings do not carry content, so removals and cache-only decodes fall
/// back to the filename: the stem splits at the rightmost `-` that is
/// followed by a digit, which is the inverse of [`chart_package_filename`]
/// for every name the repository can contain.
fn chart_metadata_from_path(path: &str) -> Result<ChartMetadata, ChartError> {
    let stem = path
        .strip_suffix(&format!(".{CHART_PACKAGE_FILE_EXTENSION}"))
        .ok_or(ChartError::InvalidChartPackage)?;

    for (at, _) in stem.rmatch_indices('-') {
        let version = &stem[at + 1..];
        if version.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let name = &stem[..at];
            if name.is_empty() {
                break;
            }
            return Ok(ChartMetadata {
                name: name.to_string(),
                version: version.to_string(),
                description: None,
                app_version: None,
                keywords: Vec::new(),
                home: None,
                extra: BTreeMap::new(),
            });
        }
    }
    Err(ChartError::InvalidChartPackage)
}

/// Decode a storage object into a [`ChartVersion`].
///
/// Objects with content are fully decoded and digested; content-less
/// listing entries yield identity-only metadata from the filename, which
/// is all that removals need.
pub fn chart_version_from_object(object: &Object) -> Result<ChartVersion, ChartError> {
    let (metadata, digest) = if object.content.is_empty() {
        (chart_metadata_from_path(&object.path)?, String::new())
    } else {
        let metadata = chart_metadata_from_bytes(&object.content)?;
        let digest = hex::encode(Sha256::digest(&object.content));
        (metadata, digest)
    };

    let filename = chart_package_filename(&metadata.name, &metadata.version);
    Ok(ChartVersion {
        metadata,
        urls: vec![format!("charts/{filename}")],
        created: object.last_modified,
        digest,
    })
}
