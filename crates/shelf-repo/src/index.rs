//! The in-memory repository index.
//!
//! Maps chart name to a newest-first list of versions and caches the
//! serialized `index.yaml` so reads never pay serialization cost. The cache
//! is invalidated by every mutation and rebuilt only by [`Index::regenerate`].
//!
//! Synchronization lives in the coherence engine, not here: mutation is
//! only ever performed on a working copy that the engine installs
//! wholesale, so these methods stay plain `&mut self`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chart::{ChartError, ChartVersion};
use crate::version::compare_versions;

/// The repository index.
///
/// Invariants:
/// - `raw` is either empty or the serialization of the current `entries`.
/// - within `entries[name]`, `(name, version)` pairs are unique and sorted
///   newest-first by (lenient semver desc, created desc).
#[derive(Debug, Clone, Default)]
pub struct Index {
    /// Chart name → versions, newest first.
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
    chart_url: Option<String>,
    raw: Vec<u8>,
}

/// Serialized shape of `index.yaml`.
#[derive(Serialize)]
struct IndexFile<'a> {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    entries: &'a BTreeMap<String, Vec<ChartVersion>>,
    generated: DateTime<Utc>,
}

impl Index {
    /// Create an empty index. `chart_url`, when set, is prepended to every
    /// relative download URL on insertion.
    pub fn new(chart_url: Option<String>) -> Self {
        Self {
            entries: BTreeMap::new(),
            chart_url,
            raw: Vec::new(),
        }
    }

    /// The cached serialization. Empty until [`regenerate`](Self::regenerate)
    /// has run after the last mutation.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Total number of chart versions across all names.
    pub fn version_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Insert a chart version, replacing any existing entry with the same
    /// `(name, version)` identity and keeping the version list sorted.
    pub fn add_entry(&mut self, mut chart_version: ChartVersion) {
        self.apply_chart_url(&mut chart_version);
        let versions = self
            .entries
            .entry(chart_version.name().to_string())
            .or_default();
        match versions.iter().position(|v| v.same_identity(&chart_version)) {
            Some(at) => versions[at] = chart_version,
            None => versions.push(chart_version),
        }
        versions.sort_by(|a, b| {
            compare_versions(b.version(), a.version()).then(b.created.cmp(&a.created))
        });
        self.raw.clear();
    }

    /// Replace the entry at the given identity. Same effect as
    /// [`add_entry`](Self::add_entry); kept separate so callers can log
    /// updates distinctly from additions.
    pub fn update_entry(&mut self, chart_version: ChartVersion) {
        self.add_entry(chart_version);
    }

    /// Remove the entry with the same `(name, version)` identity, if
    /// present. Removing the last version of a name removes the name.
    pub fn remove_entry(&mut self, chart_version: &ChartVersion) {
        let Some(versions) = self.entries.get_mut(chart_version.name()) else {
            return;
        };
        let before = versions.len();
        versions.retain(|v| !v.same_identity(chart_version));
        let changed = versions.len() != before;
        if versions.is_empty() {
            self.entries.remove(chart_version.name());
        }
        if changed {
            self.raw.clear();
        }
    }

    /// Look up a chart version. An empty `version` selects the newest
    /// entry for the name.
    pub fn get(&self, name: &str, version: &str) -> Option<&ChartVersion> {
        let versions = self.entries.get(name)?;
        if version.is_empty() {
            versions.first()
        } else {
            versions.iter().find(|v| v.version() == version)
        }
    }

    /// Rebuild the cached `index.yaml` serialization from `entries`.
    pub fn regenerate(&mut self) -> Result<(), ChartError> {
        let file = IndexFile {
            api_version: "v1",
            entries: &self.entries,
            generated: Utc::now(),
        };
        let yaml =
            serde_yaml::to_string(&file).map_err(|err| ChartError::Serialization(err.to_string()))?;
        self.raw = yaml.into_bytes();
        Ok(())
    }

    fn apply_chart_url(&self, chart_version: &mut ChartVersion) {
        let Some(base) = &self.chart_url else { return };
        for url in &mut chart_version.urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                *url = format!("{}/{}", base.trim_end_matches('/'), url);
            }
        }
    }
}
