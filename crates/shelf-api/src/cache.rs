//! # Repository Index Coherence Engine
//!
//! Keeps the in-memory [`Index`] in agreement with the storage backend
//! under concurrent reads, uploads, deletes, and out-of-band mutations.
//!
//! ## Structure
//!
//! The engine owns two pieces of state with different access disciplines:
//!
//! - the **published index**, behind an [`ArcSwap`]. Readers load it
//!   without any lock; writers build a working copy and install it
//!   wholesale, so no reader can ever observe a half-updated index.
//! - the **storage cache** — the filtered listing snapshot from the last
//!   successful reconcile — behind a `tokio::sync::Mutex`. Every mutation
//!   path holds this lock; it is deliberately a tokio mutex because it
//!   stays held across backend I/O await points.
//!
//! ## Reconciliation
//!
//! [`RepoCache::reconcile`] lists the backend, diffs the filtered listing
//! against the storage cache, and applies removed → updated → added to a
//! working copy of the index. Added artifacts are fetched and decoded in
//! parallel with bounded fan-out; results are inserted serially to keep
//! the index sort stable. A failure anywhere leaves the published index
//! and the storage cache exactly as they were.
//!
//! Upload and delete handlers bypass the full reconcile with
//! [`RepoCache::add_chart`] / [`RepoCache::remove_chart`], which update
//! the storage cache and index incrementally for a single artifact.

use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use shelf_repo::chart::{chart_version_from_object, ChartError, ChartVersion};
use shelf_repo::{Index, CHART_PACKAGE_FILE_EXTENSION};
use shelf_storage::{diff, Backend, Object, StorageError};

/// Upper bound on concurrent artifact fetches during a parallel load.
/// Bounding the pool changes nothing observable — results stay positional.
const MAX_CONCURRENT_LOADS: usize = 32;

/// Failures surfaced by the engine.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    /// An incremental removal referenced a filename that is not in the
    /// storage cache.
    #[error("chart with filename '{0}' not found")]
    NotFound(String),
}

/// The lock-guarded half of the engine: the listing snapshot behind the
/// last successful reconcile. After every successful reconcile this equals
/// the filtered listing that produced the currently published index.
#[derive(Debug, Default)]
pub struct CacheState {
    storage_cache: Vec<Object>,
}

impl CacheState {
    /// Number of cached listing entries. Exposed for diagnostics.
    pub fn cached_object_count(&self) -> usize {
        self.storage_cache.len()
    }
}

/// The index coherence engine. One instance per server process.
pub struct RepoCache {
    backend: Arc<dyn Backend>,
    published: ArcSwap<Index>,
    state: Mutex<CacheState>,
}

impl RepoCache {
    /// Create an engine over a backend with an empty index. The first
    /// [`reconcile`](Self::reconcile) populates it.
    pub fn new(backend: Arc<dyn Backend>, chart_url: Option<String>) -> Self {
        Self {
            backend,
            published: ArcSwap::from_pointee(Index::new(chart_url)),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Lock-free snapshot of the published index. The snapshot is
    /// immutable; a concurrent reconcile replaces the published reference
    /// rather than mutating it.
    pub fn current(&self) -> Arc<Index> {
        self.published.load_full()
    }

    /// The cached `index.yaml` bytes of the published index.
    pub fn index_bytes(&self) -> Vec<u8> {
        self.current().raw().to_vec()
    }

    /// Acquire the cache lock. Mutation handlers hold this guard across
    /// their conflict check, backend write, and incremental index update
    /// so the `(index, storage cache)` pair moves atomically.
    pub async fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().await
    }

    /// Bring the published index into agreement with the backend listing.
    ///
    /// Returns whether anything changed. On error the published index and
    /// the storage cache are untouched; the next call retries from a clean
    /// snapshot.
    pub async fn reconcile(&self) -> Result<bool, CacheError> {
        tracing::debug!("acquiring storage cache lock");
        let mut state = self.state.lock().await;
        self.reconcile_locked(&mut state).await
    }

    async fn reconcile_locked(&self, state: &mut CacheState) -> Result<bool, CacheError> {
        let listing = self.backend.list_objects().await?;
        let package_suffix = format!(".{CHART_PACKAGE_FILE_EXTENSION}");
        let filtered: Vec<Object> = listing
            .into_iter()
            .filter(|object| object.has_suffix(&package_suffix))
            .collect();

        let changes = diff(&state.storage_cache, &filtered);
        if !changes.changed() {
            // Steady state — except on a fresh engine over an empty store,
            // where the serialization has never been built. Readers must
            // still get a valid (empty) index document.
            if self.current().raw().is_empty() {
                let mut working = self.current().as_ref().clone();
                working.regenerate()?;
                self.published.store(Arc::new(working));
            }
            return Ok(false);
        }
        tracing::debug!(
            added = changes.added.len(),
            removed = changes.removed.len(),
            updated = changes.updated.len(),
            "storage listing diverged from index; rebuilding"
        );

        // All edits go to a working copy. The live index is replaced only
        // once the whole pass has succeeded.
        let mut working = self.current().as_ref().clone();

        for object in &changes.removed {
            match chart_version_from_object(object) {
                Ok(chart_version) => {
                    tracing::debug!(
                        name = chart_version.name(),
                        version = chart_version.version(),
                        "removing chart from index"
                    );
                    working.remove_entry(&chart_version);
                }
                Err(err) if err.is_invalid_artifact() => {
                    tracing::warn!(package = %object.path, action = "removed", "invalid package in storage");
                }
                Err(err) => return Err(err.into()),
            }
        }

        for object in &changes.updated {
            // Re-fetch rather than trusting listing bytes: the listing may
            // predate the change that made this an update.
            if let Some(chart_version) = self.fetch_chart(&object.path).await? {
                tracing::debug!(
                    name = chart_version.name(),
                    version = chart_version.version(),
                    "updating chart in index"
                );
                working.update_entry(chart_version);
            }
        }

        for chart_version in self.load_added(&changes.added).await?.into_iter().flatten() {
            tracing::debug!(
                name = chart_version.name(),
                version = chart_version.version(),
                "adding chart to index"
            );
            working.add_entry(chart_version);
        }

        working.regenerate()?;

        // Install: still under the cache lock, one publication, no
        // intermediate state ever visible.
        self.published.store(Arc::new(working));
        state.storage_cache = filtered;
        Ok(true)
    }

    /// Fetch one artifact's fresh content and decode it.
    ///
    /// An undecodable package is logged and absorbed (`None`); storage
    /// failures propagate and abort the caller's pass.
    async fn fetch_chart(&self, path: &str) -> Result<Option<ChartVersion>, CacheError> {
        let object = self.backend.get_object(path).await?;
        match chart_version_from_object(&object) {
            Ok(chart_version) => Ok(Some(chart_version)),
            Err(err) if err.is_invalid_artifact() => {
                tracing::warn!(package = %path, "invalid package in storage");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch and decode newly discovered artifacts in parallel.
    ///
    /// The result is positionally aligned with the input; invalid packages
    /// occupy `None` slots. The stream is ordered and fallible: the first
    /// storage error aborts the whole batch, so a partial load can never
    /// be mistaken for a complete one.
    async fn load_added(&self, objects: &[Object]) -> Result<Vec<Option<ChartVersion>>, CacheError> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(total = objects.len(), "loading chart packages from storage");
        let futures: Vec<_> = objects.iter().map(|object| self.fetch_chart(&object.path)).collect();
        stream::iter(futures).buffered(MAX_CONCURRENT_LOADS).try_collect().await
    }

    /// Incrementally admit one just-stored chart package: append it to the
    /// storage cache and insert it into a re-published index. On decode
    /// failure the cache append is reverted and nothing is published.
    ///
    /// The caller holds the guard from [`lock_state`](Self::lock_state).
    pub fn add_chart(&self, state: &mut CacheState, object: Object) -> Result<(), CacheError> {
        state.storage_cache.push(object.clone());
        let chart_version = match chart_version_from_object(&object) {
            Ok(chart_version) => chart_version,
            Err(err) => {
                state.storage_cache.pop();
                return Err(err.into());
            }
        };

        tracing::debug!(
            name = chart_version.name(),
            version = chart_version.version(),
            "adding chart to index"
        );
        let mut working = self.current().as_ref().clone();
        working.add_entry(chart_version);
        if let Err(err) = working.regenerate() {
            state.storage_cache.pop();
            return Err(err.into());
        }
        self.published.store(Arc::new(working));
        Ok(())
    }

    /// Incrementally retire one just-deleted chart package from the
    /// storage cache and the index. `NotFound` when the filename is not in
    /// the cache. An entry that was never decodable is dropped from the
    /// cache with a warning — it was never in the index to begin with.
    ///
    /// The caller holds the guard from [`lock_state`](Self::lock_state).
    pub fn remove_chart(&self, state: &mut CacheState, filename: &str) -> Result<(), CacheError> {
        let Some(at) = state
            .storage_cache
            .iter()
            .position(|object| object.path == filename)
        else {
            return Err(CacheError::NotFound(filename.to_string()));
        };

        match chart_version_from_object(&state.storage_cache[at]) {
            Ok(chart_version) => {
                tracing::debug!(
                    name = chart_version.name(),
                    version = chart_version.version(),
                    "removing chart from index"
                );
                let mut working = self.current().as_ref().clone();
                working.remove_entry(&chart_version);
                working.regenerate()?;
                self.published.store(Arc::new(working));
            }
            Err(err) if err.is_invalid_artifact() => {
                tracing::warn!(package = %filename, action = "removed", "invalid package in storage");
            }
            Err(err) => return Err(err.into()),
        }

        state.storage_cache.remove(at);
        Ok(())
    }
}
