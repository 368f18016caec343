//! The storage backend interface.
//!
//! Every storage operation in shelf goes through this trait. The index
//! coherence engine, the upload and delete handlers, and the download route
//! all consume `Arc<dyn Backend>` — they never know which driver is behind
//! it.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::object::Object;

/// Storage failure taxonomy.
///
/// Callers are required to distinguish absence from transport trouble:
/// `NotFound` is the permission-to-create signal on the upload conflict
/// check and maps to 404 on reads, while `Io` aborts the current operation
/// and surfaces as a server error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Any backend failure other than absence. Not retried by shelf; the
    /// next refresh or request starts from a clean snapshot.
    #[error("storage i/o error: {0}")]
    Io(String),
}

impl StorageError {
    /// Whether this error is an absence rather than a transport failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The unified blob storage interface.
///
/// Implementations must be `Send + Sync` — the backend is shared across
/// request handlers and the background refresh task.
#[async_trait]
pub trait Backend: Send + Sync {
    /// List every object in the store. The returned listing is a
    /// consistent snapshot with no ordering guarantee; entries carry
    /// metadata only (content is empty).
    async fn list_objects(&self) -> Result<Vec<Object>, StorageError>;

    /// Fetch one object, content included. `NotFound` when absent.
    async fn get_object(&self, path: &str) -> Result<Object, StorageError>;

    /// Create or overwrite an object. Idempotent for identical content.
    async fn put_object(&self, path: &str, content: Bytes) -> Result<(), StorageError>;

    /// Remove an object. `NotFound` when absent.
    async fn delete_object(&self, path: &str) -> Result<(), StorageError>;
}
