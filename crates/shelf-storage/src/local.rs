//! Local filesystem storage driver.
//!
//! Stores each object as a regular file directly under a root directory —
//! a flat key space matching the repository's flat artifact namespace.
//! The last-modified identity comes from file mtime; no content hash is
//! computed (hashing every file on every listing would defeat the point of
//! the cheap diff).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::backend::{Backend, StorageError};
use crate::object::Object;

/// Filesystem-backed [`Backend`] rooted at a directory.
///
/// The root is created lazily on the first write. Object keys must be bare
/// filenames — anything containing a path separator or `..` is rejected
/// before it ever reaches the filesystem.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a driver rooted at `root`. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory this driver reads and writes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object key to a filesystem path, refusing keys that
    /// would escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        if path.is_empty()
            || path.contains('/')
            || path.contains('\\')
            || path.contains("..")
        {
            return Err(StorageError::Io(format!("invalid object key: {path:?}")));
        }
        Ok(self.root.join(path))
    }
}

fn map_io(path: &str, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(format!("{path}: {err}"))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn list_objects(&self) -> Result<Vec<Object>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // An absent root is an empty store, not an error — the first
            // upload creates it.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Io(format!("list: {err}"))),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StorageError::Io(format!("list: {err}")))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|err| StorageError::Io(format!("list: {err}")))?;
            if !meta.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(entry = ?entry.file_name(), "skipping non-utf8 filename in storage root");
                continue;
            };
            let modified = meta
                .modified()
                .map_err(|err| StorageError::Io(format!("list: {err}")))?;
            objects.push(Object::listed(name, DateTime::<Utc>::from(modified)));
        }
        Ok(objects)
    }

    async fn get_object(&self, path: &str) -> Result<Object, StorageError> {
        let full = self.resolve(path)?;
        let content = tokio::fs::read(&full)
            .await
            .map_err(|err| map_io(path, err))?;
        let modified = tokio::fs::metadata(&full)
            .await
            .and_then(|m| m.modified())
            .map_err(|err| map_io(path, err))?;
        Ok(Object {
            path: path.to_string(),
            content: Bytes::from(content),
            last_modified: DateTime::<Utc>::from(modified),
            content_hash: None,
        })
    }

    async fn put_object(&self, path: &str, content: Bytes) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| StorageError::Io(format!("{path}: {err}")))?;
        tokio::fs::write(&full, &content)
            .await
            .map_err(|err| StorageError::Io(format!("{path}: {err}")))
    }

    async fn delete_object(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|err| map_io(path, err))
    }
}
