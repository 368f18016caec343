//! # shelf-storage — Blob Storage for the Shelf Chart Repository
//!
//! The storage layer that backs the repository index. Everything above this
//! crate sees storage as a flat namespace of [`Object`]s behind the
//! [`Backend`] trait — the index coherence engine never touches the
//! filesystem or an object store directly.
//!
//! ## Contents
//!
//! - [`Object`] — a stored artifact: path, content bytes, and the metadata
//!   used as its change-detection identity.
//! - [`diff`] / [`ObjectSliceDiff`] — the three-way classification of two
//!   listings (added / removed / updated) that drives incremental index
//!   reconciliation.
//! - [`Backend`] — the async storage interface (list, get, put, delete).
//! - [`LocalBackend`] — the filesystem driver.
//! - [`StorageError`] — `NotFound` vs transient I/O, which callers must
//!   distinguish (absence is the permission-to-create signal for uploads).

pub mod backend;
pub mod diff;
pub mod local;
pub mod object;

pub use backend::{Backend, StorageError};
pub use diff::{diff, ObjectSliceDiff};
pub use local::LocalBackend;
pub use object::Object;
