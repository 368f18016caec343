//! # API Route Modules
//!
//! Route modules for the repository surface:
//!
//! - `index` — `GET /index.yaml`, the serialized repository index.
//! - `objects` — `GET /charts/:filename`, raw artifact downloads.
//! - `charts` — `GET /api/charts*`, chart and version queries over the
//!   in-memory index.
//! - `manage` — `POST /api/charts`, `POST /api/prov`,
//!   `DELETE /api/charts/:name/:version`: the write surface. Mounted only
//!   when the API is enabled.

pub mod charts;
pub mod index;
pub mod manage;
pub mod objects;
