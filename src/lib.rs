//! # Mapkeeper
//!
//! File-backed storage for an interactive map annotation tool. Maps are image
//! files in a folder tree; everything users add on top of them (markers, item
//! details, uploaded pictures, pinned popups) lives next to the maps as plain
//! JSON and JSON-Lines files. There is no database.
//!
//! # Storage Layout
//!
//! ```text
//! <data>/
//! ├── mapkeeper.toml                  # optional config, layered over stock defaults
//! ├── app-data/
//! │   ├── pinned.txt                  # pinned popups (JSON-Lines)
//! │   └── maps/
//! │       ├── maps-loading-order.json # display order per folder
//! │       └── Region/SubArea/
//! │           ├── world.png           # the map itself
//! │           ├── markers.txt         # markers (JSON-Lines)
//! │           ├── item-details.json   # item key → details
//! │           └── images/             # uploads referenced by item details
//! ├── presets/                        # read-only preset library
//! └── assets/                         # preset images
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | `MapStore` facade: built from a config, owns the per-file lock table |
//! | [`paths`] | Logical map path → storage folder, path traversal checks |
//! | [`flatfile`] | Tolerant JSON / JSON-Lines reads, full-file rewrites |
//! | [`records`] | Schema-tolerant `Marker`, `ItemDetails`, `PinnedPopup` and key derivation |
//! | [`catalog`] | Map tree scan with load-order application, map sizes |
//! | [`markers`] | Marker list/create/update/delete with cascading cleanup |
//! | [`cleanup`] | Item-detail and upload removal shared by deletion and bulk cleanup |
//! | [`items`] | Whole-document item details per map |
//! | [`images`] | Base64 uploads, deletion and served-path resolution |
//! | [`pinned`] | Pinned popups, deduplicated by canonical marker key |
//! | [`presets`] | Preset categories and records with image fix-up |
//! | [`config`] | `mapkeeper.toml` loading, merging and validation |
//! | [`error`] | `StoreError` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Records Stay Opaque
//!
//! The browser UI owns the record schemas and adds fields freely. Records are
//! kept as ordered JSON objects behind small newtypes, so the store reads the
//! handful of fields it needs and writes everything else back untouched.
//!
//! ## Reads Never Fail On Bad Data
//!
//! A corrupt marker line or a truncated `item-details.json` is skipped or
//! treated as empty. Only real I/O errors surface.
//!
//! ## Cascading Deletes
//!
//! Deleting a marker removes the item details it owns and the uploaded images
//! those details point at. See [`cleanup`].

pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod flatfile;
pub mod images;
pub mod items;
pub mod markers;
pub mod output;
pub mod paths;
pub mod pinned;
pub mod presets;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use store::MapStore;

#[cfg(test)]
pub(crate) mod test_helpers;
