//! The store facade every caller goes through.
//!
//! [`MapStore`] is built once from a [`StoreConfig`] and exposes the boundary
//! operations a transport layer needs (catalog, markers, item details, images,
//! cleanup, pinned popups, presets). The operations themselves live next to
//! their component as `impl MapStore` blocks:
//!
//! | Module | Operations |
//! |--------|------------|
//! | [`markers`](crate::markers) | `list_markers`, `create_marker`, `update_marker`, `delete_marker` |
//! | [`items`](crate::items) | `item_details`, `save_item_details` |
//! | [`cleanup`](crate::cleanup) | `cleanup_items`, `cleanup_marker_items` |
//! | [`images`](crate::images) | `upload_image`, `delete_image`, `resolve_image` |
//! | [`pinned`](crate::pinned) | `load_pinned`, `save_pinned` |
//!
//! ## Write Model
//!
//! Every mutation reads the whole target file, changes it in memory, and
//! rewrites it. Within one process, a per-file mutex (see
//! [`WritesConfig`](crate::config::WritesConfig)) keeps two calls from
//! interleaving on the same file. Across processes the last writer wins.

use crate::catalog::{self, MapNode};
use crate::config::{self, ConfigError, StoreConfig};
use crate::paths::PathResolver;
use crate::presets::PresetLibrary;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-file write locks, created on first use.
#[derive(Debug)]
pub(crate) struct FileLocks {
    enabled: bool,
    table: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileLocks {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Lock handle for `path`. With locking disabled every call gets its own
    /// uncontended mutex.
    pub(crate) fn handle(&self, path: &Path) -> Arc<Mutex<()>> {
        if !self.enabled {
            return Arc::new(Mutex::new(()));
        }
        self.table
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }
}

#[derive(Debug)]
pub struct MapStore {
    config: StoreConfig,
    paths: PathResolver,
    presets: PresetLibrary,
    locks: FileLocks,
}

impl MapStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            paths: PathResolver::new(&config),
            presets: PresetLibrary::new(&config),
            locks: FileLocks::new(config.writes.lock_per_file),
            config,
        }
    }

    /// Load `mapkeeper.toml` from `data_dir` (stock defaults if absent) and
    /// build a store on it.
    pub fn open(data_dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(config::load_config(data_dir)?))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    /// The ordered map catalog. Empty if the maps root does not exist.
    pub fn catalog(&self) -> Vec<MapNode> {
        catalog::build_catalog(self.paths.root(), &self.config.maps)
    }

    /// Every map image path → default `[width, height]`.
    pub fn map_sizes(&self) -> BTreeMap<String, [u32; 2]> {
        catalog::map_sizes(self.paths.root(), &self.config.maps)
    }

    pub(crate) fn file_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks.handle(path)
    }

    pub(crate) fn verbose(&self) -> bool {
        self.config.logging.verbose
    }
}
