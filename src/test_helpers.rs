//! Shared test utilities for the mapkeeper test suite.
//!
//! Provides a throwaway data directory with builders for maps-root content,
//! plus catalog lookups and shape assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fx = Fixture::new();
//! fx.image("Overworld/day.png");
//! fx.image("Dungeons/Crypt/crypt.jpg");
//!
//! let catalog = fx.store().catalog();
//! assert_catalog_shape(&catalog, &[
//!     ("day.png", &[]),
//!     ("Dungeons", &["crypt.jpg"]),
//! ]);
//! ```

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::catalog::MapNode;
use crate::config::StoreConfig;
use crate::records::Marker;
use crate::store::MapStore;

// =========================================================================
// Fixture setup
// =========================================================================

/// A temp data directory and the config pointing at it.
///
/// `config` is public so tests can tweak settings before calling
/// [`Fixture::store`].
pub struct Fixture {
    pub tmp: TempDir,
    pub config: StoreConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = StoreConfig::for_data_dir(tmp.path());
        fs::create_dir_all(config.maps_root()).unwrap();
        Self { tmp, config }
    }

    pub fn store(&self) -> MapStore {
        MapStore::new(self.config.clone())
    }

    pub fn maps_root(&self) -> PathBuf {
        self.config.maps_root()
    }

    /// Absolute path of `rel` under the maps root.
    pub fn path(&self, rel: &str) -> PathBuf {
        let mut p = self.maps_root();
        for part in rel.split('/').filter(|s| !s.is_empty()) {
            p.push(part);
        }
        p
    }

    /// Create a folder (and parents) under the maps root.
    pub fn dir(&self, rel: &str) -> PathBuf {
        let p = self.path(rel);
        fs::create_dir_all(&p).unwrap();
        p
    }

    /// Write raw content to `rel` under the maps root, creating parents.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let p = self.path(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, content).unwrap();
        p
    }

    pub fn write_json(&self, rel: &str, value: &serde_json::Value) -> PathBuf {
        self.write(rel, &serde_json::to_string_pretty(value).unwrap())
    }

    /// A placeholder map image (the scanner only checks extensions).
    pub fn image(&self, rel: &str) -> PathBuf {
        self.write(rel, "fake image")
    }

    /// Write `markers` as a JSON-Lines marker file at `rel` (a file path).
    pub fn markers(&self, rel: &str, markers: &[serde_json::Value]) -> PathBuf {
        let body: String = markers
            .iter()
            .map(|m| format!("{}\n", serde_json::to_string(m).unwrap()))
            .collect();
        self.write(rel, &body)
    }
}

/// Build a marker from a JSON literal. Panics on non-objects.
pub fn marker(value: serde_json::Value) -> Marker {
    Marker::from_value(value).unwrap()
}

/// Marker ids in order, `None` for records without one.
pub fn marker_ids(markers: &[Marker]) -> Vec<Option<i64>> {
    markers.iter().map(Marker::id).collect()
}

// =========================================================================
// Catalog lookups — panics with a clear message on miss
// =========================================================================

/// Sibling names in order.
pub fn node_names(nodes: &[MapNode]) -> Vec<&str> {
    nodes.iter().map(MapNode::name).collect()
}

/// Find a node by name among siblings. Panics if not found.
pub fn find_node<'a>(nodes: &'a [MapNode], name: &str) -> &'a MapNode {
    nodes.iter().find(|n| n.name() == name).unwrap_or_else(|| {
        let names = node_names(nodes);
        panic!("node '{name}' not found. Available: {names:?}")
    })
}

/// Assert top-level names and each node's direct child names.
///
/// Each entry is `(name, children)`. Use `&[]` for maps and for groups whose
/// children are not being checked.
pub fn assert_catalog_shape(nodes: &[MapNode], expected: &[(&str, &[&str])]) {
    let expected_names: Vec<&str> = expected.iter().map(|(n, _)| *n).collect();
    assert_eq!(node_names(nodes), expected_names, "top-level names mismatch");

    for (name, children) in expected {
        if children.is_empty() {
            continue;
        }
        let node = find_node(nodes, name);
        assert_eq!(
            node_names(node.children()),
            children.to_vec(),
            "children of '{name}' mismatch"
        );
    }
}
