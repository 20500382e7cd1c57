//! Map catalog: the ordered tree of map folders under the maps root.
//!
//! ## Directory Structure
//!
//! ```text
//! maps/                            # Maps root
//! ├── maps-loading-order.json      # LoadOrder (never a catalog entry)
//! ├── Overworld/                   # Has images → two Map nodes, no Group
//! │   ├── day.png
//! │   └── night.png
//! └── Dungeons/                    # No images → Group, recursed
//!     ├── Crypt/
//!     │   └── crypt.jpg            # Map "Dungeons/Crypt/crypt.jpg"
//!     └── Empty/                   # Nothing below → pruned
//! ```
//!
//! A folder that directly holds images is flattened into one `Map` node per
//! image at its parent's level; it never becomes a group and is not recursed
//! further. A folder without direct images is scanned recursively and becomes
//! a `Group` only if something was found below it. Loose files are ignored.
//!
//! ## Ordering
//!
//! Siblings are ordered by the folder's entry in `maps-loading-order.json`
//! (keyed by the folder's logical path, `"root"` for the top level): listed
//! names first in list order, then everything else sorted case-insensitively.
//! Ordering is applied independently at every level, so adding or removing a
//! folder never requires touching another folder's order.

use crate::config::MapsConfig;
use crate::flatfile;
use crate::paths::IMAGES_DIRNAME;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

pub const LOADING_ORDER_FILENAME: &str = "maps-loading-order.json";

/// LoadOrder key of the maps root.
pub const ROOT_ORDER_KEY: &str = "root";

/// A node in the catalog tree.
///
/// Serializes as `{"name", "type": "map", "path"}` or
/// `{"name", "type": "folder", "path", "maps": [...], "mapCount"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MapNode {
    Map {
        name: String,
        path: String,
    },
    #[serde(rename = "folder")]
    Group {
        name: String,
        path: String,
        #[serde(rename = "maps")]
        children: Vec<MapNode>,
        #[serde(rename = "mapCount")]
        map_count: usize,
    },
}

impl MapNode {
    pub fn name(&self) -> &str {
        match self {
            MapNode::Map { name, .. } | MapNode::Group { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            MapNode::Map { path, .. } | MapNode::Group { path, .. } => path,
        }
    }

    /// Number of `Map` leaves this node stands for.
    pub fn map_count(&self) -> usize {
        match self {
            MapNode::Map { .. } => 1,
            MapNode::Group { map_count, .. } => *map_count,
        }
    }

    pub fn children(&self) -> &[MapNode] {
        match self {
            MapNode::Map { .. } => &[],
            MapNode::Group { children, .. } => children,
        }
    }

    fn group(name: &str, path: String, children: Vec<MapNode>) -> Self {
        let map_count = children.iter().map(MapNode::map_count).sum();
        MapNode::Group {
            name: name.to_string(),
            path,
            children,
            map_count,
        }
    }
}

/// Folder key → preferred child order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOrder(HashMap<String, Vec<String>>);

impl LoadOrder {
    /// Read the order file. Missing or malformed files give an empty order;
    /// entries that are not lists of names are ignored.
    pub fn load(path: &Path) -> Self {
        let raw: Map<String, Value> = flatfile::read_json(path, Map::new());
        Self::from_document(raw)
    }

    pub fn from_document(raw: Map<String, Value>) -> Self {
        let entries = raw
            .into_iter()
            .filter_map(|(key, value)| {
                let names = value
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect();
                Some((key, names))
            })
            .collect();
        Self(entries)
    }

    fn names_for(&self, folder_path: &str) -> &[String] {
        let key = if folder_path.is_empty() {
            ROOT_ORDER_KEY
        } else {
            folder_path
        };
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Listed names first (list order), the rest sorted case-insensitively.
    pub fn apply(&self, nodes: Vec<MapNode>, folder_path: &str) -> Vec<MapNode> {
        let listed = self.names_for(folder_path);
        let mut remaining = nodes;
        let mut ordered = Vec::with_capacity(remaining.len());

        for name in listed {
            let (matching, rest): (Vec<_>, Vec<_>) =
                remaining.into_iter().partition(|n| n.name() == name);
            ordered.extend(matching);
            remaining = rest;
        }

        remaining.sort_by_key(|n| n.name().to_lowercase());
        ordered.extend(remaining);
        ordered
    }
}

/// Build the catalog for `root`. A missing root yields an empty catalog.
pub fn build_catalog(root: &Path, maps: &MapsConfig) -> Vec<MapNode> {
    if !root.is_dir() {
        return Vec::new();
    }
    let order = LoadOrder::load(&root.join(LOADING_ORDER_FILENAME));
    match scan_folder(root, "", maps, &order) {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "maps root unreadable");
            Vec::new()
        }
    }
}

fn scan_folder(
    path: &Path,
    rel_path: &str,
    maps: &MapsConfig,
    order: &LoadOrder,
) -> io::Result<Vec<MapNode>> {
    let mut nodes = Vec::new();

    for name in collect_entries(path)? {
        let entry_path = path.join(&name);
        if !entry_path.is_dir() {
            continue;
        }
        let entry_rel = join_rel(rel_path, &name);

        let images = match direct_images(&entry_path, maps) {
            Ok(images) => images,
            Err(e) => {
                warn!(folder = %entry_path.display(), error = %e, "skipping unreadable folder");
                continue;
            }
        };

        if !images.is_empty() {
            nodes.extend(images.into_iter().map(|image| MapNode::Map {
                path: format!("{entry_rel}/{image}"),
                name: image,
            }));
            continue;
        }

        match scan_folder(&entry_path, &entry_rel, maps, order) {
            Ok(children) if !children.is_empty() => {
                nodes.push(MapNode::group(&name, entry_rel, children));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(folder = %entry_path.display(), error = %e, "skipping unreadable folder");
            }
        }
    }

    Ok(order.apply(nodes, rel_path))
}

/// Entry names of a folder, sorted, without the load-order file.
fn collect_entries(path: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name != LOADING_ORDER_FILENAME)
        .collect();
    names.sort();
    Ok(names)
}

/// Image files directly inside `folder`, sorted by name.
fn direct_images(folder: &Path, maps: &MapsConfig) -> io::Result<Vec<String>> {
    Ok(collect_entries(folder)?
        .into_iter()
        .filter(|name| maps.is_image_name(name) && folder.join(name).is_file())
        .collect())
}

fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Every map image under `root` → the configured default `[width, height]`.
///
/// Upload folders (`images/`) hold attachments, not maps, and are skipped.
pub fn map_sizes(root: &Path, maps: &MapsConfig) -> BTreeMap<String, [u32; 2]> {
    if !root.is_dir() {
        return BTreeMap::new();
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && e.file_type().is_dir() && e.file_name() == IMAGES_DIRNAME))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry while listing map sizes");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && maps.is_image_name(&e.file_name().to_string_lossy()))
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((key, maps.default_size))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;

    #[test]
    fn missing_root_is_empty_catalog() {
        let fx = Fixture::new();
        let nodes = build_catalog(&fx.maps_root().join("absent"), &fx.config.maps);
        assert!(nodes.is_empty());
    }

    #[test]
    fn image_folders_flatten_into_map_nodes() {
        let fx = Fixture::new();
        fx.image("Overworld/day.png");
        fx.image("Overworld/night.png");

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        assert_eq!(node_names(&nodes), vec!["day.png", "night.png"]);
        assert_eq!(nodes[0].path(), "Overworld/day.png");
        assert!(matches!(nodes[0], MapNode::Map { .. }));
    }

    #[test]
    fn fixture_tree_is_deterministic_with_counts() {
        let fx = Fixture::new();
        fx.image("A/leaf.png");
        fx.image("B/c/leaf2.png");

        let first = build_catalog(&fx.maps_root(), &fx.config.maps);
        let second = build_catalog(&fx.maps_root(), &fx.config.maps);
        assert_eq!(first, second);

        // "B" < "leaf.png" case-insensitively; A itself is flattened away.
        assert_eq!(node_names(&first), vec!["B", "leaf.png"]);
        let b = find_node(&first, "B");
        assert_eq!(b.map_count(), 1);
        assert_eq!(b.path(), "B");
        assert_eq!(b.children()[0].path(), "B/c/leaf2.png");
    }

    #[test]
    fn map_count_is_recursive() {
        let fx = Fixture::new();
        fx.image("World/North/Ice/ice.png");
        fx.image("World/North/Snow/a.png");
        fx.image("World/North/Snow/b.png");
        fx.image("World/South/sand.jpg");

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        let world = find_node(&nodes, "World");
        assert_eq!(world.map_count(), 4);
        let north = find_node(world.children(), "North");
        assert_eq!(north.map_count(), 3);
        assert_eq!(
            world.map_count(),
            world.children().iter().map(MapNode::map_count).sum::<usize>()
        );
    }

    #[test]
    fn empty_groups_are_pruned() {
        let fx = Fixture::new();
        fx.dir("Hollow/one");
        fx.dir("Hollow/two/deeper");
        fx.image("Real/r.png");

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        assert_eq!(node_names(&nodes), vec!["r.png"]);
    }

    #[test]
    fn loose_files_and_non_images_ignored() {
        let fx = Fixture::new();
        fx.write("stray.png", "x");
        fx.write("Notes/readme.txt", "x");
        fx.image("Maps/m.webp");

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        assert_eq!(node_names(&nodes), vec!["m.webp"]);
    }

    #[test]
    fn root_load_order_prefix_then_case_insensitive() {
        let fx = Fixture::new();
        fx.image("A/x/a.png");
        fx.image("B/x/b.png");
        fx.image("C/x/c.png");
        fx.write_json(LOADING_ORDER_FILENAME, &json!({"root": ["B", "A"]}));

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        assert_catalog_shape(&nodes, &[("B", &["b.png"]), ("A", &["a.png"]), ("C", &["c.png"])]);
    }

    #[test]
    fn nested_load_order_keyed_by_relative_path() {
        let fx = Fixture::new();
        fx.image("Realm/alpha/x/1.png");
        fx.image("Realm/Beta/x/2.png");
        fx.image("Realm/gamma/x/3.png");
        fx.write_json(
            LOADING_ORDER_FILENAME,
            &json!({"Realm": ["gamma"], "root": ["Nonexistent"]}),
        );

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        let realm = find_node(&nodes, "Realm");
        assert_eq!(node_names(realm.children()), vec!["gamma", "alpha", "Beta"]);
    }

    #[test]
    fn unordered_siblings_sort_case_insensitively() {
        let fx = Fixture::new();
        fx.image("zeta/x/z.png");
        fx.image("Alpha/x/a.png");
        fx.image("beta/x/b.png");

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        assert_eq!(node_names(&nodes), vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn malformed_order_file_is_ignored() {
        let fx = Fixture::new();
        fx.image("b/x/b.png");
        fx.image("a/x/a.png");
        fx.write(LOADING_ORDER_FILENAME, "{broken");

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        assert_eq!(node_names(&nodes), vec!["a", "b"]);
    }

    #[test]
    fn load_order_ignores_non_list_entries() {
        let order = LoadOrder::from_document(
            serde_json::from_value(json!({"root": "B", "X": ["a", 3, "b"]})).unwrap(),
        );
        assert_eq!(order.names_for(""), &[] as &[String]);
        assert_eq!(order.names_for("X"), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn catalog_serializes_in_ui_shape() {
        let fx = Fixture::new();
        fx.image("G/sub/m.png");

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        let value = serde_json::to_value(&nodes).unwrap();
        assert_eq!(
            value,
            json!([{
                "name": "G",
                "type": "folder",
                "path": "G",
                "maps": [{"name": "m.png", "type": "map", "path": "G/sub/m.png"}],
                "mapCount": 1
            }])
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subfolder_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        fx.image("Open/x/o.png");
        let locked = fx.dir("Locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let nodes = build_catalog(&fx.maps_root(), &fx.config.maps);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // Running as root can still read the folder; either way "Open" survives.
        assert!(node_names(&nodes).contains(&"Open"));
    }

    #[test]
    fn map_sizes_lists_every_image_with_default_size() {
        let fx = Fixture::new();
        fx.image("A/leaf.png");
        fx.image("B/c/leaf2.jpg");
        fx.image("A/images/0badc0de.png");
        fx.write("A/markers.txt", "");

        let sizes = map_sizes(&fx.maps_root(), &fx.config.maps);
        let keys: Vec<&str> = sizes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["A/leaf.png", "B/c/leaf2.jpg"]);
        assert_eq!(sizes["A/leaf.png"], [1280, 720]);
    }

    #[test]
    fn map_sizes_missing_root_is_empty() {
        let fx = Fixture::new();
        assert!(map_sizes(&fx.maps_root().join("gone"), &fx.config.maps).is_empty());
    }
}
