//! Marker collections, one JSON-Lines `markers.txt` per map folder.
//!
//! Markers are opaque records to the store apart from `id`, `map` and the
//! item names used for cascading cleanup (see [`records::Marker`]).
//!
//! Ids are caller-supplied and never checked for uniqueness: `create` always
//! appends, `update` replaces the first record with the id (or appends), and
//! `delete` removes every record with the id from the one file it touches.
//!
//! [`records::Marker`]: crate::records::Marker

use crate::error::{Result, StoreError};
use crate::flatfile::{self, Durability};
use crate::paths::{MARKERS_FILENAME, ensure_folder};
use crate::records::Marker;
use crate::store::MapStore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// What `update_marker` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Replaced,
    Appended,
}

/// Result of a successful `delete_marker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerDeletion {
    /// Logical path of the map folder the marker was removed from.
    pub map: String,
    /// Records removed (more than one only when ids were duplicated).
    pub removed: usize,
    /// Item-detail keys cleaned up by the cascade.
    pub cleaned_up: Vec<String>,
}

impl MapStore {
    /// Markers of one map, or of every map when `map` is `None`.
    pub fn list_markers(&self, map: Option<&str>) -> Result<Vec<Marker>> {
        match map {
            Some(map) => self.markers_for_map(map),
            None => self.all_markers(),
        }
    }

    /// All records of `map`'s marker file, in file order.
    pub fn markers_for_map(&self, map: &str) -> Result<Vec<Marker>> {
        let file = self.paths().marker_file(map)?;
        Ok(flatfile::read_json_lines(&file)?)
    }

    /// Every marker file under the maps root, concatenated in traversal order.
    pub fn all_markers(&self) -> Result<Vec<Marker>> {
        let mut all = Vec::new();
        for file in self.marker_files() {
            all.extend(flatfile::read_json_lines::<Marker>(&file)?);
        }
        Ok(all)
    }

    /// Append `marker` to its map's collection.
    pub fn create_marker(&self, marker: Marker) -> Result<()> {
        let map = marker.require_map()?.to_string();
        let file = self.paths().marker_file(&map)?;

        let lock = self.file_lock(&file);
        let _guard = lock.lock();
        let mut markers: Vec<Marker> = flatfile::read_json_lines(&file)?;
        markers.push(marker);
        write_markers(&file, &markers)?;

        if self.verbose() {
            info!(map = %map, count = markers.len(), "marker saved");
        }
        Ok(())
    }

    /// Replace the first marker with `id` in the map named by `marker.map`,
    /// appending when none matches.
    pub fn update_marker(&self, id: i64, marker: Marker) -> Result<UpdateOutcome> {
        let map = marker.require_map()?.to_string();
        let file = self.paths().marker_file(&map)?;

        let lock = self.file_lock(&file);
        let _guard = lock.lock();
        let mut markers: Vec<Marker> = flatfile::read_json_lines(&file)?;
        let outcome = match markers.iter().position(|m| m.has_id(id)) {
            Some(idx) => {
                markers[idx] = marker;
                UpdateOutcome::Replaced
            }
            None => {
                markers.push(marker);
                UpdateOutcome::Appended
            }
        };
        write_markers(&file, &markers)?;

        if self.verbose() {
            info!(map = %map, id, ?outcome, "marker updated");
        }
        Ok(outcome)
    }

    /// Delete marker `id`, cascading cleanup of the items it owns.
    ///
    /// With `map`, only that map's file is searched. Without it, marker files
    /// are searched in traversal order and the first one holding the id is the
    /// only one changed. Returns `NotFound` if no record was removed.
    pub fn delete_marker(&self, id: i64, map: Option<&str>) -> Result<MarkerDeletion> {
        match map {
            Some(map) => {
                let file = self.paths().marker_file(map)?;
                self.delete_from_file(id, &file)?.ok_or_else(|| {
                    StoreError::not_found(format!("marker {id} not found in map {map}"))
                })
            }
            None => {
                for file in self.marker_files() {
                    if let Some(deletion) = self.delete_from_file(id, &file)? {
                        return Ok(deletion);
                    }
                }
                Err(StoreError::not_found(format!("marker {id} not found")))
            }
        }
    }

    /// Cascade and remove `id` from one marker file. `None` if absent.
    fn delete_from_file(&self, id: i64, file: &Path) -> Result<Option<MarkerDeletion>> {
        let folder = file.parent().unwrap_or(self.paths().root());

        let lock = self.file_lock(file);
        let _guard = lock.lock();
        let markers: Vec<Marker> = flatfile::read_json_lines(file)?;
        let Some(target) = markers.iter().find(|m| m.has_id(id)) else {
            return Ok(None);
        };

        let cleaned_up = self.cleanup_marker_in(folder, target);

        let before = markers.len();
        let kept: Vec<Marker> = markers.into_iter().filter(|m| !m.has_id(id)).collect();
        let removed = before - kept.len();
        write_markers(file, &kept)?;

        let map = self.paths().logical_path_of(folder).unwrap_or_default();
        if self.verbose() {
            info!(
                map = %map,
                id,
                removed,
                cleaned = cleaned_up.len(),
                "marker deleted"
            );
        }
        Ok(Some(MarkerDeletion {
            map,
            removed,
            cleaned_up,
        }))
    }

    /// Every `markers.txt` under the maps root, sorted by path.
    fn marker_files(&self) -> Vec<PathBuf> {
        let root = self.paths().root();
        if !root.is_dir() {
            return Vec::new();
        }
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry while collecting markers");
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && e.file_name() == MARKERS_FILENAME)
            .map(|e| e.into_path())
            .collect()
    }
}

fn write_markers(file: &Path, markers: &[Marker]) -> Result<()> {
    if let Some(folder) = file.parent() {
        ensure_folder(folder)?;
    }
    flatfile::write_json_lines(file, markers, Durability::Buffered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn list_missing_map_is_empty_and_creates_nothing() {
        let fx = Fixture::new();
        let store = fx.store();
        assert!(store.list_markers(Some("Ghost/ghost.png")).unwrap().is_empty());
        assert!(!fx.path("Ghost").exists());
    }

    #[test]
    fn corrupt_line_does_not_hide_good_ones() {
        let fx = Fixture::new();
        fx.write(
            "A/markers.txt",
            "{\"id\": 1, \"map\": \"A/a.png\"}\n{not json\n",
        );

        let markers = fx.store().list_markers(Some("A/a.png")).unwrap();
        assert_eq!(marker_ids(&markers), vec![Some(1)]);
    }

    #[test]
    fn create_requires_map_before_any_io() {
        let fx = Fixture::new();
        let result = fx.store().create_marker(marker(json!({"id": 1})));
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(fs::read_dir(fx.maps_root()).unwrap().count(), 0);
    }

    #[test]
    fn create_appends_and_creates_folder() {
        let fx = Fixture::new();
        let store = fx.store();
        store
            .create_marker(marker(json!({"id": 1, "map": "New/n.png", "lat": 3})))
            .unwrap();
        store
            .create_marker(marker(json!({"id": 2, "map": "New/n.png"})))
            .unwrap();

        let raw = fs::read_to_string(fx.path("New/markers.txt")).unwrap();
        assert_eq!(
            raw,
            "{\"id\":1,\"map\":\"New/n.png\",\"lat\":3}\n{\"id\":2,\"map\":\"New/n.png\"}\n"
        );
    }

    #[test]
    fn duplicate_ids_are_kept_on_create() {
        let fx = Fixture::new();
        let store = fx.store();
        for _ in 0..2 {
            store
                .create_marker(marker(json!({"id": 4, "map": "A/a.png"})))
                .unwrap();
        }
        let markers = store.list_markers(Some("A/a.png")).unwrap();
        assert_eq!(marker_ids(&markers), vec![Some(4), Some(4)]);
    }

    #[test]
    fn update_replaces_first_match_only() {
        let fx = Fixture::new();
        fx.markers(
            "A/markers.txt",
            &[
                json!({"id": 1, "map": "A/a.png", "v": "old"}),
                json!({"id": 1, "map": "A/a.png", "v": "dup"}),
                json!({"id": 2, "map": "A/a.png"}),
            ],
        );
        let store = fx.store();
        let outcome = store
            .update_marker(1, marker(json!({"id": 1, "map": "A/a.png", "v": "new"})))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Replaced);

        let markers = store.list_markers(Some("A/a.png")).unwrap();
        let versions: Vec<&str> = markers
            .iter()
            .filter_map(|m| m.fields().get("v").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(versions, vec!["new", "dup"]);
        assert_eq!(markers.len(), 3);
    }

    #[test]
    fn update_appends_on_miss() {
        let fx = Fixture::new();
        let store = fx.store();
        let outcome = store
            .update_marker(9, marker(json!({"id": 9, "map": "A/a.png"})))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Appended);
        assert_eq!(store.list_markers(Some("A/a.png")).unwrap().len(), 1);
    }

    #[test]
    fn update_requires_map() {
        let fx = Fixture::new();
        let result = fx.store().update_marker(1, marker(json!({"id": 1})));
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn list_all_spans_every_folder() {
        let fx = Fixture::new();
        fx.markers("B/markers.txt", &[json!({"id": 3})]);
        fx.markers("A/markers.txt", &[json!({"id": 1}), json!({"id": 2})]);
        fx.markers("A/deep/markers.txt", &[json!({"id": 5})]);

        let markers = fx.store().list_markers(None).unwrap();
        let mut ids = marker_ids(&markers);
        ids.sort();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(5)]);
    }

    #[test]
    fn list_all_missing_root_is_empty() {
        let fx = Fixture::new();
        fs::remove_dir_all(fx.maps_root()).unwrap();
        assert!(fx.store().list_markers(None).unwrap().is_empty());
    }

    #[test]
    fn delete_with_map_removes_all_matching_records() {
        let fx = Fixture::new();
        fx.markers(
            "A/markers.txt",
            &[json!({"id": 1}), json!({"id": 2}), json!({"id": 1})],
        );
        let deletion = fx.store().delete_marker(1, Some("A/a.png")).unwrap();
        assert_eq!(deletion.removed, 2);
        assert_eq!(deletion.map, "A");

        let left = fx.store().list_markers(Some("A/a.png")).unwrap();
        assert_eq!(marker_ids(&left), vec![Some(2)]);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let fx = Fixture::new();
        fx.markers("A/markers.txt", &[json!({"id": 1})]);
        let store = fx.store();

        assert!(store.delete_marker(2, Some("A/a.png")).unwrap_err().is_not_found());
        assert!(store.delete_marker(2, None).unwrap_err().is_not_found());
        assert!(store.delete_marker(1, Some("Other/o.png")).unwrap_err().is_not_found());
    }

    #[test]
    fn delete_without_map_stops_at_first_folder() {
        let fx = Fixture::new();
        fx.markers("A/markers.txt", &[json!({"id": 7, "map": "A/a.png"})]);
        fx.markers("B/markers.txt", &[json!({"id": 7, "map": "B/b.png"})]);
        let store = fx.store();

        let deletion = store.delete_marker(7, None).unwrap();
        assert_eq!(deletion.map, "A");
        assert!(store.list_markers(Some("A/a.png")).unwrap().is_empty());
        assert_eq!(store.list_markers(Some("B/b.png")).unwrap().len(), 1);
    }

    #[test]
    fn delete_keeps_unrelated_fields_untouched() {
        let fx = Fixture::new();
        fx.write(
            "A/markers.txt",
            "{\"z\":1,\"id\":1,\"a\":[1,2]}\n{\"id\":2,\"note\":\"Forêt\"}\n",
        );
        fx.store().delete_marker(2, Some("A/a.png")).unwrap();
        assert_eq!(
            fs::read_to_string(fx.path("A/markers.txt")).unwrap(),
            "{\"z\":1,\"id\":1,\"a\":[1,2]}\n"
        );
    }

    #[test]
    fn colon_folder_from_catalog_round_trips() {
        let fx = Fixture::new();
        fx.image("Act 1: Start/m.png");
        let store = fx.store();
        let catalog = store.catalog();
        let map = catalog[0].path();
        assert_eq!(map, "Act 1: Start/m.png");

        store
            .create_marker(marker(json!({"id": 3, "map": map})))
            .unwrap();
        let markers = store.list_markers(Some(map)).unwrap();
        assert_eq!(marker_ids(&markers), vec![Some(3)]);
        assert!(fx.path("Act 1: Start/markers.txt").is_file());
    }

    #[test]
    fn concurrent_creates_on_one_map_lose_nothing() {
        const THREADS: usize = 16;
        const PER_THREAD: usize = 20;

        let fx = Fixture::new();
        let store = std::sync::Arc::new(fx.store());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let id = (t * PER_THREAD + i) as i64;
                        store
                            .create_marker(marker(json!({"id": id, "map": "A/a.png"})))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids: Vec<i64> = store
            .list_markers(Some("A/a.png"))
            .unwrap()
            .iter()
            .filter_map(Marker::id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..(THREADS * PER_THREAD) as i64).collect::<Vec<_>>());
    }
}
