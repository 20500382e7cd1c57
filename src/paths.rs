//! Logical map path → physical storage folder.
//!
//! A logical map path is the forward-slash identifier the UI uses for a map,
//! e.g. `Region/SubArea/world.png`. Every per-map artifact lives in the map's
//! folder under the maps root:
//!
//! ```text
//! maps/Region/SubArea/
//! ├── world.png            # map image (basename of the logical path)
//! ├── markers.txt          # MARKERS_FILENAME
//! ├── item-details.json    # ITEM_DETAILS_FILENAME
//! └── images/              # IMAGES_DIRNAME
//! ```
//!
//! Resolution rules:
//! - `world.png` (one segment with a dot) → `maps/world`
//! - `world` (one segment, no dot) → `maps/world`
//! - `Region/world.png` (last segment is an image) → `maps/Region`
//! - `Region/Sub` (last segment is not an image) → `maps/Region/Sub`
//!
//! Every method here is pure path arithmetic. Write paths call
//! [`ensure_folder`] explicitly before touching the disk.

use crate::config::{MapsConfig, StoreConfig};
use crate::error::{Result, StoreError};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const MARKERS_FILENAME: &str = "markers.txt";
pub const ITEM_DETAILS_FILENAME: &str = "item-details.json";
pub const IMAGES_DIRNAME: &str = "images";

/// Replace Windows separators so logical paths are always `/`-separated.
pub fn normalize_map_path(map_path: &str) -> String {
    map_path.replace('\\', "/")
}

/// Create `folder` and its parents. Succeeds if it already exists.
pub fn ensure_folder(folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(folder)
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    maps: MapsConfig,
    trace: bool,
}

impl PathResolver {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.maps_root(),
            maps: config.maps.clone(),
            trace: config.logging.debug,
        }
    }

    /// The maps root every logical path is resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding every artifact of `map_path`.
    pub fn map_folder(&self, map_path: &str) -> Result<PathBuf> {
        let normalized = normalize_map_path(map_path);
        let parts = validated_segments(&normalized)?;

        let folder_parts: Vec<&str> = match parts.as_slice() {
            [single] => vec![strip_extension(single)],
            [parent @ .., last] if self.maps.is_image_name(last) => parent.to_vec(),
            all => all.to_vec(),
        };

        let mut folder = self.root.clone();
        for part in folder_parts.into_iter().filter(|p| !p.is_empty()) {
            folder.push(part);
        }
        if self.trace {
            debug!(map = %normalized, folder = %folder.display(), "resolved map folder");
        }
        Ok(folder)
    }

    pub fn marker_file(&self, map_path: &str) -> Result<PathBuf> {
        Ok(self.map_folder(map_path)?.join(MARKERS_FILENAME))
    }

    pub fn item_details_file(&self, map_path: &str) -> Result<PathBuf> {
        Ok(self.map_folder(map_path)?.join(ITEM_DETAILS_FILENAME))
    }

    pub fn images_dir(&self, map_path: &str) -> Result<PathBuf> {
        Ok(self.map_folder(map_path)?.join(IMAGES_DIRNAME))
    }

    /// On-disk path of the map image itself: `<folder>/<basename>`.
    pub fn map_image(&self, map_path: &str) -> Result<PathBuf> {
        let normalized = normalize_map_path(map_path);
        let basename = normalized.rsplit('/').next().unwrap_or_default();
        Ok(self.map_folder(&normalized)?.join(basename))
    }

    /// Logical path of a folder under the maps root, `/`-separated.
    ///
    /// Returns `None` for folders outside the root.
    pub fn logical_path_of(&self, folder: &Path) -> Option<String> {
        let rel = folder.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Some(parts.join("/"))
    }
}

/// Split a normalized logical path, rejecting anything that could escape the
/// maps root.
fn validated_segments(map_path: &str) -> Result<Vec<&str>> {
    if map_path.trim().is_empty() {
        return Err(StoreError::validation("map path must not be empty"));
    }
    let parts: Vec<&str> = map_path.split('/').collect();
    if map_path.starts_with('/') || is_drive_prefix(parts[0]) {
        return Err(StoreError::validation(format!(
            "map path must be relative: {map_path}"
        )));
    }
    if parts.contains(&"..") {
        return Err(StoreError::validation(format!(
            "map path must not contain '..': {map_path}"
        )));
    }
    Ok(parts)
}

/// `C:` as a whole segment. Colons elsewhere are ordinary name characters.
fn is_drive_prefix(segment: &str) -> bool {
    matches!(segment.as_bytes(), [drive, b':'] if drive.is_ascii_alphabetic())
}

/// `world.png` → `world`; names without an extension (or dotfiles) unchanged.
fn strip_extension(segment: &str) -> &str {
    match segment.rfind('.') {
        Some(idx) if idx > 0 && !segment[..idx].chars().all(|c| c == '.') => &segment[..idx],
        _ => segment,
    }
}
