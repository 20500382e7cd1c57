//! Cascading cleanup of item details and their uploaded images.
//!
//! A marker owns the item-detail entries whose keys it derives (see
//! [`Marker::item_keys`]). Removing one of those entries also deletes every
//! uploaded image its `additionalImage` list points at:
//!
//! ```text
//! marker 7 ── entries[].items[].itemname "Rusty Key!"
//!    └─ item key "7_Rusty_Key" ── item-details.json entry
//!          └─ additionalImage "/api/map-images/A/images/x.png"
//!                └─ maps/A/images/x.png
//! ```
//!
//! Marker deletion and the standalone bulk cleanup both go through
//! [`MapStore::cleanup_keys_in`], so the two paths cannot drift apart.
//! Cleanup is best effort per key: a failure is logged and the key is left
//! out of the returned list, the remaining keys still run.

use crate::error::{Result, StoreError};
use crate::flatfile;
use crate::paths::{IMAGES_DIRNAME, ITEM_DETAILS_FILENAME};
use crate::records::{ItemDetails, Marker};
use crate::store::MapStore;
use serde_json::Value;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use tracing::{debug, info, warn};

impl MapStore {
    /// Remove the named item keys (and their images) from `map`'s item details.
    ///
    /// Returns the keys that existed and were removed, in input order.
    pub fn cleanup_items(&self, map: &str, item_keys: &[String]) -> Result<Vec<String>> {
        let folder = self.paths().map_folder(map)?;
        let cleaned = self.cleanup_keys_in(&folder, item_keys);
        if self.verbose() {
            info!(map = %map, cleaned = cleaned.len(), requested = item_keys.len(), "cleaned up items");
        }
        Ok(cleaned)
    }

    /// Remove every item-detail entry `marker` owns in `map`.
    pub fn cleanup_marker_items(&self, marker: &Marker, map: &str) -> Result<Vec<String>> {
        let folder = self.paths().map_folder(map)?;
        Ok(self.cleanup_marker_in(&folder, marker))
    }

    pub(crate) fn cleanup_marker_in(&self, folder: &Path, marker: &Marker) -> Vec<String> {
        self.cleanup_keys_in(folder, &marker.item_keys())
    }

    pub(crate) fn cleanup_keys_in(&self, folder: &Path, item_keys: &[String]) -> Vec<String> {
        item_keys
            .iter()
            .filter(|key| match self.cleanup_item_in(folder, key) {
                Ok(cleaned) => cleaned,
                Err(e) => {
                    warn!(folder = %folder.display(), key = %key, error = %e, "item cleanup failed");
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// Remove one key. `Ok(false)` if the key was not present.
    fn cleanup_item_in(&self, folder: &Path, key: &str) -> io::Result<bool> {
        let file = folder.join(ITEM_DETAILS_FILENAME);

        let lock = self.file_lock(&file);
        let _guard = lock.lock();
        let mut details: ItemDetails = flatfile::read_json(&file, ItemDetails::default());
        if !details.contains(key) {
            return Ok(false);
        }

        let marker = self.config().maps.image_url_marker.as_str();
        let images: Vec<String> = details
            .additional_images(key)
            .into_iter()
            .filter(|url| url.contains(marker))
            .filter_map(image_filename)
            .collect();
        let images_dir = folder.join(IMAGES_DIRNAME);
        for filename in images {
            remove_image(&images_dir.join(&filename), self.verbose());
        }

        details.remove(key);
        flatfile::write_json(&file, &details)?;
        if self.verbose() {
            info!(folder = %folder.display(), key = %key, "cleaned up item");
        }
        Ok(true)
    }
}

/// Pull `itemKeys` out of a bulk-cleanup request body.
///
/// The field is required and must be a list; non-string entries can never
/// match a key and are dropped.
pub fn parse_item_keys(body: &Value) -> Result<Vec<String>> {
    let keys = body
        .get("itemKeys")
        .ok_or_else(|| StoreError::validation("Missing required field: itemKeys"))?;
    let list = keys
        .as_array()
        .ok_or_else(|| StoreError::validation("itemKeys must be an array"))?;
    Ok(list
        .iter()
        .filter_map(|k| k.as_str().map(String::from))
        .collect())
}

/// Last path segment of an image URL, if it names a plain file.
pub(crate) fn image_filename(url: &str) -> Option<String> {
    let name = url.rsplit(['/', '\\']).next()?;
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

fn remove_image(path: &Path, verbose: bool) {
    match fs::remove_file(path) {
        Ok(()) if verbose => info!(path = %path.display(), "deleted image"),
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "referenced image already gone");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete image"),
    }
}
