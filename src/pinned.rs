//! Pinned marker popups (`app-data/pinned.txt`).
//!
//! The file is JSON-Lines and may hold several records for the same marker
//! (older writers appended). Reads collapse them: the last record per
//! canonical key wins, at the position where the key first appeared. Saves
//! rewrite the collapsed set and sync it to disk before returning.

use crate::error::{Result, StoreError};
use crate::flatfile::{self, Durability};
use crate::records::{PinnedPopup, json_kind};
use crate::store::MapStore;
use serde_json::{Map, Value};
use std::io;
use std::path::Path;
use tracing::info;

impl MapStore {
    /// The current pinned set, one popup per marker.
    pub fn load_pinned(&self) -> Result<Vec<PinnedPopup>> {
        let set = read_pinned_set(&self.config().pinned_file())?;
        Ok(set
            .into_iter()
            .filter_map(|(_, popup)| PinnedPopup::from_value(popup))
            .collect())
    }

    /// Apply a batch of pin/unpin records and return how many popups remain.
    ///
    /// An empty batch unpins everything. A record with a truthy `remove`
    /// unpins its marker; any other record replaces the stored one.
    /// Non-objects and records without `markerID` are ignored.
    pub fn save_pinned(&self, batch: &[Value]) -> Result<usize> {
        let file = self.config().pinned_file();

        let lock = self.file_lock(&file);
        let _guard = lock.lock();
        let mut set = if batch.is_empty() {
            Map::new()
        } else {
            read_pinned_set(&file)?
        };

        for record in batch {
            let Some(popup) = PinnedPopup::from_value(record.clone()) else {
                continue;
            };
            let Some(key) = popup.marker_key() else {
                continue;
            };
            if popup.is_removal() {
                set.shift_remove(&key);
            } else {
                set.insert(key, popup.into_stored().into_value());
            }
        }

        let records: Vec<&Value> = set.values().collect();
        flatfile::write_json_lines(&file, &records, Durability::Synced)?;
        if self.verbose() {
            info!(pinned = records.len(), batch = batch.len(), "pinned popups saved");
        }
        Ok(records.len())
    }
}

/// Accept a request body as a pinned batch. Only lists qualify.
pub fn parse_pinned_batch(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        other => Err(StoreError::validation(format!(
            "pinned popups must be a JSON array, got {}",
            json_kind(&other)
        ))),
    }
}

/// Canonical key → last stored record, ordered by first appearance.
fn read_pinned_set(file: &Path) -> io::Result<Map<String, Value>> {
    let records: Vec<PinnedPopup> = flatfile::read_json_lines(file)?;
    let mut set = Map::new();
    for popup in records {
        if let Some(key) = popup.marker_key() {
            set.insert(key, popup.into_value());
        }
    }
    Ok(set)
}
