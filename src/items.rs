//! Per-map item details (`item-details.json`).
//!
//! The document is stored whole: `save_item_details` replaces it, and the
//! cascade in [`cleanup`](crate::cleanup) is the only partial writer.

use crate::error::{Result, StoreError};
use crate::flatfile;
use crate::paths::ensure_folder;
use crate::records::{ItemDetails, json_kind};
use crate::store::MapStore;
use serde_json::Value;
use tracing::info;

impl MapStore {
    /// Item details of `map`, or an empty document if none exist yet.
    pub fn item_details(&self, map: &str) -> Result<ItemDetails> {
        let file = self.paths().item_details_file(map)?;
        Ok(flatfile::read_json(&file, ItemDetails::default()))
    }

    /// Overwrite `map`'s item details with `details`.
    pub fn save_item_details(&self, map: &str, details: &ItemDetails) -> Result<()> {
        let file = self.paths().item_details_file(map)?;

        let lock = self.file_lock(&file);
        let _guard = lock.lock();
        if let Some(folder) = file.parent() {
            ensure_folder(folder)?;
        }
        flatfile::write_json(&file, details)?;

        if self.verbose() {
            info!(map = %map, items = details.len(), "item details saved");
        }
        Ok(())
    }
}

/// Accept a request body as an item-details document. Only objects qualify.
pub fn parse_item_details(body: Value) -> Result<ItemDetails> {
    match body {
        Value::Object(fields) => Ok(ItemDetails::new(fields)),
        other => Err(StoreError::validation(format!(
            "item details must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}
