//! Schema-tolerant record types.
//!
//! Markers, item details and pinned popups are written by the browser UI and
//! carry many fields this crate never looks at. Each record is therefore an
//! ordered JSON object wrapped in a newtype: the accessors below read the few
//! fields the store needs, and every other field (and the key order) survives
//! a read-modify-write untouched.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Id placeholder used in item keys of markers that carry no `id`.
const UNKNOWN_ID: &str = "unknown";

/// Transient control field on pinned-popup writes. Never persisted.
const REMOVE_FIELD: &str = "remove";

// ============================================================================
// Markers
// ============================================================================

/// A user annotation on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(Map<String, Value>);

impl Marker {
    /// Wrap a JSON value. Only objects are markers.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(StoreError::validation(format!(
                "marker must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Integer id, if the record has one.
    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(integral)
    }

    /// True if the record's `id` equals `id` numerically.
    pub fn has_id(&self, id: i64) -> bool {
        self.id() == Some(id)
    }

    /// The `map` field, if it is a non-empty string.
    pub fn map_path(&self) -> Option<&str> {
        self.0
            .get("map")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// The `map` field, or a validation error naming it.
    pub fn require_map(&self) -> Result<&str> {
        self.map_path()
            .ok_or_else(|| StoreError::validation("Missing required field: map"))
    }

    /// Non-empty `entries[].items[].itemname` values, in document order.
    pub fn item_names(&self) -> Vec<&str> {
        let Some(entries) = self.0.get("entries").and_then(Value::as_array) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| entry.get("items").and_then(Value::as_array))
            .flatten()
            .filter_map(|item| item.get("itemname").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Item-detail keys this marker owns, in document order.
    pub fn item_keys(&self) -> Vec<String> {
        let id = self
            .0
            .get("id")
            .map(value_label)
            .unwrap_or_else(|| UNKNOWN_ID.to_string());
        self.item_names()
            .into_iter()
            .map(|name| item_key(&id, name))
            .collect()
    }
}

/// Keep only `[A-Za-z0-9 ]`, then turn spaces into underscores.
///
/// `"Fire & Ice #2"` → `"Fire__Ice_2"`
pub fn sanitize_item_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// `"{marker_id}_{sanitized itemname}"`
pub fn item_key(marker_id: &str, item_name: &str) -> String {
    format!("{}_{}", marker_id, sanitize_item_name(item_name))
}

// ============================================================================
// Item details
// ============================================================================

/// One map's item metadata: item key → record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemDetails(Map<String, Value>);

impl ItemDetails {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trimmed, non-empty entries of the record's `additionalImage` list.
    pub fn additional_images(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .and_then(|record| record.get("additionalImage"))
            .and_then(Value::as_str)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Pinned popups
// ============================================================================

/// A pinned marker popup, keyed by its (possibly composite) `markerID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinnedPopup(Map<String, Value>);

impl PinnedPopup {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Canonical key of `markerID`, or `None` if the record has none.
    pub fn marker_key(&self) -> Option<String> {
        self.0.get("markerID").map(canonical_marker_key)
    }

    /// True if this write asks for the popup to be unpinned. Any truthy
    /// `remove` value counts, not only `true`.
    pub fn is_removal(&self) -> bool {
        self.0.get(REMOVE_FIELD).is_some_and(is_truthy)
    }

    /// The record as it should be stored: transient control fields dropped.
    pub fn into_stored(mut self) -> Self {
        self.0.shift_remove(REMOVE_FIELD);
        self
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Canonical string key of a `markerID`.
///
/// Arrays are sorted (numerically when every element is a number) and joined
/// with `-`, so `[3, 1]` and `[1, 3]` both become `"1-3"`. Scalars use their
/// plain string form.
pub fn canonical_marker_key(marker_id: &Value) -> String {
    match marker_id {
        Value::Array(parts) => {
            let mut labels: Vec<(Option<f64>, String)> = parts
                .iter()
                .map(|p| (p.as_f64(), value_label(p)))
                .collect();
            if labels.iter().all(|(n, _)| n.is_some()) {
                labels.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            } else {
                labels.sort_by(|a, b| a.1.cmp(&b.1));
            }
            labels
                .into_iter()
                .map(|(_, label)| label)
                .collect::<Vec<_>>()
                .join("-")
        }
        other => value_label(other),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Plain string form of a JSON scalar: strings unquoted, numbers as written.
fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer value of a JSON number, accepting integral floats like `7.0`.
fn integral(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
