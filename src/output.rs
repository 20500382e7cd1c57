//! CLI output formatting for every store operation.
//!
//! # Information-First Display
//!
//! The primary line for every entity (map, folder, marker, preset) is its
//! identity with a positional index. Storage details (logical paths, owning
//! map, cleaned item keys) follow as indented context lines:
//!
//! ```text
//! 001 Dungeons (3 maps)
//!     001 Crypt (2 maps)
//!         001 crypt.png
//!             Path: Dungeons/Crypt/crypt.png
//! 002 day.png
//!     Path: Overworld/day.png
//! ```
//!
//! ```text
//! Deleted marker 7 from Region/SubArea
//!     Cleaned: 7_Rusty_Key
//! ```
//!
//! # Architecture
//!
//! Each operation has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::catalog::MapNode;
use crate::markers::{MarkerDeletion, UpdateOutcome};
use crate::presets::Preset;
use crate::records::{Marker, PinnedPopup};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 map`, `3 maps`, `2 subcategories`.
fn plural(n: usize, noun: &str) -> String {
    match (n, noun.strip_suffix('y')) {
        (1, _) => format!("{} {}", n, noun),
        (_, Some(stem)) => format!("{} {}ies", n, stem),
        (_, None) => format!("{} {}s", n, noun),
    }
}

/// Index + title, with an optional parenthesized detail.
///
/// ```text
/// 001 Dungeons (3 maps)
/// 002 day.png
/// ```
fn entity_header(index: usize, title: &str, detail: Option<String>) -> String {
    match detail {
        Some(d) => format!("{} {} ({})", format_index(index), title, d),
        None => format!("{} {}", format_index(index), title),
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

/// Short display form of a scalar JSON field.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Format the catalog tree: groups with recursive map counts, maps with
/// their logical path.
pub fn format_catalog(nodes: &[MapNode]) -> Vec<String> {
    let mut lines = Vec::new();
    if nodes.is_empty() {
        lines.push("No maps found".to_string());
        return lines;
    }
    format_catalog_level(nodes, 0, &mut lines);
    lines
}

fn format_catalog_level(nodes: &[MapNode], depth: usize, lines: &mut Vec<String>) {
    for (i, node) in nodes.iter().enumerate() {
        let base = indent(depth);
        match node {
            MapNode::Map { name, path } => {
                lines.push(format!("{}{}", base, entity_header(i + 1, name, None)));
                lines.push(format!("{}    Path: {}", base, path));
            }
            MapNode::Group { name, children, .. } => {
                let detail = plural(node.map_count(), "map");
                lines.push(format!("{}{}", base, entity_header(i + 1, name, Some(detail))));
                format_catalog_level(children, depth + 1, lines);
            }
        }
    }
}

pub fn print_catalog(nodes: &[MapNode]) {
    print_lines(format_catalog(nodes));
}

/// One line per map image: `path  WIDTHxHEIGHT`.
pub fn format_sizes(sizes: &BTreeMap<String, [u32; 2]>) -> Vec<String> {
    sizes
        .iter()
        .map(|(path, [w, h])| format!("{}  {}x{}", path, w, h))
        .collect()
}

pub fn print_sizes(sizes: &BTreeMap<String, [u32; 2]>) {
    print_lines(format_sizes(sizes));
}

// ============================================================================
// Markers
// ============================================================================

/// Format markers as `#id` headers with item count, owning map and item keys.
pub fn format_markers(markers: &[Marker]) -> Vec<String> {
    let mut lines = Vec::new();
    if markers.is_empty() {
        lines.push("No markers".to_string());
        return lines;
    }
    for (i, marker) in markers.iter().enumerate() {
        let title = match marker.id() {
            Some(id) => format!("#{}", id),
            None => "(no id)".to_string(),
        };
        let items = marker.item_names().len();
        let detail = (items > 0).then(|| plural(items, "item"));
        lines.push(entity_header(i + 1, &title, detail));
        if let Some(map) = marker.map_path() {
            lines.push(format!("    Map: {}", map));
        }
        for key in marker.item_keys() {
            lines.push(format!("    Item: {}", key));
        }
    }
    lines
}

pub fn print_markers(markers: &[Marker]) {
    print_lines(format_markers(markers));
}

pub fn format_marker_saved(map: &str, outcome: Option<UpdateOutcome>) -> Vec<String> {
    let verb = match outcome {
        None => "Added",
        Some(UpdateOutcome::Replaced) => "Updated",
        Some(UpdateOutcome::Appended) => "Added (no existing marker with that id)",
    };
    vec![format!("{} marker on {}", verb, map)]
}

pub fn print_marker_saved(map: &str, outcome: Option<UpdateOutcome>) {
    print_lines(format_marker_saved(map, outcome));
}

/// ```text
/// Deleted marker 7 from Region/SubArea
///     Cleaned: 7_Rusty_Key
/// ```
pub fn format_deletion(id: i64, deletion: &MarkerDeletion) -> Vec<String> {
    let location = if deletion.map.is_empty() {
        "maps root".to_string()
    } else {
        deletion.map.clone()
    };
    let mut lines = vec![if deletion.removed == 1 {
        format!("Deleted marker {} from {}", id, location)
    } else {
        format!(
            "Deleted marker {} from {} ({})",
            id,
            location,
            plural(deletion.removed, "record")
        )
    }];
    lines.extend(format_cleaned(&deletion.cleaned_up));
    lines
}

pub fn print_deletion(id: i64, deletion: &MarkerDeletion) {
    print_lines(format_deletion(id, deletion));
}

// ============================================================================
// Cleanup
// ============================================================================

fn format_cleaned(keys: &[String]) -> Vec<String> {
    keys.iter().map(|k| format!("    Cleaned: {}", k)).collect()
}

/// Summary of a bulk cleanup: how many of the requested keys were removed.
pub fn format_cleanup(map: &str, requested: usize, cleaned: &[String]) -> Vec<String> {
    let mut lines = vec![format!(
        "Cleaned {} of {} on {}",
        cleaned.len(),
        plural(requested, "item"),
        map
    )];
    lines.extend(format_cleaned(cleaned));
    lines
}

pub fn print_cleanup(map: &str, requested: usize, cleaned: &[String]) {
    print_lines(format_cleanup(map, requested, cleaned));
}

// ============================================================================
// Pinned popups
// ============================================================================

pub fn format_pinned(pinned: &[PinnedPopup]) -> Vec<String> {
    if pinned.is_empty() {
        return vec!["No pinned popups".to_string()];
    }
    pinned
        .iter()
        .enumerate()
        .map(|(i, popup)| {
            let key = popup.marker_key().unwrap_or_default();
            entity_header(i + 1, &key, None)
        })
        .collect()
}

pub fn print_pinned(pinned: &[PinnedPopup]) {
    print_lines(format_pinned(pinned));
}

// ============================================================================
// Presets
// ============================================================================

/// Categories, each followed by its indented subcategories.
pub fn format_categories(categories: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, (category, subs)) in categories.iter().enumerate() {
        let detail = (!subs.is_empty()).then(|| plural(subs.len(), "subcategory"));
        lines.push(entity_header(i + 1, category, detail));
        for (j, sub) in subs.iter().enumerate() {
            lines.push(format!("    {}", entity_header(j + 1, sub, None)));
        }
    }
    lines
}

pub fn print_categories(categories: &BTreeMap<String, Vec<String>>) {
    print_lines(format_categories(categories));
}

/// Presets by `name` (falling back to `id`), with their resolved image.
pub fn format_presets(presets: &[Preset]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, preset) in presets.iter().enumerate() {
        let title = preset
            .get("name")
            .and_then(scalar)
            .or_else(|| preset.get("id").and_then(scalar))
            .unwrap_or_else(|| "(unnamed)".to_string());
        lines.push(entity_header(i + 1, &title, None));
        if let Some(image) = preset.get("image").and_then(scalar) {
            lines.push(format!("    Image: {}", image));
        }
    }
    lines
}

pub fn print_presets(presets: &[Preset]) {
    print_lines(format_presets(presets));
}
