//! Read-only preset library.
//!
//! Presets are JSON-Lines files under `<data>/presets`, either directly
//! (`<type>.txt`) or one level down (`<category>/<subcategory>.txt`). Each
//! preset may name an `image` relative to the matching assets folder:
//!
//! ```text
//! presets/chest.txt             → assets/chest/
//! presets/npc/merchant.txt      → assets/npc/merchant/
//! ```
//!
//! Images that are missing on disk (or not strings at all) are swapped for
//! [`DEFAULT_IMAGE`] on read so the UI always has something to show.
//! Remote `http(s)` images are passed through unchecked.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::flatfile;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const DEFAULT_IMAGE: &str = "Unknown.png";

const PRESET_EXTENSION: &str = "txt";

/// One preset record, all fields as written.
pub type Preset = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct PresetLibrary {
    presets_dir: PathBuf,
    assets_dir: PathBuf,
}

impl PresetLibrary {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            presets_dir: config.presets_dir(),
            assets_dir: config.assets_dir(),
        }
    }

    /// Category → subcategory names.
    ///
    /// A top-level `<type>.txt` is a category without subcategories. A
    /// top-level folder is a category only if it holds at least one preset file.
    pub fn categories(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut categories = BTreeMap::new();
        let entries = match fs::read_dir(&self.presets_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(categories),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            if path.is_dir() {
                let subs = preset_stems(&path);
                if !subs.is_empty() {
                    categories.insert(name, subs);
                }
            } else if let Some(stem) = preset_stem(&path) {
                categories.insert(stem, Vec::new());
            }
        }
        Ok(categories)
    }

    /// Presets of a top-level `<type>.txt`. Missing file → empty.
    pub fn presets(&self, preset_type: &str) -> Result<Vec<Preset>> {
        let name = plain_name(preset_type)?;
        let file = self.presets_dir.join(format!("{name}.{PRESET_EXTENSION}"));
        self.read_presets(&file, &self.assets_dir.join(name))
    }

    /// Presets of `<category>/<subcategory>.txt`. Missing file → empty.
    pub fn presets_in(&self, category: &str, subcategory: &str) -> Result<Vec<Preset>> {
        let category = plain_name(category)?;
        let sub = plain_name(subcategory)?;
        let file = self
            .presets_dir
            .join(category)
            .join(format!("{sub}.{PRESET_EXTENSION}"));
        self.read_presets(&file, &self.assets_dir.join(category).join(sub))
    }

    /// Every preset file under the library, keyed `"<type>"` or
    /// `"<category>/<subcategory>"` (deeper folders add more segments).
    pub fn all_presets(&self) -> Result<BTreeMap<String, Vec<Preset>>> {
        let mut all = BTreeMap::new();
        if !self.presets_dir.is_dir() {
            return Ok(all);
        }

        for entry in WalkDir::new(&self.presets_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable preset entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if preset_stem(path).is_none() {
                continue;
            }
            let stem_path = path.with_extension("");
            let Ok(rel) = stem_path.strip_prefix(&self.presets_dir) else {
                continue;
            };
            let segments: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let mut assets = self.assets_dir.clone();
            assets.extend(&segments);
            all.insert(segments.join("/"), self.read_presets(path, &assets)?);
        }
        Ok(all)
    }

    /// Raw preset file at `rel` (e.g. `npc/merchant.txt`) under the library.
    pub fn preset_file(&self, rel: &str) -> Result<PathBuf> {
        let rel = Path::new(rel);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StoreError::validation(format!(
                "invalid preset path: {}",
                rel.display()
            )));
        }
        let path = self.presets_dir.join(rel);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::not_found(format!(
                "Preset file not found: {}",
                rel.display()
            )))
        }
    }

    fn read_presets(&self, file: &Path, assets: &Path) -> Result<Vec<Preset>> {
        let mut presets: Vec<Preset> = flatfile::read_json_lines(file)?;
        for preset in &mut presets {
            fix_image(preset, assets);
        }
        debug!(file = %file.display(), count = presets.len(), "presets loaded");
        Ok(presets)
    }
}

/// Replace an unusable `image` with [`DEFAULT_IMAGE`]. Presets without an
/// `image` field are left as they are.
fn fix_image(preset: &mut Preset, assets: &Path) {
    let Some(image) = preset.get("image") else {
        return;
    };
    let usable = match image.as_str() {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => true,
        Some(rel) => assets.join(rel).exists(),
        None => false,
    };
    if !usable {
        preset.insert("image".to_string(), Value::from(DEFAULT_IMAGE));
    }
}

fn preset_stem(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(PRESET_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(String::from)
}

/// Sorted stems of the preset files directly in `dir`.
fn preset_stems(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        warn!(path = %dir.display(), "skipping unreadable preset category");
        return Vec::new();
    };
    let mut stems: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| preset_stem(&p))
        .collect();
    stems.sort();
    stems
}

fn plain_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', ':']) {
        return Err(StoreError::validation(format!("invalid preset name: {name}")));
    }
    Ok(name)
}
