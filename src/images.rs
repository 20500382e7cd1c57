//! Uploaded item images, stored under each map folder's `images/`.
//!
//! Uploads get a random 32-hex-digit file name so concurrent uploads never
//! collide. The UI refers to an upload by its served path,
//! `<image_url_marker><map>/images/<file>`; [`MapStore::resolve_image`] maps
//! the part after the marker back to a file on disk.

use crate::cleanup::image_filename;
use crate::error::{Result, StoreError};
use crate::paths::{IMAGES_DIRNAME, ensure_folder};
use crate::store::MapStore;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

const IMAGES_SEPARATOR: &str = "/images/";

impl MapStore {
    /// Decode `image_data` and store it as a new upload for `map`.
    ///
    /// `image_data` is plain base64 or a data URL (`data:image/png;base64,...`).
    /// Returns the map-relative path, `images/<file>`.
    pub fn upload_image(
        &self,
        map: &str,
        image_data: &str,
        extension: Option<&str>,
    ) -> Result<String> {
        let extension = upload_extension(extension)?;
        let bytes = decode_image_data(image_data)?;

        let dir = self.paths().images_dir(map)?;
        ensure_folder(&dir)?;
        let filename = format!("{}.{extension}", random_token());
        let path = dir.join(&filename);
        fs::write(&path, &bytes)?;

        if self.verbose() {
            info!(map = %map, file = %filename, bytes = bytes.len(), "image uploaded");
        }
        Ok(format!("{IMAGES_DIRNAME}/{filename}"))
    }

    /// Delete an upload of `map`. `image_path` may be a served URL, a
    /// map-relative path or a bare file name; only its last segment is used.
    ///
    /// Returns `false` if the file did not exist.
    pub fn delete_image(&self, map: &str, image_path: &str) -> Result<bool> {
        let filename = image_filename(image_path)
            .ok_or_else(|| StoreError::validation(format!("not an image path: {image_path}")))?;
        let path = self.paths().images_dir(map)?.join(&filename);

        match fs::remove_file(&path) {
            Ok(()) => {
                if self.verbose() {
                    info!(map = %map, file = %filename, "image deleted");
                }
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Physical file behind a served path `<map>/images/<file>`.
    pub fn resolve_image(&self, served_path: &str) -> Result<PathBuf> {
        let (map, filename) = split_served_path(served_path)?;
        let path = self.paths().images_dir(map)?.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::not_found(format!("Image not found: {served_path}")))
        }
    }
}

/// `<map>/images/<file>` → `(map, file)`.
fn split_served_path(served_path: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = served_path.split(IMAGES_SEPARATOR).collect();
    match parts.as_slice() {
        [map, filename] if is_plain_filename(filename) => Ok((*map, *filename)),
        [_] => Err(StoreError::validation(format!(
            "Invalid image path: {served_path}"
        ))),
        _ => Err(StoreError::validation(format!(
            "Invalid image path format: {served_path}"
        ))),
    }
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn upload_extension(extension: Option<&str>) -> Result<String> {
    let ext = extension
        .map(|e| e.trim().trim_start_matches('.'))
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_IMAGE_EXTENSION);
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StoreError::validation(format!(
            "file extension must be alphanumeric: {ext}"
        )));
    }
    Ok(ext.to_ascii_lowercase())
}

/// Base64 payload of `image_data`, with any data-URL header dropped.
fn decode_image_data(image_data: &str) -> Result<Vec<u8>> {
    let payload = match image_data.split_once(',') {
        Some((_, rest)) => rest,
        None => image_data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(StoreError::validation("imageData is empty"));
    }
    Ok(BASE64_STANDARD.decode(compact)?)
}

fn random_token() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    // "hello" in base64
    const HELLO: &str = "aGVsbG8=";

    #[test]
    fn upload_writes_decoded_bytes() {
        let fx = Fixture::new();
        let rel = fx.store().upload_image("A/a.png", HELLO, None).unwrap();

        let file = rel.strip_prefix("images/").unwrap();
        let (stem, ext) = file.split_once('.').unwrap();
        assert_eq!(ext, "png");
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fs::read(fx.path("A").join(&rel)).unwrap(), b"hello");
    }

    #[test]
    fn upload_accepts_data_url_and_extension() {
        let fx = Fixture::new();
        let data = format!("data:image/jpeg;base64,{HELLO}");
        let rel = fx
            .store()
            .upload_image("Region/Sub/m.png", &data, Some(".JPG"))
            .unwrap();
        assert!(rel.ends_with(".jpg"));
        assert!(fx.path("Region/Sub").join(&rel).is_file());
    }

    #[test]
    fn upload_tokens_are_unique() {
        let fx = Fixture::new();
        let store = fx.store();
        let a = store.upload_image("A/a.png", HELLO, None).unwrap();
        let b = store.upload_image("A/a.png", HELLO, None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn upload_rejects_bad_input() {
        let fx = Fixture::new();
        let store = fx.store();
        assert!(matches!(
            store.upload_image("A/a.png", "!!!not base64", None),
            Err(StoreError::Base64(_))
        ));
        assert!(matches!(
            store.upload_image("A/a.png", HELLO, Some("p/ng")),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.upload_image("A/a.png", "data:image/png;base64,", None),
            Err(StoreError::Validation(_))
        ));
        assert!(!fx.path("A/images").exists());
    }

    #[test]
    fn delete_by_served_url_then_soft_miss() {
        let fx = Fixture::new();
        let store = fx.store();
        fx.image("A/images/abc.png");

        assert!(store
            .delete_image("A/a.png", "/api/map-images/A/images/abc.png")
            .unwrap());
        assert!(!fx.path("A/images/abc.png").exists());
        assert!(!store.delete_image("A/a.png", "images/abc.png").unwrap());
    }

    #[test]
    fn resolve_served_paths() {
        let fx = Fixture::new();
        let store = fx.store();
        let img = fx.image("Region/Sub/images/x.png");

        assert_eq!(store.resolve_image("Region/Sub/images/x.png").unwrap(), img);
        assert!(store.resolve_image("Region/Sub/images/y.png").unwrap_err().is_not_found());
        assert!(matches!(
            store.resolve_image("Region/Sub/x.png"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.resolve_image("A/images/B/images/x.png"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.resolve_image("A/images/../../secret"),
            Err(StoreError::Validation(_))
        ));
    }
}
