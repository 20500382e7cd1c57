//! Whole-document JSON and JSON-Lines persistence.
//!
//! Reads are tolerant, writes are full-file rewrites:
//!
//! | Encoding   | Missing file     | Malformed content                  |
//! |------------|------------------|------------------------------------|
//! | Whole JSON | caller default   | caller default                     |
//! | JSON-Lines | empty `Vec`      | bad line skipped, rest still read  |
//!
//! A single corrupt record never blocks access to the good ones. Nothing in
//! this module returns a parse error to the caller; only real I/O failures
//! (permissions, full disk) propagate.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::debug;

/// How hard a JSON-Lines write tries to reach stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Written and closed; the OS may still be buffering.
    Buffered,
    /// Flushed and `fsync`ed before returning.
    Synced,
}

/// Read a whole-JSON document, falling back to `default` when the file is
/// missing, unreadable as UTF-8, or fails to decode as `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "unreadable JSON file, using default");
            }
            return default;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "malformed JSON file, using default");
            default
        }
    }
}

/// Write `value` as 2-space indented JSON, creating parent directories.
///
/// Non-ASCII text is written literally, never `\u` escaped.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
}

/// Read one record per line, in line order.
///
/// Blank lines and lines that do not decode as `T` are skipped.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
    let content = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let text = String::from_utf8_lossy(&content);
    Ok(parse_json_lines(&text, path))
}

fn parse_json_lines<T: DeserializeOwned>(text: &str, origin: &Path) -> Vec<T> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(
                        path = %origin.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping malformed JSON-Lines record"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Overwrite `path` with one compact JSON record per line.
pub fn write_json_lines<T: Serialize>(
    path: &Path,
    records: &[T],
    durability: Durability,
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    if durability == Durability::Synced {
        writer.get_ref().sync_all()?;
    }
    Ok(())
}
