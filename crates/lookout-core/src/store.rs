//! File persistence for snapshot collections and registries.
//!
//! Every file is written through a sibling temp file, so a failed save or
//! export never truncates an existing file. JSON files are round-trip safe;
//! CSV export is one-way.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::models::SnapshotCollection;
use crate::registry::Registry;

/// Header of the exported CSV file.
pub const CSV_HEADER: [&str; 4] = ["timestamp", "url", "selector", "text"];

/// Write the whole collection as pretty-printed JSON.
pub fn save(collection: &SnapshotCollection, path: impl AsRef<Path>) -> Result<(), AppError> {
    write_json(collection, path.as_ref())
}

/// Read a collection previously written by [`save`].
///
/// Fails if the file is missing or not well-formed; nothing is returned
/// on partial success.
pub fn load(path: impl AsRef<Path>) -> Result<SnapshotCollection, AppError> {
    read_json(path.as_ref())
}

/// Write one CSV row per extracted value. Failed sources contribute no rows.
///
/// Rows go to a sibling temp file that replaces `path` only once every row
/// is written, so a failed export leaves any earlier file intact.
///
/// Returns the number of data rows written.
pub fn export_csv(collection: &SnapshotCollection, path: impl AsRef<Path>) -> Result<usize, AppError> {
    let path = path.as_ref();
    let rows = replace_atomically(path, |tmp| write_csv(collection, tmp))?;

    tracing::debug!(path = %path.display(), %rows, "Exported CSV");
    Ok(rows)
}

fn write_csv(collection: &SnapshotCollection, path: &Path) -> Result<usize, AppError> {
    let csv_err = |source: csv::Error| AppError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(CSV_HEADER).map_err(csv_err)?;

    let mut rows = 0;
    for (timestamp, outcomes) in collection.iter() {
        for (url, outcome) in outcomes {
            let Some(extraction) = outcome.extraction() else {
                continue;
            };
            for (selector, texts) in extraction {
                for text in texts {
                    writer
                        .write_record([timestamp, url.as_str(), selector.as_str(), text.as_str()])
                        .map_err(csv_err)?;
                    rows += 1;
                }
            }
        }
    }

    writer.flush().map_err(|e| AppError::io(path, e))?;
    Ok(rows)
}

/// Read tracked sources and rules from a JSON file of the form
/// `{ "<source>": ["<rule>", ...] }`.
pub fn load_registry(path: impl AsRef<Path>) -> Result<Registry, AppError> {
    read_json(path.as_ref())
}

pub fn save_registry(registry: &Registry, path: impl AsRef<Path>) -> Result<(), AppError> {
    write_json(registry, path.as_ref())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| AppError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)?;
    replace_atomically(path, |tmp| {
        std::fs::write(tmp, json).map_err(|e| AppError::io(tmp, e))
    })?;

    tracing::debug!(path = %path.display(), "Saved");
    Ok(())
}

/// Run `write` against the temp path, then rename the result over `path`.
/// The temp file is removed on any failure.
fn replace_atomically<T>(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let tmp = temp_path(path);
    let result = write(&tmp).and_then(|value| {
        std::fs::rename(&tmp, path).map_err(|e| AppError::io(path, e))?;
        Ok(value)
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("lookout"));
    name.push(".tmp");
    path.with_file_name(name)
}
