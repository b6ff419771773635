//! On-disk archive of fetched page bodies.
//!
//! Each successfully fetched body can be written to
//! `<dir>/<source>_<timestamp>.html` so extraction results can be checked
//! against the exact document they came from.

use std::path::{Path, PathBuf};

use crate::error::AppError;

const MAX_SOURCE_LEN: usize = 150;
const INVALID_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone)]
pub struct PageArchive {
    dir: PathBuf,
}

impl PageArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the body of `source` fetched at `timestamp` is stored under.
    pub fn path_for(&self, source: &str, timestamp: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.html",
            safe_source(source),
            safe_timestamp(timestamp)
        ))
    }

    pub async fn store(&self, source: &str, timestamp: &str, html: &str) -> Result<PathBuf, AppError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::io(&self.dir, e))?;

        let path = self.path_for(source, timestamp);
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| AppError::io(&path, e))?;
        Ok(path)
    }
}

fn safe_source(source: &str) -> String {
    let stripped = source
        .strip_prefix("https://")
        .or_else(|| source.strip_prefix("http://"))
        .unwrap_or(source);

    let safe: String = stripped
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_SOURCE_LEN)
        .collect();

    if safe.is_empty() {
        "unknown_url".to_string()
    } else {
        safe
    }
}

fn safe_timestamp(timestamp: &str) -> String {
    timestamp.replace([':', '.'], "_")
}
