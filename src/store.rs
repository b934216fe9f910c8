//! Local persistence for retrieved payloads.
//!
//! Fetch logic never touches the filesystem directly; it hands payloads to a
//! [`DataStore`], so pagination and retrieval stay testable without real I/O.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::error::ScopusError;

/// Maximum number of query characters used for a search summary file name.
const QUERY_FILE_NAME_MAX_CHARS: usize = 100;

/// Sink for one named JSON payload.
pub trait DataStore {
    /// Persists `payload` under `name` and returns the resulting location.
    fn put(&self, name: &str, payload: &Value) -> Result<PathBuf, ScopusError>;
}

/// Directory-backed [`DataStore`] writing one UTF-8 JSON file per payload.
///
/// The directory is created on demand. Writes are plain `fs::write` calls,
/// not temp-file-and-rename: concurrent writers to the same name race.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DataStore for DirStore {
    fn put(&self, name: &str, payload: &Value) -> Result<PathBuf, ScopusError> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        fs::write(&path, serde_json::to_vec(payload)?)?;
        info!(path = %path.display(), "payload written");
        Ok(path)
    }
}

/// File name for an entity payload: the percent-encoded URI plus `.json`.
pub fn uri_file_name(uri: &str) -> String {
    format!("{}.json", urlencoding::encode(uri))
}

/// File name for a search summary: the leading characters of the query plus
/// `.json`, truncated on a character boundary.
pub fn query_file_name(query: &str) -> String {
    let head: String = query.chars().take(QUERY_FILE_NAME_MAX_CHARS).collect();
    format!("{head}.json")
}
