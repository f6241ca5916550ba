//! Record of identifiers already downloaded into a directory.
//!
//! Stored as `.kira-gdc.json` inside the download directory and rewritten
//! atomically after every successful download.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::FileId;
use crate::error::GdcError;
use crate::fs_util::write_bytes_atomic;

pub const MANIFEST_FILE: &str = ".kira-gdc.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Location relative to the download directory.
    pub path: String,
    pub archive: String,
    pub downloaded_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub files: BTreeMap<FileId, ManifestEntry>,
}

fn schema_version() -> u32 {
    1
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            schema_version: schema_version(),
            files: BTreeMap::new(),
        }
    }

    pub fn path_in(dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Loads the manifest of `dir`, or an empty one if there is none yet.
    ///
    /// A manifest that does not parse is treated as empty and replaced on the
    /// next `save`.
    pub fn load(dir: &Utf8Path) -> Result<Self, GdcError> {
        let path = Self::path_in(dir);
        if !path.as_std_path().exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| GdcError::Filesystem(format!("read {path}: {err}")))?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Ok(manifest),
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "ignoring corrupt manifest");
                Ok(Self::new())
            }
        }
    }

    pub fn save(&self, dir: &Utf8Path) -> Result<(), GdcError> {
        let content = serde_json::to_vec_pretty(self)
            .map_err(|err| GdcError::Serialization(err.to_string()))?;
        write_bytes_atomic(&Self::path_in(dir), &content)
    }

    pub fn record(&mut self, id: FileId, path: impl Into<String>, archive: impl Into<String>) {
        self.files.insert(
            id,
            ManifestEntry {
                path: path.into(),
                archive: archive.into(),
                downloaded_at: chrono::Utc::now().to_rfc3339(),
            },
        );
    }

    /// True when `id` is recorded and its location still exists under `dir`.
    pub fn contains(&self, dir: &Utf8Path, id: &FileId) -> bool {
        self.files
            .get(id)
            .is_some_and(|entry| dir.join(&entry.path).as_std_path().exists())
    }
}
