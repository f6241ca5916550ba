use std::collections::HashSet;
use std::fs;
use std::io::Write;

use camino::Utf8Path;
use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::GdcError;

/// Names of the entries directly inside `dir`.
pub fn list_entry_names(dir: &Utf8Path) -> Result<HashSet<String>, GdcError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| GdcError::Filesystem(format!("list {dir}: {err}")))?;
    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(|err| GdcError::Filesystem(err.to_string()))?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Writes `content` to a temp file next to `path`, then renames it into place.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), GdcError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".kira-gdc")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GdcError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| GdcError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| GdcError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| GdcError::Filesystem(format!("write {path}: {}", err.error)))?;
    Ok(())
}

/// Unpacks a gzip-compressed tar archive into `target_dir`.
///
/// Entries that would land outside `target_dir` are skipped by `tar`.
pub fn extract_tar_gz(archive_path: &Utf8Path, target_dir: &Utf8Path) -> Result<(), GdcError> {
    let file = fs::File::open(archive_path.as_std_path())
        .map_err(|err| GdcError::Archive(format!("open {archive_path}: {err}")))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(target_dir.as_std_path())
        .map_err(|err| GdcError::Archive(format!("{archive_path}: {err}")))
}
