use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;

use crate::api::{DataRequest, GdcApi};
use crate::domain::{AuthToken, FileId};
use crate::error::GdcError;
use crate::fs_util::{extract_tar_gz, list_entry_names, write_bytes_atomic};
use crate::manifest::Manifest;

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="?([^";]+)"?"#).expect("filename pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Unpack the downloaded tar.gz into the target directory.
    pub unzip: bool,
    /// Skip identifiers already present in the target directory.
    pub cached: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            unzip: true,
            cached: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DownloadOutcome {
    UpToDate,
    Downloaded(DownloadSummary),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub archive: Utf8PathBuf,
    pub ids: Vec<FileId>,
    pub extracted: bool,
}

/// Downloads a list of GDC files in one request.
#[derive(Clone)]
pub struct BulkRetriever<A: GdcApi> {
    api: A,
    token: Option<AuthToken>,
    ids: Vec<FileId>,
}

impl<A: GdcApi> BulkRetriever<A> {
    pub fn new(api: A, ids: Vec<FileId>, token: Option<AuthToken>) -> Self {
        Self { api, token, ids }
    }

    pub fn ids(&self) -> &[FileId] {
        &self.ids
    }

    /// Identifiers, in order, that are neither a directory entry of `dir` nor
    /// recorded in its manifest at a location that still exists.
    ///
    /// The listing check assumes downloads land under their identifier, which
    /// holds for archives that expand into `<id>/` directories.
    pub fn compute_pending(&self, dir: &Utf8Path) -> Result<Vec<FileId>, GdcError> {
        let existing = list_entry_names(dir)?;
        let manifest = Manifest::load(dir)?;
        Ok(self
            .ids
            .iter()
            .filter(|id| !existing.contains(id.as_str()) && !manifest.contains(dir, id))
            .cloned()
            .collect())
    }

    pub fn download(
        &self,
        dir: &Utf8Path,
        options: DownloadOptions,
    ) -> Result<DownloadOutcome, GdcError> {
        let ids = if options.cached {
            self.compute_pending(dir)?
        } else {
            self.ids.clone()
        };

        if ids.is_empty() {
            tracing::info!("no new files to download");
            return Ok(DownloadOutcome::UpToDate);
        }
        tracing::info!(count = ids.len(), "downloading files");

        let mut manifest = Manifest::load(dir)?;
        let request = DataRequest { ids };
        let response = self
            .api
            .download_data(&request, self.token.as_ref())?
            .error_for_status()?;
        let header = response
            .content_disposition
            .as_deref()
            .ok_or(GdcError::MissingContentDisposition)?;
        let filename = filename_from_disposition(header)?;

        let archive = dir.join(&filename);
        write_bytes_atomic(&archive, &response.body)?;
        tracing::info!(path = %archive, bytes = response.body.len(), "saved download");

        if options.unzip {
            tracing::info!(path = %archive, "extracting files");
            extract_tar_gz(&archive, dir)?;
        }

        for id in &request.ids {
            let location = if options.unzip && dir.join(id.as_str()).as_std_path().exists() {
                id.as_str()
            } else {
                filename.as_str()
            };
            manifest.record(id.clone(), location, filename.as_str());
        }
        manifest.save(dir)?;

        Ok(DownloadOutcome::Downloaded(DownloadSummary {
            archive,
            ids: request.ids,
            extracted: options.unzip,
        }))
    }
}

/// Pulls the file name out of a `Content-Disposition` value such as
/// `attachment; filename=gdc_download_20240101.tar.gz`.
pub fn filename_from_disposition(header: &str) -> Result<String, GdcError> {
    let filename = FILENAME_RE
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|found| found.as_str().trim())
        .ok_or_else(|| GdcError::InvalidContentDisposition(header.to_string()))?;
    let unsafe_name = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\']);
    if unsafe_name {
        return Err(GdcError::InvalidContentDisposition(header.to_string()));
    }
    Ok(filename.to_string())
}
