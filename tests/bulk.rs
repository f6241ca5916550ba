use std::collections::VecDeque;
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_gdc::api::{ApiResponse, DataRequest, GdcApi, SearchRequest};
use kira_gdc::bulk::{BulkRetriever, DownloadOptions, DownloadOutcome};
use kira_gdc::domain::{AuthToken, FileId, parse_file_ids};
use kira_gdc::error::GdcError;
use kira_gdc::manifest::Manifest;

#[derive(Default)]
struct MockApi {
    responses: Mutex<VecDeque<ApiResponse>>,
    requests: Mutex<Vec<DataRequest>>,
}

impl MockApi {
    fn with(responses: Vec<ApiResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl GdcApi for MockApi {
    fn search_files(
        &self,
        _request: &SearchRequest,
        _token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        Err(GdcError::Http("not implemented".to_string()))
    }

    fn download_data(
        &self,
        request: &DataRequest,
        _token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GdcError::Http("unexpected request".to_string()))
    }
}

fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(gz);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn archive_response(filename: &str, body: Vec<u8>) -> ApiResponse {
    ApiResponse {
        status: 200,
        content_disposition: Some(format!("attachment; filename={filename}")),
        body,
    }
}

fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, path)
}

fn ids(values: &[&str]) -> Vec<FileId> {
    parse_file_ids(values).unwrap()
}

fn exists(dir: &Utf8Path, relative: &str) -> bool {
    dir.join(relative).as_std_path().exists()
}

#[test]
fn pending_is_everything_for_empty_directory() {
    let (_temp, dir) = temp_dir();
    let api = MockApi::default();
    let retriever = BulkRetriever::new(&api, ids(&["id3", "id1", "id2", "id1"]), None);
    assert_eq!(retriever.compute_pending(&dir).unwrap(), retriever.ids());
}

#[test]
fn pending_is_empty_when_all_present() {
    let (_temp, dir) = temp_dir();
    fs::create_dir(dir.join("id1").as_std_path()).unwrap();
    fs::write(dir.join("id2").as_std_path(), b"x").unwrap();
    let api = MockApi::default();
    let retriever = BulkRetriever::new(&api, ids(&["id1", "id2"]), None);
    assert!(retriever.compute_pending(&dir).unwrap().is_empty());
}

#[test]
fn pending_keeps_order_of_missing_ids() {
    let (_temp, dir) = temp_dir();
    fs::create_dir(dir.join("b").as_std_path()).unwrap();
    let api = MockApi::default();
    let retriever = BulkRetriever::new(&api, ids(&["c", "b", "a"]), None);
    assert_eq!(retriever.compute_pending(&dir).unwrap(), ids(&["c", "a"]));
}

#[test]
fn pending_fails_for_missing_directory() {
    let (_temp, dir) = temp_dir();
    let api = MockApi::default();
    let retriever = BulkRetriever::new(&api, ids(&["id1"]), None);
    assert_matches!(
        retriever.compute_pending(&dir.join("nope")),
        Err(GdcError::Filesystem(_))
    );
}

#[test]
fn nothing_pending_makes_no_request() {
    let (_temp, dir) = temp_dir();
    fs::create_dir(dir.join("id1").as_std_path()).unwrap();
    let api = MockApi::default();
    let outcome = BulkRetriever::new(&api, ids(&["id1"]), None)
        .download(&dir, DownloadOptions::default())
        .unwrap();
    assert_eq!(outcome, DownloadOutcome::UpToDate);
    assert_eq!(api.calls(), 0);
    assert!(!exists(&dir, ".kira-gdc.json"));
}

#[test]
fn download_writes_and_extracts_archive() {
    let (_temp, dir) = temp_dir();
    let body = tar_gz(&[("id1/sample.txt", b"reads")]);
    let api = MockApi::with(vec![archive_response("data.tar.gz", body)]);

    let outcome = BulkRetriever::new(&api, ids(&["id1", "id2"]), AuthToken::new("t"))
        .download(
            &dir,
            DownloadOptions {
                unzip: true,
                cached: false,
            },
        )
        .unwrap();

    assert!(exists(&dir, "data.tar.gz"));
    assert!(exists(&dir, "id1/sample.txt"));
    assert_eq!(
        fs::read_to_string(dir.join("id1/sample.txt").as_std_path()).unwrap(),
        "reads"
    );
    assert_matches!(outcome, DownloadOutcome::Downloaded(summary) => {
        assert_eq!(summary.archive, dir.join("data.tar.gz"));
        assert_eq!(summary.ids, ids(&["id1", "id2"]));
        assert!(summary.extracted);
    });
    assert_eq!(api.requests.lock().unwrap()[0].ids, ids(&["id1", "id2"]));
}

#[test]
fn second_cached_download_is_a_no_op() {
    let (_temp, dir) = temp_dir();
    let body = tar_gz(&[("id1/sample.txt", b"a"), ("id2/sample.txt", b"b")]);
    let api = MockApi::with(vec![archive_response("data.tar.gz", body)]);
    let retriever = BulkRetriever::new(&api, ids(&["id1", "id2"]), None);

    retriever.download(&dir, DownloadOptions::default()).unwrap();
    let second = retriever.download(&dir, DownloadOptions::default()).unwrap();

    assert_eq!(second, DownloadOutcome::UpToDate);
    assert_eq!(api.calls(), 1);
}

#[test]
fn manifest_covers_ids_the_listing_misses() {
    let (_temp, dir) = temp_dir();
    let body = tar_gz(&[("manifest.txt", b"bundle")]);
    let api = MockApi::with(vec![archive_response("gdc_download.tar.gz", body)]);
    let retriever = BulkRetriever::new(&api, ids(&["id1", "id2"]), None);

    retriever.download(&dir, DownloadOptions::default()).unwrap();
    assert!(retriever.compute_pending(&dir).unwrap().is_empty());

    let manifest = Manifest::load(&dir).unwrap();
    let entry = &manifest.files[&ids(&["id1"])[0]];
    assert_eq!(entry.path, "gdc_download.tar.gz");
    assert_eq!(entry.archive, "gdc_download.tar.gz");
}

#[test]
fn removed_download_is_fetched_again() {
    let (_temp, dir) = temp_dir();
    let api = MockApi::with(vec![
        archive_response("a.tar.gz", tar_gz(&[("id1/x", b"1")])),
        archive_response("b.tar.gz", tar_gz(&[("id1/x", b"2")])),
    ]);
    let retriever = BulkRetriever::new(&api, ids(&["id1"]), None);

    retriever.download(&dir, DownloadOptions::default()).unwrap();
    fs::remove_dir_all(dir.join("id1").as_std_path()).unwrap();
    let outcome = retriever.download(&dir, DownloadOptions::default()).unwrap();

    assert_matches!(outcome, DownloadOutcome::Downloaded(_));
    assert_eq!(api.calls(), 2);
}

#[test]
fn no_unzip_keeps_only_the_archive() {
    let (_temp, dir) = temp_dir();
    let body = tar_gz(&[("id1/sample.txt", b"reads")]);
    let api = MockApi::with(vec![archive_response("data.tar.gz", body)]);

    BulkRetriever::new(&api, ids(&["id1"]), None)
        .download(
            &dir,
            DownloadOptions {
                unzip: false,
                cached: true,
            },
        )
        .unwrap();

    assert!(exists(&dir, "data.tar.gz"));
    assert!(!exists(&dir, "id1"));
    let manifest = Manifest::load(&dir).unwrap();
    assert_eq!(manifest.files[&ids(&["id1"])[0]].path, "data.tar.gz");
}

#[test]
fn invalid_archive_leaves_raw_file() {
    let (_temp, dir) = temp_dir();
    let api = MockApi::with(vec![archive_response(
        "single.bam",
        b"not a tarball".to_vec(),
    )]);

    let err = BulkRetriever::new(&api, ids(&["id1"]), None)
        .download(&dir, DownloadOptions::default())
        .unwrap_err();

    assert_matches!(err, GdcError::Archive(_));
    assert!(exists(&dir, "single.bam"));
    assert!(!exists(&dir, ".kira-gdc.json"));
}

#[test]
fn error_status_is_not_retried() {
    let (_temp, dir) = temp_dir();
    let api = MockApi::with(vec![ApiResponse {
        status: 503,
        content_disposition: None,
        body: Vec::new(),
    }]);

    let err = BulkRetriever::new(&api, ids(&["id1"]), None)
        .download(&dir, DownloadOptions::default())
        .unwrap_err();

    assert_matches!(err, GdcError::Status { status: 503, .. });
    assert_eq!(api.calls(), 1);
}

#[test]
fn missing_disposition_fails() {
    let (_temp, dir) = temp_dir();
    let api = MockApi::with(vec![ApiResponse {
        status: 200,
        content_disposition: None,
        body: tar_gz(&[("id1/x", b"1")]),
    }]);

    let err = BulkRetriever::new(&api, ids(&["id1"]), None)
        .download(&dir, DownloadOptions::default())
        .unwrap_err();

    assert_matches!(err, GdcError::MissingContentDisposition);
    assert!(!exists(&dir, "id1"));
}

#[test]
fn corrupt_manifest_does_not_fail_download() {
    let (_temp, dir) = temp_dir();
    fs::write(dir.join(".kira-gdc.json").as_std_path(), b"{ truncated").unwrap();
    let body = tar_gz(&[("id1/sample.txt", b"reads")]);
    let api = MockApi::with(vec![archive_response("data.tar.gz", body)]);
    let retriever = BulkRetriever::new(&api, ids(&["id1", "id2"]), None);

    let outcome = retriever
        .download(
            &dir,
            DownloadOptions {
                unzip: true,
                cached: false,
            },
        )
        .unwrap();

    assert_matches!(outcome, DownloadOutcome::Downloaded(_));
    assert!(exists(&dir, "id1/sample.txt"));
    let manifest = Manifest::load(&dir).unwrap();
    assert_eq!(manifest.files.len(), 2);
    assert!(retriever.compute_pending(&dir).unwrap().is_empty());
}

#[test]
fn corrupt_manifest_falls_back_to_listing() {
    let (_temp, dir) = temp_dir();
    fs::write(dir.join(".kira-gdc.json").as_std_path(), b"{ truncated").unwrap();
    fs::create_dir(dir.join("id1").as_std_path()).unwrap();
    let api = MockApi::default();
    let retriever = BulkRetriever::new(&api, ids(&["id1", "id2"]), None);

    assert_eq!(retriever.compute_pending(&dir).unwrap(), ids(&["id2"]));
}
