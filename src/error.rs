use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GdcError {
    #[error("invalid file id: {0:?}")]
    InvalidFileId(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("auth token contains characters not allowed in an HTTP header")]
    InvalidToken,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("GDC request failed: {0}")]
    Http(String),

    #[error("GDC returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("GDC request gave up after {attempts} attempts: {last}")]
    #[diagnostic(help("raise retry.max_attempts in kira-gdc.json or check the filters"))]
    RetriesExhausted { attempts: u32, last: Box<GdcError> },

    #[error("request cancelled while waiting to retry")]
    Cancelled,

    #[error("download response has no Content-Disposition header")]
    MissingContentDisposition,

    #[error("unusable Content-Disposition header: {0}")]
    InvalidContentDisposition(String),

    #[error("failed to extract archive: {0}")]
    Archive(String),

    #[error("malformed tabular response: {0}")]
    TableParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to encode request: {0}")]
    Serialization(String),
}
