use sl_core::{impl_3_errs_jri, DownloadFileError, IoError, JsonError, RequestError};
use thiserror::Error;

const DOWNLOAD_ERR_PREFIX: &str = "while downloading the game:\n";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{DOWNLOAD_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{DOWNLOAD_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{DOWNLOAD_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{DOWNLOAD_ERR_PREFIX}{0}")]
    Integrity(DownloadFileError),
    #[error("{DOWNLOAD_ERR_PREFIX}version not found in manifest: {0}")]
    VersionNotFound(String),
    #[error("{DOWNLOAD_ERR_PREFIX}version {0} has no client download")]
    NoClientUrl(String),
}

impl_3_errs_jri!(DownloadError, Json, Request, Io, Integrity);
