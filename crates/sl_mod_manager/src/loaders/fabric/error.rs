use std::path::PathBuf;

use sl_core::{impl_3_errs_jri, DownloadFileError, IoError, JsonError, RequestError};
use thiserror::Error;

const FABRIC_INSTALL_ERR_PREFIX: &str = "while installing Fabric:\n";

#[derive(Debug, Error)]
pub enum FabricInstallError {
    #[error("{FABRIC_INSTALL_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{FABRIC_INSTALL_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{FABRIC_INSTALL_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{FABRIC_INSTALL_ERR_PREFIX}{0}")]
    Download(DownloadFileError),
    #[error("{FABRIC_INSTALL_ERR_PREFIX}base artifact not found: {0:?}\n(install the base version first)")]
    BaseJarNotFound(PathBuf),
}

impl_3_errs_jri!(FabricInstallError, Json, Request, Io, Download);
