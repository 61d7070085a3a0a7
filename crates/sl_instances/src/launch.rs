//! Everything up to (but not including) starting the game.
//!
//! [`prepare_launch`] checks the install and builds a
//! [`LaunchRequest`]; turning that into a running process
//! is the job of a [`GameLauncher`].

use std::{path::PathBuf, sync::LazyLock};

use regex::Regex;
use serde::Serialize;
use sl_core::{
    info, InstallRoot, DEFAULT_MAX_MEMORY, DEFAULT_MIN_MEMORY, SERVER_HOST, SERVER_PORT,
};
use sl_java_handler::RuntimeHandle;
use thiserror::Error;

use crate::auth::Session;

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-zA-Z0-9_]{3,16}$").unwrap()
});

#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// The UUID an offline-mode server assigns to `username`:
/// an MD5 (version 3) UUID of `OfflinePlayer:<username>`.
#[must_use]
pub fn offline_uuid(username: &str) -> String {
    let mut bytes = md5::compute(format!("OfflinePlayer:{username}")).0;
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|n| format!("{n:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub java: RuntimeHandle,
    /// Version to launch, usually the Fabric one.
    pub version_id: String,
    pub base_version: String,
    pub memory_min: String,
    pub memory_max: String,
    /// Join the server right away.
    pub auto_connect_server: bool,
    pub extra_java_args: Vec<String>,
}

impl LaunchOptions {
    #[must_use]
    pub fn new(java: RuntimeHandle, version_id: String, base_version: String) -> Self {
        Self {
            java,
            version_id,
            base_version,
            memory_min: DEFAULT_MIN_MEMORY.to_owned(),
            memory_max: DEFAULT_MAX_MEMORY.to_owned(),
            auto_connect_server: false,
            extra_java_args: Vec::new(),
        }
    }
}

/// Everything the process launcher needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchRequest {
    pub root: PathBuf,
    pub version_id: String,
    pub base_version: String,
    pub java: PathBuf,
    pub username: String,
    pub uuid: String,
    pub memory_min: String,
    pub memory_max: String,
    pub extra_java_args: Vec<String>,
    pub game_args: Vec<String>,
}

/// Hands a [`LaunchRequest`] to whatever actually
/// builds the command line and spawns the game.
pub trait GameLauncher {
    type Handle;
    type Error: std::error::Error;

    /// # Errors
    /// Up to the implementation.
    fn launch(&self, request: &LaunchRequest) -> Result<Self::Handle, Self::Error>;
}

/// Checks that the game can be started and builds the request.
///
/// # Errors
/// - username doesn't match `^[a-zA-Z0-9_]{3,16}$`
/// - the version to launch isn't fully installed
pub async fn prepare_launch(
    root: &InstallRoot,
    session: &Session,
    options: &LaunchOptions,
) -> Result<LaunchRequest, LaunchError> {
    if !is_valid_username(&session.username) {
        return Err(LaunchError::InvalidUsername(session.username.clone()));
    }
    if !root.verify_version(&options.version_id).await {
        return Err(LaunchError::NotInstalled(options.version_id.clone()));
    }

    let mut game_args = Vec::new();
    if options.auto_connect_server {
        game_args.extend([
            "--server".to_owned(),
            SERVER_HOST.to_owned(),
            "--port".to_owned(),
            SERVER_PORT.to_string(),
        ]);
    }

    info!(
        "Prepared launch of {} as {}",
        options.version_id, session.username
    );
    Ok(LaunchRequest {
        root: root.path().to_owned(),
        version_id: options.version_id.clone(),
        base_version: options.base_version.clone(),
        java: options.java.command(),
        username: session.username.clone(),
        uuid: offline_uuid(&session.username),
        memory_min: options.memory_min.clone(),
        memory_max: options.memory_max.clone(),
        extra_java_args: options.extra_java_args.clone(),
        game_args,
    })
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid username {0:?}: use 3-16 letters, digits or underscores")]
    InvalidUsername(String),
    #[error("version {0} is not installed, run the install first")]
    NotInstalled(String),
}
