//! Turns an empty (or partially filled) install root
//! into a runnable client.
//!
//! The steps always run in this order, the first fatal
//! error stops everything after it:
//!
//! 1. Java runtime ([`Phase::Runtime`])
//! 2. Base version descriptor and jar ([`Phase::Version`])
//! 3. Base libraries ([`Phase::Libraries`])
//! 4. Fabric ([`Phase::Loader`], skipped without a loader version)
//! 5. Modpack and resource pack ([`Phase::Content`])
//! 6. `options.txt`, `servers.dat`, `config/` ([`Phase::Config`])
//!
//! Re-running is cheap for the jar and libraries (skipped if
//! present) but always re-fetches descriptors and content.

use std::{fmt::Display, path::PathBuf};

use serde::Serialize;
use sl_core::{
    err, file_utils, info, Endpoints, InstallRoot, IntoIoError, IoError, Phase, ProgressSender,
    FABRIC_LOADER_VERSION, GAME_VERSION, RESOURCE_PACK_FILE, SERVER_HOST, SERVER_PORT,
};
use sl_java_handler::{JavaInstallError, JavaProvisioner, RuntimeHandle};
use sl_mod_manager::{
    content::{install_content, BundleRegistry, ContentError},
    loaders::fabric::{self, FabricInstallError},
};
use thiserror::Error;

use crate::download::{DownloadError, GameDownloader};

/// What the user picked for this install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallOptions {
    /// `ULTRA`, `MEDIUM` or `LOW`.
    pub modpack: String,
    /// Skip Java detection and use this binary.
    pub java_path: Option<PathBuf>,
    pub fov: f32,
    pub render_distance: u32,
    pub max_fps: u32,
    pub language: String,
    /// Join the server straight from the main menu.
    pub auto_connect_server: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            modpack: "ULTRA".to_owned(),
            java_path: None,
            fov: 90.0,
            render_distance: 12,
            max_fps: 120,
            language: "ru_ru".to_owned(),
            auto_connect_server: false,
        }
    }
}

impl InstallOptions {
    /// The modpack id, accepting the older
    /// `1.21.8-ultra` spelling too.
    #[must_use]
    pub fn bundle_id(&self) -> String {
        let id = self
            .modpack
            .strip_prefix(&format!("{GAME_VERSION}-"))
            .unwrap_or(&self.modpack);
        id.to_uppercase()
    }

    /// Contents of `options.txt`.
    #[must_use]
    pub fn options_txt(&self) -> String {
        let last_server = if self.auto_connect_server {
            format!("{SERVER_HOST}:{SERVER_PORT}")
        } else {
            String::new()
        };
        [
            "version:3465".to_owned(),
            "autoJump:false".to_owned(),
            "enableVsync:true".to_owned(),
            format!("fov:{:.1}", self.fov),
            format!("renderDistance:{}", self.render_distance),
            format!("maxFps:{}", self.max_fps),
            format!(r#"resourcePacks:["vanilla","{RESOURCE_PACK_FILE}"]"#),
            format!("lang:{}", self.language),
            format!("lastServer:{last_server}"),
        ]
        .join("\n")
    }
}

/// Everything the installer talks to.
///
/// [`InstallEnv::new`] gives the real services,
/// tests swap in local ones.
#[derive(Debug, Clone)]
pub struct InstallEnv {
    pub endpoints: Endpoints,
    pub bundles: BundleRegistry,
    pub java: JavaProvisioner,
    pub game_version: String,
    /// `None` installs plain vanilla.
    pub loader_version: Option<String>,
}

impl InstallEnv {
    #[must_use]
    pub fn new(root: &InstallRoot) -> Self {
        Self {
            endpoints: Endpoints::default(),
            bundles: BundleRegistry::default(),
            java: JavaProvisioner::new(root.java_dir()),
            game_version: GAME_VERSION.to_owned(),
            loader_version: Some(FABRIC_LOADER_VERSION.to_owned()),
        }
    }
}

/// A finished install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallResult {
    pub game_version: String,
    /// The version to launch (the Fabric one, if installed).
    pub version_id: String,
    pub root: PathBuf,
    pub modpack: String,
    #[serde(serialize_with = "serialize_runtime")]
    pub java: RuntimeHandle,
    pub resource_pack: bool,
}

fn serialize_runtime<S: serde::Serializer>(java: &RuntimeHandle, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&java.to_string())
}

/// Installs (or repairs) the whole client into `root`.
///
/// Progress goes to `progress`, one or more events per step.
///
/// # Errors
/// The first fatal error of any step. A failing resource
/// pack download is not fatal.
pub async fn install_client(
    root: &InstallRoot,
    env: &InstallEnv,
    options: &InstallOptions,
    progress: &ProgressSender,
) -> Result<InstallResult, InstallError> {
    let result = install_inner(root, env, options, progress).await;
    match &result {
        Ok(result) => {
            info!("Install finished: {}", result.version_id);
            progress.success(Phase::Done, "Installation complete");
        }
        Err(error) => {
            err!("Install failed: {error}");
            progress.error(error.phase(), error.to_string());
        }
    }
    result
}

async fn install_inner(
    root: &InstallRoot,
    env: &InstallEnv,
    options: &InstallOptions,
    progress: &ProgressSender,
) -> Result<InstallResult, InstallError> {
    let bundle_id = options.bundle_id();
    // Fail on a bad modpack before downloading anything
    env.bundles.get(&bundle_id)?;

    let java = env
        .java
        .ensure_runtime(options.java_path.as_deref(), progress)
        .await?;

    info!("Installing {} into {:?}", env.game_version, root.path());
    file_utils::ensure_writable_dir(root.path())
        .await
        .map_err(InstallError::NotWritable)?;

    let downloader = GameDownloader::new(
        root,
        &env.endpoints.version_manifest,
        &env.game_version,
        progress,
    )
    .await?;
    downloader.download_jar().await?;
    downloader
        .download_libraries()
        .await
        .map_err(InstallError::Libraries)?;

    let version_id = if let Some(loader_version) = &env.loader_version {
        fabric::install_loader(
            root,
            &env.endpoints.fabric_meta,
            &env.game_version,
            loader_version,
            progress,
        )
        .await?
    } else {
        env.game_version.clone()
    };

    let content = install_content(
        root,
        &env.bundles,
        &bundle_id,
        &env.endpoints.resource_pack,
        progress,
    )
    .await?;

    write_config_files(root, options, progress)
        .await
        .map_err(InstallError::Config)?;

    Ok(InstallResult {
        game_version: env.game_version.clone(),
        version_id,
        root: root.path().to_owned(),
        modpack: content.bundle,
        java,
        resource_pack: content.resource_pack,
    })
}

/// Writes `options.txt`, an empty `servers.dat` and
/// creates `config/`. Existing files are overwritten.
///
/// # Errors
/// If any of them couldn't be written.
pub async fn write_config_files(
    root: &InstallRoot,
    options: &InstallOptions,
    progress: &ProgressSender,
) -> Result<(), IoError> {
    progress.info(Phase::Config, "Writing game settings");

    let config_dir = root.config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .path(&config_dir)?;

    let options_file = root.options_file();
    tokio::fs::write(&options_file, options.options_txt())
        .await
        .path(&options_file)?;

    let servers_file = root.servers_file();
    tokio::fs::write(&servers_file, "")
        .await
        .path(&servers_file)?;

    progress.success(Phase::Config, "Game settings written");
    Ok(())
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{0}")]
    Java(#[from] JavaInstallError),
    #[error("{0}")]
    Download(#[from] DownloadError),
    #[error("{0}")]
    Libraries(DownloadError),
    #[error("{0}")]
    Fabric(#[from] FabricInstallError),
    #[error("{0}")]
    Content(#[from] ContentError),
    #[error("install folder is not usable:\n{0}")]
    NotWritable(IoError),
    #[error("while writing game settings:\n{0}")]
    Config(IoError),
}

impl InstallError {
    /// The step that failed.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            InstallError::Java(_) => Phase::Runtime,
            InstallError::Download(_) | InstallError::NotWritable(_) => Phase::Version,
            InstallError::Libraries(_) => Phase::Libraries,
            InstallError::Fabric(_) => Phase::Loader,
            InstallError::Content(_) => Phase::Content,
            InstallError::Config(_) => Phase::Config,
        }
    }
}

impl Display for InstallResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (modpack {}, java {}) at {}",
            self.version_id,
            self.modpack,
            self.java,
            self.root.display()
        )
    }
}
