//! Makes sure a Java runtime new enough for the game is available.
//!
//! The order of preference is:
//! 1. A path the user picked by hand (trusted, never checked)
//! 2. The system `java`, if it reports major version 21 or newer
//! 3. A previously provisioned JDK 24.0.2 under `<root>/java/`
//! 4. Downloading and extracting JDK 24.0.2 there
//!
//! See [`JavaProvisioner::ensure_runtime`].
//!
//! # Platform Support
//!
//! | Platform   | Archive  |
//! |:-----------|:---------|
//! | Windows    | `.zip`   |
//! | macOS      | `.tar.gz`|
//! | Linux      | `.tar.gz`|
//!
//! Anywhere else only a system or hand-picked Java works.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use owo_colors::OwoColorize;
use regex::Regex;
use thiserror::Error;

use sl_core::{
    constants::OS_NAME,
    err,
    file_utils::{self, MIN_SIZE_BINARY},
    info, no_window, pt, DownloadFileError, IntoIoError, IoError, Phase, ProgressSender,
    RequestError,
};

mod compression;
pub use compression::extract_tar_gz;

#[allow(dead_code)]
const fn which_java() -> &'static str {
    #[cfg(target_os = "windows")]
    return "javaw";
    #[cfg(not(target_os = "windows"))]
    "java"
}

/// Which Java to use for GUI apps.
///
/// `javaw` on Windows, `java` on all other platforms.
///
/// On windows, `javaw` is used to avoid accidentally opening
/// secondary terminal window.
pub const JAVA: &str = which_java();

/// Oldest Java major version the game runs on.
pub const MIN_JAVA_MAJOR: u32 = 21;

/// The JDK we provision ourselves.
pub const PINNED_JAVA_VERSION: &str = "24.0.2";

const DOWNLOAD_BASE: &str =
    "https://download.java.net/java/GA/jdk24.0.2/fdc5d0102fe0414db21410ad5834341f/12/GPL";

/// Where the pinned JDK comes from on this platform,
/// `None` if we don't provide one.
#[must_use]
pub fn pinned_download_url() -> Option<String> {
    let file = if cfg!(target_os = "windows") {
        "openjdk-24.0.2_windows-x64_bin.zip"
    } else if cfg!(target_os = "macos") {
        "openjdk-24.0.2_macos-x64_bin.tar.gz"
    } else if cfg!(target_os = "linux") {
        "openjdk-24.0.2_linux-x64_bin.tar.gz"
    } else {
        return None;
    };
    Some(format!("{DOWNLOAD_BASE}/{file}"))
}

/// Path of the pinned Java binary, relative to the provisioning dir.
#[must_use]
pub fn pinned_binary_relative() -> PathBuf {
    let home = if cfg!(target_os = "macos") {
        PathBuf::from(format!("jdk-{PINNED_JAVA_VERSION}.jdk/Contents/Home"))
    } else {
        PathBuf::from(format!("jdk-{PINNED_JAVA_VERSION}"))
    };
    let exe = if cfg!(target_os = "windows") {
        "javaw.exe"
    } else {
        "java"
    };
    home.join("bin").join(exe)
}

/// The Java to launch the game with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeHandle {
    /// Whatever `java` resolves to on `PATH`.
    ///
    /// Not stored as a path: it's re-checked every run.
    System,
    /// An absolute path to a Java executable.
    Path(PathBuf),
}

impl RuntimeHandle {
    /// What to pass to `Command::new`.
    #[must_use]
    pub fn command(&self) -> PathBuf {
        match self {
            RuntimeHandle::System => PathBuf::from(JAVA),
            RuntimeHandle::Path(path) => path.clone(),
        }
    }
}

impl Display for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeHandle::System => write!(f, "{JAVA} (system)"),
            RuntimeHandle::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r#"version\s+"?(\d+)(\.\d+\.\d+)?"#).unwrap()
});

/// Pulls the major version out of `java -version` output.
///
/// ```
/// # use sl_java_handler::parse_major_version;
/// assert_eq!(parse_major_version(r#"openjdk version "21.0.4" 2024-07-16"#), Some(21));
/// assert_eq!(parse_major_version("garbage"), None);
/// ```
#[must_use]
pub fn parse_major_version(output: &str) -> Option<u32> {
    VERSION_REGEX
        .captures(output)
        .and_then(|n| n.get(1))
        .and_then(|n| n.as_str().parse().ok())
}

/// Runs `<java> -version` and parses the major version
/// out of stdout and stderr combined.
///
/// `None` if it couldn't be run or parsed.
pub async fn detect_major_version(java: &Path) -> Option<u32> {
    let mut command = tokio::process::Command::new(java);
    command.arg("-version");
    no_window!(command);

    let output = match command.output().await {
        Ok(n) => n,
        Err(error) => {
            pt!("Could not run {java:?}: {error}");
            return None;
        }
    };
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    let version = parse_major_version(&text);
    if version.is_none() {
        err!("Could not find the Java version in:\n{}", text.bright_black());
    }
    version
}

/// Finds or installs a Java runtime.
#[derive(Debug, Clone)]
pub struct JavaProvisioner {
    /// The command checked as the "system" Java.
    pub system_java: PathBuf,
    /// Where the pinned JDK is extracted.
    pub install_dir: PathBuf,
    /// Archive to download, `None` on unsupported platforms.
    pub download_url: Option<String>,
}

impl JavaProvisioner {
    #[must_use]
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            system_java: PathBuf::from("java"),
            install_dir: install_dir.into(),
            download_url: pinned_download_url(),
        }
    }

    #[must_use]
    pub fn pinned_binary(&self) -> PathBuf {
        self.install_dir.join(pinned_binary_relative())
    }

    fn lock_file(&self) -> PathBuf {
        self.install_dir.join("install.lock")
    }

    /// Returns a Java runtime that can run the game.
    ///
    /// An `explicit` path is trusted as-is.
    ///
    /// # Errors
    /// - no Java around and this platform has no download
    /// - the download or extraction failed
    /// - the freshly extracted Java still isn't 21+
    pub async fn ensure_runtime(
        &self,
        explicit: Option<&Path>,
        progress: &ProgressSender,
    ) -> Result<RuntimeHandle, JavaInstallError> {
        if let Some(path) = explicit {
            info!("Using user-provided Java: {path:?}");
            progress.info(Phase::Runtime, format!("Using Java at {}", path.display()));
            return Ok(RuntimeHandle::Path(path.to_owned()));
        }

        progress.info(Phase::Runtime, "Checking system Java");
        match detect_major_version(&self.system_java).await {
            Some(major) if major >= MIN_JAVA_MAJOR => {
                info!("Using system Java {major}");
                progress.success(Phase::Runtime, format!("Using system Java {major}"));
                return Ok(RuntimeHandle::System);
            }
            Some(major) => {
                pt!("System Java {major} is too old, need {MIN_JAVA_MAJOR}+");
                progress.info(
                    Phase::Runtime,
                    format!("System Java {major} is too old, installing Java {PINNED_JAVA_VERSION}"),
                );
            }
            None => {
                pt!("No system Java found");
                progress.info(
                    Phase::Runtime,
                    format!("System Java not found, installing Java {PINNED_JAVA_VERSION}"),
                );
            }
        }

        let binary = self.pinned_binary();
        if !file_utils::exists(self.lock_file()).await && file_utils::exists(&binary).await {
            if let Some(major) = detect_major_version(&binary).await {
                if major >= MIN_JAVA_MAJOR {
                    info!("Java {PINNED_JAVA_VERSION} is already installed");
                    progress.info(Phase::Runtime, "Java is already installed");
                    return Ok(RuntimeHandle::Path(binary));
                }
            }
        }

        self.install(progress).await?;

        match detect_major_version(&binary).await {
            Some(major) if major >= MIN_JAVA_MAJOR => {
                info!("Installed Java {PINNED_JAVA_VERSION}");
                progress.success(Phase::Runtime, format!("Java {PINNED_JAVA_VERSION} installed"));
                Ok(RuntimeHandle::Path(binary))
            }
            found => Err(JavaInstallError::Incompatible {
                path: binary,
                found,
            }),
        }
    }

    async fn install(&self, progress: &ProgressSender) -> Result<(), JavaInstallError> {
        let url = self
            .download_url
            .as_deref()
            .ok_or(JavaInstallError::UnsupportedPlatform)?;

        file_utils::ensure_writable_dir(&self.install_dir).await?;
        let lock_file = self.lock_file();
        tokio::fs::write(
            &lock_file,
            "If you see this, java hasn't finished installing.",
        )
        .await
        .path(&lock_file)?;

        let is_zip = url.ends_with(".zip");
        let archive = self.install_dir.join(if is_zip {
            "jdk-24.zip"
        } else {
            "jdk-24.tar.gz"
        });

        info!("Downloading Java {PINNED_JAVA_VERSION}");
        progress.info(Phase::Runtime, format!("Downloading Java {PINNED_JAVA_VERSION}"));
        file_utils::download_file_to_path(url, &archive, MIN_SIZE_BINARY).await?;

        pt!("Extracting Java");
        progress.info(Phase::Runtime, "Extracting Java");
        let extracted = if is_zip {
            file_utils::extract_zip_file(&archive, &self.install_dir)
                .await
                .map_err(JavaInstallError::ZipExtract)
        } else {
            self.extract_tar_gz_file(&archive).await
        };
        file_utils::remove_if_exists(&archive).await;
        extracted?;

        #[cfg(target_family = "unix")]
        {
            let binary = self.pinned_binary();
            if file_utils::exists(&binary).await {
                file_utils::set_executable(&binary).await?;
            }
        }

        tokio::fs::remove_file(&lock_file).await.path(&lock_file)?;
        Ok(())
    }

    async fn extract_tar_gz_file(&self, archive: &Path) -> Result<(), JavaInstallError> {
        let archive = archive.to_owned();
        let dest = self.install_dir.clone();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&archive)?;
            extract_tar_gz(std::io::BufReader::new(file), &dest)
        })
        .await
        .map_err(|n| JavaInstallError::TarGzExtract(std::io::Error::other(n)))?
        .map_err(JavaInstallError::TarGzExtract)
    }
}

const ERR_PREF1: &str = "while installing Java (OS: ";

#[derive(Debug, Error)]
pub enum JavaInstallError {
    #[error("{ERR_PREF1}{OS_NAME}):\n{0}")]
    Request(#[from] RequestError),
    #[error("{ERR_PREF1}{OS_NAME}):\n{0}")]
    Io(#[from] IoError),
    #[error("{ERR_PREF1}{OS_NAME}):\n{0}")]
    Download(DownloadFileError),

    #[error("Java auto-installation is not supported on your platform!\nPlease install Java {MIN_JAVA_MAJOR}+ manually,\nand set its path in the settings")]
    UnsupportedPlatform,
    #[error("{ERR_PREF1}{OS_NAME}):\ncould not provision a compatible runtime: {path:?} reports version {found:?}, need {MIN_JAVA_MAJOR}+")]
    Incompatible { path: PathBuf, found: Option<u32> },

    #[error("{ERR_PREF1}{OS_NAME}):\nzip extract error:\n{0}")]
    ZipExtract(#[from] zip::result::ZipError),
    #[error("{ERR_PREF1}{OS_NAME}):\ncouldn't extract java tar.gz:\n{0}")]
    TarGzExtract(std::io::Error),
}

impl From<DownloadFileError> for JavaInstallError {
    fn from(value: DownloadFileError) -> Self {
        match value {
            DownloadFileError::Request(err) => Self::Request(err),
            DownloadFileError::Io(err) => Self::Io(err),
            err @ DownloadFileError::TooSmall { .. } => Self::Download(err),
        }
    }
}
