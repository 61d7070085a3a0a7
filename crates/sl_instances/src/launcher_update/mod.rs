//! Keeps the launcher itself up to date.
//!
//! ```txt
//! check_for_updates ─> UpToDate | Skipped | Available(release)
//!                                              │
//!                      download_update <───────┘  (3 attempts, timeout)
//!                              │
//!                      install_update ─> script replaces the exe and restarts
//!                                     └> or: zip overlaid onto the app dir
//! ```
//!
//! Releases come from the GitHub "latest release" API.
//! Drafts and pre-releases are never offered.

use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU8, Ordering as AtomicOrdering},
        LazyLock,
    },
    time::Duration,
};

use owo_colors::OwoColorize;
use regex::Regex;
use serde::Deserialize;
use sl_core::{
    err, file_utils::{self, DownloadOptions}, info, pt, retry_with_backoff, warn,
    DownloadFileError, IntoIoError, IoError, JsonDownloadError, JsonError, Phase, ProgressSender,
    RequestError, LAUNCHER_VERSION_NAME,
};
use thiserror::Error;

mod applier;
pub use applier::{ApplyOutcome, ArchiveOverlay, ScriptApplier, SelfUpdateApplier, UpdateInstaller};

pub const RELEASE_REPO: &str = "LOLENNNN/shampuneum-launcher";
const GITHUB_API: &str = "https://api.github.com";

/// Where and how often to look for updates.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// API base, without trailing slash.
    pub api_base: String,
    /// `owner/repo`
    pub repo: String,
    /// Version of the running launcher.
    pub current_version: String,
    pub first_check_delay: Duration,
    pub check_interval: Duration,
    /// Upper bound for one download attempt.
    pub download_timeout: Duration,
    pub max_attempts: usize,
    /// Attempt `n` waits `retry_backoff * n` before the next one.
    pub retry_backoff: Duration,
    pub prefer_portable: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            api_base: GITHUB_API.to_owned(),
            repo: RELEASE_REPO.to_owned(),
            current_version: LAUNCHER_VERSION_NAME.to_owned(),
            first_check_delay: Duration::from_secs(5),
            check_interval: Duration::from_secs(30 * 60),
            download_timeout: Duration::from_secs(5 * 60),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            prefer_portable: true,
        }
    }
}

impl UpdateConfig {
    #[must_use]
    pub fn latest_release_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, self.repo)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
    pub body: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// A newer launcher build, ready to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRelease {
    /// Without the leading `v`.
    pub version: String,
    pub download_url: String,
    pub file_name: String,
    pub size_bytes: u64,
    /// `dd.mm.yyyy`
    pub publish_date: Option<String>,
    pub is_portable: bool,
    /// Release notes with the markdown stripped.
    pub changelog: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    UpToDate,
    /// Newer, but the user asked not to be bothered about it.
    Skipped(String),
    Available(UpdateRelease),
}

/// Splits `1.2.3` (or `v1.2.3`) into numbers.
///
/// # Errors
/// If any component isn't a number.
pub fn parse_version(version: &str) -> Result<Vec<u64>, UpdateError> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    trimmed
        .split('.')
        .map(|n| n.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| UpdateError::BadVersion(version.to_owned()))
}

/// Compares two dotted versions numerically, component by component.
///
/// Missing trailing components count as `0`
/// (`2.0 == 2.0.0`) and `10 > 9`. Non-numeric parts count as `0` too.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let lenient = |v: &str| -> Vec<u64> {
        let v = v.trim();
        v.strip_prefix('v')
            .unwrap_or(v)
            .split('.')
            .map(|n| n.parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (lenient(a), lenient(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|n| n.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Checksums, signatures, blockmaps and auto-update manifests.
const METADATA_SUFFIXES: &[&str] = &[
    ".blockmap", ".yml", ".yaml", ".sha1", ".sha256", ".sha512", ".md5", ".sig", ".asc",
];

fn is_metadata(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("checksum")
        || name.contains("blockmap")
        || METADATA_SUFFIXES.iter().any(|n| name.ends_with(n))
}

/// Picks the asset to download.
///
/// A portable `.exe` wins if `prefer_portable`, otherwise the first
/// asset that looks like a Windows build, an `.exe` or a `.zip`.
/// Checksums, signatures and update manifests never match.
#[must_use]
pub fn select_asset(assets: &[GithubAsset], prefer_portable: bool) -> Option<&GithubAsset> {
    let candidates = || assets.iter().filter(|a| !is_metadata(&a.name));

    let portable = prefer_portable
        .then(|| {
            candidates().find(|a| {
                let name = a.name.to_lowercase();
                name.contains("portable") && name.ends_with(".exe")
            })
        })
        .flatten();

    portable.or_else(|| {
        candidates().find(|a| {
            let name = a.name.to_lowercase();
            name.contains("win") || name.ends_with(".exe") || name.ends_with(".zip")
        })
    })
}

static CHANGELOG_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    [
        (r"(?m)^#{1,6}\s+", ""),
        (r"\*\*(.*?)\*\*", "$1"),
        (r"\*(.*?)\*", "$1"),
        (r"`(.*?)`", "$1"),
        (r"\[([^\]]*)\]\([^)]*\)", "$1"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

/// Strips markdown headers, emphasis, code and links.
#[must_use]
pub fn clean_changelog(markdown: &str) -> String {
    if markdown.trim().is_empty() {
        return "No changelog available".to_owned();
    }
    CHANGELOG_RULES
        .iter()
        .fold(markdown.to_owned(), |text, (regex, replacement)| {
            regex.replace_all(&text, *replacement).into_owned()
        })
        .trim()
        .to_owned()
}

/// `1536` -> `1.5 KB`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}

fn format_publish_date(published_at: &str) -> Option<String> {
    chrono::DateTime::parse_from_rfc3339(published_at)
        .ok()
        .map(|n| n.format("%d.%m.%Y").to_string())
}

/// Asks the release feed whether there's a newer launcher.
///
/// `skipped_version` (exact tag match, without `v`) is
/// reported as [`UpdateCheck::Skipped`].
///
/// # Errors
/// - feed unreachable or unparseable
/// - tag isn't a version
/// - a newer release has no usable asset
pub async fn check_for_updates(
    config: &UpdateConfig,
    skipped_version: Option<&str>,
    progress: &ProgressSender,
) -> Result<UpdateCheck, UpdateError> {
    progress.info(Phase::UpdateCheck, "Checking for launcher updates");
    let release: GithubRelease =
        file_utils::download_file_to_json(&config.latest_release_url()).await?;

    if release.draft || release.prerelease {
        pt!("Latest release {} is a draft/pre-release, ignoring", release.tag_name);
        progress.info(Phase::UpdateCheck, "Launcher is up to date");
        return Ok(UpdateCheck::UpToDate);
    }

    let version = release.tag_name.trim().trim_start_matches('v').to_owned();
    parse_version(&version)?;

    if compare_versions(&version, &config.current_version).is_le() {
        info!("Launcher is up to date ({})", config.current_version);
        progress.info(Phase::UpdateCheck, "Launcher is up to date");
        return Ok(UpdateCheck::UpToDate);
    }

    if skipped_version == Some(version.as_str()) {
        pt!("Update {version} was skipped by the user");
        progress.info(Phase::UpdateCheck, format!("Update {version} skipped"));
        return Ok(UpdateCheck::Skipped(version));
    }

    let asset = select_asset(&release.assets, config.prefer_portable).ok_or_else(|| {
        UpdateError::NoAsset {
            version: version.clone(),
        }
    })?;

    info!(
        "Update available: {} -> {version} ({})",
        config.current_version,
        asset.name.bright_black()
    );
    progress.success(
        Phase::UpdateCheck,
        format!("Update available: {version} ({})", format_bytes(asset.size)),
    );

    Ok(UpdateCheck::Available(UpdateRelease {
        version,
        download_url: asset.browser_download_url.clone(),
        file_name: asset.name.clone(),
        size_bytes: asset.size,
        publish_date: release.published_at.as_deref().and_then(format_publish_date),
        is_portable: asset.name.to_lowercase().contains("portable"),
        changelog: clean_changelog(release.body.as_deref().unwrap_or_default()),
    }))
}

/// Downloads `release` into `dest_dir`, retrying on failure.
///
/// Each attempt has [`UpdateConfig::download_timeout`] to finish.
/// A zero-byte file, or one that doesn't match the declared
/// `Content-Length` or the asset size from the feed,
/// is discarded and retried.
///
/// Returns the path of the downloaded file.
///
/// # Errors
/// [`UpdateError::RetriesExhausted`] after the last attempt fails.
pub async fn download_update(
    config: &UpdateConfig,
    release: &UpdateRelease,
    dest_dir: &Path,
    progress: &ProgressSender,
) -> Result<PathBuf, UpdateError> {
    tokio::fs::create_dir_all(dest_dir).await.dir(dest_dir)?;
    let path = dest_dir.join(&release.file_name);

    info!("Downloading launcher update {}", release.version);
    progress.percent(Phase::UpdateDownload, 0, format!("Downloading {}", release.file_name));

    let attempts = config.max_attempts.max(1);
    retry_with_backoff(attempts, config.retry_backoff, |attempt| {
        let path = path.clone();
        async move {
            let result = download_attempt(config, release, &path, progress).await;
            if let Err(error) = &result {
                err!("Update download attempt {attempt}/{attempts} failed: {error}");
                progress.warning(
                    Phase::UpdateDownload,
                    format!("Attempt {attempt}/{attempts} failed, retrying"),
                );
                file_utils::remove_if_exists(&path).await;
            }
            result
        }
    })
    .await
    .map_err(|last| UpdateError::RetriesExhausted {
        attempts,
        last: Box::new(last),
    })?;

    progress.percent(Phase::UpdateDownload, 100, "Download complete");
    Ok(path)
}

async fn download_attempt(
    config: &UpdateConfig,
    release: &UpdateRelease,
    path: &Path,
    progress: &ProgressSender,
) -> Result<(), UpdateError> {
    let last_percent = AtomicU8::new(0);
    let on_progress = |received: u64, total: Option<u64>| {
        let Some(total) = total.or(Some(release.size_bytes)).filter(|n| *n > 0) else {
            return;
        };
        #[allow(clippy::cast_possible_truncation)]
        let percent = ((received.saturating_mul(100)) / total).min(99) as u8;
        if last_percent.swap(percent, AtomicOrdering::SeqCst) != percent {
            progress.percent(
                Phase::UpdateDownload,
                percent,
                format!("{} / {}", format_bytes(received), format_bytes(total)),
            );
        }
    };

    let options = DownloadOptions {
        min_size: 0,
        on_progress: Some(&on_progress),
    };
    let downloaded = tokio::time::timeout(
        config.download_timeout,
        file_utils::download_file_to_path_ext(&release.download_url, path, options),
    )
    .await
    .map_err(|_| UpdateError::Timeout {
        secs: config.download_timeout.as_secs(),
    })??;

    if downloaded.size == 0 {
        return Err(UpdateError::EmptyDownload);
    }
    let declared = (release.size_bytes > 0).then_some(release.size_bytes);
    for expected in [downloaded.content_length, declared].into_iter().flatten() {
        if expected != downloaded.size {
            return Err(UpdateError::SizeMismatch {
                expected,
                got: downloaded.size,
            });
        }
    }
    Ok(())
}

/// Applies a downloaded update.
///
/// # Errors
/// If the applier fails.
pub async fn install_update<A: SelfUpdateApplier>(
    applier: &A,
    downloaded: &Path,
    progress: &ProgressSender,
) -> Result<ApplyOutcome, UpdateError> {
    progress.info(Phase::UpdateInstall, "Installing launcher update");
    let outcome = applier.apply(downloaded).await?;
    match outcome {
        ApplyOutcome::RestartPending => progress.success(
            Phase::UpdateInstall,
            "Update installed, the launcher will restart",
        ),
        ApplyOutcome::Overlaid => progress.success(Phase::UpdateInstall, "Update installed"),
    }
    Ok(outcome)
}

/// Checks after [`UpdateConfig::first_check_delay`], then every
/// [`UpdateConfig::check_interval`]. `checks` limits the number
/// of rounds (`None` runs forever).
///
/// Failures are logged as warnings and never stop the loop.
/// `skipped_version` is re-read before every round.
pub async fn auto_check<S, F>(
    config: &UpdateConfig,
    checks: Option<usize>,
    skipped_version: S,
    mut on_check: F,
    progress: &ProgressSender,
) where
    S: Fn() -> Option<String>,
    F: FnMut(&UpdateCheck),
{
    tokio::time::sleep(config.first_check_delay).await;
    let mut round = 0;
    loop {
        let skipped = skipped_version();
        match check_for_updates(config, skipped.as_deref(), progress).await {
            Ok(check) => on_check(&check),
            Err(error) => warn!("Automatic update check failed:\n{error}"),
        }

        round += 1;
        if checks.is_some_and(|n| round >= n) {
            break;
        }
        tokio::time::sleep(config.check_interval).await;
    }
}

const UPDATE_ERR_PREFIX: &str = "while updating the launcher:\n";

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{UPDATE_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{UPDATE_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{UPDATE_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{UPDATE_ERR_PREFIX}{0}")]
    Download(DownloadFileError),
    #[error("{UPDATE_ERR_PREFIX}not a version: {0:?}")]
    BadVersion(String),
    #[error("{UPDATE_ERR_PREFIX}no suitable download found for version {version}")]
    NoAsset { version: String },
    #[error("{UPDATE_ERR_PREFIX}download timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("{UPDATE_ERR_PREFIX}downloaded file is empty")]
    EmptyDownload,
    #[error("{UPDATE_ERR_PREFIX}downloaded file is corrupt: expected {expected} bytes, got {got}")]
    SizeMismatch { expected: u64, got: u64 },
    #[error("download failed after {attempts} attempts:\n{last}")]
    RetriesExhausted {
        attempts: usize,
        last: Box<UpdateError>,
    },
    #[error("{UPDATE_ERR_PREFIX}could not extract update:\n{0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{UPDATE_ERR_PREFIX}could not start updater script {1:?}:\n{0}")]
    Spawn(std::io::Error, PathBuf),
}

impl From<DownloadFileError> for UpdateError {
    fn from(value: DownloadFileError) -> Self {
        match value {
            DownloadFileError::Request(err) => Self::Request(err),
            DownloadFileError::Io(err) => Self::Io(err),
            err @ DownloadFileError::TooSmall { .. } => Self::Download(err),
        }
    }
}

impl From<JsonDownloadError> for UpdateError {
    fn from(value: JsonDownloadError) -> Self {
        match value {
            JsonDownloadError::RequestError(err) => Self::Request(err),
            JsonDownloadError::SerdeError(err) => Self::Json(err),
        }
    }
}
