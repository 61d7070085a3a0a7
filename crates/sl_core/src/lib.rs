//! Core utilities for the Shampuneum launcher,
//! used by the various crates.
//!
//! # Contains
//! - File and download utilities (redirect-following, size-checked downloads)
//! - Error types
//! - JSON structs for the version manifest, version descriptors and loader profiles
//! - The install root layout
//! - Logging macros and the progress channel
//! - Concurrency helpers

#![allow(clippy::missing_errors_doc)]

use futures::StreamExt;
use std::{future::Future, sync::LazyLock, time::Duration};

pub mod constants;
mod error;
/// Common utilities for working with files.
pub mod file_utils;
mod install_root;
/// JSON structs for the version manifest, version descriptors and Fabric profiles.
pub mod json;
mod libraries;
/// Logging macros.
pub mod print;
mod progress;
#[cfg(any(test, feature = "test-server"))]
pub mod test_server;

pub use constants::*;
pub use error::{
    DownloadFileError, IntoIoError, IntoJsonError, IoError, JsonDownloadError,
    JsonError, JsonFileError,
};
pub use file_utils::RequestError;
pub use install_root::{fabric_version_id, InstallRoot, InstallStatus};
pub use libraries::download_libraries;
pub use print::{logger_finish, LogType, LoggingState, LOGGER};
pub use progress::{Phase, ProgressEvent, ProgressSender, Severity};

pub const LAUNCHER_VERSION_NAME: &str = "1.0.0";

pub const USER_AGENT: &str = "Shampuneum-Launcher";

/// To prevent spawning of terminal (windows only).
///
/// Takes in a `Command` (owned or mutable reference, both are fine).
/// This supports `process::Command` of both `tokio` and `std`.
#[macro_export]
macro_rules! no_window {
    ($cmd:expr) => {
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            // 0x08000000 => CREATE_NO_WINDOW
            $cmd.creation_flags(0x08000000);
        }
    };
}

/// Shared client for API calls (manifests, release feed, login).
/// Follows redirects on its own.
pub static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
});

/// Client for file downloads.
///
/// Redirects are *not* followed here, see
/// [`file_utils::download_file_to_path`]. A stalled connection
/// fails after the read timeout instead of hanging forever.
pub static DOWNLOAD_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(30))
        .read_timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_default()
});

/// Executes multiple async tasks concurrently (e.g., downloading files).
///
/// # Calling
///
/// - Takes in `Iterator` over `Future` (the thing returned by `async fn -> Result<T, E>`).
/// - Returns `Result<Vec<T>, E>`.
///
/// The entire operation fails as soon as any task fails,
/// the remaining tasks are dropped.
///
/// # Example
/// ```no_run
/// # use sl_core::do_jobs;
/// # async fn download_file(url: &str) -> Result<String, String> {
/// #     Ok("Hello".to_owned())
/// # }
/// # async fn trying() -> Result<(), String> {
/// #   let files: [&str; 1] = ["test"];
/// do_jobs(files.iter().map(|url| {
///     // Async function that returns Result<T, E>
///     // No need to await
///     download_file(url)
/// })).await?;
/// #   Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns whatever error the input function returns.
pub async fn do_jobs<T, E>(
    results: impl Iterator<Item = impl Future<Output = Result<T, E>>>,
) -> Result<Vec<T>, E> {
    #[cfg(target_os = "macos")]
    const JOBS: usize = 32;
    #[cfg(not(target_os = "macos"))]
    const JOBS: usize = 64;
    do_jobs_with_limit(results, JOBS).await
}

/// Executes multiple async tasks concurrently (e.g., downloading files),
/// with an **explicit limit** on concurrent jobs.
///
/// This lets you stay under any `ulimit -n` file descriptor
/// limits.
///
/// # Errors
/// Returns whatever error the input function returns.
pub async fn do_jobs_with_limit<T, E>(
    results: impl Iterator<Item = impl Future<Output = Result<T, E>>>,
    limit: usize,
) -> Result<Vec<T>, E> {
    let mut tasks = futures::stream::FuturesUnordered::new();
    let mut outputs = Vec::new();

    for result in results {
        tasks.push(result);
        if tasks.len() > limit {
            if let Some(task) = tasks.next().await {
                outputs.push(task?);
            }
        }
    }

    while let Some(task) = tasks.next().await {
        outputs.push(task?);
    }
    Ok(outputs)
}

/// Runs `f` up to `attempts` times until it succeeds.
///
/// `f` gets the attempt number (starting at 1).
/// Between attempts it sleeps `backoff * attempt`,
/// so the wait grows linearly.
///
/// # Example
/// ```no_run
/// # use std::time::Duration;
/// # use sl_core::retry_with_backoff;
/// async fn download_file(url: &str) -> Result<String, String> {
///     // Insert network operation here
///     Ok("Hi".to_owned())
/// }
/// # async fn download_something_important() -> Result<String, String> {
/// retry_with_backoff(3, Duration::from_secs(2), |_| download_file("example.com/my_file")).await
/// # }
/// ```
///
/// # Errors
/// Returns the error of the last attempt.
pub async fn retry_with_backoff<T, E, Res, Func>(
    attempts: usize,
    backoff: Duration,
    f: Func,
) -> Result<T, E>
where
    Res: Future<Output = Result<T, E>>,
    Func: Fn(usize) -> Res,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match f(attempt).await {
            Ok(n) => return Ok(n),
            Err(err) if attempt >= attempts => return Err(err),
            Err(_) => {
                tokio::time::sleep(backoff * attempt as u32).await;
                attempt += 1;
            }
        }
    }
}
