use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use futures::StreamExt;
use reqwest::{header::LOCATION, Response, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::io::StreamReader;
use zip::ZipArchive;

use crate::{
    error::{DownloadFileError, IoError},
    IntoIoError, IntoJsonError, JsonDownloadError, CLIENT, DOWNLOAD_CLIENT,
};

/// Name of the launcher folder inside the system data dir.
pub const LAUNCHER_DIR_NAME: &str = ".shampuneum";

/// Env var that overrides the launcher folder location.
pub const LAUNCHER_DIR_ENV: &str = "SHAMPUNEUM_DIR";

/// Generic sanity floor for manifests, jars and libraries.
pub const MIN_SIZE_GENERIC: u64 = 100;
/// Stricter floor for big binary assets (archives, runtimes).
pub const MIN_SIZE_BINARY: u64 = 1024;

/// How many `3xx` hops [`download_file_to_path`] follows
/// before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Returns the path to the launcher root folder.
///
/// This is `$SHAMPUNEUM_DIR` if set, otherwise `.shampuneum`
/// inside the system data dir:
/// - `~/.local/share` on Linux
/// - `~/AppData/Roaming` on Windows
/// - `~/Library/Application Support` on macOS
///
/// The folder is created if missing.
///
/// # Errors
/// - if data dir is not found
/// - if the launcher directory could not be created (permissions issue)
pub fn get_launcher_dir() -> Result<PathBuf, IoError> {
    let launcher_directory = if let Some(n) = std::env::var_os(LAUNCHER_DIR_ENV) {
        canonicalize_s(PathBuf::from(n))
    } else {
        dirs::data_dir()
            .ok_or(IoError::LauncherDirNotFound)?
            .join(LAUNCHER_DIR_NAME)
    };

    std::fs::create_dir_all(&launcher_directory).path(&launcher_directory)?;
    Ok(launcher_directory)
}

/// Downloads a file from the given URL into a `String`.
///
/// # Errors
/// Returns an error if:
/// - Error sending request
/// - Request is rejected (HTTP status code)
/// - Redirect limit exhausted.
pub async fn download_file_to_string(url: &str) -> Result<String, RequestError> {
    let response = CLIENT.get(url).send().await?;
    check_for_success(&response)?;
    Ok(response.text().await?)
}

/// Downloads a file from the given URL into a JSON.
///
/// More specifically, it tries to parse the contents
/// into anything implementing `serde::Deserialize`
///
/// # Errors
/// Same as [`download_file_to_string`], plus
/// if the body isn't valid JSON for `T`.
pub async fn download_file_to_json<T: DeserializeOwned>(url: &str) -> Result<T, JsonDownloadError> {
    let text = download_file_to_string(url).await?;
    Ok(serde_json::from_str(&text).json(text)?)
}

/// Called with `(bytes_received, content_length)`
/// as chunks arrive.
pub type ProgressCallback<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

#[derive(Clone, Copy)]
pub struct DownloadOptions<'a> {
    /// Files smaller than this are treated
    /// as corrupt and removed.
    pub min_size: u64,
    pub on_progress: Option<ProgressCallback<'a>>,
}

impl Default for DownloadOptions<'_> {
    fn default() -> Self {
        Self {
            min_size: MIN_SIZE_GENERIC,
            on_progress: None,
        }
    }
}

/// What ended up on disk after a successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadedFile {
    pub size: u64,
    /// The `Content-Length` the server declared, if any.
    pub content_length: Option<u64>,
}

/// Downloads a file from the given URL and saves it to a path.
///
/// Redirects are followed by hand (up to [`MAX_REDIRECTS`]),
/// and the result must be at least `min_size` bytes.
///
/// On success `path` holds exactly the remote bytes.
/// On any failure `path` does not exist afterwards.
///
/// # Errors
/// - Error sending request or reading the body
/// - Request is rejected (HTTP status code)
/// - Too many redirects, or a broken `Location` header
/// - File smaller than `min_size`
/// - Couldn't write to `path`
pub async fn download_file_to_path(
    url: &str,
    path: impl AsRef<Path>,
    min_size: u64,
) -> Result<u64, DownloadFileError> {
    let options = DownloadOptions {
        min_size,
        on_progress: None,
    };
    download_file_to_path_ext(url, path, options)
        .await
        .map(|n| n.size)
}

/// Like [`download_file_to_path`] but with a progress
/// callback and the declared `Content-Length` returned.
///
/// # Errors
/// See [`download_file_to_path`].
pub async fn download_file_to_path_ext(
    url: &str,
    path: impl AsRef<Path>,
    options: DownloadOptions<'_>,
) -> Result<DownloadedFile, DownloadFileError> {
    let path = path.as_ref();
    let result = download_inner(url, path, options).await;
    if result.is_err() {
        remove_if_exists(path).await;
    }
    result
}

async fn download_inner(
    url: &str,
    path: &Path,
    options: DownloadOptions<'_>,
) -> Result<DownloadedFile, DownloadFileError> {
    let mut current = Url::parse(url).map_err(|_| RequestError::InvalidUrl(url.to_owned()))?;
    let mut redirects = 0;

    let response = loop {
        let response = DOWNLOAD_CLIENT.get(current.clone()).send().await?;
        let Some(location) = redirect_location(&response) else {
            break response;
        };
        // A stale file from an earlier attempt counts as partial.
        remove_if_exists(path).await;
        if redirects >= MAX_REDIRECTS {
            return Err(RequestError::TooManyRedirects {
                url: url.to_owned(),
                limit: MAX_REDIRECTS,
            }
            .into());
        }
        redirects += 1;
        current = current
            .join(&location)
            .map_err(|_| RequestError::BadRedirect {
                url: current.to_string(),
                location: location.clone(),
            })?;
    };
    check_for_success(&response)?;

    let content_length = response.content_length();
    let mut received = 0;
    let stream = response
        .bytes_stream()
        .map(|n| n.map_err(std::io::Error::other))
        .inspect(|chunk| {
            if let (Ok(chunk), Some(cb)) = (chunk, options.on_progress) {
                received += chunk.len() as u64;
                cb(received, content_length);
            }
        });
    let mut stream = StreamReader::new(stream);

    if let Some(parent) = path.parent() {
        if !parent.is_dir() {
            tokio::fs::create_dir_all(&parent).await.path(parent)?;
        }
    }

    let mut file = tokio::fs::File::create(&path).await.path(path)?;
    if let Err(err) = tokio::io::copy(&mut stream, &mut file).await {
        return Err(stream_error(err, path));
    }
    drop(file);

    let size = tokio::fs::metadata(path).await.path(path)?.len();
    if size < options.min_size {
        return Err(DownloadFileError::TooSmall {
            url: current.to_string(),
            size,
            min: options.min_size,
        });
    }

    Ok(DownloadedFile {
        size,
        content_length,
    })
}

/// `StreamReader` hands body errors back wrapped in `io::Error`.
fn stream_error(err: std::io::Error, path: &Path) -> DownloadFileError {
    let error = err.to_string();
    match err.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(req)) => RequestError::ReqwestError(*req).into(),
        _ => IoError::Io {
            error,
            path: path.to_owned(),
        }
        .into(),
    }
}

fn redirect_location(response: &Response) -> Option<String> {
    if !response.status().is_redirection() {
        return None;
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|n| n.to_str().ok())
        .map(str::to_owned)
}

/// # Errors
/// If the HTTP response status is not a success code.
pub fn check_for_success(response: &Response) -> Result<(), RequestError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(RequestError::DownloadError {
            code: response.status(),
            url: response.url().clone(),
        })
    }
}

const NETWORK_ERROR_MSG: &str = r"
- Check your internet connection
- Check if you are behind a firewall/proxy
- Try doing the action again

";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Download Error (code {code}){NETWORK_ERROR_MSG}Url: {url}")]
    DownloadError {
        code: reqwest::StatusCode,
        url: reqwest::Url,
    },
    #[error("Network Request Error{NETWORK_ERROR_MSG}{0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("too many redirects (more than {limit})\nUrl: {url}")]
    TooManyRedirects { url: String, limit: usize },
    #[error("invalid redirect target {location:?}\nUrl: {url}")]
    BadRedirect { url: String, location: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl RequestError {
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            RequestError::DownloadError { code, url } => {
                format!("Download Error (code {code})\nUrl: {url}")
            }
            RequestError::ReqwestError(error) => format!("Network Request Error:\n{error}"),
            RequestError::TooManyRedirects { .. }
            | RequestError::BadRedirect { .. }
            | RequestError::InvalidUrl(_) => self.to_string(),
        }
    }
}

/// Sets the executable bit on a file.
///
/// This makes a file executable on Unix systems,
/// i.e. it can be run as a program.
///
/// # Errors
/// Returns an error if:
/// - the file does not exist
/// - the user doesn't have permission to read the file metadata
/// - the user doesn't have permission to change the file metadata
#[cfg(target_family = "unix")]
pub async fn set_executable(path: &Path) -> Result<(), IoError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await.path(path)?.permissions();
    perms.set_mode(0o755); // rwxr-xr-x
    tokio::fs::set_permissions(path, perms).await.path(path)
}

/// Recursively copies the contents of
/// the `src` dir to the `dst` dir,
/// overwriting files that already exist.
///
/// File structure:
/// ```txt
/// src/
///     a.txt
///     c/
///         d.txt
/// ```
/// To
/// ```txt
/// dst/
///     a.txt
///     c/
///         d.txt
/// ```
///
/// # Errors
/// - `src` doesn't exist
/// - `dst` already has a dir with the same name as a file
/// - User doesn't have permissions for `src`/`dst` access
pub async fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), IoError> {
    if src.is_file() {
        tokio::fs::copy(src, dst).await.path(src)?;
        return Ok(());
    }
    if !dst.exists() {
        tokio::fs::create_dir_all(dst).await.path(dst)?;
    }

    let mut dir = tokio::fs::read_dir(src).await.dir(src)?;
    while let Some(entry) = dir.next_entry().await.dir(src)? {
        let path = entry.path();
        let dest_path = dst.join(entry.file_name());
        Box::pin(copy_dir_recursive(&path, &dest_path)).await?;
    }

    Ok(())
}

/// Deletes a directory with everything inside,
/// then creates it again, empty.
///
/// # Errors
/// If the directory couldn't be removed or created.
pub async fn recreate_dir(dir: &Path) -> Result<(), IoError> {
    if exists(dir).await {
        tokio::fs::remove_dir_all(dir).await.path(dir)?;
    }
    tokio::fs::create_dir_all(dir).await.path(dir)
}

/// Removes a file if present.
/// Errors are ignored, it's only used for cleanup.
pub async fn remove_if_exists(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            crate::err!("Could not remove {path:?}: {err}");
        }
    }
}

/// Creates `dir` (and parents) and checks that
/// files can actually be written inside.
///
/// # Errors
/// [`IoError::NotWritable`] if either step fails.
pub async fn ensure_writable_dir(dir: &Path) -> Result<(), IoError> {
    let not_writable = |err: std::io::Error| IoError::NotWritable {
        error: err.to_string(),
        path: dir.to_owned(),
    };

    tokio::fs::create_dir_all(dir).await.map_err(not_writable)?;
    let marker = dir.join(".write_test");
    tokio::fs::write(&marker, b"ok").await.map_err(not_writable)?;
    tokio::fs::remove_file(&marker).await.map_err(not_writable)?;
    Ok(())
}

/// Extract a ZIP archive to a directory
///
/// If `strip_toplevel` is true, this removes the common root directory.
pub async fn extract_zip_archive<
    R: std::io::Read + std::io::Seek + Send + 'static,
    P: AsRef<Path>,
>(
    reader: R,
    extract_to: P,
    strip_toplevel: bool,
) -> Result<(), zip::result::ZipError> {
    let mut archive = ZipArchive::new(reader)?;
    let extract_to = canonicalize_a(extract_to).await;

    tokio::task::spawn_blocking(move || {
        if strip_toplevel {
            archive.extract_unwrapped_root_dir(extract_to, zip::read::root_dir_common_filter)
        } else {
            archive.extract(extract_to)
        }
    })
    .await
    .map_err(|err| zip::result::ZipError::Io(std::io::Error::other(err)))?
}

/// Opens the ZIP file at `archive` and extracts it into `extract_to`.
pub async fn extract_zip_file(
    archive: &Path,
    extract_to: &Path,
) -> Result<(), zip::result::ZipError> {
    let file = std::fs::File::open(archive)?;
    extract_zip_archive(std::io::BufReader::new(file), extract_to, false).await
}

// ========
// This is one thing I find lacking in rust.
// See https://journal.stuffwithstuff.com/2015/02/01/what-color-is-your-function/
// for more info.

pub async fn canonicalize_a(p: impl AsRef<Path>) -> PathBuf {
    let p = p.as_ref();
    #[allow(unused_mut)]
    if let Ok(mut n) = tokio::fs::canonicalize(p).await {
        #[cfg(target_os = "windows")]
        {
            let s = n.to_string_lossy();
            if let Some(s) = s.strip_prefix("\\\\?\\") {
                n = PathBuf::from(s);
            }
        }
        n
    } else {
        p.to_owned()
    }
}

pub fn canonicalize_s(p: impl AsRef<Path>) -> PathBuf {
    let p = p.as_ref();
    #[allow(unused_mut)]
    if let Ok(mut n) = std::fs::canonicalize(p) {
        #[cfg(target_os = "windows")]
        {
            let s = n.to_string_lossy();
            if let Some(s) = s.strip_prefix("\\\\?\\") {
                n = PathBuf::from(s);
            }
        }
        n
    } else {
        p.to_owned()
    }
}

// ========

pub async fn exists(p: impl AsRef<Path>) -> bool {
    tokio::fs::try_exists(p).await.is_ok_and(|n| n)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::test_server::{Reply, TestServer};

    const BODY: &[u8] = &[7u8; 2048];

    #[tokio::test]
    async fn follows_up_to_five_redirects() {
        let server = TestServer::start().await;
        for i in 0..5 {
            server.route(&format!("/hop{i}"), Reply::redirect(&format!("/hop{}", i + 1)));
        }
        server.route("/hop5", Reply::ok(BODY));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let size = download_file_to_path(&server.url("/hop0"), &dest, MIN_SIZE_BINARY)
            .await
            .unwrap();

        assert_eq!(size, BODY.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), BODY);
        assert_eq!(server.hits("/hop5"), 1);
    }

    #[tokio::test]
    async fn sixth_redirect_fails_and_leaves_nothing() {
        let server = TestServer::start().await;
        for i in 0..6 {
            server.route(&format!("/hop{i}"), Reply::redirect(&format!("/hop{}", i + 1)));
        }
        server.route("/hop6", Reply::ok(BODY));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let err = download_file_to_path(&server.url("/hop0"), &dest, MIN_SIZE_GENERIC)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadFileError::Request(RequestError::TooManyRedirects { limit: 5, .. })
        ));
        assert!(!dest.exists());
        assert_eq!(server.hits("/hop6"), 0);
    }

    #[tokio::test]
    async fn absolute_redirects_are_followed() {
        let server = TestServer::start().await;
        server.route("/final", Reply::ok(BODY));
        server.route("/start", Reply::redirect(&server.url("/final")));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/dir/out.bin");
        download_file_to_path(&server.url("/start"), &dest, MIN_SIZE_GENERIC)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), BODY);
    }

    #[tokio::test]
    async fn too_small_files_are_removed() {
        let server = TestServer::start().await;
        server.route("/tiny", Reply::ok(b"<html>oops</html>"));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tiny.jar");
        let err = download_file_to_path(&server.url("/tiny"), &dest, MIN_SIZE_GENERIC)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadFileError::TooSmall { size: 17, min: 100, .. }
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn binary_floor_is_stricter() {
        let server = TestServer::start().await;
        server.route("/medium", Reply::ok(&[1u8; 500]));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("medium.bin");
        download_file_to_path(&server.url("/medium"), &dest, MIN_SIZE_GENERIC)
            .await
            .unwrap();
        assert!(dest.exists());

        let err = download_file_to_path(&server.url("/medium"), &dest, MIN_SIZE_BINARY)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadFileError::TooSmall { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn http_errors_remove_stale_file() {
        let server = TestServer::start().await;
        server.route("/gone", Reply::status(404));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("stale.bin");
        std::fs::File::create(&dest)
            .unwrap()
            .write_all(b"leftover from last time")
            .unwrap();

        let err = download_file_to_path(&server.url("/gone"), &dest, MIN_SIZE_GENERIC)
            .await
            .unwrap_err();
        match err {
            DownloadFileError::Request(RequestError::DownloadError { code, url }) => {
                assert_eq!(code.as_u16(), 404);
                assert!(url.as_str().ends_with("/gone"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn connection_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.bin");
        // Nothing listens on port 9 of localhost in a sandbox
        let err = download_file_to_path("http://127.0.0.1:9/x", &dest, MIN_SIZE_GENERIC)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadFileError::Request(RequestError::ReqwestError(_))
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn progress_reaches_the_full_size() {
        let server = TestServer::start().await;
        server.route("/big", Reply::ok(BODY));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("big.bin");
        let last = std::sync::Mutex::new((0, None));
        let cb = |got: u64, total: Option<u64>| {
            *last.lock().unwrap() = (got, total);
        };
        let file = download_file_to_path_ext(
            &server.url("/big"),
            &dest,
            DownloadOptions {
                min_size: MIN_SIZE_BINARY,
                on_progress: Some(&cb),
            },
        )
        .await
        .unwrap();

        assert_eq!(file.content_length, Some(BODY.len() as u64));
        assert_eq!(*last.lock().unwrap(), (2048, Some(2048)));
    }

    #[tokio::test]
    async fn json_downloads_parse() {
        let server = TestServer::start().await;
        server.route("/data.json", Reply::ok(br#"{"a": [1, 2, 3]}"#));

        let value: serde_json::Value = download_file_to_json(&server.url("/data.json"))
            .await
            .unwrap();
        assert_eq!(value["a"][2], 3);

        server.route("/broken.json", Reply::ok(b"{"));
        let err = download_file_to_json::<serde_json::Value>(&server.url("/broken.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, JsonDownloadError::SerdeError(_)));
    }

    #[tokio::test]
    async fn writable_dir_check() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c");
        ensure_writable_dir(&target).await.unwrap();
        assert!(target.is_dir());
        assert!(!target.join(".write_test").exists());
    }

    #[tokio::test]
    async fn recreate_dir_empties_it() {
        let dir = tempfile::tempdir().unwrap();
        let mods = dir.path().join("mods");
        std::fs::create_dir_all(mods.join("sub")).unwrap();
        std::fs::write(mods.join("old.jar"), b"x").unwrap();

        recreate_dir(&mods).await.unwrap();
        assert!(mods.is_dir());
        assert_eq!(std::fs::read_dir(&mods).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn copy_dir_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::create_dir_all(src.join("c")).unwrap();
        std::fs::write(src.join("a.txt"), b"new").unwrap();
        std::fs::write(src.join("c/d.txt"), b"deep").unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(dst.join("a.txt"), b"old").unwrap();
        std::fs::write(dst.join("keep.txt"), b"keep").unwrap();

        copy_dir_recursive(&src, &dst).await.unwrap();
        assert_eq!(std::fs::read(dst.join("a.txt")).unwrap(), b"new");
        assert_eq!(std::fs::read(dst.join("c/d.txt")).unwrap(), b"deep");
        assert!(dst.join("keep.txt").exists());
    }
}
