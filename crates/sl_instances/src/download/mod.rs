//! Resolves a base game version into the install root:
//! descriptor, client jar and libraries.

use owo_colors::OwoColorize;
use sl_core::{
    download_libraries,
    file_utils::{self, MIN_SIZE_GENERIC},
    info,
    json::{Manifest, VersionDetails},
    pt, InstallRoot, IntoIoError, Phase, ProgressSender,
};

mod error;
pub use error::DownloadError;

/// Downloads the pieces of one base version.
///
/// Construct it with [`GameDownloader::new`] (fetches and
/// writes the descriptor), then call [`GameDownloader::download_jar`]
/// and [`GameDownloader::download_libraries`].
pub struct GameDownloader<'a> {
    pub root: &'a InstallRoot,
    /// Folder and file name under `versions/`.
    id: String,
    pub version_json: VersionDetails,
    progress: &'a ProgressSender,
}

impl<'a> GameDownloader<'a> {
    /// Looks `version` up in the manifest at `manifest_url`, then
    /// fetches its descriptor and writes it to `versions/<id>/<id>.json`.
    ///
    /// The descriptor is rewritten on every call.
    ///
    /// # Errors
    /// - manifest or descriptor couldn't be fetched or parsed
    /// - `version` isn't in the manifest
    pub async fn new(
        root: &'a InstallRoot,
        manifest_url: &str,
        version: &str,
        progress: &'a ProgressSender,
    ) -> Result<Self, DownloadError> {
        info!("Resolving version {version}");
        progress.info(Phase::Version, format!("Resolving version {version}"));

        let manifest = Manifest::download(manifest_url).await?;
        let entry = manifest
            .find_name(version)
            .ok_or_else(|| DownloadError::VersionNotFound(version.to_owned()))?;

        pt!("Downloading descriptor: {}", entry.url.bright_black());
        let dir = root.version_dir(version);
        tokio::fs::create_dir_all(&dir).await.path(&dir)?;
        let json_path = root.version_json(version);
        file_utils::download_file_to_path(&entry.url, &json_path, MIN_SIZE_GENERIC).await?;

        let text = tokio::fs::read_to_string(&json_path).await.path(&json_path)?;
        let version_json = VersionDetails::parse(&text)?;
        if version_json.id != version {
            pt!("Descriptor calls itself {}, keeping {version}", version_json.id);
        }

        Ok(Self {
            root,
            id: version.to_owned(),
            version_json,
            progress,
        })
    }

    /// For when the descriptor is already on hand.
    pub fn with_existing(
        root: &'a InstallRoot,
        version_json: VersionDetails,
        progress: &'a ProgressSender,
    ) -> Self {
        Self {
            root,
            id: version_json.id.clone(),
            version_json,
            progress,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Downloads the client jar, unless it's already there.
    ///
    /// Returns whether anything was downloaded.
    ///
    /// # Errors
    /// If the descriptor has no client URL or the download fails.
    pub async fn download_jar(&self) -> Result<bool, DownloadError> {
        let jar = self.root.version_jar(self.id());
        if file_utils::exists(&jar).await {
            pt!("Client jar already present");
            self.progress.info(Phase::Version, "Client jar already present");
            return Ok(false);
        }

        let url = self
            .version_json
            .client_url()
            .ok_or_else(|| DownloadError::NoClientUrl(self.id().to_owned()))?;

        info!("Downloading client jar");
        self.progress.info(Phase::Version, "Downloading client jar");
        file_utils::download_file_to_path(url, &jar, MIN_SIZE_GENERIC).await?;
        self.progress.success(Phase::Version, format!("Version {} downloaded", self.id()));
        Ok(true)
    }

    /// Downloads every library that isn't there yet.
    ///
    /// Returns how many were fetched.
    ///
    /// # Errors
    /// On the first library that fails.
    pub async fn download_libraries(&self) -> Result<usize, DownloadError> {
        let artifacts: Vec<_> = self.version_json.artifacts().collect();
        info!("Downloading libraries ({})", artifacts.len());
        self.progress.info(
            Phase::Libraries,
            format!("Checking {} libraries", artifacts.len()),
        );
        Ok(download_libraries(
            &self.root.libraries_dir(),
            artifacts,
            Phase::Libraries,
            self.progress,
        )
        .await?)
    }
}

/// Resolves `version` completely: descriptor, jar and libraries.
///
/// # Errors
/// See [`GameDownloader`].
pub async fn resolve_version(
    root: &InstallRoot,
    manifest_url: &str,
    version: &str,
    progress: &ProgressSender,
) -> Result<VersionDetails, DownloadError> {
    let downloader = GameDownloader::new(root, manifest_url, version, progress).await?;
    downloader.download_jar().await?;
    downloader.download_libraries().await?;
    Ok(downloader.version_json)
}

#[cfg(test)]
mod tests {
    use sl_core::test_server::{Reply, TestServer};

    use super::*;

    fn serve_version(server: &TestServer) {
        serve_descriptor(server, "1.21.8");
    }

    fn serve_descriptor(server: &TestServer, upstream_id: &str) {
        server.route(
            "/manifest.json",
            Reply::ok(format!(
                r#"{{"versions": [{{"id": "1.21.8", "type": "release", "url": "{}"}}]}}"#,
                server.url("/1.21.8.json")
            )),
        );
        server.route(
            "/1.21.8.json",
            Reply::ok(format!(
                r#"{{
                    "id": "{upstream_id}",
                    "downloads": {{"client": {{"url": "{}"}}}},
                    "libraries": [
                        {{"name": "a:a:1", "downloads": {{"artifact": {{"path": "a/a/1/a-1.jar", "url": "{}"}}}}}},
                        {{"name": "b:b:1", "downloads": {{"artifact": {{"path": "b/b/1/b-1.jar", "url": "{}"}}}}}},
                        {{
                            "name": "n:native:1",
                            "downloads": {{"artifact": {{"path": "n/native/1/native-1.jar", "url": "{}"}}}},
                            "rules": [{{"action": "allow", "os": {{"name": "some-other-os"}}}}]
                        }}
                    ]
                }}"#,
                server.url("/client.jar"),
                server.url("/a.jar"),
                server.url("/b.jar"),
                server.url("/native.jar"),
            )),
        );
        server.route("/client.jar", Reply::ok(vec![9u8; 1000]));
        server.route("/a.jar", Reply::ok(vec![1u8; 200]));
        server.route("/b.jar", Reply::ok(vec![2u8; 200]));
        server.route("/native.jar", Reply::ok(vec![3u8; 200]));
    }

    #[tokio::test]
    async fn resolves_everything() {
        let server = TestServer::start().await;
        serve_version(&server);
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        let details = resolve_version(&root, &server.url("/manifest.json"), "1.21.8", &ProgressSender::none())
            .await
            .unwrap();

        assert_eq!(details.id, "1.21.8");
        assert!(root.verify_version("1.21.8").await);
        assert!(root.libraries_dir().join("a/a/1/a-1.jar").exists());
        assert!(root.libraries_dir().join("b/b/1/b-1.jar").exists());
        // Entries with OS rules are fetched too
        assert!(root.libraries_dir().join("n/native/1/native-1.jar").exists());

        // Second run: descriptor refreshed, binaries skipped
        resolve_version(&root, &server.url("/manifest.json"), "1.21.8", &ProgressSender::none())
            .await
            .unwrap();
        assert_eq!(server.hits("/1.21.8.json"), 2);
        assert_eq!(server.hits("/client.jar"), 1);
        assert_eq!(server.hits("/a.jar"), 1);
    }

    #[tokio::test]
    async fn present_jar_means_no_requests() {
        let server = TestServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let jar = root.version_jar("1.21.8");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"existing").unwrap();

        let details = VersionDetails::parse(&format!(
            r#"{{"id": "1.21.8", "downloads": {{"client": {{"url": "{}"}}}}}}"#,
            server.url("/client.jar")
        ))
        .unwrap();
        let progress = ProgressSender::none();
        let downloader = GameDownloader::with_existing(&root, details, &progress);

        assert!(!downloader.download_jar().await.unwrap());
        assert_eq!(server.total_hits(), 0);
    }

    #[tokio::test]
    async fn files_are_named_after_the_requested_version() {
        let server = TestServer::start().await;
        serve_descriptor(&server, "1.21.8-upstream");
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        resolve_version(&root, &server.url("/manifest.json"), "1.21.8", &ProgressSender::none())
            .await
            .unwrap();

        assert!(root.verify_version("1.21.8").await);
        assert!(!root.version_dir("1.21.8-upstream").exists());
    }

    #[tokio::test]
    async fn truncated_descriptor_is_rejected() {
        let server = TestServer::start().await;
        serve_version(&server);
        server.route("/1.21.8.json", Reply::ok(r#"{"id": "1.21.8"}"#));
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        let err = resolve_version(&root, &server.url("/manifest.json"), "1.21.8", &ProgressSender::none())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DownloadError::Integrity(_)));
        assert!(!root.version_json("1.21.8").exists());
        assert_eq!(server.hits("/client.jar"), 0);
    }

    #[tokio::test]
    async fn unknown_version() {
        let server = TestServer::start().await;
        serve_version(&server);
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        let err = resolve_version(&root, &server.url("/manifest.json"), "0.0.1", &ProgressSender::none())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DownloadError::VersionNotFound(n) if n == "0.0.1"));
        assert!(!root.versions_dir().exists());
    }
}
