//! The curated content: a mod bundle that replaces
//! `mods/` wholesale, and the server resource pack.

use owo_colors::OwoColorize;
use sl_core::{
    err,
    file_utils::{self, MIN_SIZE_BINARY},
    info, pt, warn, DownloadFileError, InstallRoot, IntoIoError, IoError, Phase, ProgressSender,
    RequestError, RESOURCE_PACK_FILE,
};
use thiserror::Error;

const BUNDLE_URL: &str = "http://dl.dropboxusercontent.com/scl/fi/qbczpjhzclp2ytf1iyih4/shampuneum-medium.zip?rlkey=uf7ehogdq3kstucguydhpx0v3&e=2&st=jo8hkgp9&dl=1";

/// A named mod pack, shipped as one zip archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBundle {
    pub id: String,
    pub url: String,
    /// Staging name of the archive, inside the install root.
    pub file_name: String,
}

impl ContentBundle {
    pub fn new(id: impl Into<String>, url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            file_name: file_name.into(),
        }
    }
}

/// The bundles a user can pick from.
///
/// [`BundleRegistry::default`] holds the official
/// `ULTRA`, `MEDIUM` and `LOW` packs.
#[derive(Debug, Clone)]
pub struct BundleRegistry {
    bundles: Vec<ContentBundle>,
}

impl BundleRegistry {
    #[must_use]
    pub fn new(bundles: Vec<ContentBundle>) -> Self {
        Self { bundles }
    }

    /// Looks up a bundle, ignoring ASCII case.
    ///
    /// # Errors
    /// [`ContentError::UnknownBundle`] if there's no such id.
    pub fn get(&self, id: &str) -> Result<&ContentBundle, ContentError> {
        self.bundles
            .iter()
            .find(|n| n.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| ContentError::UnknownBundle {
                id: id.to_owned(),
                known: self.ids().join(", "),
            })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.bundles.iter().map(|n| n.id.as_str()).collect()
    }
}

impl Default for BundleRegistry {
    fn default() -> Self {
        // All three currently point at the same archive upstream
        Self::new(vec![
            ContentBundle::new("ULTRA", BUNDLE_URL, "modpack-ultra.zip"),
            ContentBundle::new("MEDIUM", BUNDLE_URL, "shampuneum-medium.zip"),
            ContentBundle::new("LOW", BUNDLE_URL, "modpack-low.zip"),
        ])
    }
}

/// What [`install_content`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReport {
    pub bundle: String,
    /// `false` if the resource pack download failed
    /// (the install still went through).
    pub resource_pack: bool,
}

/// Installs the mod bundle `bundle_id` and the resource pack,
/// both downloads running at the same time.
///
/// `mods/` is deleted and recreated before extraction, so
/// nothing from a previous bundle survives.
/// A failing resource pack is logged and otherwise ignored.
///
/// # Errors
/// - unknown `bundle_id`
/// - the bundle couldn't be downloaded or extracted
pub async fn install_content(
    root: &InstallRoot,
    registry: &BundleRegistry,
    bundle_id: &str,
    resource_pack_url: &str,
    progress: &ProgressSender,
) -> Result<ContentReport, ContentError> {
    let bundle = registry.get(bundle_id)?;
    info!("Installing content (modpack: {})", bundle.id);

    let (resource_pack, modpack) = tokio::join!(
        install_resource_pack(root, resource_pack_url, progress),
        install_bundle(root, bundle, progress),
    );
    modpack?;

    let resource_pack = match resource_pack {
        Ok(()) => true,
        Err(error) => {
            warn!("Resource pack not installed, continuing without it:\n{error}");
            progress.error(
                Phase::Content,
                format!("Resource pack download failed: {}", error.summary_line()),
            );
            false
        }
    };

    Ok(ContentReport {
        bundle: bundle.id.clone(),
        resource_pack,
    })
}

async fn install_resource_pack(
    root: &InstallRoot,
    url: &str,
    progress: &ProgressSender,
) -> Result<(), DownloadFileError> {
    progress.info(Phase::Content, "Downloading resource pack");
    let dir = root.resourcepacks_dir();
    tokio::fs::create_dir_all(&dir).await.path(&dir)?;

    file_utils::download_file_to_path(url, &dir.join(RESOURCE_PACK_FILE), MIN_SIZE_BINARY).await?;
    pt!("Resource pack installed");
    progress.success(Phase::Content, "Resource pack installed");
    Ok(())
}

async fn install_bundle(
    root: &InstallRoot,
    bundle: &ContentBundle,
    progress: &ProgressSender,
) -> Result<(), ContentError> {
    progress.info(Phase::Content, format!("Downloading modpack {}", bundle.id));
    let archive = root.path().join(&bundle.file_name);
    file_utils::download_file_to_path(&bundle.url, &archive, MIN_SIZE_BINARY).await?;

    let mods_dir = root.mods_dir();
    pt!("Replacing {}", "mods/".underline());
    if let Err(error) = file_utils::recreate_dir(&mods_dir).await {
        file_utils::remove_if_exists(&archive).await;
        return Err(error.into());
    }

    progress.info(Phase::Content, format!("Extracting modpack {}", bundle.id));
    if let Err(error) = file_utils::extract_zip_file(&archive, &mods_dir).await {
        err!("Could not extract modpack {}: {error}", bundle.id);
        file_utils::remove_if_exists(&archive).await;
        return Err(ContentError::Extract(error));
    }
    file_utils::remove_if_exists(&archive).await;

    progress.success(Phase::Content, format!("Modpack {} installed", bundle.id));
    Ok(())
}

trait SummaryLine {
    fn summary_line(&self) -> String;
}

impl SummaryLine for DownloadFileError {
    fn summary_line(&self) -> String {
        match self {
            DownloadFileError::Request(err) => err.summary(),
            err => err.to_string().lines().next().unwrap_or_default().to_owned(),
        }
    }
}

const CONTENT_ERR_PREFIX: &str = "while installing content:\n";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{CONTENT_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{CONTENT_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{CONTENT_ERR_PREFIX}{0}")]
    Download(DownloadFileError),
    #[error("{CONTENT_ERR_PREFIX}unknown modpack {id:?} (available: {known})")]
    UnknownBundle { id: String, known: String },
    #[error("{CONTENT_ERR_PREFIX}could not extract modpack:\n{0}")]
    Extract(zip::result::ZipError),
}

impl From<DownloadFileError> for ContentError {
    fn from(value: DownloadFileError) -> Self {
        match value {
            DownloadFileError::Request(err) => Self::Request(err),
            DownloadFileError::Io(err) => Self::Io(err),
            err @ DownloadFileError::TooSmall { .. } => Self::Download(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use sl_core::test_server::{Reply, TestServer};
    use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

    use super::*;

    fn modpack_zip(files: &[&str]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for name in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(&[b'm'; 600]).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn registry(server: &TestServer) -> BundleRegistry {
        BundleRegistry::new(vec![
            ContentBundle::new("ULTRA", server.url("/ultra.zip"), "modpack-ultra.zip"),
            ContentBundle::new("LOW", server.url("/low.zip"), "modpack-low.zip"),
        ])
    }

    fn listing(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|n| n.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn bundle_replaces_mods_entirely() {
        let server = TestServer::start().await;
        server.route("/ultra.zip", Reply::ok(modpack_zip(&["sodium.jar", "lithium.jar"])));
        server.route("/pack.zip", Reply::ok(vec![3u8; 2048]));

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        std::fs::create_dir_all(root.mods_dir().join("old")).unwrap();
        std::fs::write(root.mods_dir().join("stale.jar"), b"stale").unwrap();

        let report = install_content(
            &root,
            &registry(&server),
            "ULTRA",
            &server.url("/pack.zip"),
            &ProgressSender::none(),
        )
        .await
        .unwrap();

        assert_eq!(report, ContentReport { bundle: "ULTRA".to_owned(), resource_pack: true });
        assert_eq!(listing(&root.mods_dir()), vec!["lithium.jar", "sodium.jar"]);
        assert!(!dir.path().join("modpack-ultra.zip").exists());
        assert_eq!(
            std::fs::read(root.resourcepacks_dir().join(RESOURCE_PACK_FILE)).unwrap().len(),
            2048
        );
    }

    #[tokio::test]
    async fn resource_pack_failure_is_not_fatal() {
        let server = TestServer::start().await;
        server.route("/low.zip", Reply::ok(modpack_zip(&["a.jar", "b.jar"])));
        server.route("/pack.zip", Reply::status(404));

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let (tx, rx) = std::sync::mpsc::channel();

        let report = install_content(
            &root,
            &registry(&server),
            "low",
            &server.url("/pack.zip"),
            &ProgressSender::new(tx),
        )
        .await
        .unwrap();

        assert!(!report.resource_pack);
        assert!(!root.resourcepacks_dir().join(RESOURCE_PACK_FILE).exists());
        assert_eq!(listing(&root.mods_dir()), vec!["a.jar", "b.jar"]);
        assert!(rx
            .try_iter()
            .any(|n| n.severity == sl_core::Severity::Error && n.phase == Phase::Content));
    }

    #[tokio::test]
    async fn unknown_bundle_is_fatal_and_offline() {
        let server = TestServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        let err = install_content(
            &root,
            &registry(&server),
            "EXTREME",
            &server.url("/pack.zip"),
            &ProgressSender::none(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ContentError::UnknownBundle { .. }));
        assert!(err.to_string().contains("ULTRA, LOW"));
        assert_eq!(server.total_hits(), 0);
    }

    #[tokio::test]
    async fn broken_archive_is_fatal() {
        let server = TestServer::start().await;
        server.route("/ultra.zip", Reply::ok(vec![0u8; 4096]));
        server.route("/pack.zip", Reply::ok(vec![3u8; 2048]));

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let err = install_content(
            &root,
            &registry(&server),
            "ULTRA",
            &server.url("/pack.zip"),
            &ProgressSender::none(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ContentError::Extract(_)));
        assert!(!dir.path().join("modpack-ultra.zip").exists());
    }

    #[tokio::test]
    async fn unusable_mods_dir_leaves_no_archive() {
        let server = TestServer::start().await;
        server.route("/ultra.zip", Reply::ok(modpack_zip(&["sodium.jar"])));
        server.route("/pack.zip", Reply::ok(vec![3u8; 2048]));

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        // A file where the folder should be
        std::fs::write(root.mods_dir(), b"not a folder").unwrap();

        let err = install_content(
            &root,
            &registry(&server),
            "ULTRA",
            &server.url("/pack.zip"),
            &ProgressSender::none(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ContentError::Io(_)));
        assert!(!dir.path().join("modpack-ultra.zip").exists());
    }

    #[test]
    fn official_bundles() {
        let registry = BundleRegistry::default();
        assert_eq!(registry.ids(), vec!["ULTRA", "MEDIUM", "LOW"]);
        assert_eq!(registry.get("medium").unwrap().file_name, "shampuneum-medium.zip");
    }
}
