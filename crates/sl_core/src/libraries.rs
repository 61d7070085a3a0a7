use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use owo_colors::OwoColorize;

use crate::{
    do_jobs,
    file_utils::{self, exists, MIN_SIZE_GENERIC},
    json::LibraryArtifact,
    pt, DownloadFileError, IntoIoError, Phase, ProgressSender,
};

/// Downloads every artifact into `libraries_dir`, concurrently.
///
/// Artifacts already on disk are skipped. The first failure aborts
/// the whole batch, the rest of the in-flight downloads are dropped.
///
/// Returns how many files were actually fetched.
///
/// # Errors
/// Whatever the first failing download hit.
pub async fn download_libraries(
    libraries_dir: &Path,
    artifacts: Vec<LibraryArtifact>,
    phase: Phase,
    progress: &ProgressSender,
) -> Result<usize, DownloadFileError> {
    tokio::fs::create_dir_all(libraries_dir)
        .await
        .path(libraries_dir)?;

    let total = artifacts.len();
    let done = AtomicUsize::new(0);
    let fetched = AtomicUsize::new(0);

    do_jobs(artifacts.iter().map(|artifact| {
        download_library(libraries_dir, artifact, total, &done, &fetched)
    }))
    .await?;

    let fetched = fetched.load(Ordering::SeqCst);
    progress.info(
        phase,
        format!("Libraries ready ({fetched} downloaded, {} already present)", total - fetched),
    );
    Ok(fetched)
}

async fn download_library(
    libraries_dir: &Path,
    artifact: &LibraryArtifact,
    total: usize,
    done: &AtomicUsize,
    fetched: &AtomicUsize,
) -> Result<(), DownloadFileError> {
    let path = libraries_dir.join(&artifact.path);

    if !exists(&path).await {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.path(parent)?;
        }
        file_utils::download_file_to_path(&artifact.url, &path, MIN_SIZE_GENERIC).await?;
        fetched.fetch_add(1, Ordering::SeqCst);
    }

    let i = done.fetch_add(1, Ordering::SeqCst) + 1;
    pt!("{} ({i}/{total}) {}", "Library".underline(), artifact.path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Reply, TestServer};

    fn artifact(server: &TestServer, name: &str) -> LibraryArtifact {
        LibraryArtifact {
            path: format!("org/example/{name}/1.0/{name}-1.0.jar"),
            url: server.url(&format!("/{name}.jar")),
        }
    }

    #[tokio::test]
    async fn skips_present_libraries() {
        let server = TestServer::start().await;
        server.route("/a.jar", Reply::ok(vec![1u8; 200]));
        server.route("/b.jar", Reply::ok(vec![2u8; 200]));

        let dir = tempfile::tempdir().unwrap();
        let libs = vec![artifact(&server, "a"), artifact(&server, "b")];
        let present = dir.path().join(&libs[1].path);
        std::fs::create_dir_all(present.parent().unwrap()).unwrap();
        std::fs::write(&present, b"already here").unwrap();

        let fetched = download_libraries(dir.path(), libs.clone(), Phase::Libraries, &ProgressSender::none())
            .await
            .unwrap();

        assert_eq!(fetched, 1);
        assert_eq!(server.hits("/a.jar"), 1);
        assert_eq!(server.hits("/b.jar"), 0);
        assert_eq!(std::fs::read(dir.path().join(&libs[0].path)).unwrap(), vec![1u8; 200]);
    }

    #[tokio::test]
    async fn one_failure_fails_the_batch() {
        let server = TestServer::start().await;
        server.route("/a.jar", Reply::ok(vec![1u8; 200]));
        server.route("/b.jar", Reply::status(500));

        let dir = tempfile::tempdir().unwrap();
        let libs = vec![artifact(&server, "a"), artifact(&server, "b")];
        let err = download_libraries(dir.path(), libs.clone(), Phase::Libraries, &ProgressSender::none())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadFileError::Request(_)));
        assert!(!dir.path().join(&libs[1].path).exists());
    }
}
