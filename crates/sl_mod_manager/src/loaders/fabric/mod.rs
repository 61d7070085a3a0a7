//! Installs the Fabric loader on top of an already
//! resolved base version.
//!
//! The result is a derived version `fabric-loader-<loader>-<game>`
//! with its own directory:
//!
//! ```txt
//! versions/fabric-loader-0.16.14-1.21.8/
//!     fabric-loader-0.16.14-1.21.8.json  (the profile, verbatim)
//!     fabric-loader-0.16.14-1.21.8.jar   (copy of the base jar)
//! ```

use owo_colors::OwoColorize;
use sl_core::{
    download_libraries, fabric_version_id, file_utils, info, json::VersionDetails, pt,
    InstallRoot, IntoIoError, Phase, ProgressSender,
};

mod error;
pub use error::FabricInstallError;

/// Where the loader profile for a game/loader pair lives.
#[must_use]
pub fn profile_url(meta_base: &str, game_version: &str, loader_version: &str) -> String {
    let meta_base = meta_base.strip_suffix('/').unwrap_or(meta_base);
    format!("{meta_base}/versions/loader/{game_version}/{loader_version}/profile/json")
}

/// Installs Fabric `loader_version` for the base version `game_version`.
///
/// The base version's jar must already be present.
/// The profile JSON is always re-fetched and rewritten,
/// the jar copy and libraries are skipped if already there.
///
/// Returns the derived version id.
///
/// # Errors
/// - base jar missing ([`FabricInstallError::BaseJarNotFound`])
/// - profile couldn't be fetched or parsed
/// - any library failed to download
pub async fn install_loader(
    root: &InstallRoot,
    meta_base: &str,
    game_version: &str,
    loader_version: &str,
    progress: &ProgressSender,
) -> Result<String, FabricInstallError> {
    let id = fabric_version_id(loader_version, game_version);
    info!("Installing Fabric {loader_version} for {game_version}");
    progress.info(Phase::Loader, format!("Installing Fabric {loader_version}"));

    let base_jar = root.version_jar(game_version);
    if !file_utils::exists(&base_jar).await {
        return Err(FabricInstallError::BaseJarNotFound(base_jar));
    }

    let version_dir = root.version_dir(&id);
    tokio::fs::create_dir_all(&version_dir)
        .await
        .path(&version_dir)?;

    let url = profile_url(meta_base, game_version, loader_version);
    pt!("Fetching profile: {}", url.bright_black());
    let profile_text = file_utils::download_file_to_string(&url).await?;
    let profile = VersionDetails::parse(&profile_text)?;

    let profile_path = root.version_json(&id);
    tokio::fs::write(&profile_path, &profile_text)
        .await
        .path(&profile_path)?;

    let jar = root.version_jar(&id);
    if !file_utils::exists(&jar).await {
        pt!("Copying base jar");
        tokio::fs::copy(&base_jar, &jar).await.path(&jar)?;
    }

    let artifacts: Vec<_> = profile.artifacts().collect();
    pt!("Fabric needs {} libraries", artifacts.len());
    download_libraries(&root.libraries_dir(), artifacts, Phase::Loader, progress).await?;

    info!("Finished installing Fabric ({id})");
    progress.success(Phase::Loader, format!("Fabric {loader_version} installed"));
    Ok(id)
}

#[cfg(test)]
mod tests {
    use sl_core::test_server::{Reply, TestServer};

    use super::*;

    fn profile_json(server: &TestServer) -> String {
        format!(
            r#"{{
                "id": "fabric-loader-0.16.14-1.21.8",
                "inheritsFrom": "1.21.8",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "libraries": [
                    {{"name": "net.fabricmc:fabric-loader:0.16.14", "url": "{}"}}
                ]
            }}"#,
            server.url("/maven/")
        )
    }

    const LOADER_JAR: &str = "/maven/net/fabricmc/fabric-loader/0.16.14/fabric-loader-0.16.14.jar";
    const PROFILE: &str = "/v2/versions/loader/1.21.8/0.16.14/profile/json";

    fn setup_base(root: &InstallRoot) {
        let jar = root.version_jar("1.21.8");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, vec![7u8; 500]).unwrap();
    }

    #[tokio::test]
    async fn derives_a_self_contained_version() {
        let server = TestServer::start().await;
        server.route(PROFILE, Reply::ok(profile_json(&server)));
        server.route(LOADER_JAR, Reply::ok(vec![1u8; 300]));

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        setup_base(&root);

        let id = install_loader(&root, &server.url("/v2"), "1.21.8", "0.16.14", &ProgressSender::none())
            .await
            .unwrap();

        assert_eq!(id, "fabric-loader-0.16.14-1.21.8");
        assert!(root.verify_version(&id).await);
        assert_eq!(std::fs::read(root.version_jar(&id)).unwrap(), vec![7u8; 500]);
        assert_eq!(
            std::fs::read_to_string(root.version_json(&id)).unwrap(),
            profile_json(&server)
        );
        assert!(root
            .libraries_dir()
            .join("net/fabricmc/fabric-loader/0.16.14/fabric-loader-0.16.14.jar")
            .exists());

        // Profile is refreshed, libraries are not
        install_loader(&root, &server.url("/v2"), "1.21.8", "0.16.14", &ProgressSender::none())
            .await
            .unwrap();
        assert_eq!(server.hits(PROFILE), 2);
        assert_eq!(server.hits(LOADER_JAR), 1);
    }

    #[tokio::test]
    async fn missing_base_jar_is_fatal() {
        let server = TestServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        let err = install_loader(&root, &server.url("/v2"), "1.21.8", "0.16.14", &ProgressSender::none())
            .await
            .unwrap_err();
        assert!(matches!(err, FabricInstallError::BaseJarNotFound(_)));
        assert_eq!(server.total_hits(), 0);
    }

    #[test]
    fn profile_urls() {
        assert_eq!(
            profile_url("https://meta.fabricmc.net/v2/", "1.21.8", "0.16.14"),
            "https://meta.fabricmc.net/v2/versions/loader/1.21.8/0.16.14/profile/json"
        );
    }
}
