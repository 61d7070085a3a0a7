use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    file_utils::exists,
    IntoIoError, IoError, FABRIC_LOADER_VERSION, GAME_VERSION,
};

/// Entries at the top of the launcher folder that
/// belong to the launcher itself, not to the game.
/// [`InstallRoot::cleanup`] leaves them alone.
const LAUNCHER_OWNED: &[&str] = &["config.json", "logs"];

/// The id of the version Fabric derives from a base version.
///
/// `fabric_version_id("0.16.14", "1.21.8")` is `fabric-loader-0.16.14-1.21.8`.
#[must_use]
pub fn fabric_version_id(loader_version: &str, game_version: &str) -> String {
    format!("fabric-loader-{loader_version}-{game_version}")
}

/// The directory holding one complete game installation.
///
/// ```txt
/// root/
///     versions/<id>/<id>.jar
///     versions/<id>/<id>.json
///     libraries/...
///     mods/
///     resourcepacks/
///     config/
///     java/
///     options.txt
///     servers.dat
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    #[must_use]
    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    #[must_use]
    pub fn version_jar(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{id}.jar"))
    }

    #[must_use]
    pub fn version_json(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{id}.json"))
    }

    #[must_use]
    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    #[must_use]
    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    #[must_use]
    pub fn resourcepacks_dir(&self) -> PathBuf {
        self.root.join("resourcepacks")
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    #[must_use]
    pub fn java_dir(&self) -> PathBuf {
        self.root.join("java")
    }

    #[must_use]
    pub fn options_file(&self) -> PathBuf {
        self.root.join("options.txt")
    }

    #[must_use]
    pub fn servers_file(&self) -> PathBuf {
        self.root.join("servers.dat")
    }

    /// A version is present iff both its
    /// `.jar` and `.json` exist.
    pub async fn verify_version(&self, id: &str) -> bool {
        exists(self.version_jar(id)).await && exists(self.version_json(id)).await
    }

    /// Which versions are present, and whether the
    /// full client (base + Fabric) is installed.
    pub async fn status(&self) -> InstallStatus {
        let mut versions_available = Vec::new();
        if let Ok(mut dir) = tokio::fs::read_dir(self.versions_dir()).await {
            while let Ok(Some(entry)) = dir.next_entry().await {
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                if self.verify_version(&name).await {
                    versions_available.push(name);
                }
            }
        }
        versions_available.sort();

        let fabric = fabric_version_id(FABRIC_LOADER_VERSION, GAME_VERSION);
        let client_installed = versions_available.iter().any(|n| n == GAME_VERSION)
            && versions_available.contains(&fabric);

        InstallStatus {
            client_installed,
            versions_available,
            root: self.root.clone(),
        }
    }

    /// Deletes every game file under the root.
    ///
    /// The launcher's own settings and logs stay.
    ///
    /// # Errors
    /// If some entry couldn't be removed.
    pub async fn cleanup(&self) -> Result<(), IoError> {
        if !exists(&self.root).await {
            return Ok(());
        }

        let mut dir = tokio::fs::read_dir(&self.root).await.dir(&self.root)?;
        while let Some(entry) = dir.next_entry().await.dir(&self.root)? {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|n| LAUNCHER_OWNED.contains(&n))
            {
                continue;
            }
            let path = entry.path();
            if entry.file_type().await.path(&path)?.is_dir() {
                tokio::fs::remove_dir_all(&path).await.path(&path)?;
            } else {
                tokio::fs::remove_file(&path).await.path(&path)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallStatus {
    pub client_installed: bool,
    pub versions_available: Vec<String>,
    pub root: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn version_needs_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        touch(&root.version_jar("1.21.8"));
        assert!(!root.verify_version("1.21.8").await);
        touch(&root.version_json("1.21.8"));
        assert!(root.verify_version("1.21.8").await);
    }

    #[tokio::test]
    async fn status_needs_the_fabric_version() {
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        assert!(!root.status().await.client_installed);

        touch(&root.version_jar(GAME_VERSION));
        touch(&root.version_json(GAME_VERSION));
        touch(&root.version_json("half-done"));
        let status = root.status().await;
        assert!(!status.client_installed);
        assert_eq!(status.versions_available, vec![GAME_VERSION.to_owned()]);

        let fabric = fabric_version_id(FABRIC_LOADER_VERSION, GAME_VERSION);
        touch(&root.version_jar(&fabric));
        touch(&root.version_json(&fabric));
        assert!(root.status().await.client_installed);
    }

    #[tokio::test]
    async fn cleanup_keeps_launcher_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        touch(&root.version_jar(GAME_VERSION));
        touch(&root.mods_dir().join("a.jar"));
        touch(&root.options_file());
        touch(&dir.path().join("config.json"));
        touch(&dir.path().join("logs/today.log"));

        root.cleanup().await.unwrap();

        let mut left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|n| n.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left, vec!["config.json", "logs"]);
    }

    #[test]
    fn fabric_ids() {
        assert_eq!(
            fabric_version_id("0.16.14", "1.21.8"),
            "fabric-loader-0.16.14-1.21.8"
        );
    }
}
