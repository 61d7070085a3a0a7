use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::IntoJsonError;

/// A version descriptor (`versions/<id>/<id>.json`).
///
/// Only the fields the installer needs are modelled here.
/// The file on disk is always the untouched upstream JSON,
/// this struct is never written back.
#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VersionDetails {
    /// Name of the version.
    pub id: String,
    /// Where to download the client jar.
    /// Absent in derived (loader) descriptors.
    pub downloads: Option<Downloads>,
    /// Library dependencies of the version that need to be downloaded.
    #[serde(default)]
    pub libraries: Vec<Library>,
    /// Which is the main class in the jar that has the main function.
    pub mainClass: Option<String>,
    /// Set by loader profiles: the base version they layer on.
    pub inheritsFrom: Option<String>,
    #[serde(default)]
    pub r#type: String,
}

impl VersionDetails {
    /// Parses a descriptor from raw text.
    ///
    /// # Errors
    /// If `text` isn't a valid descriptor.
    pub fn parse(text: &str) -> Result<Self, crate::JsonError> {
        serde_json::from_str(text).json(text.to_owned())
    }

    #[must_use]
    pub fn client_url(&self) -> Option<&str> {
        self.downloads.as_ref().map(|n| n.client.url.as_str())
    }

    /// Every library that has something to download.
    ///
    /// OS `rules` are not evaluated: natives for other
    /// platforms are fetched too and simply never loaded.
    pub fn artifacts(&self) -> impl Iterator<Item = LibraryArtifact> + '_ {
        self.libraries.iter().filter_map(Library::get_artifact)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Downloads {
    pub client: Download,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Download {
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub url: String,
}

/// A library entry.
///
/// Vanilla descriptors carry `downloads.artifact { url, path }`,
/// loader profiles carry a maven `name` plus a repository `url`.
/// Both shapes end up as a [`LibraryArtifact`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Library {
    pub name: Option<String>,
    pub downloads: Option<LibraryDownloads>,
    pub url: Option<String>,
}

impl Library {
    #[must_use]
    pub fn get_artifact(&self) -> Option<LibraryArtifact> {
        if let Some(artifact) = self.downloads.as_ref().and_then(|n| n.artifact.as_ref()) {
            return Some(LibraryArtifact {
                path: artifact.get_path(),
                url: artifact.url.clone(),
            });
        }

        let (name, repo) = (self.name.as_ref()?, self.url.as_ref()?);
        let path = maven_path(name)?;
        let repo = repo.strip_suffix('/').unwrap_or(repo);
        Some(LibraryArtifact {
            url: format!("{repo}/{path}"),
            path,
        })
    }
}

/// `group:artifact:version[:classifier]` to a relative jar path.
///
/// `net.fabricmc:fabric-loader:0.16.14` becomes
/// `net/fabricmc/fabric-loader/0.16.14/fabric-loader-0.16.14.jar`
#[must_use]
pub fn maven_path(name: &str) -> Option<String> {
    let mut parts = name.split(':');
    let group = parts.next()?;
    let artifact = parts.next()?;
    let version = parts.next()?;
    let classifier = parts.next();

    let file = match classifier {
        Some(c) => format!("{artifact}-{version}-{c}.jar"),
        None => format!("{artifact}-{version}.jar"),
    };
    Some(format!(
        "{}/{artifact}/{version}/{file}",
        group.replace('.', "/")
    ))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LibraryDownloads {
    pub artifact: Option<LibraryDownloadArtifact>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct LibraryDownloadArtifact {
    pub path: Option<String>,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub url: String,
}

impl Debug for LibraryDownloadArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("LibraryDownloadArtifact");
        if let Some(path) = &self.path {
            s.field("path", path);
        }
        s.field("url", &self.url);
        s.finish_non_exhaustive()
    }
}

impl LibraryDownloadArtifact {
    #[must_use]
    pub fn get_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| {
            // https://libraries.minecraft.net/net/java/jinput/jinput/2.0.5/jinput-2.0.5.jar
            // -> libraries.minecraft.net/net/java/jinput/jinput/2.0.5/jinput-2.0.5.jar
            let url = self
                .url
                .strip_prefix("https://")
                .or(self.url.strip_prefix("http://"))
                .unwrap_or(&self.url);

            // -> net/java/jinput/jinput/2.0.5/jinput-2.0.5.jar
            if let Some(pos) = url.find('/') {
                url[pos + 1..].to_string()
            } else {
                url.to_string()
            }
        })
    }
}

/// A downloadable library: where it comes from and
/// where it goes, relative to `libraries/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryArtifact {
    pub path: String,
    pub url: String,
}
