use serde::Deserialize;

use crate::{file_utils, JsonDownloadError};

/// An official Minecraft version manifest
/// (list of all versions and their descriptor links)
#[derive(Deserialize, Clone, Debug)]
pub struct Manifest {
    pub versions: Vec<Version>,
}

impl Manifest {
    /// Downloads the manifest index from `url`.
    ///
    /// This is a single request, there's no caching:
    /// every install sees the current upstream state.
    ///
    /// # Errors
    /// Returns an error if the file cannot be downloaded or parsed into JSON.
    pub async fn download(url: &str) -> Result<Manifest, JsonDownloadError> {
        file_utils::download_file_to_json(url).await
    }

    /// Looks up a version by its name.
    /// This searches for an *exact match*.
    #[must_use]
    pub fn find_name(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|n| n.id == name)
    }
}

#[allow(non_snake_case)]
#[derive(Deserialize, Clone, Debug)]
pub struct Version {
    pub id: String,
    #[serde(default)]
    pub r#type: String,
    /// Where the version descriptor JSON lives.
    pub url: String,
    pub releaseTime: Option<String>,
}
