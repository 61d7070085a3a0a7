pub mod manifest;
pub mod version;

pub use manifest::Manifest;
pub use version::{LibraryArtifact, VersionDetails};
