//! Layers the mod loader and the curated content
//! on top of a resolved base version.
//!
//! - [`loaders::fabric`]: the Fabric profile, its libraries,
//!   and the derived version directory
//! - [`content`]: the mod bundle and the resource pack

pub mod content;
pub mod loaders;

pub use content::{install_content, BundleRegistry, ContentBundle, ContentError, ContentReport};
