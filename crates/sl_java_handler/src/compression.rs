use std::{io::Read, path::Path};

use flate2::read::GzDecoder;

/// Extracts a `.tar.gz` stream into `dest`,
/// keeping the archive's own top-level directory.
///
/// File modes stored in the archive (like the
/// executable bit on `bin/java`) are kept.
pub fn extract_tar_gz(reader: impl Read, dest: &Path) -> std::io::Result<()> {
    let decoder = GzDecoder::new(reader);
    let mut archive = tar::Archive::new(decoder);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(dest)
}
