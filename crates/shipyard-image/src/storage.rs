//! Local storage of image archives and their extracted layers.
//!
//! Archives live at `<root>/<image>.tar`; each is unpacked once into
//! `<layers>/<image>` and shared read-only by every container of that image.

use std::path::{Path, PathBuf};

use shipyard_common::constants::IMAGE_ARCHIVE_EXTENSION;
use shipyard_common::error::{Result, ShipyardError};

use crate::layer;

/// Manages image archives and the read-only layers extracted from them.
#[derive(Debug, Clone)]
pub struct ImageStore {
    /// Directory holding `<image>.tar` archives.
    root: PathBuf,
    /// Directory holding one extracted layer per image.
    layers: PathBuf,
}

impl ImageStore {
    /// Opens the store rooted at `root`, extracting layers below `layers`.
    #[must_use]
    pub fn open(root: impl Into<PathBuf>, layers: impl Into<PathBuf>) -> Self {
        let store = Self {
            root: root.into(),
            layers: layers.into(),
        };
        tracing::debug!(
            root = %store.root.display(),
            layers = %store.layers.display(),
            "opened image store"
        );
        store
    }

    /// Returns the path of an image's archive.
    #[must_use]
    pub fn archive_path(&self, image: &str) -> PathBuf {
        self.root.join(format!("{image}.{IMAGE_ARCHIVE_EXTENSION}"))
    }

    /// Returns the path of an image's extracted layer.
    #[must_use]
    pub fn layer_path(&self, image: &str) -> PathBuf {
        self.layers.join(image)
    }

    /// Checks whether an image's layer has been extracted.
    #[must_use]
    pub fn has_layer(&self, image: &str) -> bool {
        self.layer_path(image).is_dir()
    }

    /// Returns the image's layer, extracting the archive if the layer
    /// directory does not exist yet.
    ///
    /// An existing layer directory is trusted as-is. A failed extraction
    /// removes the partial directory so the next call starts over.
    ///
    /// # Errors
    ///
    /// Returns an error if the image name is invalid, the archive is missing,
    /// or extraction fails.
    pub fn ensure_layer(&self, image: &str) -> Result<PathBuf> {
        validate_image_name(image)?;
        let path = self.layer_path(image);
        if path.is_dir() {
            tracing::debug!(image, path = %path.display(), "image layer already extracted");
            return Ok(path);
        }

        let archive = self.archive_path(image);
        if !archive.is_file() {
            return Err(ShipyardError::NotFound {
                kind: "image archive",
                id: archive.display().to_string(),
            });
        }

        if let Err(e) = layer::extract_layer(&archive, &path) {
            if let Err(cleanup) = std::fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial layer");
            }
            return Err(e);
        }
        tracing::info!(image, path = %path.display(), "image layer ready");
        Ok(path)
    }

    /// Returns the archive root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Rejects names that would escape the store directories.
///
/// # Errors
///
/// Returns an error if the name is empty, contains a path separator, or is
/// a relative path component.
pub fn validate_image_name(image: &str) -> Result<()> {
    if image.is_empty() || image.contains('/') || image == "." || image == ".." {
        return Err(ShipyardError::Config {
            message: format!("invalid image name: {image:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::tests::write_tar;

    fn store(dir: &Path) -> ImageStore {
        ImageStore::open(dir, dir.join("layers"))
    }

    #[test]
    fn paths_follow_the_store_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        assert_eq!(store.archive_path("busybox"), dir.path().join("busybox.tar"));
        assert_eq!(store.layer_path("busybox"), dir.path().join("layers/busybox"));
        assert_eq!(store.root(), dir.path());
    }

    #[test]
    fn ensure_layer_extracts_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        write_tar(&store.archive_path("busybox"), true, &[("bin/sh", b"#!")]);

        let first = store.ensure_layer("busybox").expect("first extraction");
        assert!(first.join("bin/sh").exists());

        // With the archive gone a second extraction would fail: success
        // proves the existing layer was reused.
        std::fs::remove_file(store.archive_path("busybox")).expect("rm archive");
        std::fs::write(first.join("marker"), "kept").expect("marker");
        let second = store.ensure_layer("busybox").expect("second call");
        assert_eq!(first, second);
        assert!(second.join("marker").exists());
    }

    #[test]
    fn missing_archive_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = store(dir.path()).ensure_layer("ghost").unwrap_err();
        assert!(matches!(err, ShipyardError::NotFound { kind: "image archive", .. }));
        assert!(!store(dir.path()).has_layer("ghost"));
    }

    #[test]
    fn corrupt_archive_leaves_no_layer_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        std::fs::write(store.archive_path("broken"), b"\x1f\x8bnot really gzip").expect("write");
        assert!(store.ensure_layer("broken").is_err());
        assert!(!store.has_layer("broken"));
    }

    #[test]
    fn image_names_cannot_escape() {
        assert!(validate_image_name("../etc").is_err());
        assert!(validate_image_name("").is_err());
        assert!(validate_image_name("busybox").is_ok());
    }
}
