//! Packing a container filesystem into an image archive.
//!
//! The output is a gzip-compressed tar whose entries are relative to the
//! container root, so it can be dropped into the image store and used as
//! the read-only layer of new containers.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use shipyard_common::error::{Result, ShipyardError};

/// Archives the contents of `source` into `archive_path`.
///
/// The archive is written next to its destination first and renamed into
/// place once complete. Symlinks are stored as links. Returns the size of the
/// archive in bytes.
///
/// # Errors
///
/// Returns an error if `source` is not a directory or if writing fails.
pub fn commit_directory(source: &Path, archive_path: &Path) -> Result<u64> {
    if !source.is_dir() {
        return Err(ShipyardError::NotFound {
            kind: "container filesystem",
            id: source.display().to_string(),
        });
    }
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ShipyardError::io(parent, e))?;
    }

    let partial = archive_path.with_extension("partial");
    let file = File::create(&partial).map_err(|e| ShipyardError::io(&partial, e))?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let written = builder
        .append_dir_all(".", source)
        .and_then(|()| builder.into_inner())
        .and_then(flate2::write::GzEncoder::finish)
        .and_then(|mut file| file.flush().map(|()| file));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(ShipyardError::io(source, e));
    }

    std::fs::rename(&partial, archive_path).map_err(|e| ShipyardError::io(archive_path, e))?;
    let size = std::fs::metadata(archive_path)
        .map_err(|e| ShipyardError::io(archive_path, e))?
        .len();
    tracing::info!(
        source = %source.display(),
        archive = %archive_path.display(),
        size,
        "container committed"
    );
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_archive_extracts_to_the_same_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rootfs = dir.path().join("rootfs");
        std::fs::create_dir_all(rootfs.join("etc")).expect("mkdir");
        std::fs::write(rootfs.join("etc/hostname"), "c1\n").expect("write");

        let archive = dir.path().join("images/snapshot.tar");
        let size = commit_directory(&rootfs, &archive).expect("commit");
        assert!(size > 0);
        assert!(!archive.with_extension("partial").exists());

        let out = dir.path().join("out");
        let layer = crate::layer::extract_layer(&archive, &out).expect("extract");
        assert!(layer.compressed);
        assert_eq!(
            std::fs::read_to_string(out.join("etc/hostname")).expect("read"),
            "c1\n"
        );
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = commit_directory(&dir.path().join("nope"), &dir.path().join("x.tar"));
        assert!(matches!(result, Err(ShipyardError::NotFound { .. })));
    }
}
