//! Filesystem layer extraction.
//!
//! An image is a single tar archive unpacked verbatim into its layer
//! directory. Archives may be gzip-compressed regardless of their file name,
//! so compression is detected from the leading magic bytes.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use shipyard_common::error::{Result, ShipyardError};

/// Leading bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A single extracted filesystem layer.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Directory the archive was unpacked into.
    pub path: PathBuf,
    /// Size of the source archive in bytes.
    pub size_bytes: u64,
    /// Whether the archive was gzip-compressed.
    pub compressed: bool,
}

/// Extracts a tar archive to the target directory.
///
/// Supports plain and gzip-compressed archives. File modes are always
/// preserved. Ownership is preserved only when running as root, since an
/// unprivileged caller cannot `chown`; in that mode entries whose uid/gid
/// fields are not valid numbers are rejected.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacking fails.
pub fn extract_layer(archive_path: &Path, target: &Path) -> Result<Layer> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );

    std::fs::create_dir_all(target).map_err(|e| ShipyardError::io(target, e))?;

    let file = File::open(archive_path).map_err(|e| ShipyardError::io(archive_path, e))?;
    let size_bytes = file
        .metadata()
        .map_err(|e| ShipyardError::io(archive_path, e))?
        .len();

    let mut reader = BufReader::new(file);
    let compressed = is_gzip_stream(&mut reader).map_err(|e| ShipyardError::io(archive_path, e))?;

    let preserve_ownership = nix::unistd::geteuid().is_root();
    if compressed {
        unpack(flate2::read::GzDecoder::new(reader), target, preserve_ownership)?;
    } else {
        unpack(reader, target, preserve_ownership)?;
    }

    tracing::info!(size = size_bytes, compressed, "layer extracted");
    Ok(Layer {
        path: target.to_path_buf(),
        size_bytes,
        compressed,
    })
}

fn unpack<R: Read>(reader: R, target: &Path, preserve_ownership: bool) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(preserve_ownership);
    archive
        .unpack(target)
        .map_err(|e| ShipyardError::io(target, e))
}

/// Peeks at the buffered stream without consuming it.
fn is_gzip_stream<R: Read>(reader: &mut BufReader<R>) -> std::io::Result<bool> {
    let head = reader.fill_buf()?;
    Ok(head.starts_with(&GZIP_MAGIC))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn write_tar(path: &Path, gzip: bool, entries: &[(&str, &[u8])]) {
        let file = File::create(path).expect("failed to create archive");
        if gzip {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            append_entries(&mut builder, entries);
            let encoder = builder.into_inner().expect("failed to finish tar");
            let _ = encoder.finish().expect("failed to finish gzip");
        } else {
            let mut builder = tar::Builder::new(file);
            append_entries(&mut builder, entries);
            builder.finish().expect("failed to finish tar");
        }
    }

    fn append_entries<W: std::io::Write>(builder: &mut tar::Builder<W>, entries: &[(&str, &[u8])]) {
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_uid(u64::from(nix::unistd::geteuid().as_raw()));
            header.set_gid(u64::from(nix::unistd::getegid().as_raw()));
            header.set_cksum();
            builder
                .append_data(&mut header, name, *data)
                .expect("failed to append data");
        }
    }

    #[test]
    fn extract_plain_tar_creates_expected_files() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let tar_path = dir.path().join("plain.tar");
        write_tar(&tar_path, false, &[("bin/hello", b"hello from layer")]);
        let target = dir.path().join("extracted");

        let layer = extract_layer(&tar_path, &target).expect("extract failed");
        assert!(!layer.compressed);
        assert!(layer.size_bytes > 0);
        let content = std::fs::read_to_string(target.join("bin/hello")).expect("read failed");
        assert_eq!(content, "hello from layer");
    }

    #[test]
    fn gzip_is_detected_despite_tar_extension() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let tar_path = dir.path().join("busybox.tar");
        write_tar(&tar_path, true, &[("etc/motd", b"hello from gzipped layer")]);
        let target = dir.path().join("extracted_gz");

        let layer = extract_layer(&tar_path, &target).expect("extract failed");
        assert!(layer.compressed);
        let content = std::fs::read_to_string(target.join("etc/motd")).expect("read failed");
        assert_eq!(content, "hello from gzipped layer");
    }

    #[test]
    fn extract_nonexistent_archive_returns_error() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let result = extract_layer(&dir.path().join("missing.tar"), &dir.path().join("out"));
        assert!(result.is_err());
    }

    /// Raw archive bytes with one file whose uid/gid fields were never set.
    fn blank_ownership_tar() -> Vec<u8> {
        let data = b"blank";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        let mut builder = tar::Builder::new(Vec::new());
        builder
            .append_data(&mut header, "etc/blank", &data[..])
            .expect("failed to append data");
        builder.into_inner().expect("failed to finish tar")
    }

    #[test]
    fn blank_ownership_fields_are_ignored_without_chown() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let archive = blank_ownership_tar();
        unpack(&archive[..], dir.path(), false).expect("unpack failed");
        let content = std::fs::read_to_string(dir.path().join("etc/blank")).expect("read failed");
        assert_eq!(content, "blank");
    }

    #[test]
    fn blank_ownership_fields_are_rejected_when_preserving() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let archive = blank_ownership_tar();
        assert!(unpack(&archive[..], dir.path(), true).is_err());
    }

    #[test]
    fn gzip_magic_peek_does_not_consume_input() {
        let mut reader = BufReader::new(&b"\x1f\x8brest"[..]);
        assert!(is_gzip_stream(&mut reader).unwrap());
        let mut all = Vec::new();
        let _ = reader.read_to_end(&mut all).unwrap();
        assert_eq!(all.len(), 6);
    }
}
