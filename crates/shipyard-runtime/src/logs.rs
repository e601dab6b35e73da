//! Container log management.
//!
//! Detached containers write their stdout to `<run_dir>/<name>/container.log`.

use std::fs::File;
use std::path::{Path, PathBuf};

use shipyard_common::constants::CONTAINER_LOG_FILE;
use shipyard_common::error::{Result, ShipyardError};

/// Returns the log file path for a container.
#[must_use]
pub fn log_path(run_dir: &Path, name: &str) -> PathBuf {
    run_dir.join(name).join(CONTAINER_LOG_FILE)
}

/// Creates (or truncates) a container's log file, creating its directory.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn create_log_file(run_dir: &Path, name: &str) -> Result<File> {
    let path = log_path(run_dir, name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ShipyardError::io(parent, e))?;
    }
    File::create(&path).map_err(|e| ShipyardError::io(path, e))
}

/// Reads container logs from disk.
///
/// Returns an empty string if the log file does not exist, which is the
/// case for containers started with a terminal.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(run_dir: &Path, name: &str) -> Result<String> {
    let path = log_path(run_dir, name);
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(&path).map_err(|e| ShipyardError::io(path, e))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn log_path_is_constructed_correctly() {
        let p = log_path(Path::new("/var/run/shipyard"), "c1");
        assert_eq!(p.to_str().unwrap(), "/var/run/shipyard/c1/container.log");
    }

    #[test]
    fn read_logs_missing_file_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = read_logs(dir.path(), "nonexistent").expect("should succeed");
        assert!(content.is_empty());
    }

    #[test]
    fn created_log_is_readable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = create_log_file(dir.path(), "c1").expect("create");
        writeln!(file, "hi").expect("write");
        drop(file);

        assert!(dir.path().join("c1").is_dir());
        assert_eq!(read_logs(dir.path(), "c1").expect("read"), "hi\n");
    }

    #[test]
    fn separate_containers_have_separate_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        write!(create_log_file(dir.path(), "a").expect("a"), "from a").expect("write a");
        write!(create_log_file(dir.path(), "b").expect("b"), "from b").expect("write b");

        assert_eq!(read_logs(dir.path(), "a").expect("read a"), "from a");
        assert_eq!(read_logs(dir.path(), "b").expect("read b"), "from b");
    }
}
