//! Global configuration model for the shipyard runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;

/// Process-wide paths used by every runtime component.
///
/// Built once per invocation and handed to each component at construction,
/// so tests can point the whole runtime at a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base directory for image archives, extracted layers, and writable layers.
    pub root_dir: PathBuf,
    /// Directory under which each container's merged mount point lives.
    pub mnt_dir: PathBuf,
    /// Run-state directory with one record directory per container.
    pub run_dir: PathBuf,
    /// Root of the cgroup hierarchy; controllers are mounted beneath it.
    pub cgroup_root: PathBuf,
    /// Executable re-invoked for the `init` and `exec` sub-commands.
    pub self_exe: PathBuf,
}

impl RuntimeConfig {
    /// Builds a configuration whose data, mount, and run directories all
    /// live below `root`. The cgroup root and executable keep their defaults.
    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            root_dir: root.to_path_buf(),
            mnt_dir: root.join("mnt"),
            run_dir: root.join("run"),
            ..Self::default()
        }
    }

    /// Path of the directory holding extracted image layers.
    #[must_use]
    pub fn layers_dir(&self) -> PathBuf {
        self.root_dir.join(constants::LAYERS_DIR)
    }

    /// Path of the directory holding per-container writable layers.
    #[must_use]
    pub fn write_layer_dir(&self) -> PathBuf {
        self.root_dir.join(constants::WRITE_LAYER_DIR)
    }

    /// Path of the directory holding overlayfs work directories.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.root_dir.join(constants::WORK_DIR)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(constants::DEFAULT_ROOT_DIR),
            mnt_dir: PathBuf::from(constants::DEFAULT_MNT_DIR),
            run_dir: PathBuf::from(constants::DEFAULT_RUN_DIR),
            cgroup_root: PathBuf::from(constants::DEFAULT_CGROUP_ROOT),
            self_exe: PathBuf::from(constants::SELF_EXE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_system_paths() {
        let config = RuntimeConfig::default();
        assert_eq!(config.root_dir, PathBuf::from("/var/lib/shipyard"));
        assert_eq!(config.cgroup_root, PathBuf::from("/sys/fs/cgroup"));
        assert_eq!(config.self_exe, PathBuf::from("/proc/self/exe"));
    }

    #[test]
    fn with_root_relocates_data_directories() {
        let config = RuntimeConfig::with_root("/tmp/yard");
        assert_eq!(config.mnt_dir, PathBuf::from("/tmp/yard/mnt"));
        assert_eq!(config.run_dir, PathBuf::from("/tmp/yard/run"));
        assert_eq!(config.layers_dir(), PathBuf::from("/tmp/yard/layers"));
        assert_eq!(config.write_layer_dir(), PathBuf::from("/tmp/yard/writeLayer"));
        assert_eq!(config.cgroup_root, PathBuf::from("/sys/fs/cgroup"));
    }
}
