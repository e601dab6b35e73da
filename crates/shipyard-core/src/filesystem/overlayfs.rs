//! `OverlayFS` management for layered container filesystems.
//!
//! Stacks a read-only image layer with a per-container writable upper
//! layer, giving every container copy-on-write access to a shared image.

use std::path::PathBuf;

use shipyard_common::error::{Result, ShipyardError};

/// Configuration for an `OverlayFS` mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Read-only lower layers (bottom to top).
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Work directory required by `OverlayFS`, on the same filesystem as
    /// the upper layer.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

impl OverlayConfig {
    /// Renders the `mount(2)` data string for this overlay.
    ///
    /// Lower layers are listed top-most first, as the kernel expects.
    #[must_use]
    pub fn options(&self) -> String {
        let lowers = self
            .lower_dirs
            .iter()
            .rev()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        format!(
            "lowerdir={},upperdir={},workdir={}",
            lowers,
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }
}

/// Mounts an `OverlayFS` with the given configuration.
///
/// All directories must already exist.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_overlay(config: &OverlayConfig) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let opts = config.options();
    mount(
        Some("overlay"),
        &config.merged_dir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| ShipyardError::Mount {
        target: config.merged_dir.clone(),
        message: format!("overlay mount failed: {e}"),
    })?;

    tracing::info!(merged = %config.merged_dir.display(), "overlayfs mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; `OverlayFS` mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_overlay(config: &OverlayConfig) -> Result<()> {
    Err(ShipyardError::Mount {
        target: config.merged_dir.clone(),
        message: "Linux required for native container operations".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_list_layers_in_kernel_order() {
        let config = OverlayConfig {
            lower_dirs: vec!["/l/base".into(), "/l/top".into()],
            upper_dir: "/w/c1".into(),
            work_dir: "/work/c1".into(),
            merged_dir: "/mnt/c1".into(),
        };
        assert_eq!(
            config.options(),
            "lowerdir=/l/top:/l/base,upperdir=/w/c1,workdir=/work/c1"
        );
    }
}
