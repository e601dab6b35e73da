//! Mount utilities for container filesystem setup.
//!
//! Covers bind mounts for volumes, detaching unmounts, private mount
//! propagation, and `/proc` inside the container's namespaces.
//! Host-side mounts go through the [`Mounter`] trait so the workspace logic
//! can run against a recording implementation in tests.

use std::fmt;
use std::path::Path;

use shipyard_common::error::{Result, ShipyardError};

use super::overlayfs::OverlayConfig;

/// Mount operations performed on behalf of a container workspace.
pub trait Mounter: fmt::Debug {
    /// Mounts an overlay filesystem described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_overlay(&self, config: &OverlayConfig) -> Result<()>;

    /// Bind-mounts `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()>;

    /// Unmounts whatever is mounted at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// [`Mounter`] issuing real `mount(2)`/`umount2(2)` syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyscallMounter;

impl Mounter for SyscallMounter {
    fn mount_overlay(&self, config: &OverlayConfig) -> Result<()> {
        super::overlayfs::mount_overlay(config)
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        bind_mount(source, target)
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        unmount(target)
    }
}

/// Creates a bind mount from source to target.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| ShipyardError::Mount {
        target: target.to_path_buf(),
        message: format!("bind mount of {} failed: {e}", source.display()),
    })?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        "bind mount created"
    );
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; bind mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn bind_mount(_source: &Path, target: &Path) -> Result<()> {
    Err(linux_required(target))
}

/// Lazily detaches the filesystem mounted at `target`.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn unmount(target: &Path) -> Result<()> {
    nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(|e| {
        ShipyardError::Mount {
            target: target.to_path_buf(),
            message: format!("unmount failed: {e}"),
        }
    })?;
    tracing::debug!(path = %target.display(), "unmounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; unmounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn unmount(target: &Path) -> Result<()> {
    Err(linux_required(target))
}

/// Marks every mount of the current mount namespace private so later mounts
/// do not propagate back to the host.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn make_mounts_private() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| ShipyardError::Mount {
        target: "/".into(),
        message: format!("making mounts private failed: {e}"),
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; mount propagation requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn make_mounts_private() -> Result<()> {
    Err(linux_required(Path::new("/")))
}

/// Mounts a fresh `proc` filesystem at `<rootfs>/proc`.
///
/// Inside a new PID namespace this exposes only the container's processes.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_proc(rootfs: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let target = rootfs.join("proc");
    std::fs::create_dir_all(&target).map_err(|e| ShipyardError::io(&target, e))?;
    mount(
        Some("proc"),
        &target,
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|e| ShipyardError::Mount {
        target: target.clone(),
        message: format!("proc mount failed: {e}"),
    })?;
    tracing::debug!(path = %target.display(), "proc mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; `/proc` mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc(rootfs: &Path) -> Result<()> {
    Err(linux_required(rootfs))
}

#[cfg(not(target_os = "linux"))]
fn linux_required(target: &Path) -> ShipyardError {
    ShipyardError::Mount {
        target: target.to_path_buf(),
        message: "Linux required for native container operations".into(),
    }
}
