//! Root filesystem switching via `pivot_root(2)`.
//!
//! More thorough than `chroot` because it actually changes the root mount
//! point and lets the old root be detached entirely.

use std::path::Path;

use shipyard_common::error::{Result, ShipyardError};

/// Directory, relative to the new root, that briefly holds the old root.
const PUT_OLD: &str = ".pivot_root";

/// Makes `new_root` the process's `/` and detaches the old root.
///
/// Must run inside a private mount namespace. `new_root` is bind-mounted onto
/// itself first because `pivot_root(2)` requires a mount point.
///
/// # Errors
///
/// Returns an error if the bind mount, `pivot_root(2)`, or the cleanup of the
/// old root fails.
#[cfg(target_os = "linux")]
pub fn pivot_root(new_root: &Path) -> Result<()> {
    use nix::mount::{MntFlags, MsFlags, mount, umount2};

    let mount_err = |target: &Path, what: &str, e: nix::Error| ShipyardError::Mount {
        target: target.to_path_buf(),
        message: format!("{what}: {e}"),
    };

    mount(
        Some(new_root),
        new_root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| mount_err(new_root, "self bind mount failed", e))?;

    let put_old = new_root.join(PUT_OLD);
    std::fs::create_dir_all(&put_old).map_err(|e| ShipyardError::io(&put_old, e))?;

    nix::unistd::pivot_root(new_root, &put_old)
        .map_err(|e| mount_err(new_root, "pivot_root failed", e))?;
    nix::unistd::chdir("/").map_err(|e| mount_err(Path::new("/"), "chdir failed", e))?;

    let old_root = Path::new("/").join(PUT_OLD);
    umount2(&old_root, MntFlags::MNT_DETACH)
        .map_err(|e| mount_err(&old_root, "detaching old root failed", e))?;
    std::fs::remove_dir(&old_root).map_err(|e| ShipyardError::io(&old_root, e))?;

    tracing::debug!(new_root = %new_root.display(), "pivot_root complete");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; `pivot_root(2)` requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn pivot_root(new_root: &Path) -> Result<()> {
    Err(ShipyardError::Mount {
        target: new_root.to_path_buf(),
        message: "Linux required for native container operations".into(),
    })
}
