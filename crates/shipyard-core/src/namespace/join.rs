//! Joining the namespaces of a running process with `setns(2)`.

use std::path::PathBuf;

use shipyard_common::error::{Result, ShipyardError};

/// Namespaces joined when entering a container, in joining order.
///
/// The mount namespace goes last: once joined, the host's `/proc` paths no
/// longer resolve.
pub const JOINED_NAMESPACES: [&str; 5] = ["ipc", "uts", "net", "pid", "mnt"];

/// Returns `/proc/<pid>/ns/<kind>`.
#[must_use]
pub fn namespace_path(pid: u32, kind: &str) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/ns/{kind}"))
}

/// Moves the calling process into the ipc, uts, net, pid, and mount
/// namespaces of `pid`.
///
/// The PID namespace only applies to children spawned afterwards. Must be
/// called while the process is single-threaded.
///
/// # Errors
///
/// Returns an error if a namespace file cannot be opened or `setns(2)` fails.
#[cfg(target_os = "linux")]
pub fn join_namespaces(pid: u32) -> Result<()> {
    use nix::sched::{CloneFlags, setns};

    let handles = JOINED_NAMESPACES
        .iter()
        .map(|kind| {
            let path = namespace_path(pid, kind);
            std::fs::File::open(&path)
                .map(|file| (*kind, file))
                .map_err(|e| ShipyardError::io(path, e))
        })
        .collect::<Result<Vec<_>>>()?;

    for (kind, file) in &handles {
        let flag = match *kind {
            "ipc" => CloneFlags::CLONE_NEWIPC,
            "uts" => CloneFlags::CLONE_NEWUTS,
            "net" => CloneFlags::CLONE_NEWNET,
            "pid" => CloneFlags::CLONE_NEWPID,
            _ => CloneFlags::CLONE_NEWNS,
        };
        setns(file, flag).map_err(|e| ShipyardError::Namespace {
            message: format!("setns {kind} of pid {pid} failed: {e}"),
        })?;
        tracing::debug!(pid, kind, "joined namespace");
    }
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; namespace joining requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn join_namespaces(_pid: u32) -> Result<()> {
    Err(ShipyardError::Namespace {
        message: "Linux required for native container operations".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_path_points_into_proc() {
        assert_eq!(
            namespace_path(42, "mnt"),
            PathBuf::from("/proc/42/ns/mnt")
        );
    }

    #[test]
    fn mount_namespace_is_joined_last() {
        assert_eq!(JOINED_NAMESPACES.last(), Some(&"mnt"));
    }
}
