//! Starting a process inside fresh namespaces with `clone(2)`.
//!
//! `unshare(CLONE_NEWPID)` only affects later children, so the container's
//! init is created with `clone(2)` directly: it is PID 1 of its namespace
//! from its first instruction.

use shipyard_common::error::{Result, ShipyardError};

use super::NamespaceConfig;

/// Stack handed to the cloned child. It only needs to reach `execve(2)`.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Clones a child into the namespaces of `config` and runs `child` in it.
///
/// The child runs on a copy of the caller's address space (no `CLONE_VM`);
/// `child` should only touch data prepared before the call and end in
/// `execve(2)`. Its return value becomes the child's exit code if it returns.
/// The caller receives `SIGCHLD` when the child exits.
///
/// # Errors
///
/// Returns an error if `clone(2)` fails.
#[cfg(target_os = "linux")]
pub fn spawn_in_namespaces<F>(config: &NamespaceConfig, child: F) -> Result<u32>
where
    F: FnMut() -> isize,
{
    let mut stack = vec![0_u8; CHILD_STACK_SIZE];
    let flags = config.clone_flags();

    // SAFETY: without CLONE_VM the child gets its own copy-on-write address
    // space, so nothing it does can corrupt the parent. The orchestrator is
    // single-threaded, so no lock can be held across the clone.
    let pid = unsafe {
        nix::sched::clone(
            Box::new(child),
            &mut stack,
            flags,
            Some(libc::SIGCHLD),
        )
    }
    .map_err(|e| ShipyardError::Namespace {
        message: format!("clone with {flags:?} failed: {e}"),
    })?;

    let pid = u32::try_from(pid.as_raw()).map_err(|_| ShipyardError::Process {
        message: format!("clone returned invalid pid {pid}"),
    })?;
    tracing::info!(pid, ?flags, "process cloned into new namespaces");
    Ok(pid)
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn spawn_in_namespaces<F>(_config: &NamespaceConfig, _child: F) -> Result<u32>
where
    F: FnMut() -> isize,
{
    let _ = CHILD_STACK_SIZE;
    Err(ShipyardError::Namespace {
        message: "Linux required for native container operations".into(),
    })
}
