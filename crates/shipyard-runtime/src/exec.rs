//! Running commands inside a live container.
//!
//! `setns(2)` into a mount namespace is refused to multithreaded processes,
//! so the runtime re-executes itself with the target recorded in the
//! environment (`SHIPYARD_EXEC_PID`, `SHIPYARD_EXEC_CMD`). The re-executed
//! process sees the marker, joins the container's namespaces, and runs the
//! command as its child.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus};

use shipyard_common::constants::{EXEC_CMD_ENV, EXEC_PID_ENV, EXEC_SUBCOMMAND};
use shipyard_common::error::{Result, ShipyardError};
use shipyard_core::namespace::join_namespaces;

use crate::init::parse_command;

/// A pending exec handed over through the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    /// Host pid of the container's init process.
    pub pid: u32,
    /// Space-joined command line to run.
    pub command: String,
}

/// Returns the exec target if this process was re-executed for one.
///
/// # Errors
///
/// Returns an error if the marker is present but not a valid pid.
pub fn exec_target_from_env() -> Result<Option<ExecTarget>> {
    parse_exec_target(std::env::var_os(EXEC_PID_ENV), std::env::var_os(EXEC_CMD_ENV))
}

fn parse_exec_target(pid: Option<OsString>, command: Option<OsString>) -> Result<Option<ExecTarget>> {
    let Some(pid) = pid else {
        return Ok(None);
    };
    let pid = pid.to_string_lossy();
    let pid = pid.trim().parse().map_err(|_| ShipyardError::Config {
        message: format!("{EXEC_PID_ENV} is not a pid: {pid:?}"),
    })?;
    let command = command
        .map(|c| c.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Some(ExecTarget { pid, command }))
}

/// Runs `command` inside the container whose init has host pid `pid`.
///
/// The target's environment is passed on to the command. Blocks until the
/// command finishes and returns its exit code.
///
/// # Errors
///
/// Returns an error if the command is empty, the target's environment
/// cannot be read, or the helper process cannot be started.
pub fn exec_in_container(self_exe: &Path, pid: u32, command: &[String]) -> Result<i32> {
    if command.is_empty() {
        return Err(ShipyardError::Config {
            message: "exec command is empty".into(),
        });
    }
    let environ = read_process_environ(pid)?;
    let joined = command.join(" ");
    tracing::info!(pid, command = %joined, "exec into container");

    let status = Command::new(self_exe)
        .arg(EXEC_SUBCOMMAND)
        .envs(environ)
        .env(EXEC_PID_ENV, pid.to_string())
        .env(EXEC_CMD_ENV, &joined)
        .status()
        .map_err(|e| ShipyardError::io(self_exe, e))?;
    Ok(exit_code(status))
}

/// Joins the target's namespaces and runs its command as a child.
///
/// This is the re-executed side of [`exec_in_container`]. Returns the
/// command's exit code.
///
/// # Errors
///
/// Returns an error if the namespaces cannot be joined or the command
/// cannot be started.
pub fn run_in_container(target: &ExecTarget) -> Result<i32> {
    let argv = parse_command(&target.command)?;
    join_namespaces(target.pid)?;
    std::env::set_current_dir("/").map_err(|e| ShipyardError::io("/", e))?;

    let status = Command::new(&argv[0])
        .args(&argv[1..])
        .status()
        .map_err(|e| ShipyardError::io(&argv[0], e))?;
    Ok(exit_code(status))
}

/// Reads `/proc/<pid>/environ`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_process_environ(pid: u32) -> Result<Vec<(OsString, OsString)>> {
    let path = format!("/proc/{pid}/environ");
    let bytes = std::fs::read(&path).map_err(|e| ShipyardError::io(path, e))?;
    Ok(parse_environ(&bytes))
}

/// Splits a NUL-separated `KEY=VALUE` block. Entries without `=` are dropped.
#[must_use]
pub fn parse_environ(bytes: &[u8]) -> Vec<(OsString, OsString)> {
    bytes
        .split(|b| *b == 0)
        .filter_map(|entry| {
            let eq = entry.iter().position(|b| *b == b'=')?;
            if eq == 0 {
                return None;
            }
            Some((
                OsString::from_vec(entry[..eq].to_vec()),
                OsString::from_vec(entry[eq + 1..].to_vec()),
            ))
        })
        .collect()
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environ_block_is_split_into_pairs() {
        let pairs = parse_environ(b"PATH=/bin:/usr/bin\0EMPTY=\0junk\0=nokey\0A=b=c\0");
        assert_eq!(
            pairs,
            [
                (OsString::from("PATH"), OsString::from("/bin:/usr/bin")),
                (OsString::from("EMPTY"), OsString::new()),
                (OsString::from("A"), OsString::from("b=c")),
            ]
        );
    }

    #[test]
    fn own_environ_is_readable() {
        let pairs = read_process_environ(std::process::id()).expect("environ");
        assert!(pairs.iter().all(|(k, _)| !k.is_empty()));
    }

    #[test]
    fn missing_marker_means_no_target() {
        assert_eq!(parse_exec_target(None, Some("ls".into())).expect("parse"), None);
    }

    #[test]
    fn marker_selects_target() {
        let target = parse_exec_target(Some("42".into()), Some("ls -l".into()))
            .expect("parse")
            .expect("target");
        assert_eq!(target, ExecTarget { pid: 42, command: "ls -l".into() });
    }

    #[test]
    fn bad_marker_is_an_error() {
        assert!(parse_exec_target(Some("abc".into()), None).is_err());
    }

    #[test]
    fn empty_command_is_rejected_before_spawning() {
        let result = exec_in_container(Path::new("/nonexistent"), 1, &[]);
        assert!(matches!(result, Err(ShipyardError::Config { .. })));
    }

    #[test]
    fn signal_exit_maps_like_a_shell() {
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }
}
