//! The `init` entry point, running as PID 1 inside a new container.
//!
//! Switches the root filesystem to the workspace the launcher chose as
//! working directory, mounts `/proc`, then waits for the command on fd 3 and
//! replaces itself with it.

use std::fs::File;
use std::io::Read;
use std::os::fd::FromRawFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};

use shipyard_common::constants::{CONTAINER_BIN_PATH, INIT_PIPE_FD};
use shipyard_common::error::{Result, ShipyardError};
use shipyard_core::filesystem::mount::{make_mounts_private, mount_proc};
use shipyard_core::filesystem::pivot_root::pivot_root;

/// Sets up the container root and executes the command read from fd 3.
///
/// Only returns on failure; on success the process image is replaced.
///
/// # Errors
///
/// Returns an error if any setup step fails, the command is empty, or the
/// program cannot be found or executed.
pub fn run_container_init() -> Result<()> {
    let rootfs = std::env::current_dir().map_err(|e| ShipyardError::io(".", e))?;
    tracing::debug!(rootfs = %rootfs.display(), "initializing container");

    make_mounts_private()?;
    pivot_root(&rootfs)?;
    mount_proc(Path::new("/"))?;

    let command = read_command()?;
    let argv = parse_command(&command)?;
    let program = resolve_program(&argv[0], Path::new(CONTAINER_BIN_PATH))?;
    tracing::debug!(program = %program.display(), args = ?&argv[1..], "executing container command");

    let err = std::process::Command::new(&program).args(&argv[1..]).exec();
    Err(ShipyardError::Process {
        message: format!("exec of {} failed: {err}", program.display()),
    })
}

/// Reads the pipe inherited on fd 3 until the launcher closes it.
fn read_command() -> Result<String> {
    // SAFETY: the launcher placed the read end of the command pipe on this
    // descriptor and nothing else in this process uses it.
    let mut pipe = unsafe { File::from_raw_fd(INIT_PIPE_FD) };
    let mut command = String::new();
    let _ = pipe
        .read_to_string(&mut command)
        .map_err(|e| ShipyardError::io(format!("fd {INIT_PIPE_FD}"), e))?;
    Ok(command)
}

/// Splits a command line on whitespace.
///
/// # Errors
///
/// Returns an error if the command line is blank.
pub fn parse_command(command: &str) -> Result<Vec<String>> {
    let argv: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
    if argv.is_empty() {
        return Err(ShipyardError::Config {
            message: "container command is empty".into(),
        });
    }
    Ok(argv)
}

/// Resolves `program` to an executable, searching `search_dir` for bare
/// names.
///
/// # Errors
///
/// Returns an error if no executable is found.
pub fn resolve_program(program: &str, search_dir: &Path) -> Result<PathBuf> {
    which::which_in(program, Some(search_dir), "/").map_err(|e| ShipyardError::NotFound {
        kind: "executable",
        id: format!("{program} ({e})"),
    })
}
