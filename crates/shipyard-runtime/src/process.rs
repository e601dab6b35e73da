//! Launching a container's init process.
//!
//! The runtime re-executes itself (`/proc/self/exe init`) inside new UTS,
//! PID, mount, network, and IPC namespaces, with the assembled workspace as
//! working directory. The command to run is not passed on the command line:
//! the child reads it from a pipe inherited as fd 3, which the caller writes
//! once cgroup limits are in place.

use std::fs::File;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use shipyard_common::config::RuntimeConfig;
use shipyard_common::error::{Result, ShipyardError};
use shipyard_common::types::VolumeSpec;

use crate::workspace::WorkspaceManager;

/// What to launch and how.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    /// Inherit the caller's stdio instead of logging to a file.
    pub tty: bool,
    /// Container name, keys the workspace and log directory.
    pub name: &'a str,
    /// Image providing the read-only layer.
    pub image: &'a str,
    /// Optional host directory to bind into the workspace.
    pub volume: Option<&'a VolumeSpec>,
    /// Extra `KEY=VALUE` entries appended to the inherited environment.
    pub env: &'a [String],
}

/// Handle on a launched container init process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerProcess {
    pid: u32,
}

impl ContainerProcess {
    /// Wraps the host pid of a child of this process.
    #[must_use]
    pub const fn new(pid: u32) -> Self {
        Self { pid }
    }

    /// Host pid of the init process.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[allow(clippy::cast_possible_wrap)]
    const fn raw(&self) -> Pid {
        Pid::from_raw(self.pid as i32)
    }

    /// Blocks until the process exits and returns its exit code.
    ///
    /// A process killed by a signal reports `128 + signal`, as shells do.
    ///
    /// # Errors
    ///
    /// Returns an error if the process is not a child of the caller.
    pub fn wait(&self) -> Result<i32> {
        loop {
            match waitpid(self.raw(), None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    return Err(ShipyardError::Process {
                        message: format!("waiting for pid {} failed: {e}", self.pid),
                    });
                }
            }
        }
    }

    /// Kills the process and reaps it.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered to a live process.
    pub fn kill(&self) -> Result<()> {
        match kill(self.raw(), Signal::SIGKILL) {
            Ok(()) => {
                let _ = self.wait();
                tracing::info!(pid = self.pid, "container process killed");
                Ok(())
            }
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ShipyardError::Signal {
                pid: self.raw().as_raw(),
                message: e.to_string(),
            }),
        }
    }
}

/// Assembles the workspace and starts the container's init process.
///
/// Returns immediately with the process handle and the write end of the
/// command pipe. The child blocks until that end is written and closed.
/// If the process cannot be started the workspace is torn down again.
///
/// # Errors
///
/// Returns an error if the workspace, log file, pipe, or process cannot be
/// created.
#[cfg(target_os = "linux")]
pub fn launch(
    config: &RuntimeConfig,
    workspace: &WorkspaceManager,
    request: &LaunchRequest<'_>,
) -> Result<(ContainerProcess, File)> {
    let mount_point = workspace.create(request.image, request.name, request.volume)?;
    spawn_init(config, &mount_point, request).inspect_err(|_| {
        let _ = workspace.destroy(request.name, request.volume);
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; containers require Linux.
#[cfg(not(target_os = "linux"))]
pub fn launch(
    _config: &RuntimeConfig,
    _workspace: &WorkspaceManager,
    _request: &LaunchRequest<'_>,
) -> Result<(ContainerProcess, File)> {
    Err(ShipyardError::Process {
        message: "Linux required for native container operations".into(),
    })
}

#[cfg(target_os = "linux")]
fn spawn_init(
    config: &RuntimeConfig,
    mount_point: &std::path::Path,
    request: &LaunchRequest<'_>,
) -> Result<(ContainerProcess, File)> {
    use std::os::unix::ffi::OsStrExt;

    use shipyard_common::constants::INIT_SUBCOMMAND;
    use shipyard_core::namespace::NamespaceConfig;

    let log = if request.tty {
        None
    } else {
        Some(crate::logs::create_log_file(&config.run_dir, request.name)?)
    };
    let program = c_string(config.self_exe.as_os_str().as_bytes())?;
    let argv = [program.clone(), c_string(INIT_SUBCOMMAND.as_bytes())?];
    let envp = child_environment(std::env::vars_os(), request.env)?;

    let child = spawn_with_pipe(
        &NamespaceConfig::default(),
        &ChildCommand {
            program: &program,
            argv: &argv,
            envp: &envp,
            cwd: mount_point,
        },
        log,
    )?;
    tracing::info!(
        pid = child.0.pid(),
        name = request.name,
        tty = request.tty,
        cwd = %mount_point.display(),
        "container init started"
    );
    Ok(child)
}

/// What the cloned child executes.
#[cfg(target_os = "linux")]
struct ChildCommand<'a> {
    program: &'a std::ffi::CStr,
    argv: &'a [std::ffi::CString],
    envp: &'a [std::ffi::CString],
    cwd: &'a std::path::Path,
}

/// Clones a child that reads its instructions from a pipe on fd 3.
///
/// With a log file the child's stdout goes to it and stdin/stderr to
/// `/dev/null`; without one it shares the caller's stdio.
#[cfg(target_os = "linux")]
fn spawn_with_pipe(
    namespaces: &shipyard_core::namespace::NamespaceConfig,
    command: &ChildCommand<'_>,
    log: Option<File>,
) -> Result<(ContainerProcess, File)> {
    use std::os::fd::AsRawFd;
    use std::os::unix::ffi::OsStrExt;

    use nix::fcntl::OFlag;
    use shipyard_core::namespace::spawn_in_namespaces;

    // Everything the child touches is prepared here: after clone(2) it only
    // issues raw syscalls.
    let cwd = c_string(command.cwd.as_os_str().as_bytes())?;
    let argv_ptrs = null_terminated(command.argv);
    let envp_ptrs = null_terminated(command.envp);

    let stdio = match log {
        Some(log) => {
            let null = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open("/dev/null")
                .map_err(|e| ShipyardError::io("/dev/null", e))?;
            Some((null, log))
        }
        None => None,
    };
    let redirect = stdio
        .as_ref()
        .map(|(null, log)| (null.as_raw_fd(), log.as_raw_fd()));

    let (read_end, write_end) =
        nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| ShipyardError::Process {
            message: format!("creating command pipe failed: {e}"),
        })?;
    let pipe_fd = read_end.as_raw_fd();
    let program = command.program;

    let pid = spawn_in_namespaces(namespaces, || {
        exec_child(pipe_fd, redirect, &cwd, program, &argv_ptrs, &envp_ptrs)
    })?;
    drop(read_end);
    drop(stdio);

    Ok((ContainerProcess::new(pid), File::from(write_end)))
}

/// Body of the cloned child. Returns only if a syscall failed.
#[cfg(target_os = "linux")]
fn exec_child(
    pipe_fd: std::os::fd::RawFd,
    redirect: Option<(std::os::fd::RawFd, std::os::fd::RawFd)>,
    cwd: &std::ffi::CStr,
    program: &std::ffi::CStr,
    argv: &[*const libc::c_char],
    envp: &[*const libc::c_char],
) -> isize {
    use shipyard_common::constants::INIT_PIPE_FD;

    // SAFETY: the descriptors were opened by the parent before clone(2) and
    // are still open in this copy of its address space. The pointer arrays
    // are null-terminated and point into CStrings that outlive this call.
    unsafe {
        // Standard streams first: the pipe is then moved onto fd 3 even if a
        // log descriptor happened to occupy it.
        if let Some((null, log)) = redirect {
            if libc::dup2(null, 0) < 0 || libc::dup2(log, 1) < 0 || libc::dup2(null, 2) < 0 {
                return 1;
            }
        }
        if libc::dup2(pipe_fd, INIT_PIPE_FD) < 0 || libc::fcntl(INIT_PIPE_FD, libc::F_SETFD, 0) < 0 {
            return 1;
        }
        if libc::chdir(cwd.as_ptr()) < 0 {
            return 1;
        }
        let _ = libc::execve(program.as_ptr(), argv.as_ptr(), envp.as_ptr());
    }
    127
}

/// Builds the child's environment: the inherited variables followed by the
/// caller's extra `KEY=VALUE` entries.
fn child_environment<I>(inherited: I, extra: &[String]) -> Result<Vec<std::ffi::CString>>
where
    I: IntoIterator<Item = (std::ffi::OsString, std::ffi::OsString)>,
{
    use std::os::unix::ffi::OsStrExt;

    let mut env = Vec::new();
    for (key, value) in inherited {
        let mut entry = key.as_bytes().to_vec();
        entry.push(b'=');
        entry.extend_from_slice(value.as_bytes());
        env.push(c_string(&entry)?);
    }
    for entry in extra {
        env.push(c_string(entry.as_bytes())?);
    }
    Ok(env)
}

fn c_string(bytes: &[u8]) -> Result<std::ffi::CString> {
    std::ffi::CString::new(bytes).map_err(|_| ShipyardError::Config {
        message: format!(
            "argument contains a NUL byte: {}",
            String::from_utf8_lossy(bytes)
        ),
    })
}

#[cfg(target_os = "linux")]
fn null_terminated(strings: &[std::ffi::CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    #[test]
    fn extra_environment_is_appended_after_inherited() {
        let inherited = vec![(OsString::from("PATH"), OsString::from("/bin"))];
        let env = child_environment(inherited, &["GREETING=hi".to_string()]).expect("env");
        let env: Vec<&str> = env.iter().map(|e| e.to_str().expect("utf8")).collect();
        assert_eq!(env, ["PATH=/bin", "GREETING=hi"]);
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let result = child_environment(Vec::new(), &["BAD=a\0b".to_string()]);
        assert!(matches!(result, Err(ShipyardError::Config { .. })));
    }

    #[test]
    fn wait_reports_exit_code() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .expect("spawn");
        let process = ContainerProcess::new(child.id());
        assert_eq!(process.wait().expect("wait"), 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn child_reads_pipe_on_fd3_and_logs_stdout_only() {
        use std::io::Write;

        use shipyard_core::namespace::NamespaceConfig;

        let dir = tempfile::tempdir().expect("tempdir");
        let cwd = dir.path().join("rootfs");
        std::fs::create_dir(&cwd).expect("mkdir");
        let cwd = cwd.canonicalize().expect("canonicalize");
        let log_path = dir.path().join("container.log");
        let log = File::create(&log_path).expect("create log");

        let program = c_string(b"/bin/sh").expect("program");
        let argv = [
            c_string(b"sh").expect("argv0"),
            c_string(b"-c").expect("flag"),
            c_string(b"cat; cat <&3; echo; pwd; echo oops >&2").expect("script"),
        ];
        let envp = [c_string(b"PATH=/bin:/usr/bin").expect("env")];
        let no_namespaces = NamespaceConfig {
            uts: false,
            pid: false,
            mount: false,
            network: false,
            ipc: false,
        };

        let (child, mut pipe) = spawn_with_pipe(
            &no_namespaces,
            &ChildCommand {
                program: &program,
                argv: &argv,
                envp: &envp,
                cwd: &cwd,
            },
            Some(log),
        )
        .expect("spawn");
        pipe.write_all(b"hi").expect("write pipe");
        drop(pipe);
        assert_eq!(child.wait().expect("wait"), 0);

        let logged = std::fs::read_to_string(&log_path).expect("read log");
        assert_eq!(logged, format!("hi\n{}\n", cwd.display()));
    }

    #[test]
    fn kill_terminates_and_reaps() {
        let child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn");
        let process = ContainerProcess::new(child.id());
        process.kill().expect("kill");
        assert_eq!(kill(process.raw(), None), Err(Errno::ESRCH));
    }
}
