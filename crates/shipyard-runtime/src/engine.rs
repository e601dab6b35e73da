//! Runtime engine that orchestrates container lifecycle.
//!
//! Each operation composes the workspace manager, process launcher, cgroup
//! manager, and state store. Creation order matters: the workspace exists
//! before the child starts, limits are attached to the child's pid before it
//! receives its command, and the command is released last.

use std::io::Write;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use shipyard_common::config::RuntimeConfig;
use shipyard_common::constants::IMAGE_ARCHIVE_EXTENSION;
use shipyard_common::error::{Result, ShipyardError};
use shipyard_common::report::StepReport;
use shipyard_common::types::{ContainerId, ContainerStatus, ResourceSpec, VolumeSpec};
use shipyard_core::cgroup::{CgroupManager, group_name};
use shipyard_image::commit::commit_directory;
use shipyard_image::storage::validate_image_name;

use crate::process::{self, ContainerProcess, LaunchRequest};
use crate::state::{self, ContainerInfo, StateStore};
use crate::workspace::WorkspaceManager;

/// Parameters of a `run` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Attach the container to the caller's terminal and wait for it.
    pub tty: bool,
    /// Container name; defaults to the generated id.
    pub name: Option<String>,
    /// Image to run.
    pub image: String,
    /// Command and arguments.
    pub command: Vec<String>,
    /// Resource limits.
    pub resources: ResourceSpec,
    /// Optional `host:container` bind mount.
    pub volume: Option<VolumeSpec>,
    /// Extra `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// Port mappings, recorded only.
    pub ports: Vec<String>,
}

/// Result of a `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Generated container id.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Host pid of the init process.
    pub pid: u32,
    /// Exit code, when the container ran attached to a terminal.
    pub exit_code: Option<i32>,
}

/// The runtime engine that coordinates all container operations.
#[derive(Debug)]
pub struct Engine {
    config: RuntimeConfig,
    state: StateStore,
    workspace: WorkspaceManager,
}

impl Engine {
    /// Creates an engine performing real mounts.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let workspace = WorkspaceManager::new(&config);
        Self::with_workspace(config, workspace)
    }

    /// Creates an engine around an existing workspace manager.
    #[must_use]
    pub fn with_workspace(config: RuntimeConfig, workspace: WorkspaceManager) -> Self {
        Self {
            state: StateStore::new(&config.run_dir),
            config,
            workspace,
        }
    }

    /// Returns the runtime configuration.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Returns the state store.
    #[must_use]
    pub const fn state(&self) -> &StateStore {
        &self.state
    }

    /// Returns the workspace manager.
    #[must_use]
    pub const fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    /// Creates and starts a container.
    ///
    /// Detached containers are left running and the call returns at once.
    /// With `tty` the call waits for the container to exit and then removes
    /// its cgroups, workspace, and record.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, the name is taken, or the
    /// container cannot be started or recorded. Resource-limit failures are
    /// logged and do not fail the call.
    pub fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        if request.command.is_empty() {
            return Err(ShipyardError::Config {
                message: "no command given".into(),
            });
        }
        let id = ContainerId::generate();
        let name = request.name.clone().unwrap_or_else(|| id.to_string());
        state::validate_name(&name)?;
        validate_image_name(&request.image)?;
        if self.state.exists(&name) {
            return Err(ShipyardError::AlreadyExists {
                kind: "container",
                id: name,
            });
        }

        let volume = request.volume.as_ref();
        let (child, pipe) = process::launch(
            &self.config,
            &self.workspace,
            &LaunchRequest {
                tty: request.tty,
                name: &name,
                image: &request.image,
                volume,
                env: &request.env,
            },
        )
        .inspect_err(|_| {
            // The name was free, so anything under it is a leftover log.
            let _ = self.state.delete(&name);
        })?;
        let pid = child.pid();

        let volume_text = volume.map(ToString::to_string).unwrap_or_default();
        if let Err(e) = self
            .state
            .record(pid, &request.command, &name, &id, &volume_text, &request.ports)
        {
            self.abort(&child, &name, volume);
            return Err(e);
        }

        let mut cgroups = CgroupManager::new(group_name(&name), &self.config.cgroup_root);
        let _ = cgroups.set_limits(&request.resources);
        let _ = cgroups.attach_process(pid);

        if let Err(e) = send_command(pipe, &request.command) {
            let _ = cgroups.destroy();
            self.abort(&child, &name, volume);
            return Err(e);
        }
        tracing::info!(id = %id, name, pid, image = %request.image, "container started");

        let exit_code = if request.tty {
            Some(self.finish_attached(child.wait(), &cgroups, &name, volume)?)
        } else {
            None
        };

        Ok(RunOutcome {
            id,
            name,
            pid,
            exit_code,
        })
    }

    /// Removes an attached container's cgroups, workspace, and record once
    /// waiting on it has ended, whether or not the wait succeeded.
    fn finish_attached(
        &self,
        waited: Result<i32>,
        cgroups: &CgroupManager,
        name: &str,
        volume: Option<&VolumeSpec>,
    ) -> Result<i32> {
        match &waited {
            Ok(code) => tracing::info!(name, code, "container exited"),
            Err(e) => tracing::warn!(name, error = %e, "waiting for container failed"),
        }
        let mut report = cgroups.destroy();
        report.merge(self.workspace.destroy(name, volume));
        let _ = report.record("remove record", self.state.delete(name));
        waited
    }

    /// Undoes a partially created container.
    fn abort(&self, child: &ContainerProcess, name: &str, volume: Option<&VolumeSpec>) {
        let mut report = StepReport::new();
        let _ = report.record("kill init", child.kill());
        report.merge(self.workspace.destroy(name, volume));
        let _ = report.record("remove record", self.state.delete(name));
        tracing::warn!(name, clean = report.is_clean(), "container creation aborted");
    }

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or cannot be signalled.
    pub fn stop(&self, name: &str) -> Result<ContainerInfo> {
        self.state.stop(name)
    }

    /// Removes a stopped container: its workspace, cgroups, and record.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if the container is not stopped, or a
    /// partial-failure error if some teardown step failed. The record is
    /// removed in either case once the precondition holds.
    pub fn remove(&self, name: &str) -> Result<()> {
        let info = self.state.get(name)?;
        if info.status != ContainerStatus::Stopped {
            return Err(ShipyardError::Precondition {
                message: format!("container {name} is {}; stop it first", info.status),
            });
        }

        let volume = VolumeSpec::parse(&info.volume);
        let mut report = self.workspace.destroy(name, volume.as_ref());
        let cgroups = CgroupManager::new(group_name(name), &self.config.cgroup_root);
        report.merge(cgroups.destroy());
        let _ = report.record("remove record", self.state.remove(name));
        report.into_result()
    }

    /// Packs a container's filesystem into `<output_dir>/<image>.tar`.
    ///
    /// Without `output_dir` the archive goes to the image root, where `run`
    /// can use it as an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown, the image name is
    /// invalid, or archiving fails.
    pub fn commit(&self, container: &str, image: &str, output_dir: Option<&Path>) -> Result<PathBuf> {
        let _ = self.state.get(container)?;
        validate_image_name(image)?;
        let dir = output_dir.unwrap_or(self.config.root_dir.as_path());
        let archive = dir.join(format!("{image}.{IMAGE_ARCHIVE_EXTENSION}"));
        let _ = commit_directory(&self.workspace.mount_point(container), &archive)?;
        Ok(archive)
    }

    /// Runs a command inside a running container and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or not running, or if
    /// the command cannot be started.
    pub fn exec(&self, container: &str, command: &[String]) -> Result<i32> {
        let info = self.state.get(container)?;
        let pid = match (info.status, info.pid()) {
            (ContainerStatus::Running, Some(pid)) => u32::try_from(pid).ok(),
            _ => None,
        }
        .ok_or_else(|| ShipyardError::Precondition {
            message: format!("container {container} is not running"),
        })?;
        crate::exec::exec_in_container(&self.config.self_exe, pid, command)
    }

    /// Lists all containers for display.
    ///
    /// A running record whose process is gone is reported as exited; the
    /// record itself is not changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the run directory cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerInfo>> {
        let mut infos = self.state.list()?;
        for info in &mut infos {
            if info.status == ContainerStatus::Running && !info.pid().is_some_and(is_alive) {
                info.status = ContainerStatus::Exited;
            }
        }
        Ok(infos)
    }

    /// Returns the captured output of a detached container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or its log is unreadable.
    pub fn logs(&self, name: &str) -> Result<String> {
        let _ = self.state.get(name)?;
        crate::logs::read_logs(self.state.run_dir(), name)
    }
}

/// Writes the command line to the init pipe and closes it.
fn send_command(mut pipe: std::fs::File, command: &[String]) -> Result<()> {
    let line = command.join(" ");
    pipe.write_all(line.as_bytes())
        .map_err(|e| ShipyardError::Process {
            message: format!("sending command to init failed: {e}"),
        })?;
    tracing::debug!(command = %line, "command sent to init");
    Ok(())
}

/// Checks whether a process exists, including ones owned by other users.
fn is_alive(pid: i32) -> bool {
    pid > 0 && !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

#[cfg(test)]
mod tests {
    use shipyard_core::filesystem::{Mounter, OverlayConfig};

    use super::*;

    #[derive(Debug)]
    struct NoopMounter;

    impl Mounter for NoopMounter {
        fn mount_overlay(&self, _config: &OverlayConfig) -> Result<()> {
            Ok(())
        }

        fn bind_mount(&self, _source: &Path, _target: &Path) -> Result<()> {
            Ok(())
        }

        fn unmount(&self, _target: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_wait_still_tears_down_attached_container() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = RuntimeConfig::with_root(dir.path());
        config.cgroup_root = dir.path().join("cgroup");
        let workspace = WorkspaceManager::with_mounter(&config, Box::new(NoopMounter));
        let engine = Engine::with_workspace(config.clone(), workspace);

        let mut cgroups = CgroupManager::new(group_name("c1"), &config.cgroup_root);
        let _ = cgroups.set_limits(&ResourceSpec::from_flags("100m", "", ""));
        let memory_group = config.cgroup_root.join("memory/shipyard/c1");
        assert!(memory_group.is_dir());
        let _ = engine
            .state()
            .record(1, &["top".to_string()], "c1", &ContainerId::new("1"), "", &[])
            .expect("record");

        let waited = Err(ShipyardError::Process {
            message: "waitpid failed".into(),
        });
        let result = engine.finish_attached(waited, &cgroups, "c1", None);

        assert!(matches!(result, Err(ShipyardError::Process { .. })));
        assert!(!memory_group.exists());
        assert!(!engine.state().exists("c1"));
    }

    #[test]
    fn current_process_is_alive() {
        let pid = i32::try_from(std::process::id()).expect("pid");
        assert!(is_alive(pid));
        assert!(!is_alive(0));
    }

    #[test]
    fn send_command_writes_space_joined_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pipe");
        let file = std::fs::File::create(&path).expect("create");
        send_command(file, &["/bin/echo".into(), "hi".into()]).expect("send");
        assert_eq!(std::fs::read_to_string(path).expect("read"), "/bin/echo hi");
    }
}
