//! Cgroup resource management.
//!
//! Each resource dimension is handled by a [`Controller`] that owns one
//! controller mount (`<cgroup_root>/<controller>`). A [`CgroupManager`] fans a
//! [`ResourceSpec`] and a process id out to its controllers in a fixed order.
//! Failures in one controller never stop the others from being attempted.

pub mod cpu;
pub mod cpuset;
pub mod memory;

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shipyard_common::constants::APP_NAME;
use shipyard_common::error::{Result, ShipyardError};
use shipyard_common::report::StepReport;
use shipyard_common::types::ResourceSpec;

pub use cpu::CpuShareController;
pub use cpuset::CpuSetController;
pub use memory::MemoryController;

/// Name of the task-membership file in every controller group.
pub const TASKS_FILE: &str = "tasks";

/// One cgroup subsystem responsible for a single resource dimension.
pub trait Controller: fmt::Debug {
    /// Subsystem name, also the directory of its mount under the cgroup root.
    fn name(&self) -> &'static str;

    /// Writes this controller's dimension of `spec` into `group`.
    ///
    /// An unset dimension is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the group directory or limit file cannot be written.
    fn apply(&mut self, group: &str, spec: &ResourceSpec) -> Result<()>;

    /// Adds `pid` to `group`, if a limit was applied earlier.
    ///
    /// # Errors
    ///
    /// Returns an error if the tasks file cannot be written.
    fn attach(&self, group: &str, pid: u32) -> Result<()>;

    /// Removes this controller's directory for `group`. Absent is success.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    fn release(&self, group: &str) -> Result<()>;
}

/// Returns the controllers in registration order: memory, CPU share, CPU set.
#[must_use]
pub fn default_controllers(cgroup_root: &Path) -> Vec<Box<dyn Controller>> {
    vec![
        Box::new(MemoryController::new(cgroup_root)),
        Box::new(CpuShareController::new(cgroup_root)),
        Box::new(CpuSetController::new(cgroup_root)),
    ]
}

/// Group name used for a container's cgroups.
#[must_use]
pub fn group_name(container_name: &str) -> String {
    format!("{APP_NAME}/{container_name}")
}

/// Owns a named group and its ordered controller list.
#[derive(Debug)]
pub struct CgroupManager {
    group: String,
    controllers: Vec<Box<dyn Controller>>,
}

impl CgroupManager {
    /// Creates a manager for `group` with the default controllers mounted
    /// below `cgroup_root`.
    #[must_use]
    pub fn new(group: impl Into<String>, cgroup_root: &Path) -> Self {
        Self::with_controllers(group, default_controllers(cgroup_root))
    }

    /// Creates a manager with an explicit controller list. Order is kept.
    #[must_use]
    pub fn with_controllers(group: impl Into<String>, controllers: Vec<Box<dyn Controller>>) -> Self {
        Self {
            group: group.into(),
            controllers,
        }
    }

    /// Returns the managed group name.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Names of the registered controllers, in fan-out order.
    #[must_use]
    pub fn controller_names(&self) -> Vec<&'static str> {
        self.controllers.iter().map(|c| c.name()).collect()
    }

    /// Applies every dimension of `spec` through its controller.
    pub fn set_limits(&mut self, spec: &ResourceSpec) -> StepReport {
        let mut report = StepReport::new();
        for controller in &mut self.controllers {
            let name = controller.name();
            let _ = report.record(name, controller.apply(&self.group, spec));
        }
        tracing::info!(
            group = %self.group,
            failed = report.failures().len(),
            "resource limits applied"
        );
        report
    }

    /// Adds `pid` to every controller that received a limit.
    pub fn attach_process(&self, pid: u32) -> StepReport {
        let mut report = StepReport::new();
        for controller in &self.controllers {
            let _ = report.record(controller.name(), controller.attach(&self.group, pid));
        }
        tracing::debug!(group = %self.group, pid, "process attached to cgroups");
        report
    }

    /// Removes the group from every controller.
    pub fn destroy(&self) -> StepReport {
        let mut report = StepReport::new();
        for controller in &self.controllers {
            let _ = report.record(controller.name(), controller.release(&self.group));
        }
        tracing::info!(group = %self.group, "cgroup destroyed");
        report
    }
}

/// Resolves `<mount>/<group>`, creating it when `create` is set.
///
/// # Errors
///
/// Returns an error if the directory is missing and `create` is false, or if
/// it cannot be created.
pub fn group_path(mount: &Path, group: &str, create: bool) -> Result<PathBuf> {
    let path = mount.join(group);
    if path.is_dir() {
        return Ok(path);
    }
    if !create {
        return Err(ShipyardError::NotFound {
            kind: "cgroup",
            id: path.display().to_string(),
        });
    }
    std::fs::create_dir_all(&path).map_err(|e| ShipyardError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "cgroup directory created");
    Ok(path)
}

/// Writes `value` to the control file `file` inside `dir`.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn write_control_file(dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = dir.join(file);
    std::fs::write(&path, value).map_err(|e| ShipyardError::io(&path, e))?;
    tracing::debug!(path = %path.display(), value, "control file written");
    Ok(())
}

/// Writes `pid` to the tasks file of `dir`.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn attach_task(dir: &Path, pid: u32) -> Result<()> {
    write_control_file(dir, TASKS_FILE, &pid.to_string())
}

/// Removes a cgroup directory.
///
/// A real cgroup filesystem only accepts `rmdir`; a directory holding
/// ordinary files is removed recursively instead.
///
/// # Errors
///
/// Returns an error if the directory exists and cannot be removed.
pub fn remove_group_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShipyardError::io(path, e)),
        },
        Err(e) => Err(ShipyardError::io(path, e)),
    }
}
