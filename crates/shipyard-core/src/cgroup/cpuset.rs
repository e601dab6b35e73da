//! CPU pinning via the `cpuset` controller.

use std::path::{Path, PathBuf};

use shipyard_common::error::Result;
use shipyard_common::types::ResourceSpec;

use super::Controller;

/// Limit file written by this controller.
pub const CPUS_FILE: &str = "cpuset.cpus";

/// Memory-node file the kernel requires before tasks can join a cpuset.
pub const MEMS_FILE: &str = "cpuset.mems";

/// Enforces `ResourceSpec::cpu_set`.
#[derive(Debug)]
pub struct CpuSetController {
    mount: PathBuf,
    applied: bool,
}

impl CpuSetController {
    /// Creates the controller for the `cpuset` mount under `cgroup_root`.
    #[must_use]
    pub fn new(cgroup_root: &Path) -> Self {
        Self {
            mount: cgroup_root.join("cpuset"),
            applied: false,
        }
    }
}

impl Controller for CpuSetController {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn apply(&mut self, group: &str, spec: &ResourceSpec) -> Result<()> {
        let Some(cpus) = spec.cpu_set.as_deref() else {
            return Ok(());
        };
        let dir = super::group_path(&self.mount, group, true)?;
        inherit_parent_values(&self.mount, &dir)?;
        super::write_control_file(&dir, CPUS_FILE, cpus)?;
        self.applied = true;
        tracing::debug!(group, cpus, "CPU set assigned");
        Ok(())
    }

    fn attach(&self, group: &str, pid: u32) -> Result<()> {
        if !self.applied {
            return Ok(());
        }
        let dir = super::group_path(&self.mount, group, false)?;
        super::attach_task(&dir, pid)
    }

    fn release(&self, group: &str) -> Result<()> {
        super::remove_group_dir(&self.mount.join(group))
    }
}

/// Fills empty `cpuset.cpus`/`cpuset.mems` of every level between the mount
/// and `group_dir` from its parent. A fresh cpuset starts with both empty and
/// rejects children and tasks until they are set.
fn inherit_parent_values(mount: &Path, group_dir: &Path) -> Result<()> {
    let Ok(relative) = group_dir.strip_prefix(mount) else {
        return Ok(());
    };
    let mut parent = mount.to_path_buf();
    for component in relative.components() {
        let dir = parent.join(component);
        for file in [CPUS_FILE, MEMS_FILE] {
            copy_if_empty(&parent, &dir, file)?;
        }
        parent = dir;
    }
    Ok(())
}

fn copy_if_empty(parent: &Path, dir: &Path, file: &str) -> Result<()> {
    // No such file: not a kernel-managed cpuset, nothing to inherit.
    let Ok(current) = std::fs::read_to_string(dir.join(file)) else {
        return Ok(());
    };
    if !current.trim().is_empty() {
        return Ok(());
    }
    let Ok(inherited) = std::fs::read_to_string(parent.join(file)) else {
        return Ok(());
    };
    let inherited = inherited.trim();
    if inherited.is_empty() {
        return Ok(());
    }
    super::write_control_file(dir, file, inherited)
}
