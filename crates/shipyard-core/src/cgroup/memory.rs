//! Memory ceiling via the `memory` controller.

use std::path::{Path, PathBuf};

use shipyard_common::error::Result;
use shipyard_common::types::ResourceSpec;

use super::Controller;

/// Limit file written by this controller.
pub const MEMORY_LIMIT_FILE: &str = "memory.limit_in_bytes";

/// Enforces `ResourceSpec::memory_limit`.
#[derive(Debug)]
pub struct MemoryController {
    mount: PathBuf,
    applied: bool,
}

impl MemoryController {
    /// Creates the controller for the `memory` mount under `cgroup_root`.
    #[must_use]
    pub fn new(cgroup_root: &Path) -> Self {
        Self {
            mount: cgroup_root.join("memory"),
            applied: false,
        }
    }
}

impl Controller for MemoryController {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn apply(&mut self, group: &str, spec: &ResourceSpec) -> Result<()> {
        let Some(limit) = spec.memory_limit.as_deref() else {
            return Ok(());
        };
        let dir = super::group_path(&self.mount, group, true)?;
        super::write_control_file(&dir, MEMORY_LIMIT_FILE, limit)?;
        self.applied = true;
        tracing::debug!(group, limit, "memory limit set");
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
