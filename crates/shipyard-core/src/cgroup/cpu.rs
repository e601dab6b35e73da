//! CPU weight via the `cpu` controller.

use std::path::{Path, PathBuf};

use shipyard_common::error::Result;
use shipyard_common::types::ResourceSpec;

use super::Controller;

/// Limit file written by this controller.
pub const CPU_SHARES_FILE: &str = "cpu.shares";

/// Enforces `ResourceSpec::cpu_share`.
///
/// The share is a relative weight: it only matters while CPUs are contended.
#[derive(Debug)]
pub struct CpuShareController {
    mount: PathBuf,
    applied: bool,
}

impl CpuShareController {
    /// Creates the controller for the `cpu` mount under `cgroup_root`.
    #[must_use]
    pub fn new(cgroup_root: &Path) -> Self {
        Self {
            mount: cgroup_root.join("cpu"),
            applied: false,
        }
    }
}

impl Controller for CpuShareController {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn apply(&mut self, group: &str, spec: &ResourceSpec) -> Result<()> {
        let Some(shares) = spec.cpu_share.as_deref() else {
            return Ok(());
        };
        let dir = super::group_path(&self.mount, group, true)?;
        super::write_control_file(&dir, CPU_SHARES_FILE, shares)?;
        self.applied = true;
        tracing::debug!(group, shares, "CPU shares set");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_is_read_from_its_own_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = CpuShareController::new(dir.path());
        // Only the CPU set is given: the share controller must stay idle.
        controller
            .apply("g", &ResourceSpec::from_flags("", "", "0"))
            .unwrap();
        assert!(!dir.path().join("cpu/g").exists());

        controller
            .apply("g", &ResourceSpec::from_flags("", "256", ""))
            .unwrap();
        let value = std::fs::read_to_string(dir.path().join("cpu/g").join(CPU_SHARES_FILE)).unwrap();
        assert_eq!(value, "256");
    }

    #[test]
    fn attach_after_release_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = CpuShareController::new(dir.path());
        controller
            .apply("g", &ResourceSpec::from_flags("", "128", ""))
            .unwrap();
        controller.release("g").unwrap();
        assert!(controller.attach("g", 5).is_err());
    }
}
