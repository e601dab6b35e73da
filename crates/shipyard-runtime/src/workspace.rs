//! Container workspace assembly.
//!
//! A workspace is an overlay of the image's read-only layer and a writable
//! layer owned by the container, mounted at `<mnt>/<name>`, with an optional
//! host directory bind-mounted inside it. Teardown undoes construction in
//! reverse order.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shipyard_common::config::RuntimeConfig;
use shipyard_common::error::{Result, ShipyardError};
use shipyard_common::report::StepReport;
use shipyard_common::types::VolumeSpec;
use shipyard_core::filesystem::{Mounter, OverlayConfig, SyscallMounter};
use shipyard_image::storage::ImageStore;

/// Builds and tears down container workspaces.
#[derive(Debug)]
pub struct WorkspaceManager {
    images: ImageStore,
    mnt_dir: PathBuf,
    write_layer_dir: PathBuf,
    work_dir: PathBuf,
    mounter: Box<dyn Mounter>,
}

impl WorkspaceManager {
    /// Creates a manager issuing real mount syscalls.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self::with_mounter(config, Box::new(SyscallMounter))
    }

    /// Creates a manager that mounts through `mounter`.
    #[must_use]
    pub fn with_mounter(config: &RuntimeConfig, mounter: Box<dyn Mounter>) -> Self {
        Self {
            images: ImageStore::open(&config.root_dir, config.layers_dir()),
            mnt_dir: config.mnt_dir.clone(),
            write_layer_dir: config.write_layer_dir(),
            work_dir: config.work_dir(),
            mounter,
        }
    }

    /// Returns the image store backing the read-only layers.
    #[must_use]
    pub const fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Returns the mount point of a container's root filesystem.
    #[must_use]
    pub fn mount_point(&self, name: &str) -> PathBuf {
        self.mnt_dir.join(name)
    }

    /// Returns the writable layer of a container.
    #[must_use]
    pub fn write_layer(&self, name: &str) -> PathBuf {
        self.write_layer_dir.join(name)
    }

    /// Returns the overlay work directory of a container.
    #[must_use]
    pub fn work_dir(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Assembles the workspace of container `name` from `image` and returns
    /// its mount point.
    ///
    /// A volume that fails to mount is logged and skipped. Any other failure
    /// removes what this call created before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the image layer cannot be prepared, a layer
    /// directory cannot be created, or the overlay mount fails.
    pub fn create(&self, image: &str, name: &str, volume: Option<&VolumeSpec>) -> Result<PathBuf> {
        let lower = self.images.ensure_layer(image)?;
        let config = OverlayConfig {
            lower_dirs: vec![lower],
            upper_dir: self.write_layer(name),
            work_dir: self.work_dir(name),
            merged_dir: self.mount_point(name),
        };

        let mounted = [&config.upper_dir, &config.work_dir, &config.merged_dir]
            .into_iter()
            .try_for_each(|dir| create_dir(dir))
            .and_then(|()| self.mounter.mount_overlay(&config));
        if let Err(e) = mounted {
            let mut cleanup = StepReport::new();
            let _ = cleanup.record("remove mount point", remove_empty_dir(&config.merged_dir));
            let _ = cleanup.record("remove writable layer", remove_tree(&config.upper_dir));
            let _ = cleanup.record("remove work dir", remove_tree(&config.work_dir));
            return Err(e);
        }
        tracing::info!(image, name, path = %config.merged_dir.display(), "workspace mounted");

        if let Some(volume) = volume {
            if let Err(e) = self.mount_volume(&config.merged_dir, volume) {
                tracing::warn!(name, %volume, error = %e, "volume mount failed");
            }
        }
        Ok(config.merged_dir)
    }

    fn mount_volume(&self, mount_point: &Path, volume: &VolumeSpec) -> Result<()> {
        let target = volume.target_in(mount_point);
        create_dir(&volume.host)?;
        create_dir(&target)?;
        self.mounter.bind_mount(&volume.host, &target)?;
        tracing::info!(%volume, "volume mounted");
        Ok(())
    }

    /// Tears down the workspace of container `name`.
    ///
    /// Unmounts the volume (when given), then the overlay, then removes the
    /// mount point, the writable layer, and the work directory. Every step
    /// is attempted; the report lists the ones that failed.
    pub fn destroy(&self, name: &str, volume: Option<&VolumeSpec>) -> StepReport {
        let mount_point = self.mount_point(name);
        let mut report = StepReport::new();

        if let Some(volume) = volume {
            let _ = report.record(
                "unmount volume",
                self.mounter.unmount(&volume.target_in(&mount_point)),
            );
        }
        let _ = report.record("unmount workspace", self.mounter.unmount(&mount_point));
        // Never recursive: if the unmount failed this is still the live overlay.
        let _ = report.record("remove mount point", remove_empty_dir(&mount_point));
        let _ = report.record("remove writable layer", remove_tree(&self.write_layer(name)));
        let _ = report.record("remove work dir", remove_tree(&self.work_dir(name)));

        if report.is_clean() {
            tracing::info!(name, "workspace removed");
        }
        report
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| ShipyardError::io(path, e))
}

fn remove_empty_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(ShipyardError::io(path, e)),
        _ => Ok(()),
    }
}

fn remove_tree(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(ShipyardError::io(path, e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default, Clone)]
    struct RecordingMounter {
        calls: Rc<RefCell<Vec<String>>>,
        fail_overlay: bool,
    }

    impl RecordingMounter {
        fn push(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Mounter for RecordingMounter {
        fn mount_overlay(&self, config: &OverlayConfig) -> Result<()> {
            if self.fail_overlay {
                return Err(ShipyardError::Mount {
                    target: config.merged_dir.clone(),
                    message: "refused".into(),
                });
            }
            self.push(format!("overlay {}", config.options()));
            Ok(())
        }

        fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
            self.push(format!("bind {} {}", source.display(), target.display()));
            Ok(())
        }

        fn unmount(&self, target: &Path) -> Result<()> {
            self.push(format!("umount {}", target.display()));
            Ok(())
        }
    }

    fn setup(mounter: &RecordingMounter) -> (tempfile::TempDir, WorkspaceManager) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = RuntimeConfig::with_root(dir.path());
        let layer = config.layers_dir().join("busybox");
        std::fs::create_dir_all(layer.join("bin")).expect("layer");
        let manager = WorkspaceManager::with_mounter(&config, Box::new(mounter.clone()));
        (dir, manager)
    }

    #[test]
    fn create_mounts_overlay_over_image_layer() {
        let mounter = RecordingMounter::default();
        let (dir, manager) = setup(&mounter);

        let mount_point = manager.create("busybox", "c1", None).expect("create");
        assert_eq!(mount_point, dir.path().join("mnt/c1"));
        assert!(manager.write_layer("c1").is_dir());
        assert!(manager.work_dir("c1").is_dir());

        let calls = mounter.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("lowerdir="));
        assert!(calls[0].contains("writeLayer/c1"));
    }

    #[test]
    fn create_then_destroy_leaves_nothing_behind() {
        let mounter = RecordingMounter::default();
        let (_dir, manager) = setup(&mounter);

        let mount_point = manager.create("busybox", "c1", None).expect("create");
        let report = manager.destroy("c1", None);
        assert!(report.is_clean(), "{:?}", report.failed_steps());
        assert!(!mount_point.exists());
        assert!(!manager.write_layer("c1").exists());
        assert!(!manager.work_dir("c1").exists());
        assert!(manager.images().has_layer("busybox"));
    }

    #[test]
    fn volume_is_bound_after_overlay_and_released_first() {
        let mounter = RecordingMounter::default();
        let (dir, manager) = setup(&mounter);
        let host = dir.path().join("host-data");
        let volume = VolumeSpec::parse(&format!("{}:/data", host.display())).expect("volume");

        let mount_point = manager.create("busybox", "c1", Some(&volume)).expect("create");
        assert!(host.is_dir());
        assert!(mount_point.join("data").is_dir());

        let _ = manager.destroy("c1", Some(&volume));
        let calls = mounter.calls.borrow();
        assert!(calls[0].starts_with("overlay "));
        assert!(calls[1].starts_with("bind "));
        assert_eq!(calls[2], format!("umount {}", mount_point.join("data").display()));
        assert_eq!(calls[3], format!("umount {}", mount_point.display()));
    }

    #[test]
    fn failed_overlay_cleans_up_layer_dirs() {
        let mounter = RecordingMounter {
            fail_overlay: true,
            ..RecordingMounter::default()
        };
        let (_dir, manager) = setup(&mounter);

        let err = manager.create("busybox", "c1", None).unwrap_err();
        assert!(matches!(err, ShipyardError::Mount { .. }));
        assert!(!manager.write_layer("c1").exists());
        assert!(!manager.mount_point("c1").exists());
    }

    #[test]
    fn missing_image_is_fatal() {
        let mounter = RecordingMounter::default();
        let (_dir, manager) = setup(&mounter);
        assert!(manager.create("alpine", "c1", None).is_err());
        assert!(mounter.calls.borrow().is_empty());
    }

    #[test]
    fn destroy_of_unknown_container_is_clean() {
        let mounter = RecordingMounter::default();
        let (_dir, manager) = setup(&mounter);
        assert!(manager.destroy("ghost", None).is_clean());
    }
}
