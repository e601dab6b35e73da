//! Persistent container state.
//!
//! Each container owns `<run_dir>/<name>/config.json`. Records are written at
//! creation, changed only by `stop`, and deleted on removal. There is no
//! daemon: every invocation reads the records it needs from disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use shipyard_common::constants::{CONTAINER_INFO_FILE, CREATE_TIME_FORMAT};
use shipyard_common::error::{Result, ShipyardError};
use shipyard_common::types::{ContainerId, ContainerStatus};

/// Persisted record of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Random numeric identifier.
    pub id: ContainerId,
    /// Container name, also the record's directory name.
    pub name: String,
    /// Host pid of the init process; empty once stopped.
    pub pid: String,
    /// Space-joined command line.
    pub command: String,
    /// Lifecycle status.
    pub status: ContainerStatus,
    /// Local creation time, `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "createTime")]
    pub create_time: String,
    /// Volume binding as given on the command line, possibly empty.
    pub volume: String,
    /// Port mappings as given on the command line. Not acted upon.
    #[serde(rename = "portmapping")]
    pub port_mapping: Vec<String>,
}

impl ContainerInfo {
    /// Returns the recorded pid, if any.
    #[must_use]
    pub fn pid(&self) -> Option<i32> {
        self.pid.parse().ok()
    }
}

/// Reads and writes container records below a run directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    run_dir: PathBuf,
}

impl StateStore {
    /// Creates a store rooted at `run_dir`.
    #[must_use]
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    /// Returns the run directory.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Returns the directory holding a container's record and log.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.run_dir.join(name)
    }

    fn info_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(CONTAINER_INFO_FILE)
    }

    /// Checks whether a record exists for `name`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.info_path(name).is_file()
    }

    /// Records a freshly started container as running.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or taken, or if the record
    /// cannot be written.
    pub fn record(
        &self,
        pid: u32,
        command: &[String],
        name: &str,
        id: &ContainerId,
        volume: &str,
        port_mapping: &[String],
    ) -> Result<ContainerInfo> {
        validate_name(name)?;
        if self.exists(name) {
            return Err(ShipyardError::AlreadyExists {
                kind: "container",
                id: name.into(),
            });
        }
        let info = ContainerInfo {
            id: id.clone(),
            name: name.into(),
            pid: pid.to_string(),
            command: command.join(" "),
            status: ContainerStatus::Running,
            create_time: chrono::Local::now().format(CREATE_TIME_FORMAT).to_string(),
            volume: volume.into(),
            port_mapping: port_mapping.to_vec(),
        };
        self.save(&info)?;
        tracing::info!(name, id = %id, pid, "container recorded");
        Ok(info)
    }

    /// Loads the record of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing or unreadable.
    pub fn get(&self, name: &str) -> Result<ContainerInfo> {
        validate_name(name)?;
        let path = self.info_path(name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ShipyardError::NotFound {
                    kind: "container",
                    id: name.into(),
                }
            } else {
                ShipyardError::io(&path, e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Loads every readable record, sorted by name.
    ///
    /// Directories without a valid record are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the run directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerInfo>> {
        let entries = match std::fs::read_dir(&self.run_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ShipyardError::io(&self.run_dir, e)),
        };

        let mut infos = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ShipyardError::io(&self.run_dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.get(&name) {
                Ok(info) => infos.push(info),
                Err(e) => tracing::warn!(name, error = %e, "skipping unreadable container record"),
            }
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    /// Sends `SIGTERM` to the container's init process and marks it stopped.
    ///
    /// A process that is already gone still leaves the record stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be loaded or saved, or if the
    /// signal fails for a reason other than the process being gone. The
    /// record is unchanged in the latter case.
    pub fn stop(&self, name: &str) -> Result<ContainerInfo> {
        let mut info = self.get(name)?;
        if let Some(pid) = info.pid() {
            match kill(Pid::from_raw(pid), Signal::SIGTERM) {
                Ok(()) => tracing::info!(name, pid, "sent SIGTERM"),
                Err(Errno::ESRCH) => {
                    tracing::warn!(name, pid, "container process already gone");
                }
                Err(e) => {
                    return Err(ShipyardError::Signal {
                        pid,
                        message: e.to_string(),
                    });
                }
            }
        }
        info.status = ContainerStatus::Stopped;
        info.pid = String::new();
        self.save(&info)?;
        tracing::info!(name, "container stopped");
        Ok(info)
    }

    /// Removes the record of a stopped container.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if the container is not stopped, or an
    /// error if the record cannot be read or deleted.
    pub fn remove(&self, name: &str) -> Result<()> {
        let info = self.get(name)?;
        if info.status != ContainerStatus::Stopped {
            return Err(ShipyardError::Precondition {
                message: format!("container {name} is {}; stop it first", info.status),
            });
        }
        self.delete(name)
    }

    /// Deletes a container's directory regardless of its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.container_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(ShipyardError::io(dir, e)),
            _ => {
                tracing::info!(name, "container record removed");
                Ok(())
            }
        }
    }

    /// Writes the record to a sibling file, then renames it into place.
    fn save(&self, info: &ContainerInfo) -> Result<()> {
        let dir = self.container_dir(&info.name);
        std::fs::create_dir_all(&dir).map_err(|e| ShipyardError::io(&dir, e))?;
        let path = self.info_path(&info.name);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(info)?;
        std::fs::write(&tmp, content).map_err(|e| ShipyardError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| ShipyardError::io(&path, e))
    }
}

/// Rejects container names that would escape the run directory.
///
/// # Errors
///
/// Returns an error if the name is empty, contains a path separator, or is
/// a relative path component.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(ShipyardError::Config {
            message: format!("invalid container name: {name:?}"),
        });
    }
    Ok(())
}
