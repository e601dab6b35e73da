//! Domain primitive types used across the shipyard workspace.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::CONTAINER_ID_LENGTH;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random numeric container ID of fixed length.
    ///
    /// Collisions with existing IDs are not checked.
    #[must_use]
    pub fn generate() -> Self {
        let modulus = 10_u128.pow(u32::try_from(CONTAINER_ID_LENGTH).unwrap_or(10));
        let value = uuid::Uuid::new_v4().as_u128() % modulus;
        Self(format!("{value:0width$}", width = CONTAINER_ID_LENGTH))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a container as persisted in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The container's init process was started.
    Running,
    /// The container was stopped through the runtime.
    Stopped,
    /// The container's process exited on its own.
    Exited,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Resource limits requested for a container.
///
/// Values are passed to the kernel verbatim; `None` leaves the dimension
/// unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Memory ceiling in kernel byte-size syntax (e.g. `100m`).
    pub memory_limit: Option<String>,
    /// Relative CPU weight (e.g. `512`).
    pub cpu_share: Option<String>,
    /// CPU list or mask (e.g. `0-1`).
    pub cpu_set: Option<String>,
}

impl ResourceSpec {
    /// Builds a spec from raw flag values, treating empty strings as unset.
    #[must_use]
    pub fn from_flags(memory_limit: &str, cpu_share: &str, cpu_set: &str) -> Self {
        Self {
            memory_limit: non_empty(memory_limit),
            cpu_share: non_empty(cpu_share),
            cpu_set: non_empty(cpu_set),
        }
    }

    /// Returns `true` when no dimension is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.memory_limit.is_none() && self.cpu_share.is_none() && self.cpu_set.is_none()
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// A `hostPath:containerPath` bind-mount request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Directory on the host.
    pub host: PathBuf,
    /// Directory inside the container, interpreted relative to its root.
    pub container: PathBuf,
}

impl VolumeSpec {
    /// Parses a `host:container` pair.
    ///
    /// Returns `None` when the value is empty or either side is missing.
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        let (host, container) = spec.trim().split_once(':')?;
        if host.is_empty() || container.is_empty() || container.contains(':') {
            return None;
        }
        Some(Self {
            host: PathBuf::from(host),
            container: PathBuf::from(container),
        })
    }

    /// Resolves the container side against a container root directory.
    ///
    /// Leading `/` is ignored so absolute container paths stay inside `root`.
    #[must_use]
    pub fn target_in(&self, root: &Path) -> PathBuf {
        let relative = self
            .container
            .strip_prefix("/")
            .unwrap_or(self.container.as_path());
        root.join(relative)
    }
}

impl fmt::Display for VolumeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_fixed_length_digits() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), CONTAINER_ID_LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ContainerStatus::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
        let back: ContainerStatus = serde_json::from_str("\"exited\"").unwrap();
        assert_eq!(back, ContainerStatus::Exited);
    }

    #[test]
    fn resource_spec_from_flags_drops_empty_values() {
        let spec = ResourceSpec::from_flags("100m", "", "");
        assert_eq!(spec.memory_limit.as_deref(), Some("100m"));
        assert!(spec.cpu_share.is_none());
        assert!(spec.cpu_set.is_none());
        assert!(ResourceSpec::from_flags("", "", "").is_empty());
    }

    #[test]
    fn resource_spec_keeps_values_verbatim() {
        let spec = ResourceSpec::from_flags(" 100m", "512\n", " ");
        assert_eq!(spec.memory_limit.as_deref(), Some(" 100m"));
        assert_eq!(spec.cpu_share.as_deref(), Some("512\n"));
        assert_eq!(spec.cpu_set.as_deref(), Some(" "));
    }

    #[test]
    fn volume_spec_parses_pair() {
        let v = VolumeSpec::parse("/root/data:/data").unwrap();
        assert_eq!(v.host, PathBuf::from("/root/data"));
        assert_eq!(v.container, PathBuf::from("/data"));
        assert_eq!(v.to_string(), "/root/data:/data");
    }

    #[test]
    fn volume_spec_rejects_malformed_values() {
        assert!(VolumeSpec::parse("").is_none());
        assert!(VolumeSpec::parse("/only-host").is_none());
        assert!(VolumeSpec::parse(":/data").is_none());
        assert!(VolumeSpec::parse("/a:/b:/c").is_none());
    }

    #[test]
    fn volume_target_stays_under_root() {
        let v = VolumeSpec::parse("/host:/data/in").unwrap();
        assert_eq!(
            v.target_in(Path::new("/mnt/c1")),
            PathBuf::from("/mnt/c1/data/in")
        );
    }
}
