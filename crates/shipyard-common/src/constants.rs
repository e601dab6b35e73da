//! System-wide constants and default paths.

/// Default base directory for image archives, layers, and writable layers.
pub const DEFAULT_ROOT_DIR: &str = "/var/lib/shipyard";

/// Default directory under which container mount points are created.
pub const DEFAULT_MNT_DIR: &str = "/var/lib/shipyard/mnt";

/// Default run-state directory holding one record directory per container.
pub const DEFAULT_RUN_DIR: &str = "/var/run/shipyard";

/// Cgroup v1 hierarchy root; each controller is mounted beneath it.
pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Path used to re-invoke the running binary.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Sub-command the runtime re-invokes itself with inside the new namespaces.
pub const INIT_SUBCOMMAND: &str = "init";

/// Sub-command the runtime re-invokes itself with to enter a container.
pub const EXEC_SUBCOMMAND: &str = "exec";

/// File descriptor number on which the init process receives its command.
pub const INIT_PIPE_FD: i32 = 3;

/// Search path used to resolve the startup program inside the container.
pub const CONTAINER_BIN_PATH: &str = "/bin";

/// Directory (under the root directory) holding extracted image layers.
pub const LAYERS_DIR: &str = "layers";

/// Directory (under the root directory) holding per-container writable layers.
pub const WRITE_LAYER_DIR: &str = "writeLayer";

/// Directory (under the root directory) holding overlayfs work directories.
pub const WORK_DIR: &str = "work";

/// Extension of image archives.
pub const IMAGE_ARCHIVE_EXTENSION: &str = "tar";

/// Name of the metadata file inside a container's record directory.
pub const CONTAINER_INFO_FILE: &str = "config.json";

/// Name of the detached-mode log file inside a container's record directory.
pub const CONTAINER_LOG_FILE: &str = "container.log";

/// Number of digits in a generated container ID.
pub const CONTAINER_ID_LENGTH: usize = 10;

/// Timestamp format of `createTime` in container records.
pub const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Environment variable carrying the target pid to the exec re-invocation.
pub const EXEC_PID_ENV: &str = "SHIPYARD_EXEC_PID";

/// Environment variable carrying the command to the exec re-invocation.
pub const EXEC_CMD_ENV: &str = "SHIPYARD_EXEC_CMD";

/// Application name, also the prefix of every managed cgroup group.
pub const APP_NAME: &str = "shipyard";
