//! # shipyard-core
//!
//! Low-level Linux isolation primitives for the shipyard runtime.
//!
//! This crate provides safe abstractions over:
//! - **Cgroups**: memory, CPU share, and CPU set controllers behind one manager.
//! - **Namespaces**: spawning into new UTS, PID, mount, network, and IPC
//!   namespaces, and joining the namespaces of a running process.
//! - **Filesystem**: `OverlayFS` and bind mounts, `/proc`, and `pivot_root`.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! proper error handling and `// SAFETY:` documentation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
