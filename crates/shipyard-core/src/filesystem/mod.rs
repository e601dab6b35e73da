//! Filesystem management for container isolation.
//!
//! Provides `OverlayFS` layering, bind and `/proc` mounts, and `pivot_root`
//! for switching into the assembled root filesystem.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;

pub use mount::{Mounter, SyscallMounter};
pub use overlayfs::OverlayConfig;
