//! Container lifecycle management for the shipyard runtime.
//!
//! Assembles container workspaces, launches the isolated init process,
//! bridges `exec` into running containers, and keeps one state record per
//! container under the run directory.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod exec;
pub mod init;
pub mod logs;
pub mod process;
pub mod state;
pub mod workspace;
