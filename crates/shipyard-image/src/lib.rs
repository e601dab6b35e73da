//! # shipyard-image
//!
//! Image and layer management for the shipyard runtime.
//!
//! Handles:
//! - **Layers**: extracting `<image>.tar` archives, compressed or not.
//! - **Storage**: the on-disk layer store, populated at most once per image.
//! - **Commit**: packing a container's merged filesystem back into an archive.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod commit;
pub mod layer;
pub mod storage;
