//! # overlayer-core
//!
//! Layers read-only module content over an already-mounted subtree of the
//! live filesystem, and takes it away again.
//!
//! The pipeline, leaf first:
//! - **Mount table parsing**: the kernel's `mountinfo` text becomes a list
//!   of [`mountinfo::MountRecord`]s.
//! - **Mount tree**: records are linked into an arena-backed
//!   [`tree::MountTree`] by parent id.
//! - **Resolution**: which mount governs a path, and which nested mounts
//!   lie beneath it, honouring mount shadowing.
//! - **Frontier**: every mount that needs its own overlay when covering a
//!   whole subtree.
//! - **Orchestration**: pins original content, then overlays (or binds)
//!   each frontier mount outer to inner.
//! - **Revert**: detaches every mount carrying the overlayer marker.
//!
//! All mount syscalls go through the [`mounter::Mounter`] trait.

pub mod frontier;
pub mod mounter;
pub mod mountinfo;
pub mod ops;
pub mod overlay;
pub mod resolve;
pub mod revert;
pub mod tree;
