//! Path-to-mount resolution over a [`MountTree`].
//!
//! When several mounts sit at or above the same location, only the most
//! recently attached one is visible. Children are stored oldest first, so
//! every lookup walks them in reverse and the first match is the visible
//! mount. Prefix tests are per path component: `/ab` is not under `/a`.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use overlayer_common::error::{OverlayError, Result};

use crate::tree::{MountTree, NodeId};

impl MountTree {
    /// Finds the mount that currently governs `path`, searching the subtree
    /// rooted at `from`.
    ///
    /// Returns `None` if `path` is not inside `from`'s mount point.
    pub fn find_mount_for_path(&self, from: NodeId, path: &Path) -> Option<NodeId> {
        let node = self.node(from);
        if !path.starts_with(node.mount_point()) {
            return None;
        }
        node.children()
            .iter()
            .rev()
            .find_map(|&child| self.find_mount_for_path(child, path))
            .or(Some(from))
    }

    /// Finds the mount governing `path` anywhere in the namespace.
    pub fn resolve(&self, path: &Path) -> Option<NodeId> {
        self.find_mount_for_path(self.root(), path)
    }

    /// Lists the visible mounts attached strictly below `path`, one level
    /// deep, most recent first.
    ///
    /// The mount governing `path` is resolved first; each of its children
    /// nested under `path` is then resolved again at its own mount point so
    /// that a mount stacked on top of it is returned instead. Two children
    /// at the same mount point collapse to the most recent one.
    pub fn find_child_mounts_under_path(&self, from: NodeId, path: &Path) -> Vec<NodeId> {
        let Some(governing) = self.find_mount_for_path(from, path) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.node(governing)
            .children()
            .iter()
            .rev()
            .filter(|&&child| is_strictly_under(self.node(child).mount_point(), path))
            .filter_map(|&child| self.find_mount_for_path(child, self.node(child).mount_point()))
            .filter(|&visible| seen.insert(self.node(visible).mount_point()))
            .collect()
    }
}

fn is_strictly_under(candidate: &Path, path: &Path) -> bool {
    candidate != path && candidate.starts_with(path)
}

/// Lexically normalizes an absolute target path.
///
/// Drops `.` components and trailing separators. Symlinks are not followed.
///
/// # Errors
///
/// Returns [`OverlayError::Resolution`] if the path is relative or
/// contains `..`.
pub fn normalize_target(path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(OverlayError::Resolution {
            path: path.to_path_buf(),
        });
    }
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Normal(_) => normalized.push(component),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(OverlayError::Resolution {
                    path: path.to_path_buf(),
                });
            }
        }
    }
    Ok(normalized)
}
