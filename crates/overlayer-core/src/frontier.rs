//! Collection of the mounts that each need their own overlay when a whole
//! subtree is covered.
//!
//! An overlay only covers the filesystem it is mounted on. Every mount
//! nested below the target hides part of the overlay and has to be covered
//! again on its own, after its parent.

use std::path::Path;

use crate::tree::{MountTree, NodeId};

impl MountTree {
    /// Collects `from` and every visible mount nested beneath `path`,
    /// innermost first and `from` last.
    ///
    /// Read the result in reverse to process outer mounts before inner ones.
    pub fn find_top_most_mounts_under_path(&self, from: NodeId, path: &Path) -> Vec<NodeId> {
        let mut frontier = Vec::new();
        self.collect_frontier(&mut frontier, from, path);
        frontier
    }

    fn collect_frontier(&self, frontier: &mut Vec<NodeId>, from: NodeId, path: &Path) {
        for child in self.find_child_mounts_under_path(from, path) {
            self.collect_frontier(frontier, child, self.node(child).mount_point());
        }
        frontier.push(from);
    }

    /// The frontier for `path` in processing order: the mount governing
    /// `from` first, then nested mounts outer to inner.
    pub fn frontier_outermost_first(&self, from: NodeId, path: &Path) -> Vec<NodeId> {
        let mut frontier = self.find_top_most_mounts_under_path(from, path);
        frontier.reverse();
        frontier
    }
}
