//! Arena-backed mount tree assembled from mount table records.
//!
//! Nodes live in a flat vector in table order and refer to their children
//! by [`NodeId`]. The tree is built once per operation from live kernel
//! state and never mutated afterwards.

use std::collections::HashMap;
use std::path::Path;

use overlayer_common::error::{OverlayError, Result};
use overlayer_common::types::MountId;
use serde::Serialize;

use crate::mountinfo::{self, MountRecord};

/// Index of a node inside a [`MountTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A mount and the mounts attached directly beneath it.
#[derive(Debug, Clone)]
pub struct MountNode {
    /// The mount table record for this mount.
    pub record: MountRecord,
    /// Child mounts, oldest first.
    children: Vec<NodeId>,
}

impl MountNode {
    /// Child mounts in the order they were attached, oldest first.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Shorthand for the record's mount point.
    pub fn mount_point(&self) -> &Path {
        &self.record.mount_point
    }
}

/// The mount namespace as a rooted tree.
#[derive(Debug, Clone)]
pub struct MountTree {
    nodes: Vec<MountNode>,
    by_id: HashMap<MountId, NodeId>,
    root: NodeId,
}

/// Owned, nested copy of a tree, for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct MountSnapshot {
    /// The mount table record.
    #[serde(flatten)]
    pub record: MountRecord,
    /// Child mounts, oldest first.
    pub children: Vec<MountSnapshot>,
}

impl MountTree {
    /// Links records into a tree by parent id.
    ///
    /// Children keep table order, so a later mount at the same or a nested
    /// location always follows an earlier one. The root is the first record
    /// that is its own parent or whose parent is absent from the table.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::NoRoot`] if no record qualifies as root.
    pub fn build(records: Vec<MountRecord>) -> Result<Self> {
        let by_id: HashMap<MountId, NodeId> = records
            .iter()
            .enumerate()
            .map(|(index, record)| (record.id, NodeId(index)))
            .collect();
        let mut nodes: Vec<MountNode> = records
            .into_iter()
            .map(|record| MountNode {
                record,
                children: Vec::new(),
            })
            .collect();

        let mut root = None;
        for index in 0..nodes.len() {
            let id = nodes[index].record.id;
            let parent_id = nodes[index].record.parent_id;
            let parent = by_id.get(&parent_id).copied();
            if let Some(parent) = parent.filter(|_| parent_id != id) {
                nodes[parent.0].children.push(NodeId(index));
            }
            if parent_id == id || parent.is_none() {
                if root.is_none() {
                    root = Some(NodeId(index));
                } else {
                    tracing::warn!(
                        id = %id,
                        mount_point = %nodes[index].record.mount_point.display(),
                        "ignoring additional root mount candidate"
                    );
                }
            }
        }

        let root = root.ok_or(OverlayError::NoRoot)?;
        tracing::debug!(
            mounts = nodes.len(),
            root = %nodes[root.0].record.mount_point.display(),
            "built mount tree"
        );
        Ok(Self { nodes, by_id, root })
    }

    /// Parses mount table text and builds the tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is malformed or has no root.
    pub fn parse(text: &str) -> Result<Self> {
        Self::build(mountinfo::parse_mountinfo(text)?)
    }

    /// Reads a mount table file and builds the tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or has no
    /// root.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::build(mountinfo::read_mountinfo(path)?)
    }

    /// Builds the tree of another process's mount namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the process's mount table cannot be read or
    /// parsed.
    pub fn from_pid(pid: u32) -> Result<Self> {
        let path = overlayer_common::constants::mountinfo_path_for_pid(pid);
        Self::from_path(Path::new(&path))
    }

    /// The namespace root.
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the node behind an id handed out by this tree.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different tree.
    pub fn node(&self, id: NodeId) -> &MountNode {
        &self.nodes[id.0]
    }

    /// Looks a node up by its kernel mount id.
    pub fn find(&self, id: MountId) -> Option<NodeId> {
        self.by_id.get(&id).copied()
    }

    /// Number of mounts in the tree, including ones unreachable from root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree is only built when a root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node reachable from root, each after all of its descendants.
    ///
    /// Siblings are visited most recent first, so mounts stacked later are
    /// released before the ones they cover.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.push_post_order(self.root, &mut order);
        order
    }

    fn push_post_order(&self, id: NodeId, order: &mut Vec<NodeId>) {
        for &child in self.node(id).children.iter().rev() {
            self.push_post_order(child, order);
        }
        order.push(id);
    }

    /// Every node reachable from root with its depth, parents first.
    pub fn pre_order(&self) -> Vec<(NodeId, usize)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, 0)];
        while let Some((id, depth)) = stack.pop() {
            order.push((id, depth));
            stack.extend(self.node(id).children.iter().rev().map(|&c| (c, depth + 1)));
        }
        order
    }

    /// Copies the reachable tree into an owned nested structure.
    pub fn snapshot(&self) -> MountSnapshot {
        self.snapshot_from(self.root)
    }

    fn snapshot_from(&self, id: NodeId) -> MountSnapshot {
        let node = self.node(id);
        MountSnapshot {
            record: node.record.clone(),
            children: node
                .children
                .iter()
                .map(|&child| self.snapshot_from(child))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    const TABLE: &str = "\
20 1 8:1 / / rw - ext4 /dev/sda1 rw
21 20 0:5 / /proc rw - proc proc rw
22 20 0:6 / /sys rw - sysfs sysfs rw
23 22 0:7 / /sys/fs/cgroup rw - cgroup2 cgroup2 rw
24 20 0:8 / /tmp rw - tmpfs tmpfs rw
";

    fn mount_point(tree: &MountTree, id: NodeId) -> String {
        tree.node(id).mount_point().display().to_string()
    }

    #[test]
    fn builds_one_node_per_record() {
        let tree = MountTree::parse(TABLE).expect("should build");
        assert_eq!(tree.len(), 5);
        assert_eq!(mount_point(&tree, tree.root()), "/");
    }

    #[test]
    fn links_children_in_table_order() {
        let tree = MountTree::parse(TABLE).expect("should build");
        let children: Vec<String> = tree
            .node(tree.root())
            .children()
            .iter()
            .map(|&c| mount_point(&tree, c))
            .collect();
        assert_eq!(children, vec!["/proc", "/sys", "/tmp"]);

        let sys = tree.find(MountId::new(22)).expect("sys exists");
        assert_eq!(tree.node(sys).children().len(), 1);
    }

    #[test]
    fn every_child_matches_its_parent_id() {
        let tree = MountTree::parse(TABLE).expect("should build");
        for (id, _) in tree.pre_order() {
            let node = tree.node(id);
            for &child in node.children() {
                assert_eq!(tree.node(child).record.parent_id, node.record.id);
            }
        }
    }

    #[test]
    fn self_parented_record_is_root() {
        let text = "\
5 1 0:9 / /mnt rw - tmpfs tmpfs rw
1 1 8:1 / / rw - ext4 /dev/sda1 rw
";
        let tree = MountTree::parse(text).expect("should build");
        assert_eq!(mount_point(&tree, tree.root()), "/");
        assert_eq!(tree.node(tree.root()).children().len(), 1);
    }

    #[test]
    fn first_root_candidate_wins() {
        let text = "\
1 0 8:1 / / rw - ext4 /dev/sda1 rw
7 99 0:9 / /orphan rw - tmpfs tmpfs rw
";
        let tree = MountTree::parse(text).expect("should build");
        assert_eq!(mount_point(&tree, tree.root()), "/");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn cycle_without_root_fails() {
        let text = "\
1 2 8:1 / / rw - ext4 /dev/sda1 rw
2 1 0:9 / /a rw - tmpfs tmpfs rw
";
        let err = MountTree::parse(text).expect_err("no root");
        assert!(matches!(err, OverlayError::NoRoot));
    }

    #[test]
    fn empty_table_has_no_root() {
        assert!(matches!(MountTree::parse(""), Err(OverlayError::NoRoot)));
    }

    #[test]
    fn post_order_visits_descendants_first() {
        let tree = MountTree::parse(TABLE).expect("should build");
        let order: Vec<String> = tree
            .post_order()
            .into_iter()
            .map(|id| mount_point(&tree, id))
            .collect();
        assert_eq!(
            order,
            vec!["/tmp", "/sys/fs/cgroup", "/sys", "/proc", "/"]
        );
    }

    #[test]
    fn pre_order_reports_depth() {
        let tree = MountTree::parse(TABLE).expect("should build");
        let order: Vec<(String, usize)> = tree
            .pre_order()
            .into_iter()
            .map(|(id, depth)| (mount_point(&tree, id), depth))
            .collect();
        assert_eq!(
            order,
            vec![
                ("/".to_owned(), 0),
                ("/proc".to_owned(), 1),
                ("/sys".to_owned(), 1),
                ("/sys/fs/cgroup".to_owned(), 2),
                ("/tmp".to_owned(), 1),
            ]
        );
    }

    #[test]
    fn snapshot_nests_children() {
        let tree = MountTree::parse(TABLE).expect("should build");
        let snapshot = tree.snapshot();
        assert_eq!(snapshot.children.len(), 3);
        assert_eq!(
            snapshot.children[1].children[0].record.mount_point,
            Path::new("/sys/fs/cgroup")
        );
    }
}
