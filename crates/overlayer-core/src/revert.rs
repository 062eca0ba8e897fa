//! Removal of every mount overlayer created.
//!
//! Created mounts are recognised purely by their source tag. Bind mounts
//! carry the source of the content they alias, so they are never matched.
//! Binds stacked under a marked overlay go away with it. Binds made where
//! the outermost mount itself was bound (no module contributed and the
//! empty layer was off, or the overlay fell back) are left in place.
//! Apply with the empty layer enabled for a fully revertable result.

use std::path::PathBuf;

use overlayer_common::error::{OverlayError, Result};

use crate::mounter::Mounter;
use crate::tree::MountTree;

/// Outcome of a successful revert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevertReport {
    /// Number of marked mounts detached.
    pub detached: usize,
}

/// Detaches marked mounts, innermost first.
pub struct RevertScanner<'a, M: Mounter + ?Sized> {
    mounter: &'a M,
    marker: &'a str,
}

impl<'a, M: Mounter + ?Sized> RevertScanner<'a, M> {
    /// Creates a scanner matching mounts whose source equals `marker`.
    pub const fn new(mounter: &'a M, marker: &'a str) -> Self {
        Self { mounter, marker }
    }

    /// Lazily detaches every marked mount in `tree`.
    ///
    /// Every candidate is attempted even after a failure.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Unmount`] listing each mount point whose
    /// detach failed.
    pub fn run(&self, tree: &MountTree) -> Result<RevertReport> {
        let mut report = RevertReport::default();
        let mut failed: Vec<PathBuf> = Vec::new();
        for id in tree.post_order() {
            let record = &tree.node(id).record;
            if record.source != self.marker {
                continue;
            }
            tracing::info!(mount_point = %record.mount_point.display(), "unmounting");
            match self.mounter.detach(&record.mount_point) {
                Ok(()) => report.detached += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to unmount");
                    failed.push(record.mount_point.clone());
                }
            }
        }
        if failed.is_empty() {
            Ok(report)
        } else {
            Err(OverlayError::Unmount { failed })
        }
    }
}
