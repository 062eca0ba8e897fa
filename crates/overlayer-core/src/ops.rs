//! Top-level operations driven by the CLI.
//!
//! Each operation reads the mount table fresh from
//! [`Settings::mountinfo_path`]; nothing is cached between calls.

use std::path::{Path, PathBuf};

use overlayer_common::config::Settings;
use overlayer_common::error::{OverlayError, Result};

use crate::mounter::Mounter;
use crate::mountinfo::MountRecord;
use crate::overlay::{ApplyReport, OverlayOrchestrator};
use crate::resolve::normalize_target;
use crate::revert::{RevertReport, RevertScanner};
use crate::tree::MountTree;

/// Overlays `modules` onto `target` and every mount nested beneath it.
///
/// # Errors
///
/// Returns an error if the settings are invalid, the target cannot be
/// normalized or resolved, the mount table cannot be read, or a mount
/// fails without a usable fallback.
pub fn apply<M: Mounter + ?Sized>(
    settings: &Settings,
    mounter: &M,
    target: &Path,
    modules: &[PathBuf],
) -> Result<ApplyReport> {
    settings.validate()?;
    let target = normalize_target(target)?;
    let tree = MountTree::from_path(&settings.mountinfo_path)?;
    let governing = tree
        .resolve(&target)
        .ok_or_else(|| OverlayError::Resolution {
            path: target.clone(),
        })?;
    let frontier = tree.frontier_outermost_first(governing, &target);
    tracing::info!(
        target = %target.display(),
        governing = %tree.node(governing).record,
        mounts = frontier.len(),
        modules = modules.len(),
        "applying overlays"
    );

    let report =
        OverlayOrchestrator::new(mounter, settings).run(&tree, &target, &frontier, modules)?;
    tracing::info!(
        overlaid = report.overlaid(),
        bound = report.bound(),
        skipped = report.skipped(),
        "overlays applied"
    );
    Ok(report)
}

/// Detaches every mount tagged with the configured marker.
///
/// # Errors
///
/// Returns an error if the settings are invalid, the mount table cannot
/// be read, or any marked mount fails to detach.
pub fn revert<M: Mounter + ?Sized>(settings: &Settings, mounter: &M) -> Result<RevertReport> {
    settings.validate()?;
    let tree = MountTree::from_path(&settings.mountinfo_path)?;
    let report = RevertScanner::new(mounter, &settings.marker).run(&tree)?;
    tracing::info!(detached = report.detached, "revert complete");
    Ok(report)
}

/// Builds the mount tree from the configured mount table.
///
/// # Errors
///
/// Returns an error if the mount table cannot be read or parsed.
pub fn dump_tree(settings: &Settings) -> Result<MountTree> {
    MountTree::from_path(&settings.mountinfo_path)
}

/// Records of the mounts an apply on `target` would cover, outer to inner.
///
/// # Errors
///
/// Returns an error if the target is invalid or cannot be resolved, or
/// the mount table cannot be read.
pub fn list_frontier(settings: &Settings, target: &Path) -> Result<Vec<MountRecord>> {
    let target = normalize_target(target)?;
    let tree = MountTree::from_path(&settings.mountinfo_path)?;
    let governing = tree
        .resolve(&target)
        .ok_or_else(|| OverlayError::Resolution {
            path: target.clone(),
        })?;
    Ok(tree
        .frontier_outermost_first(governing, &target)
        .into_iter()
        .map(|id| tree.node(id).record.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::mounter::{DryRunMounter, MountCall};

    fn settings_with_table(dir: &Path, table: &str) -> Settings {
        let path = dir.join("mountinfo");
        std::fs::write(&path, table).expect("write mountinfo");
        Settings {
            mountinfo_path: path,
            ..Settings::default()
        }
    }

    #[test]
    fn list_frontier_orders_outer_to_inner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_with_table(
            dir.path(),
            "\
1 0 8:1 / / rw - ext4 /dev/sda1 rw
2 1 8:2 / /system rw - ext4 /dev/sda2 rw
3 2 8:3 / /system/app rw - ext4 /dev/sda3 rw
4 1 8:4 / /vendor rw - ext4 /dev/sda4 rw
",
        );

        let records = list_frontier(&settings, Path::new("/system/")).expect("should list");
        let points: Vec<&Path> = records.iter().map(|r| r.mount_point.as_path()).collect();
        assert_eq!(points, vec![Path::new("/system"), Path::new("/system/app")]);
    }

    #[test]
    fn target_outside_table_root_fails_to_resolve() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_with_table(dir.path(), "1 0 0:9 / /chroot rw - tmpfs tmpfs rw\n");

        let err = list_frontier(&settings, Path::new("/system")).expect_err("should fail");
        assert!(matches!(err, OverlayError::Resolution { .. }));
    }

    #[test]
    fn revert_detaches_only_marked_mounts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_with_table(
            dir.path(),
            "\
1 0 8:1 / / rw - ext4 /dev/sda1 rw
2 1 0:40 / /system ro - overlay overlayer ro,lowerdir=/m/system:/system
3 1 0:41 / /vendor ro - overlay KSU ro,lowerdir=/k/vendor:/vendor
",
        );
        let mounter = DryRunMounter::new();

        let report = revert(&settings, &mounter).expect("should revert");
        assert_eq!(report.detached, 1);
        assert_eq!(
            mounter.calls(),
            vec![MountCall::Detach {
                target: PathBuf::from("/system"),
            }]
        );
    }

    #[test]
    fn apply_rejects_invalid_settings_before_reading_table() {
        let settings = Settings {
            marker: String::new(),
            mountinfo_path: PathBuf::from("/nonexistent/mountinfo"),
            ..Settings::default()
        };
        let mounter = DryRunMounter::new();

        let err = apply(&settings, &mounter, Path::new("/system"), &[]).expect_err("should fail");
        assert!(matches!(err, OverlayError::Config { .. }));
        assert!(mounter.calls().is_empty());
    }

    #[test]
    fn apply_rejects_relative_target() {
        let mounter = DryRunMounter::new();
        let err = apply(&Settings::default(), &mounter, Path::new("system"), &[])
            .expect_err("should fail");
        assert!(matches!(err, OverlayError::Resolution { .. }));
    }
}
