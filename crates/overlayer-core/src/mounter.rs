//! The mount syscall boundary.
//!
//! [`SyscallMounter`] issues real `mount(2)`/`umount2(2)` calls.
//! [`DryRunMounter`] records what would have been done, for `--dry-run`
//! and for exercising the orchestrator without privileges.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use overlayer_common::error::{OverlayError, Result};

/// Mount operations needed to apply and revert overlays.
pub trait Mounter {
    /// Mounts a read-only overlay on `target` with the given colon-joined
    /// `lowerdir` list, tagged with `marker` as its source.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the mount.
    fn mount_overlay(&self, target: &Path, lowerdir: &str, marker: &str) -> Result<()>;

    /// Bind mounts `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the mount.
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()>;

    /// Mounts an empty read-only tmpfs on `target`, tagged with `marker`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the mount.
    fn mount_tmpfs(&self, target: &Path, marker: &str) -> Result<()>;

    /// Lazily detaches the topmost mount at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the unmount.
    fn detach(&self, target: &Path) -> Result<()>;

    /// Creates `dir` for use as a mount point, returning whether it was
    /// missing and had to be created.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_mount_point(&self, dir: &Path) -> Result<bool> {
        if dir.exists() {
            return Ok(false);
        }
        std::fs::create_dir_all(dir).map_err(|e| OverlayError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(true)
    }

    /// Removes a mount point directory created by
    /// [`Mounter::create_mount_point`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    fn remove_mount_point(&self, dir: &Path) -> Result<()> {
        std::fs::remove_dir(dir).map_err(|e| OverlayError::Io {
            path: dir.to_path_buf(),
            source: e,
        })
    }
}

/// Mounter backed by the Linux mount syscalls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallMounter;

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Mounter for SyscallMounter {
    fn mount_overlay(&self, target: &Path, lowerdir: &str, marker: &str) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        let opts = format!("lowerdir={lowerdir}");
        mount(
            Some(marker),
            target,
            Some(overlayer_common::constants::OVERLAY_FS_TYPE),
            MsFlags::MS_RDONLY,
            Some(opts.as_str()),
        )
        .map_err(|e| OverlayError::Mount {
            target: target.to_path_buf(),
            message: format!("overlay mount failed: {e}"),
        })
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(|e| OverlayError::Mount {
            target: target.to_path_buf(),
            message: format!("bind mount from {} failed: {e}", source.display()),
        })
    }

    fn mount_tmpfs(&self, target: &Path, marker: &str) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        mount(
            Some(marker),
            target,
            Some(overlayer_common::constants::TMPFS_FS_TYPE),
            MsFlags::MS_RDONLY,
            None::<&str>,
        )
        .map_err(|e| OverlayError::Mount {
            target: target.to_path_buf(),
            message: format!("tmpfs mount failed: {e}"),
        })
    }

    fn detach(&self, target: &Path) -> Result<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(|e| {
            OverlayError::Mount {
                target: target.to_path_buf(),
                message: format!("detach failed: {e}"),
            }
        })
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
impl Mounter for SyscallMounter {
    fn mount_overlay(&self, _target: &Path, _lowerdir: &str, _marker: &str) -> Result<()> {
        Err(unsupported())
    }

    fn bind_mount(&self, _source: &Path, _target: &Path) -> Result<()> {
        Err(unsupported())
    }

    fn mount_tmpfs(&self, _target: &Path, _marker: &str) -> Result<()> {
        Err(unsupported())
    }

    fn detach(&self, _target: &Path) -> Result<()> {
        Err(unsupported())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn unsupported() -> OverlayError {
    OverlayError::Config {
        message: "Linux required for mount operations".into(),
    }
}

/// A mount operation as seen by [`DryRunMounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    /// Read-only overlay mount.
    Overlay {
        /// Mount point.
        target: PathBuf,
        /// Colon-joined lower directories.
        lowerdir: String,
        /// Source tag.
        marker: String,
    },
    /// Bind mount.
    Bind {
        /// Content being aliased.
        source: PathBuf,
        /// Mount point.
        target: PathBuf,
    },
    /// Empty tmpfs mount.
    Tmpfs {
        /// Mount point.
        target: PathBuf,
        /// Source tag.
        marker: String,
    },
    /// Lazy detach.
    Detach {
        /// Mount point.
        target: PathBuf,
    },
}

/// Mounter that logs and records every call without touching the namespace.
#[derive(Debug, Default)]
pub struct DryRunMounter {
    calls: RefCell<Vec<MountCall>>,
}

impl DryRunMounter {
    /// Creates a mounter with an empty call log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: MountCall) {
        tracing::info!(call = ?call, "dry run: skipping mount syscall");
        self.calls.borrow_mut().push(call);
    }
}

impl Mounter for DryRunMounter {
    fn mount_overlay(&self, target: &Path, lowerdir: &str, marker: &str) -> Result<()> {
        self.record(MountCall::Overlay {
            target: target.to_path_buf(),
            lowerdir: lowerdir.to_owned(),
            marker: marker.to_owned(),
        });
        Ok(())
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        self.record(MountCall::Bind {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
        });
        Ok(())
    }

    fn mount_tmpfs(&self, target: &Path, marker: &str) -> Result<()> {
        self.record(MountCall::Tmpfs {
            target: target.to_path_buf(),
            marker: marker.to_owned(),
        });
        Ok(())
    }

    fn detach(&self, target: &Path) -> Result<()> {
        self.record(MountCall::Detach {
            target: target.to_path_buf(),
        });
        Ok(())
    }

    fn create_mount_point(&self, dir: &Path) -> Result<bool> {
        let missing = !dir.exists();
        tracing::info!(path = %dir.display(), missing, "dry run: skipping mount point creation");
        Ok(missing)
    }

    fn remove_mount_point(&self, dir: &Path) -> Result<()> {
        tracing::info!(path = %dir.display(), "dry run: skipping mount point removal");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn dry_run_records_calls_in_order() {
        let mounter = DryRunMounter::new();
        mounter
            .bind_mount(Path::new("/proc/self/fd/3"), Path::new("/system/app"))
            .expect("dry run never fails");
        mounter
            .detach(Path::new("/system/app"))
            .expect("dry run never fails");

        assert_eq!(
            mounter.calls(),
            vec![
                MountCall::Bind {
                    source: PathBuf::from("/proc/self/fd/3"),
                    target: PathBuf::from("/system/app"),
                },
                MountCall::Detach {
                    target: PathBuf::from("/system/app"),
                },
            ]
        );
    }

    #[test]
    fn dry_run_leaves_mount_points_alone() {
        let base = tempfile::tempdir().expect("tempdir");
        let dir = base.path().join("empty");
        let mounter = DryRunMounter::new();

        assert!(mounter.create_mount_point(&dir).expect("dry run never fails"));
        assert!(!dir.exists());

        std::fs::create_dir(&dir).expect("mkdir");
        mounter.remove_mount_point(&dir).expect("dry run never fails");
        assert!(dir.is_dir());
    }
}
