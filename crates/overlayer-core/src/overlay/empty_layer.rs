//! A lazily created, self-cleaning empty lower layer.
//!
//! An overlay without an upper directory needs at least two lower layers.
//! When no module contributes to a mount point, an empty read-only tmpfs
//! stands in as the first layer so the node can still be overlaid instead
//! of bind mounted.

use std::path::{Path, PathBuf};

use overlayer_common::error::Result;

use crate::mounter::Mounter;

/// An empty tmpfs mounted for the lifetime of this value.
///
/// Dropping it detaches the tmpfs and removes the directory if it was
/// created here. Overlays already using it as a lower layer keep working.
pub struct EmptyLayer<'m, M: Mounter + ?Sized> {
    dir: PathBuf,
    created_dir: bool,
    mounter: &'m M,
}

impl<'m, M: Mounter + ?Sized> EmptyLayer<'m, M> {
    /// Creates `dir` if needed and mounts an empty tmpfs on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the tmpfs
    /// cannot be mounted. A directory created here is removed again on
    /// failure.
    pub fn create(dir: &Path, marker: &str, mounter: &'m M) -> Result<Self> {
        let created_dir = mounter.create_mount_point(dir)?;
        if let Err(e) = mounter.mount_tmpfs(dir, marker) {
            if created_dir {
                remove_dir_logged(mounter, dir);
            }
            return Err(e);
        }
        tracing::info!(path = %dir.display(), "mounted empty layer");
        Ok(Self {
            dir: dir.to_path_buf(),
            created_dir,
            mounter,
        })
    }

    /// Where the empty layer is mounted.
    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl<M: Mounter + ?Sized> Drop for EmptyLayer<'_, M> {
    fn drop(&mut self) {
        match self.mounter.detach(&self.dir) {
            Ok(()) => tracing::info!(path = %self.dir.display(), "released empty layer"),
            Err(e) => tracing::warn!(error = %e, "failed to release empty layer"),
        }
        if self.created_dir {
            remove_dir_logged(self.mounter, &self.dir);
        }
    }
}

fn remove_dir_logged<M: Mounter + ?Sized>(mounter: &M, dir: &Path) {
    if let Err(e) = mounter.remove_mount_point(dir) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to remove empty layer directory");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::mounter::{DryRunMounter, MountCall};

    /// Records mount calls but creates and removes mount point directories
    /// for real.
    #[derive(Default)]
    struct RecordingWithDirs(DryRunMounter);

    impl Mounter for RecordingWithDirs {
        fn mount_overlay(&self, target: &Path, lowerdir: &str, marker: &str) -> Result<()> {
            self.0.mount_overlay(target, lowerdir, marker)
        }

        fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
            self.0.bind_mount(source, target)
        }

        fn mount_tmpfs(&self, target: &Path, marker: &str) -> Result<()> {
            self.0.mount_tmpfs(target, marker)
        }

        fn detach(&self, target: &Path) -> Result<()> {
            self.0.detach(target)
        }
    }

    #[test]
    fn drop_detaches_and_removes_created_directory() {
        let base = tempfile::tempdir().expect("tempdir");
        let dir = base.path().join("empty");
        let mounter = RecordingWithDirs::default();

        {
            let layer = EmptyLayer::create(&dir, "overlayer", &mounter).expect("should create");
            assert_eq!(layer.path(), dir);
            assert!(dir.is_dir());
        }

        assert!(!dir.exists());
        assert_eq!(
            mounter.0.calls(),
            vec![
                MountCall::Tmpfs {
                    target: dir.clone(),
                    marker: "overlayer".into(),
                },
                MountCall::Detach { target: dir },
            ]
        );
    }

    #[test]
    fn existing_directory_is_left_in_place() {
        let base = tempfile::tempdir().expect("tempdir");
        let mounter = RecordingWithDirs::default();

        drop(EmptyLayer::create(base.path(), "overlayer", &mounter).expect("should create"));

        assert!(base.path().is_dir());
        assert_eq!(mounter.0.calls().len(), 2);
    }

    #[test]
    fn dry_run_never_creates_the_directory() {
        let base = tempfile::tempdir().expect("tempdir");
        let dir = base.path().join("empty");
        let mounter = DryRunMounter::new();

        {
            let _layer = EmptyLayer::create(&dir, "overlayer", &mounter).expect("should create");
            assert!(!dir.exists());
        }

        assert!(!dir.exists());
        assert_eq!(mounter.calls().len(), 2);
    }
}
