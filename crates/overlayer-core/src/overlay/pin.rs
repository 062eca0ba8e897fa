//! Stable references to pre-overlay content.
//!
//! Once a directory is overlaid its original content can no longer be
//! reached by path. A handle opened beforehand keeps pointing at it and can
//! be handed back to the kernel as a mount source through `/proc/self/fd`.

use std::fs::{File, Metadata};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use overlayer_common::error::{OverlayError, Result};

#[cfg(any(target_os = "linux", target_os = "android"))]
const PIN_FLAGS: libc::c_int = libc::O_PATH;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const PIN_FLAGS: libc::c_int = 0;

/// A path-only handle on a mount point's original content.
///
/// The handle is closed when the value is dropped.
#[derive(Debug)]
pub struct PinnedContent {
    path: PathBuf,
    file: File,
}

impl PinnedContent {
    /// Opens a path-only handle on `path` without reading or truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        // read(true) is required by std even though O_PATH ignores the access mode
        let file = File::options()
            .read(true)
            .custom_flags(PIN_FLAGS)
            .open(path)
            .map_err(|e| OverlayError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        tracing::debug!(
            path = %path.display(),
            fd = file.as_raw_fd(),
            "pinned original content"
        );
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// The path the handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path that resolves to the pinned content regardless of what has
    /// since been mounted over [`Self::path`].
    pub fn as_mount_source(&self) -> PathBuf {
        Path::new(overlayer_common::constants::PROC_SELF_FD)
            .join(self.file.as_raw_fd().to_string())
    }

    /// Metadata of the pinned content.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be stat'ed.
    pub fn metadata(&self) -> Result<Metadata> {
        self.file.metadata().map_err(|e| OverlayError::Stat {
            path: self.path.clone(),
            source: e,
        })
    }
}
