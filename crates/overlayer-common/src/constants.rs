//! System-wide constants and default paths.

/// Source string stamped on every mount created by overlayer.
///
/// The revert scanner only detaches mounts whose source equals this tag,
/// so it must never match a legitimate mount source in the namespace.
pub const DEFAULT_MOUNT_MARKER: &str = "overlayer";

/// Mount table of the calling process.
pub const DEFAULT_MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Where the empty read-only tmpfs layer is mounted when it is needed.
pub const DEFAULT_EMPTY_LAYER_DIR: &str = "/dev/.overlayer-empty";

/// Filesystem type passed to `mount(2)` for overlay mounts.
pub const OVERLAY_FS_TYPE: &str = "overlay";

/// Filesystem type used for the empty layer.
pub const TMPFS_FS_TYPE: &str = "tmpfs";

/// Process-local directory exposing open file descriptors as paths.
pub const PROC_SELF_FD: &str = "/proc/self/fd";

/// Environment variable overriding the mount marker.
pub const ENV_MARKER: &str = "OVERLAYER_MARKER";

/// Environment variable overriding the mount table path.
pub const ENV_MOUNTINFO: &str = "OVERLAYER_MOUNTINFO";

/// Application name used in CLI output.
pub const APP_NAME: &str = "overlayer";

/// Returns the mount table path for an arbitrary process.
pub fn mountinfo_path_for_pid(pid: u32) -> String {
    format!("/proc/{pid}/mountinfo")
}
