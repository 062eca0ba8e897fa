//! Read-only overlay orchestration over a mount frontier.
//!
//! Every frontier mount is pinned before anything is mounted. Mounts are
//! then covered outer to inner: an overlay of the contributing module
//! directories on top of the pinned original, or a bind mount of the
//! original when nothing contributes. A failed overlay falls back to a bind
//! mount; if that fails too the operation stops, leaving already covered
//! outer mounts in place.

pub mod empty_layer;
pub mod pin;

use std::path::{Path, PathBuf};

use overlayer_common::config::Settings;
use overlayer_common::error::{OverlayError, Result};
use serde::Serialize;

use crate::mounter::Mounter;
use crate::tree::{MountTree, NodeId};

pub use empty_layer::EmptyLayer;
pub use pin::PinnedContent;

/// Why a frontier mount was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The mount point no longer exists.
    Vanished,
    /// The mount point or its original content is not a directory.
    NotADirectory,
}

/// Final state of one frontier mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    /// Covered by an overlay with this `lowerdir` list.
    Overlaid {
        /// Colon-joined lower directories, original content last.
        lowerdir: String,
    },
    /// Original content bind mounted back in place.
    Bound {
        /// Whether this was the fallback after a failed overlay mount.
        fallback: bool,
    },
    /// Left alone.
    Skipped {
        /// Why the mount was skipped.
        reason: SkipReason,
    },
}

/// Outcome for one frontier mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeOutcome {
    /// The live mount point that was processed.
    pub mount_point: PathBuf,
    /// What happened to it.
    #[serde(flatten)]
    pub state: NodeState,
}

/// Per-mount outcomes of an apply, outer to inner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// One entry per frontier mount, in processing order.
    pub outcomes: Vec<NodeOutcome>,
}

impl ApplyReport {
    /// Number of mounts covered by an overlay.
    pub fn overlaid(&self) -> usize {
        self.count(|s| matches!(s, NodeState::Overlaid { .. }))
    }

    /// Number of mounts bind mounted, including fallbacks.
    pub fn bound(&self) -> usize {
        self.count(|s| matches!(s, NodeState::Bound { .. }))
    }

    /// Number of mounts skipped.
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, NodeState::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&NodeState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.state)).count()
    }
}

/// Where one frontier mount is covered and what it is covered with.
struct Step {
    mount_point: PathBuf,
    source: PathBuf,
    outermost: bool,
}

/// Applies module overlays to a frontier of mounts.
pub struct OverlayOrchestrator<'a, M: Mounter + ?Sized> {
    mounter: &'a M,
    settings: &'a Settings,
}

impl<'a, M: Mounter + ?Sized> OverlayOrchestrator<'a, M> {
    /// Creates an orchestrator issuing mounts through `mounter`.
    pub const fn new(mounter: &'a M, settings: &'a Settings) -> Self {
        Self { mounter, settings }
    }

    /// Covers `target` and every mount in `frontier` with `modules`.
    ///
    /// `frontier` must be in processing order, outermost first; its first
    /// entry is the mount governing `target`. Module directories are
    /// stacked in the given order, earlier ones taking precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if a mount point cannot be pinned or stat'ed, the
    /// empty layer cannot be set up, or both the overlay and the bind
    /// fallback fail for some mount. Mounts made before the failure stay.
    pub fn run(
        &self,
        tree: &MountTree,
        target: &Path,
        frontier: &[NodeId],
        modules: &[PathBuf],
    ) -> Result<ApplyReport> {
        let pins = frontier
            .iter()
            .map(|&id| pin_mount(tree, id))
            .collect::<Result<Vec<_>>>()?;

        let mut empty_layer = None;
        let mut report = ApplyReport::default();
        for (index, (&id, pin)) in frontier.iter().zip(&pins).enumerate() {
            let step = if index == 0 {
                // the governing mount may sit above the target, e.g. `/` for `/system`
                Step {
                    mount_point: target.to_path_buf(),
                    source: target.to_path_buf(),
                    outermost: true,
                }
            } else {
                let mount_point = tree.node(id).mount_point().to_path_buf();
                let Some(pin) = pin else {
                    report.outcomes.push(skipped(&mount_point, SkipReason::Vanished));
                    continue;
                };
                Step {
                    mount_point,
                    source: pin.as_mount_source(),
                    outermost: false,
                }
            };
            report
                .outcomes
                .push(self.apply_step(&step, pin.as_ref(), modules, &mut empty_layer)?);
        }

        drop(empty_layer);
        tracing::debug!(
            handles = pins.iter().flatten().count(),
            "releasing pinned content"
        );
        drop(pins);
        Ok(report)
    }

    fn apply_step(
        &self,
        step: &Step,
        pin: Option<&PinnedContent>,
        modules: &[PathBuf],
        empty_layer: &mut Option<EmptyLayer<'a, M>>,
    ) -> Result<NodeOutcome> {
        let mount_point = &step.mount_point;
        let live = match std::fs::metadata(mount_point) {
            Ok(meta) => meta,
            Err(e) if is_vanished(&e) => {
                tracing::info!(
                    mount_point = %mount_point.display(),
                    "skip: mount point does not exist"
                );
                return Ok(skipped(mount_point, SkipReason::Vanished));
            }
            Err(e) => {
                return Err(OverlayError::Stat {
                    path: mount_point.clone(),
                    source: e,
                });
            }
        };
        let original_is_dir = match pin {
            Some(pin) if !step.outermost => pin.metadata()?.is_dir(),
            _ => live.is_dir(),
        };
        if !live.is_dir() || !original_is_dir {
            tracing::warn!(
                mount_point = %mount_point.display(),
                live_is_dir = live.is_dir(),
                original_is_dir,
                "skip: mount point and original content are not both directories"
            );
            return Ok(skipped(mount_point, SkipReason::NotADirectory));
        }

        let layers = collect_module_layers(mount_point, modules)?;
        let state = match (layers.is_empty(), self.settings.empty_layer) {
            (false, _) => self.overlay_or_bind(mount_point, &step.source, &layers)?,
            (true, true) => {
                let empty = self.empty_layer_path(empty_layer)?;
                tracing::info!(
                    mount_point = %mount_point.display(),
                    "no module modifies mount point, overlaying empty layer"
                );
                self.overlay_or_bind(mount_point, &step.source, &[empty])?
            }
            (true, false) => {
                tracing::info!(
                    mount_point = %mount_point.display(),
                    source = %step.source.display(),
                    "no module modifies mount point, bind mounting original"
                );
                self.mounter.bind_mount(&step.source, mount_point)?;
                NodeState::Bound { fallback: false }
            }
        };
        Ok(NodeOutcome {
            mount_point: mount_point.clone(),
            state,
        })
    }

    fn overlay_or_bind(
        &self,
        mount_point: &Path,
        source: &Path,
        layers: &[PathBuf],
    ) -> Result<NodeState> {
        let lowerdir = lowerdir_option(layers, source);
        tracing::info!(
            mount_point = %mount_point.display(),
            lowerdir = %lowerdir,
            "mounting overlay"
        );
        let overlay_err = match self
            .mounter
            .mount_overlay(mount_point, &lowerdir, &self.settings.marker)
        {
            Ok(()) => return Ok(NodeState::Overlaid { lowerdir }),
            Err(e) => e,
        };
        tracing::warn!(
            mount_point = %mount_point.display(),
            error = %overlay_err,
            "overlay mount failed, trying fallback bind mount"
        );
        self.mounter
            .bind_mount(source, mount_point)
            .map_err(|bind_err| OverlayError::Mount {
                target: mount_point.to_path_buf(),
                message: format!("{overlay_err}; fallback: {bind_err}"),
            })?;
        Ok(NodeState::Bound { fallback: true })
    }

    fn empty_layer_path(&self, slot: &mut Option<EmptyLayer<'a, M>>) -> Result<PathBuf> {
        let layer = match slot.take() {
            Some(layer) => layer,
            None => EmptyLayer::create(
                &self.settings.empty_layer_dir,
                &self.settings.marker,
                self.mounter,
            )?,
        };
        let path = layer.path().to_path_buf();
        *slot = Some(layer);
        Ok(path)
    }
}

/// Pins one frontier mount; a mount point already gone yields `None`.
fn pin_mount(tree: &MountTree, id: NodeId) -> Result<Option<PinnedContent>> {
    let record = &tree.node(id).record;
    tracing::info!(mount = %record, "pinning mount");
    match PinnedContent::open(&record.mount_point) {
        Ok(pin) => Ok(Some(pin)),
        Err(OverlayError::Io { source, .. }) if is_vanished(&source) => {
            tracing::info!(
                mount_point = %record.mount_point.display(),
                "skip: mount point does not exist"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn skipped(mount_point: &Path, reason: SkipReason) -> NodeOutcome {
    NodeOutcome {
        mount_point: mount_point.to_path_buf(),
        state: NodeState::Skipped { reason },
    }
}

fn is_vanished(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound || err.raw_os_error() == Some(libc::ENOTDIR)
}

/// Where `module` would place its override for `mount_point`.
pub fn module_override(module: &Path, mount_point: &Path) -> PathBuf {
    match mount_point.strip_prefix("/") {
        Ok(relative) if !relative.as_os_str().is_empty() => module.join(relative),
        Ok(_) => module.to_path_buf(),
        Err(_) => module.join(mount_point),
    }
}

/// Module directories that override `mount_point`, in module order.
///
/// Missing overrides are skipped; overrides that exist but are not
/// directories are rejected as invalid.
fn collect_module_layers(mount_point: &Path, modules: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut layers = Vec::new();
    for module in modules {
        let candidate = module_override(module, mount_point);
        match std::fs::metadata(&candidate) {
            Ok(meta) if meta.is_dir() => layers.push(candidate),
            Ok(_) => tracing::warn!(
                module = %candidate.display(),
                "invalid module: override is not a directory"
            ),
            Err(e) if is_vanished(&e) => tracing::info!(
                mount_point = %mount_point.display(),
                module = %candidate.display(),
                "module does not exist"
            ),
            Err(e) => {
                return Err(OverlayError::Stat {
                    path: candidate,
                    source: e,
                });
            }
        }
    }
    Ok(layers)
}

/// Joins layers and the original content into an overlay `lowerdir` list.
pub fn lowerdir_option(layers: &[PathBuf], original: &Path) -> String {
    layers
        .iter()
        .map(PathBuf::as_path)
        .chain(std::iter::once(original))
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}
