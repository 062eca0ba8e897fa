//! `overlayer apply`: overlay modules onto a target subtree.

use std::path::PathBuf;

use clap::Args;
use overlayer_common::config::Settings;
use overlayer_core::mounter::{DryRunMounter, Mounter, SyscallMounter};
use overlayer_core::ops;

use crate::output;

/// Arguments for the `apply` command.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Absolute directory to overlay, e.g. `/system`.
    pub target: PathBuf,

    /// Module root directories, highest precedence first. Each contributes
    /// `<module>/<mount point>` wherever that directory exists.
    pub modules: Vec<PathBuf>,

    /// Overlay an empty tmpfs layer instead of bind mounting where no
    /// module contributes.
    #[arg(long)]
    pub empty_layer: bool,

    /// Log the mounts that would be made without making them.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the per-mount report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `apply` command.
///
/// # Errors
///
/// Returns an error if the target cannot be resolved or a mount fails
/// without a usable fallback. Mounts made before the failure stay.
pub fn execute(args: &ApplyArgs, settings: &Settings) -> anyhow::Result<()> {
    let settings = Settings {
        empty_layer: settings.empty_layer || args.empty_layer,
        ..settings.clone()
    };
    let mounter: Box<dyn Mounter> = if args.dry_run {
        Box::new(DryRunMounter::new())
    } else {
        Box::new(SyscallMounter)
    };

    match ops::apply(&settings, mounter.as_ref(), &args.target, &args.modules) {
        Ok(report) if args.json => output::print_json(&report),
        Ok(report) => {
            output::print_lines(&output::render_apply_report(&report));
            output::print_status("mount", true);
            Ok(())
        }
        Err(e) => {
            if !args.json {
                output::print_status("mount", false);
            }
            Err(e.into())
        }
    }
}
