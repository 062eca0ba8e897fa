//! `overlayer revert`: detach every marked mount.

use clap::Args;
use overlayer_common::config::Settings;
use overlayer_core::mounter::{DryRunMounter, SyscallMounter};
use overlayer_core::ops;

use crate::output;

/// Arguments for the `revert` command.
#[derive(Args, Debug)]
pub struct RevertArgs {
    /// Log the detaches that would be made without making them.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the `revert` command.
///
/// # Errors
///
/// Returns an error if the mount table cannot be read or any marked mount
/// fails to detach. Every marked mount is attempted regardless.
pub fn execute(args: &RevertArgs, settings: &Settings) -> anyhow::Result<()> {
    let result = if args.dry_run {
        ops::revert(settings, &DryRunMounter::new())
    } else {
        ops::revert(settings, &SyscallMounter)
    };
    output::print_status("umount", result.is_ok());
    let report = result?;
    tracing::debug!(detached = report.detached, marker = %settings.marker, "reverted");
    Ok(())
}
