//! `overlayer mounts`: list the mounts an apply would cover.

use std::path::PathBuf;

use clap::Args;
use overlayer_common::config::Settings;
use overlayer_core::ops;

use crate::output;

/// Arguments for the `mounts` command.
#[derive(Args, Debug)]
pub struct MountsArgs {
    /// Absolute directory an apply would target.
    pub path: PathBuf,

    /// Print the records as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `mounts` command.
///
/// # Errors
///
/// Returns an error if the path cannot be resolved or the mount table
/// cannot be read.
pub fn execute(args: &MountsArgs, settings: &Settings) -> anyhow::Result<()> {
    let records = ops::list_frontier(settings, &args.path)?;
    if args.json {
        return output::print_json(&records);
    }
    let lines: Vec<String> = records.iter().map(ToString::to_string).collect();
    output::print_lines(&lines);
    Ok(())
}
