//! `overlayer tree`: print the mount tree.

use clap::Args;
use overlayer_common::config::Settings;
use overlayer_core::ops;
use overlayer_core::tree::MountTree;

use crate::output;

/// Arguments for the `tree` command.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Read another process's mount namespace instead.
    #[arg(long)]
    pub pid: Option<u32>,

    /// Print the tree as nested JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `tree` command.
///
/// # Errors
///
/// Returns an error if the mount table cannot be read or parsed.
pub fn execute(args: &TreeArgs, settings: &Settings) -> anyhow::Result<()> {
    let tree = match args.pid {
        Some(pid) => MountTree::from_pid(pid)?,
        None => ops::dump_tree(settings)?,
    };
    if args.json {
        output::print_json(&tree.snapshot())
    } else {
        output::print_lines(&output::render_tree(&tree));
        Ok(())
    }
}
