//! # overlayer
//!
//! Overlays read-only module content onto a mounted subtree, nested mounts
//! included, and reverts it again by marker.

mod commands;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::commands::{Cli, LogFormat};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_format, cli.prints_json())?;
    commands::execute(cli)
}

/// Installs the global subscriber.
///
/// Diagnostics stream to stdout unless stdout carries a JSON document, in
/// which case they go to stderr.
fn init_tracing(level: Option<&str>, format: LogFormat, json_output: bool) -> anyhow::Result<()> {
    let filter = match level {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let writer = if json_output {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
