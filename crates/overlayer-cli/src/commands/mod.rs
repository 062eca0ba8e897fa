//! CLI command definitions and dispatch.

pub mod apply;
pub mod mounts;
pub mod revert;
pub mod tree;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use overlayer_common::config::Settings;
use overlayer_common::constants::{APP_NAME, ENV_MARKER, ENV_MOUNTINFO};

/// overlayer: read-only module overlays over mounted subtrees.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON settings file; its fields override built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Source tag stamped on created mounts and matched on revert.
    #[arg(long, global = true, env = ENV_MARKER)]
    pub marker: Option<String>,

    /// Mount table to read instead of the calling process's own.
    #[arg(long, global = true, env = ENV_MOUNTINFO)]
    pub mountinfo: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `overlayer_core=trace`.
    /// Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log line formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Overlay modules onto a target directory and every mount below it.
    Apply(apply::ApplyArgs),
    /// Detach every mount carrying the marker.
    Revert(revert::RevertArgs),
    /// Print the mount tree.
    Tree(tree::TreeArgs),
    /// List the mounts an apply on a path would cover, outer to inner.
    Mounts(mounts::MountsArgs),
}

impl Cli {
    /// Layers the config file, environment, and flags over the defaults.
    ///
    /// Environment variables reach here through clap, which already lets an
    /// explicit flag win over them.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the result
    /// is invalid.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(marker) = &self.marker {
            settings.marker.clone_from(marker);
        }
        if let Some(mountinfo) = &self.mountinfo {
            settings.mountinfo_path.clone_from(mountinfo);
        }
        settings.validate()?;
        tracing::debug!(?settings, "resolved settings");
        Ok(settings)
    }
}

impl Cli {
    /// Whether the command writes a JSON document to stdout.
    pub const fn prints_json(&self) -> bool {
        match &self.command {
            Command::Apply(args) => args.json,
            Command::Tree(args) => args.json,
            Command::Mounts(args) => args.json,
            Command::Revert(_) => false,
        }
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if settings cannot be resolved or the command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings()?;
    match cli.command {
        Command::Apply(args) => apply::execute(&args, &settings),
        Command::Revert(args) => revert::execute(&args, &settings),
        Command::Tree(args) => tree::execute(&args, &settings),
        Command::Mounts(args) => mounts::execute(&args, &settings),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "overlayer",
            "--marker",
            "KSU",
            "--mountinfo",
            "/proc/1/mountinfo",
            "revert",
        ])
        .expect("should parse");
        let settings = cli.settings().expect("should resolve");
        assert_eq!(settings.marker, "KSU");
        assert_eq!(settings.mountinfo_path, PathBuf::from("/proc/1/mountinfo"));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overlayer.json");
        std::fs::write(&path, r#"{ "marker": "fromfile", "empty_layer": true }"#)
            .expect("write");

        let cli = Cli::try_parse_from([
            "overlayer",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--marker",
            "fromflag",
            "tree",
        ])
        .expect("should parse");
        let settings = cli.settings().expect("should resolve");
        assert_eq!(settings.marker, "fromflag");
        assert!(settings.empty_layer);
    }

    #[test]
    fn apply_takes_target_and_ordered_modules() {
        let cli = Cli::try_parse_from([
            "overlayer",
            "apply",
            "/system",
            "/data/modules/a",
            "/data/modules/b",
            "--dry-run",
        ])
        .expect("should parse");
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.target, PathBuf::from("/system"));
        assert_eq!(
            args.modules,
            vec![
                PathBuf::from("/data/modules/a"),
                PathBuf::from("/data/modules/b")
            ]
        );
        assert!(args.dry_run);
    }

    #[test]
    fn json_flag_is_detected_per_command() {
        let json = Cli::try_parse_from(["overlayer", "mounts", "/system", "--json"])
            .expect("should parse");
        assert!(json.prints_json());

        let text = Cli::try_parse_from(["overlayer", "revert"]).expect("should parse");
        assert!(!text.prints_json());
    }

    #[test]
    fn whitespace_marker_is_rejected() {
        let cli = Cli::try_parse_from(["overlayer", "--marker", "two words", "revert"])
            .expect("should parse");
        assert!(cli.settings().is_err());
    }
}
