//! Formatted output helpers for CLI commands.
//!
//! Rendering is kept separate from printing so the text can be tested.

use overlayer_core::overlay::{ApplyReport, NodeState, SkipReason};
use overlayer_core::tree::MountTree;
use serde::Serialize;

/// One mountinfo-layout line per mount, indented two spaces per level.
pub fn render_tree(tree: &MountTree) -> Vec<String> {
    tree.pre_order()
        .into_iter()
        .map(|(id, depth)| format!("{:indent$}{}", "", tree.node(id).record, indent = depth * 2))
        .collect()
}

/// One line per frontier mount describing what was done to it.
pub fn render_apply_report(report: &ApplyReport) -> Vec<String> {
    report
        .outcomes
        .iter()
        .map(|outcome| {
            let point = outcome.mount_point.display();
            match &outcome.state {
                NodeState::Overlaid { lowerdir } => format!("overlay  {point} lowerdir={lowerdir}"),
                NodeState::Bound { fallback: false } => format!("bind     {point}"),
                NodeState::Bound { fallback: true } => format!("bind     {point} (overlay failed)"),
                NodeState::Skipped { reason } => {
                    let why = match reason {
                        SkipReason::Vanished => "no longer exists",
                        SkipReason::NotADirectory => "not a directory",
                    };
                    format!("skip     {point} ({why})")
                }
            }
        })
        .collect()
}

/// Prints each line to stdout.
#[allow(clippy::print_stdout)]
pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

/// Prints the final `<op> success` / `<op> failed` status line.
#[allow(clippy::print_stdout)]
pub fn print_status(op: &str, ok: bool) {
    println!("{op} {}", if ok { "success" } else { "failed" });
}

/// Prints `value` as pretty JSON.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::path::PathBuf;

    use overlayer_core::overlay::NodeOutcome;

    use super::*;

    #[test]
    fn tree_lines_are_indented_by_depth() {
        let tree = MountTree::parse(
            "\
1 0 8:1 / / rw - ext4 /dev/sda1 rw
2 1 8:2 / /system rw - ext4 /dev/sda2 rw
3 2 0:40 / /system/app ro - overlay overlayer ro
",
        )
        .expect("should build");

        assert_eq!(
            render_tree(&tree),
            vec![
                "1 0 8:1 / / rw - ext4 /dev/sda1 rw",
                "  2 1 8:2 / /system rw - ext4 /dev/sda2 rw",
                "    3 2 0:40 / /system/app ro - overlay overlayer ro",
            ]
        );
    }

    #[test]
    fn report_lines_name_each_outcome() {
        let report = ApplyReport {
            outcomes: vec![
                NodeOutcome {
                    mount_point: PathBuf::from("/system"),
                    state: NodeState::Overlaid {
                        lowerdir: "/m/system:/system".into(),
                    },
                },
                NodeOutcome {
                    mount_point: PathBuf::from("/system/app"),
                    state: NodeState::Bound { fallback: true },
                },
                NodeOutcome {
                    mount_point: PathBuf::from("/system/lib"),
                    state: NodeState::Skipped {
                        reason: SkipReason::Vanished,
                    },
                },
            ],
        };

        assert_eq!(
            render_apply_report(&report),
            vec![
                "overlay  /system lowerdir=/m/system:/system",
                "bind     /system/app (overlay failed)",
                "skip     /system/lib (no longer exists)",
            ]
        );
    }

    #[test]
    fn report_serializes_with_state_tag() {
        let report = ApplyReport {
            outcomes: vec![NodeOutcome {
                mount_point: PathBuf::from("/system"),
                state: NodeState::Bound { fallback: false },
            }],
        };
        let json = serde_json::to_value(&report).expect("serializes");
        assert_eq!(json["outcomes"][0]["state"], "bound");
        assert_eq!(json["outcomes"][0]["mount_point"], "/system");
        assert_eq!(json["outcomes"][0]["fallback"], false);
    }
}
