//! Parsing of the kernel mount table (`/proc/<pid>/mountinfo`) using `nom`.
//!
//! Each line describes one mount:
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! (1)(2)(3)   (4)   (5)      (6)      (7)   (8) (9)    (10)         (11)
//! ```
//!
//! Six fixed fields, any number of optional propagation fields, a lone `-`
//! separator, then three more fixed fields. Octal escapes such as `\040`
//! are kept verbatim, so paths containing whitespace are not decoded.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use nom::{
    IResult, Parser,
    bytes::complete::take_till1,
    character::complete::{char, digit1, space1},
    combinator::{all_consuming, map, map_res, verify},
    multi::many0,
    sequence::{separated_pair, terminated},
};
use overlayer_common::error::{OverlayError, Result};
use overlayer_common::types::{DeviceId, MountId};
use serde::Serialize;

const SEPARATOR: &str = "-";

/// One record of the kernel mount table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountRecord {
    /// Unique id of this mount.
    pub id: MountId,
    /// Id of the parent mount (the mount's own id for the namespace root).
    pub parent_id: MountId,
    /// Backing device.
    pub device: DeviceId,
    /// Subtree of the filesystem exposed at this mount.
    pub root: PathBuf,
    /// Where the mount is visible.
    pub mount_point: PathBuf,
    /// Per-mount options.
    pub mount_options: String,
    /// Propagation fields such as `shared:1` or `master:2`.
    pub optional_fields: Vec<String>,
    /// Filesystem type.
    pub fs_type: String,
    /// Mount source; overlayer stamps its marker here.
    pub source: String,
    /// Per-superblock options.
    pub super_options: String,
}

impl fmt::Display for MountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} ",
            self.id,
            self.parent_id,
            self.device,
            self.root.display(),
            self.mount_point.display(),
            self.mount_options
        )?;
        for field in &self.optional_fields {
            write!(f, "{field} ")?;
        }
        write!(
            f,
            "{SEPARATOR} {} {} {}",
            self.fs_type, self.source, self.super_options
        )
    }
}

/// A whitespace-delimited field.
fn field(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_ascii_whitespace()).parse(input)
}

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>).parse(input)
}

fn device(input: &str) -> IResult<&str, DeviceId> {
    map(separated_pair(number, char(':'), number), |(major, minor)| {
        DeviceId::new(major, minor)
    })
    .parse(input)
}

/// An optional field: anything up to the lone `-` separator.
fn optional_field(input: &str) -> IResult<&str, &str> {
    verify(field, |f: &str| f != SEPARATOR).parse(input)
}

/// Runs `parser`, turning a failure into a message naming the expected field.
fn expect_field<'a, O, P>(
    input: &'a str,
    what: &str,
    mut parser: P,
) -> std::result::Result<(&'a str, O), String>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    parser.parse(input).map_err(|_| match input.split_ascii_whitespace().next() {
        Some(found) => format!("expected {what}, found {found:?}"),
        None => format!("expected {what}, found end of record"),
    })
}

fn parse_device(raw: &str) -> std::result::Result<DeviceId, String> {
    all_consuming(device)
        .parse(raw)
        .map(|(_, dev)| dev)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| {
            format!("device field {raw:?} is not a major:minor pair")
        })
}

fn parse_record(line: &str) -> std::result::Result<MountRecord, String> {
    let input = line.trim_start();
    let (input, id) = expect_field(input, "mount id", terminated(number, space1))?;
    let (input, parent_id) = expect_field(input, "parent id", terminated(number, space1))?;
    let (input, dev) = expect_field(input, "major:minor", terminated(field, space1))?;
    let device = parse_device(dev)?;
    let (input, root) = expect_field(input, "root", terminated(field, space1))?;
    let (input, mount_point) =
        expect_field(input, "mount point", terminated(field, space1))?;
    let (input, mount_options) =
        expect_field(input, "mount options", terminated(field, space1))?;
    let (input, optional_fields) = expect_field(
        input,
        "optional fields",
        many0(terminated(optional_field, space1)),
    )?;
    let (input, _) = expect_field(input, "separator '-'", terminated(char('-'), space1))?;
    let (input, fs_type) =
        expect_field(input, "filesystem type", terminated(field, space1))?;
    let (input, source) = expect_field(input, "mount source", terminated(field, space1))?;
    let (input, super_options) = expect_field(input, "super options", field)?;

    if let Some(extra) = input.split_ascii_whitespace().next() {
        return Err(format!("unexpected field {extra:?} after super options"));
    }

    Ok(MountRecord {
        id: MountId::new(id),
        parent_id: MountId::new(parent_id),
        device,
        root: PathBuf::from(root),
        mount_point: PathBuf::from(mount_point),
        mount_options: mount_options.to_owned(),
        optional_fields: optional_fields.into_iter().map(str::to_owned).collect(),
        fs_type: fs_type.to_owned(),
        source: source.to_owned(),
        super_options: super_options.to_owned(),
    })
}

/// Parses mount table text into records, preserving table order.
///
/// Table order is the order in which mounts were attached, which the tree
/// relies on to resolve shadowing. Blank lines are ignored.
///
/// # Errors
///
/// Returns [`OverlayError::Parse`] for the first malformed record or for a
/// repeated mount id. No partial result is returned.
pub fn parse_mountinfo(text: &str) -> Result<Vec<MountRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(line).map_err(|message| OverlayError::Parse {
            line: index + 1,
            message,
        })?;
        if !seen.insert(record.id) {
            return Err(OverlayError::Parse {
                line: index + 1,
                message: format!("duplicate mount id {}", record.id),
            });
        }
        records.push(record);
    }
    tracing::debug!(records = records.len(), "parsed mount table");
    Ok(records)
}

/// Reads and parses a mount table file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn read_mountinfo(path: &Path) -> Result<Vec<MountRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| OverlayError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "read mount table");
    parse_mountinfo(&text)
}
