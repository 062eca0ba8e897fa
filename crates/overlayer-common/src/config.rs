//! Runtime settings for overlayer operations.
//!
//! Defaults come from [`crate::constants`]; a JSON file may override any
//! subset of fields, and the CLI layers environment variables and flags on
//! top of that.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};

/// Settings shared by the apply and revert paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Source tag stamped on created mounts and matched on revert.
    pub marker: String,
    /// Mount table to read the namespace from.
    pub mountinfo_path: PathBuf,
    /// Overlay an empty tmpfs layer instead of bind mounting when no module
    /// contributes to a mount point.
    pub empty_layer: bool,
    /// Mount point of the empty tmpfs layer.
    pub empty_layer_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            marker: crate::constants::DEFAULT_MOUNT_MARKER.to_owned(),
            mountinfo_path: PathBuf::from(crate::constants::DEFAULT_MOUNTINFO_PATH),
            empty_layer: false,
            empty_layer_dir: PathBuf::from(crate::constants::DEFAULT_EMPTY_LAYER_DIR),
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds an invalid value.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| OverlayError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that the settings can be used for a mount operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker is blank or contains whitespace (the
    /// mount table would split it into several fields), or if a path is
    /// not absolute.
    pub fn validate(&self) -> Result<()> {
        if self.marker.is_empty() || self.marker.chars().any(char::is_whitespace) {
            return Err(OverlayError::Config {
                message: format!("mount marker {:?} must be a single non-empty word", self.marker),
            });
        }
        if !self.mountinfo_path.is_absolute() {
            return Err(OverlayError::Config {
                message: format!(
                    "mountinfo path {} must be absolute",
                    self.mountinfo_path.display()
                ),
            });
        }
        if !self.empty_layer_dir.is_absolute() {
            return Err(OverlayError::Config {
                message: format!(
                    "empty layer directory {} must be absolute",
                    self.empty_layer_dir.display()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.marker, "overlayer");
        assert!(!settings.empty_layer);
        settings.validate().expect("defaults should validate");
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overlayer.json");
        std::fs::write(&path, r#"{ "marker": "KSU", "empty_layer": true }"#).expect("write");

        let settings = Settings::load(&path).expect("should load");
        assert_eq!(settings.marker, "KSU");
        assert!(settings.empty_layer);
        assert_eq!(
            settings.mountinfo_path,
            PathBuf::from(crate::constants::DEFAULT_MOUNTINFO_PATH)
        );
    }

    #[test]
    fn load_rejects_blank_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overlayer.json");
        std::fs::write(&path, r#"{ "marker": "" }"#).expect("write");

        let err = Settings::load(&path).expect_err("blank marker must fail");
        assert!(matches!(err, OverlayError::Config { .. }));
    }

    #[test]
    fn marker_with_whitespace_is_invalid() {
        let settings = Settings {
            marker: "my marker".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/overlayer.json"))
            .expect_err("missing file must fail");
        assert!(matches!(err, OverlayError::Io { .. }));
    }

    #[test]
    fn load_reports_invalid_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overlayer.json");
        std::fs::write(&path, "{ marker ").expect("write");

        let err = Settings::load(&path).expect_err("invalid json must fail");
        assert!(matches!(err, OverlayError::Serialization { .. }));
    }
}
