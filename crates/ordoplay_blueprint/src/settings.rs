// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime settings.
//!
//! Stored as RON next to the graphs they apply to:
//!
//! ```ron
//! RuntimeSettings(
//!     version: 1,
//!     duplicate_labels: Warn,
//!     validate_value_types: true,
//!     log_filter: "ordoplay_blueprint=info",
//!     frame_seconds: 0.016,
//!     frames: 120,
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// What to do when two nodes publish the same label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicateLabelPolicy {
    /// Keep the first publisher and log the rest
    #[default]
    Warn,
    /// Fail compilation
    Reject,
}

/// Settings applied when compiling and hosting blueprints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Format version
    pub version: u32,
    /// Duplicate label handling
    pub duplicate_labels: DuplicateLabelPolicy,
    /// Reject data links whose declared value types cannot convert
    pub validate_value_types: bool,
    /// Default tracing filter directive for hosts
    pub log_filter: String,
    /// Simulated frame length used by hosts pumping deferred work
    pub frame_seconds: f32,
    /// Number of frames a headless host runs before teardown
    pub frames: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            duplicate_labels: DuplicateLabelPolicy::Warn,
            validate_value_types: true,
            log_filter: "ordoplay_blueprint=info".to_string(),
            frame_seconds: 1.0 / 60.0,
            frames: 120,
        }
    }
}

impl RuntimeSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: RuntimeSettings = ron::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Settings version {} is newer than supported version {}",
                    settings.version, SETTINGS_FORMAT_VERSION
                ),
            ));
        }

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);

        let content = ron::ser::to_string_pretty(self, config).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert_eq!(settings.duplicate_labels, DuplicateLabelPolicy::Warn);
        assert!(settings.validate_value_types);
    }

    #[test]
    fn test_partial_settings() {
        let settings: RuntimeSettings =
            ron::from_str("(duplicate_labels: Reject, frames: 3)").unwrap();
        assert_eq!(settings.duplicate_labels, DuplicateLabelPolicy::Reject);
        assert_eq!(settings.frames, 3);
        assert!(settings.validate_value_types);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("blueprint-settings-{}.ron", uuid::Uuid::new_v4()));
        let settings = RuntimeSettings {
            frames: 10,
            ..RuntimeSettings::default()
        };

        settings.save(&path).unwrap();
        let loaded = RuntimeSettings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, settings);
    }
}
