use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_ENTRY_THRESHOLD, DEFAULT_EXIT_THRESHOLD, DEFAULT_FRAME_QUEUE_CAPACITY,
    DEFAULT_TOLERANCE, SETTINGS_DIR_NAME, SETTINGS_FILE_NAME,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// Tunables for matching and presence debouncing.
///
/// Missing fields fall back to their defaults, so a settings file only
/// needs to name the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSettings {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: u32,
    #[serde(default = "default_exit_threshold")]
    pub exit_threshold: u32,
    #[serde(default = "default_frame_queue_capacity")]
    pub frame_queue_capacity: usize,
    #[serde(default = "default_drop_frames_when_busy")]
    pub drop_frames_when_busy: bool,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_entry_threshold() -> u32 {
    DEFAULT_ENTRY_THRESHOLD
}

fn default_exit_threshold() -> u32 {
    DEFAULT_EXIT_THRESHOLD
}

fn default_frame_queue_capacity() -> usize {
    DEFAULT_FRAME_QUEUE_CAPACITY
}

fn default_drop_frames_when_busy() -> bool {
    true
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            entry_threshold: DEFAULT_ENTRY_THRESHOLD,
            exit_threshold: DEFAULT_EXIT_THRESHOLD,
            frame_queue_capacity: DEFAULT_FRAME_QUEUE_CAPACITY,
            drop_frames_when_busy: true,
        }
    }
}

impl AttendanceSettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Loads and validates settings from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads from the user config directory, falling back to defaults when
    /// no file exists. A file that exists but is broken is still an error.
    pub fn load() -> Result<Self, SettingsError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(SettingsError::Invalid {
                name: "tolerance",
                reason: format!("must be a non-negative number, got {}", self.tolerance),
            });
        }
        if self.entry_threshold == 0 {
            return Err(SettingsError::Invalid {
                name: "entry_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.exit_threshold == 0 {
            return Err(SettingsError::Invalid {
                name: "exit_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.frame_queue_capacity == 0 {
            return Err(SettingsError::Invalid {
                name: "frame_queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
