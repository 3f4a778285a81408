// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::grid::{DEFAULT_BPM, DEFAULT_SUBDIVISIONS_PER_BAR};
use crate::playback::device::DEFAULT_DEVICE_NAME;
use crate::playback::DEFAULT_VOLUME;
use crate::regions::MAX_MIDI_KEY;

const DEFAULT_BASE_PITCH: u8 = 36;

/// Typed error for project file load/parse failures so callers can
/// distinguish e.g. file-not-found from parse errors without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Project file read error: {0}")]
    Read(#[from] std::io::Error),
    #[error("Project file parse error: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// A YAML representation of the project configuration. Every field is
/// optional; the getters fall back to the stock tracker defaults.
#[derive(Deserialize, Clone, Default)]
pub struct ProjectConfig {
    /// The audio device.
    device: Option<String>,

    /// Tempo in beats per minute (default: 140).
    bpm: Option<f64>,

    /// Tracker rows per bar (default: 16).
    subdivisions_per_bar: Option<u32>,

    /// MIDI key assigned to the first region (default: 36, a C2 kick).
    base_pitch: Option<u8>,

    /// Preview volume, 0.0 through 1.0 (default: 0.8).
    volume: Option<f32>,
}

impl ProjectConfig {
    /// Loads a project configuration from a YAML file.
    pub fn load(path: &Path) -> Result<ProjectConfig, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ProjectConfig = serde_yml::from_str(&contents)?;
        info!(
            file = crate::util::filename_display(path),
            bpm = config.bpm(),
            subdivisions_per_bar = config.subdivisions_per_bar(),
            "Loaded project file"
        );
        Ok(config)
    }

    /// Returns the audio device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE_NAME)
    }

    /// Returns the tempo (default: 140).
    pub fn bpm(&self) -> f64 {
        self.bpm.unwrap_or(DEFAULT_BPM)
    }

    /// Returns the rows per bar (default: 16).
    pub fn subdivisions_per_bar(&self) -> u32 {
        self.subdivisions_per_bar
            .unwrap_or(DEFAULT_SUBDIVISIONS_PER_BAR)
    }

    /// Returns the base MIDI key, capped at 127 (default: 36).
    pub fn base_pitch(&self) -> u8 {
        self.base_pitch.unwrap_or(DEFAULT_BASE_PITCH).min(MAX_MIDI_KEY)
    }

    /// Returns the preview volume, clamped to 0.0 through 1.0 (default: 0.8).
    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(DEFAULT_VOLUME).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.device(), "default");
        assert_eq!(config.bpm(), 140.0);
        assert_eq!(config.subdivisions_per_bar(), 16);
        assert_eq!(config.base_pitch(), 36);
        assert_eq!(config.volume(), 0.8);
    }

    #[test]
    fn test_load_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.yaml");
        fs::write(
            &path,
            "device: mock-out\nbpm: 96.5\nsubdivisions_per_bar: 8\nbase_pitch: 200\nvolume: 1.5\n",
        )
        .unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.device(), "mock-out");
        assert_eq!(config.bpm(), 96.5);
        assert_eq!(config.subdivisions_per_bar(), 8);
        // Out-of-range values are capped rather than rejected.
        assert_eq!(config.base_pitch(), 127);
        assert_eq!(config.volume(), 1.0);
    }

    #[test]
    fn test_parse_error_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "bpm: [this is not a number]\n").unwrap();
        assert!(matches!(
            ProjectConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_typed() {
        assert!(matches!(
            ProjectConfig::load(Path::new("/does/not/exist.yaml")),
            Err(ConfigError::Read(_))
        ));
    }
}
