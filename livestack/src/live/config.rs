use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{CfaPattern, LiveStackError, QualityGate};
use crate::registration::RegistrationConfig;
use crate::stacking::HotPixelConfig;

/// Settings of a live stacking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveStackConfig {
    /// Root of `stacks/` (persisted stacks and masters) and `temp/`.
    pub working_dir: PathBuf,
    pub hot_pixel_removal: bool,
    pub use_bias_for_lights: bool,
    /// Frames with fewer detected stars are skipped.
    pub min_star_count: usize,
    /// Delete each frame file once it has been processed or flushed.
    pub delete_processed_frames: bool,
    pub queue_capacity: usize,
    pub quality_gates: Vec<QualityGate>,
    pub registration: RegistrationConfig,
    pub hot_pixels: HotPixelConfig,
    pub cfa_pattern: CfaPattern,
    /// Green de-noise amount for color composites.
    pub green_denoise: Option<f32>,
}

impl Default for LiveStackConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("livestack"),
            hot_pixel_removal: true,
            use_bias_for_lights: true,
            min_star_count: 8,
            delete_processed_frames: true,
            queue_capacity: 1000,
            quality_gates: Vec::new(),
            registration: RegistrationConfig::default(),
            hot_pixels: HotPixelConfig::default(),
            cfa_pattern: CfaPattern::default(),
            green_denoise: None,
        }
    }
}

impl LiveStackConfig {
    pub fn stacks_dir(&self) -> PathBuf {
        self.working_dir.join("stacks")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.working_dir.join("temp")
    }

    pub fn load(path: &Path) -> Result<Self, LiveStackError> {
        let text = fs::read_to_string(path).map_err(|source| LiveStackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yml::from_str(&text).map_err(|source| LiveStackError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the configuration as YAML, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), LiveStackError> {
        let text = serde_yml::to_string(self).map_err(|source| LiveStackError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })?;
        let write_err = |source| LiveStackError::Io {
            path: path.to_path_buf(),
            source,
        };
        let temp = common::file_utils::temp_path_for(path);
        fs::write(&temp, text).map_err(write_err)?;
        common::file_utils::replace_file(&temp, path).map_err(write_err)
    }
}
