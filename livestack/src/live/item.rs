use std::path::PathBuf;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::calibration_masters::FrameIdentity;
use crate::registration::DetectedStar;

fn default_bit_depth() -> u32 {
    16
}

/// Guiding RMS recorded while the frame was exposed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuidingRms {
    /// Total RMS in guider pixels.
    pub total: f64,
    /// Arcseconds per guider pixel.
    pub scale: f64,
}

impl GuidingRms {
    pub fn arcsec(&self) -> f64 {
        self.total * self.scale
    }
}

/// One captured frame waiting to be stacked.
///
/// The file at `path` belongs to the queue: it is deleted once the frame
/// has been processed or flushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStackItem {
    pub path: PathBuf,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub filter: String,
    pub exposure_time: f64,
    pub gain: i32,
    pub offset: i32,
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u32,
    #[serde(default)]
    pub bayered: bool,
    /// Mean half-flux radius of the detected stars.
    #[serde(default)]
    pub hfr: f64,
    #[serde(default)]
    pub rms: Option<GuidingRms>,
    #[serde(default)]
    pub stars: Vec<DetectedStar>,
}

impl LiveStackItem {
    /// Identity tuple used for calibration master lookup.
    pub fn identity(&self) -> FrameIdentity {
        FrameIdentity {
            width: self.width,
            height: self.height,
            exposure_time: self.exposure_time,
            gain: self.gain,
            offset: self.offset,
            filter: self.filter.clone(),
            bayered: self.bayered,
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn star_positions(&self) -> Vec<DVec2> {
        self.stars.iter().map(|s| s.position).collect()
    }
}
