use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Gain/offset value meaning "applies regardless of this parameter".
pub const WILDCARD: i32 = -1;

/// Filter name used when a frame carries no filter.
pub const NO_FILTER: &str = "No_filter";

/// Maps a blank filter name to [`NO_FILTER`].
pub fn normalize_filter(filter: &str) -> String {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        NO_FILTER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Kind of calibration master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalibrationKind {
    Bias,
    Dark,
    Flat,
}

impl fmt::Display for CalibrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationKind::Bias => write!(f, "bias"),
            CalibrationKind::Dark => write!(f, "dark"),
            CalibrationKind::Flat => write!(f, "flat"),
        }
    }
}

/// Identity of one registered calibration master.
///
/// Equality ignores `mean`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFrameMeta {
    pub kind: CalibrationKind,
    pub path: PathBuf,
    pub gain: i32,
    pub offset: i32,
    pub exposure_time: f64,
    pub filter: String,
    pub width: usize,
    pub height: usize,
    /// Mean pixel value in `[0,1]`; NaN when unknown.
    #[serde(default = "unknown_mean")]
    pub mean: f64,
}

fn unknown_mean() -> f64 {
    f64::NAN
}

impl PartialEq for CalibrationFrameMeta {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.path == other.path
            && self.gain == other.gain
            && self.offset == other.offset
            && self.exposure_time == other.exposure_time
            && self.filter == other.filter
            && self.width == other.width
            && self.height == other.height
    }
}

impl CalibrationFrameMeta {
    pub fn bias(path: impl Into<PathBuf>, gain: i32, offset: i32, width: usize, height: usize) -> Self {
        Self {
            kind: CalibrationKind::Bias,
            path: path.into(),
            gain,
            offset,
            exposure_time: 0.0,
            filter: String::new(),
            width,
            height,
            mean: f64::NAN,
        }
    }

    pub fn dark(
        path: impl Into<PathBuf>,
        gain: i32,
        offset: i32,
        exposure_time: f64,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            kind: CalibrationKind::Dark,
            exposure_time,
            ..Self::bias(path, gain, offset, width, height)
        }
    }

    pub fn flat(path: impl Into<PathBuf>, filter: &str, width: usize, height: usize, mean: f64) -> Self {
        Self {
            kind: CalibrationKind::Flat,
            filter: normalize_filter(filter),
            mean,
            ..Self::bias(path, 0, 0, width, height)
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Registered mean when usable as a flat normalizer.
    pub fn known_mean(&self) -> Option<f64> {
        (self.mean.is_finite() && self.mean > common::EPSILON).then_some(self.mean)
    }
}

/// Identity tuple of a frame to calibrate.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameIdentity {
    pub width: usize,
    pub height: usize,
    pub exposure_time: f64,
    pub gain: i32,
    pub offset: i32,
    pub filter: String,
    pub bayered: bool,
}

impl FrameIdentity {
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// (gain, offset) pairs in lookup order, most specific first.
    pub(crate) fn gain_offset_candidates(&self) -> [(i32, i32); 4] {
        [
            (self.gain, self.offset),
            (self.gain, WILDCARD),
            (WILDCARD, self.offset),
            (WILDCARD, WILDCARD),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_mean() {
        let a = CalibrationFrameMeta::flat("/m/flat_ha.fits", "Ha", 10, 10, 0.4);
        let b = CalibrationFrameMeta::flat("/m/flat_ha.fits", "Ha", 10, 10, 0.6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_checks_exposure() {
        let a = CalibrationFrameMeta::dark("/m/dark.fits", 100, 10, 60.0, 10, 10);
        let b = CalibrationFrameMeta::dark("/m/dark.fits", 100, 10, 120.0, 10, 10);
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize_filter() {
        assert_eq!(normalize_filter(""), NO_FILTER);
        assert_eq!(normalize_filter("   "), NO_FILTER);
        assert_eq!(normalize_filter(" Ha "), "Ha");
    }

    #[test]
    fn test_known_mean() {
        let mut meta = CalibrationFrameMeta::flat("/m/f.fits", "L", 1, 1, f64::NAN);
        assert_eq!(meta.known_mean(), None);
        meta.mean = 0.0;
        assert_eq!(meta.known_mean(), None);
        meta.mean = 0.5;
        assert_eq!(meta.known_mean(), Some(0.5));
    }

    #[test]
    fn test_kind_serializes_uppercase() {
        let json = serde_json::to_string(&CalibrationKind::Dark).unwrap();
        assert_eq!(json, "\"DARK\"");
    }
}
