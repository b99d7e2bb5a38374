//! Configuration types for the registration module.

use serde::{Deserialize, Serialize};

// =============================================================================
// Star selection
// =============================================================================

/// Limits for picking alignment stars out of a detected-star list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarSelectionConfig {
    /// Upper bound on selected stars.
    pub max_stars: usize,
    /// The image is split into `grid_size x grid_size` cells.
    pub grid_size: usize,
    /// Stars with `max_brightness` at or above this value are saturated.
    pub saturation_ceiling: f64,
}

impl Default for StarSelectionConfig {
    fn default() -> Self {
        Self {
            max_stars: 100,
            grid_size: 5,
            saturation_ceiling: 65_000.0,
        }
    }
}

impl StarSelectionConfig {
    pub fn stars_per_cell(&self) -> usize {
        let cells = (self.grid_size * self.grid_size).max(1);
        (self.max_stars / cells).max(1)
    }
}

// =============================================================================
// Triangle matching
// =============================================================================

/// Triangle filters and vote thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangleConfig {
    /// Normalized side2 and side3 must stay below this (rejects near-collinear triples).
    pub max_relative_side: f64,
    /// Normalized side2 + side3 must exceed this.
    pub min_side_sum: f64,
    /// |side2 - side3| must exceed this (rejects near-isosceles triangles).
    pub min_side_difference: f64,
    /// Max distance between two triangles in (side2, side3) space.
    pub match_tolerance: f64,
    /// Vote threshold is `(m - 1) * (m - 2) / vote_divisor` for `m` stars.
    pub vote_divisor: f64,
    /// Floor of the vote threshold.
    pub min_vote_threshold: f64,
}

impl Default for TriangleConfig {
    fn default() -> Self {
        Self {
            max_relative_side: 0.95,
            min_side_sum: 1.3,
            min_side_difference: 0.05,
            match_tolerance: 0.02,
            vote_divisor: 150.0,
            min_vote_threshold: 4.0,
        }
    }
}

// =============================================================================
// Flip detection
// =============================================================================

/// Rotation window (degrees, inclusive) treated as a 180° flip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipConfig {
    pub min_angle_deg: f64,
    pub max_angle_deg: f64,
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            min_angle_deg: 160.0,
            max_angle_deg: 200.0,
        }
    }
}

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub stars: StarSelectionConfig,
    pub triangles: TriangleConfig,
    pub flip: FlipConfig,
    /// Minimum accepted matches for an affine fit; never below 3.
    pub min_matches: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            stars: StarSelectionConfig::default(),
            triangles: TriangleConfig::default(),
            flip: FlipConfig::default(),
            min_matches: 3,
        }
    }
}
