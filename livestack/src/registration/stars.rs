//! Detected stars and alignment star selection.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::config::StarSelectionConfig;

/// Pixel-space bounding box of a detected star.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One star reported by the external detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedStar {
    pub position: DVec2,
    pub average_brightness: f64,
    pub max_brightness: f64,
    pub background: f64,
    pub bounding_box: BoundingBox,
    /// Half-flux radius in pixels.
    pub hfr: f64,
}

/// Picks up to `max_stars` alignment stars spread over the image.
///
/// Saturated stars are dropped. The image is split into a grid and each cell
/// contributes its brightest stars; if that yields fewer than `max_stars`,
/// the remaining slots go to the unselected stars closest to the image center.
pub fn select_stars(
    stars: &[DetectedStar],
    width: usize,
    height: usize,
    config: &StarSelectionConfig,
) -> Vec<DVec2> {
    let mut candidates: Vec<&DetectedStar> = stars
        .iter()
        .filter(|s| s.max_brightness < config.saturation_ceiling)
        .collect();
    candidates.sort_by(|a, b| b.max_brightness.total_cmp(&a.max_brightness));

    let grid = config.grid_size.max(1);
    let cell_width = width as f64 / grid as f64;
    let cell_height = height as f64 / grid as f64;
    let per_cell = config.stars_per_cell();

    let mut selected: Vec<DVec2> = Vec::with_capacity(config.max_stars);
    for i in 0..grid {
        let (x0, x1) = (i as f64 * cell_width, (i + 1) as f64 * cell_width);
        for j in 0..grid {
            let (y0, y1) = (j as f64 * cell_height, (j + 1) as f64 * cell_height);
            selected.extend(
                candidates
                    .iter()
                    .filter(|s| {
                        let p = s.position;
                        p.x >= x0 && p.x < x1 && p.y >= y0 && p.y < y1
                    })
                    .take(per_cell)
                    .map(|s| s.position),
            );
        }
    }

    if selected.len() < config.max_stars {
        let center = DVec2::new(width as f64 / 2.0, height as f64 / 2.0);
        let mut rest: Vec<DVec2> = candidates
            .iter()
            .map(|s| s.position)
            .filter(|p| !selected.contains(p))
            .collect();
        rest.sort_by(|a, b| a.distance(center).total_cmp(&b.distance(center)));
        let missing = config.max_stars - selected.len();
        selected.extend(rest.into_iter().take(missing));
    }

    selected.truncate(config.max_stars);
    selected
}

/// Mirrors points through the image center: `(W-1-x, H-1-y)`.
pub fn mirror_points(points: &[DVec2], width: usize, height: usize) -> Vec<DVec2> {
    let max = DVec2::new(width as f64 - 1.0, height as f64 - 1.0);
    points.iter().map(|&p| max - p).collect()
}
