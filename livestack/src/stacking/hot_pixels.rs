//! Hot pixel removal by neighborhood statistics.
//!
//! For each pixel the mean and standard deviation of its square neighborhood
//! (center excluded) are computed in one pass; a second pass replaces pixels
//! deviating from that mean by more than `outlier_factor` standard deviations.
//! The stats pass reads only original values, so both passes run row-parallel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Neighborhood radius and rejection factor for hot pixel removal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotPixelConfig {
    /// Neighborhood half-size; 1 gives the 8-connected neighbors.
    pub radius: usize,
    /// Replace when `|v - mean| > outlier_factor * std`.
    pub outlier_factor: f32,
}

impl Default for HotPixelConfig {
    fn default() -> Self {
        Self {
            radius: 1,
            outlier_factor: 10.0,
        }
    }
}

/// Replaces hot pixels in-place. Returns the number of replaced pixels.
///
/// # Panics
/// Panics if `pixels.len() != width * height`.
pub fn remove_hot_pixels(
    pixels: &mut [f32],
    width: usize,
    height: usize,
    config: &HotPixelConfig,
) -> usize {
    assert_eq!(pixels.len(), width * height, "pixels length must equal width * height");
    if width == 0 || height == 0 {
        return 0;
    }

    let mut means = vec![0.0f32; pixels.len()];
    let mut std_devs = vec![0.0f32; pixels.len()];

    {
        let source: &[f32] = pixels;
        means
            .par_chunks_mut(width)
            .zip(std_devs.par_chunks_mut(width))
            .enumerate()
            .for_each(|(y, (mean_row, std_row))| {
                for x in 0..width {
                    let (mean, std_dev) = neighborhood_stats(source, width, height, x, y, config.radius);
                    mean_row[x] = mean;
                    std_row[x] = std_dev;
                }
            });
    }

    let factor = config.outlier_factor;
    pixels
        .par_chunks_mut(width)
        .zip(means.par_chunks(width))
        .zip(std_devs.par_chunks(width))
        .map(|((row, mean_row), std_row)| {
            let mut replaced = 0;
            for ((v, &mean), &std_dev) in row.iter_mut().zip(mean_row).zip(std_row) {
                if (*v - mean).abs() > factor * std_dev {
                    *v = mean;
                    replaced += 1;
                }
            }
            replaced
        })
        .sum()
}

/// Mean and population standard deviation of the neighbors of `(x, y)`.
///
/// A pixel without neighbors (1x1 image) reports its own value and zero spread.
fn neighborhood_stats(
    pixels: &[f32],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    radius: usize,
) -> (f32, f32) {
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = (x + radius).min(width - 1);
    let y1 = (y + radius).min(height - 1);

    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut count = 0usize;

    for ny in y0..=y1 {
        let row = &pixels[ny * width..(ny + 1) * width];
        for (nx, &v) in row.iter().enumerate().take(x1 + 1).skip(x0) {
            if nx == x && ny == y {
                continue;
            }
            sum += v;
            sum_sq += v * v;
            count += 1;
        }
    }

    if count == 0 {
        return (pixels[y * width + x], 0.0);
    }

    let mean = sum / count as f32;
    let variance = sum_sq / count as f32 - mean * mean;
    (mean, variance.max(0.0).sqrt())
}
