//! Percentile-clipped combination of a finite frame set.
//!
//! Each frame is scaled by `reference_median / frame_median`, the reference
//! being the first frame with a positive median. Per pixel, values outside
//! `[median * (1 - lower), median * (1 + upper)]` are rejected and the rest
//! averaged. With both bounds at zero the result is the plain mean of the
//! normalized values.
//!
//! Frames are streamed row by row so only one row per frame is resident.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::Error;
use crate::image_io::PixelSource;
use crate::math::statistics::median_f32_mut;

/// Lower and upper rejection bounds as fractions of the per-pixel median.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileClip {
    pub lower: f32,
    pub upper: f32,
}

impl PercentileClip {
    /// No rejection: plain arithmetic mean.
    pub const NONE: Self = Self {
        lower: 0.0,
        upper: 0.0,
    };

    /// Bounds used for flat masters.
    pub const FLAT: Self = Self {
        lower: 0.2,
        upper: 0.1,
    };

    pub fn is_none(&self) -> bool {
        self.lower == 0.0 && self.upper == 0.0
    }
}

impl Default for PercentileClip {
    fn default() -> Self {
        Self::FLAT
    }
}

/// Combines `frames` into one buffer, `medians[i]` being the median of frame `i`.
///
/// All frames must share the first frame's dimensions. A frame median `<= 0`
/// leaves that frame unscaled, as does a set without any positive median.
pub fn percentile_clip(
    frames: &mut [Box<dyn PixelSource>],
    medians: &[f32],
    clip: PercentileClip,
) -> Result<Vec<f32>, Error> {
    let Some(first) = frames.first() else {
        return Err(Error::NoFrames);
    };
    if medians.len() != frames.len() {
        return Err(Error::MedianCount {
            expected: frames.len(),
            actual: medians.len(),
        });
    }

    let (width, height) = (first.width(), first.height());
    for (index, frame) in frames.iter().enumerate() {
        let actual = (frame.width(), frame.height());
        if actual != (width, height) {
            return Err(Error::DimensionMismatch {
                index,
                expected: (width, height),
                actual,
            });
        }
    }

    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let normalization = normalization_factors(medians);
    let frame_count = frames.len();

    let mut master = vec![0.0f32; width * height];
    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(frame_count);

    for (y, master_row) in master.chunks_exact_mut(width).enumerate() {
        rows.clear();
        for (index, frame) in frames.iter_mut().enumerate() {
            let row = frame
                .read_row(y)
                .map_err(|source| Error::Read { index, source })?;
            if row.len() != width {
                return Err(Error::BufferLength {
                    expected: width,
                    actual: row.len(),
                });
            }
            rows.push(row);
        }

        master_row.par_iter_mut().enumerate().for_each_init(
            || Vec::with_capacity(frame_count),
            |values, (x, out)| {
                values.clear();
                values.extend(rows.iter().zip(&normalization).map(|(row, &n)| row[x] * n));
                *out = combine_pixel(values, clip);
            },
        );
    }

    Ok(master)
}

fn normalization_factors(medians: &[f32]) -> Vec<f32> {
    let Some(reference) = medians.iter().copied().find(|&m| m > 0.0) else {
        return vec![1.0; medians.len()];
    };
    medians
        .iter()
        .map(|&m| if m > 0.0 { reference / m } else { 1.0 })
        .collect()
}

/// Combines the normalized samples of one pixel. Reorders `values`.
fn combine_pixel(values: &mut [f32], clip: PercentileClip) -> f32 {
    if clip.is_none() {
        return values.iter().sum::<f32>() / values.len() as f32;
    }

    let median = median_f32_mut(values);
    let low = median - median * clip.lower;
    let high = median + median * clip.upper;

    let (sum, count) = values
        .iter()
        .filter(|&&v| low <= v && v <= high)
        .fold((0.0f32, 0usize), |(s, c), &v| (s + v, c + 1));

    if count == 0 { median } else { sum / count as f32 }
}
