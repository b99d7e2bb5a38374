//! Resampling of a frame into the reference grid.

use glam::DVec2;
use rayon::prelude::*;

use super::transform::AffineTransform;

/// Source coordinates within this distance outside the grid snap onto it.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Resamples `source` into a new buffer of the same size.
///
/// Each destination pixel `(x, y)` samples the source at `transform(x, y)`,
/// mirrored to `(W-1-sx, H-1-sy)` when `flipped`, with bilinear
/// interpolation. Samples outside the source are 0.
///
/// # Panics
/// Panics if `source.len() != width * height`.
pub fn warp_affine(
    source: &[f32],
    width: usize,
    height: usize,
    transform: &AffineTransform,
    flipped: bool,
) -> Vec<f32> {
    assert_eq!(source.len(), width * height, "source length must equal width * height");

    let mut output = vec![0.0f32; width * height];
    if width == 0 || height == 0 {
        return output;
    }

    let max = DVec2::new(width as f64 - 1.0, height as f64 - 1.0);

    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut p = transform.apply(DVec2::new(x as f64, y as f64));
                if flipped {
                    p = max - p;
                }
                *out = sample_bilinear(source, width, height, p);
            }
        });

    output
}

/// Bilinear sample at fractional position `p`, 0 outside the image.
#[inline]
fn sample_bilinear(pixels: &[f32], width: usize, height: usize, p: DVec2) -> f32 {
    let max_x = width as f64 - 1.0;
    let max_y = height as f64 - 1.0;

    let sx = snap_to_range(p.x, max_x);
    let sy = snap_to_range(p.y, max_y);
    let (Some(sx), Some(sy)) = (sx, sy) else {
        return 0.0;
    };

    let x0 = sx.floor() as usize;
    let y0 = sy.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = (sx - x0 as f64) as f32;
    let fy = (sy - y0 as f64) as f32;

    let p00 = pixels[y0 * width + x0];
    let p01 = pixels[y0 * width + x1];
    let p10 = pixels[y1 * width + x0];
    let p11 = pixels[y1 * width + x1];

    let top = p00 + (p01 - p00) * fx;
    let bottom = p10 + (p11 - p10) * fx;
    top + (bottom - top) * fy
}

/// Coordinate clamped into `[0, max]` if within tolerance, `None` if outside.
#[inline]
fn snap_to_range(v: f64, max: f64) -> Option<f64> {
    if !v.is_finite() || v < -EDGE_TOLERANCE || v > max + EDGE_TOLERANCE {
        None
    } else {
        Some(v.clamp(0.0, max))
    }
}
