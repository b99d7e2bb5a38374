//! Bilinear demosaicing of one-shot-color frames into separate planes.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bayer CFA (Color Filter Array) pattern, named by its top-left 2x2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CfaPattern {
    /// Red at (0,0), green at (0,1) and (1,0), blue at (1,1).
    #[default]
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;

const HORIZONTAL: [(isize, isize); 2] = [(-1, 0), (1, 0)];
const VERTICAL: [(isize, isize); 2] = [(0, -1), (0, 1)];
const CROSS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const DIAGONAL: [(isize, isize); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

impl CfaPattern {
    /// The 2x2 block as `[row0_col0, row0_col1, row1_col0, row1_col1]`.
    /// Values: 0=Red, 1=Green, 2=Blue.
    #[inline(always)]
    pub fn pattern_2x2(&self) -> [usize; 4] {
        match self {
            CfaPattern::Rggb => [RED, GREEN, GREEN, BLUE],
            CfaPattern::Bggr => [BLUE, GREEN, GREEN, RED],
            CfaPattern::Grbg => [GREEN, RED, BLUE, GREEN],
            CfaPattern::Gbrg => [GREEN, BLUE, RED, GREEN],
        }
    }

    #[inline(always)]
    pub fn color_at(&self, x: usize, y: usize) -> usize {
        self.pattern_2x2()[((y & 1) << 1) | (x & 1)]
    }

    /// Whether row `y` holds red (and green) photosites.
    #[inline(always)]
    pub fn red_in_row(&self, y: usize) -> bool {
        match self {
            CfaPattern::Rggb | CfaPattern::Grbg => (y & 1) == 0,
            CfaPattern::Bggr | CfaPattern::Gbrg => (y & 1) == 1,
        }
    }
}

/// Full-resolution red, green and blue planes of a demosaiced frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPlanes {
    pub red: Vec<f32>,
    pub green: Vec<f32>,
    pub blue: Vec<f32>,
}

/// Bilinear interpolation of the missing colors at every photosite.
///
/// Neighbors outside the image are skipped, so edge pixels average fewer
/// samples.
///
/// # Panics
/// Panics if `data.len() != width * height`.
pub fn demosaic_bilinear(data: &[f32], width: usize, height: usize, cfa: CfaPattern) -> ColorPlanes {
    assert_eq!(data.len(), width * height, "data length must equal width * height");

    let mut rgb = vec![[0.0f32; 3]; width * height];
    if width > 0 {
        rgb.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                *out = interpolate_pixel(data, width, height, x, y, cfa);
            }
        });
    }

    let mut planes = ColorPlanes {
        red: Vec::with_capacity(rgb.len()),
        green: Vec::with_capacity(rgb.len()),
        blue: Vec::with_capacity(rgb.len()),
    };
    for [r, g, b] in rgb {
        planes.red.push(r);
        planes.green.push(g);
        planes.blue.push(b);
    }
    planes
}

#[inline]
fn interpolate_pixel(data: &[f32], width: usize, height: usize, x: usize, y: usize, cfa: CfaPattern) -> [f32; 3] {
    let value = data[y * width + x];
    let avg = |offsets: &[(isize, isize)]| average(data, width, height, x, y, offsets);

    match cfa.color_at(x, y) {
        RED => [value, avg(&CROSS), avg(&DIAGONAL)],
        BLUE => [avg(&DIAGONAL), avg(&CROSS), value],
        _ if cfa.red_in_row(y) => [avg(&HORIZONTAL), value, avg(&VERTICAL)],
        _ => [avg(&VERTICAL), value, avg(&HORIZONTAL)],
    }
}

/// Mean of the in-bounds neighbors at `offsets`, the center value if none are.
#[inline]
fn average(data: &[f32], width: usize, height: usize, x: usize, y: usize, offsets: &[(isize, isize)]) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0u32;
    for &(dx, dy) in offsets {
        let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
            continue;
        };
        if nx < width && ny < height {
            sum += data[ny * width + nx];
            count += 1;
        }
    }

    if count > 0 {
        sum / count as f32
    } else {
        data[y * width + x]
    }
}
