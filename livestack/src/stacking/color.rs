//! RGB combination of per-channel stacks.

use rayon::prelude::*;

use super::Error;

/// Interleaves three equally-sized channel buffers into `[r, g, b, r, g, b, ...]`.
///
/// With `green_denoise = Some(a)`, green is pulled towards the red/blue average
/// where it exceeds it: `g' = g * (1 - a) + min(g, (r + b) / 2) * a`.
pub fn merge_rgb(
    red: &[f32],
    green: &[f32],
    blue: &[f32],
    green_denoise: Option<f32>,
) -> Result<Vec<f32>, Error> {
    for channel in [green, blue] {
        if channel.len() != red.len() {
            return Err(Error::BufferLength {
                expected: red.len(),
                actual: channel.len(),
            });
        }
    }

    let amount = green_denoise.map(|a| a.clamp(0.0, 1.0));
    let mut rgb = vec![0.0f32; red.len() * 3];

    rgb.par_chunks_exact_mut(3)
        .zip(red.par_iter().zip(green.par_iter()).zip(blue.par_iter()))
        .for_each(|(px, ((&r, &g), &b))| {
            px[0] = r;
            px[1] = match amount {
                Some(a) => g * (1.0 - a) + g.min((r + b) * 0.5) * a,
                None => g,
            };
            px[2] = b;
        });

    Ok(rgb)
}
