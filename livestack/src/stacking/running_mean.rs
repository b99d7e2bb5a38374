//! Incremental arithmetic mean.

use rayon::prelude::*;

use super::Error;

const CHUNK: usize = 8 * 1024;

/// Folds `frame` into `stack`, where `stack` is the mean of `count` frames.
///
/// Computes `(count * stack + frame) / (count + 1)` per pixel in f64. After the
/// call `stack` is the mean of `count + 1` frames.
pub fn fold_into_mean(stack: &mut [f32], frame: &[f32], count: u32) -> Result<(), Error> {
    if stack.len() != frame.len() {
        return Err(Error::BufferLength {
            expected: stack.len(),
            actual: frame.len(),
        });
    }

    let n = count as f64;
    let denom = n + 1.0;

    stack
        .par_chunks_mut(CHUNK)
        .zip(frame.par_chunks(CHUNK))
        .for_each(|(s_chunk, f_chunk)| {
            for (s, &v) in s_chunk.iter_mut().zip(f_chunk) {
                *s = ((n * *s as f64 + v as f64) / denom) as f32;
            }
        });

    Ok(())
}
