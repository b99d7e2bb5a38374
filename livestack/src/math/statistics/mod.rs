//! Statistical functions: exact median, histogram median and MAD.

use rayon::prelude::*;

/// Number of quantization buckets used by the histogram statistics.
pub const HISTOGRAM_BUCKETS: usize = u16::MAX as usize + 1;

/// Chunk size for the parallel histogram fold.
const HISTOGRAM_CHUNK: usize = 16 * 1024;

/// Calculate the median of f32 values in-place.
///
/// Mutates the input buffer (partial sort via quickselect). Returns 0 for an
/// empty slice.
pub fn median_f32_mut(data: &mut [f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }

    let len = data.len();
    let mid = len / 2;

    let (left_part, upper, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if len & 1 == 1 {
        return upper;
    }

    let lower = left_part.iter().copied().fold(f32::MIN, f32::max);
    (lower + upper) * 0.5
}

/// Median and median absolute deviation of an image, both in `[0,1]` units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MedianMad {
    pub median: f64,
    pub mad: f64,
}

/// Quantizes normalized pixel values into [`HISTOGRAM_BUCKETS`] counts.
///
/// Values outside `[0,1]` are clamped onto the end buckets.
pub fn histogram(pixels: &[f32]) -> Vec<u64> {
    pixels
        .par_chunks(HISTOGRAM_CHUNK)
        .fold(
            || vec![0u64; HISTOGRAM_BUCKETS],
            |mut counts, chunk| {
                for &p in chunk {
                    counts[bucket_of(p)] += 1;
                }
                counts
            },
        )
        .reduce(
            || vec![0u64; HISTOGRAM_BUCKETS],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x += y;
                }
                a
            },
        )
}

#[inline]
fn bucket_of(value: f32) -> usize {
    let v = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    (v * u16::MAX as f32) as usize
}

/// Median and MAD of normalized pixels through a 16-bit histogram.
pub fn median_and_mad(pixels: &[f32]) -> MedianMad {
    if pixels.is_empty() {
        return MedianMad::default();
    }
    let counts = histogram(pixels);
    let (median, mad) = median_and_mad_from_histogram(&counts, pixels.len() as u64);
    let scale = u16::MAX as f64;
    MedianMad {
        median: median / scale,
        mad: mad / scale,
    }
}

/// Median and MAD in bucket units from a histogram of `total` samples.
///
/// The median bucket is where the cumulative count first exceeds half of
/// `total`. When the cumulative count lands exactly on half, the median is the
/// midpoint between that bucket and the next non-empty one. The MAD grows a
/// window outward from the median bucket(s) until it holds more than half of
/// the samples and reports the window's upper distance from the median.
pub fn median_and_mad_from_histogram(counts: &[u64], total: u64) -> (f64, f64) {
    if counts.is_empty() || total == 0 {
        return (0.0, 0.0);
    }

    let half = total as f64 / 2.0;
    let last = counts.len() - 1;

    let mut median1 = 0usize;
    let mut median2 = 0usize;
    let mut cumulative = 0u64;
    for (i, &count) in counts.iter().enumerate() {
        cumulative += count;
        let c = cumulative as f64;
        if c > half {
            median1 = i;
            median2 = i;
            break;
        }
        if c == half {
            median1 = i;
            median2 = counts[i + 1..]
                .iter()
                .position(|&n| n > 0)
                .map_or(i, |offset| i + 1 + offset);
            break;
        }
    }
    let median = (median1 + median2) as f64 / 2.0;

    let mut mad = 0.0;
    let mut cumulative = 0u64;
    let mut down = median1 as isize;
    let mut up = median2;
    loop {
        if down >= 0 && down as usize != up {
            cumulative += counts[down as usize] + counts[up];
        } else {
            cumulative += counts[up];
        }

        if cumulative as f64 > half {
            mad = (up as f64 - median).abs();
            break;
        }

        up += 1;
        down -= 1;
        if up > last {
            break;
        }
    }

    (median, mad)
}
