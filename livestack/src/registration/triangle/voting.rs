use rayon::prelude::*;

use super::geometry::Triangle;

/// Dense vote counts, rows are reference stars and columns target stars.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VoteMatrix {
    votes: Vec<u32>,
    n_ref: usize,
    n_target: usize,
}

impl VoteMatrix {
    pub fn new(n_ref: usize, n_target: usize) -> Self {
        Self {
            votes: vec![0; n_ref * n_target],
            n_ref,
            n_target,
        }
    }

    pub fn n_ref(&self) -> usize {
        self.n_ref
    }

    pub fn n_target(&self) -> usize {
        self.n_target
    }

    #[inline]
    pub fn get(&self, ref_idx: usize, target_idx: usize) -> u32 {
        self.votes[ref_idx * self.n_target + target_idx]
    }

    #[inline]
    pub fn increment(&mut self, ref_idx: usize, target_idx: usize) {
        let v = &mut self.votes[ref_idx * self.n_target + target_idx];
        *v = v.saturating_add(1);
    }

    pub fn row(&self, ref_idx: usize) -> &[u32] {
        let start = ref_idx * self.n_target;
        &self.votes[start..start + self.n_target]
    }

    /// Zeroes row `ref_idx` and column `target_idx`.
    pub fn clear_cross(&mut self, ref_idx: usize, target_idx: usize) {
        let start = ref_idx * self.n_target;
        self.votes[start..start + self.n_target].fill(0);
        for r in 0..self.n_ref {
            self.votes[r * self.n_target + target_idx] = 0;
        }
    }

    fn merge(mut self, other: VoteMatrix) -> VoteMatrix {
        for (a, b) in self.votes.iter_mut().zip(other.votes) {
            *a = a.saturating_add(b);
        }
        self
    }
}

/// Casts vertex-pair votes for every pair of matching triangles.
///
/// The shorter list probes the longer one (both sorted by `side3`): candidates
/// lie within `tolerance` in `side3`, and the closest in (side2, side3) space
/// votes if closer than `tolerance`. Each rayon worker fills its own matrix;
/// partial matrices are summed at the end.
pub(crate) fn vote(
    reference: &[Triangle],
    target: &[Triangle],
    n_ref: usize,
    n_target: usize,
    tolerance: f64,
) -> VoteMatrix {
    let reference_probes = reference.len() <= target.len();
    let (probes, candidates) = if reference_probes {
        (reference, target)
    } else {
        (target, reference)
    };
    let tolerance_sq = tolerance * tolerance;

    probes
        .par_iter()
        .fold(
            || VoteMatrix::new(n_ref, n_target),
            |mut matrix, probe| {
                if let Some(closest) = closest_match(candidates, probe, tolerance, tolerance_sq) {
                    let (r, t) = if reference_probes {
                        (probe, closest)
                    } else {
                        (closest, probe)
                    };
                    for k in 0..3 {
                        matrix.increment(r.indices[k], t.indices[k]);
                    }
                }
                matrix
            },
        )
        .reduce(|| VoteMatrix::new(n_ref, n_target), VoteMatrix::merge)
}

/// Closest triangle to `probe` within tolerance, searching only the `side3` window.
fn closest_match<'a>(
    sorted: &'a [Triangle],
    probe: &Triangle,
    tolerance: f64,
    tolerance_sq: f64,
) -> Option<&'a Triangle> {
    let start = sorted.partition_point(|t| t.side3 < probe.side3 - tolerance);
    let end = sorted.partition_point(|t| t.side3 < probe.side3 + tolerance);

    let mut best: Option<(&Triangle, f64)> = None;
    for candidate in &sorted[start..end.max(start)] {
        let d = probe.descriptor_distance_sq(candidate);
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((candidate, d));
        }
    }

    best.filter(|&(_, d)| d < tolerance_sq).map(|(t, _)| t)
}
