use crate::registration::config::TriangleConfig;

use super::voting::VoteMatrix;

/// A reference star paired with a target star.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarMatch {
    pub reference: usize,
    pub target: usize,
    pub votes: u32,
}

/// Minimum votes for a star pair, `round(max(floor, (m-1)(m-2)/divisor))`.
///
/// `m` is the smaller star count.
pub(crate) fn vote_threshold(n_ref: usize, n_target: usize, config: &TriangleConfig) -> u32 {
    let m = n_ref.min(n_target) as f64;
    let scaled = (m - 1.0) * (m - 2.0) / config.vote_divisor;
    scaled.max(config.min_vote_threshold).round() as u32
}

/// Extracts one-to-one matches from a vote matrix.
///
/// Rows are visited in order; a row's strongest column is accepted when it
/// reaches the threshold, after which that row and column are cleared.
/// Matches with fewer votes than the mean of all accepted matches are
/// dropped. The result is sorted by votes, descending.
pub(crate) fn extract_matches(mut matrix: VoteMatrix, config: &TriangleConfig) -> Vec<StarMatch> {
    let threshold = vote_threshold(matrix.n_ref(), matrix.n_target(), config);

    let mut matches = Vec::new();
    for ref_idx in 0..matrix.n_ref() {
        let mut best: Option<(usize, u32)> = None;
        for (target_idx, &votes) in matrix.row(ref_idx).iter().enumerate() {
            if votes > best.map_or(0, |(_, v)| v) {
                best = Some((target_idx, votes));
            }
        }

        let Some((target_idx, votes)) = best else {
            continue;
        };
        if votes >= threshold {
            matches.push(StarMatch {
                reference: ref_idx,
                target: target_idx,
                votes,
            });
            matrix.clear_cross(ref_idx, target_idx);
        }
    }

    if !matches.is_empty() {
        let mean = matches.iter().map(|m| m.votes as f64).sum::<f64>() / matches.len() as f64;
        matches.retain(|m| m.votes as f64 >= mean);
    }

    matches.sort_by(|a, b| b.votes.cmp(&a.votes));
    matches
}
