//! Triangle-similarity star matching.
//!
//! Every star triple yields a triangle described by its two shorter sides
//! normalized by the longest one. Matching descriptors between the reference
//! and target lists vote for the star pairs at corresponding vertices; the
//! strongest one-to-one pairs become matches.

mod geometry;
mod matching;
mod voting;

use glam::DVec2;

use super::config::TriangleConfig;

use geometry::build_triangles;
use matching::extract_matches;
use voting::vote;

pub use matching::StarMatch;

/// Star correspondences between `reference` and `target`, strongest first.
pub fn match_stars(reference: &[DVec2], target: &[DVec2], config: &TriangleConfig) -> Vec<StarMatch> {
    if reference.len() < 3 || target.len() < 3 {
        return Vec::new();
    }

    let reference_triangles = build_triangles(reference, config);
    let target_triangles = build_triangles(target, config);

    let votes = vote(
        &reference_triangles,
        &target_triangles,
        reference.len(),
        target.len(),
        config.match_tolerance,
    );
    let matches = extract_matches(votes, config);

    tracing::trace!(
        reference_triangles = reference_triangles.len(),
        target_triangles = target_triangles.len(),
        matches = matches.len(),
        "Triangle matching done"
    );
    matches
}

#[cfg(test)]
mod tests;
