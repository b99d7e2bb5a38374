//! Tests for triangle matching module.

use glam::DVec2;

use super::geometry::{DistanceMatrix, Triangle, build_triangles};
use super::matching::{StarMatch, extract_matches, vote_threshold};
use super::voting::{VoteMatrix, vote};
use super::match_stars;
use crate::registration::config::TriangleConfig;
use crate::registration::transform::AffineTransform;
use crate::testing::star_positions;

/// Build a VoteMatrix from (ref_idx, target_idx, votes) entries.
fn vote_matrix_from_entries(n_ref: usize, n_target: usize, entries: &[(usize, usize, u32)]) -> VoteMatrix {
    let mut vm = VoteMatrix::new(n_ref, n_target);
    for &(r, t, count) in entries {
        for _ in 0..count {
            vm.increment(r, t);
        }
    }
    vm
}

fn triangle(points: [DVec2; 3]) -> Option<Triangle> {
    Triangle::from_triple(0, 1, 2, &DistanceMatrix::new(&points))
}

// ============================================================================
// Triangle descriptor tests
// ============================================================================

#[test]
fn test_triangle_3_4_5_descriptor() {
    // d01 = 3, d02 = 4, d12 = 5
    let tri = triangle([DVec2::new(0.0, 0.0), DVec2::new(3.0, 0.0), DVec2::new(0.0, 4.0)]).unwrap();

    assert!((tri.side1 - 5.0).abs() < 1e-12);
    assert!((tri.side2 - 0.8).abs() < 1e-12);
    assert!((tri.side3 - 0.6).abs() < 1e-12);
    // Star opposite the shortest side first.
    assert_eq!(tri.indices, [2, 1, 0]);
}

#[test]
fn test_triangle_descriptor_scale_and_rotation_invariant() {
    let base = [DVec2::new(0.0, 0.0), DVec2::new(3.0, 0.0), DVec2::new(0.0, 4.0)];
    let t = AffineTransform::rotation(0.7, 12.0, -3.0);
    let moved = base.map(|p| t.apply(p * 10.0));

    let a = triangle(base).unwrap();
    let b = triangle(moved).unwrap();

    assert!((a.side2 - b.side2).abs() < 1e-12);
    assert!((a.side3 - b.side3).abs() < 1e-12);
    assert_eq!(a.indices, b.indices);
}

#[test]
fn test_zero_size_triangle_is_none() {
    let p = DVec2::new(4.0, 4.0);
    assert!(triangle([p, p, p]).is_none());
}

#[test]
fn test_distinctive_filter() {
    let config = TriangleConfig::default();

    let right = triangle([DVec2::new(0.0, 0.0), DVec2::new(3.0, 0.0), DVec2::new(0.0, 4.0)]).unwrap();
    assert!(right.is_distinctive(&config));

    // Isosceles: side2 == side3.
    let isosceles = triangle([DVec2::new(0.0, 0.0), DVec2::new(4.0, 0.0), DVec2::new(2.0, 3.0)]).unwrap();
    assert!(!isosceles.is_distinctive(&config));

    // Nearly collinear: side2 + side3 is just above 1, under the 1.3 floor.
    let flat = triangle([DVec2::new(0.0, 0.0), DVec2::new(7.0, 0.1), DVec2::new(10.0, 0.0)]).unwrap();
    assert!(flat.side2 + flat.side3 > 1.0);
    assert!(!flat.is_distinctive(&config));

    // Equilateral: both ratios 1.
    let equilateral = triangle([
        DVec2::new(0.0, 0.0),
        DVec2::new(10.0, 0.0),
        DVec2::new(5.0, 8.660254037844386),
    ])
    .unwrap();
    assert!(!equilateral.is_distinctive(&config));
}

#[test]
fn test_build_triangles_sorted_by_side3() {
    let points = star_positions(20, 300, 200, 7);
    let triangles = build_triangles(&points, &TriangleConfig::default());

    assert!(!triangles.is_empty());
    assert!(triangles.windows(2).all(|w| w[0].side3 <= w[1].side3));
    assert!(triangles.iter().all(|t| t.indices.iter().all(|&i| i < 20)));
}

// ============================================================================
// Voting tests
// ============================================================================

#[test]
fn test_vote_identical_lists_vote_diagonal() {
    let points = star_positions(15, 300, 200, 11);
    let config = TriangleConfig::default();
    let triangles = build_triangles(&points, &config);

    let matrix = vote(&triangles, &triangles, 15, 15, config.match_tolerance);

    for r in 0..15 {
        for t in 0..15 {
            if r != t {
                assert_eq!(matrix.get(r, t), 0, "off-diagonal vote at ({r}, {t})");
            }
        }
    }
    let diagonal: u32 = (0..15).map(|i| matrix.get(i, i)).sum();
    assert_eq!(diagonal as usize, triangles.len() * 3);
}

#[test]
fn test_vote_orientation_when_reference_has_more_triangles() {
    // Target is a reversed subset of the reference; the reference list is larger
    // so target triangles probe, but rows must still be reference stars.
    let reference = star_positions(16, 300, 200, 5);
    let target: Vec<DVec2> = reference[..12].iter().rev().copied().collect();
    let config = TriangleConfig::default();

    let ref_tris = build_triangles(&reference, &config);
    let target_tris = build_triangles(&target, &config);
    assert!(ref_tris.len() > target_tris.len());

    let matrix = vote(&ref_tris, &target_tris, 16, 12, config.match_tolerance);
    assert_eq!((matrix.n_ref(), matrix.n_target()), (16, 12));

    for r in 0..12 {
        let row = matrix.row(r);
        let best = (0..12).max_by_key(|&t| row[t]).unwrap();
        assert_eq!(best, 11 - r);
    }
}

// ============================================================================
// Match extraction tests
// ============================================================================

#[test]
fn test_vote_threshold() {
    let config = TriangleConfig::default();
    // 99 * 98 / 150 = 64.68
    assert_eq!(vote_threshold(100, 120, &config), 65);
    // Floor applies for small fields.
    assert_eq!(vote_threshold(10, 10, &config), 4);
    assert_eq!(vote_threshold(1, 50, &config), 4);
}

#[test]
fn test_extract_matches_one_to_one_and_mean_filter() {
    let matrix = vote_matrix_from_entries(
        4,
        4,
        &[
            (0, 0, 10),
            (0, 1, 8),
            (1, 0, 7),
            (1, 1, 9),
            (2, 2, 3),
            (3, 3, 5),
        ],
    );

    let matches = extract_matches(matrix, &TriangleConfig::default());

    // Row 1 loses column 0 to row 0; (2,2) is under the threshold of 4;
    // (3,3) with 5 votes is below the mean of 8.
    assert_eq!(
        matches,
        vec![
            StarMatch {
                reference: 0,
                target: 0,
                votes: 10
            },
            StarMatch {
                reference: 1,
                target: 1,
                votes: 9
            },
        ]
    );
}

#[test]
fn test_extract_matches_empty_matrix() {
    let matches = extract_matches(VoteMatrix::new(5, 5), &TriangleConfig::default());
    assert!(matches.is_empty());
}

#[test]
fn test_clear_cross() {
    let mut matrix = vote_matrix_from_entries(2, 3, &[(0, 1, 2), (1, 1, 4), (1, 2, 1)]);
    matrix.clear_cross(0, 1);
    assert_eq!(matrix.row(0), &[0, 0, 0]);
    assert_eq!(matrix.row(1), &[0, 0, 1]);
}

// ============================================================================
// End-to-end matching
// ============================================================================

#[test]
fn test_match_stars_rotated_translated_permuted_field() {
    let reference = star_positions(30, 400, 300, 42);
    let t = AffineTransform::rotation(10f64.to_radians(), 15.0, -8.0);
    let target: Vec<DVec2> = reference.iter().rev().map(|&p| t.apply(p)).collect();

    let matches = match_stars(&reference, &target, &TriangleConfig::default());

    assert!(matches.len() >= 3, "only {} matches", matches.len());
    for m in &matches {
        assert_eq!(m.target, 29 - m.reference);
    }
    assert!(matches.windows(2).all(|w| w[0].votes >= w[1].votes));
}

#[test]
fn test_match_stars_too_few_points() {
    let points = [DVec2::new(0.0, 0.0), DVec2::new(5.0, 1.0)];
    assert!(match_stars(&points, &points, &TriangleConfig::default()).is_empty());
}
