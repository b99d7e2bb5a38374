use std::cmp::Ordering;

use glam::DVec2;
use rayon::prelude::*;

use crate::registration::config::TriangleConfig;

/// Shape descriptor of a star triple.
///
/// `side1 >= side2 >= side3`; `side2` and `side3` are divided by `side1`.
/// `indices[n]` is the star opposite the `n`-th shortest side, so vertices of
/// similar triangles correspond index by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Triangle {
    pub side1: f64,
    pub side2: f64,
    pub side3: f64,
    pub indices: [usize; 3],
}

impl Triangle {
    /// Sorts the sides of triple `(i, j, k)` and normalizes them.
    ///
    /// `None` for a zero-size triangle.
    pub fn from_triple(i: usize, j: usize, k: usize, distances: &DistanceMatrix) -> Option<Self> {
        let mut side1 = distances.get(i, j);
        let mut side2 = distances.get(i, k);
        let mut side3 = distances.get(j, k);
        let (mut index1, mut index2, mut index3) = (i, j, k);

        if side1 < side2 {
            std::mem::swap(&mut side1, &mut side2);
            std::mem::swap(&mut index2, &mut index3);
        }
        if side2 < side3 {
            std::mem::swap(&mut side2, &mut side3);
            std::mem::swap(&mut index1, &mut index2);
        }
        if side1 < side2 {
            std::mem::swap(&mut side1, &mut side2);
            std::mem::swap(&mut index2, &mut index3);
        }

        if side1 <= 0.0 {
            return None;
        }

        Some(Self {
            side1,
            side2: side2 / side1,
            side3: side3 / side1,
            indices: [index1, index2, index3],
        })
    }

    /// Filters out near-collinear and near-isosceles shapes.
    pub fn is_distinctive(&self, config: &TriangleConfig) -> bool {
        self.side2 < config.max_relative_side
            && self.side3 < config.max_relative_side
            && self.side2 + self.side3 > config.min_side_sum
            && (self.side2 - self.side3).abs() > config.min_side_difference
    }

    /// Squared distance between descriptors in (side2, side3) space.
    #[inline]
    pub fn descriptor_distance_sq(&self, other: &Triangle) -> f64 {
        let d2 = self.side2 - other.side2;
        let d3 = self.side3 - other.side3;
        d2 * d2 + d3 * d3
    }
}

/// Orders triangles by normalized `side3`.
pub(crate) fn by_side3(a: &Triangle, b: &Triangle) -> Ordering {
    a.side3.total_cmp(&b.side3)
}

/// Symmetric pairwise distance table.
pub(crate) struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(points: &[DVec2]) -> Self {
        let n = points.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = points[i].distance(points[j]);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }
}

/// All distinctive triangles over `points`, sorted by `side3` ascending.
pub(crate) fn build_triangles(points: &[DVec2], config: &TriangleConfig) -> Vec<Triangle> {
    let n = points.len();
    let distances = DistanceMatrix::new(points);

    let mut triangles: Vec<Triangle> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let distances = &distances;
            ((i + 1)..n).flat_map(move |j| {
                ((j + 1)..n).filter_map(move |k| {
                    Triangle::from_triple(i, j, k, distances).filter(|t| t.is_distinctive(config))
                })
            })
        })
        .collect();

    triangles.par_sort_by(by_side3);
    triangles
}
