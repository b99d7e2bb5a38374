//! Star-pattern registration of a frame against a reference star list.
//!
//! Pipeline:
//! 1. [`select_stars`] picks a spatially spread subset of detected stars.
//! 2. [`triangle::match_stars`] builds scale-invariant triangle descriptors
//!    for both lists, votes for star correspondences and extracts one-to-one
//!    matches.
//! 3. [`AffineTransform::fit`] solves the least-squares affine map from
//!    reference positions to target positions.
//! 4. A rotation near 180° marks a flipped frame (meridian flip): the target
//!    stars are mirrored through the image center and the fit is redone.
//! 5. [`warp_affine`] resamples the frame into the reference grid.

pub mod config;
mod error;
mod stars;
pub mod transform;
pub mod triangle;
mod warp;

use glam::DVec2;

pub use config::{FlipConfig, RegistrationConfig, StarSelectionConfig, TriangleConfig};
pub use error::RegistrationError;
pub use stars::{BoundingBox, DetectedStar, mirror_points, select_stars};
pub use transform::AffineTransform;
pub use warp::warp_affine;

/// Outcome of aligning one frame to a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    /// Maps reference pixel coordinates to (possibly mirrored) frame coordinates.
    pub transform: AffineTransform,
    /// The frame is rotated ~180° against the reference; sampling must mirror.
    pub flipped: bool,
    /// Star correspondences used by the fit.
    pub matches: usize,
}

impl Alignment {
    /// Resamples a `width x height` plane of the aligned frame onto the reference grid.
    pub fn warp(&self, pixels: &[f32], width: usize, height: usize) -> Vec<f32> {
        warp_affine(pixels, width, height, &self.transform, self.flipped)
    }
}

/// Aligns a frame, given its detected stars, to `reference` star positions.
pub fn align(
    reference: &[DVec2],
    frame_stars: &[DetectedStar],
    width: usize,
    height: usize,
    config: &RegistrationConfig,
) -> Result<Alignment, RegistrationError> {
    let target = select_stars(frame_stars, width, height, &config.stars);
    align_points(reference, &target, width, height, config)
}

/// Aligns already-selected frame star positions to `reference`.
pub fn align_points(
    reference: &[DVec2],
    target: &[DVec2],
    width: usize,
    height: usize,
    config: &RegistrationConfig,
) -> Result<Alignment, RegistrationError> {
    let required = config.min_matches.max(3);
    let found = reference.len().min(target.len());
    if found < required {
        return Err(RegistrationError::InsufficientStars { found, required });
    }

    let (transform, matches) = fit_points(reference, target, config)?;
    if !transform.is_flipped(&config.flip) {
        tracing::debug!(matches, %transform, "Frame aligned");
        return Ok(Alignment {
            transform,
            flipped: false,
            matches,
        });
    }

    let mirrored = mirror_points(target, width, height);
    let (transform, matches) = fit_points(reference, &mirrored, config)?;
    tracing::debug!(matches, %transform, "Flipped frame aligned");
    Ok(Alignment {
        transform,
        flipped: true,
        matches,
    })
}

fn fit_points(
    reference: &[DVec2],
    target: &[DVec2],
    config: &RegistrationConfig,
) -> Result<(AffineTransform, usize), RegistrationError> {
    let matches = triangle::match_stars(reference, target, &config.triangles);
    let required = config.min_matches.max(3);
    if matches.len() < required {
        return Err(RegistrationError::InsufficientMatches {
            found: matches.len(),
            required,
        });
    }

    let (from, to): (Vec<DVec2>, Vec<DVec2>) = matches
        .iter()
        .map(|m| (reference[m.reference], target[m.target]))
        .unzip();

    let transform = AffineTransform::fit(&from, &to)?;
    Ok((transform, matches.len()))
}
