//! Affine transform estimation and flip classification.

use glam::{DMat2, DMat3, DVec2, DVec3};

use super::RegistrationError;
use super::config::FlipConfig;

/// 2D affine map `x' = a·x + b·y + c`, `y' = d·x + e·y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for AffineTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Affine(dx={:.2}, dy={:.2}, rot={:.3}°)",
            self.c,
            self.f,
            self.rotation_degrees()
        )
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    /// From row-major parameters `[a, b, c, d, e, f]`.
    pub fn new(p: [f64; 6]) -> Self {
        Self {
            a: p[0],
            b: p[1],
            c: p[2],
            d: p[3],
            e: p[4],
            f: p[5],
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::new([1.0, 0.0, dx, 0.0, 1.0, dy])
    }

    /// Rotation by `angle` radians about the origin followed by a translation.
    pub fn rotation(angle: f64, dx: f64, dy: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new([cos, sin, dx, -sin, cos, dy])
    }

    #[inline]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            self.a * p.x + self.b * p.y + self.c,
            self.d * p.x + self.e * p.y + self.f,
        )
    }

    /// Inverse map, `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let linear = DMat2::from_cols(DVec2::new(self.a, self.d), DVec2::new(self.b, self.e));
        let det = linear.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON {
            return None;
        }
        let inv = linear.inverse();
        let t = inv * DVec2::new(-self.c, -self.f);
        Some(Self::new([
            inv.x_axis.x,
            inv.y_axis.x,
            t.x,
            inv.x_axis.y,
            inv.y_axis.y,
            t.y,
        ]))
    }

    /// `atan2(b, a)` in degrees, normalized to `[0, 360)`.
    pub fn rotation_degrees(&self) -> f64 {
        let angle = self.b.atan2(self.a).to_degrees();
        if angle < 0.0 { angle + 360.0 } else { angle }
    }

    /// Whether the rotation falls inside the flip window.
    pub fn is_flipped(&self, config: &FlipConfig) -> bool {
        let angle = self.rotation_degrees();
        angle >= config.min_angle_deg && angle <= config.max_angle_deg
    }

    /// Least-squares affine map taking each `from[i]` to `to[i]`.
    ///
    /// Both coordinate rows share the normal matrix
    /// `[[Σxx, Σxy, Σx], [Σxy, Σyy, Σy], [Σx, Σy, n]]`, so the 6-parameter
    /// system splits into two 3x3 solves.
    pub fn fit(from: &[DVec2], to: &[DVec2]) -> Result<Self, RegistrationError> {
        let n = from.len().min(to.len());
        if n < 3 {
            return Err(RegistrationError::InsufficientMatches {
                found: n,
                required: 3,
            });
        }

        let mut normal = DMat3::ZERO;
        let mut rhs_x = DVec3::ZERO;
        let mut rhs_y = DVec3::ZERO;
        for (p, q) in from.iter().zip(to) {
            let row = DVec3::new(p.x, p.y, 1.0);
            normal += DMat3::from_cols(row * row.x, row * row.y, row);
            rhs_x += row * q.x;
            rhs_y += row * q.y;
        }

        let det = normal.determinant();
        let scale = normal.x_axis.length() * normal.y_axis.length() * normal.z_axis.length();
        if !det.is_finite() || det.abs() <= 1e-12 * scale {
            return Err(RegistrationError::DegenerateGeometry);
        }

        let inv = normal.inverse();
        let px = inv * rhs_x;
        let py = inv * rhs_y;
        Ok(Self::new([px.x, px.y, px.z, py.x, py.y, py.z]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &AffineTransform, b: &AffineTransform, eps: f64) {
        let pa = [a.a, a.b, a.c, a.d, a.e, a.f];
        let pb = [b.a, b.b, b.c, b.d, b.e, b.f];
        for (x, y) in pa.iter().zip(pb.iter()) {
            assert!((x - y).abs() < eps, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_fit_recovers_known_affine_from_four_points() {
        let truth = AffineTransform::new([0.98, 0.05, 12.5, -0.04, 1.01, -7.25]);
        let from = [
            DVec2::new(10.0, 20.0),
            DVec2::new(300.0, 40.0),
            DVec2::new(150.0, 250.0),
            DVec2::new(400.0, 380.0),
        ];
        let to: Vec<DVec2> = from.iter().map(|&p| truth.apply(p)).collect();

        let fitted = AffineTransform::fit(&from, &to).unwrap();
        assert_close(&fitted, &truth, 1e-7);
    }

    #[test]
    fn test_fit_needs_three_points() {
        let pts = [DVec2::new(0.0, 0.0), DVec2::new(1.0, 1.0)];
        assert_eq!(
            AffineTransform::fit(&pts, &pts),
            Err(RegistrationError::InsufficientMatches {
                found: 2,
                required: 3
            })
        );
    }

    #[test]
    fn test_fit_rejects_collinear_points() {
        let pts: Vec<DVec2> = (0..5).map(|i| DVec2::new(i as f64, 2.0 * i as f64)).collect();
        assert_eq!(
            AffineTransform::fit(&pts, &pts),
            Err(RegistrationError::DegenerateGeometry)
        );
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = AffineTransform::new([1.1, 0.2, 5.0, -0.1, 0.9, -3.0]);
        let inv = t.inverse().unwrap();
        let p = DVec2::new(37.0, -12.0);
        assert!((inv.apply(t.apply(p)) - p).length() < 1e-9);
    }

    #[test]
    fn test_pure_180_rotation_is_flipped() {
        let t = AffineTransform::rotation(std::f64::consts::PI, 1023.0, 767.0);
        assert!((t.rotation_degrees() - 180.0).abs() < 1e-9);
        assert!(t.is_flipped(&FlipConfig::default()));
    }

    #[test]
    fn test_translation_and_small_rotation_not_flipped() {
        let flip = FlipConfig::default();
        assert!(!AffineTransform::translation(40.0, -12.0).is_flipped(&flip));
        assert!(!AffineTransform::rotation(9f64.to_radians(), 3.0, 4.0).is_flipped(&flip));
        assert!(!AffineTransform::rotation(-9f64.to_radians(), 3.0, 4.0).is_flipped(&flip));
    }

    #[test]
    fn test_flip_window_is_configurable() {
        let t = AffineTransform::rotation(150f64.to_radians(), 0.0, 0.0);
        assert!(!t.is_flipped(&FlipConfig::default()));
        let wide = FlipConfig {
            min_angle_deg: 140.0,
            max_angle_deg: 220.0,
        };
        assert!(t.is_flipped(&wide));
    }
}
