//! Cross-section profiles.
//!
//! A [`ProfileGenerator`] yields one closed loop per along-path fraction, in
//! local `(u, v)` coordinates measured in units of a frame's `axis1` and
//! `axis2`. Index 0 is the landmark point and sits on `+u` for the built-in
//! ellipse; every loop has the same point count.

use std::f64::consts::TAU;

use crate::geom::{MagnitudeScaling, Vec3, smooth_cubic_hermite_derivatives_loop};

use super::error::ScaffoldError;

/// Closed loop of points and around derivatives; `z` is always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileLoop {
    pub points: Vec<Vec3>,
    pub derivatives: Vec<Vec3>,
}

impl ProfileLoop {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Source of cross-section loops along a path.
pub trait ProfileGenerator {
    /// Points per loop; constant for every `xi`.
    fn points_count(&self) -> usize;

    /// Loop at along-path fraction `xi` in `[0, 1]`.
    ///
    /// # Errors
    /// Implementations fail with a degenerate geometry error when they
    /// cannot produce a closed loop.
    fn profile_at(&self, xi: f64) -> Result<ProfileLoop, ScaffoldError>;
}

/// Ellipse with semi-axes 1 along `u` and `ratio` along `v`, the ratio
/// interpolated linearly from start to end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseProfile {
    pub points_count: usize,
    pub ratio_start: f64,
    pub ratio_end: f64,
}

impl EllipseProfile {
    #[must_use]
    pub fn circle(points_count: usize) -> Self {
        Self {
            points_count,
            ratio_start: 1.0,
            ratio_end: 1.0,
        }
    }
}

impl ProfileGenerator for EllipseProfile {
    fn points_count(&self) -> usize {
        self.points_count
    }

    fn profile_at(&self, xi: f64) -> Result<ProfileLoop, ScaffoldError> {
        if self.points_count < 2 {
            return Err(ScaffoldError::degenerate(
                "profile",
                [self.points_count],
                "loop needs at least two points",
            ));
        }
        let xi = xi.clamp(0.0, 1.0);
        let ratio = self.ratio_start * (1.0 - xi) + self.ratio_end * xi;
        let step = TAU / self.points_count as f64;
        let (points, initial): (Vec<Vec3>, Vec<Vec3>) = (0..self.points_count)
            .map(|n| {
                let (s, c) = (n as f64 * step).sin_cos();
                (
                    Vec3::new(c, ratio * s, 0.0),
                    Vec3::new(-s * step, ratio * c * step, 0.0),
                )
            })
            .unzip();
        let derivatives =
            smooth_cubic_hermite_derivatives_loop(&points, &initial, false, MagnitudeScaling::Arithmetic)?;
        Ok(ProfileLoop {
            points,
            derivatives,
        })
    }
}
