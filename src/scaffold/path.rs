//! Central path resampling.
//!
//! The caller's coarse path is a cubic Hermite curve through
//! [`PathControlPoint`]s. [`PathSampler`] smooths its tangents, measures it
//! and resamples it into evenly (or geometrically graded) spaced [`Frame`]s
//! whose transverse axes carry the local cross-section radius.

use serde::{Deserialize, Serialize};

use crate::geom::{
    LineSmoothing, MagnitudeScaling, Tolerance, Vec3, cubic_hermite_curvature_simple,
    interpolate_sample_cubic_hermite, sample_cubic_hermite_curves,
    smooth_cubic_hermite_derivatives_line,
};

use super::error::ScaffoldError;

/// One node of the central path: position, derivative along the path,
/// transverse axis and its derivative along the path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathControlPoint {
    pub x: Vec3,
    pub d1: Vec3,
    pub d2: Vec3,
    #[serde(default)]
    pub d12: Vec3,
}

impl PathControlPoint {
    #[must_use]
    pub const fn new(x: Vec3, d1: Vec3, d2: Vec3, d12: Vec3) -> Self {
        Self { x, d1, d2, d12 }
    }
}

/// Sampled position on the central path with its transverse frame.
///
/// `axis1` and `axis2` are orthogonal to `tangent` and to each other, and
/// both have the length of the local cross-section radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Arc length from the path start.
    pub arc_distance: f64,
    /// Fraction of the total path length, in `[0, 1]`.
    pub xi: f64,
    pub origin: Vec3,
    /// Path derivative scaled to the local element length.
    pub d1: Vec3,
    pub tangent: Vec3,
    pub axis1: Vec3,
    pub axis2: Vec3,
    /// Unsigned path curvature.
    pub curvature: f64,
}

/// Frames at every node of the resampled path.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledPath {
    pub frames: Vec<Frame>,
    pub length: f64,
}

impl SampledPath {
    #[must_use]
    pub fn elements_count(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }
}

/// Resamples a central path into `elements_count + 1` frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSampler {
    elements_count: usize,
    element_length_start_end_ratio: f64,
}

impl PathSampler {
    /// A count below 1 is raised to 1.
    #[must_use]
    pub fn new(elements_count: usize) -> Self {
        if elements_count < 1 {
            log::warn!("option `elements_count_along` clamped from {elements_count} to 1");
        }
        Self {
            elements_count: elements_count.max(1),
            element_length_start_end_ratio: 1.0,
        }
    }

    /// Grades element lengths linearly so the first element is `ratio`
    /// times the last.
    #[must_use]
    pub fn with_start_end_ratio(mut self, ratio: f64) -> Self {
        self.element_length_start_end_ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        };
        self
    }

    #[must_use]
    pub fn elements_count(&self) -> usize {
        self.elements_count
    }

    /// Samples the path.
    ///
    /// # Errors
    /// Returns [`ScaffoldError::DegenerateGeometry`] for zero tangents,
    /// coincident control points, zero total length, or a transverse axis
    /// parallel to the tangent; curve errors for fewer than two points.
    pub fn sample(&self, points: &[PathControlPoint]) -> Result<SampledPath, ScaffoldError> {
        let nx: Vec<Vec3> = points.iter().map(|p| p.x).collect();
        let nd1: Vec<Vec3> = points.iter().map(|p| p.d1).collect();
        let nd2: Vec<Vec3> = points.iter().map(|p| p.d2).collect();
        let nd12: Vec<Vec3> = points.iter().map(|p| p.d12).collect();
        let tol = Tolerance::ZERO_LENGTH;

        for (n, d1) in nd1.iter().enumerate() {
            if tol.is_zero_vec3(*d1) {
                return Err(ScaffoldError::degenerate("path sampling", [n], "zero path tangent"));
            }
        }
        for n in 1..nx.len() {
            if tol.is_zero_length(nx[n].distance_to(nx[n - 1])) {
                return Err(ScaffoldError::degenerate(
                    "path sampling",
                    [n - 1, n],
                    "coincident control points",
                ));
            }
        }

        let smoothing = LineSmoothing::new()
            .fix_end_directions()
            .with_scaling(MagnitudeScaling::Harmonic);
        let smoothed = smooth_cubic_hermite_derivatives_line(&nx, &nd1, smoothing)?;
        let samples = sample_cubic_hermite_curves(
            &nx,
            &smoothed,
            self.elements_count,
            self.element_length_start_end_ratio,
        )
        .map_err(|err| match err {
            crate::geom::CurveError::ZeroLength => {
                ScaffoldError::degenerate("path sampling", Vec::new(), "path has zero length")
            }
            other => other.into(),
        })?;
        let (sd2, _sd12) = interpolate_sample_cubic_hermite(&nd2, &nd12, &samples);

        let mut frames = Vec::with_capacity(samples.x.len());
        for n in 0..samples.x.len() {
            let tangent = samples.d1[n]
                .normalized()
                .ok_or_else(|| ScaffoldError::degenerate("path sampling", [n], "zero sampled tangent"))?;
            let radius = sd2[n].length();
            let axis1 = sd2[n].reject_from(tangent);
            if tol.is_zero_vec3(axis1) {
                return Err(ScaffoldError::degenerate(
                    "path sampling",
                    [n],
                    "transverse axis parallel to tangent",
                ));
            }
            let axis1 = axis1.with_length(radius);
            let axis2 = tangent.cross(axis1);
            let e = samples.element[n];
            let curvature = cubic_hermite_curvature_simple(
                nx[e],
                smoothed[e],
                nx[e + 1],
                smoothed[e + 1],
                samples.xi[n],
            );
            frames.push(Frame {
                arc_distance: samples.distance[n],
                xi: samples.distance[n] / samples.length,
                origin: samples.x[n],
                d1: samples.d1[n],
                tangent,
                axis1,
                axis2,
                curvature,
            });
        }
        log::debug!(
            "path sampling: {} control points -> {} frames, length {:.6}",
            points.len(),
            frames.len(),
            samples.length
        );
        Ok(SampledPath {
            frames,
            length: samples.length,
        })
    }
}

/// Two control points for a straight path from `start` to `end` with a
/// circular cross-section of `radius`.
#[must_use]
pub fn straight_path(start: Vec3, end: Vec3, radius: f64) -> Vec<PathControlPoint> {
    let d1 = end - start;
    let side = if d1.cross(Vec3::X).length_squared() > 1e-6 * d1.length_squared() {
        Vec3::X
    } else {
        Vec3::Y
    };
    let d2 = side.reject_from(d1.normalized().unwrap_or(Vec3::Z)).with_length(radius);
    vec![
        PathControlPoint::new(start, d1, d2, Vec3::ZERO),
        PathControlPoint::new(end, d1, d2, Vec3::ZERO),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::CurveError;

    #[test]
    fn test_straight_path_frames_are_even() {
        let points = straight_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0), 1.0);
        let path = PathSampler::new(4).sample(&points).expect("straight path samples");
        assert_eq!(path.frames.len(), 5);
        assert!((path.length - 4.0).abs() < 1e-9);
        for (n, frame) in path.frames.iter().enumerate() {
            assert!((frame.origin.z - n as f64).abs() < 1e-9);
            assert!((frame.tangent - Vec3::Z).length() < 1e-9);
            assert!((frame.axis1.length() - 1.0).abs() < 1e-12);
            assert!((frame.axis2.length() - 1.0).abs() < 1e-12);
            assert!(frame.axis1.dot(frame.axis2).abs() < 1e-12);
            assert!(frame.curvature.abs() < 1e-9);
            assert!((frame.d1.length() - 1.0).abs() < 1e-9);
        }
        assert!((path.frames[4].xi - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_count_is_clamped() {
        let sampler = PathSampler::new(0);
        assert_eq!(sampler.elements_count(), 1);
        let points = straight_path(Vec3::ZERO, Vec3::X, 0.5);
        let path = sampler.sample(&points).expect("one element");
        assert_eq!(path.elements_count(), 1);
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        let zero_tangent = vec![
            PathControlPoint::new(Vec3::ZERO, Vec3::ZERO, Vec3::X, Vec3::ZERO),
            PathControlPoint::new(Vec3::Z, Vec3::Z, Vec3::X, Vec3::ZERO),
        ];
        let err = PathSampler::new(2).sample(&zero_tangent).unwrap_err();
        assert!(err.is_degenerate_geometry());

        let coincident = vec![
            PathControlPoint::new(Vec3::ZERO, Vec3::Z, Vec3::X, Vec3::ZERO),
            PathControlPoint::new(Vec3::ZERO, Vec3::Z, Vec3::X, Vec3::ZERO),
        ];
        let err = PathSampler::new(2).sample(&coincident).unwrap_err();
        assert!(matches!(err, ScaffoldError::DegenerateGeometry { ref indices, .. } if indices == &vec![0, 1]));

        let parallel_axis = vec![
            PathControlPoint::new(Vec3::ZERO, Vec3::Z, Vec3::Z, Vec3::ZERO),
            PathControlPoint::new(Vec3::Z, Vec3::Z, Vec3::Z, Vec3::ZERO),
        ];
        assert!(PathSampler::new(2).sample(&parallel_axis).unwrap_err().is_degenerate_geometry());

        let err = PathSampler::new(2).sample(&parallel_axis[..1]).unwrap_err();
        assert!(matches!(err, ScaffoldError::Curve(CurveError::InsufficientPoints { .. })));
    }

    #[test]
    fn test_quarter_bend_has_curvature() {
        let r = 2.0;
        let magnitude = r * std::f64::consts::FRAC_PI_2;
        let points = vec![
            PathControlPoint::new(Vec3::new(r, 0.0, 0.0), Vec3::new(0.0, magnitude, 0.0), Vec3::new(0.0, 0.0, 0.5), Vec3::ZERO),
            PathControlPoint::new(Vec3::new(0.0, r, 0.0), Vec3::new(-magnitude, 0.0, 0.0), Vec3::new(0.0, 0.0, 0.5), Vec3::ZERO),
        ];
        let path = PathSampler::new(4).sample(&points).expect("bend samples");
        let mid = path.frames[2];
        assert!((mid.curvature - 1.0 / r).abs() < 0.1);
        assert!((mid.axis1.length() - 0.5).abs() < 1e-9);
        assert!(mid.axis1.dot(mid.tangent).abs() < 1e-9);
    }

    #[test]
    fn test_control_point_json_defaults_cross_derivative() {
        let point: PathControlPoint = serde_json::from_str(
            r#"{"x":{"x":0,"y":0,"z":0},"d1":{"x":0,"y":0,"z":1},"d2":{"x":1,"y":0,"z":0}}"#,
        )
        .expect("partial control point");
        assert_eq!(point.d12, Vec3::ZERO);
    }
}
