//! Cubic Hermite curve utilities.
//!
//! Every curve here is a chain of cubic Hermite segments described by node
//! coordinates `nx` and node derivatives `nd1`, where segment `e` runs from
//! node `e` to node `e + 1` over local `xi` in `[0, 1]`. Derivatives are
//! taken with respect to `xi`, so an "arc length derivative" has the same
//! magnitude as the segment length it spans.

use super::core::{Tolerance, Vec3};

/// Abscissae of 4-point Gauss-Legendre quadrature mapped onto `[0, 1]`.
pub const GAUSS_XI4: [f64; 4] = [
    0.069_431_844_202_973_71,
    0.330_009_478_207_571_87,
    0.669_990_521_792_428_1,
    0.930_568_155_797_026_3,
];

/// Weights matching [`GAUSS_XI4`]; they sum to one.
pub const GAUSS_WT4: [f64; 4] = [
    0.173_927_422_568_726_93,
    0.326_072_577_431_273_1,
    0.326_072_577_431_273_1,
    0.173_927_422_568_726_93,
];

const MAX_ITERATIONS: usize = 100;

/// Errors raised by the curve utilities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    /// Too few nodes for the requested operation.
    #[error("curve needs at least {required} nodes, got {count}")]
    InsufficientPoints { required: usize, count: usize },

    /// Node coordinate and derivative lists differ in length.
    #[error("expected {expected} derivatives to match the nodes, got {count}")]
    LengthMismatch { expected: usize, count: usize },

    /// The curve has no measurable length.
    #[error("curve has zero length")]
    ZeroLength,
}

fn check_nodes(nx: &[Vec3], nd: &[Vec3], required: usize) -> Result<(), CurveError> {
    if nx.len() < required {
        return Err(CurveError::InsufficientPoints {
            required,
            count: nx.len(),
        });
    }
    if nd.len() != nx.len() {
        return Err(CurveError::LengthMismatch {
            expected: nx.len(),
            count: nd.len(),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Basis functions
// ─────────────────────────────────────────────────────────────────────────────

/// Cubic Hermite basis `[f1, f2, f3, f4]` weighting `v1, d1, v2, d2`.
#[must_use]
pub fn cubic_hermite_basis(xi: f64) -> [f64; 4] {
    let xi2 = xi * xi;
    let xi3 = xi2 * xi;
    [
        1.0 - 3.0 * xi2 + 2.0 * xi3,
        xi - 2.0 * xi2 + xi3,
        3.0 * xi2 - 2.0 * xi3,
        -xi2 + xi3,
    ]
}

#[must_use]
pub fn cubic_hermite_basis_first_derivatives(xi: f64) -> [f64; 4] {
    let xi2 = xi * xi;
    [
        -6.0 * xi + 6.0 * xi2,
        1.0 - 4.0 * xi + 3.0 * xi2,
        6.0 * xi - 6.0 * xi2,
        -2.0 * xi + 3.0 * xi2,
    ]
}

#[must_use]
pub fn cubic_hermite_basis_second_derivatives(xi: f64) -> [f64; 4] {
    [
        -6.0 + 12.0 * xi,
        -4.0 + 6.0 * xi,
        6.0 - 12.0 * xi,
        -2.0 + 6.0 * xi,
    ]
}

fn combine(f: [f64; 4], v1: Vec3, d1: Vec3, v2: Vec3, d2: Vec3) -> Vec3 {
    v1 * f[0] + d1 * f[1] + v2 * f[2] + d2 * f[3]
}

#[must_use]
pub fn interpolate_cubic_hermite(v1: Vec3, d1: Vec3, v2: Vec3, d2: Vec3, xi: f64) -> Vec3 {
    combine(cubic_hermite_basis(xi), v1, d1, v2, d2)
}

#[must_use]
pub fn interpolate_cubic_hermite_derivative(
    v1: Vec3,
    d1: Vec3,
    v2: Vec3,
    d2: Vec3,
    xi: f64,
) -> Vec3 {
    combine(cubic_hermite_basis_first_derivatives(xi), v1, d1, v2, d2)
}

#[must_use]
pub fn interpolate_cubic_hermite_second_derivative(
    v1: Vec3,
    d1: Vec3,
    v2: Vec3,
    d2: Vec3,
    xi: f64,
) -> Vec3 {
    combine(cubic_hermite_basis_second_derivatives(xi), v1, d1, v2, d2)
}

/// Scalar version of [`interpolate_cubic_hermite`].
#[must_use]
pub fn interpolate_cubic_hermite_scalar(v1: f64, d1: f64, v2: f64, d2: f64, xi: f64) -> f64 {
    let f = cubic_hermite_basis(xi);
    v1 * f[0] + d1 * f[1] + v2 * f[2] + d2 * f[3]
}

/// Derivative at `xi` of the quadratic through `v1` at 0 and `v2` at 1 with
/// derivative `d2` at 1.
#[must_use]
pub fn interpolate_lagrange_hermite_derivative(v1: Vec3, v2: Vec3, d2: Vec3, xi: f64) -> Vec3 {
    v1 * (-2.0 + 2.0 * xi) + v2 * (2.0 - 2.0 * xi) + d2 * (2.0 * xi - 1.0)
}

/// Derivative at `xi` of the quadratic through `v1` at 0 with derivative `d1`
/// and through `v2` at 1.
#[must_use]
pub fn interpolate_hermite_lagrange_derivative(v1: Vec3, d1: Vec3, v2: Vec3, xi: f64) -> Vec3 {
    v1 * (-2.0 * xi) + d1 * (1.0 - 2.0 * xi) + v2 * (2.0 * xi)
}

// ─────────────────────────────────────────────────────────────────────────────
// Arc length
// ─────────────────────────────────────────────────────────────────────────────

/// Arc length of one segment by 4-point Gauss quadrature.
#[must_use]
pub fn cubic_hermite_arc_length(v1: Vec3, d1: Vec3, v2: Vec3, d2: Vec3) -> f64 {
    GAUSS_XI4
        .iter()
        .zip(GAUSS_WT4)
        .map(|(&xi, wt)| interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi).length() * wt)
        .sum()
}

/// Arc length of the segment once both end derivatives have been rescaled to
/// that same arc length.
///
/// Only the directions of `d1` and `d2` are used. With `rescale` the
/// iteration starts from the chord length, otherwise from the arc length of
/// the derivatives as given.
#[must_use]
pub fn compute_cubic_hermite_arc_length(
    v1: Vec3,
    d1: Vec3,
    v2: Vec3,
    d2: Vec3,
    rescale: bool,
) -> f64 {
    let mut last_arc_length = if rescale {
        v1.distance_to(v2)
    } else {
        cubic_hermite_arc_length(v1, d1, v2, d2)
    };
    let ud1 = d1.normalized().unwrap_or(Vec3::ZERO);
    let ud2 = d2.normalized().unwrap_or(Vec3::ZERO);
    for iteration in 0..MAX_ITERATIONS {
        let mut arc_length =
            cubic_hermite_arc_length(v1, ud1 * last_arc_length, v2, ud2 * last_arc_length);
        if iteration > 9 {
            arc_length = 0.8 * arc_length + 0.2 * last_arc_length;
        }
        if (arc_length - last_arc_length).abs() <= Tolerance::CONVERGENCE.relative_to(arc_length) {
            return arc_length;
        }
        last_arc_length = arc_length;
    }
    log::debug!("compute_cubic_hermite_arc_length: no convergence after {MAX_ITERATIONS} iterations");
    last_arc_length
}

/// Factor by which to scale both derivatives so their mean magnitude equals
/// the arc length of the segment.
#[must_use]
pub fn compute_cubic_hermite_derivative_scaling(v1: Vec3, d1: Vec3, v2: Vec3, d2: Vec3) -> f64 {
    let original_magnitude = 0.5 * (d1.length() + d2.length());
    if original_magnitude <= 0.0 {
        return 1.0;
    }
    let mut scaling = 1.0;
    for _ in 0..MAX_ITERATIONS {
        let magnitude = original_magnitude * scaling;
        let arc_length = cubic_hermite_arc_length(v1, d1 * scaling, v2, d2 * scaling);
        if (arc_length - magnitude).abs() <= Tolerance::CONVERGENCE.relative_to(arc_length) {
            return scaling;
        }
        scaling *= arc_length / magnitude;
    }
    log::debug!("compute_cubic_hermite_derivative_scaling: no convergence");
    scaling
}

/// Arc length from the start of the segment to `xi`.
#[must_use]
pub fn cubic_hermite_arc_length_to_xi(v1: Vec3, d1: Vec3, v2: Vec3, d2: Vec3, xi: f64) -> f64 {
    let end = interpolate_cubic_hermite(v1, d1, v2, d2, xi);
    let end_derivative = interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi) * xi;
    cubic_hermite_arc_length(v1, d1 * xi, end, end_derivative)
}

/// Total length of a chain of segments, closing back to the first node when
/// `looped`.
#[must_use]
pub fn cubic_hermite_curves_length(nx: &[Vec3], nd1: &[Vec3], looped: bool) -> f64 {
    let count = nx.len().min(nd1.len());
    if count < 2 {
        return 0.0;
    }
    let segments = if looped { count } else { count - 1 };
    (0..segments)
        .map(|e| {
            let n = (e + 1) % count;
            cubic_hermite_arc_length(nx[e], nd1[e], nx[n], nd1[n])
        })
        .sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Curvature
// ─────────────────────────────────────────────────────────────────────────────

/// Signed curvature at `xi` in the direction of the unit `radial` vector,
/// which is assumed normal to the curve there. Bending towards `radial` is
/// positive.
#[must_use]
pub fn cubic_hermite_curvature(
    v1: Vec3,
    d1: Vec3,
    v2: Vec3,
    d2: Vec3,
    radial: Vec3,
    xi: f64,
) -> f64 {
    let tangent = interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi);
    let magnitude_squared = tangent.length_squared();
    if magnitude_squared <= Tolerance::ZERO_LENGTH.eps_squared() {
        return 0.0;
    }
    let d_tangent = interpolate_cubic_hermite_second_derivative(v1, d1, v2, d2, xi);
    d_tangent.dot(radial) / magnitude_squared
}

/// Unsigned curvature `|x' × x''| / |x'|³`; zero where the derivative vanishes.
#[must_use]
pub fn cubic_hermite_curvature_simple(v1: Vec3, d1: Vec3, v2: Vec3, d2: Vec3, xi: f64) -> f64 {
    let tangent = interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi);
    let magnitude = tangent.length();
    if magnitude <= Tolerance::ZERO_LENGTH.eps {
        return 0.0;
    }
    let d_tangent = interpolate_cubic_hermite_second_derivative(v1, d1, v2, d2, xi);
    tangent.cross(d_tangent).length() / (magnitude * magnitude * magnitude)
}

/// Signed curvature at every node, averaging the segments either side of it.
///
/// End nodes of an open curve use their single adjacent segment.
///
/// # Errors
/// Returns an error if fewer than two nodes are given or the lists disagree
/// in length.
pub fn curvatures_along_curve(
    nx: &[Vec3],
    nd1: &[Vec3],
    radials: &[Vec3],
    looped: bool,
) -> Result<Vec<f64>, CurveError> {
    check_nodes(nx, nd1, 2)?;
    if radials.len() != nx.len() {
        return Err(CurveError::LengthMismatch {
            expected: nx.len(),
            count: radials.len(),
        });
    }
    let count = nx.len();
    let mut curvatures = Vec::with_capacity(count);
    for n in 0..count {
        let mut sum = 0.0;
        let mut sides = 0.0;
        if n > 0 || looped {
            let p = (n + count - 1) % count;
            sum += cubic_hermite_curvature(nx[p], nd1[p], nx[n], nd1[n], radials[n], 1.0);
            sides += 1.0;
        }
        if n + 1 < count || looped {
            let q = (n + 1) % count;
            sum += cubic_hermite_curvature(nx[n], nd1[n], nx[q], nd1[q], radials[n], 0.0);
            sides += 1.0;
        }
        curvatures.push(sum / sides);
    }
    Ok(curvatures)
}

// ─────────────────────────────────────────────────────────────────────────────
// Sampling
// ─────────────────────────────────────────────────────────────────────────────

/// Location on a chain of segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveLocation {
    pub x: Vec3,
    /// Derivative with respect to the segment `xi`.
    pub d1: Vec3,
    pub element: usize,
    pub xi: f64,
}

/// Finds the point at `distance` along the curve by Newton iteration on the
/// segment arc length.
///
/// Negative distances return the start, distances past the end return the
/// last node with `xi = 1`.
///
/// # Errors
/// Returns an error if fewer than two nodes are given or the lists disagree
/// in length.
pub fn cubic_hermite_curves_point_at_arc_distance(
    nx: &[Vec3],
    nd1: &[Vec3],
    distance: f64,
) -> Result<CurveLocation, CurveError> {
    check_nodes(nx, nd1, 2)?;
    if distance < 0.0 {
        return Ok(CurveLocation {
            x: nx[0],
            d1: nd1[0],
            element: 0,
            xi: 0.0,
        });
    }
    const XI_DELTA: f64 = 1.0e-6;
    const XI_TOL: f64 = 1.0e-6;
    let elements_count = nx.len() - 1;
    let mut length = 0.0;
    for e in 0..elements_count {
        let (v1, d1, v2, d2) = (nx[e], nd1[e], nx[e + 1], nd1[e + 1]);
        let part_distance = distance - length;
        let arc_length = cubic_hermite_arc_length(v1, d1, v2, d2);
        if part_distance <= arc_length {
            let mut xi = if arc_length > 0.0 {
                part_distance / arc_length
            } else {
                0.0
            };
            let mut dxi_limit = 0.1;
            for iteration in 0..MAX_ITERATIONS {
                let last_xi = xi;
                let dist = cubic_hermite_arc_length_to_xi(v1, d1, v2, d2, xi);
                let xi_plus = (xi + XI_DELTA).min(1.0);
                let xi_minus = (xi - XI_DELTA).max(0.0);
                let slope = (cubic_hermite_arc_length_to_xi(v1, d1, v2, d2, xi_plus)
                    - cubic_hermite_arc_length_to_xi(v1, d1, v2, d2, xi_minus))
                    / (xi_plus - xi_minus);
                if slope <= 0.0 {
                    break;
                }
                let dxi = ((part_distance - dist) / slope).clamp(-dxi_limit, dxi_limit);
                xi = (xi + dxi).clamp(0.0, 1.0);
                if (xi - last_xi).abs() <= XI_TOL {
                    break;
                }
                if matches!(iteration, 4 | 10 | 25 | 62) {
                    dxi_limit *= 0.5;
                }
            }
            return Ok(CurveLocation {
                x: interpolate_cubic_hermite(v1, d1, v2, d2, xi),
                d1: interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi),
                element: e,
                xi,
            });
        }
        length += arc_length;
    }
    Ok(CurveLocation {
        x: nx[elements_count],
        d1: nd1[elements_count],
        element: elements_count - 1,
        xi: 1.0,
    })
}

/// Result of resampling a curve into a new number of elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveSamples {
    /// Sampled node coordinates.
    pub x: Vec<Vec3>,
    /// Sampled derivatives, scaled to the new element spacing.
    pub d1: Vec<Vec3>,
    /// Source segment each sample lies in.
    pub element: Vec<usize>,
    /// Local `xi` within the source segment.
    pub xi: Vec<f64>,
    /// Ratio of new to source derivative magnitude at each sample.
    pub scale: Vec<f64>,
    /// Arc distance of each sample from the start.
    pub distance: Vec<f64>,
    /// Total arc length of the source curve.
    pub length: f64,
}

/// Element lengths for `elements_count` elements over `length`, growing
/// linearly so the first over the last equals `start_end_ratio`.
#[must_use]
pub fn graded_element_lengths(length: f64, elements_count: usize, start_end_ratio: f64) -> Vec<f64> {
    let elements_count = elements_count.max(1);
    if elements_count == 1 {
        return vec![length];
    }
    let proportion_end = 2.0 / (start_end_ratio + 1.0);
    let proportion_start = start_end_ratio * proportion_end;
    let element_length_mid =
        length / (elements_count as f64 - 2.0 + proportion_start + proportion_end);
    let last = (elements_count - 1) as f64;
    (0..elements_count)
        .map(|e| {
            let xi = e as f64 / last;
            element_length_mid * ((1.0 - xi) * proportion_start + xi * proportion_end)
        })
        .collect()
}

/// Resamples a chain of segments into `elements_count` new elements.
///
/// Spacing follows [`graded_element_lengths`]. Sample derivatives have the
/// magnitude of the mean of the adjacent new element lengths, so the result
/// can be fed straight back into Hermite interpolation.
///
/// # Errors
/// Returns an error if fewer than two nodes are given, the lists disagree in
/// length, or the curve has zero length.
pub fn sample_cubic_hermite_curves(
    nx: &[Vec3],
    nd1: &[Vec3],
    elements_count: usize,
    start_end_ratio: f64,
) -> Result<CurveSamples, CurveError> {
    check_nodes(nx, nd1, 2)?;
    let elements_count = elements_count.max(1);
    let length = cubic_hermite_curves_length(nx, nd1, false);
    if Tolerance::ZERO_LENGTH.is_zero_length(length) {
        return Err(CurveError::ZeroLength);
    }

    let lengths = graded_element_lengths(length, elements_count, start_end_ratio);
    let mut magnitudes = vec![0.0; elements_count + 1];
    if elements_count == 1 {
        magnitudes[0] = length;
        magnitudes[1] = length;
    } else {
        for n in 1..elements_count {
            magnitudes[n] = 0.5 * (lengths[n - 1] + lengths[n]);
        }
        let start = 2.0 * lengths[0] - magnitudes[1];
        magnitudes[0] = if start > 0.0 { start } else { lengths[0] };
        let end = 2.0 * lengths[elements_count - 1] - magnitudes[elements_count - 1];
        magnitudes[elements_count] = if end > 0.0 {
            end
        } else {
            lengths[elements_count - 1]
        };
    }

    let mut samples = CurveSamples {
        length,
        ..CurveSamples::default()
    };
    let mut distance = 0.0;
    for n in 0..=elements_count {
        let location = if n == elements_count {
            let last = nx.len() - 1;
            CurveLocation {
                x: nx[last],
                d1: nd1[last],
                element: last - 1,
                xi: 1.0,
            }
        } else {
            cubic_hermite_curves_point_at_arc_distance(nx, nd1, distance)?
        };
        let source_magnitude = location.d1.length();
        let scale = if source_magnitude > 0.0 {
            magnitudes[n] / source_magnitude
        } else {
            0.0
        };
        samples.x.push(location.x);
        samples.d1.push(location.d1 * scale);
        samples.element.push(location.element);
        samples.xi.push(location.xi);
        samples.scale.push(scale);
        samples.distance.push(if n == elements_count { length } else { distance });
        if n < elements_count {
            distance += lengths[n];
        }
    }
    Ok(samples)
}

/// Interpolates a secondary Hermite-varying quantity `v` with derivatives `d`
/// at the sample locations of `samples`. Returned derivatives are rescaled to
/// the new element spacing.
#[must_use]
pub fn interpolate_sample_cubic_hermite(
    v: &[Vec3],
    d: &[Vec3],
    samples: &CurveSamples,
) -> (Vec<Vec3>, Vec<Vec3>) {
    samples
        .element
        .iter()
        .zip(&samples.xi)
        .zip(&samples.scale)
        .map(|((&e, &xi), &scale)| {
            let value = interpolate_cubic_hermite(v[e], d[e], v[e + 1], d[e + 1], xi);
            let derivative = interpolate_cubic_hermite_derivative(v[e], d[e], v[e + 1], d[e + 1], xi);
            (value, derivative * scale)
        })
        .unzip()
}

/// Linearly interpolates per-node scalars at the sample locations.
#[must_use]
pub fn interpolate_sample_linear(v: &[f64], samples: &CurveSamples) -> Vec<f64> {
    samples
        .element
        .iter()
        .zip(&samples.xi)
        .map(|(&e, &xi)| v[e] * (1.0 - xi) + v[e + 1] * xi)
        .collect()
}

/// Element lengths from a scalar cubic Hermite on `[0, length]`.
///
/// `start_ratio` and `end_ratio` scale the end derivatives relative to a
/// uniform spacing, so `(1.0, 1.0)` gives equal elements.
#[must_use]
pub fn sample_cubic_element_lengths(
    length: f64,
    elements_count: usize,
    start_ratio: f64,
    end_ratio: f64,
) -> Vec<f64> {
    let elements_count = elements_count.max(1);
    let d1 = start_ratio * length;
    let d2 = end_ratio * length;
    let positions: Vec<f64> = (0..=elements_count)
        .map(|n| {
            let xi = n as f64 / elements_count as f64;
            interpolate_cubic_hermite_scalar(0.0, d1, length, d2, xi)
        })
        .collect();
    positions.windows(2).map(|w| w[1] - w[0]).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Derivative smoothing
// ─────────────────────────────────────────────────────────────────────────────

/// How interior derivative magnitudes combine the adjacent element arc lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MagnitudeScaling {
    /// `(a + b) / 2`
    #[default]
    Arithmetic,
    /// `2 / (1/a + 1/b)`, favouring the shorter neighbour.
    Harmonic,
}

impl MagnitudeScaling {
    #[must_use]
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Harmonic if a > 0.0 && b > 0.0 => 2.0 / (1.0 / a + 1.0 / b),
            _ => 0.5 * (a + b),
        }
    }
}

/// Options for [`smooth_cubic_hermite_derivatives_line`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSmoothing {
    /// Keep every node's derivative direction; only magnitudes change.
    pub fix_all_directions: bool,
    pub fix_start_derivative: bool,
    pub fix_end_derivative: bool,
    pub fix_start_direction: bool,
    pub fix_end_direction: bool,
    pub scaling: MagnitudeScaling,
    /// Convergence tolerance relative to the mean element arc length.
    pub tolerance: f64,
}

impl LineSmoothing {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fix_all_directions: false,
            fix_start_derivative: false,
            fix_end_derivative: false,
            fix_start_direction: false,
            fix_end_direction: false,
            scaling: MagnitudeScaling::Arithmetic,
            tolerance: 1.0e-6,
        }
    }

    #[must_use]
    pub const fn fix_all_directions(mut self) -> Self {
        self.fix_all_directions = true;
        self
    }

    #[must_use]
    pub const fn fix_end_derivatives(mut self) -> Self {
        self.fix_start_derivative = true;
        self.fix_end_derivative = true;
        self
    }

    /// Keep the start and end directions, recomputing their magnitudes.
    #[must_use]
    pub const fn fix_end_directions(mut self) -> Self {
        self.fix_start_direction = true;
        self.fix_end_direction = true;
        self
    }

    #[must_use]
    pub const fn fix_start_derivative(mut self) -> Self {
        self.fix_start_derivative = true;
        self
    }

    #[must_use]
    pub const fn with_scaling(mut self, scaling: MagnitudeScaling) -> Self {
        self.scaling = scaling;
        self
    }
}

impl Default for LineSmoothing {
    fn default() -> Self {
        Self::new()
    }
}

fn interior_direction(before: Vec3, here: Vec3, after: Vec3, arc_before: f64, arc_after: f64) -> Vec3 {
    let sum = arc_before + arc_after;
    if sum <= 0.0 {
        return after - before;
    }
    (here - before) * (arc_after / sum) + (after - here) * (arc_before / sum)
}

fn converged(current: &[Vec3], last: &[Vec3], arc_lengths: &[f64], tolerance: f64) -> bool {
    let mean = arc_lengths.iter().sum::<f64>() / arc_lengths.len() as f64;
    let limit = tolerance * mean;
    current
        .iter()
        .zip(last)
        .all(|(a, b)| (*a - *b).max_abs() <= limit)
}

/// Smooths derivatives along an open chain so each interior magnitude blends
/// the arc lengths either side and each end matches its end element.
///
/// # Errors
/// Returns an error if fewer than two nodes are given or the lists disagree
/// in length.
pub fn smooth_cubic_hermite_derivatives_line(
    nx: &[Vec3],
    nd1: &[Vec3],
    options: LineSmoothing,
) -> Result<Vec<Vec3>, CurveError> {
    check_nodes(nx, nd1, 2)?;
    let nodes_count = nx.len();
    let elements_count = nodes_count - 1;
    let fix_start_direction =
        options.fix_all_directions || options.fix_start_direction || options.fix_start_derivative;
    let fix_end_direction =
        options.fix_all_directions || options.fix_end_direction || options.fix_end_derivative;

    if elements_count == 1 {
        if !fix_start_direction && !fix_end_direction {
            let delta = nx[1] - nx[0];
            return Ok(vec![delta, delta]);
        }
        if fix_start_direction
            && fix_end_direction
            && !options.fix_start_derivative
            && !options.fix_end_derivative
        {
            let arc_length = compute_cubic_hermite_arc_length(nx[0], nd1[0], nx[1], nd1[1], true);
            return Ok(vec![
                nd1[0].with_length(arc_length),
                nd1[1].with_length(arc_length),
            ]);
        }
    }

    let mut md1 = nd1.to_vec();
    for _ in 0..MAX_ITERATIONS {
        let last = md1.clone();
        let arc_lengths: Vec<f64> = (0..elements_count)
            .map(|e| cubic_hermite_arc_length(nx[e], last[e], nx[e + 1], last[e + 1]))
            .collect();

        if !options.fix_start_derivative {
            md1[0] = if fix_start_direction {
                let magnitude = 2.0 * arc_lengths[0] - last[1].length();
                if magnitude > 0.0 {
                    nd1[0].with_length(magnitude)
                } else {
                    Vec3::ZERO
                }
            } else {
                interpolate_lagrange_hermite_derivative(nx[0], nx[1], last[1], 0.0)
            };
        }

        for n in 1..elements_count {
            let (arc_before, arc_after) = (arc_lengths[n - 1], arc_lengths[n]);
            let direction = if options.fix_all_directions {
                nd1[n]
            } else {
                interior_direction(nx[n - 1], nx[n], nx[n + 1], arc_before, arc_after)
            };
            md1[n] = direction.with_length(options.scaling.combine(arc_before, arc_after));
        }

        if !options.fix_end_derivative {
            let n = elements_count;
            md1[n] = if fix_end_direction {
                let magnitude = 2.0 * arc_lengths[n - 1] - last[n - 1].length();
                if magnitude > 0.0 {
                    nd1[n].with_length(magnitude)
                } else {
                    Vec3::ZERO
                }
            } else {
                interpolate_hermite_lagrange_derivative(nx[n - 1], last[n - 1], nx[n], 1.0)
            };
        }

        if converged(&md1, &last, &arc_lengths, options.tolerance) {
            return Ok(md1);
        }
    }
    log::debug!("smooth_cubic_hermite_derivatives_line: no convergence after {MAX_ITERATIONS} iterations");
    Ok(md1)
}

/// Smooths derivatives around a closed loop; every node is treated as
/// interior.
///
/// # Errors
/// Returns an error if fewer than two nodes are given or the lists disagree
/// in length.
pub fn smooth_cubic_hermite_derivatives_loop(
    nx: &[Vec3],
    nd1: &[Vec3],
    fix_all_directions: bool,
    scaling: MagnitudeScaling,
) -> Result<Vec<Vec3>, CurveError> {
    check_nodes(nx, nd1, 2)?;
    let count = nx.len();
    let mut md1 = nd1.to_vec();
    for _ in 0..MAX_ITERATIONS {
        let last = md1.clone();
        let arc_lengths: Vec<f64> = (0..count)
            .map(|e| {
                let n = (e + 1) % count;
                cubic_hermite_arc_length(nx[e], last[e], nx[n], last[n])
            })
            .collect();
        for n in 0..count {
            let p = (n + count - 1) % count;
            let q = (n + 1) % count;
            let (arc_before, arc_after) = (arc_lengths[p], arc_lengths[n]);
            let direction = if fix_all_directions {
                nd1[n]
            } else {
                interior_direction(nx[p], nx[n], nx[q], arc_before, arc_after)
            };
            md1[n] = direction.with_length(scaling.combine(arc_before, arc_after));
        }
        if converged(&md1, &last, &arc_lengths, 1.0e-6) {
            return Ok(md1);
        }
    }
    log::debug!("smooth_cubic_hermite_derivatives_loop: no convergence after {MAX_ITERATIONS} iterations");
    Ok(md1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn circle_loop(count: usize, radius: f64) -> (Vec<Vec3>, Vec<Vec3>) {
        let d_theta = 2.0 * PI / count as f64;
        (0..count)
            .map(|i| {
                let theta = i as f64 * d_theta;
                let (s, c) = theta.sin_cos();
                (
                    Vec3::new(radius * c, radius * s, 0.0),
                    Vec3::new(-radius * s * d_theta, radius * c * d_theta, 0.0),
                )
            })
            .unzip()
    }

    #[test]
    fn test_basis_partition_of_unity() {
        for xi in [0.0, 0.25, 0.5, 0.9, 1.0] {
            let f = cubic_hermite_basis(xi);
            assert!((f[0] + f[2] - 1.0).abs() < 1e-12);
        }
        assert_eq!(cubic_hermite_basis(0.0), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(cubic_hermite_basis(1.0), [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_gauss_weights_sum_to_one() {
        let sum: f64 = GAUSS_WT4.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_straight_segment_arc_length() {
        let v1 = Vec3::ZERO;
        let v2 = Vec3::new(3.0, 4.0, 0.0);
        let d = v2 - v1;
        assert!((cubic_hermite_arc_length(v1, d, v2, d) - 5.0).abs() < 1e-12);
        assert!((cubic_hermite_arc_length_to_xi(v1, d, v2, d, 0.4) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quarter_circle_arc_length() {
        let v1 = Vec3::X;
        let v2 = Vec3::Y;
        let arc = compute_cubic_hermite_arc_length(v1, Vec3::Y, v2, -Vec3::X, true);
        assert!((arc - FRAC_PI_2).abs() < 2e-2, "arc {arc}");
    }

    #[test]
    fn test_derivative_scaling_of_straight_segment() {
        let v2 = Vec3::new(2.0, 0.0, 0.0);
        let scaling = compute_cubic_hermite_derivative_scaling(Vec3::ZERO, Vec3::X, v2, Vec3::X);
        assert!((scaling - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_circle_curvature_signs() {
        let (nx, nd) = circle_loop(8, 2.0);
        let radials: Vec<Vec3> = nx.iter().map(|x| x.normalized().unwrap()).collect();
        let curvatures = curvatures_along_curve(&nx, &nd, &radials, true).unwrap();
        for kappa in curvatures {
            assert!((kappa + 0.5).abs() < 0.05, "kappa {kappa}");
        }
        let simple = cubic_hermite_curvature_simple(nx[0], nd[0], nx[1], nd[1], 0.5);
        assert!((simple - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_point_at_arc_distance() {
        let nx = [Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)];
        let nd = [Vec3::X, Vec3::X * 1.5, Vec3::X * 2.0];
        let location = cubic_hermite_curves_point_at_arc_distance(&nx, &nd, 2.0).unwrap();
        assert_eq!(location.element, 1);
        assert!((location.x.x - 2.0).abs() < 1e-5);

        let before = cubic_hermite_curves_point_at_arc_distance(&nx, &nd, -1.0).unwrap();
        assert_eq!(before.x, Vec3::ZERO);
        let after = cubic_hermite_curves_point_at_arc_distance(&nx, &nd, 10.0).unwrap();
        assert_eq!((after.element, after.xi), (1, 1.0));
    }

    #[test]
    fn test_sample_straight_line_uniform() {
        let nx = [Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)];
        let nd = [Vec3::new(4.0, 0.0, 0.0); 2];
        let samples = sample_cubic_hermite_curves(&nx, &nd, 4, 1.0).unwrap();
        assert_eq!(samples.x.len(), 5);
        for (n, x) in samples.x.iter().enumerate() {
            assert!((x.x - n as f64).abs() < 1e-5);
            assert!((samples.d1[n].length() - 1.0).abs() < 1e-9);
        }
        assert!((samples.length - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_graded_spacing_ratio() {
        let lengths = graded_element_lengths(10.0, 4, 3.0);
        assert!((lengths.iter().sum::<f64>() - 10.0).abs() < 1e-12);
        assert!((lengths[0] / lengths[3] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_zero_length_fails() {
        let nx = [Vec3::ZERO, Vec3::ZERO];
        let nd = [Vec3::ZERO, Vec3::ZERO];
        assert_eq!(
            sample_cubic_hermite_curves(&nx, &nd, 2, 1.0),
            Err(CurveError::ZeroLength)
        );
    }

    #[test]
    fn test_interpolate_sample_linear() {
        let nx = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)];
        let nd = [Vec3::new(2.0, 0.0, 0.0); 2];
        let samples = sample_cubic_hermite_curves(&nx, &nd, 2, 1.0).unwrap();
        let values = interpolate_sample_linear(&[1.0, 3.0], &samples);
        assert!((values[1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_cubic_element_lengths_uniform() {
        let lengths = sample_cubic_element_lengths(6.0, 3, 1.0, 1.0);
        for length in lengths {
            assert!((length - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_smooth_line_single_element_straight() {
        let nx = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)];
        let nd = [Vec3::Y, Vec3::Y];
        let md = smooth_cubic_hermite_derivatives_line(&nx, &nd, LineSmoothing::new()).unwrap();
        assert_eq!(md, vec![Vec3::new(2.0, 0.0, 0.0); 2]);
    }

    #[test]
    fn test_smooth_line_fixed_directions_uneven_spacing() {
        let nx = [Vec3::ZERO, Vec3::X, Vec3::new(3.0, 0.0, 0.0)];
        let nd = [Vec3::X; 3];
        let options = LineSmoothing::new().fix_all_directions();
        let md = smooth_cubic_hermite_derivatives_line(&nx, &nd, options).unwrap();
        assert!((md[1].length() - 1.5).abs() < 1e-6);
        assert!((md[0].length() - 0.5).abs() < 1e-5);

        let harmonic = options.with_scaling(MagnitudeScaling::Harmonic);
        let mh = smooth_cubic_hermite_derivatives_line(&nx, &nd, harmonic).unwrap();
        assert!(mh[1].length() < md[1].length());
    }

    #[test]
    fn test_smooth_line_keeps_fixed_end_derivatives() {
        let nx = [Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)];
        let nd = [Vec3::Y, Vec3::X, Vec3::Y];
        let options = LineSmoothing::new().fix_end_derivatives();
        let md = smooth_cubic_hermite_derivatives_line(&nx, &nd, options).unwrap();
        assert_eq!(md[0], Vec3::Y);
        assert_eq!(md[2], Vec3::Y);
    }

    #[test]
    fn test_smooth_loop_matches_circumference() {
        let (nx, nd) = circle_loop(8, 1.0);
        let md = smooth_cubic_hermite_derivatives_loop(&nx, &nd, false, MagnitudeScaling::Arithmetic)
            .unwrap();
        let circumference = cubic_hermite_curves_length(&nx, &md, true);
        let derivative_sum: f64 = md.iter().map(|d| d.length()).sum();
        assert!((circumference - derivative_sum).abs() <= 1e-6 * circumference);
        assert!((circumference - 2.0 * PI).abs() < 2e-2);
    }

    #[test]
    fn test_smooth_rejects_mismatched_lists() {
        let nx = [Vec3::ZERO, Vec3::X];
        let err = smooth_cubic_hermite_derivatives_line(&nx, &[Vec3::X], LineSmoothing::new())
            .unwrap_err();
        assert_eq!(err, CurveError::LengthMismatch { expected: 2, count: 1 });
    }
}
