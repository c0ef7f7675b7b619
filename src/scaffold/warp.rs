//! Embedding profile loops along the sampled path.
//!
//! Each loop point `(u, v)` lands at `origin + u·axis1 + v·axis2` of its
//! frame. Along-path derivatives come from smoothing each rail, the points
//! sharing one loop index across all frames, as its own curve.

use std::f64::consts::TAU;

use crate::geom::{LineSmoothing, Tolerance, Vec3, smooth_cubic_hermite_derivatives_line};

use super::error::ScaffoldError;
use super::path::Frame;
use super::profile::ProfileLoop;

/// Apex node parameters of a closed tube end.
///
/// `d2` points from the apex towards loop index 0 of the first full ring;
/// `d1 = axis × d2`, so the edge at angle `θ` leaves the apex along
/// `cos θ · d2 + sin θ · d1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApexFrame {
    pub x: Vec3,
    /// Unit path tangent at the apex, pointing into the tube.
    pub axis: Vec3,
    pub d1: Vec3,
    pub d2: Vec3,
    pub d3: Vec3,
}

impl ApexFrame {
    /// Along derivative of the rail leaving the apex at loop index `index`.
    #[must_use]
    pub fn rail_derivative(&self, index: usize, points_count: usize) -> Vec3 {
        let theta = TAU * index as f64 / points_count.max(1) as f64;
        self.d2 * theta.cos() + self.d1 * theta.sin()
    }
}

/// Structured surface: `x[row][index]` with around (`d1`), along (`d2`) and
/// through-wall (`d3`) derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGrid {
    pub points_count: usize,
    pub x: Vec<Vec<Vec3>>,
    pub d1: Vec<Vec<Vec3>>,
    pub d2: Vec<Vec<Vec3>>,
    pub d3: Vec<Vec<Vec3>>,
    /// Present when row 0 collapses onto a single apex point.
    pub apex: Option<ApexFrame>,
}

impl SurfaceGrid {
    #[must_use]
    pub fn rows(&self) -> usize {
        self.x.len()
    }

    /// Unit outward normal `d1 × d2`, or `-axis` on the apex row.
    #[must_use]
    pub fn normal(&self, row: usize, index: usize) -> Option<Vec3> {
        match &self.apex {
            Some(apex) if row == 0 => Some(-apex.axis),
            _ => self.d1[row][index].cross(self.d2[row][index]).normalized(),
        }
    }
}

/// Places loops on frames and derives rail-wise along derivatives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Warper {
    pub closed_proximal_end: bool,
}

impl Warper {
    #[must_use]
    pub fn new(closed_proximal_end: bool) -> Self {
        Self { closed_proximal_end }
    }

    /// Warps one loop per frame into a surface grid.
    ///
    /// With a closed proximal end the first frame's loop is replaced by the
    /// frame origin, shared by every rail.
    ///
    /// # Errors
    /// Returns [`ScaffoldError::DegenerateGeometry`] if the loops disagree in
    /// size, two consecutive rail points coincide, or the apex radial
    /// direction vanishes.
    pub fn warp(&self, frames: &[Frame], loops: &[ProfileLoop]) -> Result<SurfaceGrid, ScaffoldError> {
        if frames.len() < 2 || loops.len() != frames.len() {
            return Err(ScaffoldError::degenerate(
                "warp",
                [frames.len(), loops.len()],
                "need one loop per frame and at least two frames",
            ));
        }
        let points_count = loops[0].len();
        if let Some(row) = loops.iter().position(|l| l.len() != points_count || l.is_empty()) {
            return Err(ScaffoldError::degenerate("warp", [row], "loop size differs between frames"));
        }

        let mut x = Vec::with_capacity(frames.len());
        let mut d1 = Vec::with_capacity(frames.len());
        for (frame, ring) in frames.iter().zip(loops) {
            let embed = |p: Vec3| frame.axis1 * p.x + frame.axis2 * p.y;
            x.push(ring.points.iter().map(|&p| frame.origin + embed(p)).collect::<Vec<_>>());
            d1.push(ring.derivatives.iter().map(|&d| embed(d)).collect::<Vec<_>>());
        }

        let apex = if self.closed_proximal_end {
            let frame = &frames[0];
            let radial = (x[1][0] - frame.origin).reject_from(frame.tangent);
            let direction = radial
                .normalized()
                .ok_or_else(|| ScaffoldError::degenerate("warp", [0, 0], "apex radial direction is zero"))?;
            let d2 = direction * x[1][0].distance_to(frame.origin);
            let apex = ApexFrame {
                x: frame.origin,
                axis: frame.tangent,
                d1: frame.tangent.cross(d2),
                d2,
                d3: Vec3::ZERO,
            };
            let step = TAU / points_count as f64;
            for n in 0..points_count {
                x[0][n] = apex.x;
                // Around derivative of the collapsed ring: d/dθ of the rail
                // direction, scaled by the angular step.
                let theta = n as f64 * step;
                d1[0][n] = (apex.d1 * theta.cos() - apex.d2 * theta.sin()) * step;
            }
            Some(apex)
        } else {
            None
        };

        let tol = Tolerance::ZERO_LENGTH;
        let mut d2 = vec![vec![Vec3::ZERO; points_count]; frames.len()];
        for n in 0..points_count {
            let rail: Vec<Vec3> = x.iter().map(|row| row[n]).collect();
            for row in 1..rail.len() {
                if tol.is_zero_length(rail[row].distance_to(rail[row - 1])) {
                    return Err(ScaffoldError::degenerate(
                        "warp",
                        [row, n],
                        "rail has coincident consecutive points",
                    ));
                }
            }
            let mut initial: Vec<Vec3> = frames.iter().map(|f| f.d1).collect();
            let smoothing = match &apex {
                Some(apex) => {
                    initial[0] = apex.rail_derivative(n, points_count);
                    LineSmoothing::new().fix_start_derivative().fix_end_directions()
                }
                None => LineSmoothing::new().fix_end_directions(),
            };
            let smoothed = smooth_cubic_hermite_derivatives_line(&rail, &initial, smoothing)?;
            for (row, d) in smoothed.into_iter().enumerate() {
                d2[row][n] = d;
            }
        }

        log::debug!(
            "warp: {} rows x {} points{}",
            frames.len(),
            points_count,
            if apex.is_some() { ", closed proximal end" } else { "" }
        );
        Ok(SurfaceGrid {
            points_count,
            d3: vec![vec![Vec3::ZERO; points_count]; frames.len()],
            x,
            d1,
            d2,
            apex,
        })
    }
}
