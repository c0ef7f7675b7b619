//! Through-wall layers with curvature-corrected derivatives.
//!
//! Every layer is the inner surface moved along its unit outward normal
//! `n = normalize(d1 × d2)` by a fraction of the local wall thickness.
//! Tangential derivatives are scaled by `1 - κ·offset`, where `κ` is the
//! signed curvature towards `n` averaged over the two segments meeting at
//! the point. A scale that reaches zero would invert the element and is
//! reported, never clamped.

use crate::geom::{Vec3, cubic_hermite_curvature, curvatures_along_curve};

use super::error::ScaffoldError;
use super::warp::{ApexFrame, SurfaceGrid};

/// Wall thickness per grid row and the split of the wall into layers.
#[derive(Debug, Clone, PartialEq)]
pub struct WallSchedule {
    pub thickness: Vec<f64>,
    /// One entry per element through the wall, summing to one.
    pub layer_fractions: Vec<f64>,
}

impl WallSchedule {
    /// Constant thickness with equal layers.
    #[must_use]
    pub fn uniform(rows: usize, thickness: f64, layers: usize) -> Self {
        let layers = layers.max(1);
        Self {
            thickness: vec![thickness; rows],
            layer_fractions: vec![1.0 / layers as f64; layers],
        }
    }

    #[must_use]
    pub fn layers(&self) -> usize {
        self.layer_fractions.len()
    }

    /// Whether every row has zero thickness, so all layers coincide.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.thickness.iter().all(|&t| t == 0.0)
    }

    /// Cumulative fraction of the wall below node layer `layer`.
    #[must_use]
    pub fn cumulative_fraction(&self, layer: usize) -> f64 {
        self.layer_fractions.iter().take(layer).sum()
    }

    /// Fraction used for the through-wall derivative of node layer `layer`;
    /// the outermost node layer repeats the last element's fraction.
    #[must_use]
    pub fn node_fraction(&self, layer: usize) -> f64 {
        let last = self.layer_fractions.len().saturating_sub(1);
        self.layer_fractions.get(layer.min(last)).copied().unwrap_or(1.0)
    }
}

/// Multiplier applied to a tangential derivative offset by `offset` along
/// the normal on a curve with signed curvature `curvature` towards it.
#[must_use]
pub fn curvature_scale(curvature: f64, offset: f64) -> f64 {
    1.0 - curvature * offset
}

/// One node layer through the wall.
#[derive(Debug, Clone, PartialEq)]
pub struct WallLayer {
    /// Cumulative wall fraction of this layer, 0 on the inner surface.
    pub fraction: f64,
    pub surface: SurfaceGrid,
    pub scale_around: Vec<Vec<f64>>,
    pub scale_along: Vec<Vec<f64>>,
}

/// All node layers of a tube wall, inner first.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredGrid {
    pub points_count: usize,
    pub normals: Vec<Vec<Vec3>>,
    pub curvature_around: Vec<Vec<f64>>,
    pub curvature_along: Vec<Vec<f64>>,
    pub layers: Vec<WallLayer>,
    /// Every layer coincides with the inner surface.
    pub collapsed: bool,
}

impl LayeredGrid {
    #[must_use]
    pub fn rows(&self) -> usize {
        self.normals.len()
    }

    #[must_use]
    pub fn elements_count_through_wall(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    /// Undoes the curvature correction of `layer`, returning its around and
    /// along derivatives as they were on the inner surface.
    #[must_use]
    pub fn inverse_derivatives(&self, layer: usize) -> (Vec<Vec<Vec3>>, Vec<Vec<Vec3>>) {
        let wall = &self.layers[layer];
        let invert = |d: &Vec<Vec<Vec3>>, s: &Vec<Vec<f64>>| -> Vec<Vec<Vec3>> {
            d.iter()
                .zip(s)
                .map(|(row, scales)| row.iter().zip(scales).map(|(&v, &k)| v / k).collect())
                .collect()
        };
        (
            invert(&wall.surface.d1, &wall.scale_around),
            invert(&wall.surface.d2, &wall.scale_along),
        )
    }

    /// Smallest and largest scale applied across all layers.
    #[must_use]
    pub fn scale_range(&self) -> Option<(f64, f64)> {
        self.layers
            .iter()
            .flat_map(|l| l.scale_around.iter().chain(&l.scale_along))
            .flatten()
            .fold(None, |range, &s| match range {
                None => Some((s, s)),
                Some((lo, hi)) => Some((f64::min(lo, s), f64::max(hi, s))),
            })
    }
}

/// Offsets an inner surface into wall layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WallOffsetter {
    /// Per element around: whether it is a transition element, whose
    /// curvature is not shared with its neighbour.
    transition_elements: Vec<bool>,
}

impl WallOffsetter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transition_elements(mut self, transition_elements: Vec<bool>) -> Self {
        self.transition_elements = transition_elements;
        self
    }

    fn is_transition(&self, element: usize) -> bool {
        self.transition_elements.get(element).copied().unwrap_or(false)
    }

    /// Around curvature at every point of one ring.
    fn ring_curvatures(&self, x: &[Vec3], d1: &[Vec3], normals: &[Vec3]) -> Vec<f64> {
        let count = x.len();
        (0..count)
            .map(|n| {
                let p = (n + count - 1) % count;
                let q = (n + 1) % count;
                let before = cubic_hermite_curvature(x[p], d1[p], x[n], d1[n], normals[n], 1.0);
                let after = cubic_hermite_curvature(x[n], d1[n], x[q], d1[q], normals[n], 0.0);
                if self.is_transition(n) {
                    before
                } else if self.is_transition(p) {
                    after
                } else {
                    0.5 * (before + after)
                }
            })
            .collect()
    }

    /// Builds the node layers.
    ///
    /// # Errors
    /// Returns [`ScaffoldError::DegenerateGeometry`] with `[row, index]` for
    /// a zero normal, or `[row, index, layer]` for a scale factor `<= 0`.
    pub fn offset(&self, grid: &SurfaceGrid, schedule: &WallSchedule) -> Result<LayeredGrid, ScaffoldError> {
        let rows = grid.rows();
        let count = grid.points_count;
        if schedule.thickness.len() != rows || schedule.layers() == 0 {
            return Err(ScaffoldError::degenerate(
                "wall offset",
                [schedule.thickness.len(), rows],
                "thickness schedule does not match the grid rows",
            ));
        }

        let mut normals = vec![vec![Vec3::ZERO; count]; rows];
        for (row, ring) in normals.iter_mut().enumerate() {
            for (n, normal) in ring.iter_mut().enumerate() {
                *normal = grid
                    .normal(row, n)
                    .ok_or_else(|| ScaffoldError::degenerate("wall offset", [row, n], "zero surface normal"))?;
            }
        }

        let curvature_around: Vec<Vec<f64>> = (0..rows)
            .map(|row| {
                if row == 0 && grid.apex.is_some() {
                    vec![0.0; count]
                } else {
                    self.ring_curvatures(&grid.x[row], &grid.d1[row], &normals[row])
                }
            })
            .collect();

        let mut curvature_along = vec![vec![0.0; count]; rows];
        for n in 0..count {
            let rail: Vec<Vec3> = grid.x.iter().map(|r| r[n]).collect();
            let rail_d2: Vec<Vec3> = grid.d2.iter().map(|r| r[n]).collect();
            let rail_normals: Vec<Vec3> = normals.iter().map(|r| r[n]).collect();
            let curvatures = curvatures_along_curve(&rail, &rail_d2, &rail_normals, false)?;
            for (row, k) in curvatures.into_iter().enumerate() {
                curvature_along[row][n] = k;
            }
        }

        let node_layers = schedule.layers() + 1;
        let mut layers = Vec::with_capacity(node_layers);
        for layer in 0..node_layers {
            let fraction = schedule.cumulative_fraction(layer);
            let node_fraction = schedule.node_fraction(layer);
            let mut surface = grid.clone();
            let mut scale_around = vec![vec![1.0; count]; rows];
            let mut scale_along = vec![vec![1.0; count]; rows];
            for row in 0..rows {
                let thickness = schedule.thickness[row];
                let offset = fraction * thickness;
                for n in 0..count {
                    let normal = normals[row][n];
                    let around = curvature_scale(curvature_around[row][n], offset);
                    let along = curvature_scale(curvature_along[row][n], offset);
                    if around <= 0.0 || along <= 0.0 {
                        return Err(ScaffoldError::degenerate(
                            "wall offset",
                            [row, n, layer],
                            format!("curvature scale {:.6} inverts the element", around.min(along)),
                        ));
                    }
                    surface.x[row][n] = grid.x[row][n] + normal * offset;
                    surface.d1[row][n] = grid.d1[row][n] * around;
                    surface.d2[row][n] = grid.d2[row][n] * along;
                    surface.d3[row][n] = normal * (thickness * node_fraction);
                    scale_around[row][n] = around;
                    scale_along[row][n] = along;
                }
            }

            if let Some(apex) = &grid.apex {
                let along = scale_along[0].iter().sum::<f64>() / count as f64;
                let thickness = schedule.thickness[0];
                let normal = -apex.axis;
                let layer_apex = ApexFrame {
                    x: apex.x + normal * (fraction * thickness),
                    axis: apex.axis,
                    d1: apex.d1 * along,
                    d2: apex.d2 * along,
                    d3: normal * (thickness * node_fraction),
                };
                for n in 0..count {
                    surface.d2[0][n] = layer_apex.rail_derivative(n, count);
                    scale_along[0][n] = along;
                }
                surface.apex = Some(layer_apex);
            }

            layers.push(WallLayer {
                fraction,
                surface,
                scale_around,
                scale_along,
            });
        }

        log::debug!(
            "wall offset: {} node layers over {} rows{}",
            node_layers,
            rows,
            if schedule.is_zero() { " (collapsed)" } else { "" }
        );
        Ok(LayeredGrid {
            points_count: count,
            normals,
            curvature_around,
            curvature_along,
            layers,
            collapsed: schedule.is_zero(),
        })
    }
}
