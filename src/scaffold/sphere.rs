//! Closed ellipsoidal shell with an apex at each pole.
//!
//! The outer surface has equatorial radius 0.5 and polar half-length
//! `0.5 · length_ratio`; the inner surface is offset by the wall thickness
//! at the equator and `thickness · wall_thickness_ratio_apex` at the poles.
//! Rows up are spaced quadratically in the polar angle so the element length
//! at the equator over the one at an apex equals
//! `element_length_ratio_equator_apex`, mirrored about the equator.
//!
//! Nodes are written layer by layer from the inside out, each layer bottom
//! to top: the bottom apex, then one ring of `elements_count_around` per
//! row, then the top apex. Excluded rows drop their nodes and elements and
//! leave the shell open at that end.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::geom::Vec3;

use super::assemble::{MeshAssembler, NodeParameters};
use super::diagnostics::ScaffoldDiagnostics;
use super::error::ScaffoldError;
use super::ids::{IdAllocator, IdRange};
use super::metrics::{ScaffoldMetrics, TimingBucket};
use super::options::SphereShellOptions;
use super::singular::Pole;
use super::store::{MeshStore, NodeId};

/// Result of a sphere shell generation.
#[derive(Debug, Clone)]
pub struct SphereShellOutcome {
    pub range: IdRange,
    /// Bottom apex node per layer, inner first; empty when excluded.
    pub bottom_apex: Vec<NodeId>,
    pub top_apex: Vec<NodeId>,
    pub options: SphereShellOptions,
    pub diagnostics: ScaffoldDiagnostics,
}

/// Position and up/through-wall vectors of one meridian point, in the
/// `(radial, axial)` half-plane.
#[derive(Debug, Clone, Copy)]
struct MeridianPoint {
    position: [f64; 2],
    up: [f64; 2],
    through_wall: [f64; 2],
}

/// One half-ellipse meridian sampled at every node row.
fn meridian(
    width: f64,
    length: f64,
    element_length_ratio: f64,
    length_ratio: f64,
    up: usize,
) -> Vec<([f64; 2], [f64; 2])> {
    let b = 2.0 / (1.0 + element_length_ratio / length_ratio);
    let a = 1.0 - b;
    (0..=up)
        .map(|n2| {
            let upper = 2 * n2 > up;
            let xi = if upper {
                2.0 - 2.0 * n2 as f64 / up as f64
            } else {
                2.0 * n2 as f64 / up as f64
            };
            let nxi = a * xi * xi + b * xi;
            let dnxi = 2.0 * a * xi + b;
            let radians = if upper { PI - nxi * FRAC_PI_2 } else { nxi * FRAC_PI_2 };
            let d_radians = dnxi * PI / up as f64;
            let (s, c) = radians.sin_cos();
            ([width * s, -length * c], [width * c * d_radians, length * s * d_radians])
        })
        .collect()
}

/// Sphere shell generator.
#[derive(Debug, Clone, Default)]
pub struct SphereShellGenerator {
    options: SphereShellOptions,
}

impl SphereShellGenerator {
    #[must_use]
    pub fn new(options: SphereShellOptions) -> Self {
        Self { options }
    }

    fn meridians(options: &SphereShellOptions) -> Vec<Vec<MeridianPoint>> {
        let up = options.elements_count_up;
        let through = options.elements_count_through_wall;
        let t = options.wall_thickness;
        let outer_length = 0.5 * options.length_ratio;
        let ratio = options.element_length_ratio_equator_apex;
        let outer = meridian(0.5, outer_length, ratio, options.length_ratio, up);
        let inner = meridian(
            0.5 - t,
            outer_length - t * options.wall_thickness_ratio_apex,
            ratio,
            options.length_ratio,
            up,
        );
        (0..=through)
            .map(|n3| {
                let f = n3 as f64 / through as f64;
                inner
                    .iter()
                    .zip(&outer)
                    .map(|(&(pi, vi), &(po, vo))| MeridianPoint {
                        position: [pi[0] + f * (po[0] - pi[0]), pi[1] + f * (po[1] - pi[1])],
                        up: [vi[0] + f * (vo[0] - vi[0]), vi[1] + f * (vo[1] - vi[1])],
                        through_wall: [(po[0] - pi[0]) / through as f64, (po[1] - pi[1]) / through as f64],
                    })
                    .collect()
            })
            .collect()
    }

    /// Writes the shell into `store`.
    ///
    /// # Errors
    /// Fails on template validation or store rejection.
    pub fn generate<S: MeshStore + ?Sized>(
        &self,
        store: &mut S,
        ids: &mut IdAllocator,
    ) -> Result<SphereShellOutcome, ScaffoldError> {
        let (options, repairs) = self.options.clone().checked();
        let mut metrics = ScaffoldMetrics::default();
        metrics.begin();
        let mark = ids.mark();

        let around = options.elements_count_around;
        let up = options.elements_count_up;
        let through = options.elements_count_through_wall;
        let first_row = options.exclude_bottom_rows;
        let last_row = up - options.exclude_top_rows;
        let d_phi = TAU / around as f64;

        let meridians = metrics.time(TimingBucket::Profile, || Self::meridians(&options));
        let mut assembler = MeshAssembler::new();

        // rows[n3][n2 - first_row] holds one node for an apex row.
        let mut rows: Vec<Vec<Vec<NodeId>>> = Vec::with_capacity(through + 1);
        let mut bottom_apex = Vec::new();
        let mut top_apex = Vec::new();
        metrics.time(TimingBucket::Assembly, || -> Result<(), ScaffoldError> {
            for layer in &meridians {
                let mut layer_rows = Vec::with_capacity(last_row - first_row + 1);
                for (n2, point) in layer.iter().enumerate().take(last_row + 1).skip(first_row) {
                    let [radial, axial] = point.position;
                    if n2 == 0 || n2 == up {
                        let magnitude = point.up[0].abs();
                        let parameters = NodeParameters {
                            x: Vec3::new(0.0, 0.0, axial),
                            d1: Vec3::new(0.0, magnitude, 0.0),
                            d2: Vec3::new(magnitude, 0.0, 0.0),
                            d3: Vec3::new(0.0, 0.0, point.through_wall[1]),
                        };
                        let node = assembler.create_node(store, ids, &parameters)?;
                        if n2 == 0 {
                            bottom_apex.push(node);
                        } else {
                            top_apex.push(node);
                        }
                        layer_rows.push(vec![node]);
                        continue;
                    }
                    let mut ring = Vec::with_capacity(around);
                    for n1 in 0..around {
                        let (s, c) = (n1 as f64 * d_phi).sin_cos();
                        let parameters = NodeParameters {
                            x: Vec3::new(radial * c, radial * s, axial),
                            d1: Vec3::new(-radial * s * d_phi, radial * c * d_phi, 0.0),
                            d2: Vec3::new(point.up[0] * c, point.up[0] * s, point.up[1]),
                            d3: Vec3::new(
                                point.through_wall[0] * c,
                                point.through_wall[0] * s,
                                point.through_wall[1],
                            ),
                        };
                        ring.push(assembler.create_node(store, ids, &parameters)?);
                    }
                    layer_rows.push(ring);
                }
                rows.push(layer_rows);
            }

            let standard = assembler.topology().standard()?;
            for e3 in 0..through {
                for e2 in first_row..last_row {
                    let r = e2 - first_row;
                    for e1 in 0..around {
                        let f1 = (e1 + 1) % around;
                        let (inner, outer) = (&rows[e3], &rows[e3 + 1]);
                        if e2 == 0 {
                            let apex = assembler.topology().apex(Pole::Bottom, e1, around)?;
                            let local = [
                                inner[r][0],
                                inner[r + 1][e1],
                                inner[r + 1][f1],
                                outer[r][0],
                                outer[r + 1][e1],
                                outer[r + 1][f1],
                            ];
                            assembler.create_element(store, ids, &apex.template, &local, &apex.scale_factors)?;
                        } else if e2 == up - 1 {
                            let apex = assembler.topology().apex(Pole::Top, e1, around)?;
                            let local = [
                                inner[r][e1],
                                inner[r][f1],
                                inner[r + 1][0],
                                outer[r][e1],
                                outer[r][f1],
                                outer[r + 1][0],
                            ];
                            assembler.create_element(store, ids, &apex.template, &local, &apex.scale_factors)?;
                        } else {
                            let local = [
                                inner[r][e1],
                                inner[r][f1],
                                inner[r + 1][e1],
                                inner[r + 1][f1],
                                outer[r][e1],
                                outer[r][f1],
                                outer[r + 1][e1],
                                outer[r + 1][f1],
                            ];
                            assembler.create_element(store, ids, &standard, &local, &[])?;
                        }
                    }
                }
            }
            Ok(())
        })?;

        let diagnostics = assembler.diagnostics_mut();
        diagnostics.add_repairs(&repairs);
        diagnostics.timing = metrics.end();
        let diagnostics = assembler.finish();
        log::debug!("sphere shell: {}", diagnostics.summary());

        Ok(SphereShellOutcome {
            range: ids.range_since(mark),
            bottom_apex,
            top_apex,
            options,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::store::InMemoryMesh;

    #[test]
    fn test_meridian_ends_on_the_axis() {
        let points = meridian(0.5, 0.5, 1.0, 1.0, 4);
        assert!(points[0].0[0].abs() < 1e-12);
        assert!((points[0].0[1] + 0.5).abs() < 1e-12);
        assert!((points[2].0[0] - 0.5).abs() < 1e-12);
        assert!((points[4].0[1] - 0.5).abs() < 1e-12);
        // Uniform spacing: a quarter turn per two rows.
        assert!((points[1].1[1] - 0.5 * (PI / 4.0).sin() * PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_excluded_rows_open_the_shell() {
        let options = SphereShellOptions {
            exclude_top_rows: 1,
            ..SphereShellOptions::default()
        };
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let outcome = SphereShellGenerator::new(options)
            .generate(&mut mesh, &mut ids)
            .expect("shell");
        assert!(outcome.top_apex.is_empty());
        assert_eq!(outcome.bottom_apex.len(), 2);
        // Per layer: bottom apex and three rings of four.
        assert_eq!(mesh.node_count(), 2 * (1 + 3 * 4));
        assert_eq!(mesh.element_count(), 3 * 4);
        assert_eq!(outcome.diagnostics.apex_element_count, 4);
        mesh.validate().expect("valid mesh");
    }
}
