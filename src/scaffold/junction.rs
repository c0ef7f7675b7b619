//! Annulus junction between two tube end rings.
//!
//! The junction fills the gap between a start ring and an end ring with
//! `elements_count_radial` rows of hexahedra. Interior rings are cubic
//! Hermite interpolated along each node's `d2`, which is first blended at
//! both seams towards the chord length per row so the rows come out even.
//!
//! Two ring layouts are supported: equal counts around, or an end ring with
//! twice the start count, where the first row hangs every other fine node
//! off the midpoint of a coarse edge. An end ring whose tube runs towards
//! the start ring is read through reversed d1 and d2 rather than rewritten.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::geom::{Vec3, interpolate_cubic_hermite, interpolate_cubic_hermite_derivative};

use super::assemble::{MeshAssembler, NodeParameters};
use super::error::ScaffoldError;
use super::ids::{IdAllocator, IdRange};
use super::options::JunctionOptions;
use super::singular::HangingCorner;
use super::store::{ElementId, MeshStore, NodeId};
use super::template::ValueLabel;
use super::tube::SeamRing;

/// Result of stitching two rings.
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionOutcome {
    pub range: IdRange,
    /// Nodes of both rings; reused by the junction, never created by it.
    pub seam_nodes: Vec<NodeId>,
    /// `interior[row - 1][layer][index]` for rows strictly between the rings.
    pub interior: Vec<Vec<Vec<NodeId>>>,
    pub elements: Vec<ElementId>,
    pub end_reversed: bool,
    /// End ring index matched to start index 0.
    pub around_offset: usize,
    pub hanging: bool,
}

/// Stitches a start ring to an end ring.
#[derive(Debug, Clone, Default)]
pub struct AnnulusJunction {
    options: JunctionOptions,
}

impl AnnulusJunction {
    #[must_use]
    pub fn new(options: JunctionOptions) -> Self {
        Self { options }
    }

    /// Creates the junction nodes and elements and blends the seam `d2`
    /// magnitudes of both rings in place.
    ///
    /// # Errors
    /// [`ScaffoldError::UnsupportedJunction`] for ring counts other than
    /// `n:n` or `n:2n`, [`ScaffoldError::LayerMismatch`] for differing
    /// layer counts, and degenerate geometry for coincident ring centres or
    /// points, or a start ring facing away from the end ring.
    pub fn stitch<S: MeshStore + ?Sized>(
        &self,
        assembler: &mut MeshAssembler,
        store: &mut S,
        ids: &mut IdAllocator,
        start: &SeamRing,
        end: &SeamRing,
    ) -> Result<JunctionOutcome, ScaffoldError> {
        let (options, repairs) = self.options.clone().checked();
        assembler.diagnostics_mut().add_repairs(&repairs);
        let mark = ids.mark();

        let coarse = start.points_count();
        let fine = end.points_count();
        let hanging = fine == 2 * coarse;
        if coarse == 0 || (fine != coarse && !hanging) {
            return Err(ScaffoldError::UnsupportedJunction {
                start: coarse,
                end: fine,
            });
        }
        let layers = start.node_layers();
        if layers != end.node_layers() {
            return Err(ScaffoldError::LayerMismatch {
                start: layers,
                end: end.node_layers(),
            });
        }

        let direction = (end.centre - start.centre)
            .normalized()
            .ok_or_else(|| ScaffoldError::degenerate("junction", Vec::new(), "seam rings share a centre"))?;
        if start.direction.dot(direction) <= 0.0 {
            return Err(ScaffoldError::degenerate(
                "junction",
                Vec::new(),
                "start ring faces away from the end ring",
            ));
        }
        let end_reversed = end.direction.dot(direction) < 0.0;
        let around_offset = around_offset(start, end, direction)?;
        let end_index = |j: usize| {
            if end_reversed {
                (around_offset + fine - j) % fine
            } else {
                (around_offset + j) % fine
            }
        };

        let rows = options.elements_count_radial;
        let per_row = 1.0 / rows as f64;
        let step = if hanging { 2 } else { 1 };

        // Start ring, blended, then refined to the end count.
        let mut start_coarse = start.parameters.clone();
        let mut end_fine: Vec<Vec<NodeParameters>> = end
            .parameters
            .iter()
            .map(|layer| {
                (0..fine)
                    .map(|j| {
                        let mut p = layer[end_index(j)];
                        if end_reversed {
                            p.d1 = -p.d1;
                            p.d2 = -p.d2;
                        }
                        p
                    })
                    .collect()
            })
            .collect();

        for l in 0..layers {
            for c in 0..coarse {
                let chord = end_fine[l][c * step].x.distance_to(start_coarse[l][c].x);
                let d2 = blend_magnitude(start_coarse[l][c].d2, chord * per_row, direction);
                start_coarse[l][c].d2 = d2;
                store.set_node_derivative(start.nodes[l][c], ValueLabel::D2, 1, d2)?;
            }
        }
        let start_fine: Vec<Vec<NodeParameters>> =
            start_coarse.iter().map(|layer| refine(layer, hanging)).collect();
        for l in 0..layers {
            for j in 0..fine {
                let chord = end_fine[l][j].x.distance_to(start_fine[l][j].x);
                if chord <= 0.0 {
                    return Err(ScaffoldError::degenerate("junction", [j, l], "seam points coincide"));
                }
                let d2 = blend_magnitude(end_fine[l][j].d2, chord * per_row, direction);
                end_fine[l][j].d2 = d2;
                let stored = if end_reversed { -d2 } else { d2 };
                store.set_node_derivative(end.nodes[l][end_index(j)], ValueLabel::D2, 1, stored)?;
            }
        }

        let collapsed = start.is_collapsed() && end.is_collapsed();
        let created_layers = if collapsed { 1 } else { layers };
        let scale = rows as f64;
        let mut interior: Vec<Vec<Vec<NodeId>>> = Vec::with_capacity(rows.saturating_sub(1));
        for r in 1..rows {
            let xi = r as f64 * per_row;
            let mut row_nodes: Vec<Vec<NodeId>> = Vec::with_capacity(layers);
            for l in 0..layers {
                if l >= created_layers {
                    let shared = row_nodes[0].clone();
                    row_nodes.push(shared);
                    continue;
                }
                let mut ring = Vec::with_capacity(fine);
                for j in 0..fine {
                    let (a, b) = (&start_fine[l][j], &end_fine[l][j]);
                    let (da, db) = (a.d2 * scale, b.d2 * scale);
                    let parameters = NodeParameters {
                        x: interpolate_cubic_hermite(a.x, da, b.x, db, xi),
                        d1: a.d1.lerp(b.d1, xi),
                        d2: interpolate_cubic_hermite_derivative(a.x, da, b.x, db, xi) / scale,
                        d3: a.d3.lerp(b.d3, xi),
                    };
                    ring.push(assembler.create_node(store, ids, &parameters)?);
                }
                row_nodes.push(ring);
            }
            interior.push(row_nodes);
        }

        let standard = assembler.topology().standard()?;
        let mut elements = Vec::with_capacity(rows * (layers - 1) * fine);
        for e2 in 0..rows {
            let reversed = end_reversed && e2 == rows - 1;
            for e3 in 0..layers - 1 {
                for e1 in 0..fine {
                    let f1 = (e1 + 1) % fine;
                    let bottom = |l: usize| -> [NodeId; 2] {
                        if e2 > 0 {
                            [interior[e2 - 1][l][e1], interior[e2 - 1][l][f1]]
                        } else if hanging {
                            let c = e1 / 2;
                            [start.nodes[l][c], start.nodes[l][(c + 1) % coarse]]
                        } else {
                            [start.nodes[l][e1], start.nodes[l][f1]]
                        }
                    };
                    let top = |l: usize| -> [NodeId; 2] {
                        if e2 + 1 < rows {
                            [interior[e2][l][e1], interior[e2][l][f1]]
                        } else {
                            [end.nodes[l][end_index(e1)], end.nodes[l][end_index(f1)]]
                        }
                    };
                    let corner = (hanging && e2 == 0).then(|| {
                        if e1 % 2 == 0 {
                            HangingCorner::End
                        } else {
                            HangingCorner::Start
                        }
                    });
                    let (template, scale_factors) = if reversed || corner.is_some() {
                        let element = assembler.topology().junction(reversed, corner)?;
                        (element.template, element.scale_factors)
                    } else {
                        (Arc::clone(&standard), Vec::new())
                    };
                    let ([b0, b1], [t0, t1]) = (bottom(e3), top(e3));
                    let ([c0, c1], [u0, u1]) = (bottom(e3 + 1), top(e3 + 1));
                    let local = [b0, b1, t0, t1, c0, c1, u0, u1];
                    elements.push(assembler.create_element(store, ids, &template, &local, &scale_factors)?);
                }
            }
        }

        let seam_nodes: Vec<NodeId> = start
            .nodes
            .iter()
            .chain(&end.nodes)
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        log::debug!(
            "junction: {coarse}:{fine} around, {rows} rows, offset {around_offset}{}",
            if end_reversed { ", end reversed" } else { "" }
        );
        Ok(JunctionOutcome {
            range: ids.range_since(mark),
            seam_nodes,
            interior,
            elements,
            end_reversed,
            around_offset,
            hanging,
        })
    }
}

/// End ring index whose radial direction best matches start index 0.
fn around_offset(start: &SeamRing, end: &SeamRing, direction: Vec3) -> Result<usize, ScaffoldError> {
    let radial = |ring: &SeamRing, index: usize| {
        (ring.parameters[0][index].x - ring.centre).reject_from(direction).normalized()
    };
    let reference = radial(start, 0)
        .ok_or_else(|| ScaffoldError::degenerate("junction", [0], "start ring point lies on the axis"))?;
    let mut best = (0, f64::NEG_INFINITY);
    for k in 0..end.points_count() {
        let Some(r) = radial(end, k) else {
            return Err(ScaffoldError::degenerate("junction", [k], "end ring point lies on the axis"));
        };
        let score = r.dot(reference);
        if score > best.1 {
            best = (k, score);
        }
    }
    Ok(best.0)
}

/// Mean of the current magnitude and `target`, keeping the direction.
fn blend_magnitude(d: Vec3, target: f64, fallback: Vec3) -> Vec3 {
    let magnitude = 0.5 * (d.length() + target);
    d.normalized().unwrap_or(fallback) * magnitude
}

/// Doubles a ring: even entries are the coarse nodes with `d1` halved, odd
/// entries the Hermite midpoints of the coarse edges.
fn refine(coarse: &[NodeParameters], hanging: bool) -> Vec<NodeParameters> {
    if !hanging {
        return coarse.to_vec();
    }
    let count = coarse.len();
    (0..2 * count)
        .map(|j| {
            let a = coarse[j / 2];
            if j % 2 == 0 {
                return NodeParameters { d1: a.d1 * 0.5, ..a };
            }
            let b = coarse[(j / 2 + 1) % count];
            NodeParameters {
                x: a.x * 0.5 + a.d1 * 0.125 + b.x * 0.5 - b.d1 * 0.125,
                d1: -a.x * 0.75 - a.d1 * 0.125 + b.x * 0.75 - b.d1 * 0.125,
                d2: (a.d2 + b.d2) * 0.5,
                d3: (a.d3 + b.d3) * 0.5,
            }
        })
        .collect()
}
