//! Node and element emission.
//!
//! [`MeshAssembler`] owns the template builder and the run diagnostics, and
//! is the only place that calls into a [`MeshStore`]. Regular cells get the
//! shared identity template; cells touching an apex get a pole template
//! from [`SingularTopologyBuilder`].
//!
//! Tube node order is row by row along the path, then node layer from the
//! inner surface outwards, then loop index around. A closed proximal end
//! contributes one apex node per layer, so those come first. When every
//! layer coincides (zero wall thickness) only the inner layer gets nodes
//! and the outer layers reuse them.

use std::sync::Arc;

use crate::geom::Vec3;

use super::diagnostics::ScaffoldDiagnostics;
use super::error::ScaffoldError;
use super::ids::IdAllocator;
use super::singular::{Pole, SingularTopologyBuilder};
use super::store::{ElementId, MeshStore, NodeId, NodeTemplate};
use super::template::{ElementTemplate, ValueLabel};
use super::wall::LayeredGrid;

/// Value and the three first derivatives of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeParameters {
    pub x: Vec3,
    pub d1: Vec3,
    pub d2: Vec3,
    pub d3: Vec3,
}

/// Node identifiers of an assembled tube.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TubeNodes {
    /// One apex node per layer; empty for an open proximal end.
    pub apex: Vec<NodeId>,
    /// `rings[row][layer][index]`; on an apex row every index holds the
    /// layer's apex node.
    pub rings: Vec<Vec<Vec<NodeId>>>,
    pub elements: Vec<ElementId>,
}

impl TubeNodes {
    /// Distinct node identifiers in creation order.
    #[must_use]
    pub fn unique_nodes(&self) -> Vec<NodeId> {
        let mut seen = std::collections::BTreeSet::new();
        self.rings
            .iter()
            .flatten()
            .flatten()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Writes nodes and elements, counting what it creates.
#[derive(Debug, Default)]
pub struct MeshAssembler {
    topology: SingularTopologyBuilder,
    diagnostics: ScaffoldDiagnostics,
}

impl MeshAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology(&mut self) -> &mut SingularTopologyBuilder {
        &mut self.topology
    }

    pub fn diagnostics_mut(&mut self) -> &mut ScaffoldDiagnostics {
        &mut self.diagnostics
    }

    /// Creates a tricubic node and sets all four parameters.
    ///
    /// # Errors
    /// Propagates store rejections.
    pub fn create_node<S: MeshStore + ?Sized>(
        &mut self,
        store: &mut S,
        ids: &mut IdAllocator,
        parameters: &NodeParameters,
    ) -> Result<NodeId, ScaffoldError> {
        let node = store.create_node(ids.node(), NodeTemplate::tricubic())?;
        store.set_node_derivative(node, ValueLabel::Value, 1, parameters.x)?;
        store.set_node_derivative(node, ValueLabel::D1, 1, parameters.d1)?;
        store.set_node_derivative(node, ValueLabel::D2, 1, parameters.d2)?;
        store.set_node_derivative(node, ValueLabel::D3, 1, parameters.d3)?;
        self.diagnostics.node_count += 1;
        Ok(node)
    }

    /// Creates an element and assigns its nodes and scale factors.
    ///
    /// # Errors
    /// Propagates store rejections, including a node list that does not
    /// match the template.
    pub fn create_element<S: MeshStore + ?Sized>(
        &mut self,
        store: &mut S,
        ids: &mut IdAllocator,
        template: &Arc<ElementTemplate>,
        nodes: &[NodeId],
        scale_factors: &[f64],
    ) -> Result<ElementId, ScaffoldError> {
        let element = store.create_element(ids.element(), Arc::clone(template))?;
        store.set_element_nodes(element, nodes)?;
        store.set_element_scale_factors(element, scale_factors)?;
        self.diagnostics.record_element(template.kind());
        Ok(element)
    }

    /// Creates the nodes and elements of a layered tube.
    ///
    /// # Errors
    /// Propagates template and store failures.
    pub fn assemble_tube<S: MeshStore + ?Sized>(
        &mut self,
        store: &mut S,
        ids: &mut IdAllocator,
        grid: &LayeredGrid,
    ) -> Result<TubeNodes, ScaffoldError> {
        let count = grid.points_count;
        let node_layers = grid.layers.len();
        let created_layers = if grid.collapsed { 1 } else { node_layers };
        let has_apex = grid.layers[0].surface.apex.is_some();

        let mut nodes = TubeNodes::default();
        for row in 0..grid.rows() {
            let mut row_nodes: Vec<Vec<NodeId>> = Vec::with_capacity(node_layers);
            for layer in 0..node_layers {
                if layer >= created_layers {
                    let shared = row_nodes[0].clone();
                    row_nodes.push(shared);
                    continue;
                }
                let surface = &grid.layers[layer].surface;
                match (&surface.apex, row) {
                    (Some(apex), 0) => {
                        let id = self.create_node(
                            store,
                            ids,
                            &NodeParameters {
                                x: apex.x,
                                d1: apex.d1,
                                d2: apex.d2,
                                d3: apex.d3,
                            },
                        )?;
                        nodes.apex.push(id);
                        row_nodes.push(vec![id; count]);
                    }
                    _ => {
                        let mut ring = Vec::with_capacity(count);
                        for n in 0..count {
                            let parameters = NodeParameters {
                                x: surface.x[row][n],
                                d1: surface.d1[row][n],
                                d2: surface.d2[row][n],
                                d3: surface.d3[row][n],
                            };
                            ring.push(self.create_node(store, ids, &parameters)?);
                        }
                        row_nodes.push(ring);
                    }
                }
            }
            nodes.rings.push(row_nodes);
        }
        if grid.collapsed && has_apex {
            let apex = nodes.apex[0];
            nodes.apex = vec![apex; node_layers];
        }

        let standard = self.topology.standard()?;
        for e2 in 0..grid.rows() - 1 {
            for e3 in 0..node_layers - 1 {
                for e1 in 0..count {
                    let f1 = (e1 + 1) % count;
                    let inner = &nodes.rings[e2 + 1][e3];
                    let outer = &nodes.rings[e2 + 1][e3 + 1];
                    let element = if has_apex && e2 == 0 {
                        let apex = self.topology.apex(Pole::Bottom, e1, count)?;
                        let local = [
                            nodes.apex[e3],
                            inner[e1],
                            inner[f1],
                            nodes.apex[e3 + 1],
                            outer[e1],
                            outer[f1],
                        ];
                        self.create_element(store, ids, &apex.template, &local, &apex.scale_factors)?
                    } else {
                        let below_inner = &nodes.rings[e2][e3];
                        let below_outer = &nodes.rings[e2][e3 + 1];
                        let local = [
                            below_inner[e1],
                            below_inner[f1],
                            inner[e1],
                            inner[f1],
                            below_outer[e1],
                            below_outer[f1],
                            outer[e1],
                            outer[f1],
                        ];
                        self.create_element(store, ids, &standard, &local, &[])?
                    };
                    nodes.elements.push(element);
                }
            }
        }
        log::debug!(
            "assembled tube: {} nodes, {} elements",
            nodes.unique_nodes().len(),
            nodes.elements.len()
        );
        Ok(nodes)
    }

    /// Finishes the run, attaching template cache statistics.
    #[must_use]
    pub fn finish(mut self) -> ScaffoldDiagnostics {
        self.diagnostics.template_cache = self.topology.cache_stats();
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::store::InMemoryMesh;
    use crate::scaffold::wall::{WallOffsetter, WallSchedule};
    use crate::scaffold::warp::SurfaceGrid;

    fn flat_grid(count: usize, rows: usize) -> SurfaceGrid {
        let step = std::f64::consts::TAU / count as f64;
        let ring = |z: f64| -> (Vec<Vec3>, Vec<Vec3>) {
            (0..count)
                .map(|n| {
                    let (s, c) = (n as f64 * step).sin_cos();
                    (Vec3::new(c, s, z), Vec3::new(-s, c, 0.0) * step)
                })
                .unzip()
        };
        let (x, d1): (Vec<_>, Vec<_>) = (0..rows).map(|r| ring(r as f64)).unzip();
        SurfaceGrid {
            points_count: count,
            x,
            d1,
            d2: vec![vec![Vec3::Z; count]; rows],
            d3: vec![vec![Vec3::ZERO; count]; rows],
            apex: None,
        }
    }

    #[test]
    fn test_open_tube_counts_and_order() {
        let layered = WallOffsetter::new()
            .offset(&flat_grid(4, 3), &WallSchedule::uniform(3, 0.1, 2))
            .expect("offset");
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let mut assembler = MeshAssembler::new();
        let nodes = assembler.assemble_tube(&mut mesh, &mut ids, &layered).expect("assemble");
        // 3 rows x 3 layers x 4 around, 2 elements along x 2 through x 4 around.
        assert_eq!(mesh.node_count(), 36);
        assert_eq!(mesh.element_count(), 16);
        assert_eq!(nodes.rings[0][0], vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(nodes.rings[0][1][0], NodeId(5));
        assert_eq!(nodes.rings[1][0][0], NodeId(13));
        mesh.validate().expect("valid mesh");
        let diagnostics = assembler.finish();
        assert_eq!(diagnostics.standard_element_count, 16);
        assert_eq!(diagnostics.template_cache.entries, 1);
    }

    #[test]
    fn test_wraparound_shares_index_zero() {
        let layered = WallOffsetter::new()
            .offset(&flat_grid(4, 2), &WallSchedule::uniform(2, 0.1, 1))
            .expect("offset");
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let nodes = MeshAssembler::new()
            .assemble_tube(&mut mesh, &mut ids, &layered)
            .expect("assemble");
        let last = mesh.element(*nodes.elements.last().expect("element")).expect("record");
        assert_eq!(last.nodes[0], nodes.rings[0][0][3]);
        assert_eq!(last.nodes[1], nodes.rings[0][0][0]);
    }

    #[test]
    fn test_collapsed_wall_reuses_inner_nodes() {
        let layered = WallOffsetter::new()
            .offset(&flat_grid(4, 2), &WallSchedule::uniform(2, 0.0, 1))
            .expect("offset");
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let nodes = MeshAssembler::new()
            .assemble_tube(&mut mesh, &mut ids, &layered)
            .expect("assemble");
        assert_eq!(mesh.node_count(), 8);
        assert_eq!(mesh.element_count(), 4);
        assert_eq!(nodes.rings[1][0], nodes.rings[1][1]);
    }
}
