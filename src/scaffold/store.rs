//! The mesh storage seam.
//!
//! Generators only ever write through [`MeshStore`]: create a node with a
//! parameter layout, set a node parameter, create an element with a
//! template, then set its nodes and scale factors. [`InMemoryMesh`] is the
//! in-crate implementation used by the CLI, the wasm engine and the tests;
//! it also evaluates the resulting tricubic Hermite field.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geom::Vec3;

use super::template::{ElementTemplate, ValueLabel};

/// Global node identifier, dense and starting at 1 per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Global element identifier, dense and starting at 1 per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of versions stored per value label on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeTemplate {
    versions: [u32; 8],
}

impl NodeTemplate {
    /// Value, d1, d2 and d3 with one version each.
    #[must_use]
    pub const fn tricubic() -> Self {
        Self {
            versions: [1, 1, 1, 0, 1, 0, 0, 0],
        }
    }

    #[must_use]
    pub const fn with_versions(mut self, label: ValueLabel, count: u32) -> Self {
        self.versions[label.index()] = count;
        self
    }

    #[must_use]
    pub const fn versions(&self, label: ValueLabel) -> u32 {
        self.versions[label.index()]
    }
}

impl Default for NodeTemplate {
    fn default() -> Self {
        Self::tricubic()
    }
}

/// Rejected store writes and failed evaluations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshStoreError {
    #[error("identifier 0 is reserved")]
    ZeroId,

    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("element {0} already exists")]
    DuplicateElement(ElementId),

    #[error("element {0} does not exist")]
    UnknownElement(ElementId),

    #[error("node {node} has no {label} version {version}")]
    MissingParameter {
        node: NodeId,
        label: ValueLabel,
        version: u32,
    },

    #[error("element {element} expects {expected} nodes, got {found}")]
    NodeCountMismatch {
        element: ElementId,
        expected: usize,
        found: usize,
    },

    #[error("element {element} expects {expected} scale factors, got {found}")]
    ScaleFactorCountMismatch {
        element: ElementId,
        expected: usize,
        found: usize,
    },

    #[error("element {0} has no nodes set")]
    ElementNodesUnset(ElementId),
}

/// Write-only interface the generators need from a mesh container.
pub trait MeshStore {
    /// Creates a node with the given parameter layout.
    ///
    /// # Errors
    /// Fails if the identifier is 0 or already used.
    fn create_node(&mut self, id: NodeId, template: NodeTemplate) -> Result<NodeId, MeshStoreError>;

    /// Sets, or overwrites, one declared node parameter.
    ///
    /// # Errors
    /// Fails if the node does not exist or does not declare that version.
    fn set_node_derivative(
        &mut self,
        node: NodeId,
        label: ValueLabel,
        version: u32,
        value: Vec3,
    ) -> Result<(), MeshStoreError>;

    /// Creates an element using `template`.
    ///
    /// # Errors
    /// Fails if the identifier is 0 or already used.
    fn create_element(
        &mut self,
        id: ElementId,
        template: Arc<ElementTemplate>,
    ) -> Result<ElementId, MeshStoreError>;

    /// Assigns the element's local nodes in order.
    ///
    /// # Errors
    /// Fails if the element or any node is unknown, a node lacks a parameter
    /// the template reads, or the count differs from the template.
    fn set_element_nodes(&mut self, element: ElementId, nodes: &[NodeId]) -> Result<(), MeshStoreError>;

    /// Assigns the element's scale factor values in template slot order.
    ///
    /// # Errors
    /// Fails if the element is unknown or the count differs from the template.
    fn set_element_scale_factors(
        &mut self,
        element: ElementId,
        values: &[f64],
    ) -> Result<(), MeshStoreError>;

    /// Highest node identifier in use, if any.
    fn max_node_id(&self) -> Option<NodeId>;

    /// Highest element identifier in use, if any.
    fn max_element_id(&self) -> Option<ElementId>;
}

/// Stored node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub template: NodeTemplate,
    pub parameters: BTreeMap<(ValueLabel, u32), Vec3>,
}

/// Stored element.
#[derive(Debug, Clone)]
pub struct ElementRecord {
    pub template: Arc<ElementTemplate>,
    pub nodes: Vec<NodeId>,
    pub scale_factors: Vec<f64>,
}

/// Field value and its first derivatives with respect to local `xi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSample {
    pub x: Vec3,
    pub dxi: [Vec3; 3],
}

/// Ordered in-memory mesh container.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMesh {
    nodes: BTreeMap<NodeId, NodeRecord>,
    elements: BTreeMap<ElementId, ElementRecord>,
}

impl InMemoryMesh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &ElementRecord)> {
        self.elements.iter().map(|(id, element)| (*id, element))
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&ElementRecord> {
        self.elements.get(&id)
    }

    #[must_use]
    pub fn parameter(&self, node: NodeId, label: ValueLabel, version: u32) -> Option<Vec3> {
        self.nodes.get(&node)?.parameters.get(&(label, version)).copied()
    }

    /// Position of a node.
    #[must_use]
    pub fn position(&self, node: NodeId) -> Option<Vec3> {
        self.parameter(node, ValueLabel::Value, 1)
    }

    /// Checks every element is complete and reads only existing parameters.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), MeshStoreError> {
        for (&id, element) in &self.elements {
            let template = &element.template;
            if element.nodes.is_empty() {
                return Err(MeshStoreError::ElementNodesUnset(id));
            }
            if element.nodes.len() != template.local_nodes_count() {
                return Err(MeshStoreError::NodeCountMismatch {
                    element: id,
                    expected: template.local_nodes_count(),
                    found: element.nodes.len(),
                });
            }
            if element.scale_factors.len() != template.scale_factors().len() {
                return Err(MeshStoreError::ScaleFactorCountMismatch {
                    element: id,
                    expected: template.scale_factors().len(),
                    found: element.scale_factors.len(),
                });
            }
            for (local_node, label, version) in template.node_parameters() {
                let node = element.nodes[local_node];
                if self.parameter(node, label, version).is_none() {
                    return Err(MeshStoreError::MissingParameter {
                        node,
                        label,
                        version,
                    });
                }
            }
        }
        Ok(())
    }

    /// Evaluates the element's tricubic Hermite field at local `xi`.
    ///
    /// # Errors
    /// Fails if the element is unknown, incomplete, or reads a missing
    /// parameter.
    pub fn evaluate(&self, element: ElementId, xi: [f64; 3]) -> Result<FieldSample, MeshStoreError> {
        let record = self
            .elements
            .get(&element)
            .ok_or(MeshStoreError::UnknownElement(element))?;
        if record.nodes.len() != record.template.local_nodes_count() {
            return Err(MeshStoreError::ElementNodesUnset(element));
        }
        if record.scale_factors.len() != record.template.scale_factors().len() {
            return Err(MeshStoreError::ScaleFactorCountMismatch {
                element,
                expected: record.template.scale_factors().len(),
                found: record.scale_factors.len(),
            });
        }

        let mut sample = FieldSample {
            x: Vec3::ZERO,
            dxi: [Vec3::ZERO; 3],
        };
        for corner in 0..8 {
            let bits = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            for label in ValueLabel::ALL {
                let terms = record.template.function(corner, label);
                if terms.is_empty() {
                    continue;
                }
                let mut parameter = Vec3::ZERO;
                for term in terms {
                    let node = record.nodes[term.local_node];
                    let value = self.parameter(node, term.label, term.version).ok_or(
                        MeshStoreError::MissingParameter {
                            node,
                            label: term.label,
                            version: term.version,
                        },
                    )?;
                    let scale: f64 = term
                        .scale_factors
                        .iter()
                        .map(|&slot| record.scale_factors[slot])
                        .product();
                    parameter += value * scale;
                }
                let basis: Vec<(f64, f64)> = (0..3)
                    .map(|d| basis_1d(bits[d], label.has_direction(d), xi[d]))
                    .collect();
                sample.x += parameter * (basis[0].0 * basis[1].0 * basis[2].0);
                sample.dxi[0] += parameter * (basis[0].1 * basis[1].0 * basis[2].0);
                sample.dxi[1] += parameter * (basis[0].0 * basis[1].1 * basis[2].0);
                sample.dxi[2] += parameter * (basis[0].0 * basis[1].0 * basis[2].1);
            }
        }
        Ok(sample)
    }
}

/// One-dimensional cubic Hermite basis for a corner at `xi = corner_bit`,
/// weighting its value or (with `derivative`) its slope. Returns the basis
/// and its `xi` derivative.
fn basis_1d(corner_bit: usize, derivative: bool, xi: f64) -> (f64, f64) {
    use crate::geom::{cubic_hermite_basis, cubic_hermite_basis_first_derivatives};
    let index = match (corner_bit, derivative) {
        (0, false) => 0,
        (0, true) => 1,
        (_, false) => 2,
        (_, true) => 3,
    };
    (
        cubic_hermite_basis(xi)[index],
        cubic_hermite_basis_first_derivatives(xi)[index],
    )
}

impl MeshStore for InMemoryMesh {
    fn max_node_id(&self) -> Option<NodeId> {
        self.nodes.keys().next_back().copied()
    }

    fn max_element_id(&self) -> Option<ElementId> {
        self.elements.keys().next_back().copied()
    }

    fn create_node(&mut self, id: NodeId, template: NodeTemplate) -> Result<NodeId, MeshStoreError> {
        if id.0 == 0 {
            return Err(MeshStoreError::ZeroId);
        }
        if self.nodes.contains_key(&id) {
            return Err(MeshStoreError::DuplicateNode(id));
        }
        self.nodes.insert(
            id,
            NodeRecord {
                template,
                parameters: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn set_node_derivative(
        &mut self,
        node: NodeId,
        label: ValueLabel,
        version: u32,
        value: Vec3,
    ) -> Result<(), MeshStoreError> {
        let record = self
            .nodes
            .get_mut(&node)
            .ok_or(MeshStoreError::UnknownNode(node))?;
        if version == 0 || version > record.template.versions(label) {
            return Err(MeshStoreError::MissingParameter {
                node,
                label,
                version,
            });
        }
        record.parameters.insert((label, version), value);
        Ok(())
    }

    fn create_element(
        &mut self,
        id: ElementId,
        template: Arc<ElementTemplate>,
    ) -> Result<ElementId, MeshStoreError> {
        if id.0 == 0 {
            return Err(MeshStoreError::ZeroId);
        }
        if self.elements.contains_key(&id) {
            return Err(MeshStoreError::DuplicateElement(id));
        }
        self.elements.insert(
            id,
            ElementRecord {
                template,
                nodes: Vec::new(),
                scale_factors: Vec::new(),
            },
        );
        Ok(id)
    }

    fn set_element_nodes(&mut self, element: ElementId, nodes: &[NodeId]) -> Result<(), MeshStoreError> {
        let record = self
            .elements
            .get(&element)
            .ok_or(MeshStoreError::UnknownElement(element))?;
        let expected = record.template.local_nodes_count();
        if nodes.len() != expected {
            return Err(MeshStoreError::NodeCountMismatch {
                element,
                expected,
                found: nodes.len(),
            });
        }
        for (local_node, label, version) in record.template.node_parameters() {
            let node = nodes[local_node];
            let declared = self
                .nodes
                .get(&node)
                .ok_or(MeshStoreError::UnknownNode(node))?
                .template
                .versions(label);
            if version > declared {
                return Err(MeshStoreError::MissingParameter {
                    node,
                    label,
                    version,
                });
            }
        }
        if let Some(record) = self.elements.get_mut(&element) {
            record.nodes = nodes.to_vec();
        }
        Ok(())
    }

    fn set_element_scale_factors(
        &mut self,
        element: ElementId,
        values: &[f64],
    ) -> Result<(), MeshStoreError> {
        let record = self
            .elements
            .get_mut(&element)
            .ok_or(MeshStoreError::UnknownElement(element))?;
        let expected = record.template.scale_factors().len();
        if values.len() != expected {
            return Err(MeshStoreError::ScaleFactorCountMismatch {
                element,
                expected,
                found: values.len(),
            });
        }
        record.scale_factors = values.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube(mesh: &mut InMemoryMesh) -> ElementId {
        for corner in 0..8u32 {
            let id = NodeId(corner + 1);
            mesh.create_node(id, NodeTemplate::tricubic()).unwrap();
            let x = Vec3::new(
                f64::from(corner & 1),
                f64::from((corner >> 1) & 1),
                f64::from((corner >> 2) & 1),
            );
            mesh.set_node_derivative(id, ValueLabel::Value, 1, x).unwrap();
            mesh.set_node_derivative(id, ValueLabel::D1, 1, Vec3::X).unwrap();
            mesh.set_node_derivative(id, ValueLabel::D2, 1, Vec3::Y).unwrap();
            mesh.set_node_derivative(id, ValueLabel::D3, 1, Vec3::Z).unwrap();
        }
        let element = ElementId(1);
        mesh.create_element(element, Arc::new(ElementTemplate::standard())).unwrap();
        let nodes: Vec<NodeId> = (1..=8).map(NodeId).collect();
        mesh.set_element_nodes(element, &nodes).unwrap();
        mesh.set_element_scale_factors(element, &[]).unwrap();
        element
    }

    #[test]
    fn test_evaluate_unit_cube_is_identity() {
        let mut mesh = InMemoryMesh::new();
        let element = unit_cube(&mut mesh);
        mesh.validate().expect("complete cube");
        let sample = mesh.evaluate(element, [0.25, 0.5, 0.75]).unwrap();
        assert!((sample.x - Vec3::new(0.25, 0.5, 0.75)).length() < 1e-12);
        assert!((sample.dxi[0] - Vec3::X).length() < 1e-12);
        assert!((sample.dxi[2] - Vec3::Z).length() < 1e-12);
    }

    #[test]
    fn test_duplicate_and_unknown_ids_rejected() {
        let mut mesh = InMemoryMesh::new();
        mesh.create_node(NodeId(1), NodeTemplate::tricubic()).unwrap();
        assert_eq!(
            mesh.create_node(NodeId(1), NodeTemplate::tricubic()),
            Err(MeshStoreError::DuplicateNode(NodeId(1)))
        );
        assert_eq!(
            mesh.create_node(NodeId(0), NodeTemplate::tricubic()),
            Err(MeshStoreError::ZeroId)
        );
        assert_eq!(
            mesh.set_node_derivative(NodeId(2), ValueLabel::Value, 1, Vec3::ZERO),
            Err(MeshStoreError::UnknownNode(NodeId(2)))
        );
    }

    #[test]
    fn test_undeclared_version_rejected() {
        let mut mesh = InMemoryMesh::new();
        mesh.create_node(NodeId(1), NodeTemplate::tricubic()).unwrap();
        let err = mesh
            .set_node_derivative(NodeId(1), ValueLabel::D2, 2, Vec3::X)
            .unwrap_err();
        assert_eq!(
            err,
            MeshStoreError::MissingParameter {
                node: NodeId(1),
                label: ValueLabel::D2,
                version: 2
            }
        );
        let template = NodeTemplate::tricubic().with_versions(ValueLabel::D2, 2);
        mesh.create_node(NodeId(2), template).unwrap();
        assert!(mesh.set_node_derivative(NodeId(2), ValueLabel::D2, 2, Vec3::X).is_ok());
    }

    #[test]
    fn test_element_node_count_checked() {
        let mut mesh = InMemoryMesh::new();
        mesh.create_element(ElementId(1), Arc::new(ElementTemplate::standard())).unwrap();
        let err = mesh.set_element_nodes(ElementId(1), &[NodeId(1)]).unwrap_err();
        assert_eq!(
            err,
            MeshStoreError::NodeCountMismatch {
                element: ElementId(1),
                expected: 8,
                found: 1
            }
        );
        assert_eq!(mesh.validate(), Err(MeshStoreError::ElementNodesUnset(ElementId(1))));
    }
}
