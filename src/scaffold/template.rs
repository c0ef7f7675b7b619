//! Element field templates.
//!
//! A template maps each of the 64 local basis functions of a tricubic Hermite
//! hexahedron (8 corners × 8 value labels) onto a sum of global node
//! parameters, each optionally multiplied by a product of scale factors.
//! Corners are numbered `i + 2j + 4k` for local `(xi1, xi2, xi3)` corner
//! coordinates `(i, j, k)`; local nodes are numbered from 0 and, for the
//! standard template, coincide with the corners.
//!
//! Templates are immutable once built. Construction goes through
//! [`TemplateBuilder`], whose `build` validates the mapping so a malformed
//! template is rejected before any element references it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Nodal parameter label: the value or one of its derivatives with respect
/// to the node's own `(s1, s2, s3)` directions.
///
/// The discriminant doubles as a bit mask: bit 0 is s1, bit 1 is s2, bit 2 is s3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueLabel {
    Value = 0,
    D1 = 1,
    D2 = 2,
    D12 = 3,
    D3 = 4,
    D13 = 5,
    D23 = 6,
    D123 = 7,
}

impl ValueLabel {
    pub const ALL: [Self; 8] = [
        Self::Value,
        Self::D1,
        Self::D2,
        Self::D12,
        Self::D3,
        Self::D13,
        Self::D23,
        Self::D123,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the label differentiates in local direction `direction` (0..3).
    #[must_use]
    pub const fn has_direction(self, direction: usize) -> bool {
        (self as usize >> direction) & 1 == 1
    }

    /// Mixed derivative labels, zero in the templates built here.
    #[must_use]
    pub const fn is_cross(self) -> bool {
        (self as usize).count_ones() > 1
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::D1 => "d1",
            Self::D2 => "d2",
            Self::D12 => "d12",
            Self::D3 => "d3",
            Self::D13 => "d13",
            Self::D23 => "d23",
            Self::D123 => "d123",
        }
    }
}

impl fmt::Display for ValueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Component of the per-node angular triple used around an apex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ScaleLabel {
    Sine,
    Cosine,
    /// Angle subtended by one element around the apex.
    Arc,
}

/// Named coefficient referenced by template terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ScaleFactor {
    /// Constant shared by every element using the template.
    General(u32),
    /// Coefficient attached to a local node and one of its derivative
    /// versions, e.g. the sine of that version's angle around an apex.
    NodeVersion {
        node: usize,
        label: ScaleLabel,
        version: u32,
    },
}

impl ScaleFactor {
    pub const MINUS_ONE: Self = Self::General(1);
    pub const HALF: Self = Self::General(2);
    pub const EIGHTH: Self = Self::General(3);
    pub const THREE_QUARTERS: Self = Self::General(4);

    /// Value of a general scale factor; node-version factors are per element.
    #[must_use]
    pub const fn general_value(id: u32) -> Option<f64> {
        match id {
            1 => Some(-1.0),
            2 => Some(0.5),
            3 => Some(0.125),
            4 => Some(0.75),
            _ => None,
        }
    }
}

/// One summand of a local basis function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub local_node: usize,
    pub label: ValueLabel,
    pub version: u32,
    /// Indices into the template's scale factor list, multiplied together.
    pub scale_factors: Vec<usize>,
}

/// A term awaiting slot resolution, used when editing through the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTerm {
    pub label: ValueLabel,
    pub version: u32,
    pub scale_factors: Vec<ScaleFactor>,
}

impl LabelTerm {
    #[must_use]
    pub fn new(label: ValueLabel) -> Self {
        Self {
            label,
            version: 1,
            scale_factors: Vec::new(),
        }
    }

    #[must_use]
    pub fn scaled(mut self, factors: &[ScaleFactor]) -> Self {
        self.scale_factors.extend_from_slice(factors);
        self
    }

    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// Kind of element a template was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TemplateKind {
    Standard,
    PoleBottom,
    PoleTop,
    Junction,
    Hanging,
}

impl TemplateKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::PoleBottom => "pole_bottom",
            Self::PoleTop => "pole_top",
            Self::Junction => "junction",
            Self::Hanging => "hanging",
        }
    }
}

/// Template validation failures.
///
/// `function` is 1-based: `corner * 8 + label + 1`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template must have 1 to 8 local nodes, got {count}")]
    LocalNodeCount { count: usize },

    #[error("function {function}: local node {local_node} is not below {count}")]
    LocalNodeOutOfRange {
        function: usize,
        local_node: usize,
        count: usize,
    },

    #[error("function {function}: scale factor slot {slot} is not below {count}")]
    ScaleFactorOutOfRange {
        function: usize,
        slot: usize,
        count: usize,
    },

    #[error("function {function}: version must be at least 1")]
    InvalidVersion { function: usize },

    #[error("function {function} is under-determined: {reason}")]
    Underdetermined { function: usize, reason: &'static str },

    #[error("function {function} is over-determined: {reason}")]
    Overdetermined { function: usize, reason: &'static str },

    #[error("function {function}: collapsed corner reads local node {local_node} differently from corner {corner}")]
    InconsistentCollapse {
        function: usize,
        local_node: usize,
        corner: usize,
    },

    #[error("local node {local_node} is never referenced")]
    UnusedLocalNode { local_node: usize },

    #[error("scale factor slot {slot} is never referenced")]
    UnusedScaleFactor { slot: usize },

    #[error("unknown general scale factor id {id}")]
    UnknownGeneralScaleFactor { id: u32 },
}

const CORNERS: usize = 8;
const FUNCTIONS: usize = CORNERS * 8;

const fn function_number(corner: usize, label: ValueLabel) -> usize {
    corner * 8 + label.index() + 1
}

/// Validated, immutable element field template.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementTemplate {
    kind: TemplateKind,
    local_nodes_count: usize,
    scale_factors: Vec<ScaleFactor>,
    functions: Vec<Vec<Term>>,
}

impl ElementTemplate {
    /// Identity mapping: each corner reads value, d1, d2 and d3 from its own
    /// node, version 1, unscaled. Cross derivatives are zero.
    #[must_use]
    pub fn standard() -> Self {
        let builder = TemplateBuilder::tricubic(TemplateKind::Standard);
        Self {
            kind: builder.kind,
            local_nodes_count: builder.local_nodes_count,
            scale_factors: builder.scale_factors,
            functions: builder.functions,
        }
    }

    #[must_use]
    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    #[must_use]
    pub fn local_nodes_count(&self) -> usize {
        self.local_nodes_count
    }

    #[must_use]
    pub fn scale_factors(&self) -> &[ScaleFactor] {
        &self.scale_factors
    }

    /// Terms of the basis function for `label` at `corner`.
    #[must_use]
    pub fn function(&self, corner: usize, label: ValueLabel) -> &[Term] {
        &self.functions[corner * 8 + label.index()]
    }

    /// Every `(local node, label, version)` the template reads.
    #[must_use]
    pub fn node_parameters(&self) -> BTreeSet<(usize, ValueLabel, u32)> {
        self.functions
            .iter()
            .flatten()
            .map(|term| (term.local_node, term.label, term.version))
            .collect()
    }

    /// Local node whose value a corner takes directly, or `None` for a blended
    /// corner such as a hanging node.
    #[must_use]
    pub fn corner_node(&self, corner: usize) -> Option<usize> {
        match self.function(corner, ValueLabel::Value) {
            [term] if term.scale_factors.is_empty() => Some(term.local_node),
            _ => None,
        }
    }

    /// Resolves scale factor values in slot order. General factors come from
    /// their constants, node factors from `node_value`.
    ///
    /// # Errors
    /// Returns an error for a general scale factor with no known value.
    pub fn scale_factor_values<F>(&self, mut node_value: F) -> Result<Vec<f64>, TemplateError>
    where
        F: FnMut(usize, ScaleLabel, u32) -> f64,
    {
        self.scale_factors
            .iter()
            .map(|factor| match *factor {
                ScaleFactor::General(id) => ScaleFactor::general_value(id)
                    .ok_or(TemplateError::UnknownGeneralScaleFactor { id }),
                ScaleFactor::NodeVersion {
                    node,
                    label,
                    version,
                } => Ok(node_value(node, label, version)),
            })
            .collect()
    }
}

/// Mutable template under construction.
///
/// Edits address terms by local node number; they are meant to be applied
/// before [`remap_local_nodes`](Self::remap_local_nodes), while local nodes
/// still coincide with corners.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    kind: TemplateKind,
    local_nodes_count: usize,
    scale_factors: Vec<ScaleFactor>,
    functions: Vec<Vec<Term>>,
}

impl TemplateBuilder {
    /// Starts from the standard identity mapping.
    #[must_use]
    pub fn tricubic(kind: TemplateKind) -> Self {
        let mut functions = vec![Vec::new(); FUNCTIONS];
        for corner in 0..CORNERS {
            for label in ValueLabel::ALL {
                if !label.is_cross() {
                    functions[corner * 8 + label.index()].push(Term {
                        local_node: corner,
                        label,
                        version: 1,
                        scale_factors: Vec::new(),
                    });
                }
            }
        }
        Self {
            kind,
            local_nodes_count: CORNERS,
            scale_factors: Vec::new(),
            functions,
        }
    }

    /// Slot for `factor`, appending it on first use.
    pub fn scale_factor(&mut self, factor: ScaleFactor) -> usize {
        if let Some(slot) = self.scale_factors.iter().position(|f| *f == factor) {
            return slot;
        }
        self.scale_factors.push(factor);
        self.scale_factors.len() - 1
    }

    fn resolve(&mut self, local_node: usize, term: &LabelTerm) -> Term {
        let scale_factors = term
            .scale_factors
            .iter()
            .map(|factor| self.scale_factor(*factor))
            .collect();
        Term {
            local_node,
            label: term.label,
            version: term.version,
            scale_factors,
        }
    }

    /// Replaces the function for `label` at `corner` with explicit terms.
    pub fn set_function(&mut self, corner: usize, label: ValueLabel, terms: &[(usize, LabelTerm)]) {
        let resolved = terms
            .iter()
            .map(|(local_node, term)| self.resolve(*local_node, term))
            .collect();
        self.functions[corner * 8 + label.index()] = resolved;
    }

    /// Makes the function for `label` at `corner` identically zero.
    pub fn clear_function(&mut self, corner: usize, label: ValueLabel) {
        self.functions[corner * 8 + label.index()].clear();
    }

    /// Rewrites every function that is a single unscaled `from` term on one of
    /// `local_nodes` into the expansion `to` on the same node.
    ///
    /// An empty expansion removes the term, making the function zero.
    pub fn remap_label(&mut self, local_nodes: &[usize], from: ValueLabel, to: &[LabelTerm]) {
        for f in 0..FUNCTIONS {
            let target = match self.functions[f].as_slice() {
                [term]
                    if term.label == from
                        && term.scale_factors.is_empty()
                        && local_nodes.contains(&term.local_node) =>
                {
                    term.local_node
                }
                _ => continue,
            };
            let expansion = to.iter().map(|term| self.resolve(target, term)).collect();
            self.functions[f] = expansion;
        }
    }

    /// Multiplies every term reading `labels` on `local_nodes` by `factors`.
    pub fn scale_labels(&mut self, local_nodes: &[usize], labels: &[ValueLabel], factors: &[ScaleFactor]) {
        let slots: Vec<usize> = factors.iter().map(|f| self.scale_factor(*f)).collect();
        for term in self.functions.iter_mut().flatten() {
            if local_nodes.contains(&term.local_node) && labels.contains(&term.label) {
                term.scale_factors.extend_from_slice(&slots);
            }
        }
    }

    /// Renumbers local nodes through `map` (old number to new) and sets the
    /// new local node count, merging corners that map to the same node.
    pub fn remap_local_nodes(&mut self, count: usize, map: &[usize]) {
        for term in self.functions.iter_mut().flatten() {
            if let Some(&mapped) = map.get(term.local_node) {
                term.local_node = mapped;
            }
        }
        self.local_nodes_count = count;
    }

    /// Validates and freezes the template.
    ///
    /// # Errors
    /// Returns the first structural problem found: a local node or scale
    /// factor slot out of range, a version below 1, a corner whose value is
    /// not determined by any value term, a duplicated term or a derivative
    /// reading node values at a corner that is not blended, two corners
    /// taking one local node's value in different ways, and local nodes or
    /// scale factors that nothing references.
    pub fn build(self) -> Result<ElementTemplate, TemplateError> {
        if self.local_nodes_count == 0 || self.local_nodes_count > CORNERS {
            return Err(TemplateError::LocalNodeCount {
                count: self.local_nodes_count,
            });
        }
        let mut used_nodes = vec![false; self.local_nodes_count];
        let mut used_slots = vec![false; self.scale_factors.len()];

        for corner in 0..CORNERS {
            let value_terms = &self.functions[corner * 8];
            let blended = value_terms.len() > 1;
            for label in ValueLabel::ALL {
                let function = function_number(corner, label);
                let terms = &self.functions[corner * 8 + label.index()];
                for (t, term) in terms.iter().enumerate() {
                    if term.local_node >= self.local_nodes_count {
                        return Err(TemplateError::LocalNodeOutOfRange {
                            function,
                            local_node: term.local_node,
                            count: self.local_nodes_count,
                        });
                    }
                    if term.version < 1 {
                        return Err(TemplateError::InvalidVersion { function });
                    }
                    for &slot in &term.scale_factors {
                        if slot >= self.scale_factors.len() {
                            return Err(TemplateError::ScaleFactorOutOfRange {
                                function,
                                slot,
                                count: self.scale_factors.len(),
                            });
                        }
                        used_slots[slot] = true;
                    }
                    if terms[..t].contains(term) {
                        return Err(TemplateError::Overdetermined {
                            function,
                            reason: "duplicate term",
                        });
                    }
                    if label != ValueLabel::Value && term.label == ValueLabel::Value && !blended {
                        return Err(TemplateError::Overdetermined {
                            function,
                            reason: "derivative reads a node value at an unblended corner",
                        });
                    }
                    if label == ValueLabel::Value || term.label == ValueLabel::Value {
                        used_nodes[term.local_node] = true;
                    }
                }
                if label == ValueLabel::Value
                    && !terms.iter().any(|term| term.label == ValueLabel::Value)
                {
                    return Err(TemplateError::Underdetermined {
                        function,
                        reason: "corner value has no value term",
                    });
                }
            }
        }

        self.check_collapsed_values()?;
        if let Some(local_node) = used_nodes.iter().position(|used| !used) {
            return Err(TemplateError::UnusedLocalNode { local_node });
        }
        if let Some(slot) = used_slots.iter().position(|used| !used) {
            return Err(TemplateError::UnusedScaleFactor { slot });
        }
        Ok(ElementTemplate {
            kind: self.kind,
            local_nodes_count: self.local_nodes_count,
            scale_factors: self.scale_factors,
            functions: self.functions,
        })
    }

    /// Corners whose value is a single term on the same local node must read
    /// it identically. Blended corners are exempt.
    fn check_collapsed_values(&self) -> Result<(), TemplateError> {
        let mut first: Vec<Option<(usize, &Term)>> = vec![None; self.local_nodes_count];
        for corner in 0..CORNERS {
            let [term] = self.functions[corner * 8].as_slice() else {
                continue;
            };
            match first[term.local_node] {
                None => first[term.local_node] = Some((corner, term)),
                Some((other, seen)) if seen != term => {
                    return Err(TemplateError::InconsistentCollapse {
                        function: function_number(corner, ValueLabel::Value),
                        local_node: term.local_node,
                        corner: other,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_template_is_identity() {
        let template = ElementTemplate::standard();
        assert_eq!(template.local_nodes_count(), 8);
        assert!(template.scale_factors().is_empty());
        for corner in 0..8 {
            assert_eq!(template.corner_node(corner), Some(corner));
            assert!(template.function(corner, ValueLabel::D12).is_empty());
            let d3 = template.function(corner, ValueLabel::D3);
            assert_eq!(d3.len(), 1);
            assert_eq!(d3[0].label, ValueLabel::D3);
        }
        assert_eq!(TemplateBuilder::tricubic(TemplateKind::Standard).build(), Ok(template));
    }

    #[test]
    fn test_label_bits() {
        assert!(ValueLabel::D13.has_direction(0));
        assert!(!ValueLabel::D13.has_direction(1));
        assert!(ValueLabel::D13.has_direction(2));
        assert!(ValueLabel::D23.is_cross());
        assert!(!ValueLabel::D3.is_cross());
    }

    #[test]
    fn test_remap_label_with_sign_flip() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::Junction);
        builder.remap_label(
            &[2, 3],
            ValueLabel::D1,
            &[LabelTerm::new(ValueLabel::D1).scaled(&[ScaleFactor::MINUS_ONE])],
        );
        let template = builder.build().expect("sign flip template is valid");
        assert_eq!(template.scale_factors(), &[ScaleFactor::MINUS_ONE]);
        assert_eq!(template.function(2, ValueLabel::D1)[0].scale_factors, vec![0]);
        assert!(template.function(0, ValueLabel::D1)[0].scale_factors.is_empty());
        assert_eq!(template.scale_factor_values(|_, _, _| 0.0), Ok(vec![-1.0]));
    }

    #[test]
    fn test_missing_value_term_is_underdetermined() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::Standard);
        builder.clear_function(5, ValueLabel::Value);
        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            TemplateError::Underdetermined {
                function: 41,
                reason: "corner value has no value term"
            }
        );
    }

    #[test]
    fn test_duplicate_term_is_overdetermined() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::Standard);
        builder.set_function(
            1,
            ValueLabel::D2,
            &[(1, LabelTerm::new(ValueLabel::D2)), (1, LabelTerm::new(ValueLabel::D2))],
        );
        let err = builder.build().unwrap_err();
        assert!(matches!(err, TemplateError::Overdetermined { function: 11, .. }));
    }

    #[test]
    fn test_derivative_reading_value_is_overdetermined() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::Standard);
        builder.set_function(0, ValueLabel::D1, &[(1, LabelTerm::new(ValueLabel::Value))]);
        assert!(matches!(
            builder.build(),
            Err(TemplateError::Overdetermined { function: 2, .. })
        ));
    }

    #[test]
    fn test_out_of_range_local_node() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::Standard);
        builder.remap_local_nodes(6, &[0, 0, 1, 2, 3, 3, 4, 5]);
        builder.set_function(7, ValueLabel::D3, &[(6, LabelTerm::new(ValueLabel::D3))]);
        assert!(matches!(
            builder.build(),
            Err(TemplateError::LocalNodeOutOfRange {
                function: 61,
                local_node: 6,
                count: 6
            })
        ));
    }

    #[test]
    fn test_collapsed_corners_must_agree_on_value() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::PoleBottom);
        builder.remap_local_nodes(7, &[0, 0, 1, 2, 3, 4, 5, 6]);
        builder.set_function(
            1,
            ValueLabel::Value,
            &[(0, LabelTerm::new(ValueLabel::Value).scaled(&[ScaleFactor::MINUS_ONE]))],
        );
        assert_eq!(
            builder.build(),
            Err(TemplateError::InconsistentCollapse {
                function: 9,
                local_node: 0,
                corner: 0
            })
        );

        let mut versioned = TemplateBuilder::tricubic(TemplateKind::PoleBottom);
        versioned.remap_local_nodes(7, &[0, 0, 1, 2, 3, 4, 5, 6]);
        versioned.set_function(1, ValueLabel::Value, &[(0, LabelTerm::new(ValueLabel::Value).version(2))]);
        assert!(matches!(
            versioned.build(),
            Err(TemplateError::InconsistentCollapse { local_node: 0, .. })
        ));

        let mut agreeing = TemplateBuilder::tricubic(TemplateKind::PoleBottom);
        agreeing.remap_local_nodes(7, &[0, 0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(agreeing.build().map(|t| t.local_nodes_count()), Ok(7));
    }

    #[test]
    fn test_unused_scale_factor_rejected() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::Standard);
        builder.scale_factor(ScaleFactor::HALF);
        assert_eq!(builder.build(), Err(TemplateError::UnusedScaleFactor { slot: 0 }));
    }

    #[test]
    fn test_unknown_general_scale_factor() {
        let mut builder = TemplateBuilder::tricubic(TemplateKind::Standard);
        builder.scale_labels(&[0], &[ValueLabel::D1], &[ScaleFactor::General(99)]);
        let template = builder.build().expect("slot is referenced");
        assert_eq!(
            template.scale_factor_values(|_, _, _| 1.0),
            Err(TemplateError::UnknownGeneralScaleFactor { id: 99 })
        );
    }
}
