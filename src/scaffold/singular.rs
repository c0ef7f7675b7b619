//! Templates for elements that do not map one-to-one onto 8 distinct nodes:
//! apex collapses, junction seams with flipped derivative directions, and
//! 1:2 hanging-node transitions.
//!
//! Local directions are `xi1` around, `xi2` along (or up) and `xi3` through
//! the wall, matching the regular grid.

use std::f64::consts::TAU;
use std::sync::Arc;

use super::cache::{TemplateCache, TemplateCacheStats, TemplateKey};
use super::template::{
    ElementTemplate, LabelTerm, ScaleFactor, ScaleLabel, TemplateBuilder, TemplateError,
    TemplateKind, ValueLabel,
};

/// Which end of the `xi2` direction collapses onto the apex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pole {
    /// Apex at `xi2 = 0`.
    Bottom,
    /// Apex at `xi2 = 1`.
    Top,
}

impl Pole {
    /// Local node numbers of the apex on the inner and outer layer.
    #[must_use]
    pub const fn apex_local_nodes(self) -> [usize; 2] {
        match self {
            Self::Bottom => [0, 3],
            Self::Top => [2, 5],
        }
    }

    const fn collapsed_corners(self, layer: usize) -> [usize; 2] {
        match self {
            Self::Bottom => [4 * layer, 4 * layer + 1],
            Self::Top => [4 * layer + 2, 4 * layer + 3],
        }
    }

    const fn local_node_map(self) -> [usize; 8] {
        match self {
            Self::Bottom => [0, 0, 1, 2, 3, 3, 4, 5],
            Self::Top => [0, 1, 2, 2, 3, 4, 5, 5],
        }
    }
}

/// Which corner of the `xi2 = 0` edge is the midside node of a coarse edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HangingCorner {
    /// The `xi1 = 0` corner hangs; the `xi1 = 1` corner is the coarse end node.
    Start,
    /// The `xi1 = 1` corner hangs; the `xi1 = 0` corner is the coarse start node.
    End,
}

/// Apex collapse onto a 6-node wedge.
///
/// At the apex the local around derivative vanishes, and the local along
/// derivative of the element edge at angle `θ` is rebuilt from the apex
/// node's two derivatives, `sin θ · D1 + cos θ · D2` (negated for a top apex,
/// where `xi2` runs into the pole). The cross derivative d12 follows by
/// differentiating in `θ`. `start_version` and `end_version` select the
/// per-node `(sin, cos, arc)` triples of the element's two edges.
///
/// # Errors
/// Returns an error if the resulting template fails validation.
pub fn pole_template(
    pole: Pole,
    start_version: u32,
    end_version: u32,
) -> Result<ElementTemplate, TemplateError> {
    let kind = match pole {
        Pole::Bottom => TemplateKind::PoleBottom,
        Pole::Top => TemplateKind::PoleTop,
    };
    let mut builder = TemplateBuilder::tricubic(kind);
    builder.scale_factor(ScaleFactor::MINUS_ONE);
    let apex_nodes = pole.apex_local_nodes();

    for layer in 0..2 {
        let apex = apex_nodes[layer];
        let corners = pole.collapsed_corners(layer);
        for (corner, version) in [(corners[0], start_version), (corners[1], end_version)] {
            let factor = |label| ScaleFactor::NodeVersion {
                node: apex,
                label,
                version,
            };
            let (sin, cos, arc) = (
                factor(ScaleLabel::Sine),
                factor(ScaleLabel::Cosine),
                factor(ScaleLabel::Arc),
            );
            let minus = ScaleFactor::MINUS_ONE;
            builder.clear_function(corner, ValueLabel::D1);
            let (d2, d12) = match pole {
                Pole::Bottom => (
                    [
                        LabelTerm::new(ValueLabel::D1).scaled(&[sin]),
                        LabelTerm::new(ValueLabel::D2).scaled(&[cos]),
                    ],
                    [
                        LabelTerm::new(ValueLabel::D1).scaled(&[cos, arc]),
                        LabelTerm::new(ValueLabel::D2).scaled(&[minus, sin, arc]),
                    ],
                ),
                Pole::Top => (
                    [
                        LabelTerm::new(ValueLabel::D1).scaled(&[minus, sin]),
                        LabelTerm::new(ValueLabel::D2).scaled(&[minus, cos]),
                    ],
                    [
                        LabelTerm::new(ValueLabel::D1).scaled(&[minus, cos, arc]),
                        LabelTerm::new(ValueLabel::D2).scaled(&[sin, arc]),
                    ],
                ),
            };
            let d2: Vec<(usize, LabelTerm)> = d2.into_iter().map(|t| (corner, t)).collect();
            let d12: Vec<(usize, LabelTerm)> = d12.into_iter().map(|t| (corner, t)).collect();
            builder.set_function(corner, ValueLabel::D2, &d2);
            builder.set_function(corner, ValueLabel::D12, &d12);
        }
    }
    builder.remap_local_nodes(6, &pole.local_node_map());
    builder.build()
}

/// Makes one corner of the `xi2 = 0` edge, on both layers, the midpoint of
/// the coarse edge between local nodes `4L` and `4L + 1`.
///
/// The hanging corner takes the cubic Hermite value and `xi1` derivative of
/// the coarse edge at its midpoint, halved to the fine element's span, and
/// the mean of the two coarse nodes' d2 and d3. The other corner keeps its
/// node but its d1 is halved.
pub fn apply_hanging_xi1(builder: &mut TemplateBuilder, hanging: HangingCorner) {
    let half = ScaleFactor::HALF;
    let eighth = ScaleFactor::EIGHTH;
    let three_quarters = ScaleFactor::THREE_QUARTERS;
    let minus = ScaleFactor::MINUS_ONE;
    for layer in 0..2 {
        let (start, end) = (4 * layer, 4 * layer + 1);
        let (hang, other) = match hanging {
            HangingCorner::Start => (start, end),
            HangingCorner::End => (end, start),
        };
        builder.set_function(other, ValueLabel::D1, &[(other, LabelTerm::new(ValueLabel::D1).scaled(&[half]))]);
        builder.set_function(
            hang,
            ValueLabel::Value,
            &[
                (start, LabelTerm::new(ValueLabel::Value).scaled(&[half])),
                (start, LabelTerm::new(ValueLabel::D1).scaled(&[eighth])),
                (end, LabelTerm::new(ValueLabel::Value).scaled(&[half])),
                (end, LabelTerm::new(ValueLabel::D1).scaled(&[minus, eighth])),
            ],
        );
        builder.set_function(
            hang,
            ValueLabel::D1,
            &[
                (start, LabelTerm::new(ValueLabel::Value).scaled(&[minus, three_quarters])),
                (start, LabelTerm::new(ValueLabel::D1).scaled(&[minus, eighth])),
                (end, LabelTerm::new(ValueLabel::Value).scaled(&[three_quarters])),
                (end, LabelTerm::new(ValueLabel::D1).scaled(&[minus, eighth])),
            ],
        );
        for label in [ValueLabel::D2, ValueLabel::D3] {
            builder.set_function(
                hang,
                label,
                &[
                    (start, LabelTerm::new(label).scaled(&[half])),
                    (end, LabelTerm::new(label).scaled(&[half])),
                ],
            );
        }
    }
}

/// Template for an element whose `xi2 = 1` face lies on a seam ring and/or
/// whose `xi2 = 0` face is refined 1:2 against a coarse ring.
///
/// With `end_reversed` the seam ring runs the opposite way around and along,
/// so local d1 and d2 on the `xi2 = 1` nodes read `-D1` and `-D2`.
///
/// # Errors
/// Returns an error if the resulting template fails validation.
pub fn junction_template(
    end_reversed: bool,
    hanging: Option<HangingCorner>,
) -> Result<ElementTemplate, TemplateError> {
    let kind = if hanging.is_some() {
        TemplateKind::Hanging
    } else {
        TemplateKind::Junction
    };
    let mut builder = TemplateBuilder::tricubic(kind);
    if end_reversed {
        let end_nodes = [2, 3, 6, 7];
        for label in [ValueLabel::D1, ValueLabel::D2] {
            builder.remap_label(
                &end_nodes,
                label,
                &[LabelTerm::new(label).scaled(&[ScaleFactor::MINUS_ONE])],
            );
        }
    }
    if let Some(corner) = hanging {
        apply_hanging_xi1(&mut builder, corner);
    }
    builder.build()
}

/// Template plus the element's scale factor values in slot order.
#[derive(Debug, Clone)]
pub struct SingularElement {
    pub template: Arc<ElementTemplate>,
    pub scale_factors: Vec<f64>,
}

/// Builds and memoizes every template the scaffold generators use.
#[derive(Debug, Default)]
pub struct SingularTopologyBuilder {
    cache: TemplateCache,
}

impl SingularTopologyBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cache_stats(&self) -> TemplateCacheStats {
        self.cache.stats()
    }

    /// The identity template shared by all regular elements.
    ///
    /// # Errors
    /// Never fails in practice; the signature matches the other builders.
    pub fn standard(&mut self) -> Result<Arc<ElementTemplate>, TemplateError> {
        self.cache
            .get_or_build(TemplateKey::Standard, || Ok(ElementTemplate::standard()))
    }

    /// Apex element `element_around` of `elements_count_around` meeting `pole`.
    ///
    /// # Errors
    /// Returns an error if the template fails validation.
    pub fn apex(
        &mut self,
        pole: Pole,
        element_around: usize,
        elements_count_around: usize,
    ) -> Result<SingularElement, TemplateError> {
        let count = elements_count_around.max(1);
        let start_version = version_of(element_around % count);
        let end_version = version_of((element_around + 1) % count);
        let key = TemplateKey::Pole {
            pole,
            start_version,
            end_version,
        };
        let template = self
            .cache
            .get_or_build(key, || pole_template(pole, start_version, end_version))?;
        let arc = TAU / count as f64;
        let scale_factors = template.scale_factor_values(|_, label, version| {
            let theta = f64::from(version - 1) * arc;
            match label {
                ScaleLabel::Sine => theta.sin(),
                ScaleLabel::Cosine => theta.cos(),
                ScaleLabel::Arc => arc,
            }
        })?;
        Ok(SingularElement {
            template,
            scale_factors,
        })
    }

    /// Seam or transition element; see [`junction_template`].
    ///
    /// # Errors
    /// Returns an error if the template fails validation.
    pub fn junction(
        &mut self,
        end_reversed: bool,
        hanging: Option<HangingCorner>,
    ) -> Result<SingularElement, TemplateError> {
        let key = TemplateKey::Junction {
            end_reversed,
            hanging,
        };
        let template = self
            .cache
            .get_or_build(key, || junction_template(end_reversed, hanging))?;
        let scale_factors = template.scale_factor_values(|_, _, _| 0.0)?;
        Ok(SingularElement {
            template,
            scale_factors,
        })
    }
}

fn version_of(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_pole_collapses_to_six_nodes() {
        let template = pole_template(Pole::Bottom, 1, 2).expect("bottom pole is valid");
        assert_eq!(template.local_nodes_count(), 6);
        assert_eq!(template.kind(), TemplateKind::PoleBottom);
        // -1 plus (sin, cos, arc) for two versions on two apex nodes.
        assert_eq!(template.scale_factors().len(), 13);
        assert_eq!(template.corner_node(0), Some(0));
        assert_eq!(template.corner_node(1), Some(0));
        assert_eq!(template.corner_node(2), Some(1));
        assert_eq!(template.corner_node(5), Some(3));
        assert!(template.function(0, ValueLabel::D1).is_empty());
        assert_eq!(template.function(1, ValueLabel::D2).len(), 2);
    }

    #[test]
    fn test_top_pole_collapses_to_six_nodes() {
        let template = pole_template(Pole::Top, 4, 1).expect("top pole is valid");
        assert_eq!(template.local_nodes_count(), 6);
        assert_eq!(template.corner_node(2), Some(2));
        assert_eq!(template.corner_node(3), Some(2));
        assert_eq!(template.corner_node(7), Some(5));
        assert!(template.function(7, ValueLabel::D1).is_empty());
    }

    #[test]
    fn test_apex_scale_factor_values() {
        let mut builder = SingularTopologyBuilder::new();
        let element = builder.apex(Pole::Bottom, 1, 4).expect("apex element");
        let values = &element.scale_factors;
        assert_eq!(values[0], -1.0);
        // First node triple is version 2, i.e. a quarter turn.
        assert!((values[1] - 1.0).abs() < 1e-12);
        assert!(values[2].abs() < 1e-12);
        assert!((values[3] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        builder.apex(Pole::Bottom, 1, 4).expect("cached apex element");
        assert_eq!(builder.cache_stats().hits, 1);
    }

    #[test]
    fn test_hanging_template_is_valid() {
        for corner in [HangingCorner::Start, HangingCorner::End] {
            let template = junction_template(false, Some(corner)).expect("hanging template");
            assert_eq!(template.kind(), TemplateKind::Hanging);
            assert_eq!(template.local_nodes_count(), 8);
        }
        let template = junction_template(true, Some(HangingCorner::End)).expect("reversed hanging");
        assert_eq!(template.corner_node(1), None);
        assert_eq!(template.corner_node(0), Some(0));
        assert_eq!(template.function(1, ValueLabel::Value).len(), 4);
    }

    #[test]
    fn test_reversed_junction_flips_end_derivatives() {
        let mut builder = SingularTopologyBuilder::new();
        let element = builder.junction(true, None).expect("reversed junction");
        assert_eq!(element.scale_factors, vec![-1.0]);
        let template = &element.template;
        assert_eq!(template.function(3, ValueLabel::D2)[0].scale_factors, vec![0]);
        assert!(template.function(3, ValueLabel::D3)[0].scale_factors.is_empty());
        assert!(template.function(1, ValueLabel::D2)[0].scale_factors.is_empty());
    }
}
