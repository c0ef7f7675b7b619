//! Typed option records for the scaffold generators.
//!
//! Every record deserializes with `#[serde(default)]`, so a partial JSON map
//! fills in the documented defaults. Out-of-range values are never an error:
//! `checked()` clamps each field to its nearest valid value and returns a note
//! per change. All clamp rules live in this module.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One option value that was clamped to its valid range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionRepair {
    pub option: &'static str,
    pub requested: f64,
    pub applied: f64,
}

impl fmt::Display for OptionRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "option `{}` clamped from {} to {}",
            self.option, self.requested, self.applied
        )
    }
}

fn clamp_count(option: &'static str, value: &mut usize, min: usize, repairs: &mut Vec<OptionRepair>) {
    if *value < min {
        repairs.push(OptionRepair {
            option,
            requested: *value as f64,
            applied: min as f64,
        });
        *value = min;
    }
}

fn clamp_value(
    option: &'static str,
    value: &mut f64,
    min: f64,
    max: f64,
    repairs: &mut Vec<OptionRepair>,
) {
    let applied = if value.is_nan() { min } else { value.clamp(min, max) };
    if applied != *value {
        repairs.push(OptionRepair {
            option,
            requested: *value,
            applied,
        });
        *value = applied;
    }
}

/// Clamps a local wall thickness to the local inner radius, i.e. half the
/// inner diameter at that ring.
pub(crate) fn clamp_thickness_to_radius(
    thickness: f64,
    radius: f64,
    repairs: &mut Vec<OptionRepair>,
) -> f64 {
    if thickness > radius {
        repairs.push(OptionRepair {
            option: "wall_thickness",
            requested: thickness,
            applied: radius,
        });
        radius
    } else {
        thickness
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tube
// ─────────────────────────────────────────────────────────────────────────────

/// Options for a single tube along a central path.
///
/// | field | default | valid range |
/// |---|---|---|
/// | `elements_count_around` | 8 | ≥ 3 |
/// | `elements_count_along` | 4 | ≥ 1 |
/// | `elements_count_through_wall` | 1 | ≥ 1 |
/// | `wall_thickness` | 0.1 | ≥ 0, and at most the local inner radius |
/// | `wall_thickness_end` | none | as `wall_thickness` |
/// | `relative_thicknesses` | empty | one non-negative entry per layer |
/// | `element_length_start_end_ratio` | 1.0 | ≥ 1e-6 |
/// | `ellipse_ratio_start`, `ellipse_ratio_end` | 1.0 | 0.01 ..= 100 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TubeOptions {
    pub elements_count_around: usize,
    pub elements_count_along: usize,
    pub elements_count_through_wall: usize,
    /// Wall thickness at the start of the path.
    pub wall_thickness: f64,
    /// Wall thickness at the end of the path; constant when absent.
    pub wall_thickness_end: Option<f64>,
    /// Per-layer fractions of the wall, normalised to sum to one. Empty
    /// means equal layers.
    pub relative_thicknesses: Vec<f64>,
    pub element_length_start_end_ratio: f64,
    /// Minor over major radius of the cross-section at the path start.
    pub ellipse_ratio_start: f64,
    pub ellipse_ratio_end: f64,
    /// Collapse the first ring to a single apex node per layer.
    pub closed_proximal_end: bool,
}

impl Default for TubeOptions {
    fn default() -> Self {
        Self {
            elements_count_around: 8,
            elements_count_along: 4,
            elements_count_through_wall: 1,
            wall_thickness: 0.1,
            wall_thickness_end: None,
            relative_thicknesses: Vec::new(),
            element_length_start_end_ratio: 1.0,
            ellipse_ratio_start: 1.0,
            ellipse_ratio_end: 1.0,
            closed_proximal_end: false,
        }
    }
}

impl TubeOptions {
    /// Clamps every field into its valid range.
    #[must_use]
    /// Takes the around count from a caller-supplied profile, clamped like
    /// the option itself.
    pub(crate) fn set_profile_points_count(&mut self, count: usize, repairs: &mut Vec<OptionRepair>) {
        self.elements_count_around = count;
        clamp_count("elements_count_around", &mut self.elements_count_around, 3, repairs);
    }

    pub fn checked(mut self) -> (Self, Vec<OptionRepair>) {
        let mut repairs = Vec::new();
        clamp_count("elements_count_around", &mut self.elements_count_around, 3, &mut repairs);
        clamp_count("elements_count_along", &mut self.elements_count_along, 1, &mut repairs);
        clamp_count(
            "elements_count_through_wall",
            &mut self.elements_count_through_wall,
            1,
            &mut repairs,
        );
        clamp_value("wall_thickness", &mut self.wall_thickness, 0.0, f64::MAX, &mut repairs);
        if let Some(end) = self.wall_thickness_end.as_mut() {
            clamp_value("wall_thickness_end", end, 0.0, f64::MAX, &mut repairs);
        }
        clamp_value(
            "element_length_start_end_ratio",
            &mut self.element_length_start_end_ratio,
            1.0e-6,
            f64::MAX,
            &mut repairs,
        );
        clamp_value("ellipse_ratio_start", &mut self.ellipse_ratio_start, 0.01, 100.0, &mut repairs);
        clamp_value("ellipse_ratio_end", &mut self.ellipse_ratio_end, 0.01, 100.0, &mut repairs);

        if !self.relative_thicknesses.is_empty() {
            if self.relative_thicknesses.len() != self.elements_count_through_wall {
                repairs.push(OptionRepair {
                    option: "relative_thicknesses",
                    requested: self.relative_thicknesses.len() as f64,
                    applied: 0.0,
                });
                self.relative_thicknesses.clear();
            } else {
                for fraction in &mut self.relative_thicknesses {
                    clamp_value("relative_thicknesses", fraction, 0.0, f64::MAX, &mut repairs);
                }
                if self.relative_thicknesses.iter().sum::<f64>() <= 0.0 {
                    self.relative_thicknesses.clear();
                }
            }
        }
        (self, repairs)
    }

    /// Layer fractions through the wall, summing to one.
    #[must_use]
    pub fn layer_fractions(&self) -> Vec<f64> {
        let layers = self.elements_count_through_wall.max(1);
        let total: f64 = self.relative_thicknesses.iter().sum();
        if self.relative_thicknesses.len() == layers && total > 0.0 {
            self.relative_thicknesses.iter().map(|f| f / total).collect()
        } else {
            vec![1.0 / layers as f64; layers]
        }
    }

    /// Wall thickness at path fraction `xi`, interpolated linearly.
    #[must_use]
    pub fn wall_thickness_at(&self, xi: f64) -> f64 {
        let end = self.wall_thickness_end.unwrap_or(self.wall_thickness);
        self.wall_thickness * (1.0 - xi) + end * xi
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sphere shell
// ─────────────────────────────────────────────────────────────────────────────

/// Options for the closed sphere shell with an apex at each pole.
///
/// | field | default | valid range |
/// |---|---|---|
/// | `elements_count_around` | 4 | ≥ 2 |
/// | `elements_count_up` | 4 | ≥ 2 |
/// | `elements_count_through_wall` | 1 | ≥ 1 |
/// | `exclude_bottom_rows`, `exclude_top_rows` | 0 | ≥ 0, leaving one row |
/// | `wall_thickness` | 0.25 | 0 ..= 0.5 |
/// | `wall_thickness_ratio_apex` | 1.0 | ≥ 0 |
/// | `length_ratio` | 1.0 | ≥ 1e-6 |
/// | `element_length_ratio_equator_apex` | 1.0 | ≥ 1e-6 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereShellOptions {
    pub elements_count_around: usize,
    pub elements_count_up: usize,
    pub elements_count_through_wall: usize,
    pub exclude_bottom_rows: usize,
    pub exclude_top_rows: usize,
    pub wall_thickness: f64,
    pub wall_thickness_ratio_apex: f64,
    /// Polar over equatorial outer radius.
    pub length_ratio: f64,
    pub element_length_ratio_equator_apex: f64,
}

impl Default for SphereShellOptions {
    fn default() -> Self {
        Self {
            elements_count_around: 4,
            elements_count_up: 4,
            elements_count_through_wall: 1,
            exclude_bottom_rows: 0,
            exclude_top_rows: 0,
            wall_thickness: 0.25,
            wall_thickness_ratio_apex: 1.0,
            length_ratio: 1.0,
            element_length_ratio_equator_apex: 1.0,
        }
    }
}

impl SphereShellOptions {
    #[must_use]
    pub fn checked(mut self) -> (Self, Vec<OptionRepair>) {
        let mut repairs = Vec::new();
        clamp_count("elements_count_around", &mut self.elements_count_around, 2, &mut repairs);
        clamp_count("elements_count_up", &mut self.elements_count_up, 2, &mut repairs);
        clamp_count(
            "elements_count_through_wall",
            &mut self.elements_count_through_wall,
            1,
            &mut repairs,
        );
        let max_excluded = self.elements_count_up - 1;
        if self.exclude_top_rows > max_excluded {
            repairs.push(OptionRepair {
                option: "exclude_top_rows",
                requested: self.exclude_top_rows as f64,
                applied: max_excluded as f64,
            });
            self.exclude_top_rows = max_excluded;
        }
        let max_bottom = max_excluded - self.exclude_top_rows;
        if self.exclude_bottom_rows > max_bottom {
            repairs.push(OptionRepair {
                option: "exclude_bottom_rows",
                requested: self.exclude_bottom_rows as f64,
                applied: max_bottom as f64,
            });
            self.exclude_bottom_rows = max_bottom;
        }
        clamp_value("wall_thickness", &mut self.wall_thickness, 0.0, 0.5, &mut repairs);
        clamp_value(
            "wall_thickness_ratio_apex",
            &mut self.wall_thickness_ratio_apex,
            0.0,
            f64::MAX,
            &mut repairs,
        );
        clamp_value("length_ratio", &mut self.length_ratio, 1.0e-6, f64::MAX, &mut repairs);
        clamp_value(
            "element_length_ratio_equator_apex",
            &mut self.element_length_ratio_equator_apex,
            1.0e-6,
            f64::MAX,
            &mut repairs,
        );
        (self, repairs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Junction
// ─────────────────────────────────────────────────────────────────────────────

/// Options for stitching one tube end onto another.
///
/// | field | default | valid range |
/// |---|---|---|
/// | `elements_count_radial` | 1 | ≥ 1 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JunctionOptions {
    /// Element rows between the two rings.
    pub elements_count_radial: usize,
}

impl Default for JunctionOptions {
    fn default() -> Self {
        Self {
            elements_count_radial: 1,
        }
    }
}

impl JunctionOptions {
    #[must_use]
    pub fn checked(mut self) -> (Self, Vec<OptionRepair>) {
        let mut repairs = Vec::new();
        clamp_count("elements_count_radial", &mut self.elements_count_radial, 1, &mut repairs);
        (self, repairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tube_counts_clamped() {
        let options = TubeOptions {
            elements_count_around: 1,
            elements_count_along: 0,
            elements_count_through_wall: 0,
            wall_thickness: -0.5,
            ..TubeOptions::default()
        };
        let (checked, repairs) = options.checked();
        assert_eq!(checked.elements_count_around, 3);
        assert_eq!(checked.elements_count_along, 1);
        assert_eq!(checked.elements_count_through_wall, 1);
        assert_eq!(checked.wall_thickness, 0.0);
        assert_eq!(repairs.len(), 4);
        assert_eq!(
            repairs[3].to_string(),
            "option `wall_thickness` clamped from -0.5 to 0"
        );
    }

    #[test]
    fn test_relative_thicknesses_normalised() {
        let options = TubeOptions {
            elements_count_through_wall: 2,
            relative_thicknesses: vec![1.0, 3.0],
            ..TubeOptions::default()
        };
        let (checked, repairs) = options.checked();
        assert!(repairs.is_empty());
        assert_eq!(checked.layer_fractions(), vec![0.25, 0.75]);
    }

    #[test]
    fn test_relative_thicknesses_wrong_length_dropped() {
        let options = TubeOptions {
            elements_count_through_wall: 3,
            relative_thicknesses: vec![1.0, 3.0],
            ..TubeOptions::default()
        };
        let (checked, repairs) = options.checked();
        assert_eq!(repairs.len(), 1);
        assert!(checked.relative_thicknesses.is_empty());
        assert_eq!(checked.layer_fractions().len(), 3);
    }

    #[test]
    fn test_thickness_schedule_interpolates() {
        let options = TubeOptions {
            wall_thickness: 0.2,
            wall_thickness_end: Some(0.4),
            ..TubeOptions::default()
        };
        assert!((options.wall_thickness_at(0.5) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_sphere_shell_clamps() {
        let options = SphereShellOptions {
            elements_count_up: 1,
            wall_thickness: 0.9,
            exclude_top_rows: 5,
            length_ratio: 0.0,
            ..SphereShellOptions::default()
        };
        let (checked, repairs) = options.checked();
        assert_eq!(checked.elements_count_up, 2);
        assert_eq!(checked.wall_thickness, 0.5);
        assert_eq!(checked.exclude_top_rows, 1);
        assert_eq!(checked.exclude_bottom_rows, 0);
        assert_eq!(checked.length_ratio, 1.0e-6);
        assert_eq!(repairs.len(), 4);
    }

    #[test]
    fn test_thickness_clamped_to_radius() {
        let mut repairs = Vec::new();
        assert_eq!(clamp_thickness_to_radius(3.0, 1.0, &mut repairs), 1.0);
        assert_eq!(clamp_thickness_to_radius(0.5, 1.0, &mut repairs), 0.5);
        assert_eq!(repairs.len(), 1);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: TubeOptions =
            serde_json::from_str(r#"{"elements_count_around": 12, "closed_proximal_end": true}"#)
                .expect("partial options should deserialize");
        assert_eq!(options.elements_count_around, 12);
        assert_eq!(options.elements_count_along, 4);
        assert!(options.closed_proximal_end);
    }
}
