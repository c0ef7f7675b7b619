//! Run diagnostics for scaffold generation.
//!
//! Every generator returns a [`ScaffoldDiagnostics`] next to its identifier
//! ranges. It counts what was created, records the extremes of the wall
//! curvature correction, and carries the clamp notes produced while
//! repairing options, so callers can see what the pipeline changed without
//! an error ever being raised.
//!
//! ```ignore
//! let outcome = TubeGenerator::new(options).generate(&mut mesh, &mut ids, &path)?;
//! log::info!("{}", outcome.diagnostics.summary());
//! for warning in &outcome.diagnostics.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! ```

use std::fmt;

use serde::Serialize;

use super::cache::TemplateCacheStats;
use super::metrics::ScaffoldTimingReport;
use super::options::OptionRepair;
use super::template::TemplateKind;

/// Counts, extremes and warnings from one generator run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ScaffoldDiagnostics {
    pub node_count: usize,

    /// Elements using the identity template.
    pub standard_element_count: usize,

    /// Elements collapsed onto an apex node.
    pub apex_element_count: usize,

    /// Elements with remapped derivatives along a junction seam.
    pub junction_element_count: usize,

    /// Elements with a hanging node on one edge.
    pub hanging_element_count: usize,

    /// Smallest wall curvature scale applied, 1.0 when no wall was offset.
    pub min_wall_scale: Option<f64>,
    pub max_wall_scale: Option<f64>,

    pub template_cache: TemplateCacheStats,

    /// Clamp notes and other non-fatal findings.
    pub warnings: Vec<String>,

    pub timing: Option<ScaffoldTimingReport>,
}

impl ScaffoldDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.standard_element_count
            + self.apex_element_count
            + self.junction_element_count
            + self.hanging_element_count
    }

    /// Whether any option had to be clamped or other warnings were raised.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Logs each repair and keeps it as a warning.
    pub fn add_repairs(&mut self, repairs: &[OptionRepair]) {
        for repair in repairs {
            log::warn!("{repair}");
            self.warnings.push(repair.to_string());
        }
    }

    /// Counts one created element by template kind.
    pub fn record_element(&mut self, kind: TemplateKind) {
        match kind {
            TemplateKind::Standard => self.standard_element_count += 1,
            TemplateKind::PoleBottom | TemplateKind::PoleTop => self.apex_element_count += 1,
            TemplateKind::Junction => self.junction_element_count += 1,
            TemplateKind::Hanging => self.hanging_element_count += 1,
        }
    }

    /// Widens the recorded wall scale range to include `scale`.
    pub fn record_wall_scale(&mut self, scale: f64) {
        self.min_wall_scale = Some(self.min_wall_scale.map_or(scale, |s| s.min(scale)));
        self.max_wall_scale = Some(self.max_wall_scale.map_or(scale, |s| s.max(scale)));
    }

    /// Sums counts, widens ranges and appends warnings. Cache statistics and
    /// timing are taken from `other` only when this record has none.
    pub fn merge(&mut self, other: &ScaffoldDiagnostics) {
        self.node_count += other.node_count;
        self.standard_element_count += other.standard_element_count;
        self.apex_element_count += other.apex_element_count;
        self.junction_element_count += other.junction_element_count;
        self.hanging_element_count += other.hanging_element_count;
        if let Some(scale) = other.min_wall_scale {
            self.record_wall_scale(scale);
        }
        if let Some(scale) = other.max_wall_scale {
            self.record_wall_scale(scale);
        }
        if self.template_cache == TemplateCacheStats::default() {
            self.template_cache = other.template_cache;
        }
        if self.timing.is_none() {
            self.timing.clone_from(&other.timing);
        }
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Short single-line summary for logging.
    ///
    /// Format: `"N:{nodes} E:{elements} [details...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("N:{} E:{}", self.node_count, self.element_count())];
        if self.apex_element_count > 0 {
            parts.push(format!("apex:{}", self.apex_element_count));
        }
        if self.junction_element_count > 0 {
            parts.push(format!("junction:{}", self.junction_element_count));
        }
        if self.hanging_element_count > 0 {
            parts.push(format!("hanging:{}", self.hanging_element_count));
        }
        if let (Some(min), Some(max)) = (self.min_wall_scale, self.max_wall_scale) {
            parts.push(format!("wall-scale:{min:.3}..{max:.3}"));
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings:{}", self.warnings.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for ScaffoldDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scaffold Diagnostics:")?;
        writeln!(f, "  Nodes: {}", self.node_count)?;
        writeln!(f, "  Elements: {}", self.element_count())?;
        writeln!(f, "    - Standard: {}", self.standard_element_count)?;
        if self.apex_element_count > 0 {
            writeln!(f, "    - Apex: {}", self.apex_element_count)?;
        }
        if self.junction_element_count > 0 {
            writeln!(f, "    - Junction: {}", self.junction_element_count)?;
        }
        if self.hanging_element_count > 0 {
            writeln!(f, "    - Hanging: {}", self.hanging_element_count)?;
        }
        if let (Some(min), Some(max)) = (self.min_wall_scale, self.max_wall_scale) {
            writeln!(f, "  Wall scale: {min} .. {max}")?;
        }
        writeln!(
            f,
            "  Templates: {} ({:.0}% cache hits)",
            self.template_cache.entries,
            self.template_cache.hit_rate() * 100.0
        )?;
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        if let Some(ref timing) = self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_summary() {
        let mut diagnostics = ScaffoldDiagnostics::new();
        diagnostics.node_count = 10;
        diagnostics.record_element(TemplateKind::Standard);
        diagnostics.record_element(TemplateKind::PoleTop);
        diagnostics.record_element(TemplateKind::PoleBottom);
        diagnostics.record_wall_scale(1.25);
        diagnostics.record_wall_scale(0.75);
        assert_eq!(diagnostics.element_count(), 3);
        assert_eq!(diagnostics.min_wall_scale, Some(0.75));
        assert_eq!(diagnostics.max_wall_scale, Some(1.25));
        assert_eq!(diagnostics.summary(), "N:10 E:3 apex:2 wall-scale:0.750..1.250");
    }

    #[test]
    fn test_merge_appends_warnings() {
        let mut a = ScaffoldDiagnostics::new();
        a.add_warning("first");
        let mut b = ScaffoldDiagnostics::new();
        b.node_count = 4;
        b.record_element(TemplateKind::Hanging);
        b.add_repairs(&[OptionRepair {
            option: "elements_count_along",
            requested: 0.0,
            applied: 1.0,
        }]);
        a.merge(&b);
        assert_eq!(a.node_count, 4);
        assert_eq!(a.hanging_element_count, 1);
        assert_eq!(a.warnings.len(), 2);
        assert!(a.warnings[1].contains("elements_count_along"));
        assert!(a.has_warnings());
    }
}
