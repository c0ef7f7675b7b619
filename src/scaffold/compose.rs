//! Two-phase composition: a base tube, then a branch tube joined onto its
//! distal ring.
//!
//! `generate` writes the base tube and returns a [`BaseHandoff`] that owns
//! the allocator together with the range the base created. `edit` takes
//! that handoff, refuses it if the allocator would reissue a base
//! identifier, and adds the branch tube and the junction. The junction only
//! reuses nodes of the two seam rings; every other node belongs to exactly
//! one phase.

use serde::{Deserialize, Serialize};

use crate::geom::Vec3;

use super::assemble::MeshAssembler;
use super::diagnostics::ScaffoldDiagnostics;
use super::error::ScaffoldError;
use super::ids::{IdAllocator, IdHandoff, IdRange};
use super::junction::AnnulusJunction;
use super::metrics::{ScaffoldMetrics, TimingBucket};
use super::options::{JunctionOptions, TubeOptions};
use super::path::{PathControlPoint, straight_path};
use super::store::{MeshStore, NodeId};
use super::tube::{SeamRing, TubeGenerator, TubeOutcome};

/// A base tube with a branch tube joined to its distal end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchComposition {
    pub base: TubeOptions,
    pub base_path: Vec<PathControlPoint>,
    pub branch: TubeOptions,
    pub branch_path: Vec<PathControlPoint>,
    pub junction: JunctionOptions,
}

impl Default for BranchComposition {
    fn default() -> Self {
        Self {
            base: TubeOptions::default(),
            base_path: straight_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), 0.5),
            branch: TubeOptions::default(),
            branch_path: straight_path(Vec3::new(0.0, 0.0, 2.5), Vec3::new(0.0, 0.0, 4.5), 0.5),
            junction: JunctionOptions::default(),
        }
    }
}

/// Output of the generate phase, consumed by the edit phase.
#[derive(Debug, Clone)]
pub struct BaseHandoff {
    pub ids: IdHandoff,
    pub base: TubeOutcome,
}

/// Identifier ownership and diagnostics of a finished composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionReport {
    pub base: IdRange,
    pub branch: IdRange,
    pub junction: IdRange,
    /// Nodes of the two rings the junction stitched; each belongs to the
    /// base or the branch range.
    pub seam_node_ids: Vec<NodeId>,
    pub end_reversed: bool,
    pub diagnostics: ScaffoldDiagnostics,
}

impl BranchComposition {
    /// Writes the base tube.
    ///
    /// # Errors
    /// Propagates base tube failures.
    pub fn generate<S: MeshStore + ?Sized>(
        &self,
        store: &mut S,
        mut ids: IdAllocator,
    ) -> Result<BaseHandoff, ScaffoldError> {
        let base = TubeGenerator::new(self.base.clone()).generate(store, &mut ids, &self.base_path)?;
        log::info!("composition base: {}", base.diagnostics.summary());
        Ok(BaseHandoff {
            ids: IdHandoff::new(base.range, ids),
            base,
        })
    }

    /// Writes the branch tube and the junction onto the base's distal ring.
    ///
    /// The branch ring nearer to the base's distal ring is stitched; a
    /// branch running towards the base is joined through its distal ring.
    ///
    /// # Errors
    /// [`ScaffoldError::IdRange`] for an invalid handoff, otherwise branch
    /// tube and junction failures.
    pub fn edit<S: MeshStore + ?Sized>(
        &self,
        store: &mut S,
        handoff: BaseHandoff,
    ) -> Result<CompositionReport, ScaffoldError> {
        let BaseHandoff { ids, base } = handoff;
        let owned = ids.owned;
        let mut ids = ids.into_allocator()?;
        let mut metrics = ScaffoldMetrics::default();
        metrics.begin();

        let branch = TubeGenerator::new(self.branch.clone()).generate(store, &mut ids, &self.branch_path)?;
        if owned.overlaps_nodes(&branch.range) {
            return Err(ScaffoldError::IdRange {
                detail: format!("branch nodes {:?} overlap base nodes {owned:?}", branch.range),
            });
        }
        let seam = nearest_ring(&base.distal, &branch);

        let mut assembler = MeshAssembler::new();
        let junction = metrics.time(TimingBucket::Junction, || {
            AnnulusJunction::new(self.junction.clone()).stitch(&mut assembler, store, &mut ids, &base.distal, seam)
        })?;

        let mut diagnostics = base.diagnostics.clone();
        diagnostics.merge(&branch.diagnostics);
        let mut junction_diagnostics = assembler.finish();
        junction_diagnostics.timing = metrics.end();
        diagnostics.merge(&junction_diagnostics);
        log::info!("composition: {}", diagnostics.summary());

        Ok(CompositionReport {
            base: owned,
            branch: branch.range,
            junction: junction.range,
            seam_node_ids: junction.seam_nodes,
            end_reversed: junction.end_reversed,
            diagnostics,
        })
    }

    /// Runs both phases, numbering after the store's highest identifiers so
    /// existing content is left untouched.
    ///
    /// # Errors
    /// As [`generate`](Self::generate) and [`edit`](Self::edit).
    pub fn run<S: MeshStore + ?Sized>(&self, store: &mut S) -> Result<CompositionReport, ScaffoldError> {
        let ids = IdAllocator::continuing_after(store.max_node_id(), store.max_element_id());
        let handoff = self.generate(store, ids)?;
        self.edit(store, handoff)
    }
}

fn nearest_ring<'a>(target: &SeamRing, branch: &'a TubeOutcome) -> &'a SeamRing {
    match &branch.proximal {
        Some(proximal)
            if proximal.centre.distance_to(target.centre) <= branch.distal.centre.distance_to(target.centre) =>
        {
            proximal
        }
        _ => &branch.distal,
    }
}
