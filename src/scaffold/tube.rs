//! Single tube along a central path.
//!
//! Runs the whole pipeline: sample the path, generate one profile loop per
//! frame, warp the loops, offset the wall and assemble nodes and elements.
//! The end rings come back as [`SeamRing`]s with their parameters so a later
//! phase can stitch onto them without reading the store.

use crate::geom::Vec3;

use super::assemble::{MeshAssembler, NodeParameters, TubeNodes};
use super::diagnostics::ScaffoldDiagnostics;
use super::error::ScaffoldError;
use super::ids::{IdAllocator, IdRange};
use super::metrics::{ScaffoldMetrics, TimingBucket};
use super::options::{TubeOptions, clamp_thickness_to_radius};
use super::path::{PathControlPoint, PathSampler, SampledPath};
use super::profile::{EllipseProfile, ProfileGenerator, ProfileLoop};
use super::store::{MeshStore, NodeId};
use super::wall::{LayeredGrid, WallOffsetter, WallSchedule};
use super::warp::{SurfaceGrid, Warper};

/// An open end ring of a tube, for stitching.
#[derive(Debug, Clone, PartialEq)]
pub struct SeamRing {
    /// `nodes[layer][index]`.
    pub nodes: Vec<Vec<NodeId>>,
    /// `parameters[layer][index]`, as written to the store.
    pub parameters: Vec<Vec<NodeParameters>>,
    /// Path point at the ring.
    pub centre: Vec3,
    /// Unit path tangent at the ring, in the tube's along direction.
    pub direction: Vec3,
}

impl SeamRing {
    #[must_use]
    pub fn points_count(&self) -> usize {
        self.nodes.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn node_layers(&self) -> usize {
        self.nodes.len()
    }

    /// Whether every layer refers to the same nodes.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.nodes.iter().all(|layer| *layer == self.nodes[0])
    }

    fn from_row(nodes: &TubeNodes, grid: &LayeredGrid, path: &SampledPath, row: usize) -> Self {
        let parameters = grid
            .layers
            .iter()
            .map(|layer| {
                let s = &layer.surface;
                (0..grid.points_count)
                    .map(|n| NodeParameters {
                        x: s.x[row][n],
                        d1: s.d1[row][n],
                        d2: s.d2[row][n],
                        d3: s.d3[row][n],
                    })
                    .collect()
            })
            .collect();
        let frame = &path.frames[row];
        Self {
            nodes: nodes.rings[row].clone(),
            parameters,
            centre: frame.origin,
            direction: frame.tangent,
        }
    }
}

/// Result of one tube generation.
#[derive(Debug, Clone)]
pub struct TubeOutcome {
    pub range: IdRange,
    pub nodes: TubeNodes,
    /// `None` when the proximal end is closed by an apex.
    pub proximal: Option<SeamRing>,
    pub distal: SeamRing,
    /// Options after clamping.
    pub options: TubeOptions,
    pub diagnostics: ScaffoldDiagnostics,
}

/// Tube generator.
#[derive(Debug, Clone, Default)]
pub struct TubeGenerator {
    options: TubeOptions,
    transition_elements: Vec<bool>,
}

impl TubeGenerator {
    #[must_use]
    pub fn new(options: TubeOptions) -> Self {
        Self {
            options,
            transition_elements: Vec::new(),
        }
    }

    /// Marks elements around whose wall curvature is one-sided.
    #[must_use]
    pub fn with_transition_elements(mut self, transition_elements: Vec<bool>) -> Self {
        self.transition_elements = transition_elements;
        self
    }

    /// Generates with the elliptic profile described by the options.
    ///
    /// # Errors
    /// Fails on degenerate geometry, template validation or store
    /// rejection. The store content is undefined after an error.
    pub fn generate<S: MeshStore + ?Sized>(
        &self,
        store: &mut S,
        ids: &mut IdAllocator,
        path: &[PathControlPoint],
    ) -> Result<TubeOutcome, ScaffoldError> {
        let (options, _) = self.options.clone().checked();
        let profile = EllipseProfile {
            points_count: options.elements_count_around,
            ratio_start: options.ellipse_ratio_start,
            ratio_end: options.ellipse_ratio_end,
        };
        self.generate_with_profile(store, ids, path, &profile)
    }

    /// Generates with a caller-supplied profile; its point count overrides
    /// `elements_count_around`. Every loop it yields must have that many
    /// points.
    ///
    /// # Errors
    /// As [`generate`](Self::generate).
    pub fn generate_with_profile<S, P>(
        &self,
        store: &mut S,
        ids: &mut IdAllocator,
        path: &[PathControlPoint],
        profile: &P,
    ) -> Result<TubeOutcome, ScaffoldError>
    where
        S: MeshStore + ?Sized,
        P: ProfileGenerator + ?Sized,
    {
        let (mut options, mut repairs) = self.options.clone().checked();
        options.set_profile_points_count(profile.points_count(), &mut repairs);
        let mut metrics = ScaffoldMetrics::default();
        metrics.begin();
        let mark = ids.mark();

        let sampled = metrics.time(TimingBucket::PathSampling, || {
            PathSampler::new(options.elements_count_along)
                .with_start_end_ratio(options.element_length_start_end_ratio)
                .sample(path)
        })?;
        let loops = metrics.time(TimingBucket::Profile, || {
            sampled
                .frames
                .iter()
                .map(|frame| profile.profile_at(frame.xi))
                .collect::<Result<Vec<ProfileLoop>, _>>()
        })?;
        if let Some((row, mismatched)) = loops
            .iter()
            .enumerate()
            .find(|(_, profile_loop)| profile_loop.len() != options.elements_count_around)
        {
            return Err(ScaffoldError::degenerate(
                "profile",
                [row, mismatched.len(), options.elements_count_around],
                "loop point count differs from the profile's points_count",
            ));
        }
        let grid = metrics.time(TimingBucket::Warp, || {
            Warper::new(options.closed_proximal_end).warp(&sampled.frames, &loops)
        })?;

        let schedule = wall_schedule(&options, &sampled, &grid, &mut repairs);
        let layered = metrics.time(TimingBucket::WallOffset, || {
            WallOffsetter::new()
                .with_transition_elements(self.transition_elements.clone())
                .offset(&grid, &schedule)
        })?;

        let mut assembler = MeshAssembler::new();
        let nodes = metrics.time(TimingBucket::Assembly, || {
            assembler.assemble_tube(store, ids, &layered)
        })?;

        let last_row = layered.rows() - 1;
        let proximal = (!options.closed_proximal_end)
            .then(|| SeamRing::from_row(&nodes, &layered, &sampled, 0));
        let distal = SeamRing::from_row(&nodes, &layered, &sampled, last_row);

        let diagnostics = assembler.diagnostics_mut();
        diagnostics.add_repairs(&repairs);
        if let Some((min, max)) = layered.scale_range() {
            diagnostics.record_wall_scale(min);
            diagnostics.record_wall_scale(max);
        }
        diagnostics.timing = metrics.end();
        let diagnostics = assembler.finish();
        log::debug!("tube: {}", diagnostics.summary());

        Ok(TubeOutcome {
            range: ids.range_since(mark),
            nodes,
            proximal,
            distal,
            options,
            diagnostics,
        })
    }
}

/// Per-row wall thickness, clamped to the local inner radius.
fn wall_schedule(
    options: &TubeOptions,
    sampled: &SampledPath,
    grid: &SurfaceGrid,
    repairs: &mut Vec<super::options::OptionRepair>,
) -> WallSchedule {
    let inner_radius = |row: usize| -> f64 {
        let origin = sampled.frames[row].origin;
        grid.x[row]
            .iter()
            .map(|p| p.distance_to(origin))
            .fold(f64::INFINITY, f64::min)
    };
    let thickness = (0..grid.rows())
        .map(|row| {
            let requested = options.wall_thickness_at(sampled.frames[row].xi);
            let radius = if row == 0 && grid.apex.is_some() {
                inner_radius(1)
            } else {
                inner_radius(row)
            };
            clamp_thickness_to_radius(requested, radius, repairs)
        })
        .collect();
    WallSchedule {
        thickness,
        layer_fractions: options.layer_fractions(),
    }
}
