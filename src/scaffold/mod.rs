//! Hexahedral tube scaffolds with cubic Hermite node derivatives.
//!
//! The pipeline runs path sampling, cross-section profiles, warping onto
//! path frames, wall offsetting and node/element assembly. Apex, junction
//! and hanging-node elements get element templates from the singular
//! topology builder. Generators write through the [`MeshStore`] trait and
//! number nodes and elements with an explicit [`IdAllocator`].

mod assemble;
mod cache;
mod compose;
mod diagnostics;
mod error;
mod ids;
mod junction;
mod metrics;
mod options;
mod path;
mod profile;
mod singular;
mod sphere;
mod store;
mod template;
mod tube;
mod wall;
mod warp;

pub use assemble::{MeshAssembler, NodeParameters, TubeNodes};
pub use cache::{TemplateCache, TemplateCacheStats, TemplateKey};
pub use compose::{BaseHandoff, BranchComposition, CompositionReport};
pub use diagnostics::ScaffoldDiagnostics;
pub use error::ScaffoldError;
pub use ids::{IdAllocator, IdHandoff, IdMark, IdRange};
pub use junction::{AnnulusJunction, JunctionOutcome};
pub use metrics::{ScaffoldMetrics, ScaffoldTimingReport, TimingBucket};
pub use options::{JunctionOptions, OptionRepair, SphereShellOptions, TubeOptions};
pub use path::{Frame, PathControlPoint, PathSampler, SampledPath, straight_path};
pub use profile::{EllipseProfile, ProfileGenerator, ProfileLoop};
pub use singular::{
    HangingCorner, Pole, SingularElement, SingularTopologyBuilder, apply_hanging_xi1,
    junction_template, pole_template,
};
pub use sphere::{SphereShellGenerator, SphereShellOutcome};
pub use store::{
    ElementId, ElementRecord, FieldSample, InMemoryMesh, MeshStore, MeshStoreError, NodeId,
    NodeRecord, NodeTemplate,
};
pub use template::{
    ElementTemplate, LabelTerm, ScaleFactor, ScaleLabel, TemplateBuilder, TemplateError,
    TemplateKind, Term, ValueLabel,
};
pub use tube::{SeamRing, TubeGenerator, TubeOutcome};
pub use wall::{LayeredGrid, WallLayer, WallOffsetter, WallSchedule, curvature_scale};
pub use warp::{ApexFrame, SurfaceGrid, Warper};

#[cfg(test)]
mod tests;
