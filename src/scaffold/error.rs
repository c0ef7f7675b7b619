use crate::geom::CurveError;

use super::store::MeshStoreError;
use super::template::TemplateError;

/// Fatal failures of a scaffold generation run.
///
/// Option values out of range are never reported here; they are clamped by
/// the option records and surface as [`OptionRepair`](super::OptionRepair)
/// notes instead. Anything already written to the mesh store when one of
/// these is returned must be discarded by the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScaffoldError {
    /// Zero-length tangent or normal, duplicate samples, or an inverting
    /// wall offset.
    #[error("degenerate geometry in {context} at {indices:?}: {detail}")]
    DegenerateGeometry {
        context: &'static str,
        indices: Vec<usize>,
        detail: String,
    },

    #[error("element template rejected: {0}")]
    Template(#[from] TemplateError),

    #[error("mesh store rejected write: {0}")]
    Store(#[from] MeshStoreError),

    #[error("curve evaluation failed: {0}")]
    Curve(#[from] CurveError),

    /// Two rings cannot be stitched with the available templates.
    #[error("cannot join a ring of {start} elements around to one of {end}")]
    UnsupportedJunction { start: usize, end: usize },

    /// The two rings have different numbers of node layers through the wall.
    #[error("cannot join {start} node layers to {end}")]
    LayerMismatch { start: usize, end: usize },

    /// An edit phase was handed identifiers it does not own.
    #[error("identifier handoff violated: {detail}")]
    IdRange { detail: String },
}

impl ScaffoldError {
    pub(crate) fn degenerate(
        context: &'static str,
        indices: impl Into<Vec<usize>>,
        detail: impl Into<String>,
    ) -> Self {
        Self::DegenerateGeometry {
            context,
            indices: indices.into(),
            detail: detail.into(),
        }
    }

    /// Whether this is a geometric failure rather than a bookkeeping one.
    #[must_use]
    pub fn is_degenerate_geometry(&self) -> bool {
        matches!(
            self,
            Self::DegenerateGeometry { .. } | Self::Curve(CurveError::ZeroLength)
        )
    }
}
