//! The error taxonomy of the cut pipeline.
//!
//! Every failure an element can run into while being cut is expressed as a
//! [`CutError`]. Failures are contained: one element failing never aborts the
//! pass, it is recorded in the pass report and the element is skipped.

use crate::math::Real;

/// A geometric configuration too degenerate to resolve reliably.
///
/// Degeneracies are the recoverable class of cut failures: the stage that hits
/// one may retry with perturbed or refined data before giving up. Only after
/// the retry budget is exhausted does the degeneracy surface in the report.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum DegeneracyKind {
    /// An interface side and an element feature are parallel within tolerance,
    /// so their intersection is not a point.
    #[error("near-parallel contact between an interface side and an element feature")]
    ParallelContact,
    /// An intersection point landed inside the merge band of several distinct
    /// features at once and cannot be attributed to one of them.
    #[error("intersection point is ambiguous between several element features")]
    AmbiguousContact,
    /// A level-set cut crosses one element face more often than a single chord
    /// can represent; the pairing is ambiguous for a bilinear interpolant.
    #[error("level-set isocontour crossing of one face is ambiguous")]
    AmbiguousLevelSetFace,
    /// A cut produced a piece thinner than the merge tolerance.
    #[error("cut piece is thinner than the point merge tolerance")]
    SliverPiece,
}

/// A structural defect found while assembling facets into volume cells.
///
/// These are fatal for the affected element: retrying cannot repair a graph
/// whose incidence counts are wrong.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum GraphDefect {
    /// A facet line bounds exactly one facet, so no closed cell can contain it.
    #[error("facet line is referenced by a single facet")]
    DanglingLine,
    /// A candidate cell's facet shell does not close up around its volume.
    #[error("facet shell of a candidate cell does not close")]
    OpenShell,
    /// A facet ended up claimed by more than two volume cells.
    #[error("facet claimed by more than two volume cells")]
    OverclaimedFacet,
    /// A facet lying on the cut surface was swept into the exterior component,
    /// which means the interface does not separate the element.
    #[error("cut facet ended up in the exterior component")]
    CutFacetInExterior,
}

/// A malformed input mesh or interface description.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MeshDefect {
    /// An element references a node index past the end of the node array.
    #[error("element {element} references out-of-bounds node {node}")]
    NodeOutOfBounds {
        /// The offending element.
        element: u32,
        /// The out-of-bounds node index.
        node: u32,
    },
    /// An element's connectivity length does not match its shape.
    #[error("element {element} has {got} nodes but its shape requires {expected}")]
    NodeCountMismatch {
        /// The offending element.
        element: u32,
        /// Node count required by the element shape.
        expected: usize,
        /// Node count actually supplied.
        got: usize,
    },
    /// An element or interface side has collapsed to zero measure.
    #[error("element or side {entity} is degenerate (zero measure)")]
    DegenerateEntity {
        /// The offending element or side.
        entity: u32,
    },
    /// An interface side uses a shape other than `Tri3` or `Quad4`.
    #[error("interface side {side} is not a triangle or quadrilateral")]
    UnsupportedSideShape {
        /// The offending side.
        side: u32,
    },
    /// The nodal level-set array does not cover every background node.
    #[error("level-set values ({got}) do not match the background node count ({expected})")]
    LevelSetSizeMismatch {
        /// Number of background nodes.
        expected: usize,
        /// Number of level-set values supplied.
        got: usize,
    },
}

/// Errors that can occur while cutting an element or generating its
/// integration rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CutError {
    /// The cut geometry is degenerate and stayed so after the permitted
    /// retries.
    #[error("degenerate cut geometry: {0}")]
    Degeneracy(DegeneracyKind),
    /// The facet graph of the element is structurally inconsistent.
    #[error("inconsistent facet graph: {0}")]
    GraphInconsistency(GraphDefect),
    /// Neither the direct test nor adjacency propagation could decide whether
    /// a volume cell lies inside or outside the interface.
    #[error("volume cell position could not be decided")]
    PositionUndecidable,
    /// A moment-fitting system remained singular or produced invalid weights
    /// after exhausting its retry budget.
    #[error("moment fitting failed after {attempts} attempts")]
    SingularMomentFit {
        /// Number of refine-and-retry rounds that were attempted.
        attempts: u32,
    },
    /// The generated cells do not add up to the element volume.
    #[error("cell volumes deviate from the element volume by a relative {deviation}")]
    VolumeMismatch {
        /// Relative deviation between the summed cell volumes and the element
        /// volume.
        deviation: Real,
    },
    /// The input mesh or interface is malformed.
    #[error("invalid mesh: {0}")]
    InvalidMesh(MeshDefect),
    /// The Newton iteration inverting the isoparametric map did not converge,
    /// usually because a point lies far outside its element.
    #[error("inverse isoparametric map did not converge")]
    InverseMapDiverged,
}

impl From<DegeneracyKind> for CutError {
    fn from(value: DegeneracyKind) -> Self {
        CutError::Degeneracy(value)
    }
}

impl From<GraphDefect> for CutError {
    fn from(value: GraphDefect) -> Self {
        CutError::GraphInconsistency(value)
    }
}

impl From<MeshDefect> for CutError {
    fn from(value: MeshDefect) -> Self {
        CutError::InvalidMesh(value)
    }
}
