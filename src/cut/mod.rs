//! Cutting background elements against embedded interfaces.
//!
//! The entry point is [`CutPass`], which cuts a whole background mesh and
//! returns one [`ElementCut`] per element. The lower-level pieces it is made
//! of live in the submodules: side clipping, facet extraction, the facet
//! graph and its volume cells, position classification.

pub use self::element_cut::{CutStage, ElementCut};
pub use self::facet::{trace_planar_regions, Facet, FacetId, FacetOrigin, PlanarRegion};
pub use self::facet_graph::FacetGraph;
pub use self::intersect::{
    clip_chords, clip_sides, level_set_chords, level_set_cut, line_cut_points, ClippedChord,
    ClippedSide, LevelSetChords, LevelSetCut,
};
pub use self::pass::{CutChecks, CutOptions, CutPass, CutReport, ElementFailure};
pub use self::point_registry::{CutPoint, PointId, PointRegistry};
pub use self::position::{classify_cells, Position, PositionProbe};
pub use self::volume_cell::VolumeCell;

mod element_cut;
mod facet;
mod facet_graph;
mod intersect;
mod pass;
mod point_registry;
mod position;
mod volume_cell;
