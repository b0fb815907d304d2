//! Position classification of points and volume cells.
//!
//! Cut facets are wound so their normal points toward the `Outside` region, so
//! a cell bounded by a cut facet can be classified from pure topology: it lies
//! on whichever side of the facet it was assembled on. Cells that touch no cut
//! facet (uncut elements, mostly) fall back to a direct signed-distance or
//! level-set probe of their centroid. Verdicts from several cut facets must
//! agree; a contradiction is surfaced, never papered over.

use crate::cut::facet::Facet;
use crate::cut::volume_cell::VolumeCell;
use crate::error::CutError;
use crate::geometry::closest_point_on_triangle;
use crate::math::{Point, Real};
use crate::mesh::{CellShape, InterfaceMesh, SideId};

/// Which side of the interface a point or volume cell lies on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Position {
    /// Not classified yet, or not classifiable.
    #[default]
    Undecided,
    /// On the side the interface normals point away from.
    Inside,
    /// On the side the interface normals point into.
    Outside,
    /// Within the on-surface tolerance band of the interface.
    OnSurface,
}

/// A signed-distance oracle classifying single points against the interface
/// snapshot.
pub enum PositionProbe<'a> {
    /// Probe against the triangles of nearby interface sides.
    MeshSides {
        /// The interface mesh.
        interface: &'a InterfaceMesh,
        /// Candidate sides near the element, from the broad phase. The pass
        /// guarantees at least one candidate whenever the interface has sides.
        candidates: &'a [SideId],
    },
    /// Probe the nodal level-set interpolant of the element.
    LevelSet {
        /// The element shape carrying the interpolant.
        shape: CellShape,
        /// Level-set values at the element nodes.
        values: &'a [Real],
    },
}

impl PositionProbe<'_> {
    /// Classifies one point given in both coordinate frames.
    ///
    /// `band` is the absolute on-surface distance band (global frame). An
    /// empty interface encloses nothing, so everything is `Outside`; a
    /// non-empty interface with no candidate near enough to measure yields
    /// `Undecided`.
    pub fn classify(&self, global: &Point<Real>, local: &Point<Real>, band: Real) -> Position {
        match self {
            PositionProbe::MeshSides {
                interface,
                candidates,
            } => {
                if interface.sides().is_empty() {
                    return Position::Outside;
                }

                // Nearest triangle wins; its winding normal signs the verdict.
                let mut best: Option<(Real, Real)> = None;
                for &side in *candidates {
                    for tri in interface.side_triangles(side) {
                        let cp = closest_point_on_triangle(global, &tri[0], &tri[1], &tri[2]);
                        let delta = global - cp;
                        let dist2 = delta.norm_squared();
                        let keep = match best {
                            Some((d2, _)) => dist2 < d2,
                            None => true,
                        };
                        if keep {
                            let normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
                            best = Some((dist2, delta.dot(&normal)));
                        }
                    }
                }

                match best {
                    None => Position::Undecided,
                    Some((dist2, signed)) => {
                        if dist2.sqrt() <= band {
                            Position::OnSurface
                        } else if signed >= 0.0 {
                            Position::Outside
                        } else {
                            Position::Inside
                        }
                    }
                }
            }
            PositionProbe::LevelSet { shape, values } => {
                let mut phi = 0.0;
                for (v, value) in shape.shape_functions(local).iter().zip(values.iter()) {
                    phi += v * value;
                }
                // The band is a distance; convert through the local gradient
                // magnitude so near-flat fields do not swallow the element.
                let mut grad = crate::math::Vector::zeros();
                for (g, value) in shape.shape_gradients(local).iter().zip(values.iter()) {
                    grad += g * *value;
                }
                let scale = grad.norm().max(Real::EPSILON);

                if phi.abs() <= band * scale {
                    Position::OnSurface
                } else if phi > 0.0 {
                    Position::Outside
                } else {
                    Position::Inside
                }
            }
        }
    }
}

/// Classifies every volume cell of one element.
///
/// `forward` maps local to global coordinates for the centroid probe; `band`
/// is the absolute on-surface distance band.
pub fn classify_cells(
    cells: &mut [VolumeCell],
    facets: &[Facet],
    probe: &PositionProbe<'_>,
    forward: impl Fn(&Point<Real>) -> Point<Real>,
    band: Real,
) -> Result<(), CutError> {
    for cell in cells.iter_mut() {
        let mut verdict = Position::Undecided;

        for &(facet, on_normal_side) in cell.facets() {
            let facet = &facets[facet.0 as usize];
            if !facet.on_cut_surface() {
                continue;
            }
            let vote = if on_normal_side == facet.outside_along_normal() {
                Position::Outside
            } else {
                Position::Inside
            };
            if verdict == Position::Undecided {
                verdict = vote;
            } else if verdict != vote {
                return Err(CutError::PositionUndecidable);
            }
        }

        if verdict == Position::Undecided {
            let centroid = cell.centroid();
            verdict = probe.classify(&forward(&centroid), &centroid, band);
        }
        if verdict == Position::Undecided {
            return Err(CutError::PositionUndecidable);
        }

        cell.set_position(verdict);
    }

    Ok(())
}
