//! Integration-rule types, cubature degrees, and rule generation.
//!
//! Volume cells and boundary facets both support two rule kinds: tessellated
//! rules map reference Gauss rules through the cell's simplex tessellation;
//! moment-fitted rules solve for weights that reproduce the cell's exact
//! moments at the tessellation's points.

use crate::error::CutError;
use crate::geometry::{BoundingBox, Plane};
use crate::integrate::basis::MonomialBasis;
use crate::integrate::{gauss, moment_fit, moments};
use crate::math::{Point, Real, UnitVector, DEFAULT_EPSILON};
use crate::mesh::CellShape;
use crate::tolerance::CutTolerances;
use na;

/// How volume-cell rules are generated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum VolumeRuleKind {
    /// One mapped reference rule per cell of the simplex tessellation.
    #[default]
    Tessellation,
    /// A single rule per volume cell fitted against its exact moments.
    MomentFitting,
}

/// How boundary-facet rules are generated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum BoundaryRuleKind {
    /// One mapped reference rule per triangle of the facet triangulation.
    #[default]
    Tessellation,
    /// A single rule per facet fitted against its exact plane moments.
    MomentFitting,
}

/// A quadrature rule in element-local coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct QuadratureRule {
    /// Evaluation points.
    pub points: Vec<Point<Real>>,
    /// The weight of each point.
    pub weights: Vec<Real>,
}

impl QuadratureRule {
    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the rule has no points at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Appends one weighted point.
    #[inline]
    pub fn push(&mut self, point: Point<Real>, weight: Real) {
        self.points.push(point);
        self.weights.push(weight);
    }

    /// Iterates over `(point, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Point<Real>, Real)> {
        self.points.iter().zip(self.weights.iter().copied())
    }

    /// The sum of all weights: the measure of the integrated region.
    pub fn total_weight(&self) -> Real {
        self.weights.iter().sum()
    }

    /// Evaluates `Σ w_i f(x_i)`.
    pub fn integrate(&self, mut f: impl FnMut(&Point<Real>) -> Real) -> Real {
        self.iter().map(|(p, w)| w * f(p)).sum()
    }
}

/// A quadrature rule over a boundary facet, with a unit normal per point.
///
/// Normals point toward the outside region.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BoundaryRule {
    /// Evaluation points.
    pub points: Vec<Point<Real>>,
    /// The weight of each point.
    pub weights: Vec<Real>,
    /// The facet normal at each point.
    pub normals: Vec<UnitVector<Real>>,
}

impl BoundaryRule {
    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the rule has no points at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Appends one weighted point with its normal.
    #[inline]
    pub fn push(&mut self, point: Point<Real>, weight: Real, normal: UnitVector<Real>) {
        self.points.push(point);
        self.weights.push(weight);
        self.normals.push(normal);
    }

    /// Iterates over `(point, weight, normal)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&Point<Real>, Real, &UnitVector<Real>)> {
        self.points
            .iter()
            .zip(self.weights.iter().copied())
            .zip(self.normals.iter())
            .map(|((p, w), n)| (p, w, n))
    }

    /// The sum of all weights: the area of the integrated facet.
    pub fn total_weight(&self) -> Real {
        self.weights.iter().sum()
    }

    /// Evaluates `Σ w_i f(x_i, n_i)`.
    pub fn integrate(&self, mut f: impl FnMut(&Point<Real>, &UnitVector<Real>) -> Real) -> Real {
        self.iter().map(|(p, w, n)| w * f(p, n)).sum()
    }
}

/// The cubature degree used for an integration cell of the given shape.
///
/// Background shapes are all linear here, so the degree depends on the cell
/// shape only.
pub fn cubature_degree(cell: CellShape) -> u32 {
    match cell {
        CellShape::Hex8 | CellShape::Tet4 => 6,
        _ => 4,
    }
}

/// The rule of an uncut element: its own reference rule at the default degree.
pub fn full_cell_rule(shape: CellShape) -> QuadratureRule {
    gauss::reference_rule(shape, cubature_degree(shape))
}

/// One mapped reference rule per (positively oriented) tetrahedron.
pub fn tessellated_tet_rule(tets: &[[Point<Real>; 4]], degree: u32) -> QuadratureRule {
    let reference = gauss::reference_rule(CellShape::Tet4, degree);
    let mut rule = QuadratureRule::default();

    for tet in tets {
        let ab = tet[1] - tet[0];
        let ac = tet[2] - tet[0];
        let ad = tet[3] - tet[0];
        // Determinant of the affine map; six times the tet volume.
        let det = ab.cross(&ac).dot(&ad);
        for (p, w) in reference.iter() {
            rule.push(tet[0] + ab * p.x + ac * p.y + ad * p.z, w * det);
        }
    }

    rule
}

/// One mapped reference rule per triangle of a planar region.
pub fn tessellated_tri_rule(triangles: &[[Point<Real>; 3]], degree: u32) -> QuadratureRule {
    let reference = gauss::reference_rule(CellShape::Tri3, degree);
    let mut rule = QuadratureRule::default();

    for tri in triangles {
        let ab = tri[1] - tri[0];
        let ac = tri[2] - tri[0];
        let jacobian = ab.cross(&ac).norm();
        for (p, w) in reference.iter() {
            rule.push(tri[0] + ab * p.x + ac * p.y, w * jacobian);
        }
    }

    rule
}

/// One mapped reference rule per triangle of an in-plane `z = 0` region,
/// keeping each triangle's signed orientation.
///
/// Negatively wound triangles get negative weights, so fans over regions with
/// holes integrate the punctured region exactly.
pub fn tessellated_planar_rule(triangles: &[[Point<Real>; 3]], degree: u32) -> QuadratureRule {
    let reference = gauss::reference_rule(CellShape::Tri3, degree);
    let mut rule = QuadratureRule::default();

    for tri in triangles {
        let ab = tri[1] - tri[0];
        let ac = tri[2] - tri[0];
        let jacobian = ab.cross(&ac).z;
        for (p, w) in reference.iter() {
            rule.push(tri[0] + ab * p.x + ac * p.y, w * jacobian);
        }
    }

    rule
}

/// The mapped line rule of one segment, for 1-D cells.
pub fn segment_rule(a: &Point<Real>, b: &Point<Real>, degree: u32) -> QuadratureRule {
    let reference = gauss::reference_rule(CellShape::Line2, degree);
    let mut rule = QuadratureRule::default();

    let mid = na::center(a, b);
    let half = (b - a) * 0.5;
    for (p, w) in reference.iter() {
        rule.push(mid + half * p.x, w * half.norm());
    }

    rule
}

/// One mapped reference rule per facet triangle, with the triangle's own
/// normal at every point. Zero-area triangles contribute nothing.
pub fn tessellated_boundary_rule(triangles: &[[Point<Real>; 3]], degree: u32) -> BoundaryRule {
    let reference = gauss::reference_rule(CellShape::Tri3, degree);
    let mut rule = BoundaryRule::default();

    for tri in triangles {
        let ab = tri[1] - tri[0];
        let ac = tri[2] - tri[0];
        let area_normal = ab.cross(&ac);
        let jacobian = area_normal.norm();
        if let Some(normal) = UnitVector::try_new(area_normal, DEFAULT_EPSILON) {
            for (p, w) in reference.iter() {
                rule.push(tri[0] + ab * p.x + ac * p.y, w * jacobian, normal);
            }
        }
    }

    rule
}

/// A moment-fitted rule for the solid bounded by the outward-oriented
/// `boundary` triangles.
///
/// Exact moments come from the divergence theorem over the boundary; candidate
/// points come from the cell's tet tessellation, enriched on every retry.
pub fn moment_fitted_volume_rule(
    boundary: &[[Point<Real>; 3]],
    tets: &[[Point<Real>; 4]],
    degree: u32,
    tolerances: &CutTolerances,
) -> Result<QuadratureRule, CutError> {
    let (center, scale) = triangle_cloud_frame(boundary);
    let basis = MonomialBasis::volume(degree, center, scale);
    let moments = moments::solid_moments(boundary, &basis);

    let (points, weights) = moment_fit::fit_quadrature(&basis, &moments, tolerances, |attempt| {
        tessellated_tet_rule(tets, degree + attempt).points
    })?;

    Ok(QuadratureRule { points, weights })
}

/// A moment-fitted rule for a facet lying in `plane`; all points carry the
/// plane normal.
pub fn moment_fitted_boundary_rule(
    triangles: &[[Point<Real>; 3]],
    plane: &Plane,
    degree: u32,
    tolerances: &CutTolerances,
) -> Result<BoundaryRule, CutError> {
    let [t1, t2] = plane.tangents();

    // Work in the 2-D plane frame; the projection is affine, so polynomial
    // degrees survive the round trip.
    let flat: Vec<[Point<Real>; 3]> = triangles
        .iter()
        .map(|tri| {
            tri.map(|p| {
                let d = p - plane.origin;
                Point::new(d.dot(&t1), d.dot(&t2), 0.0)
            })
        })
        .collect();

    let (center, scale) = triangle_cloud_frame(&flat);
    let basis = MonomialBasis::surface(degree, center, scale);
    let moments = moments::surface_moments(&flat, &basis);

    let (points, weights) = moment_fit::fit_quadrature(&basis, &moments, tolerances, |attempt| {
        tessellated_tri_rule(&flat, degree + attempt).points
    })?;

    let points = points
        .iter()
        .map(|p| plane.origin + t1 * p.x + t2 * p.y)
        .collect();
    let normals = vec![plane.normal; weights.len()];

    Ok(BoundaryRule {
        points,
        weights,
        normals,
    })
}

/// Center and half-diameter of a triangle vertex cloud, for basis scaling.
fn triangle_cloud_frame(triangles: &[[Point<Real>; 3]]) -> (Point<Real>, Real) {
    if triangles.is_empty() {
        return (Point::origin(), 1.0);
    }
    let mut bounds = BoundingBox::new_invalid();
    for tri in triangles {
        for p in tri {
            bounds.add_point(p);
        }
    }
    (bounds.center(), bounds.diameter() * 0.5)
}
