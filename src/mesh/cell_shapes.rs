//! Reference cells: node orderings, shape functions, and isoparametric maps.
//!
//! Background elements and integration cells share a common catalogue of
//! linear reference shapes. Volume shapes span `Hex8`, `Tet4`, `Wedge6` and
//! `Pyramid5`; `Quad4` and `Tri3` double as embedded surface elements and as
//! element faces; `Line2` is the embedded line element and the edge shape.
//!
//! Conventions:
//! * `Hex8` and `Quad4` live on `[-1, 1]^d`; `Tet4` and `Tri3` on the unit
//!   simplex; `Wedge6` is the unit triangle times `[-1, 1]`; `Pyramid5` has
//!   its `[-1, 1]^2` base at `ζ = 0` and its apex at `(0, 0, 1)`; `Line2`
//!   spans `ξ ∈ [-1, 1]`.
//! * Face tables wind outward: the right-hand rule around a face's node cycle
//!   points out of the element.

use crate::error::CutError;
use crate::math::{Matrix, Point, Real, Vector};
use crate::tolerance::CutTolerances;
use arrayvec::ArrayVec;

/// The largest node count among the supported cell shapes.
pub const MAX_NODES: usize = 8;

/// Shape function values at a local point, one per node.
pub type ShapeValues = ArrayVec<Real, MAX_NODES>;

/// Shape function gradients (w.r.t. local coordinates) at a local point.
pub type ShapeGradients = ArrayVec<Vector<Real>, MAX_NODES>;

/// The catalogue of linear cell shapes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum CellShape {
    /// A two-node line segment.
    Line2,
    /// A three-node triangle.
    Tri3,
    /// A four-node quadrilateral.
    Quad4,
    /// A four-node tetrahedron.
    Tet4,
    /// An eight-node hexahedron.
    Hex8,
    /// A six-node wedge (triangular prism).
    Wedge6,
    /// A five-node pyramid with a quadrilateral base.
    Pyramid5,
}

const LINE2_NODES: [[Real; 3]; 2] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRI3_NODES: [[Real; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const QUAD4_NODES: [[Real; 3]; 4] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
];
const TET4_NODES: [[Real; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];
const HEX8_NODES: [[Real; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];
const WEDGE6_NODES: [[Real; 3]; 6] = [
    [0.0, 0.0, -1.0],
    [1.0, 0.0, -1.0],
    [0.0, 1.0, -1.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
];
const PYRAMID5_NODES: [[Real; 3]; 5] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

const LINE2_EDGES: [[usize; 2]; 1] = [[0, 1]];
const TRI3_EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];
const QUAD4_EDGES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];
const TET4_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];
const HEX8_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
    [4, 5],
    [5, 6],
    [6, 7],
    [7, 4],
];
const WEDGE6_EDGES: [[usize; 2]; 9] = [
    [0, 1],
    [1, 2],
    [2, 0],
    [0, 3],
    [1, 4],
    [2, 5],
    [3, 4],
    [4, 5],
    [5, 3],
];
const PYRAMID5_EDGES: [[usize; 2]; 8] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [0, 4],
    [1, 4],
    [2, 4],
    [3, 4],
];

const TET4_FACES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const HEX8_FACES: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
];
const WEDGE6_FACES: [&[usize]; 5] = [
    &[0, 2, 1],
    &[3, 4, 5],
    &[0, 1, 4, 3],
    &[1, 2, 5, 4],
    &[2, 0, 3, 5],
];
const PYRAMID5_FACES: [&[usize]; 5] = [
    &[0, 3, 2, 1],
    &[0, 1, 4],
    &[1, 2, 4],
    &[2, 3, 4],
    &[3, 0, 4],
];

// Positively oriented splits into Tet4, used when tessellating cells that
// kept their original shape.
const TET4_TETS: [[usize; 4]; 1] = [[0, 1, 2, 3]];
const HEX8_TETS: [[usize; 4]; 5] = [
    [0, 1, 3, 4],
    [1, 2, 3, 6],
    [4, 5, 1, 6],
    [6, 7, 3, 4],
    [1, 6, 3, 4],
];
const WEDGE6_TETS: [[usize; 4]; 3] = [[0, 1, 2, 3], [3, 4, 1, 5], [1, 5, 2, 3]];
const PYRAMID5_TETS: [[usize; 4]; 2] = [[0, 1, 3, 4], [1, 2, 3, 4]];

impl CellShape {
    /// The number of nodes of this shape.
    #[inline]
    pub fn node_count(self) -> usize {
        self.reference_nodes().len()
    }

    /// The intrinsic dimension of this shape (1, 2 or 3).
    #[inline]
    pub fn intrinsic_dim(self) -> usize {
        match self {
            CellShape::Line2 => 1,
            CellShape::Tri3 | CellShape::Quad4 => 2,
            CellShape::Tet4 | CellShape::Hex8 | CellShape::Wedge6 | CellShape::Pyramid5 => 3,
        }
    }

    /// The local coordinates of this shape's nodes.
    #[inline]
    pub fn reference_nodes(self) -> &'static [[Real; 3]] {
        match self {
            CellShape::Line2 => &LINE2_NODES,
            CellShape::Tri3 => &TRI3_NODES,
            CellShape::Quad4 => &QUAD4_NODES,
            CellShape::Tet4 => &TET4_NODES,
            CellShape::Hex8 => &HEX8_NODES,
            CellShape::Wedge6 => &WEDGE6_NODES,
            CellShape::Pyramid5 => &PYRAMID5_NODES,
        }
    }

    /// The node index pairs forming this shape's edges.
    #[inline]
    pub fn edges(self) -> &'static [[usize; 2]] {
        match self {
            CellShape::Line2 => &LINE2_EDGES,
            CellShape::Tri3 => &TRI3_EDGES,
            CellShape::Quad4 => &QUAD4_EDGES,
            CellShape::Tet4 => &TET4_EDGES,
            CellShape::Hex8 => &HEX8_EDGES,
            CellShape::Wedge6 => &WEDGE6_EDGES,
            CellShape::Pyramid5 => &PYRAMID5_EDGES,
        }
    }

    /// The outward-wound faces of a volume shape; empty for shapes of
    /// intrinsic dimension below three.
    #[inline]
    pub fn faces(self) -> &'static [&'static [usize]] {
        match self {
            CellShape::Tet4 => &TET4_FACES,
            CellShape::Hex8 => &HEX8_FACES,
            CellShape::Wedge6 => &WEDGE6_FACES,
            CellShape::Pyramid5 => &PYRAMID5_FACES,
            _ => &[],
        }
    }

    /// A positively oriented split of a volume shape into tetrahedra, given as
    /// node index quadruples. `None` for non-volume shapes.
    #[inline]
    pub fn tet_split(self) -> Option<&'static [[usize; 4]]> {
        match self {
            CellShape::Tet4 => Some(&TET4_TETS),
            CellShape::Hex8 => Some(&HEX8_TETS),
            CellShape::Wedge6 => Some(&WEDGE6_TETS),
            CellShape::Pyramid5 => Some(&PYRAMID5_TETS),
            _ => None,
        }
    }

    /// The measure (length/area/volume) of the reference shape.
    #[inline]
    pub fn reference_volume(self) -> Real {
        match self {
            CellShape::Line2 => 2.0,
            CellShape::Tri3 => 0.5,
            CellShape::Quad4 => 4.0,
            CellShape::Tet4 => 1.0 / 6.0,
            CellShape::Hex8 => 8.0,
            CellShape::Wedge6 => 1.0,
            CellShape::Pyramid5 => 4.0 / 3.0,
        }
    }

    /// The centroid of the reference shape, in local coordinates.
    #[inline]
    pub fn reference_center(self) -> Point<Real> {
        match self {
            CellShape::Line2 | CellShape::Quad4 | CellShape::Hex8 => Point::origin(),
            CellShape::Tri3 => Point::new(1.0 / 3.0, 1.0 / 3.0, 0.0),
            CellShape::Tet4 => Point::new(0.25, 0.25, 0.25),
            CellShape::Wedge6 => Point::new(1.0 / 3.0, 1.0 / 3.0, 0.0),
            CellShape::Pyramid5 => Point::new(0.0, 0.0, 0.25),
        }
    }

    /// Does `local` lie inside the reference shape, with its boundary pushed
    /// outward by `slack`?
    pub fn contains_reference(self, local: &Point<Real>, slack: Real) -> bool {
        let (x, y, z) = (local.x, local.y, local.z);
        match self {
            CellShape::Line2 => x.abs() <= 1.0 + slack,
            CellShape::Tri3 => x >= -slack && y >= -slack && x + y <= 1.0 + slack,
            CellShape::Quad4 => x.abs() <= 1.0 + slack && y.abs() <= 1.0 + slack,
            CellShape::Tet4 => {
                x >= -slack && y >= -slack && z >= -slack && x + y + z <= 1.0 + slack
            }
            CellShape::Hex8 => {
                x.abs() <= 1.0 + slack && y.abs() <= 1.0 + slack && z.abs() <= 1.0 + slack
            }
            CellShape::Wedge6 => {
                x >= -slack && y >= -slack && x + y <= 1.0 + slack && z.abs() <= 1.0 + slack
            }
            CellShape::Pyramid5 => {
                z >= -slack
                    && z <= 1.0 + slack
                    && x.abs() <= 1.0 - z + slack
                    && y.abs() <= 1.0 - z + slack
            }
        }
    }

    /// Evaluates the shape functions at a local point.
    pub fn shape_functions(self, local: &Point<Real>) -> ShapeValues {
        let (x, y, z) = (local.x, local.y, local.z);
        let mut values = ShapeValues::new();
        match self {
            CellShape::Line2 => {
                values.extend([(1.0 - x) * 0.5, (1.0 + x) * 0.5]);
            }
            CellShape::Tri3 => {
                values.extend([1.0 - x - y, x, y]);
            }
            CellShape::Quad4 => {
                for n in self.reference_nodes() {
                    values.push(0.25 * (1.0 + n[0] * x) * (1.0 + n[1] * y));
                }
            }
            CellShape::Tet4 => {
                values.extend([1.0 - x - y - z, x, y, z]);
            }
            CellShape::Hex8 => {
                for n in self.reference_nodes() {
                    values.push(0.125 * (1.0 + n[0] * x) * (1.0 + n[1] * y) * (1.0 + n[2] * z));
                }
            }
            CellShape::Wedge6 => {
                let t = 1.0 - x - y;
                values.extend([
                    t * (1.0 - z) * 0.5,
                    x * (1.0 - z) * 0.5,
                    y * (1.0 - z) * 0.5,
                    t * (1.0 + z) * 0.5,
                    x * (1.0 + z) * 0.5,
                    y * (1.0 + z) * 0.5,
                ]);
            }
            CellShape::Pyramid5 => {
                // Rational pyramid basis; the apex singularity is clamped away.
                let h = (1.0 - z).max(Real::EPSILON * 4.0);
                let r = x * y * z / h;
                values.extend([
                    0.25 * ((1.0 - x) * (1.0 - y) - z + r),
                    0.25 * ((1.0 + x) * (1.0 - y) - z - r),
                    0.25 * ((1.0 + x) * (1.0 + y) - z + r),
                    0.25 * ((1.0 - x) * (1.0 + y) - z - r),
                    z,
                ]);
            }
        }
        values
    }

    /// Evaluates the shape function gradients (w.r.t. local coordinates) at a
    /// local point. Components beyond the intrinsic dimension are zero.
    pub fn shape_gradients(self, local: &Point<Real>) -> ShapeGradients {
        let (x, y, z) = (local.x, local.y, local.z);
        let mut grads = ShapeGradients::new();
        match self {
            CellShape::Line2 => {
                grads.extend([Vector::new(-0.5, 0.0, 0.0), Vector::new(0.5, 0.0, 0.0)]);
            }
            CellShape::Tri3 => {
                grads.extend([
                    Vector::new(-1.0, -1.0, 0.0),
                    Vector::new(1.0, 0.0, 0.0),
                    Vector::new(0.0, 1.0, 0.0),
                ]);
            }
            CellShape::Quad4 => {
                for n in self.reference_nodes() {
                    grads.push(Vector::new(
                        0.25 * n[0] * (1.0 + n[1] * y),
                        0.25 * n[1] * (1.0 + n[0] * x),
                        0.0,
                    ));
                }
            }
            CellShape::Tet4 => {
                grads.extend([
                    Vector::new(-1.0, -1.0, -1.0),
                    Vector::new(1.0, 0.0, 0.0),
                    Vector::new(0.0, 1.0, 0.0),
                    Vector::new(0.0, 0.0, 1.0),
                ]);
            }
            CellShape::Hex8 => {
                for n in self.reference_nodes() {
                    grads.push(Vector::new(
                        0.125 * n[0] * (1.0 + n[1] * y) * (1.0 + n[2] * z),
                        0.125 * n[1] * (1.0 + n[0] * x) * (1.0 + n[2] * z),
                        0.125 * n[2] * (1.0 + n[0] * x) * (1.0 + n[1] * y),
                    ));
                }
            }
            CellShape::Wedge6 => {
                let t = 1.0 - x - y;
                let lo = (1.0 - z) * 0.5;
                let hi = (1.0 + z) * 0.5;
                grads.extend([
                    Vector::new(-lo, -lo, -t * 0.5),
                    Vector::new(lo, 0.0, -x * 0.5),
                    Vector::new(0.0, lo, -y * 0.5),
                    Vector::new(-hi, -hi, t * 0.5),
                    Vector::new(hi, 0.0, x * 0.5),
                    Vector::new(0.0, hi, y * 0.5),
                ]);
            }
            CellShape::Pyramid5 => {
                let h = (1.0 - z).max(Real::EPSILON * 4.0);
                let zh = z / h;
                let h2 = x * y / (h * h);
                grads.extend([
                    Vector::new(
                        0.25 * (-(1.0 - y) + y * zh),
                        0.25 * (-(1.0 - x) + x * zh),
                        0.25 * (-1.0 + h2),
                    ),
                    Vector::new(
                        0.25 * ((1.0 - y) - y * zh),
                        0.25 * (-(1.0 + x) - x * zh),
                        0.25 * (-1.0 - h2),
                    ),
                    Vector::new(
                        0.25 * ((1.0 + y) + y * zh),
                        0.25 * ((1.0 + x) + x * zh),
                        0.25 * (-1.0 + h2),
                    ),
                    Vector::new(
                        0.25 * (-(1.0 + y) - y * zh),
                        0.25 * ((1.0 - x) - x * zh),
                        0.25 * (-1.0 - h2),
                    ),
                    Vector::new(0.0, 0.0, 1.0),
                ]);
            }
        }
        grads
    }

    /// Maps a local point to global space through the isoparametric map
    /// spanned by `nodes`.
    pub fn local_to_global(self, nodes: &[Point<Real>], local: &Point<Real>) -> Point<Real> {
        let values = self.shape_functions(local);
        let mut res = Vector::zeros();
        for (v, pt) in values.iter().zip(nodes.iter()) {
            res += pt.coords * *v;
        }
        Point::from(res)
    }

    /// The jacobian of the isoparametric map at a local point, with columns
    /// `∂x/∂ξ_k`. Columns beyond the intrinsic dimension are zero.
    pub fn jacobian(self, nodes: &[Point<Real>], local: &Point<Real>) -> Matrix<Real> {
        let grads = self.shape_gradients(local);
        let mut j = Matrix::zeros();
        for (g, pt) in grads.iter().zip(nodes.iter()) {
            j += pt.coords * g.transpose();
        }
        j
    }

    /// Inverts the isoparametric map by Newton iteration: finds the local
    /// coordinates of `global` within the element spanned by `nodes`.
    ///
    /// For shapes of intrinsic dimension below three the result is the
    /// least-squares preimage, i.e. `global` is first projected onto the
    /// element manifold.
    pub fn global_to_local(
        self,
        nodes: &[Point<Real>],
        global: &Point<Real>,
        tol: &CutTolerances,
    ) -> Result<Point<Real>, CutError> {
        let dim = self.intrinsic_dim();
        let mut local = self.reference_center();

        for _ in 0..tol.max_newton_iterations {
            let residual = global - self.local_to_global(nodes, &local);
            let j = self.jacobian(nodes, &local);
            let step = match dim {
                3 => j.lu().solve(&residual),
                2 => {
                    let jr = j.fixed_view::<3, 2>(0, 0).into_owned();
                    let jtj = jr.transpose() * jr;
                    let rhs = jr.transpose() * residual;
                    jtj.try_inverse().map(|inv| {
                        let s = inv * rhs;
                        Vector::new(s.x, s.y, 0.0)
                    })
                }
                _ => {
                    let col = j.column(0).into_owned();
                    let nn = col.norm_squared();
                    if nn > 0.0 {
                        Some(Vector::new(col.dot(&residual) / nn, 0.0, 0.0))
                    } else {
                        None
                    }
                }
            };

            let step = match step {
                Some(step) => step,
                None => return Err(CutError::InverseMapDiverged),
            };

            local += step;
            if step.norm() <= tol.newton * (1.0 + local.coords.norm()) {
                return Ok(local);
            }
        }

        Err(CutError::InverseMapDiverged)
    }
}

#[cfg(test)]
mod tests {
    use super::CellShape;
    use crate::math::{Point, Real, Vector};
    use crate::tolerance::CutTolerances;

    const ALL: [CellShape; 7] = [
        CellShape::Line2,
        CellShape::Tri3,
        CellShape::Quad4,
        CellShape::Tet4,
        CellShape::Hex8,
        CellShape::Wedge6,
        CellShape::Pyramid5,
    ];

    fn reference_points(shape: CellShape) -> Vec<Point<Real>> {
        shape
            .reference_nodes()
            .iter()
            .map(|n| Point::new(n[0], n[1], n[2]))
            .collect()
    }

    #[test]
    fn shape_functions_interpolate_their_nodes() {
        for shape in ALL {
            for (i, n) in shape.reference_nodes().iter().enumerate() {
                let at = Point::new(n[0], n[1], n[2]);
                let values = shape.shape_functions(&at);
                for (j, v) in values.iter().enumerate() {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_relative_eq!(*v, expected, epsilon = Real::EPSILON * 100.0);
                }
            }
        }
    }

    #[test]
    fn shape_functions_sum_to_one() {
        for shape in ALL {
            let mut at = shape.reference_center();
            at.x += 0.11;
            if shape.intrinsic_dim() > 1 {
                at.y += 0.07;
            }
            if shape.intrinsic_dim() > 2 {
                at.z -= 0.19;
            }
            let sum: Real = shape.shape_functions(&at).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = Real::EPSILON * 100.0);
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        // Cube-root step balances truncation against round-off in both
        // precisions.
        let h = Real::EPSILON.cbrt();
        for shape in ALL {
            let at = shape.reference_center();
            let grads = shape.shape_gradients(&at);
            for k in 0..shape.intrinsic_dim() {
                let mut fwd = at;
                let mut bwd = at;
                fwd[k] += h;
                bwd[k] -= h;
                let vf = shape.shape_functions(&fwd);
                let vb = shape.shape_functions(&bwd);
                for (i, g) in grads.iter().enumerate() {
                    let fd = (vf[i] - vb[i]) / (2.0 * h);
                    assert_relative_eq!(g[k], fd, epsilon = h * h * 100.0);
                }
            }
        }
    }

    #[test]
    fn faces_wind_outward_on_the_reference_cell() {
        for shape in [
            CellShape::Tet4,
            CellShape::Hex8,
            CellShape::Wedge6,
            CellShape::Pyramid5,
        ] {
            let nodes = reference_points(shape);
            let center = shape.reference_center();
            for face in shape.faces() {
                let a = nodes[face[0]];
                let b = nodes[face[1]];
                let c = nodes[face[2]];
                let normal = (b - a).cross(&(c - a));
                let face_mid = crate::utils::center(
                    &face.iter().map(|&i| nodes[i]).collect::<Vec<_>>(),
                );
                assert!(
                    normal.dot(&(face_mid - center)) > 0.0,
                    "face of {shape:?} winds inward"
                );
            }
        }
    }

    #[test]
    fn tet_splits_fill_the_reference_volume() {
        for shape in [
            CellShape::Tet4,
            CellShape::Hex8,
            CellShape::Wedge6,
            CellShape::Pyramid5,
        ] {
            let nodes = reference_points(shape);
            let mut total = 0.0;
            for tet in shape.tet_split().unwrap() {
                let [a, b, c, d] = tet.map(|i| nodes[i]);
                let vol = (b - a).cross(&(c - a)).dot(&(d - a)) / 6.0;
                assert!(vol > 0.0, "negatively oriented tet in {shape:?} split");
                total += vol;
            }
            assert_relative_eq!(total, shape.reference_volume(), epsilon = Real::EPSILON * 100.0);
        }
    }

    #[test]
    fn inverse_map_round_trips_on_a_distorted_hex() {
        let nodes = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.1, 0.0, 0.1),
            Point::new(1.2, 1.0, 0.0),
            Point::new(-0.1, 0.9, 0.05),
            Point::new(0.0, 0.1, 1.0),
            Point::new(1.0, 0.0, 1.2),
            Point::new(1.1, 1.1, 1.1),
            Point::new(0.0, 1.0, 0.9),
        ];
        let tol = CutTolerances::default();
        let local = Point::new(0.3, -0.5, 0.7);
        let global = CellShape::Hex8.local_to_global(&nodes, &local);
        let back = CellShape::Hex8
            .global_to_local(&nodes, &global, &tol)
            .unwrap();
        assert_relative_eq!(back, local, epsilon = Real::EPSILON * 1.0e5);
    }

    #[test]
    fn inverse_map_projects_onto_surface_elements() {
        let nodes = [
            Point::new(0.0, 0.0, 1.0),
            Point::new(2.0, 0.0, 1.0),
            Point::new(2.0, 2.0, 1.0),
            Point::new(0.0, 2.0, 1.0),
        ];
        let tol = CutTolerances::default();
        // A point off the plane projects down onto it.
        let local = CellShape::Quad4
            .global_to_local(&nodes, &Point::new(1.5, 1.0, 3.0), &tol)
            .unwrap();
        assert_relative_eq!(local, Point::new(0.5, 0.0, 0.0), epsilon = Real::EPSILON * 1.0e5);
    }

    #[test]
    fn containment_respects_slack() {
        let inside = Point::new(0.2, 0.2, 0.2);
        let outside = Point::new(0.5, 0.5, 0.5);
        assert!(CellShape::Tet4.contains_reference(&inside, 0.0));
        assert!(!CellShape::Tet4.contains_reference(&outside, 0.0));
        assert!(CellShape::Tet4.contains_reference(&outside, 0.6));

        let graze = Point::new(1.0 + Real::EPSILON * 4.0, 0.0, 0.0);
        assert!(!CellShape::Hex8.contains_reference(&graze, 0.0));
        assert!(CellShape::Hex8.contains_reference(&graze, Real::EPSILON * 8.0));
    }
}
