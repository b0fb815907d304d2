//! Exact basis moments of triangulated facets and polyhedral cells.
//!
//! Facet moments integrate the basis over a triangulation directly. Cell
//! moments apply the divergence theorem to the cell's outward-oriented
//! boundary triangles, so only surface quadrature is ever needed. Both map a
//! reference triangle rule of high enough degree through the affine triangle
//! maps, which keeps every integral exact for a polynomial basis.

use crate::integrate::basis::MonomialBasis;
use crate::integrate::gauss;
use crate::math::{Point, Real};
use crate::mesh::CellShape;

/// The integral of every basis function over a triangulated surface.
///
/// Triangles and basis must live in the same (usually facet plane) frame.
pub fn surface_moments(triangles: &[[Point<Real>; 3]], basis: &MonomialBasis) -> Vec<Real> {
    let rule = gauss::reference_rule(CellShape::Tri3, basis.degree());
    let mut moments = vec![0.0; basis.len()];
    let mut values = vec![0.0; basis.len()];

    for tri in triangles {
        let ab = tri[1] - tri[0];
        let ac = tri[2] - tri[0];
        // Area scale of the affine map; twice the triangle area.
        let jacobian = ab.cross(&ac).norm();
        for (p, w) in rule.iter() {
            let x = tri[0] + ab * p.x + ac * p.y;
            basis.eval_into(&x, &mut values);
            for (moment, value) in moments.iter_mut().zip(values.iter()) {
                *moment += w * jacobian * value;
            }
        }
    }

    moments
}

/// The integral of every basis function over the solid bounded by the given
/// outward-oriented triangles, via the divergence theorem.
///
/// Integrating the x-antiderivative of each basis function against the x
/// component of the area normal over the boundary recovers the volume
/// integral; the rule degree is raised by one to cover the antiderivative.
pub fn solid_moments(triangles: &[[Point<Real>; 3]], basis: &MonomialBasis) -> Vec<Real> {
    let rule = gauss::reference_rule(CellShape::Tri3, basis.degree() + 1);
    let mut moments = vec![0.0; basis.len()];

    for tri in triangles {
        let ab = tri[1] - tri[0];
        let ac = tri[2] - tri[0];
        // Area-weighted normal; its norm is twice the triangle area.
        let area_normal = ab.cross(&ac);
        for (p, w) in rule.iter() {
            let x = tri[0] + ab * p.x + ac * p.y;
            for (k, moment) in moments.iter_mut().enumerate() {
                *moment += w * area_normal.x * basis.x_primitive(k, &x);
            }
        }
    }

    moments
}

#[cfg(test)]
mod tests {
    use super::{solid_moments, surface_moments};
    use crate::integrate::basis::MonomialBasis;
    use crate::math::{Point, Real};

    #[test]
    fn unit_square_surface_moments() {
        let corners = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ];
        let triangles = [
            [corners[0], corners[1], corners[2]],
            [corners[0], corners[2], corners[3]],
        ];
        let basis = MonomialBasis::surface(2, Point::origin(), 1.0);
        let moments = surface_moments(&triangles, &basis);

        // 1, x, y, x^2, xy, y^2 over the unit square.
        let expected: [Real; 6] = [1.0, 0.5, 0.5, 1.0 / 3.0, 0.25, 1.0 / 3.0];
        for (moment, expected) in moments.iter().zip(expected.iter()) {
            assert_relative_eq!(*moment, *expected, epsilon = Real::EPSILON * 100.0);
        }
    }

    #[test]
    fn unit_cube_solid_moments() {
        let triangles = unit_cube_boundary();
        let basis = MonomialBasis::volume(2, Point::origin(), 1.0);
        let moments = solid_moments(&triangles, &basis);

        // Ordering: 1, x, y, z, x^2, xy, xz, y^2, yz, z^2.
        let expected: [Real; 10] = [
            1.0,
            0.5,
            0.5,
            0.5,
            1.0 / 3.0,
            0.25,
            0.25,
            1.0 / 3.0,
            0.25,
            1.0 / 3.0,
        ];
        for (moment, expected) in moments.iter().zip(expected.iter()) {
            assert_relative_eq!(*moment, *expected, epsilon = Real::EPSILON * 100.0);
        }
    }

    #[test]
    fn moments_shift_with_the_basis_center() {
        let triangles = unit_cube_boundary();
        let basis = MonomialBasis::volume(1, Point::new(0.5, 0.5, 0.5), 0.5);
        let moments = solid_moments(&triangles, &basis);

        // Centered odd monomials integrate to zero over the cube.
        assert_relative_eq!(moments[0], 1.0, epsilon = Real::EPSILON * 100.0);
        for moment in &moments[1..] {
            assert_relative_eq!(*moment, 0.0, epsilon = Real::EPSILON * 100.0);
        }
    }

    /// The boundary of the cube `[0, 1]^3` as 12 outward-oriented triangles.
    fn unit_cube_boundary() -> Vec<[Point<Real>; 3]> {
        use crate::mesh::CellShape;

        let corners: Vec<Point<Real>> = CellShape::Hex8
            .reference_nodes()
            .iter()
            .map(|n| Point::new((n[0] + 1.0) * 0.5, (n[1] + 1.0) * 0.5, (n[2] + 1.0) * 0.5))
            .collect();

        let mut triangles = Vec::new();
        for face in CellShape::Hex8.faces() {
            triangles.push([corners[face[0]], corners[face[1]], corners[face[2]]]);
            triangles.push([corners[face[0]], corners[face[2]], corners[face[3]]]);
        }
        triangles
    }
}
