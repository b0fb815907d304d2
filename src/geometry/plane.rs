//! Oriented planes and best-fit planes of facet cycles.

use crate::geometry::polygon::polygon_area_vector;
use crate::math::{Point, Real, UnitVector, Vector, DEFAULT_EPSILON};
use crate::utils;

/// An oriented plane, given by a unit normal and a point it passes through.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Plane {
    /// The unit normal of the plane.
    pub normal: UnitVector<Real>,
    /// A reference point the plane passes through.
    pub origin: Point<Real>,
}

impl Plane {
    /// Creates a plane from its unit normal and a point it passes through.
    #[inline]
    pub fn new(normal: UnitVector<Real>, origin: Point<Real>) -> Self {
        Self { normal, origin }
    }

    /// Computes the best-fit plane of a polygon cycle.
    ///
    /// The normal follows the polygon winding (right-hand rule) and the
    /// reference point is the vertex average. Returns `None` if the polygon
    /// area vanishes.
    pub fn from_cycle(points: &[Point<Real>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let normal = UnitVector::try_new(polygon_area_vector(points), DEFAULT_EPSILON)?;
        Some(Self {
            normal,
            origin: utils::center(points),
        })
    }

    /// The signed distance from `pt` to this plane, positive on the side the
    /// normal points into.
    #[inline]
    pub fn signed_distance(&self, pt: &Point<Real>) -> Real {
        self.normal.dot(&(pt - self.origin))
    }

    /// Two unit vectors spanning this plane, forming a right-handed frame with
    /// the normal.
    #[inline]
    pub fn tangents(&self) -> [Vector<Real>; 2] {
        utils::orthonormal_basis(&self.normal)
    }

    /// The largest absolute plane deviation among `points`.
    ///
    /// Compared against a scaled coplanarity tolerance, this decides whether a
    /// facet cycle is planar enough to be used as is.
    pub fn max_deviation(&self, points: &[Point<Real>]) -> Real {
        points.iter().fold(0.0, |acc: Real, pt| {
            acc.max(self.signed_distance(pt).abs())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Plane;
    use crate::math::{Point, Real, Vector};

    #[test]
    fn plane_of_a_ccw_square() {
        let square = [
            Point::new(0.0, 0.0, 2.0),
            Point::new(1.0, 0.0, 2.0),
            Point::new(1.0, 1.0, 2.0),
            Point::new(0.0, 1.0, 2.0),
        ];
        let plane = Plane::from_cycle(&square).unwrap();
        assert_relative_eq!(plane.normal.into_inner(), Vector::z(), epsilon = Real::EPSILON * 100.0);
        assert_relative_eq!(
            plane.signed_distance(&Point::new(0.3, 0.7, 3.5)),
            1.5,
            epsilon = Real::EPSILON * 100.0
        );
        assert_relative_eq!(plane.max_deviation(&square), 0.0, epsilon = Real::EPSILON * 100.0);
    }

    #[test]
    fn degenerate_cycle_has_no_plane() {
        let collinear = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
        ];
        assert!(Plane::from_cycle(&collinear).is_none());
    }

    #[test]
    fn deviation_of_a_warped_quad() {
        let warped = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 0.1),
            Point::new(0.0, 1.0, 0.0),
        ];
        let plane = Plane::from_cycle(&warped).unwrap();
        assert!(plane.max_deviation(&warped) > 0.01);
    }
}
