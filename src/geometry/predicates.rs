//! Tolerance-banded geometric predicates used by the intersection stage.

use crate::math::{Point, Real, Vector};
use na::Point2;

/// The outcome of a tolerance-banded segment/triangle intersection test.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SegmentTriangleHit {
    /// A single transversal intersection.
    Single {
        /// Parameter along the segment; inside `[0, 1]` up to the slack band.
        t: Real,
        /// Barycentric coordinates of the hit with respect to the triangle.
        bary: [Real; 3],
    },
    /// The segment is parallel to the triangle plane and lies within its
    /// tolerance band, so the intersection is not a single point.
    Coplanar,
    /// No intersection.
    Miss,
}

/// Intersects the segment `[p, q]` with the triangle `(a, b, c)`.
///
/// `parallelism` bounds the sine of the segment/plane angle below which the
/// configuration counts as parallel. `slack` widens the acceptance bands of
/// the segment parameter and the barycentric coordinates, so grazing hits near
/// nodes and edges are reported instead of dropped; the caller decides whether
/// to snap them.
pub fn segment_triangle_intersection(
    p: &Point<Real>,
    q: &Point<Real>,
    a: &Point<Real>,
    b: &Point<Real>,
    c: &Point<Real>,
    parallelism: Real,
    slack: Real,
) -> SegmentTriangleHit {
    let dir = q - p;
    let n = (b - a).cross(&(c - a));
    let nn = n.norm();
    let dd = dir.norm();
    if nn == 0.0 || dd == 0.0 {
        return SegmentTriangleHit::Miss;
    }

    let denom = n.dot(&dir);
    if denom.abs() <= parallelism * nn * dd {
        // Parallel; in-plane if the segment start sits inside the plane band.
        let dist = n.dot(&(p - a)) / nn;
        if dist.abs() <= slack * dd {
            return SegmentTriangleHit::Coplanar;
        }
        return SegmentTriangleHit::Miss;
    }

    let t = n.dot(&(a - p)) / denom;
    if t < -slack || t > 1.0 + slack {
        return SegmentTriangleHit::Miss;
    }

    let x = p + dir * t;
    let nn2 = n.norm_squared();
    let w_c = (b - a).cross(&(x - a)).dot(&n) / nn2;
    let w_b = (x - a).cross(&(c - a)).dot(&n) / nn2;
    let w_a = 1.0 - w_b - w_c;

    if w_a < -slack || w_b < -slack || w_c < -slack {
        return SegmentTriangleHit::Miss;
    }

    SegmentTriangleHit::Single {
        t,
        bary: [w_a, w_b, w_c],
    }
}

/// Even-odd test for a point inside a closed 2-D polygon.
///
/// Points on the boundary may land on either side; callers that care use a
/// point strictly away from it.
pub fn point_in_polygon2(p: &Point2<Real>, polygon: &[Point2<Real>]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// The point of the triangle `(a, b, c)` closest to `p`.
pub fn closest_point_on_triangle(
    p: &Point<Real>,
    a: &Point<Real>,
    b: &Point<Real>,
    c: &Point<Real>,
) -> Point<Real> {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && d4 - d3 >= 0.0 && d5 - d6 >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}

/// The angle of `v` around the axis `axis`, measured from the reference
/// direction `reference`, in `[0, 2π)`.
///
/// `axis` must be a unit vector; `reference` and `v` are projected onto the
/// plane orthogonal to it. This is the sort key when pairing facets around a
/// shared line.
#[cfg(feature = "std")]
pub fn angle_around_axis(axis: &Vector<Real>, reference: &Vector<Real>, v: &Vector<Real>) -> Real {
    let cos = reference.dot(v) - reference.dot(axis) * v.dot(axis);
    let sin = axis.dot(&reference.cross(v));
    let angle = sin.atan2(cos);
    if angle < 0.0 {
        angle + 2.0 * std::f64::consts::PI as Real
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Point, Vector};

    const TOL: Real = 1.0e-12;

    fn tri() -> [Point<Real>; 3] {
        [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn transversal_hit_reports_parameter_and_barycentrics() {
        let [a, b, c] = tri();
        let p = Point::new(0.25, 0.25, -1.0);
        let q = Point::new(0.25, 0.25, 3.0);
        match segment_triangle_intersection(&p, &q, &a, &b, &c, TOL, TOL) {
            SegmentTriangleHit::Single { t, bary } => {
                assert_relative_eq!(t, 0.25, epsilon = Real::EPSILON * 100.0);
                assert_relative_eq!(bary[0], 0.5, epsilon = Real::EPSILON * 100.0);
                assert_relative_eq!(bary[1], 0.25, epsilon = Real::EPSILON * 100.0);
                assert_relative_eq!(bary[2], 0.25, epsilon = Real::EPSILON * 100.0);
            }
            other => panic!("expected a single hit, got {other:?}"),
        }
    }

    #[test]
    fn hit_outside_the_triangle_is_a_miss() {
        let [a, b, c] = tri();
        let p = Point::new(0.9, 0.9, -1.0);
        let q = Point::new(0.9, 0.9, 1.0);
        assert_eq!(
            segment_triangle_intersection(&p, &q, &a, &b, &c, TOL, TOL),
            SegmentTriangleHit::Miss
        );
    }

    #[test]
    fn parallel_segments_are_coplanar_or_miss() {
        let [a, b, c] = tri();
        let p = Point::new(0.1, 0.1, 0.0);
        let q = Point::new(0.5, 0.1, 0.0);
        assert_eq!(
            segment_triangle_intersection(&p, &q, &a, &b, &c, 1.0e-9, 1.0e-9),
            SegmentTriangleHit::Coplanar
        );

        let p = Point::new(0.1, 0.1, 0.5);
        let q = Point::new(0.5, 0.1, 0.5);
        assert_eq!(
            segment_triangle_intersection(&p, &q, &a, &b, &c, 1.0e-9, 1.0e-9),
            SegmentTriangleHit::Miss
        );
    }

    #[test]
    fn slack_band_accepts_a_grazing_hit() {
        let [a, b, c] = tri();
        // Passes a hair outside the a-b edge.
        let p = Point::new(0.5, -1.0e-9, -1.0);
        let q = Point::new(0.5, -1.0e-9, 1.0);
        assert_eq!(
            segment_triangle_intersection(&p, &q, &a, &b, &c, 1.0e-12, 0.0),
            SegmentTriangleHit::Miss
        );
        assert!(matches!(
            segment_triangle_intersection(&p, &q, &a, &b, &c, 1.0e-12, 1.0e-6),
            SegmentTriangleHit::Single { .. }
        ));
    }

    #[test]
    fn polygon_containment_handles_concave_rings() {
        use na::Point2;

        // L-shape; (1.5, 1.5) sits in the notch.
        let poly = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert!(point_in_polygon2(&Point2::new(0.5, 0.5), &poly));
        assert!(point_in_polygon2(&Point2::new(1.5, 0.5), &poly));
        assert!(!point_in_polygon2(&Point2::new(1.5, 1.5), &poly));
        assert!(!point_in_polygon2(&Point2::new(-0.5, 0.5), &poly));
    }

    #[test]
    fn closest_triangle_point_by_region() {
        let [a, b, c] = tri();

        // Above the interior: projects straight down.
        let cp = closest_point_on_triangle(&Point::new(0.2, 0.2, 1.0), &a, &b, &c);
        assert_relative_eq!(cp, Point::new(0.2, 0.2, 0.0), epsilon = Real::EPSILON * 100.0);

        // Beyond a vertex: clamps to it.
        let cp = closest_point_on_triangle(&Point::new(2.0, -1.0, 0.0), &a, &b, &c);
        assert_relative_eq!(cp, b, epsilon = Real::EPSILON * 100.0);

        // Past the hypotenuse: lands on it.
        let cp = closest_point_on_triangle(&Point::new(1.0, 1.0, 0.0), &a, &b, &c);
        assert_relative_eq!(cp, Point::new(0.5, 0.5, 0.0), epsilon = Real::EPSILON * 100.0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn angles_sort_counter_clockwise() {
        let axis = Vector::z();
        let reference = Vector::x();
        assert_relative_eq!(
            angle_around_axis(&axis, &reference, &Vector::x()),
            0.0,
            epsilon = Real::EPSILON * 100.0
        );
        assert_relative_eq!(
            angle_around_axis(&axis, &reference, &Vector::y()),
            std::f64::consts::FRAC_PI_2 as Real,
            epsilon = Real::EPSILON * 100.0
        );
        assert_relative_eq!(
            angle_around_axis(&axis, &reference, &-Vector::y()),
            3.0 * std::f64::consts::FRAC_PI_2 as Real,
            epsilon = Real::EPSILON * 100.0
        );
    }
}
