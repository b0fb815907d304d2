//! Planar polygon measures and triangulation.
//!
//! Facets produced by the cut are planar polygons embedded in 3-D space. The
//! routines here compute their area vectors and centroids and, for quadrature
//! generation, split them into triangles. Triangulation is ear-clipping based
//! so it also handles the non-convex rings that appear when a facet hole is
//! bridged into its outer cycle.

use crate::math::{Point, Real, Vector};
use crate::utils;
use na::Point2;

/// Computes the area vector of a closed polygon.
///
/// The norm of the result is the polygon area and its direction the winding
/// normal (right-hand rule). The result is exact for planar polygons,
/// including non-convex ones.
pub fn polygon_area_vector(points: &[Point<Real>]) -> Vector<Real> {
    let mut result = Vector::zeros();
    if points.len() < 3 {
        return result;
    }

    let p0 = points[0];
    for i in 1..points.len() - 1 {
        result += (points[i] - p0).cross(&(points[i + 1] - p0));
    }
    result * 0.5
}

/// Computes the area centroid of a planar polygon.
///
/// Falls back to the vertex average when the polygon area vanishes.
pub fn polygon_centroid(points: &[Point<Real>]) -> Point<Real> {
    let vertex_center = utils::center(points);
    let area = polygon_area_vector(points);
    let norm = area.norm();
    if norm == 0.0 {
        return vertex_center;
    }

    let normal = area / norm;
    let mut acc = Vector::zeros();
    let mut total = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let w = (a - vertex_center).cross(&(b - vertex_center)).dot(&normal);
        acc += (vertex_center.coords + a.coords + b.coords) * (w / 3.0);
        total += w;
    }

    if total != 0.0 {
        Point::from(acc / total)
    } else {
        vertex_center
    }
}

/// The winding direction of a corner `p1 -> p2 -> p3`.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
enum Orientation {
    Ccw,
    Cw,
    None,
}

fn corner_direction(p1: &Point2<Real>, p2: &Point2<Real>, p3: &Point2<Real>) -> Orientation {
    let v1 = p1 - p2;
    let v2 = p3 - p2;
    let cross: Real = v1.perp(&v2);

    match cross
        .partial_cmp(&0.0)
        .expect("Found NaN while computing corner direction.")
    {
        std::cmp::Ordering::Less => Orientation::Ccw,
        std::cmp::Ordering::Equal => Orientation::None,
        std::cmp::Ordering::Greater => Orientation::Cw,
    }
}

/// Returns `true` if `p` is in the triangle `v1, v2, v3`, or `None` if the
/// triangle is degenerate.
fn is_point_in_triangle(
    p: &Point2<Real>,
    v1: &Point2<Real>,
    v2: &Point2<Real>,
    v3: &Point2<Real>,
) -> Option<bool> {
    let d1 = corner_direction(p, v1, v2);
    let d2 = corner_direction(p, v2, v3);
    let d3 = corner_direction(p, v3, v1);

    let has_cw = d1 == Orientation::Cw || d2 == Orientation::Cw || d3 == Orientation::Cw;
    let has_ccw = d1 == Orientation::Ccw || d2 == Orientation::Ccw || d3 == Orientation::Ccw;

    if d1 == Orientation::None && d2 == Orientation::None && d3 == Orientation::None {
        None
    } else {
        Some(!(has_cw && has_ccw))
    }
}

/// The information stored for each vertex in the ear clipping algorithm.
#[cfg(feature = "std")]
#[derive(Clone, Default)]
struct VertexInfo {
    /// Whether the vertex is still active i.e. it has not been clipped yet.
    is_active: bool,
    /// Whether the vertex is the tip of an ear and should be clipped.
    is_ear: bool,
    /// How small the angle of the ear is. Ears with a smaller angle are clipped first.
    pointiness: Real,
    /// The index of the previous vertex.
    p_prev: usize,
    /// The index of the next vertex.
    p_next: usize,
}

/// Updates the fields `pointiness` and `is_ear` for a given vertex index.
#[cfg(feature = "std")]
fn update_vertex(idx: usize, vertex_info: &mut VertexInfo, points: &[Point2<Real>]) -> bool {
    let p = points[idx];
    let p1 = points[vertex_info.p_prev];
    let p3 = points[vertex_info.p_next];

    let vec1 = (p1 - p).normalize();
    let vec3 = (p3 - p).normalize();
    vertex_info.pointiness = vec1.dot(&vec3);
    if vertex_info.pointiness.is_nan() {
        return false;
    }

    // A vertex is an ear when it is convex and no other vertex lies inside the
    // triangle spanned by it and its two neighbors.
    let mut error = false;
    vertex_info.is_ear = corner_direction(&p1, &p, &p3) == Orientation::Ccw
        && (0..points.len())
            .filter(|&i| i != vertex_info.p_prev && i != idx && i != vertex_info.p_next)
            .all(|i| {
                if let Some(is) = is_point_in_triangle(&points[i], &p1, &p, &p3) {
                    !is
                } else {
                    error = true;
                    true
                }
            });
    !error
}

/// Ear clipping triangulation of a counter-clockwise 2-D polygon.
// Based on <https://github.com/ivanfratric/polypartition>.
#[cfg(feature = "std")]
fn triangulate_ear_clipping(vertices: &[Point2<Real>]) -> Option<Vec<[u32; 3]>> {
    let n_vertices = vertices.len();

    let mut vertex_info = vec![VertexInfo::default(); n_vertices];
    let success = vertex_info.iter_mut().enumerate().all(|(i, info)| {
        info.is_active = true;
        info.p_prev = if i == 0 { n_vertices - 1 } else { i - 1 };
        info.p_next = if i == n_vertices - 1 { 0 } else { i + 1 };
        update_vertex(i, info, vertices)
    });
    if !success {
        return None;
    }

    let mut output_indices = Vec::new();

    for i in 0..n_vertices - 3 {
        // Clip the pointiest of the remaining ears.
        let maybe_ear = vertex_info
            .iter()
            .enumerate()
            .filter(|(_, info)| info.is_active && info.is_ear)
            .max_by(|(_, info1), (_, info2)| {
                // The unwrap here is safe since we check for NaN when
                // we assign the pointiness value.
                info1.pointiness.partial_cmp(&info2.pointiness).unwrap()
            });

        let (ear_i, _) = match maybe_ear {
            Some(ear) => ear,
            None => return None,
        };

        vertex_info[ear_i].is_active = false;

        let VertexInfo { p_prev, p_next, .. } = vertex_info[ear_i];
        output_indices.push([p_prev as u32, ear_i as u32, p_next as u32]);

        // Connect the remaining two vertices.
        vertex_info[p_prev].p_next = vertex_info[ear_i].p_next;
        vertex_info[p_next].p_prev = vertex_info[ear_i].p_prev;

        // Only three vertices remain and those are guaranteed to be convex so
        // there is no point in updating the remaining vertex information.
        if i == n_vertices - 4 {
            break;
        };

        if !update_vertex(p_prev, &mut vertex_info[p_prev], vertices)
            || !update_vertex(p_next, &mut vertex_info[p_next], vertices)
        {
            return None;
        }
    }

    // Add the remaining triangle.
    if let Some((i, info)) = vertex_info
        .iter()
        .enumerate()
        .find(|(_, info)| info.is_active)
    {
        output_indices.push([info.p_prev as u32, i as u32, info.p_next as u32]);
    }

    Some(output_indices)
}

/// Triangulates a planar polygon embedded in 3-D space.
///
/// `normal` must match the polygon winding (right-hand rule). Convex polygons
/// are fanned directly; non-convex ones are ear-clipped in their plane frame.
/// Returns index triples into `points`, or `None` for degenerate inputs.
#[cfg(feature = "std")]
pub fn triangulate_polygon3(
    points: &[Point<Real>],
    normal: &Vector<Real>,
) -> Option<Vec<[u32; 3]>> {
    if points.len() < 3 {
        return None;
    }
    if points.len() == 3 {
        return Some(vec![[0, 1, 2]]);
    }

    let [u, v] = utils::orthonormal_basis(normal);
    let origin = points[0];
    let flat: Vec<Point2<Real>> = points
        .iter()
        .map(|pt| {
            let d = pt - origin;
            Point2::new(u.dot(&d), v.dot(&d))
        })
        .collect();

    let convex = (0..flat.len()).all(|i| {
        let prev = &flat[(i + flat.len() - 1) % flat.len()];
        let next = &flat[(i + 1) % flat.len()];
        corner_direction(prev, &flat[i], next) != Orientation::Cw
    });

    if convex {
        Some((1..points.len() as u32 - 1).map(|i| [0, i, i + 1]).collect())
    } else {
        triangulate_ear_clipping(&flat)
    }
}
