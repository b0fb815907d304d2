//! Intersection of the interface with a single background element.
//!
//! Mesh sides are clipped in two stages. A cheap global-frame pass against the
//! loosened element box discards everything far away and keeps the inverse
//! isoparametric map on points near the element, where its Newton iteration is
//! reliable. The surviving piece is mapped to the local frame and clipped
//! exactly against the reference cell's face half-spaces, which are planar for
//! every supported shape no matter how the physical element is warped.
//!
//! Level-set cuts never leave the local frame: nodal values are interpolated
//! along reference edges and the face chords chained into closed isocontour
//! cycles.

use crate::cut::point_registry::{PointId, PointRegistry};
use crate::cut::position::Position;
use crate::error::{CutError, DegeneracyKind, GraphDefect};
use crate::geometry::{
    polygon_area_vector, polygon_centroid, segment_triangle_intersection, BoundingBox, Plane,
    SegmentTriangleHit,
};
use crate::math::{Point, Real, UnitVector, Vector};
use crate::mesh::{CellShape, InterfaceMesh, SideId, MAX_NODES};
use crate::tolerance::CutTolerances;
use arrayvec::ArrayVec;
use na;
use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// A vertex of a polygon being clipped, together with the element-face label
/// of the edge leaving it (`None` for edges through the element interior).
type LabeledPoint = (Point<Real>, Option<u8>);

/// One interface side clipped to a volume element.
#[derive(Clone, Debug)]
pub struct ClippedSide {
    /// The interface side this piece comes from.
    pub side: SideId,
    /// The clipped polygon in the side's winding, so its normal still points
    /// toward the outside region.
    pub cycle: Vec<PointId>,
    /// For each cycle vertex, the element face carrying the edge that leaves
    /// it, if that edge runs on the element boundary.
    pub edge_faces: Vec<Option<u8>>,
    /// When the whole piece lies in an element face's plane, that face. The
    /// piece then covers part of the face instead of splitting the interior.
    pub touching_face: Option<u8>,
    /// For a touching piece: whether the side normal points along the face's
    /// outward normal, i.e. the outside region lies beyond that face.
    pub outward_aligned: bool,
}

/// One interface side sectioned down to a chord of a surface element.
#[derive(Clone, Debug)]
pub struct ClippedChord {
    /// The interface side this chord comes from.
    pub side: SideId,
    /// The chord endpoints, directed so the outside region lies to the left
    /// of `points[0] -> points[1]` in the element plane.
    pub points: [PointId; 2],
    /// When the chord runs along an element edge, that edge; the chord then
    /// covers part of the boundary instead of splitting the interior.
    pub touching_edge: Option<u8>,
}

/// A level-set cut through a volume element, in local coordinates.
#[derive(Clone, Debug)]
pub struct LevelSetCut {
    /// Closed isocontour cycles, wound so their area normal points toward
    /// increasing level-set values (the outside region).
    pub cycles: Vec<Vec<PointId>>,
    /// The chord each crossed element face contributes, keyed by face index.
    pub face_chords: Vec<(u8, [PointId; 2])>,
    /// Faces whose nodal values all vanish: the face lies on the isocontour.
    /// The flag tells whether the outside region lies beyond the face.
    pub touched_faces: Vec<(u8, bool)>,
}

/// The face half-spaces of a reference cell: `normal . x <= offset` holds
/// inside, with unit normals pointing outward.
pub fn reference_face_planes(shape: CellShape) -> ArrayVec<(UnitVector<Real>, Real), 6> {
    let nodes = shape.reference_nodes();
    let mut planes = ArrayVec::new();
    for face in shape.faces() {
        let cycle: Vec<Point<Real>> = face
            .iter()
            .map(|&i| Point::new(nodes[i][0], nodes[i][1], nodes[i][2]))
            .collect();
        let normal = UnitVector::new_normalize(polygon_area_vector(&cycle));
        let offset = normal.dot(&cycle[0].coords);
        planes.push((normal, offset));
    }
    planes
}

/// The boundary half-planes of a 2-D reference cell, one per edge of the
/// counter-clockwise node cycle: `normal . x <= offset` holds inside.
fn reference_edge_half_planes(shape: CellShape) -> ArrayVec<(Vector<Real>, Real), 4> {
    let nodes = shape.reference_nodes();
    let mut planes = ArrayVec::new();
    for edge in shape.edges() {
        let a = nodes[edge[0]];
        let b = nodes[edge[1]];
        let d = [b[0] - a[0], b[1] - a[1]];
        let len = (d[0] * d[0] + d[1] * d[1]).sqrt();
        let normal = Vector::new(d[1] / len, -d[0] / len, 0.0);
        planes.push((normal, normal.x * a[0] + normal.y * a[1]));
    }
    planes
}

/// Clips a labeled polygon against the half-space `normal . x <= offset`.
///
/// Edges created along the clip plane get `label`; a crossing that re-enters
/// keeps the label of the edge it splits.
fn clip_half_space(
    polygon: &[LabeledPoint],
    normal: &Vector<Real>,
    offset: Real,
    slack: Real,
    label: Option<u8>,
) -> Vec<LabeledPoint> {
    let mut out = Vec::with_capacity(polygon.len() + 2);
    let n = polygon.len();
    for i in 0..n {
        let (cur, cur_label) = polygon[i];
        let (nxt, nxt_label) = polygon[(i + 1) % n];
        let dc = normal.dot(&cur.coords) - offset;
        let dn = normal.dot(&nxt.coords) - offset;
        let cur_in = dc <= slack;
        let nxt_in = dn <= slack;

        if cur_in && nxt_in {
            out.push((nxt, nxt_label));
        } else if cur_in {
            let t = dc / (dc - dn);
            out.push((cur + (nxt - cur) * t, label));
        } else if nxt_in {
            let t = dc / (dc - dn);
            out.push((cur + (nxt - cur) * t, cur_label));
            out.push((nxt, nxt_label));
        }
    }
    out
}

/// Merges consecutive near-coincident vertices of a closed cycle.
///
/// The surviving vertex keeps the first one's coordinates and the second
/// one's label, since the second one's outgoing edge is the one that remains.
fn dedup_cycle(polygon: &mut Vec<LabeledPoint>, radius: Real) {
    let mut cleaned: Vec<LabeledPoint> = Vec::with_capacity(polygon.len());
    for &(p, label) in polygon.iter() {
        if let Some(last) = cleaned.last_mut() {
            if (p - last.0).norm() <= radius {
                last.1 = label;
                continue;
            }
        }
        cleaned.push((p, label));
    }
    while cleaned.len() > 1 {
        let last = cleaned[cleaned.len() - 1].0;
        if (cleaned[0].0 - last).norm() <= radius {
            let _ = cleaned.pop();
        } else {
            break;
        }
    }
    *polygon = cleaned;
}

fn point_segment_parameter(
    p: &Point<Real>,
    a: &Point<Real>,
    b: &Point<Real>,
) -> (Real, Real) {
    let ab = b - a;
    let nn = ab.norm_squared();
    let t = if nn > 0.0 {
        ((p - a).dot(&ab) / nn).clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((p - (a + ab * t)).norm(), t)
}

/// Clips every candidate side against a volume element and registers the
/// resulting cycles.
///
/// Points are registered with their reference node, edge, face and side
/// memberships; a point within the merge radius of an element node collapses
/// onto it. Sides lying in an element face's plane are snapped onto it and
/// reported as touching.
pub fn clip_sides(
    shape: CellShape,
    corners: &[Point<Real>],
    bounds: &BoundingBox,
    interface: &InterfaceMesh,
    candidates: &[SideId],
    registry: &mut PointRegistry,
    tolerances: &CutTolerances,
) -> Result<Vec<ClippedSide>, CutError> {
    let planes = reference_face_planes(shape);
    let ref_nodes = shape.reference_nodes();
    let ref_points: Vec<Point<Real>> = ref_nodes
        .iter()
        .map(|n| Point::new(n[0], n[1], n[2]))
        .collect();
    let ref_scale = BoundingBox::from_points(ref_points.iter()).diameter();
    let band = tolerances.on_surface * ref_scale;
    let clip_slack = Real::EPSILON * 64.0 * ref_scale;
    let merge_local = tolerances.point_merge * ref_scale;
    let global_diameter = bounds.diameter();
    let loosened =
        bounds.loosened((tolerances.on_surface + tolerances.point_merge) * global_diameter);

    let mut out = Vec::new();
    'sides: for &sid in candidates {
        // Global-frame pre-clip against the loosened element box.
        let mut global_poly: Vec<LabeledPoint> = interface
            .side_corners(sid)
            .iter()
            .map(|&p| (p, None))
            .collect();
        for axis in 0..3 {
            let mut normal = Vector::zeros();
            normal[axis] = 1.0;
            global_poly = clip_half_space(&global_poly, &normal, loosened.maxs[axis], 0.0, None);
            global_poly = clip_half_space(&global_poly, &-normal, -loosened.mins[axis], 0.0, None);
            if global_poly.len() < 3 {
                continue 'sides;
            }
        }
        dedup_cycle(
            &mut global_poly,
            tolerances.point_merge * global_diameter,
        );
        if global_poly.len() < 3 {
            continue;
        }

        // Map to the local frame, snapping vertices onto nearby face planes.
        let mut poly: Vec<LabeledPoint> = Vec::with_capacity(global_poly.len());
        for &(p, _) in &global_poly {
            poly.push((shape.global_to_local(corners, &p, tolerances)?, None));
        }
        let mut touching_face = None;
        for (f, (normal, offset)) in planes.iter().enumerate() {
            let mut all_on = true;
            for (p, _) in poly.iter_mut() {
                let dist = normal.dot(&p.coords) - offset;
                if dist.abs() <= band {
                    *p -= normal.into_inner() * dist;
                } else {
                    all_on = false;
                }
            }
            if all_on {
                touching_face = Some(f as u8);
            }
        }
        let outward_aligned = match touching_face {
            Some(f) => {
                let cycle: Vec<Point<Real>> = poly.iter().map(|&(p, _)| p).collect();
                polygon_area_vector(&cycle).dot(&planes[f as usize].0) > 0.0
            }
            None => true,
        };

        // Exact local-frame clip against every face half-space.
        for (f, (normal, offset)) in planes.iter().enumerate() {
            poly = clip_half_space(&poly, normal, *offset, clip_slack, Some(f as u8));
            if poly.len() < 3 {
                continue 'sides;
            }
        }
        dedup_cycle(&mut poly, merge_local);
        if poly.len() < 3 {
            continue;
        }

        // Pieces thinner than the merge band contribute no volume and would
        // only destabilize the facet graph.
        let locals: Vec<Point<Real>> = poly.iter().map(|&(p, _)| p).collect();
        if polygon_area_vector(&locals).norm() <= merge_local * ref_scale {
            continue;
        }

        // Register the cycle with its memberships.
        let mut cycle: Vec<PointId> = Vec::with_capacity(poly.len());
        let mut edge_faces: Vec<Option<u8>> = Vec::with_capacity(poly.len());
        for &(local, label) in &poly {
            let global = shape.local_to_global(corners, &local);
            let id = registry.insert(global, local);
            registry.register_side(id, sid);
            for (f, (normal, offset)) in planes.iter().enumerate() {
                if (normal.dot(&local.coords) - offset).abs() <= band {
                    registry.register_face(id, f as u8);
                }
            }
            for (e, edge) in shape.edges().iter().enumerate() {
                let a = Point::new(
                    ref_nodes[edge[0]][0],
                    ref_nodes[edge[0]][1],
                    ref_nodes[edge[0]][2],
                );
                let b = Point::new(
                    ref_nodes[edge[1]][0],
                    ref_nodes[edge[1]][1],
                    ref_nodes[edge[1]][2],
                );
                let (dist, t) = point_segment_parameter(&local, &a, &b);
                if dist <= band {
                    registry.register_edge(id, e as u8, t);
                }
            }
            cycle.push(id);
            edge_faces.push(label);
        }

        // The registry may merge registered vertices the local dedup kept.
        let mut i = 0;
        while cycle.len() > 1 && i < cycle.len() {
            let next = (i + 1) % cycle.len();
            if cycle[i] == cycle[next] {
                edge_faces[i] = edge_faces[next];
                let _ = cycle.remove(next);
                let _ = edge_faces.remove(next);
            } else {
                i += 1;
            }
        }
        if cycle.len() < 3 {
            continue;
        }

        // Box-clip edges carry no label; repair from shared face memberships.
        for i in 0..cycle.len() {
            if edge_faces[i].is_some() {
                continue;
            }
            let a = registry.point(cycle[i]);
            let b = registry.point(cycle[(i + 1) % cycle.len()]);
            edge_faces[i] = a.faces().iter().find(|f| b.faces().contains(f)).copied();
        }

        out.push(ClippedSide {
            side: sid,
            cycle,
            edge_faces,
            touching_face,
            outward_aligned,
        });
    }

    Ok(out)
}

/// Computes the level-set cut of a volume element from nodal values.
///
/// Values within the snap band of zero are treated as exactly zero, so the
/// isocontour passes through the corresponding nodes. Returns `Ok(None)` when
/// the isocontour misses the element interior entirely.
pub fn level_set_cut(
    shape: CellShape,
    corners: &[Point<Real>],
    values: &[Real],
    node_points: &[PointId],
    registry: &mut PointRegistry,
    tolerances: &CutTolerances,
) -> Result<Option<LevelSetCut>, CutError> {
    debug_assert_eq!(values.len(), shape.node_count());
    let nodes = shape.reference_nodes();

    let scale = values.iter().fold(0.0, |m: Real, v| m.max(v.abs()));
    if scale == 0.0 {
        return Ok(None);
    }
    let band = tolerances.on_surface * scale;
    let snapped: ArrayVec<Real, MAX_NODES> = values
        .iter()
        .map(|&v| if v.abs() <= band { 0.0 } else { v })
        .collect();

    for (i, &v) in snapped.iter().enumerate() {
        if v == 0.0 {
            registry.mark_on_cut_surface(node_points[i]);
            registry.set_position(node_points[i], Position::OnSurface);
        }
    }

    // Faces whose values all vanish lie on the isocontour.
    let mut touched_faces = Vec::new();
    for (f, face) in shape.faces().iter().enumerate() {
        if face.iter().all(|&n| snapped[n] == 0.0) {
            let interior: Real = snapped
                .iter()
                .enumerate()
                .filter(|(n, _)| !face.contains(n))
                .map(|(_, &v)| v)
                .sum();
            touched_faces.push((f as u8, interior <= 0.0));
        }
    }

    let any_neg = snapped.iter().any(|&v| v < 0.0);
    let any_pos = snapped.iter().any(|&v| v > 0.0);
    if !any_neg || !any_pos {
        if touched_faces.is_empty() {
            return Ok(None);
        }
        return Ok(Some(LevelSetCut {
            cycles: Vec::new(),
            face_chords: Vec::new(),
            touched_faces,
        }));
    }

    // Interpolate edge crossings along reference edges.
    let mut edge_points: Vec<Option<PointId>> = vec![None; shape.edges().len()];
    for (e, edge) in shape.edges().iter().enumerate() {
        let (fa, fb) = (snapped[edge[0]], snapped[edge[1]]);
        if fa * fb < 0.0 {
            let a = Point::new(nodes[edge[0]][0], nodes[edge[0]][1], nodes[edge[0]][2]);
            let b = Point::new(nodes[edge[1]][0], nodes[edge[1]][1], nodes[edge[1]][2]);
            let t = fa / (fa - fb);
            let local = a + (b - a) * t;
            let global = shape.local_to_global(corners, &local);
            let id = registry.insert(global, local);
            registry.register_edge(id, e as u8, t);
            registry.mark_on_cut_surface(id);
            registry.set_position(id, Position::OnSurface);
            for (f, face) in shape.faces().iter().enumerate() {
                if face.contains(&edge[0]) && face.contains(&edge[1]) {
                    registry.register_face(id, f as u8);
                }
            }
            edge_points[e] = Some(id);
        }
    }

    // One chord per crossed face. More than two distinct crossings cannot be
    // paired reliably under a bilinear interpolant.
    let mut face_chords = Vec::new();
    let mut chords: BTreeSet<(PointId, PointId)> = BTreeSet::new();
    for (f, face) in shape.faces().iter().enumerate() {
        if face.iter().all(|&n| snapped[n] == 0.0) {
            continue;
        }
        let mut crossings: BTreeSet<PointId> = BTreeSet::new();
        for &n in face.iter() {
            if snapped[n] == 0.0 {
                let _ = crossings.insert(node_points[n]);
            }
        }
        for (e, edge) in shape.edges().iter().enumerate() {
            if face.contains(&edge[0]) && face.contains(&edge[1]) {
                if let Some(id) = edge_points[e] {
                    let _ = crossings.insert(id);
                }
            }
        }

        let mut it = crossings.iter();
        match (it.next(), it.next(), it.next()) {
            (Some(&a), Some(&b), None) => {
                face_chords.push((f as u8, [a, b]));
                let _ = chords.insert((a.min(b), a.max(b)));
            }
            (_, _, Some(_)) => return Err(DegeneracyKind::AmbiguousLevelSetFace.into()),
            _ => {}
        }
    }

    // Chain the chords into closed cycles.
    let mut adjacency: BTreeMap<PointId, SmallVec<[PointId; 2]>> = BTreeMap::new();
    for &(a, b) in &chords {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }
    for neighbors in adjacency.values() {
        match neighbors.len() {
            2 => {}
            0 | 1 => return Err(GraphDefect::DanglingLine.into()),
            _ => return Err(DegeneracyKind::AmbiguousContact.into()),
        }
    }

    let mut cycles = Vec::new();
    let mut visited: BTreeSet<PointId> = BTreeSet::new();
    let starts: Vec<PointId> = adjacency.keys().copied().collect();
    for start in starts {
        if visited.contains(&start) {
            continue;
        }
        let mut cycle = vec![start];
        let _ = visited.insert(start);
        let mut prev = start;
        let mut cur = adjacency[&start][0];
        while cur != start {
            let _ = visited.insert(cur);
            cycle.push(cur);
            let neighbors = &adjacency[&cur];
            let next = if neighbors[0] == prev {
                neighbors[1]
            } else {
                neighbors[0]
            };
            prev = cur;
            cur = next;
        }
        if cycle.len() < 3 {
            return Err(GraphDefect::DanglingLine.into());
        }

        // Orient toward increasing values: the outside region.
        let locals: Vec<Point<Real>> = cycle.iter().map(|&id| *registry.local(id)).collect();
        let centroid = polygon_centroid(&locals);
        let grads = shape.shape_gradients(&centroid);
        let mut gradient = Vector::zeros();
        for (g, &v) in grads.iter().zip(snapped.iter()) {
            gradient += *g * v;
        }
        if polygon_area_vector(&locals).dot(&gradient) < 0.0 {
            cycle.reverse();
        }
        cycles.push(cycle);
    }

    Ok(Some(LevelSetCut {
        cycles,
        face_chords,
        touched_faces,
    }))
}

/// A level-set cut through a surface element, in local coordinates.
#[derive(Clone, Debug)]
pub struct LevelSetChords {
    /// Isocontour chords, directed so the outside region lies to the left of
    /// `[0] -> [1]` in the element plane.
    pub chords: Vec<[PointId; 2]>,
    /// Boundary edges whose nodal values all vanish: the edge lies on the
    /// isocontour. The flag tells whether the outside region lies beyond the
    /// edge.
    pub touched_edges: Vec<(u8, bool)>,
}

/// Computes the level-set cut of a surface element from nodal values.
///
/// The isocontour of the interpolant crosses the element boundary in at most
/// two points, which bound a single chord. Returns `Ok(None)` when the
/// isocontour misses the element entirely.
pub fn level_set_chords(
    shape: CellShape,
    corners: &[Point<Real>],
    values: &[Real],
    node_points: &[PointId],
    registry: &mut PointRegistry,
    tolerances: &CutTolerances,
) -> Result<Option<LevelSetChords>, CutError> {
    debug_assert_eq!(values.len(), shape.node_count());
    let nodes = shape.reference_nodes();

    let scale = values.iter().fold(0.0, |m: Real, v| m.max(v.abs()));
    if scale == 0.0 {
        return Ok(None);
    }
    let band = tolerances.on_surface * scale;
    let snapped: ArrayVec<Real, MAX_NODES> = values
        .iter()
        .map(|&v| if v.abs() <= band { 0.0 } else { v })
        .collect();

    for (i, &v) in snapped.iter().enumerate() {
        if v == 0.0 {
            registry.mark_on_cut_surface(node_points[i]);
            registry.set_position(node_points[i], Position::OnSurface);
        }
    }

    // Edges whose values both vanish lie on the isocontour.
    let mut touched_edges = Vec::new();
    for (e, edge) in shape.edges().iter().enumerate() {
        if snapped[edge[0]] == 0.0 && snapped[edge[1]] == 0.0 {
            let interior: Real = snapped
                .iter()
                .enumerate()
                .filter(|(n, _)| !edge.contains(n))
                .map(|(_, &v)| v)
                .sum();
            touched_edges.push((e as u8, interior <= 0.0));
        }
    }

    let any_neg = snapped.iter().any(|&v| v < 0.0);
    let any_pos = snapped.iter().any(|&v| v > 0.0);
    if !any_neg || !any_pos {
        if touched_edges.is_empty() {
            return Ok(None);
        }
        return Ok(Some(LevelSetChords {
            chords: Vec::new(),
            touched_edges,
        }));
    }

    // Zero nodes and edge crossings form the boundary trace of the
    // isocontour.
    let mut crossings: BTreeSet<PointId> = BTreeSet::new();
    for (n, &v) in snapped.iter().enumerate() {
        if v == 0.0 {
            let _ = crossings.insert(node_points[n]);
        }
    }
    for (e, edge) in shape.edges().iter().enumerate() {
        let (fa, fb) = (snapped[edge[0]], snapped[edge[1]]);
        if fa * fb < 0.0 {
            let a = Point::new(nodes[edge[0]][0], nodes[edge[0]][1], nodes[edge[0]][2]);
            let b = Point::new(nodes[edge[1]][0], nodes[edge[1]][1], nodes[edge[1]][2]);
            let t = fa / (fa - fb);
            let local = a + (b - a) * t;
            let global = shape.local_to_global(corners, &local);
            let id = registry.insert(global, local);
            registry.register_edge(id, e as u8, t);
            registry.mark_on_cut_surface(id);
            registry.set_position(id, Position::OnSurface);
            let _ = crossings.insert(id);
        }
    }

    let mut it = crossings.iter();
    let (a, b) = match (it.next(), it.next(), it.next()) {
        (Some(&a), Some(&b), None) => (a, b),
        (_, _, Some(_)) => return Err(DegeneracyKind::AmbiguousLevelSetFace.into()),
        _ => return Err(GraphDefect::DanglingLine.into()),
    };

    // Direct the chord so the outside lies to its left.
    let la = *registry.local(a);
    let lb = *registry.local(b);
    let mid = na::center(&la, &lb);
    let grads = shape.shape_gradients(&mid);
    let mut gradient = Vector::zeros();
    for (g, &v) in grads.iter().zip(snapped.iter()) {
        gradient += *g * v;
    }
    let dir = lb - la;
    let left = Vector::new(-dir.y, dir.x, 0.0);
    let chord = if left.dot(&gradient) >= 0.0 {
        [a, b]
    } else {
        [b, a]
    };

    Ok(Some(LevelSetChords {
        chords: vec![chord],
        touched_edges,
    }))
}

/// Sections every candidate side down to chords of a surface element and
/// registers their endpoints.
pub fn clip_chords(
    shape: CellShape,
    corners: &[Point<Real>],
    interface: &InterfaceMesh,
    candidates: &[SideId],
    registry: &mut PointRegistry,
    tolerances: &CutTolerances,
) -> Result<Vec<ClippedChord>, CutError> {
    let element_plane = Plane::from_cycle(corners)
        .ok_or(CutError::Degeneracy(DegeneracyKind::SliverPiece))?;
    let half_planes = reference_edge_half_planes(shape);
    let ref_nodes = shape.reference_nodes();
    let ref_points: Vec<Point<Real>> = ref_nodes
        .iter()
        .map(|n| Point::new(n[0], n[1], n[2]))
        .collect();
    let ref_scale = BoundingBox::from_points(ref_points.iter()).diameter();
    let global_scale = BoundingBox::from_points(corners.iter()).diameter();
    let band_global = tolerances.on_surface * global_scale;
    let band_local = tolerances.on_surface * ref_scale;
    let clip_slack = Real::EPSILON * 64.0 * ref_scale;

    let mut out = Vec::new();
    for &sid in candidates {
        for tri in interface.side_triangles(sid) {
            // Section the triangle with the element plane.
            let mut dist: [Real; 3] = [0.0; 3];
            for (d, p) in dist.iter_mut().zip(tri.iter()) {
                *d = element_plane.signed_distance(p);
                if d.abs() <= band_global {
                    *d = 0.0;
                }
            }
            if dist.iter().all(|&d| d == 0.0) {
                return Err(DegeneracyKind::ParallelContact.into());
            }

            let mut section: SmallVec<[Point<Real>; 2]> = SmallVec::new();
            for i in 0..3 {
                let j = (i + 1) % 3;
                if dist[i] == 0.0 {
                    section.push(tri[i]);
                } else if dist[i] * dist[j] < 0.0 {
                    let t = dist[i] / (dist[i] - dist[j]);
                    section.push(tri[i] + (tri[j] - tri[i]) * t);
                }
            }
            if section.len() < 2 {
                continue;
            }
            let (p0, p1) = (section[0], section[1]);
            if (p1 - p0).norm() <= tolerances.point_merge * global_scale {
                continue;
            }

            // Clamp the chord to the reference polygon in the local frame.
            let a = shape.global_to_local(corners, &p0, tolerances)?;
            let b = shape.global_to_local(corners, &p1, tolerances)?;
            let mut t0: Real = 0.0;
            let mut t1: Real = 1.0;
            let mut gone = false;
            for (normal, offset) in half_planes.iter() {
                let da = normal.dot(&a.coords) - offset;
                let db = normal.dot(&b.coords) - offset;
                if da > clip_slack && db > clip_slack {
                    gone = true;
                    break;
                }
                if da > clip_slack {
                    t0 = t0.max(da / (da - db));
                } else if db > clip_slack {
                    t1 = t1.min(da / (da - db));
                }
            }
            if gone || t1 - t0 <= tolerances.parametric_slack {
                continue;
            }
            let la = a + (b - a) * t0;
            let lb = a + (b - a) * t1;
            if (lb - la).norm() <= tolerances.point_merge * ref_scale {
                continue;
            }

            // Register endpoints with their boundary edge memberships.
            let mut ids = [PointId(0); 2];
            for (slot, local) in ids.iter_mut().zip([la, lb]) {
                let global = shape.local_to_global(corners, &local);
                let id = registry.insert(global, local);
                registry.register_side(id, sid);
                for (e, edge) in shape.edges().iter().enumerate() {
                    let ea = Point::new(
                        ref_nodes[edge[0]][0],
                        ref_nodes[edge[0]][1],
                        ref_nodes[edge[0]][2],
                    );
                    let eb = Point::new(
                        ref_nodes[edge[1]][0],
                        ref_nodes[edge[1]][1],
                        ref_nodes[edge[1]][2],
                    );
                    let (d, t) = point_segment_parameter(&local, &ea, &eb);
                    if d <= band_local {
                        registry.register_edge(id, e as u8, t);
                    }
                }
                *slot = id;
            }
            if ids[0] == ids[1] {
                continue;
            }

            // A chord along a boundary edge covers it instead of cutting.
            let mid = na::center(&la, &lb);
            let touching_edge = half_planes
                .iter()
                .enumerate()
                .find(|(_, (normal, offset))| (normal.dot(&mid.coords) - offset).abs() <= band_local)
                .map(|(e, _)| e as u8);

            // Direct the chord so the outside lies to its left: probe a point
            // offset leftward and check which side of the interface it is on.
            let dir = lb - la;
            let left = Vector::new(-dir.y, dir.x, 0.0);
            let probe = shape.local_to_global(corners, &(mid + left * 0.25));
            let side_normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
            if (probe - tri[0]).dot(&side_normal) >= 0.0 {
                out.push(ClippedChord {
                    side: sid,
                    points: ids,
                    touching_edge,
                });
            } else {
                out.push(ClippedChord {
                    side: sid,
                    points: [ids[1], ids[0]],
                    touching_edge,
                });
            }
        }
    }

    Ok(out)
}

/// Intersects every candidate side with a line element and registers the cut
/// points, returned in ascending local coordinate order.
pub fn line_cut_points(
    shape: CellShape,
    corners: &[Point<Real>],
    interface: &InterfaceMesh,
    candidates: &[SideId],
    registry: &mut PointRegistry,
    tolerances: &CutTolerances,
) -> Result<Vec<PointId>, CutError> {
    debug_assert_eq!(shape, CellShape::Line2);
    let (p, q) = (corners[0], corners[1]);

    let mut ids: BTreeSet<PointId> = BTreeSet::new();
    for &sid in candidates {
        for tri in interface.side_triangles(sid) {
            match segment_triangle_intersection(
                &p,
                &q,
                &tri[0],
                &tri[1],
                &tri[2],
                tolerances.parallelism,
                tolerances.parametric_slack,
            ) {
                SegmentTriangleHit::Single { t, .. } => {
                    let local = Point::new(-1.0 + 2.0 * t, 0.0, 0.0);
                    let global = p + (q - p) * t;
                    let id = registry.insert(global, local);
                    registry.register_edge(id, 0, t);
                    registry.register_side(id, sid);
                    let _ = ids.insert(id);
                }
                SegmentTriangleHit::Coplanar => {
                    return Err(DegeneracyKind::ParallelContact.into())
                }
                SegmentTriangleHit::Miss => {}
            }
        }
    }

    let mut sorted: Vec<PointId> = ids.into_iter().collect();
    sorted.sort_by_key(|&id| OrderedFloat(registry.local(id).x));
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::{
        clip_chords, clip_sides, level_set_chords, level_set_cut, line_cut_points,
        reference_face_planes,
    };
    use crate::cut::point_registry::{PointId, PointRegistry};
    use crate::error::{CutError, DegeneracyKind};
    use crate::geometry::{polygon_area_vector, BoundingBox};
    use crate::math::{Point, Real};
    use crate::mesh::{CellShape, InterfaceMesh, Side};
    use crate::tolerance::CutTolerances;
    use smallvec::smallvec;

    fn reference_corners(shape: CellShape) -> Vec<Point<Real>> {
        shape
            .reference_nodes()
            .iter()
            .map(|n| Point::new(n[0], n[1], n[2]))
            .collect()
    }

    fn registry_for(corners: &[Point<Real>], tolerances: &CutTolerances) -> PointRegistry {
        let bounds = BoundingBox::from_points(corners.iter());
        let mut registry = PointRegistry::new(tolerances.point_merge * bounds.diameter());
        for (i, c) in corners.iter().enumerate() {
            let id = registry.insert(*c, *c);
            registry.set_node(id, i as u8);
        }
        registry
    }

    fn quad_interface(corners: [[Real; 3]; 4]) -> InterfaceMesh {
        let nodes = corners
            .iter()
            .map(|c| Point::new(c[0], c[1], c[2]))
            .collect();
        InterfaceMesh::new(nodes, vec![Side::new(CellShape::Quad4, smallvec![0, 1, 2, 3])])
            .unwrap()
    }

    #[test]
    fn hex_face_planes_point_outward() {
        let planes = reference_face_planes(CellShape::Hex8);
        assert_eq!(planes.len(), 6);
        for (normal, offset) in &planes {
            assert_relative_eq!(*offset, 1.0, epsilon = Real::EPSILON * 10.0);
            assert_relative_eq!(normal.norm(), 1.0, epsilon = Real::EPSILON * 10.0);
            // Pushing the face center along the normal leaves the cell.
            let outside = normal.into_inner() * (*offset + 0.5);
            assert!(!CellShape::Hex8.contains_reference(&Point::from(outside), 1.0e-6));
        }
    }

    #[test]
    fn oversized_side_clips_to_the_element_section() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Hex8);
        let bounds = BoundingBox::from_points(corners.iter());
        let mut registry = registry_for(&corners, &tolerances);

        // A huge quad at z = 0 slicing the whole cube.
        let interface = quad_interface([
            [-4.0, -4.0, 0.0],
            [4.0, -4.0, 0.0],
            [4.0, 4.0, 0.0],
            [-4.0, 4.0, 0.0],
        ]);
        let sides: Vec<_> = interface.side_ids().collect();
        let clipped = clip_sides(
            CellShape::Hex8,
            &corners,
            &bounds,
            &interface,
            &sides,
            &mut registry,
            &tolerances,
        )
        .unwrap();

        assert_eq!(clipped.len(), 1);
        let piece = &clipped[0];
        assert_eq!(piece.cycle.len(), 4);
        assert!(piece.touching_face.is_none());

        // Every edge of the section square runs on an element face.
        assert!(piece.edge_faces.iter().all(|f| f.is_some()));

        // Corners like (1, 1, 0) sit on two faces and one vertical edge.
        for &id in &piece.cycle {
            let point = registry.point(id);
            assert_relative_eq!(point.local().z, 0.0, epsilon = 1.0e-6);
            assert_eq!(point.faces().len(), 2);
            assert_eq!(point.edges().len(), 1);
            assert!(point.is_on_cut_surface());
        }

        let locals: Vec<Point<Real>> = piece
            .cycle
            .iter()
            .map(|&id| *registry.local(id))
            .collect();
        assert_relative_eq!(
            polygon_area_vector(&locals).norm(),
            4.0,
            epsilon = 1.0e-5
        );
    }

    #[test]
    fn coplanar_side_reports_the_touched_face() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Hex8);
        let bounds = BoundingBox::from_points(corners.iter());
        let mut registry = registry_for(&corners, &tolerances);

        // A quad in the bottom face plane, wound with its normal up (into the
        // element), covering a patch of the face.
        let interface = quad_interface([
            [-0.5, -0.5, -1.0],
            [0.5, -0.5, -1.0],
            [0.5, 0.5, -1.0],
            [-0.5, 0.5, -1.0],
        ]);
        let sides: Vec<_> = interface.side_ids().collect();
        let clipped = clip_sides(
            CellShape::Hex8,
            &corners,
            &bounds,
            &interface,
            &sides,
            &mut registry,
            &tolerances,
        )
        .unwrap();

        assert_eq!(clipped.len(), 1);
        let piece = &clipped[0];
        // Face 0 is the bottom of the reference hex, outward normal -z; the
        // side normal +z points into the element, so outside is not beyond it.
        assert_eq!(piece.touching_face, Some(0));
        assert!(!piece.outward_aligned);
    }

    #[test]
    fn far_away_sides_are_discarded() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Tet4);
        let bounds = BoundingBox::from_points(corners.iter());
        let mut registry = registry_for(&corners, &tolerances);

        let interface = quad_interface([
            [10.0, 10.0, 10.0],
            [11.0, 10.0, 10.0],
            [11.0, 11.0, 10.0],
            [10.0, 11.0, 10.0],
        ]);
        let sides: Vec<_> = interface.side_ids().collect();
        let clipped = clip_sides(
            CellShape::Tet4,
            &corners,
            &bounds,
            &interface,
            &sides,
            &mut registry,
            &tolerances,
        )
        .unwrap();
        assert!(clipped.is_empty());
    }

    #[test]
    fn level_set_slices_a_hex_into_a_square_cycle() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Hex8);
        let mut registry = registry_for(&corners, &tolerances);
        let node_points: Vec<PointId> = registry.ids().collect();

        // The plane z = 0 as a nodal field.
        let values: Vec<Real> = corners.iter().map(|c| c.z).collect();
        let cut = level_set_cut(
            CellShape::Hex8,
            &corners,
            &values,
            &node_points,
            &mut registry,
            &tolerances,
        )
        .unwrap()
        .unwrap();

        assert_eq!(cut.cycles.len(), 1);
        assert_eq!(cut.cycles[0].len(), 4);
        assert_eq!(cut.face_chords.len(), 4);
        assert!(cut.touched_faces.is_empty());

        // The cycle is wound toward increasing values (+z).
        let locals: Vec<Point<Real>> = cut.cycles[0]
            .iter()
            .map(|&id| *registry.local(id))
            .collect();
        assert!(polygon_area_vector(&locals).z > 0.0);
        for p in &locals {
            assert_relative_eq!(p.z, 0.0, epsilon = Real::EPSILON * 100.0);
        }
    }

    #[test]
    fn one_sided_level_sets_do_not_cut() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Tet4);
        let mut registry = registry_for(&corners, &tolerances);
        let node_points: Vec<PointId> = registry.ids().collect();

        let values = vec![0.5, 1.0, 2.0, 1.5];
        assert!(level_set_cut(
            CellShape::Tet4,
            &corners,
            &values,
            &node_points,
            &mut registry,
            &tolerances,
        )
        .unwrap()
        .is_none());

        let zeros = vec![0.0; 4];
        assert!(level_set_cut(
            CellShape::Tet4,
            &corners,
            &zeros,
            &node_points,
            &mut registry,
            &tolerances,
        )
        .unwrap()
        .is_none());
    }

    #[test]
    fn vanishing_face_values_touch_without_cutting() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Hex8);
        let mut registry = registry_for(&corners, &tolerances);
        let node_points: Vec<PointId> = registry.ids().collect();

        // Zero on the bottom face, positive above: the isocontour is the face
        // itself and the element interior lies outside.
        let values = vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let cut = level_set_cut(
            CellShape::Hex8,
            &corners,
            &values,
            &node_points,
            &mut registry,
            &tolerances,
        )
        .unwrap()
        .unwrap();

        assert!(cut.cycles.is_empty());
        assert_eq!(cut.touched_faces, vec![(0, false)]);
    }

    #[test]
    fn alternating_face_signs_are_ambiguous() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Hex8);
        let mut registry = registry_for(&corners, &tolerances);
        let node_points: Vec<PointId> = registry.ids().collect();

        // The bottom face alternates sign around its cycle: two hyperbola
        // branches cross it and no single chord represents that.
        let values = vec![1.0, -1.0, 1.0, -1.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(
            level_set_cut(
                CellShape::Hex8,
                &corners,
                &values,
                &node_points,
                &mut registry,
                &tolerances,
            )
            .unwrap_err(),
            CutError::Degeneracy(DegeneracyKind::AmbiguousLevelSetFace)
        );
    }

    #[test]
    fn level_set_chord_crosses_a_quad() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Quad4);
        let mut registry = registry_for(&corners, &tolerances);
        let node_points: Vec<PointId> = registry.ids().collect();

        // The line x = 0 as a nodal field; outside is x > 0.
        let values: Vec<Real> = corners.iter().map(|c| c.x).collect();
        let cut = level_set_chords(
            CellShape::Quad4,
            &corners,
            &values,
            &node_points,
            &mut registry,
            &tolerances,
        )
        .unwrap()
        .unwrap();

        assert_eq!(cut.chords.len(), 1);
        assert!(cut.touched_edges.is_empty());
        let [a, b] = cut.chords[0];
        let (la, lb) = (*registry.local(a), *registry.local(b));
        assert_relative_eq!(la.x, 0.0, epsilon = Real::EPSILON * 100.0);
        assert_relative_eq!(lb.x, 0.0, epsilon = Real::EPSILON * 100.0);
        // Outside to the left means the chord runs toward -y.
        assert!(la.y > lb.y);
        for &id in &cut.chords[0] {
            assert_eq!(registry.point(id).edges().len(), 1);
            assert!(registry.point(id).is_on_cut_surface());
        }
    }

    #[test]
    fn vanishing_edge_values_touch_the_quad_boundary() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Quad4);
        let mut registry = registry_for(&corners, &tolerances);
        let node_points: Vec<PointId> = registry.ids().collect();

        // Zero along the bottom edge, positive above: the isocontour is the
        // edge itself and the element interior lies outside.
        let values = vec![0.0, 0.0, 1.0, 1.0];
        let cut = level_set_chords(
            CellShape::Quad4,
            &corners,
            &values,
            &node_points,
            &mut registry,
            &tolerances,
        )
        .unwrap()
        .unwrap();

        assert!(cut.chords.is_empty());
        assert_eq!(cut.touched_edges, vec![(0, false)]);
    }

    #[test]
    fn chords_clamp_to_the_surface_element() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Quad4);
        let mut registry = registry_for(&corners, &tolerances);

        // A tall triangle in the x = 0 plane crossing the quad; its normal
        // points toward +x, so outside is the x > 0 half.
        let nodes = vec![
            Point::new(0.0, -2.0, -1.0),
            Point::new(0.0, 2.0, -1.0),
            Point::new(0.0, 0.0, 2.0),
        ];
        let interface =
            InterfaceMesh::new(nodes, vec![Side::new(CellShape::Tri3, smallvec![0, 1, 2])])
                .unwrap();
        let sides: Vec<_> = interface.side_ids().collect();

        let chords = clip_chords(
            CellShape::Quad4,
            &corners,
            &interface,
            &sides,
            &mut registry,
            &tolerances,
        )
        .unwrap();

        assert_eq!(chords.len(), 1);
        let chord = &chords[0];
        assert!(chord.touching_edge.is_none());

        let a = registry.local(chord.points[0]);
        let b = registry.local(chord.points[1]);
        assert_relative_eq!(a.x, 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(b.x, 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(a.y.abs(), 1.0, epsilon = 1.0e-6);
        assert_relative_eq!(b.y.abs(), 1.0, epsilon = 1.0e-6);

        // Outside to the left of a -> b means the chord runs toward -y here.
        assert!(a.y > b.y);
        for &id in &chord.points {
            assert_eq!(registry.point(id).edges().len(), 1);
        }
    }

    #[test]
    fn coplanar_surface_contact_is_rejected() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Tri3);
        let mut registry = registry_for(&corners, &tolerances);

        // A triangle lying in the element plane itself.
        let nodes = vec![
            Point::new(0.1, 0.1, 0.0),
            Point::new(0.6, 0.1, 0.0),
            Point::new(0.1, 0.6, 0.0),
        ];
        let interface =
            InterfaceMesh::new(nodes, vec![Side::new(CellShape::Tri3, smallvec![0, 1, 2])])
                .unwrap();
        let sides: Vec<_> = interface.side_ids().collect();

        assert_eq!(
            clip_chords(
                CellShape::Tri3,
                &corners,
                &interface,
                &sides,
                &mut registry,
                &tolerances,
            )
            .unwrap_err(),
            CutError::Degeneracy(DegeneracyKind::ParallelContact)
        );
    }

    #[test]
    fn line_cuts_sort_by_local_coordinate() {
        let tolerances = CutTolerances::default();
        let corners = reference_corners(CellShape::Line2);
        let mut registry = registry_for(&corners, &tolerances);

        let tri = |x: Real, flip: Real| {
            vec![
                Point::new(x, -1.0, -1.0),
                Point::new(x, flip, -1.0),
                Point::new(x, 0.0, 2.0),
            ]
        };
        let mut nodes = tri(0.5, 1.0);
        nodes.extend(tri(-0.25, 1.0));
        let interface = InterfaceMesh::new(
            nodes,
            vec![
                Side::new(CellShape::Tri3, smallvec![0, 1, 2]),
                Side::new(CellShape::Tri3, smallvec![3, 4, 5]),
            ],
        )
        .unwrap();
        let sides: Vec<_> = interface.side_ids().collect();

        let points = line_cut_points(
            CellShape::Line2,
            &corners,
            &interface,
            &sides,
            &mut registry,
            &tolerances,
        )
        .unwrap();

        assert_eq!(points.len(), 2);
        assert_relative_eq!(registry.local(points[0]).x, -0.25, epsilon = 1.0e-6);
        assert_relative_eq!(registry.local(points[1]).x, 0.5, epsilon = 1.0e-6);
    }
}
