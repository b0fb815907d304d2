//! Facets: the polygonal boundary pieces of a cut element.
//!
//! A 3-D facet is either a piece of the element's own boundary left after the
//! interface crossed it, or a piece of the interface inside the element. The
//! element-boundary pieces are recovered by tracing the planar subdivision the
//! cut lines induce on each element face; the interface pieces come straight
//! from clipping. 2-D and 1-D elements use the same type with segment and
//! point facets.

use crate::cut::point_registry::{PointId, PointRegistry};
use crate::error::{CutError, DegeneracyKind, GraphDefect};
use crate::geometry::{
    point_in_polygon2, polygon_area_vector, polygon_centroid, triangulate_polygon3, BoundingBox,
    Plane,
};
use crate::math::{Point, Real};
use crate::mesh::SideId;
use crate::tolerance::CutTolerances;
use na::Point2;
use std::collections::BTreeSet;

/// The identifier of a facet, scoped to one element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct FacetId(pub u32);

/// Where a facet comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FacetOrigin {
    /// A piece of the element's own boundary: the face index for volume
    /// elements, the edge index for surface elements, the end index for line
    /// elements.
    ElementFace(u8),
    /// A piece of the given interface side inside the element.
    CutSide(SideId),
    /// A piece of the level-set isocontour inside the element.
    LevelSet,
}

/// One boundary piece of a cut element.
///
/// Facets of volume elements are polygons: an outer cycle plus optional hole
/// cycles (wound opposite to the outer one). Surface elements use two-point
/// segment facets, line elements single-point facets.
#[derive(Clone, Debug)]
pub struct Facet {
    cycle: Vec<PointId>,
    holes: Vec<Vec<PointId>>,
    origin: FacetOrigin,
    on_cut_surface: bool,
    outside_along_normal: bool,
    plane: Option<Plane>,
    triangles: Vec<[Point<Real>; 3]>,
}

impl Facet {
    /// Builds a polygonal facet and triangulates it.
    ///
    /// The cycle winding defines the facet plane normal. Planar cycles are
    /// ear-clipped or fanned directly; cycles deviating from their best-fit
    /// plane beyond the coplanarity tolerance fall back to a centroid fan,
    /// which also covers the mildly warped quads of trilinear elements. Holes
    /// contribute negatively oriented fan triangles, so moment integrals over
    /// the triangle set remain exact.
    pub fn polygon(
        cycle: Vec<PointId>,
        holes: Vec<Vec<PointId>>,
        origin: FacetOrigin,
        on_cut_surface: bool,
        outside_along_normal: bool,
        registry: &PointRegistry,
        tolerances: &CutTolerances,
    ) -> Result<Self, CutError> {
        let locals: Vec<Point<Real>> = cycle.iter().map(|&id| *registry.local(id)).collect();
        let plane = Plane::from_cycle(&locals)
            .ok_or(CutError::Degeneracy(DegeneracyKind::SliverPiece))?;

        let mut facet = Self {
            cycle,
            holes,
            origin,
            on_cut_surface,
            outside_along_normal,
            plane: Some(plane),
            triangles: Vec::new(),
        };
        facet.triangles = facet.build_triangles(&locals, &plane, registry, tolerances);
        Ok(facet)
    }

    /// Builds a two-point segment facet of a surface element.
    pub fn segment(
        points: [PointId; 2],
        origin: FacetOrigin,
        on_cut_surface: bool,
        outside_along_normal: bool,
    ) -> Self {
        Self {
            cycle: points.to_vec(),
            holes: Vec::new(),
            origin,
            on_cut_surface,
            outside_along_normal,
            plane: None,
            triangles: Vec::new(),
        }
    }

    /// Builds a single-point facet of a line element.
    pub fn point(
        point: PointId,
        origin: FacetOrigin,
        on_cut_surface: bool,
        outside_along_normal: bool,
    ) -> Self {
        Self {
            cycle: vec![point],
            holes: Vec::new(),
            origin,
            on_cut_surface,
            outside_along_normal,
            plane: None,
            triangles: Vec::new(),
        }
    }

    /// Marks this facet as covered by the cut surface, recording on which
    /// side of it the `Outside` region lies.
    pub(crate) fn mark_on_cut_surface(&mut self, outside_along_normal: bool) {
        self.on_cut_surface = true;
        self.outside_along_normal = outside_along_normal;
    }

    fn build_triangles(
        &self,
        locals: &[Point<Real>],
        plane: &Plane,
        registry: &PointRegistry,
        tolerances: &CutTolerances,
    ) -> Vec<[Point<Real>; 3]> {
        if self.holes.is_empty() {
            let diameter = BoundingBox::from_points(locals).diameter();
            if plane.max_deviation(locals) <= tolerances.coplanarity * diameter {
                if let Some(tris) = triangulate_polygon3(locals, &plane.normal) {
                    return tris
                        .iter()
                        .map(|idx| idx.map(|i| locals[i as usize]))
                        .collect();
                }
            }
        }

        let m = polygon_centroid(locals);
        let mut triangles: Vec<[Point<Real>; 3]> = (0..locals.len())
            .map(|i| [m, locals[i], locals[(i + 1) % locals.len()]])
            .collect();
        for hole in &self.holes {
            let coords: Vec<Point<Real>> = hole.iter().map(|&id| *registry.local(id)).collect();
            for i in 0..coords.len() {
                triangles.push([m, coords[i], coords[(i + 1) % coords.len()]]);
            }
        }
        triangles
    }

    /// The outer boundary cycle.
    #[inline]
    pub fn cycle(&self) -> &[PointId] {
        &self.cycle
    }

    /// The hole cycles, wound opposite to the outer cycle.
    #[inline]
    pub fn holes(&self) -> &[Vec<PointId>] {
        &self.holes
    }

    /// Whether this facet carries holes.
    #[inline]
    pub fn has_holes(&self) -> bool {
        !self.holes.is_empty()
    }

    /// Where this facet comes from.
    #[inline]
    pub fn origin(&self) -> FacetOrigin {
        self.origin
    }

    /// Whether this facet lies on the cut surface.
    #[inline]
    pub fn on_cut_surface(&self) -> bool {
        self.on_cut_surface
    }

    /// Whether the `Outside` region lies along this facet's plane normal.
    ///
    /// Only meaningful for facets on the cut surface.
    #[inline]
    pub fn outside_along_normal(&self) -> bool {
        self.outside_along_normal
    }

    /// The local-frame plane of a polygonal facet.
    #[inline]
    pub fn plane(&self) -> Option<&Plane> {
        self.plane.as_ref()
    }

    /// The local-frame triangulation; holes appear as negatively oriented
    /// triangles.
    #[inline]
    pub fn triangles(&self) -> &[[Point<Real>; 3]] {
        &self.triangles
    }

    /// The measure of this facet in the local frame: polygon area (holes
    /// subtracted), segment length, or zero for a point facet.
    pub fn measure(&self, registry: &PointRegistry) -> Real {
        match self.cycle.len() {
            0 | 1 => 0.0,
            2 => (registry.local(self.cycle[1]) - registry.local(self.cycle[0])).norm(),
            _ => {
                let locals: Vec<Point<Real>> =
                    self.cycle.iter().map(|&id| *registry.local(id)).collect();
                let mut area = polygon_area_vector(&locals).norm();
                for hole in &self.holes {
                    let coords: Vec<Point<Real>> =
                        hole.iter().map(|&id| *registry.local(id)).collect();
                    area -= polygon_area_vector(&coords).norm();
                }
                area
            }
        }
    }

    /// All boundary lines of this facet: consecutive point pairs of the outer
    /// cycle and of every hole. A segment facet is itself one line.
    pub fn lines(&self) -> Vec<(PointId, PointId)> {
        let mut out = Vec::new();
        match self.cycle.len() {
            0 | 1 => {}
            2 => out.push((self.cycle[0], self.cycle[1])),
            n => {
                for i in 0..n {
                    out.push((self.cycle[i], self.cycle[(i + 1) % n]));
                }
                for hole in &self.holes {
                    for i in 0..hole.len() {
                        out.push((hole[i], hole[(i + 1) % hole.len()]));
                    }
                }
            }
        }
        out
    }
}

/// One region of a planar subdivision: a counter-clockwise outer cycle plus
/// clockwise hole cycles.
#[derive(Clone, Debug)]
pub struct PlanarRegion {
    /// The outer cycle, counter-clockwise.
    pub cycle: Vec<PointId>,
    /// Hole cycles, clockwise.
    pub holes: Vec<Vec<PointId>>,
}

/// Traces the regions of the planar subdivision spanned by `edges`.
///
/// `vertices` pairs each point id with its 2-D coordinates in the tracing
/// frame; `edges` are undirected index pairs into `vertices`. Every directed
/// edge is walked once, turning as sharply clockwise as possible at each
/// vertex, which yields each bounded region as a counter-clockwise cycle and
/// each connected component's unbounded contour as a clockwise one. Clockwise
/// contours nested inside a region of another component become its holes; the
/// outermost ones are dropped.
///
/// Isolated vertices are ignored. A degree-one vertex means a cut line ends
/// nowhere and is reported as a dangling line.
pub fn trace_planar_regions(
    vertices: &[(PointId, Point2<Real>)],
    edges: &[[u32; 2]],
) -> Result<Vec<PlanarRegion>, CutError> {
    let n = vertices.len();

    let mut unique: BTreeSet<(u32, u32)> = BTreeSet::new();
    for e in edges {
        if e[0] != e[1] {
            let _ = unique.insert((e[0].min(e[1]), e[0].max(e[1])));
        }
    }

    // Neighbor lists sorted counter-clockwise by angle.
    let mut adjacency: Vec<Vec<(u32, Real)>> = vec![Vec::new(); n];
    for &(a, b) in &unique {
        let dir_ab = vertices[b as usize].1 - vertices[a as usize].1;
        let dir_ba = -dir_ab;
        adjacency[a as usize].push((b, dir_ab.y.atan2(dir_ab.x)));
        adjacency[b as usize].push((a, dir_ba.y.atan2(dir_ba.x)));
    }

    let angle_tie = Real::EPSILON * 1.0e3;
    for neighbors in adjacency.iter_mut() {
        if neighbors.len() == 1 {
            return Err(GraphDefect::DanglingLine.into());
        }
        neighbors.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        for w in neighbors.windows(2) {
            if (w[1].1 - w[0].1).abs() <= angle_tie {
                return Err(DegeneracyKind::AmbiguousContact.into());
            }
        }
    }

    // Connected components, for hole assignment.
    let mut component = vec![u32::MAX; n];
    let mut next_component = 0u32;
    for start in 0..n {
        if component[start] != u32::MAX || adjacency[start].is_empty() {
            continue;
        }
        let mut stack = vec![start];
        component[start] = next_component;
        while let Some(v) = stack.pop() {
            for &(w, _) in &adjacency[v] {
                if component[w as usize] == u32::MAX {
                    component[w as usize] = next_component;
                    stack.push(w as usize);
                }
            }
        }
        next_component += 1;
    }

    // Walk every directed edge once.
    let mut visited: BTreeSet<(u32, u32)> = BTreeSet::new();
    let mut positives: Vec<(u32, Vec<u32>, Real)> = Vec::new();
    let mut negatives: Vec<(u32, Vec<u32>)> = Vec::new();

    for &(a, b) in &unique {
        for start in [(a, b), (b, a)] {
            if visited.contains(&start) {
                continue;
            }

            let mut cycle = Vec::new();
            let mut current = start;
            loop {
                let _ = visited.insert(current);
                cycle.push(current.1);

                let (from, at) = current;
                let neighbors = &adjacency[at as usize];
                let idx = neighbors
                    .iter()
                    .position(|&(v, _)| v == from)
                    .ok_or(CutError::GraphInconsistency(GraphDefect::DanglingLine))?;
                let next = neighbors[(idx + neighbors.len() - 1) % neighbors.len()].0;

                current = (at, next);
                if current == start {
                    break;
                }
            }

            let mut area = 0.0;
            for i in 0..cycle.len() {
                let p = vertices[cycle[i] as usize].1;
                let q = vertices[cycle[(i + 1) % cycle.len()] as usize].1;
                area += p.x * q.y - q.x * p.y;
            }
            area *= 0.5;

            let comp = component[cycle[0] as usize];
            if area >= 0.0 {
                positives.push((comp, cycle, area));
            } else {
                negatives.push((comp, cycle));
            }
        }
    }

    let mut regions: Vec<PlanarRegion> = positives
        .iter()
        .map(|(_, cycle, _)| PlanarRegion {
            cycle: cycle.iter().map(|&i| vertices[i as usize].0).collect(),
            holes: Vec::new(),
        })
        .collect();

    // A clockwise contour inside a region of another component is a hole of
    // the smallest such region; an uncontained one faces the outside.
    for (comp, cycle) in &negatives {
        let probe = vertices[cycle[0] as usize].1;
        let mut host: Option<(usize, Real)> = None;
        for (i, (host_comp, host_cycle, host_area)) in positives.iter().enumerate() {
            if host_comp == comp {
                continue;
            }
            let ring: Vec<Point2<Real>> = host_cycle
                .iter()
                .map(|&v| vertices[v as usize].1)
                .collect();
            if point_in_polygon2(&probe, &ring) && host.map_or(true, |(_, a)| *host_area < a) {
                host = Some((i, *host_area));
            }
        }
        if let Some((i, _)) = host {
            regions[i]
                .holes
                .push(cycle.iter().map(|&v| vertices[v as usize].0).collect());
        }
    }

    Ok(regions)
}
