//! Volume cells: the connected pieces a cut element decomposes into.

use crate::cut::facet::FacetId;
use crate::cut::facet_graph::FacetGraph;
use crate::cut::point_registry::PointRegistry;
use crate::cut::position::Position;
use crate::error::{CutError, GraphDefect};
use crate::integrate::QuadratureRule;
use crate::math::{Point, Real, Vector};

/// One cell of a cut element's decomposition.
///
/// The cell's boundary is a set of facet claims: the flag tells whether the
/// cell lies on the facet's positive-normal side, so the cell's outward
/// boundary orientation can be recovered from shared facets. Measures and
/// centroids live in the element-local frame.
#[derive(Clone, Debug)]
pub struct VolumeCell {
    facets: Vec<(FacetId, bool)>,
    position: Position,
    volume: Real,
    centroid: Point<Real>,
    rule: Option<QuadratureRule>,
}

impl VolumeCell {
    /// Builds a cell from its facet claims and computes its measure by the
    /// divergence theorem over the claimed boundary.
    ///
    /// A measure more negative than numeric noise means the claimed facets do
    /// not close up around a volume.
    pub(crate) fn new(
        facets: Vec<(FacetId, bool)>,
        graph: &FacetGraph,
        registry: &PointRegistry,
    ) -> Result<Self, CutError> {
        let (volume, centroid) = match graph.dim() {
            3 => measure_3d(&facets, graph),
            2 => measure_2d(&facets, graph, registry)?,
            _ => measure_1d(&facets, graph, registry)?,
        };
        if volume < -(Real::EPSILON * 1.0e3) {
            return Err(GraphDefect::OpenShell.into());
        }

        Ok(Self {
            facets,
            position: Position::Undecided,
            volume: volume.max(0.0),
            centroid,
            rule: None,
        })
    }

    /// The facet claims of this cell. The flag is `true` when the cell lies
    /// on the facet's positive-normal side.
    #[inline]
    pub fn facets(&self) -> &[(FacetId, bool)] {
        &self.facets
    }

    /// The region this cell belongs to.
    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Sets the region classification of this cell.
    #[inline]
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// The measure of this cell in the local frame: volume, area, or length
    /// depending on the element's intrinsic dimension.
    #[inline]
    pub fn volume(&self) -> Real {
        self.volume
    }

    /// The centroid of this cell in the local frame.
    #[inline]
    pub fn centroid(&self) -> &Point<Real> {
        &self.centroid
    }

    /// The quadrature rule generated for this cell, if any.
    #[inline]
    pub fn rule(&self) -> Option<&QuadratureRule> {
        self.rule.as_ref()
    }

    /// Attaches a quadrature rule to this cell.
    #[inline]
    pub fn set_rule(&mut self, rule: QuadratureRule) {
        self.rule = Some(rule);
    }

    /// The boundary triangles of a 3-D cell, wound outward.
    pub fn boundary_triangles(&self, graph: &FacetGraph) -> Vec<[Point<Real>; 3]> {
        let mut out = Vec::new();
        for &(fid, on_normal_side) in &self.facets {
            for tri in graph.facet(fid).triangles() {
                // A cell on the positive-normal side sees the facet normal
                // pointing inward, so its outward winding is reversed.
                if on_normal_side {
                    out.push([tri[0], tri[2], tri[1]]);
                } else {
                    out.push(*tri);
                }
            }
        }
        out
    }

    /// A tetrahedral tessellation of a 3-D cell: one tet per boundary
    /// triangle, fanned from the centroid. Hole triangles come out negatively
    /// oriented, so signed decompositions stay exact.
    pub fn tessellate(&self, graph: &FacetGraph) -> Vec<[Point<Real>; 4]> {
        self.boundary_triangles(graph)
            .iter()
            .map(|tri| [self.centroid, tri[0], tri[1], tri[2]])
            .collect()
    }

    /// The boundary segments of a 2-D cell, directed so the cell lies to
    /// their left.
    pub fn directed_segments(
        &self,
        graph: &FacetGraph,
        registry: &PointRegistry,
    ) -> Vec<[Point<Real>; 2]> {
        let mut out = Vec::new();
        for &(fid, on_normal_side) in &self.facets {
            let cycle = graph.facet(fid).cycle();
            if cycle.len() != 2 {
                continue;
            }
            let (a, b) = if on_normal_side {
                (cycle[0], cycle[1])
            } else {
                (cycle[1], cycle[0])
            };
            out.push([*registry.local(a), *registry.local(b)]);
        }
        out
    }

    /// The measure of this cell in the global frame, through the element's
    /// forward isoparametric map.
    ///
    /// Boundary entities are mapped vertex-wise before measuring, so this is
    /// the measure of the linearized image; exact for affine element
    /// geometries.
    pub fn global_volume(
        &self,
        graph: &FacetGraph,
        registry: &PointRegistry,
        forward: impl Fn(&Point<Real>) -> Point<Real>,
    ) -> Real {
        match graph.dim() {
            3 => {
                let mut six_volume = 0.0;
                for tri in self.boundary_triangles(graph) {
                    let a = forward(&tri[0]).coords;
                    let b = forward(&tri[1]).coords;
                    let c = forward(&tri[2]).coords;
                    six_volume += a.cross(&b).dot(&c);
                }
                (six_volume / 6.0).max(0.0)
            }
            2 => {
                // Newell area vector of the mapped boundary polygon.
                let mut area = Vector::zeros();
                for seg in self.directed_segments(graph, registry) {
                    let a = forward(&seg[0]).coords;
                    let b = forward(&seg[1]).coords;
                    area += a.cross(&b);
                }
                area.norm() * 0.5
            }
            _ => {
                let mut left = None;
                let mut right = None;
                for &(fid, on_normal_side) in &self.facets {
                    if let Some(&p) = graph.facet(fid).cycle().first() {
                        let mapped = forward(registry.local(p));
                        if on_normal_side {
                            left = Some(mapped);
                        } else {
                            right = Some(mapped);
                        }
                    }
                }
                match (left, right) {
                    (Some(l), Some(r)) => (r - l).norm(),
                    _ => 0.0,
                }
            }
        }
    }
}

fn measure_3d(members: &[(FacetId, bool)], graph: &FacetGraph) -> (Real, Point<Real>) {
    let mut six_volume = 0.0;
    let mut weighted = Vector::zeros();
    let mut vertex_sum = Vector::zeros();
    let mut vertex_count = 0usize;

    for &(fid, on_normal_side) in members {
        for tri in graph.facet(fid).triangles() {
            let (a, b, c) = if on_normal_side {
                (tri[0].coords, tri[2].coords, tri[1].coords)
            } else {
                (tri[0].coords, tri[1].coords, tri[2].coords)
            };
            // Signed volume of the tet spanned with the origin; exact for any
            // closed boundary.
            let det = a.cross(&b).dot(&c);
            six_volume += det;
            weighted += (a + b + c) * det;
            vertex_sum += a + b + c;
            vertex_count += 3;
        }
    }

    let volume = six_volume / 6.0;
    let centroid = if six_volume.abs() > Real::EPSILON * 100.0 {
        Point::from(weighted / (4.0 * six_volume))
    } else if vertex_count > 0 {
        Point::from(vertex_sum / vertex_count as Real)
    } else {
        Point::origin()
    };
    (volume, centroid)
}

fn measure_2d(
    members: &[(FacetId, bool)],
    graph: &FacetGraph,
    registry: &PointRegistry,
) -> Result<(Real, Point<Real>), CutError> {
    let mut twice_area = 0.0;
    let mut weighted: Vector<Real> = Vector::zeros();
    let mut vertex_sum = Vector::zeros();
    let mut vertex_count = 0usize;

    for &(fid, on_normal_side) in members {
        let cycle = graph.facet(fid).cycle();
        if cycle.len() != 2 {
            return Err(GraphDefect::OpenShell.into());
        }
        let (pa, pb) = if on_normal_side {
            (cycle[0], cycle[1])
        } else {
            (cycle[1], cycle[0])
        };
        let a = registry.local(pa);
        let b = registry.local(pb);
        let cross = a.x * b.y - b.x * a.y;
        twice_area += cross;
        weighted.x += (a.x + b.x) * cross;
        weighted.y += (a.y + b.y) * cross;
        vertex_sum += a.coords + b.coords;
        vertex_count += 2;
    }

    let area = twice_area * 0.5;
    let centroid = if twice_area.abs() > Real::EPSILON * 100.0 {
        Point::new(
            weighted.x / (3.0 * twice_area),
            weighted.y / (3.0 * twice_area),
            0.0,
        )
    } else if vertex_count > 0 {
        Point::from(vertex_sum / vertex_count as Real)
    } else {
        Point::origin()
    };
    Ok((area, centroid))
}

fn measure_1d(
    members: &[(FacetId, bool)],
    graph: &FacetGraph,
    registry: &PointRegistry,
) -> Result<(Real, Point<Real>), CutError> {
    // A segment cell is bounded by exactly two point facets: it lies on the
    // positive side of its left end and the negative side of its right end.
    let mut left = None;
    let mut right = None;
    for &(fid, on_normal_side) in members {
        let cycle = graph.facet(fid).cycle();
        if cycle.len() != 1 {
            return Err(GraphDefect::OpenShell.into());
        }
        let x = registry.local(cycle[0]).x;
        if on_normal_side {
            left = Some(x);
        } else {
            right = Some(x);
        }
    }

    match (left, right) {
        (Some(l), Some(r)) => Ok((r - l, Point::new((l + r) * 0.5, 0.0, 0.0))),
        _ => Err(GraphDefect::OpenShell.into()),
    }
}
