//! The merge-tolerant point arena backing one element cut.

use crate::cut::position::Position;
use crate::math::{Point, Real};
use crate::mesh::SideId;
use smallvec::SmallVec;

/// The identifier of a registered cut point, scoped to one element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PointId(pub u32);

/// One registered point with the feature memberships it has accrued.
///
/// Coordinates are fixed the moment the point is created; later insertions
/// that merge into it only add memberships.
#[derive(Clone, Debug)]
pub struct CutPoint {
    global: Point<Real>,
    local: Point<Real>,
    position: Position,
    edges: SmallVec<[(u8, Real); 2]>,
    faces: SmallVec<[u8; 3]>,
    sides: SmallVec<[SideId; 2]>,
    node: Option<u8>,
    on_cut_surface: bool,
}

impl CutPoint {
    /// The global coordinates of this point.
    #[inline]
    pub fn global(&self) -> &Point<Real> {
        &self.global
    }

    /// The element-local coordinates of this point.
    #[inline]
    pub fn local(&self) -> &Point<Real> {
        &self.local
    }

    /// The classified position of this point.
    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    /// The element edges this point lies on, with the cached parameter in
    /// `[0, 1]` along each.
    #[inline]
    pub fn edges(&self) -> &[(u8, Real)] {
        &self.edges
    }

    /// The cached parameter of this point along the given element edge.
    pub fn edge_parameter(&self, edge: u8) -> Option<Real> {
        self.edges.iter().find(|(e, _)| *e == edge).map(|(_, t)| *t)
    }

    /// The element faces this point lies on.
    #[inline]
    pub fn faces(&self) -> &[u8] {
        &self.faces
    }

    /// The interface sides this point lies on.
    #[inline]
    pub fn sides(&self) -> &[SideId] {
        &self.sides
    }

    /// The element node this point coincides with, if any.
    #[inline]
    pub fn node(&self) -> Option<u8> {
        self.node
    }

    /// Whether this point lies on the cut surface.
    #[inline]
    pub fn is_on_cut_surface(&self) -> bool {
        self.on_cut_surface
    }
}

/// The merge-tolerant arena of points produced while cutting one element.
///
/// Any insertion landing within the merge radius (a global-frame distance) of
/// an existing point *is* that point; identity never changes once established.
#[derive(Clone, Debug)]
pub struct PointRegistry {
    points: Vec<CutPoint>,
    merge_radius: Real,
}

impl PointRegistry {
    /// Creates an empty registry with the given absolute merge radius.
    pub fn new(merge_radius: Real) -> Self {
        Self {
            points: Vec::new(),
            merge_radius,
        }
    }

    /// The absolute merge radius of this registry.
    #[inline]
    pub fn merge_radius(&self) -> Real {
        self.merge_radius
    }

    /// Number of distinct points registered so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no point has been registered yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over all point ids.
    pub fn ids(&self) -> impl Iterator<Item = PointId> {
        (0..self.points.len() as u32).map(PointId)
    }

    /// Inserts a point given in both frames, merging it into the nearest
    /// existing point within the merge radius.
    pub fn insert(&mut self, global: Point<Real>, local: Point<Real>) -> PointId {
        let mut best: Option<(usize, Real)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let d = (p.global - global).norm();
            if d <= self.merge_radius && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        if let Some((i, _)) = best {
            return PointId(i as u32);
        }

        self.points.push(CutPoint {
            global,
            local,
            position: Position::Undecided,
            edges: SmallVec::new(),
            faces: SmallVec::new(),
            sides: SmallVec::new(),
            node: None,
            on_cut_surface: false,
        });
        PointId(self.points.len() as u32 - 1)
    }

    /// The point with the given id.
    #[inline]
    pub fn point(&self, id: PointId) -> &CutPoint {
        &self.points[id.0 as usize]
    }

    /// The global coordinates of a point.
    #[inline]
    pub fn global(&self, id: PointId) -> &Point<Real> {
        &self.points[id.0 as usize].global
    }

    /// The element-local coordinates of a point.
    #[inline]
    pub fn local(&self, id: PointId) -> &Point<Real> {
        &self.points[id.0 as usize].local
    }

    /// Sets the classified position of a point.
    pub fn set_position(&mut self, id: PointId, position: Position) {
        self.points[id.0 as usize].position = position;
    }

    /// Records that a point lies on an element edge, caching its parameter.
    ///
    /// The first recorded parameter per edge wins.
    pub fn register_edge(&mut self, id: PointId, edge: u8, t: Real) {
        let p = &mut self.points[id.0 as usize];
        if !p.edges.iter().any(|(e, _)| *e == edge) {
            p.edges.push((edge, t));
        }
    }

    /// Records that a point lies on an element face.
    pub fn register_face(&mut self, id: PointId, face: u8) {
        let p = &mut self.points[id.0 as usize];
        if !p.faces.contains(&face) {
            p.faces.push(face);
        }
    }

    /// Records that a point lies on an interface side, marking it as on the
    /// cut surface.
    pub fn register_side(&mut self, id: PointId, side: SideId) {
        let p = &mut self.points[id.0 as usize];
        if !p.sides.contains(&side) {
            p.sides.push(side);
        }
        p.on_cut_surface = true;
    }

    /// Marks a point as lying on the cut surface (level-set crossings carry no
    /// side id).
    pub fn mark_on_cut_surface(&mut self, id: PointId) {
        self.points[id.0 as usize].on_cut_surface = true;
    }

    /// Records that a point coincides with an element node.
    pub fn set_node(&mut self, id: PointId, node: u8) {
        self.points[id.0 as usize].node = Some(node);
    }
}
