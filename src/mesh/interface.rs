//! Embedded interface descriptions: surface meshes and level sets.

use crate::error::MeshDefect;
use crate::geometry::{polygon_area_vector, BoundingBox};
use crate::math::{Point, Real};
use crate::mesh::CellShape;
use arrayvec::ArrayVec;
use smallvec::SmallVec;

/// The identifier of an interface side.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SideId(pub u32);

/// One interface side: a `Tri3` or `Quad4` patch of the cutting surface.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Side {
    /// The reference shape of this side, `Tri3` or `Quad4`.
    pub shape: CellShape,
    /// Indices into the interface node array.
    pub nodes: SmallVec<[u32; 4]>,
}

impl Side {
    /// Creates a side from its shape and node indices.
    pub fn new(shape: CellShape, nodes: impl Into<SmallVec<[u32; 4]>>) -> Self {
        Self {
            shape,
            nodes: nodes.into(),
        }
    }
}

/// A surface mesh describing the interface.
///
/// Side normals (right-hand rule around each side's node cycle) must point
/// toward the *outside* region.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct InterfaceMesh {
    nodes: Vec<Point<Real>>,
    sides: Vec<Side>,
}

impl InterfaceMesh {
    /// Creates an interface mesh after validating every side.
    pub fn new(nodes: Vec<Point<Real>>, sides: Vec<Side>) -> Result<Self, MeshDefect> {
        for (sid, side) in sides.iter().enumerate() {
            if !matches!(side.shape, CellShape::Tri3 | CellShape::Quad4) {
                return Err(MeshDefect::UnsupportedSideShape { side: sid as u32 });
            }
            if side.nodes.len() != side.shape.node_count() {
                return Err(MeshDefect::NodeCountMismatch {
                    element: sid as u32,
                    expected: side.shape.node_count(),
                    got: side.nodes.len(),
                });
            }
            for &node in &side.nodes {
                if node as usize >= nodes.len() {
                    return Err(MeshDefect::NodeOutOfBounds {
                        element: sid as u32,
                        node,
                    });
                }
            }

            let corners: ArrayVec<Point<Real>, 4> = side
                .nodes
                .iter()
                .map(|&n| nodes[n as usize])
                .collect();
            if polygon_area_vector(&corners).norm() == 0.0 {
                return Err(MeshDefect::DegenerateEntity { entity: sid as u32 });
            }
        }

        Ok(Self { nodes, sides })
    }

    /// The node coordinates of this interface.
    #[inline]
    pub fn nodes(&self) -> &[Point<Real>] {
        &self.nodes
    }

    /// The sides of this interface.
    #[inline]
    pub fn sides(&self) -> &[Side] {
        &self.sides
    }

    /// The side with the given id.
    #[inline]
    pub fn side(&self, id: SideId) -> &Side {
        &self.sides[id.0 as usize]
    }

    /// Iterates over all side ids.
    pub fn side_ids(&self) -> impl Iterator<Item = SideId> {
        (0..self.sides.len() as u32).map(SideId)
    }

    /// The corner coordinates of a side, in node order.
    pub fn side_corners(&self, id: SideId) -> ArrayVec<Point<Real>, 4> {
        self.side(id)
            .nodes
            .iter()
            .map(|&n| self.nodes[n as usize])
            .collect()
    }

    /// The side split into triangles: one for a `Tri3`, two for a `Quad4`.
    ///
    /// All intersection tests run on these triangles; the quad split keeps the
    /// side winding, so triangle normals agree with the side normal.
    pub fn side_triangles(&self, id: SideId) -> ArrayVec<[Point<Real>; 3], 2> {
        let corners = self.side_corners(id);
        let mut triangles = ArrayVec::new();
        triangles.push([corners[0], corners[1], corners[2]]);
        if corners.len() == 4 {
            triangles.push([corners[0], corners[2], corners[3]]);
        }
        triangles
    }

    /// The bounding box of a side.
    pub fn side_bounding_box(&self, id: SideId) -> BoundingBox {
        BoundingBox::from_points(self.side(id).nodes.iter().map(|&n| &self.nodes[n as usize]))
    }
}

/// How the embedded interface is described.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Interface {
    /// An explicit surface mesh.
    Mesh(InterfaceMesh),
    /// Nodal values of a level-set function sampled at the background mesh
    /// nodes. The interface is the zero isocontour; positive values lie
    /// outside.
    LevelSet(Vec<Real>),
}

#[cfg(test)]
mod tests {
    use super::{InterfaceMesh, Side};
    use crate::error::MeshDefect;
    use crate::math::Point;
    use crate::mesh::CellShape;
    use smallvec::smallvec;

    #[test]
    fn degenerate_sides_are_rejected() {
        let nodes = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
        ];
        let collapsed = Side {
            shape: CellShape::Tri3,
            nodes: smallvec![0, 1, 2],
        };
        assert!(matches!(
            InterfaceMesh::new(nodes, vec![collapsed]),
            Err(MeshDefect::DegenerateEntity { entity: 0 })
        ));
    }

    #[test]
    fn quads_split_into_two_triangles() {
        let nodes = vec![
            Point::new(0.0, 0.0, 0.5),
            Point::new(1.0, 0.0, 0.5),
            Point::new(1.0, 1.0, 0.5),
            Point::new(0.0, 1.0, 0.5),
        ];
        let quad = Side {
            shape: CellShape::Quad4,
            nodes: smallvec![0, 1, 2, 3],
        };
        let mesh = InterfaceMesh::new(nodes, vec![quad]).unwrap();
        let id = mesh.side_ids().next().unwrap();
        let triangles = mesh.side_triangles(id);
        assert_eq!(triangles.len(), 2);

        // Both keep the side winding (+z here).
        for tri in &triangles {
            let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
            assert!(n.z > 0.0);
        }
    }
}
