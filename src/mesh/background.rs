//! The background mesh whose elements get cut.

use crate::error::MeshDefect;
use crate::geometry::BoundingBox;
use crate::math::{Point, Real};
use crate::mesh::{CellShape, MAX_NODES};
use arrayvec::ArrayVec;
use smallvec::SmallVec;

/// The identifier of a background element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ElementId(pub u32);

/// One background element: a reference shape plus its node connectivity.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Element {
    /// The reference shape of this element.
    pub shape: CellShape,
    /// Indices into the mesh node array, in the shape's node order.
    pub nodes: SmallVec<[u32; MAX_NODES]>,
}

impl Element {
    /// Creates an element from its shape and node indices.
    pub fn new(shape: CellShape, nodes: impl Into<SmallVec<[u32; MAX_NODES]>>) -> Self {
        Self {
            shape,
            nodes: nodes.into(),
        }
    }
}

/// A mesh of background elements, any subset of which may be crossed by the
/// interface.
///
/// Elements of every intrinsic dimension can coexist: volume elements are cut
/// into polyhedral cells, embedded surface elements into polygonal cells, and
/// embedded line elements into segments.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BackgroundMesh {
    nodes: Vec<Point<Real>>,
    elements: Vec<Element>,
}

impl BackgroundMesh {
    /// Creates a background mesh after validating every element's
    /// connectivity.
    pub fn new(nodes: Vec<Point<Real>>, elements: Vec<Element>) -> Result<Self, MeshDefect> {
        for (eid, element) in elements.iter().enumerate() {
            let expected = element.shape.node_count();
            if element.nodes.len() != expected {
                return Err(MeshDefect::NodeCountMismatch {
                    element: eid as u32,
                    expected,
                    got: element.nodes.len(),
                });
            }
            for &node in &element.nodes {
                if node as usize >= nodes.len() {
                    return Err(MeshDefect::NodeOutOfBounds {
                        element: eid as u32,
                        node,
                    });
                }
            }
        }

        Ok(Self { nodes, elements })
    }

    /// The node coordinates of this mesh.
    #[inline]
    pub fn nodes(&self) -> &[Point<Real>] {
        &self.nodes
    }

    /// The elements of this mesh.
    #[inline]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// The element with the given id.
    #[inline]
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0 as usize]
    }

    /// Iterates over all element ids.
    pub fn element_ids(&self) -> impl Iterator<Item = ElementId> {
        (0..self.elements.len() as u32).map(ElementId)
    }

    /// The corner coordinates of an element, in shape node order.
    pub fn element_corners(&self, id: ElementId) -> ArrayVec<Point<Real>, MAX_NODES> {
        self.element(id)
            .nodes
            .iter()
            .map(|&n| self.nodes[n as usize])
            .collect()
    }

    /// The bounding box of an element.
    pub fn element_bounding_box(&self, id: ElementId) -> BoundingBox {
        BoundingBox::from_points(
            self.element(id)
                .nodes
                .iter()
                .map(|&n| &self.nodes[n as usize]),
        )
    }
}
