//! Background meshes, embedded interfaces, and the reference cells they are
//! made of.

pub use self::background::{BackgroundMesh, Element, ElementId};
pub use self::cell_shapes::{CellShape, ShapeGradients, ShapeValues, MAX_NODES};
pub use self::interface::{Interface, InterfaceMesh, Side, SideId};

mod background;
mod cell_shapes;
mod interface;
