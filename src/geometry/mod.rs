//! Geometric primitives shared by the cut and integration stages.

pub use self::bounding_box::BoundingBox;
pub use self::plane::Plane;
#[cfg(feature = "std")]
pub use self::polygon::triangulate_polygon3;
pub use self::polygon::{polygon_area_vector, polygon_centroid};
#[cfg(feature = "std")]
pub use self::predicates::angle_around_axis;
pub use self::predicates::{
    closest_point_on_triangle, point_in_polygon2, segment_triangle_intersection,
    SegmentTriangleHit,
};

mod bounding_box;
mod plane;
mod polygon;
mod predicates;
