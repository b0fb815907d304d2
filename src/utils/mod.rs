//! Various unsorted geometrical and logical operators.

pub use self::center::center;
pub use self::frame::orthonormal_basis;
pub use self::sorted_pair::SortedPair;

mod center;
mod frame;
mod sorted_pair;
