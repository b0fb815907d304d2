use std::cmp::PartialOrd;

/// A pair of elements sorted in increasing order.
///
/// Serves as the canonical key for undirected links, e.g. the two end points
/// of a facet line, so that `(a, b)` and `(b, a)` address the same entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SortedPair<T: PartialOrd>([T; 2]);

impl<T: PartialOrd + Copy> SortedPair<T> {
    /// Sorts two elements in increasing order into a new pair.
    pub fn new(element1: T, element2: T) -> Self {
        if element1 > element2 {
            SortedPair([element2, element1])
        } else {
            SortedPair([element1, element2])
        }
    }

    /// The smaller element of the pair.
    #[inline]
    pub fn min(&self) -> T {
        self.0[0]
    }

    /// The larger element of the pair.
    #[inline]
    pub fn max(&self) -> T {
        self.0[1]
    }
}
