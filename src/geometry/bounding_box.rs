//! Axis-aligned bounding boxes for the broad phase.

use crate::math::{Point, Real, Vector, DIM};
use na;
use num::Bounded;

/// An axis-aligned bounding box.
///
/// A freshly created box is *empty*: its `mins` exceed its `maxs` and no point
/// is contained in it. Adding the first point collapses the box onto that
/// point; further points only widen it.
#[derive(Debug, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// The point with the smallest coordinates of this box.
    pub mins: Point<Real>,
    /// The point with the highest coordinates of this box.
    pub maxs: Point<Real>,
}

impl BoundingBox {
    /// Creates a new bounding box from its component-wise extremal points.
    #[inline]
    pub fn new(mins: Point<Real>, maxs: Point<Real>) -> Self {
        Self { mins, maxs }
    }

    /// Creates an empty bounding box containing no point.
    #[inline]
    pub fn new_invalid() -> Self {
        Self::new(
            Vector::repeat(Real::max_value()).into(),
            Vector::repeat(-Real::max_value()).into(),
        )
    }

    /// Does this box contain no point at all?
    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..DIM).any(|i| self.mins[i] > self.maxs[i])
    }

    /// Computes the bounding box of a set of points.
    pub fn from_points<'a, I>(pts: I) -> Self
    where
        I: IntoIterator<Item = &'a Point<Real>>,
    {
        let mut result = Self::new_invalid();
        for pt in pts {
            result.add_point(pt);
        }
        result
    }

    /// Grows this box so it contains `pt`.
    #[inline]
    pub fn add_point(&mut self, pt: &Point<Real>) {
        self.mins = self.mins.coords.inf(&pt.coords).into();
        self.maxs = self.maxs.coords.sup(&pt.coords).into();
    }

    /// Grows this box so it contains `other` entirely.
    #[inline]
    pub fn merge(&mut self, other: &Self) {
        self.mins = self.mins.coords.inf(&other.mins.coords).into();
        self.maxs = self.maxs.coords.sup(&other.maxs.coords).into();
    }

    /// Returns a box enlarged by `amount` on every side.
    #[inline]
    pub fn loosened(mut self, amount: Real) -> Self {
        self.mins -= Vector::repeat(amount);
        self.maxs += Vector::repeat(amount);
        self
    }

    /// The center of this box.
    #[inline]
    pub fn center(&self) -> Point<Real> {
        na::center(&self.mins, &self.maxs)
    }

    /// The edge lengths of this box.
    #[inline]
    pub fn extents(&self) -> Vector<Real> {
        self.maxs - self.mins
    }

    /// The length of the diagonal of this box, a characteristic length for
    /// relative tolerances.
    #[inline]
    pub fn diameter(&self) -> Real {
        if self.is_empty() {
            0.0
        } else {
            self.extents().norm()
        }
    }

    /// The i-th corner of this box.
    ///
    /// Bit `k` of `i` selects `maxs` over `mins` along dimension `k`, so
    /// corners 0 and 7 are `mins` and `maxs` themselves.
    #[inline]
    pub fn corner(&self, i: usize) -> Point<Real> {
        Point::new(
            if i & 1 != 0 { self.maxs.x } else { self.mins.x },
            if i & 2 != 0 { self.maxs.y } else { self.mins.y },
            if i & 4 != 0 { self.maxs.z } else { self.mins.z },
        )
    }

    /// Does this box contain `pt`, with every face pushed outward by `slack`?
    #[inline]
    pub fn contains_point(&self, pt: &Point<Real>, slack: Real) -> bool {
        (0..DIM).all(|i| pt[i] >= self.mins[i] - slack && pt[i] <= self.maxs[i] + slack)
    }

    /// Do this box and `other` overlap, with every face pushed outward by
    /// `slack`?
    #[inline]
    pub fn intersects(&self, other: &Self, slack: Real) -> bool {
        (0..DIM).all(|i| {
            self.mins[i] - slack <= other.maxs[i] && self.maxs[i] + slack >= other.mins[i]
        })
    }
}
