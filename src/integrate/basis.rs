//! Monomial bases for moment fitting.

use crate::math::{Point, Real};

/// A centered, scaled monomial basis over a cell or a facet plane.
///
/// Functions are ordered by total degree, lowest first, so a truncated prefix
/// of the basis is always its best-conditioned subset. Centering and scaling
/// by the cell size keeps the moment matrix well conditioned regardless of
/// where the cell sits in its element.
#[derive(Clone, Debug)]
pub struct MonomialBasis {
    center: Point<Real>,
    scale: Real,
    degree: u32,
    exponents: Vec<[u32; 3]>,
}

impl MonomialBasis {
    /// A 3-D basis of all monomials with total degree at most `degree`.
    pub fn volume(degree: u32, center: Point<Real>, scale: Real) -> Self {
        let mut exponents = Vec::new();
        for total in 0..=degree {
            for a in (0..=total).rev() {
                for b in (0..=total - a).rev() {
                    exponents.push([a, b, total - a - b]);
                }
            }
        }
        Self::new(center, scale, degree, exponents)
    }

    /// A 2-D basis over a facet plane frame; the third coordinate is unused.
    pub fn surface(degree: u32, center: Point<Real>, scale: Real) -> Self {
        let mut exponents = Vec::new();
        for total in 0..=degree {
            for a in (0..=total).rev() {
                exponents.push([a, total - a, 0]);
            }
        }
        Self::new(center, scale, degree, exponents)
    }

    fn new(center: Point<Real>, scale: Real, degree: u32, exponents: Vec<[u32; 3]>) -> Self {
        Self {
            center,
            scale: if scale > 0.0 { scale } else { 1.0 },
            degree,
            exponents,
        }
    }

    /// Number of basis functions.
    #[inline]
    pub fn len(&self) -> usize {
        self.exponents.len()
    }

    /// Whether the basis is empty. It never is: degree 0 keeps the constant.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exponents.is_empty()
    }

    /// The maximal total degree.
    #[inline]
    pub fn degree(&self) -> u32 {
        self.degree
    }

    /// The exponent triple of each basis function.
    #[inline]
    pub fn exponents(&self) -> &[[u32; 3]] {
        &self.exponents
    }

    /// Evaluates basis function `k` at `point`.
    pub fn eval_one(&self, k: usize, point: &Point<Real>) -> Real {
        let local = (point - self.center) / self.scale;
        let [a, b, c] = self.exponents[k];
        local.x.powi(a as i32) * local.y.powi(b as i32) * local.z.powi(c as i32)
    }

    /// Evaluates every basis function at `point` into `out`.
    pub fn eval_into(&self, point: &Point<Real>, out: &mut [Real]) {
        let local = (point - self.center) / self.scale;
        for (value, [a, b, c]) in out.iter_mut().zip(self.exponents.iter()) {
            *value = local.x.powi(*a as i32) * local.y.powi(*b as i32) * local.z.powi(*c as i32);
        }
    }

    /// The x-antiderivative of basis function `k` at `point`.
    ///
    /// Feeding this into a surface integral with the x component of the area
    /// normal turns cell moments into boundary integrals (divergence theorem).
    pub fn x_primitive(&self, k: usize, point: &Point<Real>) -> Real {
        let local = (point - self.center) / self.scale;
        let [a, b, c] = self.exponents[k];
        self.scale / (a + 1) as Real
            * local.x.powi(a as i32 + 1)
            * local.y.powi(b as i32)
            * local.z.powi(c as i32)
    }
}
