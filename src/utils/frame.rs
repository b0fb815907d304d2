use crate::math::{Real, Vector};

// See the SIMD implementation of copy_sign there: https://stackoverflow.com/a/57872652
fn copy_sign(from: Real, to: Real) -> Real {
    let minus_zero: Real = -0.0;
    let signbit = minus_zero.to_bits();
    Real::from_bits((signbit & from.to_bits()) | ((!signbit) & to.to_bits()))
}

/// Computes two unit vectors which, combined with the unit vector `n`, form an
/// orthonormal basis.
///
/// This spans the in-plane frame of facets and cut sides.
// Robust and branchless implementation from Pixar:
// https://graphics.pixar.com/library/OrthonormalB/paper.pdf
pub fn orthonormal_basis(n: &Vector<Real>) -> [Vector<Real>; 2] {
    let sign = copy_sign(n.z, 1.0);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;

    [
        Vector::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
        Vector::new(b, sign + n.y * n.y * a, -n.y),
    ]
}
