//! Gauss rules on the reference cells.
//!
//! The 1-D Gauss-Legendre nodes are computed by Newton iteration on the
//! Legendre recurrence. Simplex and pyramid rules are conical products of the
//! 1-D rule through a collapsed-coordinate map, so every rule is exact for its
//! advertised total degree and all weights are positive.

use crate::integrate::QuadratureRule;
use crate::math::{Point, Real};
use crate::mesh::CellShape;

/// Number of 1-D Gauss points needed to integrate `degree` exactly.
#[inline]
pub fn point_count(degree: u32) -> usize {
    degree as usize / 2 + 1
}

/// Gauss-Legendre nodes and weights on `[-1, 1]`, in ascending node order.
///
/// An `n`-point rule integrates polynomials up to degree `2n - 1` exactly.
pub fn gauss_legendre(n: usize) -> (Vec<Real>, Vec<Real>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let pi = std::f64::consts::PI as Real;

    for i in 0..n.div_ceil(2) {
        // Start from the Chebyshev estimate of the i-th largest root.
        let mut x = (pi * (i as Real + 0.75) / (n as Real + 0.5)).cos();
        let mut derivative = 1.0;

        for _ in 0..100 {
            // Legendre recurrence: p1 = P_n(x), p2 = P_{n-1}(x).
            let mut p1: Real = 1.0;
            let mut p2: Real = 0.0;
            for j in 0..n {
                let p3 = p2;
                p2 = p1;
                p1 = ((2 * j + 1) as Real * x * p2 - j as Real * p3) / (j + 1) as Real;
            }
            derivative = n as Real * (x * p1 - p2) / (x * x - 1.0);
            let step = p1 / derivative;
            x -= step;
            if step.abs() <= Real::EPSILON * 4.0 {
                break;
            }
        }

        let weight = 2.0 / ((1.0 - x * x) * derivative * derivative);
        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = weight;
        weights[n - 1 - i] = weight;
    }

    (nodes, weights)
}

/// Gauss-Legendre nodes and weights mapped to `[0, 1]`.
fn gauss_legendre_01(n: usize) -> (Vec<Real>, Vec<Real>) {
    let (mut nodes, mut weights) = gauss_legendre(n);
    for x in &mut nodes {
        *x = (*x + 1.0) * 0.5;
    }
    for w in &mut weights {
        *w *= 0.5;
    }
    (nodes, weights)
}

/// The Gauss rule of the given reference cell, exact for polynomials of the
/// given total degree. Points are in reference coordinates; weights sum to the
/// reference cell measure.
pub fn reference_rule(shape: CellShape, degree: u32) -> QuadratureRule {
    let mut rule = QuadratureRule::default();

    match shape {
        CellShape::Line2 => {
            let (xs, ws) = gauss_legendre(point_count(degree));
            for (&x, &w) in xs.iter().zip(ws.iter()) {
                rule.push(Point::new(x, 0.0, 0.0), w);
            }
        }
        CellShape::Quad4 => {
            let (xs, ws) = gauss_legendre(point_count(degree));
            for (&x, &wx) in xs.iter().zip(ws.iter()) {
                for (&y, &wy) in xs.iter().zip(ws.iter()) {
                    rule.push(Point::new(x, y, 0.0), wx * wy);
                }
            }
        }
        CellShape::Hex8 => {
            let (xs, ws) = gauss_legendre(point_count(degree));
            for (&x, &wx) in xs.iter().zip(ws.iter()) {
                for (&y, &wy) in xs.iter().zip(ws.iter()) {
                    for (&z, &wz) in xs.iter().zip(ws.iter()) {
                        rule.push(Point::new(x, y, z), wx * wy * wz);
                    }
                }
            }
        }
        CellShape::Tri3 => {
            // Duffy map x = u, y = v (1 - u) with Jacobian (1 - u); the u
            // direction picks up one extra polynomial degree.
            let (us, wus) = gauss_legendre_01(point_count(degree + 1));
            let (vs, wvs) = gauss_legendre_01(point_count(degree));
            for (&u, &wu) in us.iter().zip(wus.iter()) {
                for (&v, &wv) in vs.iter().zip(wvs.iter()) {
                    rule.push(Point::new(u, v * (1.0 - u), 0.0), wu * wv * (1.0 - u));
                }
            }
        }
        CellShape::Tet4 => {
            // x = u, y = v (1 - u), z = w (1 - u)(1 - v), Jacobian
            // (1 - u)^2 (1 - v).
            let (us, wus) = gauss_legendre_01(point_count(degree + 2));
            let (vs, wvs) = gauss_legendre_01(point_count(degree + 1));
            let (zs, wzs) = gauss_legendre_01(point_count(degree));
            for (&u, &wu) in us.iter().zip(wus.iter()) {
                for (&v, &wv) in vs.iter().zip(wvs.iter()) {
                    for (&w, &ww) in zs.iter().zip(wzs.iter()) {
                        let jacobian = (1.0 - u) * (1.0 - u) * (1.0 - v);
                        rule.push(
                            Point::new(u, v * (1.0 - u), w * (1.0 - u) * (1.0 - v)),
                            wu * wv * ww * jacobian,
                        );
                    }
                }
            }
        }
        CellShape::Wedge6 => {
            let triangle = reference_rule(CellShape::Tri3, degree);
            let (zs, wzs) = gauss_legendre(point_count(degree));
            for (p, w) in triangle.iter() {
                for (&z, &wz) in zs.iter().zip(wzs.iter()) {
                    rule.push(Point::new(p.x, p.y, z), w * wz);
                }
            }
        }
        CellShape::Pyramid5 => {
            // Collapse toward the apex: x = xi (1 - z), y = eta (1 - z) with
            // Jacobian (1 - z)^2 feeding two extra degrees into z.
            let (xs, wxs) = gauss_legendre(point_count(degree));
            let (zs, wzs) = gauss_legendre_01(point_count(degree + 2));
            for (&xi, &wx) in xs.iter().zip(wxs.iter()) {
                for (&eta, &wy) in xs.iter().zip(wxs.iter()) {
                    for (&z, &wz) in zs.iter().zip(wzs.iter()) {
                        let shrink = 1.0 - z;
                        rule.push(
                            Point::new(xi * shrink, eta * shrink, z),
                            wx * wy * wz * shrink * shrink,
                        );
                    }
                }
            }
        }
    }

    rule
}
