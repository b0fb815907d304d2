//! Bounded refine-and-retry moment fitting.

use crate::error::CutError;
use crate::integrate::basis::MonomialBasis;
use crate::math::{Point, Real};
use crate::tolerance::CutTolerances;
use na::{DMatrix, DVector};

/// Fits quadrature weights at candidate points so that the rule reproduces
/// `moments` for every function of `basis`, keeping point locations fixed.
///
/// `candidates` is asked once per attempt and should return a richer point set
/// for larger attempt numbers. An attempt is rejected when the moment matrix
/// is rank deficient under the conditioning cutoff or when a weight falls
/// below the negativity band; the retry budget is
/// `tolerances.max_fit_attempts`.
pub fn fit_quadrature(
    basis: &MonomialBasis,
    moments: &[Real],
    tolerances: &CutTolerances,
    mut candidates: impl FnMut(u32) -> Vec<Point<Real>>,
) -> Result<(Vec<Point<Real>>, Vec<Real>), CutError> {
    // The first moment is the cell measure; it scales the negativity band.
    let measure = moments.first().copied().unwrap_or(0.0).abs();

    let mut attempts = 0;
    while attempts < tolerances.max_fit_attempts {
        let points = candidates(attempts);
        attempts += 1;
        match fit_once(basis, moments, &points, tolerances, measure) {
            Ok(weights) => return Ok((points, weights)),
            Err(reason) => {
                log::debug!(
                    "moment fit attempt {} with {} points rejected: {}",
                    attempts,
                    points.len(),
                    reason
                );
            }
        }
    }

    Err(CutError::SingularMomentFit { attempts })
}

fn fit_once(
    basis: &MonomialBasis,
    moments: &[Real],
    points: &[Point<Real>],
    tolerances: &CutTolerances,
    measure: Real,
) -> Result<Vec<Real>, &'static str> {
    if points.len() < basis.len() {
        return Err("fewer candidate points than basis functions");
    }

    let matrix =
        DMatrix::from_fn(basis.len(), points.len(), |i, j| basis.eval_one(i, &points[j]));
    let rhs = DVector::from_column_slice(moments);

    let svd = matrix.svd(true, true);
    let cutoff = tolerances.fit_conditioning * svd.singular_values.max();
    if svd.rank(cutoff) < basis.len() {
        return Err("moment matrix is rank deficient");
    }

    // Minimum-norm least squares; spreads weight across the candidates.
    let solution = svd.solve(&rhs, cutoff)?;
    let weights: Vec<Real> = solution.iter().copied().collect();

    let band = tolerances.fit_conditioning * measure;
    if weights.iter().any(|w| *w < -band) {
        return Err("fit produced a negative weight");
    }

    Ok(weights)
}
