//! Tolerances steering the cut and integration pipeline.

use crate::math::Real;

/// The tolerances used by every stage of a cut pass.
///
/// All length-like tolerances are relative: they are multiplied by a
/// characteristic length (element diameter, facet diameter, …) at the point of
/// use, so one set of values works across mesh scales.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CutTolerances {
    /// Distance (relative to the element diameter) below which two cut points
    /// are merged into one.
    ///
    /// Intersections closer than this to an existing point, an element node,
    /// or an element edge are snapped onto it instead of spawning a near
    /// duplicate.
    pub point_merge: Real,
    /// Maximum deviation of a facet vertex from the facet's best-fit plane,
    /// relative to the facet diameter, for the facet to count as planar.
    pub coplanarity: Real,
    /// Signed-distance band (relative to the element diameter) within which a
    /// point lies *on* the cut surface rather than on either side of it.
    pub on_surface: Real,
    /// Slack on parametric coordinates: an intersection whose edge or side
    /// parameter lands within this band outside `[0, 1]` is clamped to the
    /// nearest endpoint instead of being discarded.
    pub parametric_slack: Real,
    /// Sine of the angle between a segment and a plane below which the two
    /// count as parallel and their intersection as degenerate.
    pub parallelism: Real,
    /// Convergence threshold on the local-coordinate update of the Newton
    /// iteration inverting the isoparametric map.
    pub newton: Real,
    /// Hard cap on Newton iterations for the inverse isoparametric map.
    pub max_newton_iterations: u32,
    /// Singular values below this fraction of the largest singular value are
    /// treated as zero when solving a moment-fitting system; a rank-deficient
    /// system triggers a retry with a refined point set.
    pub fit_conditioning: Real,
    /// Number of refine-and-retry rounds moment fitting may attempt before
    /// reporting the system as singular.
    pub max_fit_attempts: u32,
    /// Allowed relative deviation between the summed volumes of an element's
    /// cells and the element volume in the partition self-test.
    pub volume_check: Real,
}

/// Default conditioning cutoff and volume-check band.
///
/// These two do not scale linearly with the machine epsilon: they must sit a
/// few orders of magnitude above the roundoff accumulated by an SVD solve or a
/// divergence-theorem volume sum.
#[cfg(feature = "f64")]
const FIT_CONDITIONING: Real = 1.0e-10;
#[cfg(feature = "f32")]
const FIT_CONDITIONING: Real = 3.0e-5;

#[cfg(feature = "f64")]
const VOLUME_CHECK: Real = 1.0e-10;
#[cfg(feature = "f32")]
const VOLUME_CHECK: Real = 1.0e-3;

impl Default for CutTolerances {
    fn default() -> Self {
        Self {
            point_merge: Real::EPSILON * 1.0e4,
            coplanarity: Real::EPSILON * 1.0e4,
            on_surface: Real::EPSILON * 1.0e4,
            parametric_slack: Real::EPSILON * 1.0e4,
            parallelism: Real::EPSILON * 1.0e4,
            newton: Real::EPSILON * 1.0e2,
            max_newton_iterations: 20,
            fit_conditioning: FIT_CONDITIONING,
            max_fit_attempts: 3,
            volume_check: VOLUME_CHECK,
        }
    }
}
