//! Reduced integration rules for cut elements.

pub use self::basis::MonomialBasis;
pub use self::moment_fit::fit_quadrature;
pub use self::rules::{
    cubature_degree, full_cell_rule, moment_fitted_boundary_rule, moment_fitted_volume_rule,
    segment_rule, tessellated_boundary_rule, tessellated_planar_rule, tessellated_tet_rule,
    tessellated_tri_rule, BoundaryRule, BoundaryRuleKind, QuadratureRule, VolumeRuleKind,
};

pub mod basis;
pub mod gauss;
pub mod moment_fit;
pub mod moments;
pub mod rules;
