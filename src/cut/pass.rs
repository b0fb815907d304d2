//! The whole-mesh cut pass.
//!
//! A [`CutPass`] cuts every element of a background mesh against one
//! interface. The interface sides go into a broad-phase tree once, up front;
//! after that every element is cut independently from the read-only mesh,
//! interface and tree, so the per-element loop parallelizes freely when the
//! `parallel` feature is on. Failures stay per-element: the pass always
//! finishes and the report carries both the results and the failures.

use crate::cut::element_cut::ElementCut;
use crate::error::{CutError, MeshDefect};
use crate::integrate::{BoundaryRuleKind, VolumeRuleKind};
use crate::math::Real;
use crate::mesh::{BackgroundMesh, ElementId, Interface, SideId};
use crate::tolerance::CutTolerances;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// Optional self-tests run on every element that cut successfully.
pub struct CutChecks(u32);

bitflags::bitflags! {
    impl CutChecks: u32 {
        /// Check that the cell volumes of each element sum to the reference
        /// volume of its shape; elements that do not are marked failed with
        /// [`CutError::VolumeMismatch`].
        const VOLUME_PARTITION = 1;
    }
}

/// Options controlling a cut pass.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CutOptions {
    /// How volume-cell rules are generated.
    pub volume_rule: VolumeRuleKind,
    /// How boundary-facet rules are generated.
    pub boundary_rule: BoundaryRuleKind,
    /// Self-tests run after cutting.
    pub checks: CutChecks,
    /// The tolerances behind every geometric decision.
    pub tolerances: CutTolerances,
}

/// One failed element of a cut pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementFailure {
    /// The element that failed.
    pub element: ElementId,
    /// The error that stopped it.
    pub error: CutError,
}

/// The outcome of a cut pass: one [`ElementCut`] per background element, in
/// element order, plus the collected failures.
pub struct CutReport {
    elements: Vec<ElementCut>,
    failures: Vec<ElementFailure>,
}

impl CutReport {
    /// The per-element results, in element order.
    #[inline]
    pub fn elements(&self) -> &[ElementCut] {
        &self.elements
    }

    /// The result of one element.
    #[inline]
    pub fn element(&self, id: ElementId) -> &ElementCut {
        &self.elements[id.0 as usize]
    }

    /// The elements that failed, in element order.
    #[inline]
    pub fn failures(&self) -> &[ElementFailure] {
        &self.failures
    }

    /// Whether every element was cut successfully.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The successfully cut elements the interface actually crosses.
    pub fn cut_elements(&self) -> impl Iterator<Item = &ElementCut> {
        self.elements
            .iter()
            .filter(|e| e.error().is_none() && e.is_cut())
    }
}

/// Cuts every element of a background mesh against an interface.
#[derive(Clone, Debug, Default)]
pub struct CutPass {
    options: CutOptions,
}

impl CutPass {
    /// Creates a pass with the given options.
    pub fn new(options: CutOptions) -> Self {
        Self { options }
    }

    /// The options of this pass.
    #[inline]
    pub fn options(&self) -> &CutOptions {
        &self.options
    }

    /// Runs the pass over the whole mesh.
    ///
    /// Only a malformed input rejects the whole run; anything that goes wrong
    /// inside one element lands in the report instead.
    pub fn run(
        &self,
        mesh: &BackgroundMesh,
        interface: &Interface,
    ) -> Result<CutReport, CutError> {
        if let Interface::LevelSet(values) = interface {
            if values.len() != mesh.nodes().len() {
                return Err(MeshDefect::LevelSetSizeMismatch {
                    expected: mesh.nodes().len(),
                    got: values.len(),
                }
                .into());
            }
        }

        let index = SideIndex::build(interface);
        let ids: Vec<ElementId> = mesh.element_ids().collect();

        #[cfg(feature = "parallel")]
        let mut elements: Vec<ElementCut> = ids
            .par_iter()
            .map(|&id| self.cut_element(mesh, interface, &index, id))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let mut elements: Vec<ElementCut> = ids
            .iter()
            .map(|&id| self.cut_element(mesh, interface, &index, id))
            .collect();

        if self.options.checks.contains(CutChecks::VOLUME_PARTITION) {
            for element in &mut elements {
                if element.error().is_some() {
                    continue;
                }
                let reference = element.shape().reference_volume();
                let deviation = (element.total_cell_volume() - reference).abs() / reference;
                if deviation > self.options.tolerances.volume_check {
                    element.fail(CutError::VolumeMismatch { deviation });
                }
            }
        }

        let failures: Vec<ElementFailure> = elements
            .iter()
            .filter_map(|e| {
                e.error().map(|error| ElementFailure {
                    element: e.element(),
                    error: error.clone(),
                })
            })
            .collect();

        Ok(CutReport { elements, failures })
    }

    fn cut_element(
        &self,
        mesh: &BackgroundMesh,
        interface: &Interface,
        index: &SideIndex,
        id: ElementId,
    ) -> ElementCut {
        let candidates = index.candidates(mesh, id, &self.options.tolerances);
        ElementCut::run(mesh, id, interface, &candidates, &self.options)
    }
}

struct IndexedSide {
    side: SideId,
    mins: [Real; 3],
    maxs: [Real; 3],
}

impl RTreeObject for IndexedSide {
    type Envelope = AABB<[Real; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.mins, self.maxs)
    }
}

impl PointDistance for IndexedSide {
    fn distance_2(&self, point: &[Real; 3]) -> Real {
        self.envelope().distance_2(point)
    }
}

/// The broad-phase tree over the interface sides, built once per pass.
struct SideIndex {
    tree: Option<RTree<IndexedSide>>,
}

impl SideIndex {
    fn build(interface: &Interface) -> Self {
        let tree = match interface {
            Interface::Mesh(mesh) => {
                let sides: Vec<IndexedSide> = mesh
                    .side_ids()
                    .map(|sid| {
                        let bounds = mesh.side_bounding_box(sid);
                        IndexedSide {
                            side: sid,
                            mins: [bounds.mins.x, bounds.mins.y, bounds.mins.z],
                            maxs: [bounds.maxs.x, bounds.maxs.y, bounds.maxs.z],
                        }
                    })
                    .collect();
                if sides.is_empty() {
                    None
                } else {
                    Some(RTree::bulk_load(sides))
                }
            }
            Interface::LevelSet(_) => None,
        };
        Self { tree }
    }

    /// The sides near one element, in side order.
    ///
    /// Never empty while the interface has sides: a far-away element still
    /// gets its nearest side, so the position probe always has a triangle to
    /// measure against.
    fn candidates(
        &self,
        mesh: &BackgroundMesh,
        element: ElementId,
        tolerances: &CutTolerances,
    ) -> Vec<SideId> {
        let tree = match &self.tree {
            Some(tree) => tree,
            None => return Vec::new(),
        };
        let bounds = mesh.element_bounding_box(element);
        let margin = (tolerances.on_surface + tolerances.point_merge) * bounds.diameter();
        let loosened = bounds.loosened(margin);
        let envelope = AABB::from_corners(
            [loosened.mins.x, loosened.mins.y, loosened.mins.z],
            [loosened.maxs.x, loosened.maxs.y, loosened.maxs.z],
        );

        let mut candidates: Vec<SideId> = tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|s| s.side)
            .collect();
        candidates.sort_unstable();

        if candidates.is_empty() {
            let center = bounds.center();
            if let Some(nearest) = tree.nearest_neighbor(&[center.x, center.y, center.z]) {
                candidates.push(nearest.side);
            }
        }
        candidates
    }
}
