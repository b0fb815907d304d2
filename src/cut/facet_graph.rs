//! Assembly of facets into volume cells.
//!
//! Every facet separates at most two cells, one on each side of its plane.
//! For volume elements the assembly walks the facet lines: the facets around
//! a line, sorted by dihedral angle, bound one cell wedge between each pair of
//! angular neighbors. Unifying the corresponding half-facets with a union-find
//! yields the connected cells directly, plus one component for the space
//! outside the element. Surface elements reuse the planar region tracing and
//! line elements a plain coordinate scan.

use crate::cut::facet::{trace_planar_regions, Facet, FacetId, FacetOrigin};
use crate::cut::point_registry::{PointId, PointRegistry};
use crate::cut::volume_cell::VolumeCell;
use crate::error::{CutError, DegeneracyKind, GraphDefect};
use crate::geometry::angle_around_axis;
use crate::math::Real;
use crate::tolerance::CutTolerances;
use crate::utils::SortedPair;
use ena::unify::{InPlaceUnificationTable, UnifyKey};
use na::Point2;
use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// One side of a facet. Key `2 * facet + s` where side `s = 0` faces along
/// the facet normal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct HalfFacetKey(u32);

impl UnifyKey for HalfFacetKey {
    type Value = ();
    fn index(&self) -> u32 {
        self.0
    }
    fn from_index(i: u32) -> Self {
        HalfFacetKey(i)
    }
    fn tag() -> &'static str {
        "HalfFacetKey"
    }
}

/// The facets of one cut element, ready to be assembled into cells.
#[derive(Clone, Debug)]
pub struct FacetGraph {
    dim: usize,
    facets: Vec<Facet>,
}

impl FacetGraph {
    /// Creates an empty graph for an element of the given intrinsic
    /// dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            facets: Vec::new(),
        }
    }

    /// The intrinsic dimension this graph assembles cells for.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Adds a facet and returns its id.
    pub fn add(&mut self, facet: Facet) -> FacetId {
        let id = FacetId(self.facets.len() as u32);
        self.facets.push(facet);
        id
    }

    /// All facets of this graph.
    #[inline]
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// The facet with the given id.
    #[inline]
    pub fn facet(&self, id: FacetId) -> &Facet {
        &self.facets[id.0 as usize]
    }

    /// Number of facets.
    #[inline]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    /// Whether the graph holds no facets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Assembles the facets into volume cells.
    pub fn create_cells(
        &self,
        registry: &PointRegistry,
        tolerances: &CutTolerances,
    ) -> Result<Vec<VolumeCell>, CutError> {
        match self.dim {
            3 => self.cells_3d(registry, tolerances),
            2 => self.cells_2d(registry),
            _ => self.cells_1d(registry),
        }
    }

    fn cells_3d(
        &self,
        registry: &PointRegistry,
        tolerances: &CutTolerances,
    ) -> Result<Vec<VolumeCell>, CutError> {
        let mut table = InPlaceUnificationTable::<HalfFacetKey>::new();
        let keys: Vec<HalfFacetKey> = (0..self.facets.len() * 2)
            .map(|_| table.new_key(()))
            .collect();

        // Collect the facets around every line, remembering whether each
        // facet traverses the line from its smaller to its larger point id.
        let mut lines: BTreeMap<SortedPair<PointId>, SmallVec<[(u32, bool); 4]>> = BTreeMap::new();
        for (f, facet) in self.facets.iter().enumerate() {
            for (a, b) in facet.lines() {
                lines
                    .entry(SortedPair::new(a, b))
                    .or_default()
                    .push((f as u32, a < b));
            }
        }

        for (pair, incident) in &lines {
            if incident.len() < 2 {
                return Err(GraphDefect::DanglingLine.into());
            }

            let p = registry.local(pair.min());
            let q = registry.local(pair.max());
            let axis = (q - p).normalize();

            // The wing of a facet points from the line into the facet
            // interior; the wings order the incident facets angularly around
            // the line.
            let mut wing_vectors = Vec::with_capacity(incident.len());
            for &(f, fwd) in incident.iter() {
                let plane = self.facets[f as usize]
                    .plane()
                    .ok_or(CutError::GraphInconsistency(GraphDefect::OpenShell))?;
                let wing = if fwd {
                    plane.normal.cross(&axis)
                } else {
                    -plane.normal.cross(&axis)
                };
                wing_vectors.push((wing, f, fwd));
            }
            let reference = wing_vectors[0].0;
            let mut wings: Vec<(Real, u32, bool)> = wing_vectors
                .iter()
                .map(|&(w, f, fwd)| (angle_around_axis(&axis, &reference, &w), f, fwd))
                .collect();
            wings.sort_by_key(|&(angle, _, _)| OrderedFloat(angle));

            // Coincident wings cannot be ordered into wedges.
            for i in 0..wings.len() {
                let next = wings[(i + 1) % wings.len()].0
                    + if i + 1 == wings.len() {
                        2.0 * std::f64::consts::PI as Real
                    } else {
                        0.0
                    };
                if next - wings[i].0 <= tolerances.parallelism {
                    return Err(DegeneracyKind::AmbiguousContact.into());
                }
            }

            // Between two angular neighbors lies one cell wedge: unify the
            // counter-clockwise side of the first with the clockwise side of
            // the second.
            for i in 0..wings.len() {
                let (_, fi, fwd_i) = wings[i];
                let (_, fj, fwd_j) = wings[(i + 1) % wings.len()];
                let ccw_i = 2 * fi as usize + usize::from(!fwd_i);
                let cw_j = 2 * fj as usize + usize::from(fwd_j);
                table.union(keys[ccw_i], keys[cw_j]);
            }
        }

        // The outward sides of all element-boundary facets see the same
        // outside space.
        let mut exterior: Option<HalfFacetKey> = None;
        for (f, facet) in self.facets.iter().enumerate() {
            if matches!(facet.origin(), FacetOrigin::ElementFace(_)) {
                let outward = keys[2 * f];
                match exterior {
                    None => exterior = Some(outward),
                    Some(e) => table.union(e, outward),
                }
            }
        }
        let exterior_root = exterior.map(|k| table.find(k));

        let mut groups: BTreeMap<u32, Vec<(FacetId, bool)>> = BTreeMap::new();
        for (f, facet) in self.facets.iter().enumerate() {
            for side in 0..2usize {
                let root = table.find(keys[2 * f + side]);
                if Some(root) == exterior_root {
                    match facet.origin() {
                        FacetOrigin::ElementFace(_) if side == 0 => continue,
                        // An inward boundary side or an interface piece swept
                        // into the outside space: the shell does not close.
                        FacetOrigin::ElementFace(_) => {
                            return Err(GraphDefect::OpenShell.into())
                        }
                        _ => return Err(GraphDefect::CutFacetInExterior.into()),
                    }
                }
                groups
                    .entry(root.index())
                    .or_default()
                    .push((FacetId(f as u32), side == 0));
            }
        }

        let mut claims = vec![0u32; self.facets.len()];
        let mut cells = Vec::with_capacity(groups.len());
        for members in groups.into_values() {
            for &(fid, _) in &members {
                claims[fid.0 as usize] += 1;
            }
            cells.push(VolumeCell::new(members, self, registry)?);
        }
        if claims.iter().any(|&c| c > 2) {
            return Err(GraphDefect::OverclaimedFacet.into());
        }

        Ok(cells)
    }

    fn cells_2d(&self, registry: &PointRegistry) -> Result<Vec<VolumeCell>, CutError> {
        // Rebuild the planar subdivision from the segment facets.
        let mut vertex_index: BTreeMap<PointId, u32> = BTreeMap::new();
        let mut vertices: Vec<(PointId, Point2<Real>)> = Vec::new();
        let mut edges: Vec<[u32; 2]> = Vec::new();
        let mut segment_of: BTreeMap<SortedPair<PointId>, FacetId> = BTreeMap::new();

        for (f, facet) in self.facets.iter().enumerate() {
            let cycle = facet.cycle();
            if cycle.len() != 2 {
                return Err(GraphDefect::OpenShell.into());
            }
            let mut pair = [0u32; 2];
            for (slot, &id) in pair.iter_mut().zip(cycle.iter()) {
                *slot = *vertex_index.entry(id).or_insert_with(|| {
                    let local = registry.local(id);
                    vertices.push((id, Point2::new(local.x, local.y)));
                    (vertices.len() - 1) as u32
                });
            }
            edges.push(pair);
            if segment_of
                .insert(SortedPair::new(cycle[0], cycle[1]), FacetId(f as u32))
                .is_some()
            {
                return Err(GraphDefect::OverclaimedFacet.into());
            }
        }

        let regions = trace_planar_regions(&vertices, &edges)?;

        let mut claims = vec![0u32; self.facets.len()];
        let mut cells = Vec::with_capacity(regions.len());
        for region in &regions {
            let mut members = Vec::new();
            let mut ring = |cycle: &[PointId]| -> Result<(), CutError> {
                for i in 0..cycle.len() {
                    let (a, b) = (cycle[i], cycle[(i + 1) % cycle.len()]);
                    let fid = *segment_of
                        .get(&SortedPair::new(a, b))
                        .ok_or(CutError::GraphInconsistency(GraphDefect::OpenShell))?;
                    // A region walking the facet's own direction lies to its
                    // left, the facet's positive-normal side.
                    let stored = self.facets[fid.0 as usize].cycle();
                    members.push((fid, stored[0] == a && stored[1] == b));
                    claims[fid.0 as usize] += 1;
                }
                Ok(())
            };
            ring(&region.cycle)?;
            for hole in &region.holes {
                ring(hole)?;
            }
            cells.push(VolumeCell::new(members, self, registry)?);
        }

        for (f, facet) in self.facets.iter().enumerate() {
            if claims[f] > 2 {
                return Err(GraphDefect::OverclaimedFacet.into());
            }
            // An interface chord with a free side would leak the cut surface
            // into the outside space.
            if !matches!(facet.origin(), FacetOrigin::ElementFace(_)) && claims[f] < 2 {
                return Err(GraphDefect::CutFacetInExterior.into());
            }
        }

        Ok(cells)
    }

    fn cells_1d(&self, registry: &PointRegistry) -> Result<Vec<VolumeCell>, CutError> {
        let mut points: Vec<(Real, FacetId)> = Vec::with_capacity(self.facets.len());
        for (f, facet) in self.facets.iter().enumerate() {
            let cycle = facet.cycle();
            if cycle.len() != 1 {
                return Err(GraphDefect::OpenShell.into());
            }
            points.push((registry.local(cycle[0]).x, FacetId(f as u32)));
        }
        points.sort_by_key(|&(x, _)| OrderedFloat(x));

        if points.len() < 2 {
            return Err(GraphDefect::OpenShell.into());
        }

        let mut cells = Vec::with_capacity(points.len() - 1);
        for window in points.windows(2) {
            let (_, left) = window[0];
            let (_, right) = window[1];
            cells.push(VolumeCell::new(
                vec![(left, true), (right, false)],
                self,
                registry,
            )?);
        }
        Ok(cells)
    }
}
