//! The per-element cut driver.
//!
//! An `ElementCut` takes one background element through the cutting stages:
//! intersect the interface pieces with the element, build the boundary and
//! cut facets, assemble them into volume cells, classify every cell against
//! the interface and generate its integration rules. Each element is a pure
//! function of its own geometry and the nearby interface pieces, so elements
//! never depend on each other and a failure stays contained: the driver parks
//! the element in [`CutStage::Failed`] and keeps the error for the report
//! instead of unwinding the whole pass.

use crate::cut::facet::{trace_planar_regions, Facet, FacetId, FacetOrigin};
use crate::cut::facet_graph::FacetGraph;
use crate::cut::intersect::{self, ClippedChord, ClippedSide, LevelSetChords, LevelSetCut};
use crate::cut::pass::CutOptions;
use crate::cut::point_registry::{PointId, PointRegistry};
use crate::cut::position::{classify_cells, Position, PositionProbe};
use crate::cut::volume_cell::VolumeCell;
use crate::error::{CutError, DegeneracyKind, GraphDefect, MeshDefect};
use crate::geometry::{point_in_polygon2, BoundingBox, Plane};
use crate::integrate::{
    cubature_degree, full_cell_rule, moment_fitted_boundary_rule, moment_fitted_volume_rule,
    segment_rule, tessellated_boundary_rule, tessellated_planar_rule, tessellated_tet_rule,
    BoundaryRule, BoundaryRuleKind, VolumeRuleKind,
};
use crate::math::{Point, Real, UnitVector, Vector};
use crate::mesh::{BackgroundMesh, CellShape, ElementId, Interface, SideId};
use crate::tolerance::CutTolerances;
use na::Point2;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

/// The stages an element passes through while being cut.
///
/// The value stored on a finished [`ElementCut`] is the last stage that
/// completed, so a successfully cut element reports
/// [`CutStage::IntegrationRulesGenerated`] and an element the interface never
/// touched reports [`CutStage::Uncut`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum CutStage {
    /// No interface piece crosses the element.
    Uncut,
    /// The interface pieces were intersected with the element.
    SidesIntersected,
    /// The boundary and cut facets exist.
    FacetsBuilt,
    /// The facets were assembled into volume cells.
    VolumeCellsBuilt,
    /// Every volume cell carries a position.
    PositionsClassified,
    /// Every volume cell carries an integration rule.
    IntegrationRulesGenerated,
    /// A stage failed; the element carries an error instead of a result.
    Failed,
}

/// One background element taken through the cutting stages.
pub struct ElementCut {
    element: ElementId,
    shape: CellShape,
    stage: CutStage,
    error: Option<CutError>,
    registry: PointRegistry,
    graph: FacetGraph,
    cells: Vec<VolumeCell>,
    boundary_rules: Vec<(FacetId, BoundaryRule)>,
}

impl ElementCut {
    /// Cuts one element of the background mesh against the interface.
    ///
    /// `candidates` are the interface sides the broad phase found near the
    /// element; they are ignored for level-set interfaces. Always returns the
    /// element's state: on failure the stage is [`CutStage::Failed`] and
    /// [`ElementCut::error`] carries the cause.
    pub fn run(
        mesh: &BackgroundMesh,
        element: ElementId,
        interface: &Interface,
        candidates: &[SideId],
        options: &CutOptions,
    ) -> Self {
        let shape = mesh.element(element).shape;
        let bounds = mesh.element_bounding_box(element);
        let merge_radius = options.tolerances.point_merge * bounds.diameter();

        let mut cut = Self {
            element,
            shape,
            stage: CutStage::Uncut,
            error: None,
            registry: PointRegistry::new(merge_radius),
            graph: FacetGraph::new(shape.intrinsic_dim()),
            cells: Vec::new(),
            boundary_rules: Vec::new(),
        };

        if let Err(error) = cut.try_run(mesh, &bounds, interface, candidates, options) {
            cut.fail(error);
        }
        cut
    }

    /// Marks this element as failed, discarding nothing it built so far.
    pub(crate) fn fail(&mut self, error: CutError) {
        log::warn!("element {} failed to cut: {error}", self.element.0);
        self.stage = CutStage::Failed;
        self.error = Some(error);
    }

    /// The element this cut belongs to.
    #[inline]
    pub fn element(&self) -> ElementId {
        self.element
    }

    /// The reference shape of the element.
    #[inline]
    pub fn shape(&self) -> CellShape {
        self.shape
    }

    /// The last stage that completed.
    #[inline]
    pub fn stage(&self) -> CutStage {
        self.stage
    }

    /// The error that stopped the cut, if any.
    #[inline]
    pub fn error(&self) -> Option<&CutError> {
        self.error.as_ref()
    }

    /// The cut points of this element.
    #[inline]
    pub fn registry(&self) -> &PointRegistry {
        &self.registry
    }

    /// The facets bounding the volume cells.
    #[inline]
    pub fn graph(&self) -> &FacetGraph {
        &self.graph
    }

    /// The volume cells the element decomposed into.
    #[inline]
    pub fn cells(&self) -> &[VolumeCell] {
        &self.cells
    }

    /// The boundary rules of the on-surface facets, in facet order.
    #[inline]
    pub fn boundary_rules(&self) -> &[(FacetId, BoundaryRule)] {
        &self.boundary_rules
    }

    /// The boundary rule of one facet, if it lies on the cut surface.
    pub fn boundary_rule(&self, facet: FacetId) -> Option<&BoundaryRule> {
        self.boundary_rules
            .iter()
            .find(|(id, _)| *id == facet)
            .map(|(_, rule)| rule)
    }

    /// Whether any facet lies on the cut surface.
    pub fn is_cut(&self) -> bool {
        self.graph.facets().iter().any(|f| f.on_cut_surface())
    }

    /// The summed reference-frame volume of all cells.
    pub fn total_cell_volume(&self) -> Real {
        self.cells.iter().map(|c| c.volume()).sum()
    }

    fn try_run(
        &mut self,
        mesh: &BackgroundMesh,
        bounds: &BoundingBox,
        interface: &Interface,
        candidates: &[SideId],
        options: &CutOptions,
    ) -> Result<(), CutError> {
        let tolerances = &options.tolerances;
        let shape = self.shape;
        if bounds.diameter() == 0.0 {
            return Err(MeshDefect::DegenerateEntity {
                entity: self.element.0,
            }
            .into());
        }
        let corners = mesh.element_corners(self.element);

        let element_values: Vec<Real> = match interface {
            Interface::LevelSet(values) => {
                if values.len() != mesh.nodes().len() {
                    return Err(MeshDefect::LevelSetSizeMismatch {
                        expected: mesh.nodes().len(),
                        got: values.len(),
                    }
                    .into());
                }
                mesh.element(self.element)
                    .nodes
                    .iter()
                    .map(|&n| values[n as usize])
                    .collect()
            }
            Interface::Mesh(_) => Vec::new(),
        };

        let node_points = self.register_nodes(&corners);

        match shape.intrinsic_dim() {
            3 => self.build_3d(
                &corners,
                bounds,
                interface,
                &element_values,
                candidates,
                &node_points,
                tolerances,
            )?,
            2 => self.build_2d(
                &corners,
                interface,
                &element_values,
                candidates,
                &node_points,
                tolerances,
            )?,
            _ => self.build_1d(
                &corners,
                interface,
                &element_values,
                candidates,
                &node_points,
                tolerances,
            )?,
        }
        self.stage = CutStage::FacetsBuilt;

        self.cells = self.graph.create_cells(&self.registry, tolerances)?;
        self.stage = CutStage::VolumeCellsBuilt;

        let probe = match interface {
            Interface::Mesh(interface) => PositionProbe::MeshSides {
                interface,
                candidates,
            },
            Interface::LevelSet(_) => PositionProbe::LevelSet {
                shape,
                values: &element_values,
            },
        };
        let band = tolerances.on_surface * bounds.diameter();
        classify_cells(
            &mut self.cells,
            self.graph.facets(),
            &probe,
            |local| shape.local_to_global(&corners, local),
            band,
        )?;
        self.stage = CutStage::PositionsClassified;

        self.generate_rules(options)?;
        self.stage = CutStage::IntegrationRulesGenerated;

        if !self.is_cut() {
            self.stage = CutStage::Uncut;
        }
        Ok(())
    }

    /// Registers the element nodes with their full reference memberships, so
    /// boundary fragments can later be recovered per edge.
    fn register_nodes(&mut self, corners: &[Point<Real>]) -> Vec<PointId> {
        let shape = self.shape;
        let ref_nodes = shape.reference_nodes();
        let mut ids = Vec::with_capacity(ref_nodes.len());

        for (i, (corner, node)) in corners.iter().zip(ref_nodes.iter()).enumerate() {
            let local = Point::new(node[0], node[1], node[2]);
            let id = self.registry.insert(*corner, local);
            self.registry.set_node(id, i as u8);
            for (e, edge) in shape.edges().iter().enumerate() {
                if edge[0] == i {
                    self.registry.register_edge(id, e as u8, 0.0);
                } else if edge[1] == i {
                    self.registry.register_edge(id, e as u8, 1.0);
                }
            }
            for (f, face) in shape.faces().iter().enumerate() {
                if face.contains(&i) {
                    self.registry.register_face(id, f as u8);
                }
            }
            ids.push(id);
        }
        ids
    }

    fn build_3d(
        &mut self,
        corners: &[Point<Real>],
        bounds: &BoundingBox,
        interface: &Interface,
        element_values: &[Real],
        candidates: &[SideId],
        node_points: &[PointId],
        tolerances: &CutTolerances,
    ) -> Result<(), CutError> {
        let shape = self.shape;

        let mut clipped: Vec<ClippedSide> = Vec::new();
        let mut level_cut: Option<LevelSetCut> = None;
        match interface {
            Interface::Mesh(interface) => {
                clipped = intersect::clip_sides(
                    shape,
                    corners,
                    bounds,
                    interface,
                    candidates,
                    &mut self.registry,
                    tolerances,
                )?;
            }
            Interface::LevelSet(_) => {
                level_cut = intersect::level_set_cut(
                    shape,
                    corners,
                    element_values,
                    node_points,
                    &mut self.registry,
                    tolerances,
                )?;
            }
        }
        self.stage = CutStage::SidesIntersected;

        // Interface pieces crossing the interior become cut facets directly;
        // their winding already points at the outside region.
        for side in &clipped {
            if side.touching_face.is_none() {
                let facet = Facet::polygon(
                    side.cycle.clone(),
                    Vec::new(),
                    FacetOrigin::CutSide(side.side),
                    true,
                    true,
                    &self.registry,
                    tolerances,
                )?;
                let _ = self.graph.add(facet);
            }
        }
        let mut touched_faces: &[(u8, bool)] = &[];
        let mut face_chords: &[(u8, [PointId; 2])] = &[];
        if let Some(cut) = &level_cut {
            touched_faces = &cut.touched_faces;
            face_chords = &cut.face_chords;
            for cycle in &cut.cycles {
                let facet = Facet::polygon(
                    cycle.clone(),
                    Vec::new(),
                    FacetOrigin::LevelSet,
                    true,
                    true,
                    &self.registry,
                    tolerances,
                )?;
                let _ = self.graph.add(facet);
            }
        }

        build_face_facets(
            shape,
            &clipped,
            touched_faces,
            face_chords,
            &self.registry,
            &mut self.graph,
            tolerances,
        )
    }

    fn build_2d(
        &mut self,
        corners: &[Point<Real>],
        interface: &Interface,
        element_values: &[Real],
        candidates: &[SideId],
        node_points: &[PointId],
        tolerances: &CutTolerances,
    ) -> Result<(), CutError> {
        let shape = self.shape;

        let mut chords: Vec<ClippedChord> = Vec::new();
        let mut level: Option<LevelSetChords> = None;
        match interface {
            Interface::Mesh(interface) => {
                let raw = intersect::clip_chords(
                    shape,
                    corners,
                    interface,
                    candidates,
                    &mut self.registry,
                    tolerances,
                )?;
                chords = split_crossing_chords(shape, corners, raw, &mut self.registry, tolerances);
            }
            Interface::LevelSet(_) => {
                level = intersect::level_set_chords(
                    shape,
                    corners,
                    element_values,
                    node_points,
                    &mut self.registry,
                    tolerances,
                )?;
            }
        }
        self.stage = CutStage::SidesIntersected;

        // Parameter intervals of the element edges the interface covers, with
        // the side of the fragment normal the outside region takes.
        let mut covered: Vec<(u8, Real, Real, bool)> = Vec::new();
        for chord in &chords {
            if let Some(e) = chord.touching_edge {
                let t0 = self.registry.point(chord.points[0]).edge_parameter(e);
                let t1 = self.registry.point(chord.points[1]).edge_parameter(e);
                if let (Some(t0), Some(t1)) = (t0, t1) {
                    // The outside region lies left of the directed chord; a
                    // chord running with the boundary cycle keeps it on the
                    // element side of the edge.
                    covered.push((e, t0.min(t1), t0.max(t1), t0 < t1));
                }
            }
        }
        if let Some(level) = &level {
            for &(e, beyond) in &level.touched_edges {
                covered.push((e, 0.0, 1.0, !beyond));
            }
        }

        // Boundary fragments, walked in the direction of the node cycle.
        for e in 0..shape.edges().len() {
            let mut on_edge: Vec<(Real, PointId)> = Vec::new();
            for id in self.registry.ids() {
                if let Some(t) = self.registry.point(id).edge_parameter(e as u8) {
                    on_edge.push((t, id));
                }
            }
            on_edge.sort_by_key(|&(t, _)| OrderedFloat(t));
            for pair in on_edge.windows(2) {
                if pair[0].1 == pair[1].1 {
                    continue;
                }
                let mid = 0.5 * (pair[0].0 + pair[1].0);
                let mut cover: Option<bool> = None;
                for &(ce, lo, hi, outside_left) in &covered {
                    if ce as usize == e && mid > lo && mid < hi {
                        cover = Some(outside_left);
                    }
                }
                let facet = Facet::segment(
                    [pair[0].1, pair[1].1],
                    FacetOrigin::ElementFace(e as u8),
                    cover.is_some(),
                    cover.unwrap_or(true),
                );
                let _ = self.graph.add(facet);
            }
        }

        // Interior chords split the element; touching ones only covered the
        // boundary fragments above.
        for chord in &chords {
            if chord.touching_edge.is_none() {
                let _ = self.graph.add(Facet::segment(
                    chord.points,
                    FacetOrigin::CutSide(chord.side),
                    true,
                    true,
                ));
            }
        }
        if let Some(level) = &level {
            for &chord in &level.chords {
                let _ = self
                    .graph
                    .add(Facet::segment(chord, FacetOrigin::LevelSet, true, true));
            }
        }
        Ok(())
    }

    fn build_1d(
        &mut self,
        corners: &[Point<Real>],
        interface: &Interface,
        element_values: &[Real],
        candidates: &[SideId],
        node_points: &[PointId],
        tolerances: &CutTolerances,
    ) -> Result<(), CutError> {
        let shape = self.shape;

        match interface {
            Interface::Mesh(interface) => {
                let cut_ids = intersect::line_cut_points(
                    shape,
                    corners,
                    interface,
                    candidates,
                    &mut self.registry,
                    tolerances,
                )?;
                self.stage = CutStage::SidesIntersected;

                let direction = corners[1] - corners[0];
                for id in cut_ids {
                    // Every crossed side must agree on which way the outside
                    // region lies along the line.
                    let mut outward: Option<bool> = None;
                    for &side in self.registry.point(id).sides() {
                        for tri in interface.side_triangles(side) {
                            let normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
                            let along = normal.dot(&direction) > 0.0;
                            match outward {
                                None => outward = Some(along),
                                Some(prev) if prev != along => {
                                    return Err(DegeneracyKind::AmbiguousContact.into());
                                }
                                Some(_) => {}
                            }
                        }
                    }
                    let side = match self.registry.point(id).sides().first() {
                        Some(&side) => side,
                        None => continue,
                    };
                    let _ = self.graph.add(Facet::point(
                        id,
                        FacetOrigin::CutSide(side),
                        true,
                        outward.unwrap_or(true),
                    ));
                }
            }
            Interface::LevelSet(_) => {
                let scale = element_values.iter().fold(0.0, |m: Real, v| m.max(v.abs()));
                if scale > 0.0 {
                    let band = tolerances.on_surface * scale;
                    let snapped: Vec<Real> = element_values
                        .iter()
                        .map(|&v| if v.abs() <= band { 0.0 } else { v })
                        .collect();
                    for (i, &v) in snapped.iter().enumerate() {
                        if v == 0.0 {
                            self.registry.mark_on_cut_surface(node_points[i]);
                            self.registry
                                .set_position(node_points[i], Position::OnSurface);
                        }
                    }
                    if snapped[0] * snapped[1] < 0.0 {
                        let t = snapped[0] / (snapped[0] - snapped[1]);
                        let local = Point::new(-1.0 + 2.0 * t, 0.0, 0.0);
                        let global = shape.local_to_global(corners, &local);
                        let id = self.registry.insert(global, local);
                        self.registry.register_edge(id, 0, t);
                        self.registry.mark_on_cut_surface(id);
                        self.registry.set_position(id, Position::OnSurface);
                        let _ = self.graph.add(Facet::point(
                            id,
                            FacetOrigin::LevelSet,
                            true,
                            snapped[1] > snapped[0],
                        ));
                    }
                }
                self.stage = CutStage::SidesIntersected;
            }
        }

        // The element ends always bound the line.
        let _ = self
            .graph
            .add(Facet::point(node_points[0], FacetOrigin::ElementFace(0), false, true));
        let _ = self
            .graph
            .add(Facet::point(node_points[1], FacetOrigin::ElementFace(1), false, true));
        Ok(())
    }

    fn generate_rules(&mut self, options: &CutOptions) -> Result<(), CutError> {
        let shape = self.shape;
        let dim = shape.intrinsic_dim();
        let degree = cubature_degree(shape);
        let tolerances = &options.tolerances;
        let cut = self.is_cut();

        if dim < 3 && options.volume_rule == VolumeRuleKind::MomentFitting {
            log::debug!("moment fitting only applies to volume cells; tessellating instead");
        }

        for i in 0..self.cells.len() {
            let rule = if !cut {
                full_cell_rule(shape)
            } else {
                match dim {
                    3 => match options.volume_rule {
                        VolumeRuleKind::MomentFitting => moment_fitted_volume_rule(
                            &self.cells[i].boundary_triangles(&self.graph),
                            &self.cells[i].tessellate(&self.graph),
                            degree,
                            tolerances,
                        )?,
                        VolumeRuleKind::Tessellation => {
                            tessellated_tet_rule(&self.cells[i].tessellate(&self.graph), degree)
                        }
                    },
                    2 => {
                        let cell = &self.cells[i];
                        let centroid = *cell.centroid();
                        let triangles: Vec<[Point<Real>; 3]> = cell
                            .directed_segments(&self.graph, &self.registry)
                            .iter()
                            .map(|&[a, b]| [centroid, a, b])
                            .collect();
                        tessellated_planar_rule(&triangles, degree)
                    }
                    _ => {
                        let mut left = None;
                        let mut right = None;
                        for &(fid, on_normal_side) in self.cells[i].facets() {
                            let p = *self.registry.local(self.graph.facet(fid).cycle()[0]);
                            if on_normal_side {
                                left = Some(p);
                            } else {
                                right = Some(p);
                            }
                        }
                        let (a, b) = match (left, right) {
                            (Some(a), Some(b)) => (a, b),
                            _ => return Err(GraphDefect::OpenShell.into()),
                        };
                        segment_rule(&a, &b, degree)
                    }
                }
            };
            self.cells[i].set_rule(rule);
        }

        self.boundary_rules.clear();
        for (f, facet) in self.graph.facets().iter().enumerate() {
            if !facet.on_cut_surface() {
                continue;
            }
            let rule = match dim {
                3 => {
                    // Boundary rules integrate with the normal pointing at
                    // the outside region.
                    let mut triangles = facet.triangles().to_vec();
                    if !facet.outside_along_normal() {
                        for tri in &mut triangles {
                            tri.swap(1, 2);
                        }
                    }
                    match options.boundary_rule {
                        BoundaryRuleKind::MomentFitting => {
                            let plane = facet
                                .plane()
                                .ok_or(CutError::GraphInconsistency(GraphDefect::OpenShell))?;
                            let plane = if facet.outside_along_normal() {
                                *plane
                            } else {
                                Plane::new(-plane.normal, plane.origin)
                            };
                            moment_fitted_boundary_rule(&triangles, &plane, degree, tolerances)?
                        }
                        BoundaryRuleKind::Tessellation => {
                            tessellated_boundary_rule(&triangles, degree)
                        }
                    }
                }
                2 => {
                    let cycle = facet.cycle();
                    let a = *self.registry.local(cycle[0]);
                    let b = *self.registry.local(cycle[1]);
                    let d = b - a;
                    let left = Vector::new(-d.y, d.x, 0.0);
                    let normal = if facet.outside_along_normal() {
                        UnitVector::new_normalize(left)
                    } else {
                        UnitVector::new_normalize(-left)
                    };
                    let line = segment_rule(&a, &b, degree);
                    let normals = vec![normal; line.len()];
                    BoundaryRule {
                        points: line.points,
                        weights: line.weights,
                        normals,
                    }
                }
                _ => {
                    let p = *self.registry.local(facet.cycle()[0]);
                    let normal = if facet.outside_along_normal() {
                        Vector::x_axis()
                    } else {
                        -Vector::x_axis()
                    };
                    BoundaryRule {
                        points: vec![p],
                        weights: vec![1.0],
                        normals: vec![normal],
                    }
                }
            };
            self.boundary_rules.push((FacetId(f as u32), rule));
        }
        Ok(())
    }
}

/// Recovers the element-face facets of a volume element by tracing the planar
/// subdivision the cut induces on each face.
///
/// Each face gets a 2-D arrangement made of its boundary-edge fragments, the
/// cut-side cycle edges running on it, the touching-side cycles and the
/// level-set face chords; the positive-area regions of that arrangement are
/// the face's facets. Regions covered by a touching piece (or belonging to a
/// face the level set touches) are marked as lying on the cut surface.
fn build_face_facets(
    shape: CellShape,
    clipped: &[ClippedSide],
    touched_faces: &[(u8, bool)],
    face_chords: &[(u8, [PointId; 2])],
    registry: &PointRegistry,
    graph: &mut FacetGraph,
    tolerances: &CutTolerances,
) -> Result<(), CutError> {
    let planes = intersect::reference_face_planes(shape);
    let ref_nodes = shape.reference_nodes();
    let element_edges = shape.edges();

    for (f, face) in shape.faces().iter().enumerate() {
        // A 2-D frame of the face, right-handed around the outward normal.
        let normal = planes[f].0;
        let origin = Point::new(
            ref_nodes[face[0]][0],
            ref_nodes[face[0]][1],
            ref_nodes[face[0]][2],
        );
        let along = Point::new(
            ref_nodes[face[1]][0],
            ref_nodes[face[1]][1],
            ref_nodes[face[1]][2],
        );
        let t1 = (along - origin).normalize();
        let t2 = normal.cross(&t1);
        let project = |p: &Point<Real>| Point2::new((p - origin).dot(&t1), (p - origin).dot(&t2));

        let mut index: BTreeMap<PointId, u32> = BTreeMap::new();
        let mut vertices: Vec<(PointId, Point2<Real>)> = Vec::new();
        let mut edges: Vec<[u32; 2]> = Vec::new();
        {
            let mut vertex = |id: PointId| -> u32 {
                *index.entry(id).or_insert_with(|| {
                    let next = vertices.len() as u32;
                    vertices.push((id, project(registry.local(id))));
                    next
                })
            };

            // Fragments of the element edges bounding this face.
            for (e, edge) in element_edges.iter().enumerate() {
                if !(face.contains(&edge[0]) && face.contains(&edge[1])) {
                    continue;
                }
                let mut on_edge: Vec<(Real, PointId)> = Vec::new();
                for id in registry.ids() {
                    if let Some(t) = registry.point(id).edge_parameter(e as u8) {
                        on_edge.push((t, id));
                    }
                }
                on_edge.sort_by_key(|&(t, _)| OrderedFloat(t));
                for pair in on_edge.windows(2) {
                    if pair[0].1 != pair[1].1 {
                        edges.push([vertex(pair[0].1), vertex(pair[1].1)]);
                    }
                }
            }

            // Cut-side cycle edges running on this face; touching pieces
            // contribute their whole cycle.
            for side in clipped {
                let n = side.cycle.len();
                match side.touching_face {
                    None => {
                        for i in 0..n {
                            if side.edge_faces[i] == Some(f as u8) {
                                edges.push([
                                    vertex(side.cycle[i]),
                                    vertex(side.cycle[(i + 1) % n]),
                                ]);
                            }
                        }
                    }
                    Some(touch) if touch as usize == f => {
                        for i in 0..n {
                            edges.push([vertex(side.cycle[i]), vertex(side.cycle[(i + 1) % n])]);
                        }
                    }
                    Some(_) => {}
                }
            }

            // Level-set chords crossing this face.
            for (cf, chord) in face_chords {
                if *cf as usize == f {
                    edges.push([vertex(chord[0]), vertex(chord[1])]);
                }
            }
        }

        let regions = trace_planar_regions(&vertices, &edges)?;

        let mut face_touched: Option<bool> = None;
        for &(tf, beyond) in touched_faces {
            if tf as usize == f {
                face_touched = Some(beyond);
            }
        }

        for region in regions {
            let mut facet = Facet::polygon(
                region.cycle,
                region.holes,
                FacetOrigin::ElementFace(f as u8),
                false,
                true,
                registry,
                tolerances,
            )?;

            if let Some(beyond) = face_touched {
                facet.mark_on_cut_surface(beyond);
            } else {
                // An interior sample of the region decides whether a touching
                // piece covers it. The first triangle leans on the outer
                // cycle, which keeps the sample out of any hole.
                let tri = facet.triangles()[0];
                let sample3 =
                    Point::from((tri[0].coords + tri[1].coords + tri[2].coords) / 3.0);
                let sample = project(&sample3);
                for side in clipped {
                    if side.touching_face != Some(f as u8) {
                        continue;
                    }
                    let polygon: Vec<Point2<Real>> = side
                        .cycle
                        .iter()
                        .map(|&id| project(registry.local(id)))
                        .collect();
                    if point_in_polygon2(&sample, &polygon) {
                        facet.mark_on_cut_surface(side.outward_aligned);
                        break;
                    }
                }
            }
            let _ = graph.add(facet);
        }
    }
    Ok(())
}

/// Splits chords of a surface element wherever they cross each other, so the
/// planar subdivision only ever meets chords at shared points.
///
/// The crossing point is registered once and both chords are cut at it;
/// touching chords stay whole since they live on the element boundary.
fn split_crossing_chords(
    shape: CellShape,
    corners: &[Point<Real>],
    chords: Vec<ClippedChord>,
    registry: &mut PointRegistry,
    tolerances: &CutTolerances,
) -> Vec<ClippedChord> {
    let ends: Vec<(Point<Real>, Point<Real>)> = chords
        .iter()
        .map(|c| (*registry.local(c.points[0]), *registry.local(c.points[1])))
        .collect();

    let mut out = Vec::with_capacity(chords.len());
    for (i, chord) in chords.iter().enumerate() {
        if chord.touching_edge.is_some() {
            out.push(chord.clone());
            continue;
        }
        let (a, b) = ends[i];
        let d1 = b - a;

        let mut stops: Vec<(Real, PointId)> = vec![(0.0, chord.points[0]), (1.0, chord.points[1])];
        for (j, other) in chords.iter().enumerate() {
            if j == i || other.touching_edge.is_some() {
                continue;
            }
            let (c, d) = ends[j];
            let d2 = d - c;
            let denom = d1.x * d2.y - d1.y * d2.x;
            if denom.abs() <= tolerances.parallelism * d1.norm() * d2.norm() {
                continue;
            }
            let ac = c - a;
            let t = (ac.x * d2.y - ac.y * d2.x) / denom;
            let u = (ac.x * d1.y - ac.y * d1.x) / denom;
            let slack = tolerances.parametric_slack;
            if t > slack && t < 1.0 - slack && u > -slack && u < 1.0 + slack {
                let local = a + d1 * t;
                let global = shape.local_to_global(corners, &local);
                let id = registry.insert(global, local);
                registry.register_side(id, chord.side);
                registry.register_side(id, other.side);
                stops.push((t, id));
            }
        }

        stops.sort_by_key(|&(t, _)| OrderedFloat(t));
        for pair in stops.windows(2) {
            if pair[0].1 != pair[1].1 {
                out.push(ClippedChord {
                    side: chord.side,
                    points: [pair[0].1, pair[1].1],
                    touching_edge: None,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{CutStage, ElementCut};
    use crate::cut::pass::CutOptions;
    use crate::cut::position::Position;
    use crate::error::{CutError, GraphDefect};
    use crate::integrate::{BoundaryRuleKind, VolumeRuleKind};
    use crate::math::{Point, Real};
    use crate::mesh::{
        BackgroundMesh, CellShape, Element, ElementId, Interface, InterfaceMesh, Side, SideId,
    };

    fn reference_mesh(shape: CellShape) -> BackgroundMesh {
        let nodes: Vec<Point<Real>> = shape
            .reference_nodes()
            .iter()
            .map(|n| Point::new(n[0], n[1], n[2]))
            .collect();
        let connectivity: Vec<u32> = (0..shape.node_count() as u32).collect();
        BackgroundMesh::new(nodes, vec![Element::new(shape, connectivity)]).unwrap()
    }

    fn tri_side(corners: [[Real; 3]; 3]) -> InterfaceMesh {
        let nodes = corners
            .iter()
            .map(|c| Point::new(c[0], c[1], c[2]))
            .collect();
        InterfaceMesh::new(nodes, vec![Side::new(CellShape::Tri3, vec![0, 1, 2])]).unwrap()
    }

    fn quad_side(corners: [[Real; 3]; 4]) -> InterfaceMesh {
        let nodes = corners
            .iter()
            .map(|c| Point::new(c[0], c[1], c[2]))
            .collect();
        InterfaceMesh::new(nodes, vec![Side::new(CellShape::Quad4, vec![0, 1, 2, 3])]).unwrap()
    }

    fn run_one(mesh: &BackgroundMesh, interface: &Interface, options: &CutOptions) -> ElementCut {
        let candidates: Vec<SideId> = match interface {
            Interface::Mesh(m) => m.side_ids().collect(),
            Interface::LevelSet(_) => Vec::new(),
        };
        ElementCut::run(mesh, ElementId(0), interface, &candidates, options)
    }

    fn mid_plane() -> InterfaceMesh {
        quad_side([
            [-2.0, -2.0, 0.0],
            [2.0, -2.0, 0.0],
            [2.0, 2.0, 0.0],
            [-2.0, 2.0, 0.0],
        ])
    }

    #[test]
    fn uncut_hex_is_one_full_cell() {
        let mesh = reference_mesh(CellShape::Hex8);
        let far = tri_side([[-10.0, -10.0, -5.0], [10.0, -10.0, -5.0], [0.0, 10.0, -5.0]]);
        let cut = run_one(&mesh, &Interface::Mesh(far), &CutOptions::default());

        assert!(cut.error().is_none(), "{:?}", cut.error());
        assert_eq!(cut.stage(), CutStage::Uncut);
        assert!(!cut.is_cut());
        assert_eq!(cut.cells().len(), 1);
        assert_relative_eq!(cut.cells()[0].volume(), 8.0, epsilon = 1.0e-5);
        assert_eq!(cut.cells()[0].position(), Position::Outside);
        let rule = cut.cells()[0].rule().unwrap();
        assert_relative_eq!(rule.total_weight(), 8.0, epsilon = 1.0e-5);
        assert!(cut.boundary_rules().is_empty());
    }

    #[test]
    fn uncut_hex_below_the_interface_is_inside() {
        let mesh = reference_mesh(CellShape::Hex8);
        let above = tri_side([[-10.0, -10.0, 5.0], [10.0, -10.0, 5.0], [0.0, 10.0, 5.0]]);
        let cut = run_one(&mesh, &Interface::Mesh(above), &CutOptions::default());

        assert_eq!(cut.stage(), CutStage::Uncut);
        assert_eq!(cut.cells()[0].position(), Position::Inside);
    }

    #[test]
    fn plane_cut_hex_splits_into_half_cells() {
        let mesh = reference_mesh(CellShape::Hex8);
        let interface = Interface::Mesh(mid_plane());
        let options = CutOptions::default();
        let cut = run_one(&mesh, &interface, &options);

        assert!(cut.error().is_none(), "{:?}", cut.error());
        assert_eq!(cut.stage(), CutStage::IntegrationRulesGenerated);
        assert_eq!(cut.cells().len(), 2);
        assert_relative_eq!(cut.total_cell_volume(), 8.0, epsilon = 1.0e-5);

        for cell in cut.cells() {
            assert_relative_eq!(cell.volume(), 4.0, epsilon = 1.0e-5);
            let expected = if cell.centroid().z > 0.0 {
                Position::Outside
            } else {
                Position::Inside
            };
            assert_eq!(cell.position(), expected);
            let rule = cell.rule().unwrap();
            assert_relative_eq!(rule.total_weight(), 4.0, epsilon = 1.0e-5);
        }

        assert_eq!(cut.boundary_rules().len(), 1);
        let (_, boundary) = &cut.boundary_rules()[0];
        assert_relative_eq!(boundary.total_weight(), 4.0, epsilon = 1.0e-5);
        for normal in &boundary.normals {
            assert_relative_eq!(normal.z, 1.0, epsilon = 1.0e-5);
        }

        // The same input always yields the same decomposition.
        let again = run_one(&mesh, &interface, &options);
        assert_eq!(again.cells().len(), cut.cells().len());
        for (a, b) in again.cells().iter().zip(cut.cells()) {
            assert_eq!(a.volume(), b.volume());
            assert_eq!(a.position(), b.position());
        }
    }

    #[test]
    fn level_set_plane_cuts_the_hex() {
        let mesh = reference_mesh(CellShape::Hex8);
        let values: Vec<Real> = mesh.nodes().iter().map(|p| p.z).collect();
        let cut = run_one(&mesh, &Interface::LevelSet(values), &CutOptions::default());

        assert!(cut.error().is_none(), "{:?}", cut.error());
        assert_eq!(cut.cells().len(), 2);
        for cell in cut.cells() {
            assert_relative_eq!(cell.volume(), 4.0, epsilon = 1.0e-5);
            let expected = if cell.centroid().z > 0.0 {
                Position::Outside
            } else {
                Position::Inside
            };
            assert_eq!(cell.position(), expected);
        }

        assert_eq!(cut.boundary_rules().len(), 1);
        let (_, boundary) = &cut.boundary_rules()[0];
        assert_relative_eq!(boundary.total_weight(), 4.0, epsilon = 1.0e-5);
        for normal in &boundary.normals {
            assert_relative_eq!(normal.z, 1.0, epsilon = 1.0e-5);
        }
    }

    #[test]
    fn global_cell_volumes_follow_the_element_map() {
        // A hex spanning [0, 2] x [0, 1] x [0, 1], cut by the plane x = 0.5.
        let nodes = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(2.0, 1.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            Point::new(0.0, 0.0, 1.0),
            Point::new(2.0, 0.0, 1.0),
            Point::new(2.0, 1.0, 1.0),
            Point::new(0.0, 1.0, 1.0),
        ];
        let corners = nodes.clone();
        let mesh = BackgroundMesh::new(
            nodes,
            vec![Element::new(CellShape::Hex8, vec![0, 1, 2, 3, 4, 5, 6, 7])],
        )
        .unwrap();
        let values: Vec<Real> = mesh.nodes().iter().map(|p| p.x - 0.5).collect();
        let cut = run_one(&mesh, &Interface::LevelSet(values), &CutOptions::default());

        assert!(cut.error().is_none(), "{:?}", cut.error());
        assert_eq!(cut.cells().len(), 2);
        assert_relative_eq!(cut.total_cell_volume(), 8.0, epsilon = 1.0e-5);

        let mut global = 0.0;
        for cell in cut.cells() {
            let expected = if cell.position() == Position::Inside {
                0.5
            } else {
                1.5
            };
            let mapped = cell.global_volume(cut.graph(), cut.registry(), |p| {
                CellShape::Hex8.local_to_global(&corners, p)
            });
            assert_relative_eq!(mapped, expected, epsilon = 1.0e-5);
            global += mapped;
        }
        assert_relative_eq!(global, 2.0, epsilon = 1.0e-5);
    }

    #[test]
    fn touching_side_covers_the_bottom_face() {
        let mesh = reference_mesh(CellShape::Hex8);
        // Wound so the side normal points down, away from the element.
        let bottom = quad_side([
            [-1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
            [1.0, -1.0, -1.0],
        ]);
        let cut = run_one(&mesh, &Interface::Mesh(bottom), &CutOptions::default());

        assert!(cut.error().is_none(), "{:?}", cut.error());
        assert!(cut.is_cut());
        assert_eq!(cut.stage(), CutStage::IntegrationRulesGenerated);
        assert_eq!(cut.cells().len(), 1);
        assert_relative_eq!(cut.cells()[0].volume(), 8.0, epsilon = 1.0e-5);
        assert_eq!(cut.cells()[0].position(), Position::Inside);

        assert_eq!(cut.boundary_rules().len(), 1);
        let (_, boundary) = &cut.boundary_rules()[0];
        assert_relative_eq!(boundary.total_weight(), 4.0, epsilon = 1.0e-5);
        for normal in &boundary.normals {
            assert_relative_eq!(normal.z, -1.0, epsilon = 1.0e-5);
        }
    }

    #[test]
    fn two_cuts_split_a_line_into_three_cells() {
        let nodes = vec![Point::new(0.0, 0.0, 0.0), Point::new(4.0, 0.0, 0.0)];
        let mesh =
            BackgroundMesh::new(nodes, vec![Element::new(CellShape::Line2, vec![0, 1])]).unwrap();

        // Two crossing triangles with outward normals facing away from the
        // middle span.
        let interface_nodes = vec![
            Point::new(1.0, -1.0, -1.0),
            Point::new(1.0, 1.0, -1.0),
            Point::new(1.0, 0.0, 1.0),
            Point::new(3.0, -1.0, -1.0),
            Point::new(3.0, 0.0, 1.0),
            Point::new(3.0, 1.0, -1.0),
        ];
        let sides = vec![
            Side::new(CellShape::Tri3, vec![0, 1, 2]),
            Side::new(CellShape::Tri3, vec![3, 4, 5]),
        ];
        let interface = Interface::Mesh(InterfaceMesh::new(interface_nodes, sides).unwrap());

        let cut = run_one(&mesh, &interface, &CutOptions::default());

        assert!(cut.error().is_none(), "{:?}", cut.error());
        assert_eq!(cut.cells().len(), 3);
        assert_relative_eq!(cut.total_cell_volume(), 2.0, epsilon = 1.0e-6);

        let mut outside_volume = 0.0;
        for cell in cut.cells() {
            if cell.position() == Position::Outside {
                outside_volume += cell.volume();
            }
        }
        assert_relative_eq!(outside_volume, 1.0, epsilon = 1.0e-6);

        assert_eq!(cut.boundary_rules().len(), 2);
        for (_, rule) in cut.boundary_rules() {
            assert_relative_eq!(rule.weights[0], 1.0);
            assert_relative_eq!(rule.points[0].x.abs(), 0.5, epsilon = 1.0e-6);
            assert_relative_eq!(rule.normals[0].x.abs(), 1.0);
        }
    }

    #[test]
    fn level_set_chord_splits_a_quad_element() {
        let mesh = reference_mesh(CellShape::Quad4);
        let values: Vec<Real> = mesh.nodes().iter().map(|p| p.x).collect();
        let cut = run_one(&mesh, &Interface::LevelSet(values), &CutOptions::default());

        assert!(cut.error().is_none(), "{:?}", cut.error());
        assert_eq!(cut.cells().len(), 2);
        for cell in cut.cells() {
            assert_relative_eq!(cell.volume(), 2.0, epsilon = 1.0e-6);
            let expected = if cell.centroid().x > 0.0 {
                Position::Outside
            } else {
                Position::Inside
            };
            assert_eq!(cell.position(), expected);
            assert_relative_eq!(cell.rule().unwrap().total_weight(), 2.0, epsilon = 1.0e-6);
        }

        assert_eq!(cut.boundary_rules().len(), 1);
        let (_, boundary) = &cut.boundary_rules()[0];
        assert_relative_eq!(boundary.total_weight(), 2.0, epsilon = 1.0e-6);
        for normal in &boundary.normals {
            assert_relative_eq!(normal.x, 1.0, epsilon = 1.0e-6);
        }
    }

    #[test]
    fn moment_fitted_rules_reproduce_the_half_volumes() {
        let mesh = reference_mesh(CellShape::Hex8);
        let options = CutOptions {
            volume_rule: VolumeRuleKind::MomentFitting,
            boundary_rule: BoundaryRuleKind::MomentFitting,
            ..CutOptions::default()
        };
        let cut = run_one(&mesh, &Interface::Mesh(mid_plane()), &options);

        assert!(cut.error().is_none(), "{:?}", cut.error());
        let fit_band = Real::EPSILON * 1.0e4;
        for cell in cut.cells() {
            let rule = cell.rule().unwrap();
            assert_relative_eq!(rule.total_weight(), 4.0, epsilon = fit_band);
            let z_moment = rule.integrate(|p| p.z);
            let expected = if cell.centroid().z > 0.0 { 2.0 } else { -2.0 };
            assert_relative_eq!(z_moment, expected, epsilon = fit_band);
        }

        let (_, boundary) = &cut.boundary_rules()[0];
        assert_relative_eq!(boundary.total_weight(), 4.0, epsilon = fit_band);
    }

    #[test]
    fn a_dangling_cut_is_a_contained_failure() {
        let mesh = reference_mesh(CellShape::Hex8);
        // A triangle poking into the interior through the bottom face without
        // crossing out again.
        let poking = tri_side([[0.0, -0.5, -2.0], [0.0, 0.5, -2.0], [0.0, 0.0, 0.5]]);
        let cut = run_one(&mesh, &Interface::Mesh(poking), &CutOptions::default());

        assert_eq!(cut.stage(), CutStage::Failed);
        assert_eq!(
            cut.error(),
            Some(&CutError::GraphInconsistency(GraphDefect::DanglingLine))
        );
        assert!(cut.cells().is_empty());
    }

    #[test]
    fn a_degenerate_element_fails_cleanly() {
        let nodes = vec![Point::new(0.0, 0.0, 0.0); 8];
        let connectivity: Vec<u32> = (0..8).collect();
        let mesh = BackgroundMesh::new(
            nodes,
            vec![Element::new(CellShape::Hex8, connectivity)],
        )
        .unwrap();
        let cut = ElementCut::run(
            &mesh,
            ElementId(0),
            &Interface::LevelSet(vec![0.0; 8]),
            &[],
            &CutOptions::default(),
        );

        assert_eq!(cut.stage(), CutStage::Failed);
        assert!(cut.cells().is_empty());
    }
}
