use approx::assert_relative_eq;
use cleave3d_f64::cut::{CutChecks, CutOptions, CutPass, Position};
use cleave3d_f64::integrate::{BoundaryRuleKind, VolumeRuleKind};
use cleave3d_f64::math::{Point, Real};
use cleave3d_f64::mesh::{
    BackgroundMesh, CellShape, Element, ElementId, Interface, InterfaceMesh, Side,
};

fn reference_cube() -> BackgroundMesh {
    let nodes: Vec<Point<Real>> = CellShape::Hex8
        .reference_nodes()
        .iter()
        .map(|n| Point::new(n[0], n[1], n[2]))
        .collect();
    BackgroundMesh::new(
        nodes,
        vec![Element::new(CellShape::Hex8, vec![0, 1, 2, 3, 4, 5, 6, 7])],
    )
    .unwrap()
}

fn mid_plane() -> Interface {
    Interface::Mesh(
        InterfaceMesh::new(
            vec![
                Point::new(-2.0, -2.0, 0.0),
                Point::new(2.0, -2.0, 0.0),
                Point::new(2.0, 2.0, 0.0),
                Point::new(-2.0, 2.0, 0.0),
            ],
            vec![Side::new(CellShape::Quad4, vec![0, 1, 2, 3])],
        )
        .unwrap(),
    )
}

fn fitted_pass() -> CutPass {
    CutPass::new(CutOptions {
        volume_rule: VolumeRuleKind::MomentFitting,
        boundary_rule: BoundaryRuleKind::MomentFitting,
        checks: CutChecks::VOLUME_PARTITION,
        ..CutOptions::default()
    })
}

// Closed forms over the upper half cube x, y in [-1, 1], z in [0, 1].
#[test]
fn moment_fitted_rules_match_closed_form_integrals() {
    let mesh = reference_cube();
    let report = fitted_pass().run(&mesh, &mid_plane()).unwrap();

    assert!(report.is_complete());
    let cut = report.element(ElementId(0));
    assert_eq!(cut.cells().len(), 2);

    let upper = cut
        .cells()
        .iter()
        .find(|c| c.centroid().z > 0.0)
        .expect("no cell above the cut plane");
    assert_eq!(upper.position(), Position::Outside);

    let rule = upper.rule().unwrap();
    assert_relative_eq!(rule.total_weight(), 4.0, epsilon = 1.0e-9);
    assert_relative_eq!(rule.integrate(|p| p.z), 2.0, epsilon = 1.0e-9);
    assert_relative_eq!(rule.integrate(|p| p.z * p.z), 4.0 / 3.0, epsilon = 1.0e-9);
    assert_relative_eq!(rule.integrate(|p| p.x * p.x), 4.0 / 3.0, epsilon = 1.0e-9);
    assert!(rule.integrate(|p| p.x * p.y).abs() < 1.0e-9);
    assert_relative_eq!(
        rule.integrate(|p| p.x * p.x * p.y * p.y),
        4.0 / 9.0,
        epsilon = 1.0e-9
    );
    // The fit rejects weights below the negativity band.
    assert!(rule.weights.iter().all(|w| *w > -1.0e-9));

    let lower = cut
        .cells()
        .iter()
        .find(|c| c.centroid().z < 0.0)
        .expect("no cell below the cut plane");
    let rule = lower.rule().unwrap();
    assert_relative_eq!(rule.integrate(|p| p.z), -2.0, epsilon = 1.0e-9);

    assert_eq!(cut.boundary_rules().len(), 1);
    let (_, boundary) = &cut.boundary_rules()[0];
    assert_relative_eq!(boundary.total_weight(), 4.0, epsilon = 1.0e-9);
    assert!(boundary.normals.iter().all(|n| n.z > 0.999));
    let second: Real = boundary
        .points
        .iter()
        .zip(boundary.weights.iter())
        .map(|(p, w)| w * p.x * p.x)
        .sum();
    assert_relative_eq!(second, 4.0 / 3.0, epsilon = 1.0e-9);
}

#[test]
fn fitted_and_tessellated_rules_integrate_alike() {
    let mesh = reference_cube();
    let interface = mid_plane();

    let fitted = fitted_pass().run(&mesh, &interface).unwrap();
    let tessellated = CutPass::new(CutOptions::default())
        .run(&mesh, &interface)
        .unwrap();

    let f = |p: &Point<Real>| 1.0 + p.x - 2.0 * p.y * p.z + p.z * p.z * p.z;

    for report in [&fitted, &tessellated] {
        let cut = report.element(ElementId(0));
        let upper = cut
            .cells()
            .iter()
            .find(|c| c.centroid().z > 0.0)
            .expect("no cell above the cut plane");
        let value = upper.rule().unwrap().integrate(f);
        assert_relative_eq!(value, 5.0, epsilon = 1.0e-9);
    }
}
