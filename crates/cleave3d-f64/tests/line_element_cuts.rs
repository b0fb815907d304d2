use approx::assert_relative_eq;
use cleave3d_f64::cut::{CutChecks, CutOptions, CutPass, Position};
use cleave3d_f64::math::{Point, Real};
use cleave3d_f64::mesh::{
    BackgroundMesh, CellShape, Element, ElementId, Interface, InterfaceMesh, Side,
};

#[test]
fn two_opposed_triangles_carve_the_middle_of_a_line() {
    let mesh = BackgroundMesh::new(
        vec![Point::new(0.0, 0.0, 0.0), Point::new(4.0, 0.0, 0.0)],
        vec![Element::new(CellShape::Line2, vec![0, 1])],
    )
    .unwrap();

    // One triangle at x = 1 facing +x, one at x = 3 facing -x: the segment
    // between them is the outside region.
    let interface = Interface::Mesh(
        InterfaceMesh::new(
            vec![
                Point::new(1.0, -1.0, -1.0),
                Point::new(1.0, 1.0, -1.0),
                Point::new(1.0, 0.0, 1.0),
                Point::new(3.0, -1.0, -1.0),
                Point::new(3.0, 0.0, 1.0),
                Point::new(3.0, 1.0, -1.0),
            ],
            vec![
                Side::new(CellShape::Tri3, vec![0, 1, 2]),
                Side::new(CellShape::Tri3, vec![3, 4, 5]),
            ],
        )
        .unwrap(),
    );

    let pass = CutPass::new(CutOptions {
        checks: CutChecks::VOLUME_PARTITION,
        ..CutOptions::default()
    });
    let report = pass.run(&mesh, &interface).unwrap();

    assert!(report.is_complete());
    let cut = report.element(ElementId(0));
    assert!(cut.is_cut());
    assert_eq!(cut.cells().len(), 3);

    let total: Real = cut.cells().iter().map(|c| c.volume()).sum();
    assert_relative_eq!(total, 2.0, epsilon = 1.0e-10);

    for cell in cut.cells() {
        let x = cell.centroid().x;
        if x.abs() < 0.25 {
            // The middle piece spans local [-0.5, 0.5].
            assert_relative_eq!(cell.volume(), 1.0, epsilon = 1.0e-10);
            assert_eq!(cell.position(), Position::Outside);
        } else {
            assert_relative_eq!(cell.volume(), 0.5, epsilon = 1.0e-10);
            assert_relative_eq!(x.abs(), 0.75, epsilon = 1.0e-10);
            assert_eq!(cell.position(), Position::Inside);
        }
        let rule = cell.rule().unwrap();
        assert_relative_eq!(rule.total_weight(), cell.volume(), epsilon = 1.0e-10);
    }

    assert_eq!(cut.boundary_rules().len(), 2);
    for (_, rule) in cut.boundary_rules() {
        assert_eq!(rule.len(), 1);
        assert_relative_eq!(rule.weights[0], 1.0, epsilon = 1.0e-10);
        assert_relative_eq!(rule.points[0].x.abs(), 0.5, epsilon = 1.0e-10);
        // Outward normals at both cuts point into the middle piece.
        let expected = if rule.points[0].x < 0.0 { 1.0 } else { -1.0 };
        assert_relative_eq!(rule.normals[0].x, expected, epsilon = 1.0e-10);
    }
}
