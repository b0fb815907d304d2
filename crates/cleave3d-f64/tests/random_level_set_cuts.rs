use approx::assert_relative_eq;
use cleave3d_f64::cut::{CutChecks, CutOptions, CutPass, Position};
use cleave3d_f64::math::{Point, Real, Vector};
use cleave3d_f64::mesh::{BackgroundMesh, CellShape, Element, ElementId, Interface};

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

#[test]
fn random_plane_level_sets_always_partition_the_cube() {
    let mesh = reference_cube();
    let pass = CutPass::new(CutOptions {
        checks: CutChecks::VOLUME_PARTITION,
        ..CutOptions::default()
    });
    let mut rng = oorandom::Rand32::new(42);
    let mut sample = || rng.rand_float() as Real * 2.0 - 1.0;

    for _ in 0..100 {
        let normal = loop {
            let v = Vector::new(sample(), sample(), sample());
            if v.norm() > 0.3 {
                break v.normalize();
            }
        };
        let offset = sample() * 0.8;
        let values: Vec<Real> = mesh
            .nodes()
            .iter()
            .map(|p| normal.dot(&p.coords) - offset)
            .collect();

        let report = pass.run(&mesh, &Interface::LevelSet(values)).unwrap();
        assert!(
            report.is_complete(),
            "cut failed for plane normal {normal:?} offset {offset}"
        );

        let cut = report.element(ElementId(0));
        assert_eq!(cut.cells().len(), 2);
        let total: Real = cut.cells().iter().map(|c| c.volume()).sum();
        assert_relative_eq!(total, 8.0, epsilon = 1.0e-9);

        for cell in cut.cells() {
            let value = normal.dot(&cell.centroid().coords) - offset;
            let expected = if value > 0.0 {
                Position::Outside
            } else {
                Position::Inside
            };
            assert_eq!(
                cell.position(),
                expected,
                "misclassified cell for plane normal {normal:?} offset {offset}"
            );

            let rule = cell.rule().unwrap();
            assert_relative_eq!(rule.total_weight(), cell.volume(), epsilon = 1.0e-9);
        }

        for (_, rule) in cut.boundary_rules() {
            assert!(rule.total_weight() > 0.0);
            assert!(rule.normals.iter().all(|n| n.dot(&normal) > 1.0 - 1.0e-6));
        }
    }
}
