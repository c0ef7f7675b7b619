use std::f64::consts::FRAC_PI_4;

use crate::geom::Vec3;
use crate::scaffold::{
    IdAllocator, InMemoryMesh, PathControlPoint, ScaffoldError, TubeGenerator, TubeOptions,
    straight_path,
};

fn quarter_bend(bend_radius: f64, tube_radius: f64) -> Vec<PathControlPoint> {
    (0..3)
        .map(|n| {
            let (s, c) = (n as f64 * FRAC_PI_4).sin_cos();
            PathControlPoint::new(
                Vec3::new(bend_radius * c, bend_radius * s, 0.0),
                Vec3::new(-s, c, 0.0) * (bend_radius * FRAC_PI_4),
                Vec3::Z * tube_radius,
                Vec3::ZERO,
            )
        })
        .collect()
}

#[test]
fn closed_tube_collapses_onto_apex() {
    let options = TubeOptions {
        closed_proximal_end: true,
        ..TubeOptions::default()
    };
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let outcome = TubeGenerator::new(options)
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0), 1.0))
        .expect("closed tube");

    assert!(outcome.proximal.is_none());
    assert_eq!(outcome.nodes.apex.len(), 2);
    assert_eq!(mesh.node_count(), 2 + 4 * 2 * 8);
    assert_eq!(mesh.element_count(), 32);
    assert_eq!(outcome.diagnostics.apex_element_count, 8);
    mesh.validate().expect("valid mesh");

    let apex = mesh.position(outcome.nodes.apex[0]).expect("apex");
    for (e1, &element) in outcome.nodes.elements.iter().take(8).enumerate() {
        let at_apex = mesh.evaluate(element, [0.3, 0.0, 0.0]).expect("evaluate");
        assert!((at_apex.x - apex).length() < 1e-12, "element {e1} misses the apex");
        assert!(at_apex.dxi[0].length() < 1e-12);
    }
    // Neighbouring apex elements agree on the rail they share.
    for e1 in 0..8 {
        let left = mesh.evaluate(outcome.nodes.elements[e1], [1.0, 0.0, 0.0]).expect("evaluate");
        let right = mesh
            .evaluate(outcome.nodes.elements[(e1 + 1) % 8], [0.0, 0.0, 0.0])
            .expect("evaluate");
        assert!((left.dxi[1] - right.dxi[1]).length() < 1e-9);
    }
}

#[test]
fn bend_compresses_the_inner_side() {
    let options = TubeOptions {
        elements_count_along: 4,
        wall_thickness: 0.2,
        ..TubeOptions::default()
    };
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let outcome = TubeGenerator::new(options)
        .generate(&mut mesh, &mut ids, &quarter_bend(3.0, 0.5))
        .expect("bent tube");
    let min = outcome.diagnostics.min_wall_scale.expect("scale");
    let max = outcome.diagnostics.max_wall_scale.expect("scale");
    assert!(min < 1.0 && min > 0.8, "min scale {min}");
    assert!(max > 1.0);
    mesh.validate().expect("valid mesh");
}

#[test]
fn tight_bend_reports_inverting_wall() {
    let options = TubeOptions {
        wall_thickness: 0.45,
        ..TubeOptions::default()
    };
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let err = TubeGenerator::new(options)
        .generate(&mut mesh, &mut ids, &quarter_bend(0.6, 0.5))
        .unwrap_err();
    match err {
        ScaffoldError::DegenerateGeometry { context, indices, .. } => {
            assert_eq!(context, "wall offset");
            assert_eq!(indices.len(), 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn coincident_path_points_are_degenerate() {
    let point = PathControlPoint::new(Vec3::ZERO, Vec3::Z, Vec3::X, Vec3::ZERO);
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let err = TubeGenerator::default()
        .generate(&mut mesh, &mut ids, &[point, point])
        .unwrap_err();
    assert!(err.is_degenerate_geometry());
}

#[test]
fn clamped_options_surface_as_warnings() {
    let options = TubeOptions {
        elements_count_around: 2,
        elements_count_along: 0,
        ..TubeOptions::default()
    };
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let outcome = TubeGenerator::new(options)
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::ZERO, Vec3::Z, 1.0))
        .expect("clamped tube");
    assert_eq!(outcome.options.elements_count_around, 3);
    assert_eq!(outcome.options.elements_count_along, 1);
    assert_eq!(outcome.diagnostics.warnings.len(), 2);
    assert_eq!(mesh.element_count(), 3);
}

#[test]
fn graded_elements_follow_ratio() {
    let options = TubeOptions {
        elements_count_along: 3,
        element_length_start_end_ratio: 4.0,
        wall_thickness: 0.0,
        ..TubeOptions::default()
    };
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let outcome = TubeGenerator::new(options)
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0), 1.0))
        .expect("graded tube");
    let z: Vec<f64> = outcome
        .nodes
        .rings
        .iter()
        .map(|row| mesh.position(row[0][0]).expect("node").z)
        .collect();
    let first = z[1] - z[0];
    let last = z[3] - z[2];
    assert!((first / last - 4.0).abs() < 1e-6, "lengths {first} {last}");
}
