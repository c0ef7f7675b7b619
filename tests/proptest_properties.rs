//! Property-based tests for scaffold generation.
//!
//! Run with: cargo test --test proptest_properties

use proptest::prelude::*;
use tubemesh_engine::geom::{Vec3, graded_element_lengths, interpolate_cubic_hermite};
use tubemesh_engine::scaffold::{
    IdAllocator, InMemoryMesh, SphereShellGenerator, SphereShellOptions, TubeGenerator, TubeOptions,
    straight_path,
};

// =============================================================================
// Strategies
// =============================================================================

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    prop::array::uniform3(-10.0..10.0f64).prop_map(Vec3::from_array)
}

fn arb_tube_options() -> impl Strategy<Value = TubeOptions> {
    (3usize..=12, 1usize..=5, 1usize..=3, 0.05..0.4f64, 0.25..4.0f64).prop_map(
        |(around, along, through_wall, thickness, ratio)| TubeOptions {
            elements_count_around: around,
            elements_count_along: along,
            elements_count_through_wall: through_wall,
            wall_thickness: thickness,
            element_length_start_end_ratio: ratio,
            ..TubeOptions::default()
        },
    )
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn tube_counts_follow_options(options in arb_tube_options()) {
        let around = options.elements_count_around;
        let along = options.elements_count_along;
        let through_wall = options.elements_count_through_wall;

        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let outcome = TubeGenerator::new(options)
            .generate(&mut mesh, &mut ids, &straight_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0), 1.0))
            .expect("tube");

        prop_assert_eq!(mesh.node_count(), (along + 1) * (through_wall + 1) * around);
        prop_assert_eq!(mesh.element_count(), along * through_wall * around);
        prop_assert_eq!(outcome.range.node_count(), mesh.node_count());
        prop_assert!(outcome.diagnostics.warnings.is_empty());
        prop_assert!(mesh.validate().is_ok());
    }

    #[test]
    fn checked_options_are_stable(
        around in 0usize..20,
        along in 0usize..8,
        thickness in -1.0..1.0f64,
        ratio in -2.0..10.0f64,
    ) {
        let options = TubeOptions {
            elements_count_around: around,
            elements_count_along: along,
            wall_thickness: thickness,
            element_length_start_end_ratio: ratio,
            ..TubeOptions::default()
        };
        let (checked, _) = options.checked();
        let (again, repairs) = checked.clone().checked();
        prop_assert!(repairs.is_empty(), "repairs on checked options: {:?}", repairs);
        prop_assert_eq!(again, checked);
    }

    #[test]
    fn sphere_poles_stay_single_nodes(around in 2usize..=10, up in 2usize..=6, through_wall in 1usize..=2) {
        let options = SphereShellOptions {
            elements_count_around: around,
            elements_count_up: up,
            elements_count_through_wall: through_wall,
            ..SphereShellOptions::default()
        };
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let outcome = SphereShellGenerator::new(options).generate(&mut mesh, &mut ids).expect("sphere shell");

        let on_axis = mesh
            .nodes()
            .filter(|(id, _)| mesh.position(*id).is_some_and(|x| x.x.hypot(x.y) < 1e-9))
            .count();
        prop_assert_eq!(on_axis, 2 * (through_wall + 1));
        prop_assert_eq!(outcome.diagnostics.apex_element_count, 2 * around * through_wall);
        prop_assert_eq!(mesh.element_count(), up * around * through_wall);
    }

    #[test]
    fn hermite_reproduces_end_values(v1 in arb_vec3(), d1 in arb_vec3(), v2 in arb_vec3(), d2 in arb_vec3()) {
        prop_assert!((interpolate_cubic_hermite(v1, d1, v2, d2, 0.0) - v1).length() < 1e-9);
        prop_assert!((interpolate_cubic_hermite(v1, d1, v2, d2, 1.0) - v2).length() < 1e-9);
    }

    #[test]
    fn graded_lengths_sum_to_total(length in 0.1..100.0f64, count in 1usize..20, ratio in 0.1..10.0f64) {
        let lengths = graded_element_lengths(length, count, ratio);
        prop_assert_eq!(lengths.len(), count);
        prop_assert!(lengths.iter().all(|&l| l > 0.0));
        let total: f64 = lengths.iter().sum();
        prop_assert!((total - length).abs() < 1e-9 * length.max(1.0));
    }
}
