use crate::geom::Vec3;
use crate::scaffold::{
    AnnulusJunction, IdAllocator, InMemoryMesh, JunctionOptions, MeshAssembler, PathControlPoint,
    TubeGenerator, TubeOptions, straight_path,
};

fn options(wall_thickness: f64) -> TubeOptions {
    TubeOptions {
        elements_count_along: 2,
        wall_thickness,
        ..TubeOptions::default()
    }
}

#[test]
fn rotated_end_ring_is_aligned_by_offset() {
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let a = TubeGenerator::new(options(0.1))
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::ZERO, Vec3::Z, 1.0))
        .expect("tube a");
    // Landmark of the second tube on +y; around runs towards -x.
    let rotated = [
        PathControlPoint::new(Vec3::new(0.0, 0.0, 2.0), Vec3::Z, Vec3::Y, Vec3::ZERO),
        PathControlPoint::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Z, Vec3::Y, Vec3::ZERO),
    ];
    let b = TubeGenerator::new(options(0.1))
        .generate(&mut mesh, &mut ids, &rotated)
        .expect("tube b");
    let seam = b.proximal.as_ref().expect("open");

    let mut assembler = MeshAssembler::new();
    let junction = AnnulusJunction::default()
        .stitch(&mut assembler, &mut mesh, &mut ids, &a.distal, seam)
        .expect("junction");
    assert_eq!(junction.around_offset, 6);
    assert!(!junction.end_reversed);

    for e1 in 0..8 {
        let sample = mesh.evaluate(junction.elements[e1], [0.0, 1.0, 0.0]).expect("evaluate");
        let expected = mesh.position(seam.nodes[0][(6 + e1) % 8]).expect("node");
        assert!((sample.x - expected).length() < 1e-12);
        let start = mesh.evaluate(junction.elements[e1], [0.0, 0.0, 0.0]).expect("evaluate");
        assert!((start.x.x - expected.x).abs() < 1e-9 && (start.x.y - expected.y).abs() < 1e-9);
    }
    mesh.validate().expect("valid mesh");
}

#[test]
fn zero_thickness_junction_shares_layers() {
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let a = TubeGenerator::new(options(0.0))
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::ZERO, Vec3::Z, 1.0))
        .expect("tube a");
    let b = TubeGenerator::new(options(0.0))
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 0.0, 4.0), 1.0))
        .expect("tube b");
    let junction = AnnulusJunction::new(JunctionOptions { elements_count_radial: 3 })
        .stitch(
            &mut MeshAssembler::new(),
            &mut mesh,
            &mut ids,
            &a.distal,
            b.proximal.as_ref().expect("open"),
        )
        .expect("junction");
    assert_eq!(junction.interior.len(), 2);
    assert_eq!(junction.range.node_count(), 2 * 8);
    assert_eq!(junction.interior[0][0], junction.interior[0][1]);
    assert_eq!(junction.elements.len(), 3 * 8);
}

#[test]
fn layer_counts_must_agree() {
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let a = TubeGenerator::new(options(0.1))
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::ZERO, Vec3::Z, 1.0))
        .expect("tube a");
    let two_layers = TubeOptions {
        elements_count_through_wall: 2,
        ..options(0.1)
    };
    let b = TubeGenerator::new(two_layers)
        .generate(&mut mesh, &mut ids, &straight_path(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 0.0, 3.0), 1.0))
        .expect("tube b");
    let err = AnnulusJunction::default()
        .stitch(&mut MeshAssembler::new(), &mut mesh, &mut ids, &a.distal, &b.distal)
        .unwrap_err();
    assert_eq!(err, crate::scaffold::ScaffoldError::LayerMismatch { start: 2, end: 3 });
}
