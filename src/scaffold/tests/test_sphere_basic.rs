use crate::scaffold::{IdAllocator, InMemoryMesh, SphereShellGenerator, SphereShellOptions, TemplateKind};

fn default_shell() -> (InMemoryMesh, crate::scaffold::SphereShellOutcome) {
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let outcome = SphereShellGenerator::new(SphereShellOptions::default())
        .generate(&mut mesh, &mut ids)
        .expect("sphere shell");
    (mesh, outcome)
}

#[test]
fn shell_has_one_node_per_pole_and_layer() {
    let (mesh, outcome) = default_shell();
    // Per layer: two apexes and three rings of four.
    assert_eq!(mesh.node_count(), 2 * (2 + 3 * 4));
    assert_eq!(mesh.element_count(), 16);
    assert_eq!(outcome.bottom_apex.len(), 2);
    assert_eq!(outcome.top_apex.len(), 2);
    assert_eq!(outcome.diagnostics.apex_element_count, 8);
    assert_eq!(outcome.diagnostics.standard_element_count, 8);
    // Four versions at each pole plus the identity template.
    assert_eq!(outcome.diagnostics.template_cache.entries, 9);
    mesh.validate().expect("valid mesh");

    let inner_bottom = mesh.position(outcome.bottom_apex[0]).expect("apex");
    let outer_top = mesh.position(outcome.top_apex[1]).expect("apex");
    assert!((inner_bottom.z + 0.25).abs() < 1e-12);
    assert!((outer_top.z - 0.5).abs() < 1e-12);
}

#[test]
fn pole_elements_use_collapsed_templates() {
    let (mesh, outcome) = default_shell();
    let mut pole_elements = 0;
    for (_, record) in mesh.elements() {
        match record.template.kind() {
            TemplateKind::PoleBottom | TemplateKind::PoleTop => {
                assert_eq!(record.template.local_nodes_count(), 6);
                assert_eq!(record.nodes.len(), 6);
                pole_elements += 1;
            }
            _ => assert_eq!(record.template.local_nodes_count(), 8),
        }
    }
    assert_eq!(pole_elements, 8);
    assert_eq!(outcome.range.element_count(), 16);
}

#[test]
fn evaluated_shell_stays_near_the_ellipsoid() {
    let (mesh, _) = default_shell();
    for (id, _) in mesh.elements() {
        for xi in [[0.5, 0.5, 1.0], [0.0, 1.0, 1.0], [0.5, 0.0, 1.0]] {
            let sample = mesh.evaluate(id, xi).expect("evaluate");
            let r = sample.x.length();
            assert!((r - 0.5).abs() < 0.04 * 0.5, "element {id} at {xi:?}: radius {r}");
        }
    }
}

#[test]
fn apex_faces_meet_at_the_pole() {
    let (mesh, outcome) = default_shell();
    let bottom = mesh.position(outcome.bottom_apex[1]).expect("apex");
    let top = mesh.position(outcome.top_apex[1]).expect("apex");
    for (id, record) in mesh.elements() {
        let (xi2, pole) = match record.template.kind() {
            TemplateKind::PoleBottom => (0.0, bottom),
            TemplateKind::PoleTop => (1.0, top),
            _ => continue,
        };
        let sample = mesh.evaluate(id, [0.7, xi2, 1.0]).expect("evaluate");
        assert!((sample.x - pole).length() < 1e-12);
        // The meridian leaves the pole horizontally.
        assert!(sample.dxi[1].z.abs() < 1e-12);
        assert!(sample.dxi[1].length() > 0.1);
    }
}

#[test]
fn excluded_bottom_rows_open_the_shell() {
    let options = SphereShellOptions {
        exclude_bottom_rows: 2,
        ..SphereShellOptions::default()
    };
    let mut mesh = InMemoryMesh::new();
    let mut ids = IdAllocator::new();
    let outcome = SphereShellGenerator::new(options)
        .generate(&mut mesh, &mut ids)
        .expect("open shell");
    assert!(outcome.bottom_apex.is_empty());
    // Rows 2 and 3 are rings, row 4 is the top apex.
    assert_eq!(mesh.node_count(), 2 * (2 * 4 + 1));
    assert_eq!(mesh.element_count(), 8);
    assert_eq!(outcome.diagnostics.apex_element_count, 4);
}
