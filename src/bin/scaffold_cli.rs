#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("scaffold_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::collections::BTreeMap;
    use std::f64::consts::FRAC_PI_4;
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    use tubemesh_engine::geom::Vec3;
    use tubemesh_engine::scaffold::{
        BranchComposition, IdAllocator, InMemoryMesh, PathControlPoint, ScaffoldDiagnostics,
        SphereShellGenerator, SphereShellOptions, TubeGenerator, TubeOptions, ValueLabel, straight_path,
    };

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    /// Corner quadruples of the six hexahedron faces, in local corner order.
    const HEX_FACES: [[usize; 4]; 6] = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];

    const USAGE: &str = r#"scaffold_cli (tubemesh-engine)

USAGE:
  scaffold_cli list
  scaffold_cli run <scenario|all> [options]

SCENARIOS:
  tube_plain
  tube_bend
  tube_closed
  sphere_shell
  branch_composition
  branch_reversed

OPTIONS (run):
  --out-dir <dir>    Write <scenario>.obj and/or <scenario>.snap to this dir (required for `all`)
  --obj <path>       Write OBJ (single scenario only)
  --snap <path>      Write snapshot (single scenario only)
  --no-obj           Skip OBJ when using --out-dir
  --no-snap          Skip snapshot when using --out-dir
  --overwrite        Overwrite existing output files
  -h, --help         Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut overwrite = false;
        let mut write_obj = true;
        let mut write_snap = true;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--overwrite" => overwrite = true,
                "--no-obj" => write_obj = false,
                "--no-snap" => write_snap = false,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() || snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            if !write_obj && !write_snap {
                return Err("nothing to write (both --no-obj and --no-snap set)".to_string());
            }

            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_one_scenario_to_dir(*scenario, dir, write_obj, write_snap, overwrite)?;
                }
                return Ok(());
            }

            let scenario = Scenario::from_str(scenario_name.as_str())
                .ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_one_scenario_to_dir(scenario, dir, write_obj, write_snap, overwrite);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario =
            Scenario::from_str(scenario_name.as_str()).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario)?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }

        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        eprintln!("{}: {}", output.name, output.diagnostics.summary());
        Ok(())
    }

    fn run_one_scenario_to_dir(
        scenario: Scenario,
        dir: &Path,
        write_obj: bool,
        write_snap: bool,
        overwrite: bool,
    ) -> Result<(), String> {
        let output = run_scenario(scenario)?;

        if write_snap {
            let path = dir.join(format!("{}.snap", output.name));
            write_text_file(&path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        if write_obj {
            let path = dir.join(format!("{}.obj", output.name));
            write_obj_file(&path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        eprintln!("{}: {}", output.name, output.diagnostics.summary());
        Ok(())
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = format!("unknown scenario `{name}`\n\navailable scenarios:\n");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, normalize_snapshot_text(text)).map_err(|e| format!("write {}: {e}", path.display()))
    }

    /// Writes node positions as vertices and the boundary quads of every
    /// element as faces. Corners blended from several nodes, such as hanging
    /// nodes, get their own evaluated vertex; faces collapsed onto an apex
    /// drop their repeated vertices.
    fn write_obj_file(path: &Path, mesh: &InMemoryMesh, name: &str, overwrite: bool) -> Result<(), String> {
        mesh.validate().map_err(|e| format!("mesh validation failed: {e}"))?;

        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let mut vertices: Vec<Vec3> = Vec::new();
        let mut vertex_of = BTreeMap::new();
        for (id, _) in mesh.nodes() {
            let x = mesh.position(id).ok_or_else(|| format!("node {} has no position", id.0))?;
            vertex_of.insert(id, vertices.len() + 1);
            vertices.push(x);
        }

        let mut faces: Vec<Vec<usize>> = Vec::new();
        for (id, record) in mesh.elements() {
            let mut corners = [0usize; 8];
            for (corner, slot) in corners.iter_mut().enumerate() {
                *slot = match record.template.corner_node(corner) {
                    Some(local) => record
                        .nodes
                        .get(local)
                        .and_then(|node| vertex_of.get(node).copied())
                        .ok_or_else(|| format!("element {} corner {corner} has no node", id.0))?,
                    None => {
                        let xi = [(corner & 1) as f64, ((corner >> 1) & 1) as f64, ((corner >> 2) & 1) as f64];
                        let sample = mesh.evaluate(id, xi).map_err(|e| format!("evaluate element {}: {e}", id.0))?;
                        vertices.push(sample.x);
                        vertices.len()
                    }
                };
            }
            for face in HEX_FACES {
                let mut quad: Vec<usize> = Vec::with_capacity(4);
                for corner in face {
                    let vertex = corners[corner];
                    if quad.last() != Some(&vertex) && quad.first() != Some(&vertex) {
                        quad.push(vertex);
                    }
                }
                if quad.len() >= 3 {
                    faces.push(quad);
                }
            }
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);

        writeln!(w, "# tubemesh-engine scaffold_cli").map_err(|e| format!("write obj: {e}"))?;
        writeln!(w, "o {name}").map_err(|e| format!("write obj: {e}"))?;
        for v in &vertices {
            writeln!(w, "v {} {} {}", v.x, v.y, v.z).map_err(|e| format!("write obj: {e}"))?;
        }
        for face in &faces {
            let indices: Vec<String> = face.iter().map(ToString::to_string).collect();
            writeln!(w, "f {}", indices.join(" ")).map_err(|e| format!("write obj: {e}"))?;
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    fn normalize_snapshot_text(text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\n') {
            normalized
        } else {
            format!("{normalized}\n")
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == 0.0 { 0.0 } else { q }
    }

    fn write_vec3(out: &mut String, v: Vec3) {
        for (i, c) in v.to_array().into_iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{:.SNAPSHOT_DECIMALS$}", quantize_f64(c));
        }
    }

    fn write_diagnostics(out: &mut String, diag: &ScaffoldDiagnostics) {
        let _ = writeln!(out, "diag.nodes {}", diag.node_count);
        let _ = writeln!(out, "diag.standard {}", diag.standard_element_count);
        let _ = writeln!(out, "diag.apex {}", diag.apex_element_count);
        let _ = writeln!(out, "diag.junction {}", diag.junction_element_count);
        let _ = writeln!(out, "diag.hanging {}", diag.hanging_element_count);
        if let (Some(min), Some(max)) = (diag.min_wall_scale, diag.max_wall_scale) {
            let _ = writeln!(
                out,
                "diag.wall_scale {:.SNAPSHOT_DECIMALS$} {:.SNAPSHOT_DECIMALS$}",
                quantize_f64(min),
                quantize_f64(max)
            );
        }
        let _ = writeln!(out, "diag.warnings {}", diag.warnings.len());
        for warning in &diag.warnings {
            let _ = writeln!(out, "warning {warning}");
        }
    }

    fn write_mesh(out: &mut String, mesh: &InMemoryMesh) {
        let _ = writeln!(out, "mesh.nodes {}", mesh.node_count());
        for (id, _) in mesh.nodes() {
            for (label, tag) in [
                (ValueLabel::Value, "x"),
                (ValueLabel::D1, "d1"),
                (ValueLabel::D2, "d2"),
                (ValueLabel::D3, "d3"),
            ] {
                if let Some(v) = mesh.parameter(id, label, 1) {
                    let _ = write!(out, "n {} {tag} ", id.0);
                    write_vec3(out, v);
                    out.push('\n');
                }
            }
        }
        let _ = writeln!(out, "mesh.elements {}", mesh.element_count());
        for (id, record) in mesh.elements() {
            let nodes: Vec<String> = record.nodes.iter().map(|n| n.0.to_string()).collect();
            let _ = writeln!(out, "e {} {} {}", id.0, record.template.kind().name(), nodes.join(" "));
        }
    }

    fn snapshot(op: &str, mesh: &InMemoryMesh, diag: &ScaffoldDiagnostics) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# tubemesh-engine snapshot v1");
        let _ = writeln!(out, "op {op}");
        let _ = writeln!(out, "quantize {SNAPSHOT_QUANTIZE:.1e}");
        write_diagnostics(&mut out, diag);
        write_mesh(&mut out, mesh);
        normalize_snapshot_text(&out)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        TubePlain,
        TubeBend,
        TubeClosed,
        SphereShell,
        BranchComposition,
        BranchReversed,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::TubePlain,
            Scenario::TubeBend,
            Scenario::TubeClosed,
            Scenario::SphereShell,
            Scenario::BranchComposition,
            Scenario::BranchReversed,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::TubePlain => "tube_plain",
                Scenario::TubeBend => "tube_bend",
                Scenario::TubeClosed => "tube_closed",
                Scenario::SphereShell => "sphere_shell",
                Scenario::BranchComposition => "branch_composition",
                Scenario::BranchReversed => "branch_reversed",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            Scenario::ALL.iter().copied().find(|scenario| scenario.name() == name)
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: InMemoryMesh,
        diagnostics: ScaffoldDiagnostics,
        snapshot: String,
    }

    impl ScenarioOutput {
        fn new(name: &'static str, mesh: InMemoryMesh, diagnostics: ScaffoldDiagnostics) -> Self {
            let snapshot = snapshot(name, &mesh, &diagnostics);
            Self {
                name,
                mesh,
                diagnostics,
                snapshot,
            }
        }
    }

    fn run_scenario(scenario: Scenario) -> Result<ScenarioOutput, String> {
        match scenario {
            Scenario::TubePlain => tube_scenario(
                scenario.name(),
                TubeOptions {
                    wall_thickness: 0.0,
                    ..TubeOptions::default()
                },
                &straight_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0), 1.0),
            ),
            Scenario::TubeBend => tube_scenario(
                scenario.name(),
                TubeOptions {
                    wall_thickness: 0.2,
                    ..TubeOptions::default()
                },
                &quarter_bend(3.0, 0.5),
            ),
            Scenario::TubeClosed => tube_scenario(
                scenario.name(),
                TubeOptions {
                    closed_proximal_end: true,
                    ..TubeOptions::default()
                },
                &straight_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0), 1.0),
            ),
            Scenario::SphereShell => {
                let mut mesh = InMemoryMesh::new();
                let mut ids = IdAllocator::new();
                let outcome = SphereShellGenerator::new(SphereShellOptions::default())
                    .generate(&mut mesh, &mut ids)
                    .map_err(|e| e.to_string())?;
                Ok(ScenarioOutput::new(scenario.name(), mesh, outcome.diagnostics))
            }
            Scenario::BranchComposition => composition_scenario(scenario.name(), BranchComposition::default()),
            Scenario::BranchReversed => composition_scenario(
                scenario.name(),
                BranchComposition {
                    branch_path: straight_path(Vec3::new(0.0, 0.0, 4.5), Vec3::new(0.0, 0.0, 2.5), 0.5),
                    ..BranchComposition::default()
                },
            ),
        }
    }

    fn tube_scenario(
        name: &'static str,
        options: TubeOptions,
        path: &[PathControlPoint],
    ) -> Result<ScenarioOutput, String> {
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let outcome = TubeGenerator::new(options)
            .generate(&mut mesh, &mut ids, path)
            .map_err(|e| e.to_string())?;
        Ok(ScenarioOutput::new(name, mesh, outcome.diagnostics))
    }

    fn composition_scenario(name: &'static str, composition: BranchComposition) -> Result<ScenarioOutput, String> {
        let mut mesh = InMemoryMesh::new();
        let report = composition.run(&mut mesh).map_err(|e| e.to_string())?;
        Ok(ScenarioOutput::new(name, mesh, report.diagnostics))
    }

    fn quarter_bend(bend_radius: f64, tube_radius: f64) -> Vec<PathControlPoint> {
        (0..3)
            .map(|n| {
                let (s, c) = (f64::from(n) * FRAC_PI_4).sin_cos();
                PathControlPoint::new(
                    Vec3::new(bend_radius * c, bend_radius * s, 0.0),
                    Vec3::new(-s, c, 0.0) * (bend_radius * FRAC_PI_4),
                    Vec3::Z * tube_radius,
                    Vec3::ZERO,
                )
            })
            .collect()
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
