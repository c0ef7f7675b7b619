#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod scaffold;

use std::fmt;

use scaffold::{
    BranchComposition, CompositionReport, IdAllocator, IdRange, InMemoryMesh, PathControlPoint,
    ScaffoldDiagnostics, ScaffoldError, SphereShellGenerator, SphereShellOptions, TubeGenerator,
    TubeOptions, ValueLabel,
};
use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct NodeExport {
    id: u32,
    x: [f64; 3],
    d1: [f64; 3],
    d2: [f64; 3],
    d3: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ElementExport {
    id: u32,
    kind: &'static str,
    nodes: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    scale_factors: Vec<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
struct MeshExport {
    nodes: Vec<NodeExport>,
    elements: Vec<ElementExport>,
}

/// Identifier ranges and diagnostics of the last run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
enum RunReport {
    Tube {
        range: IdRange,
        diagnostics: ScaffoldDiagnostics,
    },
    SphereShell {
        range: IdRange,
        diagnostics: ScaffoldDiagnostics,
    },
    Composition(CompositionReport),
}

impl RunReport {
    fn diagnostics(&self) -> &ScaffoldDiagnostics {
        match self {
            Self::Tube { diagnostics, .. } | Self::SphereShell { diagnostics, .. } => diagnostics,
            Self::Composition(report) => &report.diagnostics,
        }
    }
}

fn export_mesh(mesh: &InMemoryMesh) -> MeshExport {
    let parameter = |id, label| mesh.parameter(id, label, 1).unwrap_or_default().to_array();
    MeshExport {
        nodes: mesh
            .nodes()
            .map(|(id, _)| NodeExport {
                id: id.0,
                x: parameter(id, ValueLabel::Value),
                d1: parameter(id, ValueLabel::D1),
                d2: parameter(id, ValueLabel::D2),
                d3: parameter(id, ValueLabel::D3),
            })
            .collect(),
        elements: mesh
            .elements()
            .map(|(id, record)| ElementExport {
                id: id.0,
                kind: record.template.kind().name(),
                nodes: record.nodes.iter().map(|node| node.0).collect(),
                scale_factors: record.scale_factors.clone(),
            })
            .collect(),
    }
}

/// Public entry point for consumers.
#[wasm_bindgen]
pub struct Engine {
    initialized: bool,
    mesh: InMemoryMesh,
    last_report: Option<RunReport>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Engine {
        Engine {
            initialized: true,
            mesh: InMemoryMesh::new(),
            last_report: None,
        }
    }

    /// Whether the engine has run its minimal initialisation.
    #[wasm_bindgen]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Generates a tube into a fresh mesh.
    ///
    /// `options` is a partial `TubeOptions` map; `path` a list of
    /// `{ x, d1, d2, d12 }` control points.
    #[wasm_bindgen]
    pub fn generate_tube(&mut self, options: JsValue, path: JsValue) -> Result<(), JsValue> {
        let options: TubeOptions = serde_wasm_bindgen::from_value(options).map_err(to_js_error)?;
        let path: Vec<PathControlPoint> = serde_wasm_bindgen::from_value(path).map_err(to_js_error)?;
        self.run_tube(options, &path).map_err(to_js_error)
    }

    /// Generates a sphere shell into a fresh mesh.
    #[wasm_bindgen]
    pub fn generate_sphere_shell(&mut self, options: JsValue) -> Result<(), JsValue> {
        let options: SphereShellOptions = serde_wasm_bindgen::from_value(options).map_err(to_js_error)?;
        self.run_sphere_shell(options).map_err(to_js_error)
    }

    /// Generates a base tube with a branch joined to it into a fresh mesh.
    #[wasm_bindgen]
    pub fn generate_composition(&mut self, composition: JsValue) -> Result<(), JsValue> {
        let composition: BranchComposition =
            serde_wasm_bindgen::from_value(composition).map_err(to_js_error)?;
        self.run_composition(&composition).map_err(to_js_error)
    }

    /// Nodes with their parameters and elements with their node lists.
    #[wasm_bindgen]
    pub fn get_mesh(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&export_mesh(&self.mesh))
            .map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Identifier ranges and diagnostics of the last run.
    #[wasm_bindgen]
    pub fn get_diagnostics(&self) -> Result<JsValue, JsValue> {
        let report = self
            .last_report
            .as_ref()
            .ok_or_else(|| js_error("no scaffold has been generated"))?;
        serde_wasm_bindgen::to_value(report).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Field value at local coordinates of one element.
    #[wasm_bindgen]
    pub fn evaluate_element(&self, element: u32, xi1: f64, xi2: f64, xi3: f64) -> Result<Vec<f64>, JsValue> {
        let sample = self
            .mesh
            .evaluate(scaffold::ElementId(element), [xi1, xi2, xi3])
            .map_err(to_js_error)?;
        Ok(sample.x.to_array().to_vec())
    }

    #[wasm_bindgen]
    pub fn node_count(&self) -> usize {
        self.mesh.node_count()
    }

    #[wasm_bindgen]
    pub fn element_count(&self) -> usize {
        self.mesh.element_count()
    }
}

impl Engine {
    fn run_tube(&mut self, options: TubeOptions, path: &[PathControlPoint]) -> Result<(), ScaffoldError> {
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let outcome = TubeGenerator::new(options).generate(&mut mesh, &mut ids, path)?;
        self.finish(
            mesh,
            RunReport::Tube {
                range: outcome.range,
                diagnostics: outcome.diagnostics,
            },
        );
        Ok(())
    }

    fn run_sphere_shell(&mut self, options: SphereShellOptions) -> Result<(), ScaffoldError> {
        let mut mesh = InMemoryMesh::new();
        let mut ids = IdAllocator::new();
        let outcome = SphereShellGenerator::new(options).generate(&mut mesh, &mut ids)?;
        self.finish(
            mesh,
            RunReport::SphereShell {
                range: outcome.range,
                diagnostics: outcome.diagnostics,
            },
        );
        Ok(())
    }

    fn run_composition(&mut self, composition: &BranchComposition) -> Result<(), ScaffoldError> {
        let mut mesh = InMemoryMesh::new();
        let report = composition.run(&mut mesh)?;
        self.finish(mesh, RunReport::Composition(report));
        Ok(())
    }

    /// Replaces the mesh only after a run succeeded, so a failed run leaves
    /// the previous result in place.
    fn finish(&mut self, mesh: InMemoryMesh, report: RunReport) {
        log::debug!("scaffold generated: {}", report.diagnostics().summary());
        debug_log!("engine holds {} nodes", mesh.node_count());
        self.mesh = mesh;
        self.last_report = Some(report);
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
