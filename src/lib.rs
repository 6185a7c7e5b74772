//! skyview
//!
//! An interactive 3D scene viewer for native and WASM. It loads textured
//! OBJ meshes, places many instances of each and draws every mesh with a
//! single instanced draw call. An orbit camera follows a steerable airship;
//! a spotlight mode pulls the camera in front of it with a smooth transition.
//!
//! High-level modules
//! - `camera`: orbit camera, projection and the camera uniform
//! - `config`: tuning constants with defaults, loadable from RON
//! - `context`: wgpu device, surface and the recorded frame
//! - `data_structures`: meshes, instance sets, batches and textures
//! - `entity`: the airship controller and camera follow logic
//! - `flow`: frame clock, scene state and the winit event loop
//! - `input`: event buffering and the per-tick input snapshot
//! - `pipelines`: opaque and translucent render pipelines
//! - `render`: the graphics device seam
//! - `resources`: mesh and texture loading
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod entity;
pub mod error;
pub mod flow;
pub mod input;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use config::ViewerConfig;
pub use error::{ConfigError, ViewerError};
pub use flow::{SceneDescription, run};

/// Browser entry point: the default scene drawn into the `canvas` element.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    run(ViewerConfig::default(), SceneDescription::default())
        .map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{e:#}")))
}
