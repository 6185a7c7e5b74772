//! Scene data: meshes, instance sets, batches and GPU textures.
//!
//! - `mesh` holds de-indexed vertex data and the GPU side of a mesh
//! - `instance` holds per-instance model matrices
//! - `batch` pairs a mesh with its instances and a render pass
//! - `texture` wraps wgpu textures (depth buffer, colour maps, placeholder)

pub mod batch;
pub mod instance;
pub mod mesh;
pub mod texture;
